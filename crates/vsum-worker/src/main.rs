//! `vsum`: summarize one video file.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vsum_ai::{GeminiClient, GeminiConfig, SpeechToText, WhisperClient, WhisperConfig};
use vsum_media::FfmpegToolkit;
use vsum_models::SummaryFormat;
use vsum_worker::{
    exit_code, spawn_signal_listener, CancelToken, Pipeline, PipelineServices, RunTracker,
    WorkerConfig, WorkerError,
};

#[derive(Parser, Debug)]
#[command(name = "vsum", version, about = "Summarize a video from sampled frames and its audio")]
struct Cli {
    /// Video file to summarize
    video: PathBuf,

    /// Seconds between sampled frames
    #[arg(long)]
    interval: Option<u32>,

    /// Maximum number of sampled frames
    #[arg(long)]
    max_frames: Option<u32>,

    /// Directory for the summary and transcript (default: the video's directory)
    #[arg(long)]
    summaries_dir: Option<PathBuf>,

    /// Simultaneous frame description requests
    #[arg(long)]
    concurrency: Option<usize>,

    /// Root directory for Work Units
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Keep the Work Unit after a successful run
    #[arg(long)]
    keep_work: bool,

    /// Output format: md or txt
    #[arg(long)]
    format: Option<SummaryFormat>,
}

impl Cli {
    fn apply(&self, config: &mut WorkerConfig) {
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(max_frames) = self.max_frames {
            config.max_frames = max_frames;
        }
        if let Some(dir) = &self.summaries_dir {
            config.summaries_dir = Some(dir.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(dir) = &self.work_dir {
            config.work_dir = dir.clone();
        }
        if self.keep_work {
            config.keep_work = true;
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["vsum=info", "vsum_worker=info", "vsum_media=info", "vsum_ai=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("vsum: a rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let mut config = WorkerConfig::from_env();
    cli.apply(&mut config);
    info!("Starting vsum with config: {:?}", config);

    let code = match run(&cli, config).await {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            if code != exit_code::INTERRUPTED {
                error!(exit_code = code, "{}", e);
            }
            code
        }
    };
    std::process::exit(code);
}

/// Speech-to-text settings from the environment, bounded by the request timeout.
fn whisper_config(config: &WorkerConfig) -> Option<WhisperConfig> {
    WhisperConfig::from_env().map(|stt| stt.with_timeout(config.request_timeout))
}

async fn run(cli: &Cli, config: WorkerConfig) -> Result<(), WorkerError> {
    config.validate()?;

    let cancel = CancelToken::new();
    let tracker = RunTracker::new();
    spawn_signal_listener(cancel.clone(), tracker.clone());

    let toolkit = FfmpegToolkit::new()
        .with_frame_max_width(config.frame_max_width)
        .with_timeout(config.ffmpeg_timeout.as_secs())
        .with_cancel(cancel.receiver());

    let gemini = Arc::new(GeminiClient::new(
        GeminiConfig::from_env()?.with_timeout(config.request_timeout),
    )?);

    let stt: Option<Arc<dyn SpeechToText>> = match whisper_config(&config) {
        Some(stt_config) => Some(Arc::new(WhisperClient::new(stt_config)?)),
        None => {
            warn!("No TRANSCRIBE_API_KEY or OPENAI_API_KEY set, transcription disabled");
            None
        }
    };

    let services = PipelineServices {
        toolkit: Arc::new(toolkit),
        vision: gemini.clone(),
        text: gemini,
        stt,
    };

    let pipeline = Pipeline::new(config, services)
        .with_cancel(cancel)
        .with_tracker(tracker);

    let report = pipeline.run(&cli.video).await?;
    info!(
        run_id = %report.run_id,
        summary = %report.summary_path.display(),
        frames = report.frames,
        described = report.described,
        summary_attempts = report.summary_attempts,
        unit_retained = report.unit_retained,
        "Summary written"
    );
    println!("{}", report.summary_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_whisper_uses_request_timeout() {
        std::env::set_var("TRANSCRIBE_API_KEY", "test-key");
        let config = WorkerConfig {
            request_timeout: Duration::from_secs(42),
            ..WorkerConfig::default()
        };
        let stt = whisper_config(&config).unwrap();
        assert_eq!(stt.timeout, Duration::from_secs(42));
        std::env::remove_var("TRANSCRIBE_API_KEY");
    }

    #[test]
    fn test_cli_flags_override_config() {
        let cli = Cli::parse_from(["vsum", "clip.mp4", "--interval", "5", "--format", "txt", "--keep-work"]);
        let mut config = WorkerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.output_format, SummaryFormat::Text);
        assert!(config.keep_work);
    }
}
