//! FFmpeg CLI wrapper for the vsum pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Timeout and cancellation support via tokio
//! - FFprobe stream inspection (duration, audio presence)
//! - Scaled still-frame extraction and mono waveform extraction
//! - The [`MediaToolkit`] seam the worker extracts through

pub mod audio;
pub mod command;
pub mod error;
pub mod frames;
pub mod probe;
pub mod toolkit;

pub use audio::{extract_audio, is_usable_waveform, AUDIO_SAMPLE_RATE};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{extract_frame, seek_position, DEFAULT_FRAME_MAX_WIDTH};
pub use probe::{probe_video, VideoInfo};
pub use toolkit::{FfmpegToolkit, MediaToolkit};
