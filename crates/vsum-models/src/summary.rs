//! Validated video summaries and their rendered documents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 120;
/// Minimum description length in characters.
pub const MIN_DESCRIPTION_CHARS: usize = 40;
/// Maximum description length in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Fixed note attached to every rendered summary.
pub const ADVISORY_NOTE: &str =
    "Note: this summary was generated automatically by an AI model and may be inaccurate.";

/// Final `{title, description}` pair for one video.
///
/// Construction through [`Summary::new`] guarantees a non-empty title and a
/// description of at least [`MIN_DESCRIPTION_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub title: String,
    pub description: String,
}

impl Summary {
    /// Validate and normalize a raw title/description pair.
    ///
    /// Whitespace runs collapse to single spaces (the description is a single
    /// paragraph), Markdown heading markers are stripped from the title and
    /// over-long fields are truncated on a character boundary.
    pub fn new(title: &str, description: &str) -> ModelResult<Self> {
        let title = collapse_spaces(title.trim().trim_start_matches('#'));
        if title.is_empty() {
            return Err(ModelError::invalid_summary("title is empty"));
        }

        let description = collapse_spaces(description);
        let desc_chars = description.chars().count();
        if desc_chars < MIN_DESCRIPTION_CHARS {
            return Err(ModelError::invalid_summary(format!(
                "description has {} characters, expected at least {}",
                desc_chars, MIN_DESCRIPTION_CHARS
            )));
        }

        Ok(Self {
            title: truncate_chars(&title, MAX_TITLE_CHARS),
            description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
        })
    }

    /// Re-check the invariants of a summary loaded from disk.
    pub fn revalidate(self) -> ModelResult<Self> {
        Self::new(&self.title, &self.description)
    }

    /// Render the summary document.
    pub fn render(&self, format: SummaryFormat) -> String {
        let doc = match format {
            SummaryFormat::Markdown => format!(
                "# {}\n\n> {}\n\n{}\n",
                self.title, ADVISORY_NOTE, self.description
            ),
            SummaryFormat::Text => format!(
                "{}\n\n{}\n\n{}\n",
                self.title, ADVISORY_NOTE, self.description
            ),
        };
        normalize_whitespace(&doc)
    }
}

/// Output document flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    #[default]
    Markdown,
    Text,
}

impl SummaryFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            SummaryFormat::Markdown => "md",
            SummaryFormat::Text => "txt",
        }
    }
}

impl fmt::Display for SummaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SummaryFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(SummaryFormat::Markdown),
            "txt" | "text" => Ok(SummaryFormat::Text),
            other => Err(format!("unknown output format '{}' (expected md or txt)", other)),
        }
    }
}

/// Normalize document whitespace.
///
/// Trailing spaces are trimmed from every line, runs of blank lines collapse
/// to one, leading and trailing blank lines are dropped, and the result ends
/// with exactly one newline.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    let mut pending_blank = false;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.push('\n');
            pending_blank = false;
        }
        out.push_str(line);
        out.push('\n');
    }

    if out.is_empty() {
        out.push('\n');
    }
    out
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => s[..byte_idx].trim_end().to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESC: &str = "A person walks a dog along a beach at sunset while waves roll in.";

    #[test]
    fn test_new_rejects_empty_title() {
        assert!(Summary::new("   ", DESC).is_err());
        assert!(Summary::new("##", DESC).is_err());
    }

    #[test]
    fn test_new_rejects_short_description() {
        let err = Summary::new("Beach walk", "Too short.").unwrap_err();
        assert!(err.to_string().contains("at least 40"));
    }

    #[test]
    fn test_new_flattens_description_to_one_paragraph() {
        let summary = Summary::new("# Beach walk", "A person walks a dog\n\nalong a beach   at sunset today.").unwrap();
        assert_eq!(summary.title, "Beach walk");
        assert_eq!(summary.description, "A person walks a dog along a beach at sunset today.");
    }

    #[test]
    fn test_new_truncates_long_title_on_char_boundary() {
        let title = "é".repeat(200);
        let summary = Summary::new(&title, DESC).unwrap();
        assert_eq!(summary.title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_render_markdown() {
        let summary = Summary::new("Beach walk", DESC).unwrap();
        let doc = summary.render(SummaryFormat::Markdown);
        assert!(doc.starts_with("# Beach walk\n\n> Note:"));
        assert!(doc.ends_with(&format!("{}\n", DESC)));
        assert!(!doc.ends_with("\n\n"));
    }

    #[test]
    fn test_render_text() {
        let summary = Summary::new("Beach walk", DESC).unwrap();
        let doc = summary.render(SummaryFormat::Text);
        assert!(doc.starts_with("Beach walk\n\nNote:"));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("a  \n\n\n\nb\t\n\n"), "a\n\nb\n");
        assert_eq!(normalize_whitespace("\n\n  \nx"), "x\n");
        assert_eq!(normalize_whitespace(""), "\n");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("md".parse::<SummaryFormat>().unwrap(), SummaryFormat::Markdown);
        assert_eq!("TXT".parse::<SummaryFormat>().unwrap(), SummaryFormat::Text);
        assert!("pdf".parse::<SummaryFormat>().is_err());
        assert_eq!(SummaryFormat::Text.extension(), "txt");
    }
}
