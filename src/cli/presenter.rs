//! CLI presenter for output formatting

use std::io::{self, BufRead, Write};

use colored::*;

use crate::application::FinishedTrack;
use crate::domain::track::TrackMetadata;

/// Presenter for CLI output formatting
pub struct Presenter;

impl Presenter {
    pub fn new() -> Self {
        Self
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Numbered list of sinks for the sink prompt
    pub fn sink_list(&self, sinks: &[String]) {
        for (index, sink) in sinks.iter().enumerate() {
            eprintln!("  {} {}", format!("[{}]", index).cyan(), sink);
        }
    }

    pub fn recording(&self, metadata: &TrackMetadata) {
        eprintln!("{} {}", "●".red(), format_recording(metadata));
    }

    pub fn saved(&self, track: &FinishedTrack) {
        if track.tagged {
            self.success(&format_saved(track));
        } else {
            self.warn(&format_saved(track));
        }
    }

    pub fn discarded(&self, metadata: &TrackMetadata) {
        eprintln!("{} Discarded {}", "○".dimmed(), metadata);
    }

    /// Ask a question on stderr and read one line from stdin.
    ///
    /// End of input counts as an empty answer.
    pub fn prompt(&self, question: &str) -> io::Result<String> {
        eprint!("{} {} ", "?".cyan(), question);
        io::stderr().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim().to_string())
    }

    /// Yes/no question, defaulting to no
    pub fn confirm(&self, question: &str) -> io::Result<bool> {
        let answer = self.prompt(&format!("{} [y/N]", question))?;
        Ok(is_yes(&answer))
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_recording(metadata: &TrackMetadata) -> String {
    if metadata.album().is_empty() {
        format!("Recording {}", metadata)
    } else {
        format!("Recording {} ({})", metadata, metadata.album())
    }
}

pub fn format_saved(track: &FinishedTrack) -> String {
    let suffix = if track.tagged { "" } else { " (untagged)" };
    format!(
        "Saved {} - {} to {}{}",
        track.artist,
        track.title,
        track.path.display(),
        suffix
    )
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
