//! Duration value object

use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use crate::domain::error::DurationParseError;

/// Default wait after a pause before in-flight recordings are discarded
pub const DEFAULT_PAUSE_GRACE_MS: u64 = 10_000;

/// Default delay between a track change and launching the capture
pub const DEFAULT_SKIP_SETTLE_MS: u64 = 1_000;

/// Default head start of the boundary stop before the track's nominal end
pub const DEFAULT_BOUNDARY_LEAD_MS: u64 = 750;

/// Default upper bound for the encoder to flush after capture stops
pub const DEFAULT_ENCODE_TIMEOUT_MS: u64 = 60_000;

/// Value object representing a time duration with millisecond precision.
/// Immutable and validated on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    milliseconds: u64,
}

impl Duration {
    /// Create a Duration from milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self { milliseconds: ms }
    }

    /// Create a Duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            milliseconds: secs * 1000,
        }
    }

    /// Zero-length duration
    pub const fn zero() -> Self {
        Self { milliseconds: 0 }
    }

    pub const fn default_pause_grace() -> Self {
        Self::from_millis(DEFAULT_PAUSE_GRACE_MS)
    }

    pub const fn default_skip_settle() -> Self {
        Self::from_millis(DEFAULT_SKIP_SETTLE_MS)
    }

    pub const fn default_boundary_lead() -> Self {
        Self::from_millis(DEFAULT_BOUNDARY_LEAD_MS)
    }

    pub const fn default_encode_timeout() -> Self {
        Self::from_millis(DEFAULT_ENCODE_TIMEOUT_MS)
    }

    /// Get duration in whole seconds
    pub const fn as_secs(&self) -> u64 {
        self.milliseconds / 1000
    }

    /// Get duration in milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.milliseconds
    }

    /// Convert to std::time::Duration
    pub const fn as_std(&self) -> StdDuration {
        StdDuration::from_millis(self.milliseconds)
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    /// Parse a duration string into a Duration value object.
    /// Supported formats: "750ms", "30s", "1m", "2m30s", "0s"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim().to_lowercase();
        let invalid = || DurationParseError {
            input: s.to_string(),
        };

        if let Some(ms) = input.strip_suffix("ms") {
            if ms.is_empty() || !ms.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            let milliseconds = ms.parse().map_err(|_| invalid())?;
            return Ok(Self { milliseconds });
        }

        let mut minutes: u64 = 0;
        let mut seconds: u64 = 0;
        let mut current_num = String::new();
        let mut found_any = false;

        for ch in input.chars() {
            if ch.is_ascii_digit() {
                current_num.push(ch);
            } else if ch == 'm' && !current_num.is_empty() && !found_any {
                minutes = current_num.parse().map_err(|_| invalid())?;
                current_num.clear();
                found_any = true;
            } else if ch == 's' && !current_num.is_empty() {
                seconds = current_num.parse().map_err(|_| invalid())?;
                current_num.clear();
                found_any = true;
            } else {
                return Err(invalid());
            }
        }

        if !current_num.is_empty() || !found_any {
            return Err(invalid());
        }

        Ok(Self {
            milliseconds: (minutes * 60 + seconds) * 1000,
        })
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.milliseconds % 1000 != 0 {
            return write!(f, "{}ms", self.milliseconds);
        }

        let total_secs = self.as_secs();
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;

        if minutes == 0 {
            write!(f, "{}s", seconds)
        } else if seconds == 0 {
            write!(f, "{}m", minutes)
        } else {
            write!(f, "{}m{}s", minutes, seconds)
        }
    }
}

impl From<Duration> for StdDuration {
    fn from(d: Duration) -> Self {
        d.as_std()
    }
}
