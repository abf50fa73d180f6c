//! Track boundary arithmetic

use super::Duration;

/// Delay after capture start at which a track's recording should be cut.
///
/// The cut happens `lead` before the reported track length so the first
/// samples of the following track never end up in the file. Lengths shorter
/// than the lead (or negative lengths from misbehaving players) clamp to zero.
pub fn boundary_delay(length_micros: i64, lead: Duration) -> Duration {
    let length_ms = length_micros.max(0) / 1000;
    let lead_ms = i64::try_from(lead.as_millis()).unwrap_or(i64::MAX);
    let delay = length_ms.saturating_sub(lead_ms).max(0);
    Duration::from_millis(delay as u64)
}
