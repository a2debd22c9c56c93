use crate::domain::models::TagStat;
use serde::Serialize;

/// Slice colors cycle through this palette by tag position, so a tag keeps
/// its color as long as the server returns statistics in a stable order.
const TAG_PALETTE: [&str; 8] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#e67e22", "#34495e",
];

pub const DEFAULT_DAILY_TARGET: u32 = 11;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TagSlice {
    pub tag: String,
    pub count: u32,
    pub fraction: f64,
    pub color: String,
}

/// Zero-padded `MM:SS` countdown display.
pub fn format_countdown(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Fraction of the current phase already elapsed, clamped to [0, 1].
pub fn progress_fraction(seconds_remaining: u32, reference_duration: u32) -> f64 {
    if reference_duration == 0 {
        return 1.0;
    }
    let fraction = 1.0 - f64::from(seconds_remaining) / f64::from(reference_duration);
    fraction.clamp(0.0, 1.0)
}

/// Completed-today progress against the configured daily target.
pub fn daily_progress(completed_today: u32, daily_target: u32) -> f64 {
    let target = daily_target.max(1);
    (f64::from(completed_today) / f64::from(target)).min(1.0)
}

/// Proportional pie slices with deterministic palette colors.
pub fn tag_distribution(stats: &[TagStat]) -> Vec<TagSlice> {
    let total: u64 = stats.iter().map(|stat| u64::from(stat.count)).sum();
    stats
        .iter()
        .enumerate()
        .map(|(index, stat)| TagSlice {
            tag: stat.tag.clone(),
            count: stat.count,
            fraction: if total == 0 {
                0.0
            } else {
                stat.count as f64 / total as f64
            },
            color: TAG_PALETTE[index % TAG_PALETTE.len()].to_string(),
        })
        .collect()
}
