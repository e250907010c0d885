use crate::models::OneRMFormula;

pub fn calculate_1rm(weight: f32, reps: u32, formula: OneRMFormula) -> f32 {
    match formula {
        OneRMFormula::Epley => weight * (1.0 + reps as f32 / 30.0),
        OneRMFormula::Brzycki => weight / (1.0278 - 0.0278 * reps as f32),
        OneRMFormula::Lombardi => weight * (reps as f32).powf(0.10),
        OneRMFormula::OConner => weight * (1.0 + 0.025 * reps as f32),
    }
}

pub fn format_duration(duration: chrono::Duration) -> String {
    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;
    let seconds = duration.num_seconds() % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// `mm:ss` under an hour, `hh:mm:ss` otherwise.
pub fn format_seconds(total: u64) -> String {
    if total < 3600 {
        format!("{:02}:{:02}", total / 60, total % 60)
    } else {
        format_duration(chrono::Duration::seconds(total as i64))
    }
}

/// Parses `"bw"` (bodyweight) or a number of kilograms.
pub fn parse_weight(raw: &str) -> Option<Option<f32>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("bw") {
        return Some(None);
    }
    raw.trim_end_matches("kg")
        .parse::<f32>()
        .ok()
        .filter(|w| w.is_finite() && *w >= 0.0)
        .map(Some)
}

pub fn format_weight(weight: Option<f32>) -> String {
    match weight {
        Some(w) => format!("{}kg", w),
        None => "bw".to_string(),
    }
}

/// Filled/empty bar of `width` cells for a 0.0..=1.0 fraction.
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = (fraction * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}
