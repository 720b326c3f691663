//! Formatting utilities for log lines and display surfaces.

/// Text shown once a guest window has run out.
pub const EXPIRED_LABEL: &str = "Expirado";

/// Truncates an identifier for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer ids.
pub fn truncate_id(id: &str) -> String {
	if id.chars().count() <= 8 {
		id.to_string()
	} else {
		format!("{}..", id.chars().take(8).collect::<String>())
	}
}

/// Renders a duration as a single coarse unit: `"Xm"`, `"Xh"` or `"Xd"`.
pub fn format_coarse_duration(secs: u64) -> String {
	let minutes = secs / 60;
	if minutes < 60 {
		format!("{}m", minutes)
	} else if minutes < 24 * 60 {
		format!("{}h", minutes / 60)
	} else {
		format!("{}d", minutes / (24 * 60))
	}
}

/// Renders time left in a guest window.
///
/// `"1h 30m"` when at least an hour remains, `"45m"` below that, and
/// [`EXPIRED_LABEL`] at zero. Partial minutes are dropped.
pub fn format_remaining(secs: u64) -> String {
	if secs == 0 {
		return EXPIRED_LABEL.to_string();
	}
	let hours = secs / 3600;
	let minutes = (secs % 3600) / 60;
	if hours > 0 {
		format!("{}h {}m", hours, minutes)
	} else {
		format!("{}m", minutes)
	}
}
