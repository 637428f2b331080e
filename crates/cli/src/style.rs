//! Terminal styling for CLI output.

use console::Style;

/// Green checkmark followed by `msg`.
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Red cross followed by `msg`.
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Yellow warning sign followed by `msg`.
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Bold section heading.
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

/// Dimmed secondary text.
pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}
