//! ANSI color helpers for terminal output

use colored::Colorize;
use explore_core::byte_index;

/// Get colored header
pub fn header(text: &str) -> String {
    text.bold().underline().to_string()
}

/// Get colored label
pub fn label(text: &str) -> String {
    text.white().dimmed().to_string()
}

/// Get colored value
pub fn value(text: &str) -> String {
    text.white().to_string()
}

/// Get colored success message
pub fn success(text: &str) -> String {
    format!("{} {}", "✓".green(), text)
}

/// Get colored warning message
pub fn warning(text: &str) -> String {
    format!("{} {}", "⚠".yellow(), text)
}

/// Get colored error message
pub fn error(text: &str) -> String {
    format!("{} {}", "✗".red(), text)
}

/// Episode heading: source, title and date
pub fn episode(source: &str, title: &str, date: Option<&str>) -> String {
    match date {
        Some(date) => format!("{} {} {}", source.cyan().bold(), title.bold(), date.white().dimmed()),
        None => format!("{} {}", source.cyan().bold(), title.bold()),
    }
}

/// Time range of a segment, dimmed
pub fn time_range(start: f64, end: f64) -> String {
    format!("[{} - {}]", format_timestamp(start), format_timestamp(end))
        .white()
        .dimmed()
        .to_string()
}

/// Segment text with `len` characters from `start` highlighted
pub fn highlight(text: &str, start: usize, len: usize) -> String {
    let (from, to) = span_bytes(text, start, len);
    if from == to {
        return text.to_string();
    }
    format!("{}{}{}", &text[..from], text[from..to].black().on_yellow(), &text[to..])
}

/// Byte range of a character span, clamped to the text
fn span_bytes(text: &str, start: usize, len: usize) -> (usize, usize) {
    let from = byte_index(text, start);
    let to = byte_index(text, start.saturating_add(len));
    (from, to)
}

/// Seconds as `h:mm:ss` or `m:ss`
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Format size in human-readable form
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{:.0} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.1} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format count with comma separators
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
