const UNIT_LABELS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
const UNIT_BASE: f64 = 1024.0;

/// Renders a byte count with base-1024 units, at most two decimals.
///
/// `format_size(1536) == "1.5 KB"`. Sizes past the gigabyte range stay in GB.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= UNIT_BASE && unit < UNIT_LABELS.len() - 1 {
        value /= UNIT_BASE;
        unit += 1;
    }

    let value_text = format!("{value:.2}");
    let compact_value = value_text.trim_end_matches('0').trim_end_matches('.');
    format!("{compact_value} {}", UNIT_LABELS[unit])
}
