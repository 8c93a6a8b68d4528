//! Output file schema shared by the series writer and reader.

/// Field name → display column, in file column order.
///
/// Backtesting consumers expect the capitalized labels.
pub const COLUMN_LABELS: [(&str, &str); 6] = [
    ("timestamp", "Timestamp"),
    ("open", "Open"),
    ("high", "High"),
    ("low", "Low"),
    ("close", "Close"),
    ("volume", "Volume"),
];

/// Rendering of the Timestamp column (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default file-name timestamp (local write time).
pub const DEFAULT_FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The header row, `Timestamp,Open,High,Low,Close,Volume`.
pub fn header() -> [&'static str; 6] {
    COLUMN_LABELS.map(|(_, label)| label)
}

/// True if `format` is a usable file-name timestamp: every strftime specifier is
/// known and the rendered text contains no path separators.
pub fn is_valid_filename_timestamp_format(format: &str) -> bool {
    use chrono::format::{Item, StrftimeItems};
    use std::fmt::Write;

    if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return false;
    }
    let mut rendered = String::new();
    let sample = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH.format(format);
    if write!(rendered, "{sample}").is_err() {
        return false;
    }
    !rendered.contains(['/', '\\', ':'])
}
