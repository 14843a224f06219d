//! Output formatting shared by the CLI commands

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default maximum length for file paths in tables
pub const DEFAULT_PATH_MAX_LEN: usize = 48;

/// Unified output format for all growbox commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON (single line per object)
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one JSON object per line, for streaming)
    JsonLine,
    /// Pipe-separated values with header
    Psv,
}

impl OutputFormat {
    /// Check if this is a JSON variant
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty | Self::JsonLine)
    }

    /// Check if this is a table variant
    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table | Self::Markdown)
    }

    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &[
            "table",
            "markdown",
            "json",
            "json-pretty",
            "json-line",
            "psv",
        ]
    }

    /// Serialize a list of records in a JSON variant
    ///
    /// `json-line` writes one record per line; the other variants write an array.
    pub fn format_json_list<T: Serialize>(&self, items: &[T]) -> anyhow::Result<String> {
        match self {
            Self::JsonLine => items
                .iter()
                .map(|item| serde_json::to_string(item).map_err(anyhow::Error::from))
                .collect::<anyhow::Result<Vec<_>>>()
                .map(|lines| lines.join("\n")),
            Self::JsonPretty => Ok(serde_json::to_string_pretty(items)?),
            _ => Ok(serde_json::to_string(items)?),
        }
    }

    /// Serialize a single record in a JSON variant
    pub fn format_json_value<T: Serialize>(&self, item: &T) -> anyhow::Result<String> {
        match self {
            Self::JsonPretty => Ok(serde_json::to_string_pretty(item)?),
            _ => Ok(serde_json::to_string(item)?),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
            Self::Psv => write!(f, "psv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            "psv" | "pipe" => Ok(Self::Psv),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Render rows as a table, markdown table or PSV
#[cfg(feature = "display")]
pub fn format_rows<T: tabled::Tabled>(rows: &[T], format: OutputFormat) -> String {
    use tabled::settings::Style;

    match format {
        OutputFormat::Markdown => tabled::Table::new(rows).with(Style::markdown()).to_string(),
        OutputFormat::Psv => {
            let mut lines = vec![T::headers().join("|")];
            lines.extend(rows.iter().map(|row| row.fields().join("|")));
            lines.join("\n")
        }
        _ => tabled::Table::new(rows).with(Style::rounded()).to_string(),
    }
}

/// Render an optional value for a table cell
pub fn display_option<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

/// Truncate a string to the specified length, adding "..." if truncated
///
/// # Examples
///
/// ```
/// use growbox::utils::truncate_name;
///
/// assert_eq!(truncate_name("/img/a.jpg", 20), "/img/a.jpg");
/// assert_eq!(truncate_name("/var/lib/growbox/images/capture.jpg", 20), "/var/lib/growbox/...");
/// ```
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        name.to_string()
    } else {
        let truncated: String = name.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_round_trip_names() {
        for name in OutputFormat::all_names() {
            let format: OutputFormat = name.parse().unwrap();
            assert_eq!(format.to_string(), *name);
        }
        assert_eq!("md".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_json_line_list() {
        let out = OutputFormat::JsonLine
            .format_json_list(&[serde_json::json!({"id": 1}), serde_json::json!({"id": 2})])
            .unwrap();
        assert_eq!(out, "{\"id\":1}\n{\"id\":2}");

        let out = OutputFormat::Json
            .format_json_list(&[serde_json::json!({"id": 1})])
            .unwrap();
        assert_eq!(out, "[{\"id\":1}]");
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short", 20), "short");
        assert_eq!(truncate_name("12345678901234567890", 20), "12345678901234567890");
        assert_eq!(truncate_name("123456789012345678901", 20), "12345678901234567...");
        assert_eq!(truncate_name("", 20), "");
    }

    #[test]
    fn test_display_option() {
        assert_eq!(display_option(&Some(0.5)), "0.5");
        assert_eq!(display_option::<f64>(&None), "-");
    }

    #[cfg(feature = "display")]
    #[test]
    fn test_psv_rows() {
        #[derive(tabled::Tabled)]
        struct Row {
            id: i64,
            path: String,
        }

        let rows = vec![Row {
            id: 1,
            path: "/img/a.jpg".to_string(),
        }];
        assert_eq!(format_rows(&rows, OutputFormat::Psv), "id|path\n1|/img/a.jpg");
    }
}
