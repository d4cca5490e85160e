use clap::ValueEnum;
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
}

/// One source record as shown by `list`: its ID, the value mapping tables
/// are keyed by, and a short description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedRecord {
    pub id: u64,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ListedRecord {
    pub fn new(id: u64, value: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            id,
            value: value.into(),
            detail,
        }
    }
}

pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let truncated: String = text.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

pub fn print_records(records: &[ListedRecord], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(records)?),
        Format::Pretty => {
            println!("{:>6} {:24} DETAIL", "ID", "VALUE");
            println!("{}", "-".repeat(50));
            for record in records {
                println!(
                    "{:>6} {:24} {}",
                    record.id,
                    truncate(&record.value, 24),
                    record.detail.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_values() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-login-name", 10), "a-very-...");
    }

    #[test]
    fn records_omit_missing_detail() {
        let json = serde_json::to_string(&ListedRecord::new(3, "alice", None)).unwrap();
        assert_eq!(json, r#"{"id":3,"value":"alice"}"#);
    }
}
