//! Emitting a finished history.

use crate::error::Result;
use crate::types::History;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// JSON layout used when printing a history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Single line, suitable for piping into other tools.
    #[default]
    Compact,
    Pretty,
}

/// Serialize `history` to `out`, followed by a newline.
pub fn write_history(out: &mut dyn Write, history: &History, format: ReportFormat) -> Result<()> {
    let json = match format {
        ReportFormat::Compact => history.to_json()?,
        ReportFormat::Pretty => history.to_json_pretty()?,
    };
    writeln!(out, "{json}")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TrainMetrics, TrainRequest};

    fn history() -> History {
        History {
            id: "net-7".to_string(),
            task: TrainRequest::new("lenet", "mnist"),
            data: TrainMetrics {
                accuracy: vec![88.0],
                ..TrainMetrics::default()
            },
            extra: Default::default(),
        }
    }

    #[test]
    fn test_compact_is_one_line() {
        let mut buf = Vec::new();
        write_history(&mut buf, &history(), ReportFormat::Compact).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("{\"id\":\"net-7\""));
        assert_eq!(History::from_json(text.trim()).unwrap(), history());
    }

    #[test]
    fn test_pretty_parses_back() {
        let mut buf = Vec::new();
        write_history(&mut buf, &history(), ReportFormat::Pretty).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.lines().count() > 1);
        assert_eq!(History::from_json(&text).unwrap(), history());
    }
}
