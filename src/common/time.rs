//! Clock helpers shared by logging and artifact metadata.

use std::time::Instant;

use chrono::{Local, Utc};

/// Log file name for a run started now, e.g. `10_18_2026_19_06_00.log`.
pub fn log_file_name() -> String {
    Local::now().format("%m_%d_%Y_%H_%M_%S.log").to_string()
}

/// Current UTC time in RFC 3339 form.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_name_shape() {
        let name = log_file_name();
        assert_eq!(name.len(), "10_18_2026_19_06_00.log".len());
        assert!(name.ends_with(".log"));
        assert_eq!(name.matches('_').count(), 5);
    }

    #[test]
    fn timestamp_parses_back() {
        assert!(chrono::DateTime::parse_from_rfc3339(&timestamp()).is_ok());
    }
}
