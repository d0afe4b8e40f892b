//! Version information stamped on every journal record

/// Compile-time version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Journal record schema; bump when a record layout changes incompatibly
pub const JOURNAL_SCHEMA: u32 = 1;

/// Version string written into the `version` field of journal records
pub fn record_version() -> String {
    format!("{}+j{}", VERSION, JOURNAL_SCHEMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_version_carries_schema() {
        let v = record_version();
        assert!(v.starts_with(VERSION));
        assert!(v.ends_with("+j1"));
    }
}
