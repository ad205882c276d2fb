//! Typed environment lookups
//!
//! Configuration loaders read everything through these helpers so that an
//! unset or unparseable variable falls back to its default in one place.

use std::str::FromStr;

/// Read `key` and parse it, falling back to `default` when unset or unparseable
pub fn var_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read `key` as a string, falling back to `default` when unset
pub fn string_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read `key` as a comma separated list
///
/// Entries are trimmed and empty entries dropped, so `""` yields an empty
/// list while an unset variable yields `default`.
pub fn list_or(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => split_list(&raw),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Split a comma separated value into trimmed, non-empty entries
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_var_or_falls_back_on_garbage() {
        std::env::set_var("SEFT_COMMON_TEST_NUM", "not-a-number");
        assert_eq!(var_or("SEFT_COMMON_TEST_NUM", 7u32), 7);

        std::env::set_var("SEFT_COMMON_TEST_NUM", " 42 ");
        assert_eq!(var_or("SEFT_COMMON_TEST_NUM", 7u32), 42);

        std::env::remove_var("SEFT_COMMON_TEST_NUM");
        assert_eq!(var_or("SEFT_COMMON_TEST_NUM", 7u32), 7);
    }

    #[test]
    #[serial]
    fn test_list_or_distinguishes_empty_from_unset() {
        std::env::remove_var("SEFT_COMMON_TEST_LIST");
        assert_eq!(list_or("SEFT_COMMON_TEST_LIST", &[".xlsx"]), vec![".xlsx"]);

        std::env::set_var("SEFT_COMMON_TEST_LIST", "");
        assert!(list_or("SEFT_COMMON_TEST_LIST", &[".xlsx"]).is_empty());

        std::env::remove_var("SEFT_COMMON_TEST_LIST");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" .xlsx, .csv ,,"), vec![".xlsx", ".csv"]);
        assert!(split_list("  ").is_empty());
    }
}
