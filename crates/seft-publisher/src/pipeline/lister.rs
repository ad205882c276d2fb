//! Lister stage
//!
//! Runs once per cycle on its own session, which is closed as soon as the
//! listing is in hand. A failed listing aborts the cycle.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::FtpConfig;
use crate::error::TransferResult;
use crate::remote::{FileMeta, SessionFactory};

/// List the remote working directory and return the names to transfer
pub async fn list_files(factory: &SessionFactory, ftp: &FtpConfig) -> TransferResult<Vec<String>> {
    let mut session = factory.acquire().await?;
    let listing = session.list().await;
    session.close().await;

    let entries = listing?;
    let total = entries.len();
    let names = select(entries, ftp);

    info!(listed = total, selected = names.len(), "Remote directory listed");
    Ok(names)
}

/// Keep regular files passing the suffix filter, in listing order, once each
fn select(entries: Vec<FileMeta>, ftp: &FtpConfig) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            if entry.is_directory {
                debug!(name = %entry.name, "Skipping directory");
                return false;
            }
            if !ftp.accepts(&entry.name) {
                debug!(file = %entry.name, "Skipping file with unaccepted suffix");
                return false;
            }
            true
        })
        .map(|entry| entry.name)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_select_filters_and_keeps_order() {
        let mut directory = FileMeta::file("archive.xlsx");
        directory.is_directory = true;

        let entries = vec![
            FileMeta::file("b.xlsx"),
            FileMeta::file("notes.txt"),
            directory,
            FileMeta::file("A.XLSX"),
            FileMeta::file("b.xlsx"),
        ];

        let names = select(entries, &FtpConfig::default());
        assert_eq!(names, vec!["b.xlsx", "A.XLSX"]);
    }

    #[test]
    fn test_select_without_suffix_filter() {
        let ftp = FtpConfig {
            file_suffixes: Vec::new(),
            ..FtpConfig::default()
        };
        let names = select(vec![FileMeta::file("notes.txt")], &ftp);
        assert_eq!(names, vec!["notes.txt"]);
    }
}
