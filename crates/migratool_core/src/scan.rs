//! Export tree scanning.
//!
//! Walks the origin export directory, fingerprints every origin XML file
//! and records it in the page index. Destination side-files produced by
//! earlier tooling are skipped.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::db::PageIndex;

const ORIGIN_EXTENSION: &str = ".xml";
const DESTINATION_SUFFIX: &str = "-destination.xml";

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanReport {
    pub scanned: usize,
    pub recorded: usize,
}

pub fn scan_exports(export_dir: &Path, index: &PageIndex) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    let scanned_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0);

    for entry in WalkDir::new(export_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", export_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(ORIGIN_EXTENSION) || name.ends_with(DESTINATION_SUFFIX) {
            continue;
        }
        report.scanned += 1;

        let relative = entry
            .path()
            .strip_prefix(export_dir)
            .unwrap_or(entry.path());
        let source_path = relative.to_string_lossy().replace('\\', "/");
        let content = fs::read(entry.path())
            .with_context(|| format!("failed to read {}", entry.path().display()))?;
        let content_hash = hex_digest(&content);

        index.record_source(&source_path, &content_hash, scanned_at)?;
        report.recorded += 1;
    }
    Ok(report)
}

fn hex_digest(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::scan_exports;
    use crate::db::PageIndex;

    #[test]
    fn scan_records_origin_files_and_skips_destination_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let exports = temp.path().join("exports");
        fs::create_dir_all(exports.join("about")).expect("mkdir");
        fs::write(exports.join("about/index.xml"), "<calling-page/>").expect("write");
        fs::write(exports.join("about/index-destination.xml"), "<x/>").expect("write");
        fs::write(exports.join("notes.txt"), "not xml").expect("write");

        let index = PageIndex::open(&temp.path().join("db/migration.db")).expect("open");
        let report = scan_exports(&exports, &index).expect("scan");
        assert_eq!(report.scanned, 1);
        assert_eq!(report.recorded, 1);

        let pages = index.pages(None).expect("pages");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].source_path, "about/index.xml");
        assert_eq!(
            pages[0].content_hash.as_deref().map(str::len),
            Some(64)
        );
    }

    #[test]
    fn rescan_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let exports = temp.path().join("exports");
        fs::create_dir_all(&exports).expect("mkdir");
        fs::write(exports.join("a.xml"), "<calling-page/>").expect("write");

        let index = PageIndex::open(&temp.path().join("db/migration.db")).expect("open");
        scan_exports(&exports, &index).expect("first scan");
        scan_exports(&exports, &index).expect("second scan");
        assert_eq!(index.pages(None).expect("pages").len(), 1);
    }
}
