//! Page index.
//!
//! SQLite mapping from origin source paths to destination page IDs, with
//! content fingerprints recorded by the scanner. Schema creation is
//! idempotent; there are no versioned migrations.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS pages (
    source_path TEXT PRIMARY KEY,
    page_id TEXT,
    content_hash TEXT,
    scanned_at_unix INTEGER
);";

#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub source_path: String,
    pub page_id: Option<String>,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub total: usize,
    pub mapped: usize,
}

pub struct PageIndex {
    connection: Connection,
}

impl PageIndex {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL journal mode")?;
        connection
            .execute_batch(SCHEMA)
            .context("failed to create pages table")?;
        Ok(Self { connection })
    }

    /// Record a scanned origin file, keeping any existing page mapping.
    pub fn record_source(&self, source_path: &str, content_hash: &str, scanned_at: u64) -> Result<()> {
        self.connection
            .execute(
                "INSERT INTO pages (source_path, content_hash, scanned_at_unix)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(source_path) DO UPDATE SET
                     content_hash = excluded.content_hash,
                     scanned_at_unix = excluded.scanned_at_unix",
                params![
                    source_path,
                    content_hash,
                    i64::try_from(scanned_at).context("scan timestamp does not fit into i64")?
                ],
            )
            .with_context(|| format!("failed to record {source_path}"))?;
        Ok(())
    }

    /// Map one source path to a destination page ID.
    pub fn set_page_id(&self, source_path: &str, page_id: &str) -> Result<()> {
        self.connection
            .execute(
                "INSERT INTO pages (source_path, page_id) VALUES (?1, ?2)
                 ON CONFLICT(source_path) DO UPDATE SET page_id = excluded.page_id",
                params![source_path, page_id],
            )
            .with_context(|| format!("failed to map {source_path}"))?;
        Ok(())
    }

    /// Import source-path to page-ID mappings from a two-column CSV with a
    /// `source_path,page_id` header. Returns the number of rows imported.
    pub fn import_mappings(&self, csv_path: &Path) -> Result<usize> {
        let content = fs::read_to_string(csv_path)
            .with_context(|| format!("failed to read {}", csv_path.display()))?;
        let mut imported = 0usize;
        for line in content.lines().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((source_path, page_id)) = line.split_once(',') else {
                continue;
            };
            let source_path = source_path.trim();
            let page_id = page_id.trim();
            if source_path.is_empty() || page_id.is_empty() {
                continue;
            }
            self.set_page_id(source_path, page_id)?;
            imported += 1;
        }
        Ok(imported)
    }

    pub fn page_id(&self, source_path: &str) -> Result<Option<String>> {
        self.connection
            .query_row(
                "SELECT page_id FROM pages WHERE source_path = ?1",
                params![source_path],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .with_context(|| format!("failed to look up {source_path}"))
            .map(Option::flatten)
    }

    /// All indexed pages, ordered by source path, optionally filtered by a
    /// path prefix.
    pub fn pages(&self, prefix: Option<&str>) -> Result<Vec<PageRecord>> {
        let mut statement = match prefix {
            Some(_) => self.connection.prepare(
                "SELECT source_path, page_id, content_hash FROM pages
                 WHERE source_path LIKE ?1 ORDER BY source_path",
            ),
            None => self.connection.prepare(
                "SELECT source_path, page_id, content_hash FROM pages ORDER BY source_path",
            ),
        }
        .context("failed to prepare pages query")?;

        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(PageRecord {
                source_path: row.get(0)?,
                page_id: row.get(1)?,
                content_hash: row.get(2)?,
            })
        };
        let rows = match prefix {
            Some(prefix) => statement.query_map(params![format!("{prefix}%")], map_row),
            None => statement.query_map([], map_row),
        }
        .context("failed to query pages")?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.context("failed to read page row")?);
        }
        Ok(records)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let total: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
            .context("failed to count pages")?;
        let mapped: i64 = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM pages WHERE page_id IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .context("failed to count mapped pages")?;
        Ok(IndexStats {
            total: total as usize,
            mapped: mapped as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::PageIndex;

    fn open_index(temp: &tempfile::TempDir) -> PageIndex {
        PageIndex::open(&temp.path().join("state/migration.db")).expect("open index")
    }

    #[test]
    fn record_and_map_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let index = open_index(&temp);

        index
            .record_source("about/index.xml", "hash-1", 1_700_000_000)
            .expect("record");
        assert_eq!(index.page_id("about/index.xml").expect("lookup"), None);

        index
            .set_page_id("about/index.xml", "p-100")
            .expect("map");
        assert_eq!(
            index.page_id("about/index.xml").expect("lookup").as_deref(),
            Some("p-100")
        );

        // Rescanning keeps the mapping.
        index
            .record_source("about/index.xml", "hash-2", 1_700_000_100)
            .expect("rescan");
        assert_eq!(
            index.page_id("about/index.xml").expect("lookup").as_deref(),
            Some("p-100")
        );
    }

    #[test]
    fn pages_filter_by_prefix_and_stay_ordered() {
        let temp = tempfile::tempdir().expect("tempdir");
        let index = open_index(&temp);
        for path in ["news/b.xml", "about/a.xml", "about/z.xml"] {
            index.record_source(path, "h", 0).expect("record");
        }
        let all = index.pages(None).expect("pages");
        assert_eq!(
            all.iter().map(|record| record.source_path.as_str()).collect::<Vec<_>>(),
            vec!["about/a.xml", "about/z.xml", "news/b.xml"]
        );
        let about = index.pages(Some("about/")).expect("pages");
        assert_eq!(about.len(), 2);
    }

    #[test]
    fn import_mappings_reads_csv() {
        let temp = tempfile::tempdir().expect("tempdir");
        let index = open_index(&temp);
        let csv = temp.path().join("pages.csv");
        fs::write(
            &csv,
            "source_path,page_id\nabout/index.xml,p-1\nnews/a.xml,p-2\n,skipped\n",
        )
        .expect("write csv");

        let imported = index.import_mappings(&csv).expect("import");
        assert_eq!(imported, 2);
        assert_eq!(index.page_id("news/a.xml").expect("lookup").as_deref(), Some("p-2"));
        let stats = index.stats().expect("stats");
        assert_eq!(stats.total, 2);
        assert_eq!(stats.mapped, 2);
    }
}
