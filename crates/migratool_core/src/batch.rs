//! Batch driver.
//!
//! Iterates indexed pages in order, migrating each one in isolation: a
//! failed page is recorded and the run continues. Supports prefix and
//! file-list filters, resume-after, an optional fixed delay between pages,
//! and a dry-run mode that renders a unified diff instead of writing.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use similar::TextDiff;

use crate::cms::{CmsClient, set_structured_nodes, structured_nodes};
use crate::db::{PageIndex, PageRecord};
use crate::dest::NewSection;
use crate::log::{LogStats, MigrationLog};
use crate::mappers::MapContext;
use crate::merge::{merge_into_live_document, set_group_child_text, set_top_level_text};
use crate::news::{map_news_body, news_headline, news_page_type};
use crate::origin::{OriginDocument, PageMetadata};
use crate::pipeline::migrate_document;

#[derive(Debug, Default, Clone)]
pub struct BatchOptions {
    pub section: Option<String>,
    pub pages_from: Option<PathBuf>,
    pub resume_after: Option<String>,
    pub dry_run: bool,
    pub rate_limit_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Success,
    Skipped,
    Failed,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageOutcome {
    pub source_path: String,
    pub status: PageStatus,
    pub message: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub last_success: Option<String>,
    pub outcomes: Vec<PageOutcome>,
}

/// Result of one page migration.
#[derive(Debug)]
pub struct PageResult {
    pub page_path: String,
    pub sections: usize,
    pub content_items: usize,
    pub log_stats: LogStats,
    pub diff: Option<String>,
}

pub fn run_batch(
    export_dir: &Path,
    index: &PageIndex,
    cms: &CmsClient,
    context: &MapContext<'_>,
    log_stream: &Path,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let records = index.pages(options.section.as_deref())?;
    let selected = select_pages(records, options)?;

    let mut report = BatchReport {
        total: selected.len(),
        ..BatchReport::default()
    };

    for record in &selected {
        let Some(page_id) = record.page_id.as_deref() else {
            report.skipped += 1;
            report.outcomes.push(PageOutcome {
                source_path: record.source_path.clone(),
                status: PageStatus::Skipped,
                message: Some("no destination page mapped".to_string()),
            });
            continue;
        };

        report.processed += 1;
        match migrate_page(
            export_dir,
            &record.source_path,
            page_id,
            cms,
            context,
            Some(log_stream),
            options.dry_run,
        ) {
            Ok(result) => {
                report.succeeded += 1;
                report.last_success = Some(record.source_path.clone());
                report.outcomes.push(PageOutcome {
                    source_path: record.source_path.clone(),
                    status: PageStatus::Success,
                    message: Some(format!(
                        "{} section(s), {} content item(s)",
                        result.sections, result.content_items
                    )),
                });
            }
            Err(error) => {
                report.failed += 1;
                report.outcomes.push(PageOutcome {
                    source_path: record.source_path.clone(),
                    status: PageStatus::Failed,
                    message: Some(format!("{error:#}")),
                });
            }
        }

        if options.rate_limit_ms > 0 && !options.dry_run {
            sleep(Duration::from_millis(options.rate_limit_ms));
        }
    }

    Ok(report)
}

/// Migrate one regioned page end to end: parse, transform, merge, write.
pub fn migrate_page(
    export_dir: &Path,
    source_path: &str,
    page_id: &str,
    cms: &CmsClient,
    context: &MapContext<'_>,
    log_stream: Option<&Path>,
    dry_run: bool,
) -> Result<PageResult> {
    let file = export_dir.join(source_path);
    let xml = fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let document = OriginDocument::parse(&xml)
        .with_context(|| format!("failed to parse {source_path}"))?;
    let page_path = page_path_for(&document.metadata(), source_path);
    let mut log = MigrationLog::new(&page_path, source_path);

    let migration = migrate_document(&document, context, &mut log);

    let mut page = cms
        .read_page(page_id)
        .with_context(|| format!("failed to read destination page {page_id}"))?;
    let current_nodes = structured_nodes(&page)?;
    let merged = merge_into_live_document(&current_nodes, &migration.sections, &log.render_summary())?;

    let diff = if dry_run {
        Some(render_diff(&current_nodes, &merged)?)
    } else {
        set_structured_nodes(&mut page, merged)?;
        cms.edit_page(page_id, &page)
            .with_context(|| format!("failed to write destination page {page_id}"))?;
        None
    };

    if let Some(stream) = log_stream {
        log.append_to_stream(stream)?;
    }

    Ok(PageResult {
        page_path,
        sections: migration.sections.len(),
        content_items: migration.content_items,
        log_stats: log.stats(),
        diff,
    })
}

/// Migrate one news article through the news body walker.
pub fn migrate_news_page(
    export_dir: &Path,
    source_path: &str,
    page_id: &str,
    cms: &CmsClient,
    context: &MapContext<'_>,
    log_stream: Option<&Path>,
    dry_run: bool,
) -> Result<PageResult> {
    let file = export_dir.join(source_path);
    let xml = fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let document = OriginDocument::parse(&xml)
        .with_context(|| format!("failed to parse {source_path}"))?;
    let page_path = page_path_for(&document.metadata(), source_path);
    let mut log = MigrationLog::new(&page_path, source_path);

    let content = document
        .page()
        .find("content")
        .context("news article has no content element")?;
    let items = map_news_body(content, context, &mut log);
    let content_items = items.len();

    let mut sections = Vec::new();
    if !items.is_empty() {
        let mut section = NewSection::new(None);
        section.items = items;
        sections.push(section);
        log.info(format!("Created 1 section with {content_items} content item(s)"));
    }

    let filename = source_path.rsplit('/').next().unwrap_or(source_path);
    let page_type = news_page_type(filename);
    let headline = news_headline(&document);

    let mut page = cms
        .read_page(page_id)
        .with_context(|| format!("failed to read destination page {page_id}"))?;
    let current_nodes = structured_nodes(&page)?;
    let mut merged =
        merge_into_live_document(&current_nodes, &sections, &log.render_summary())?;

    if set_top_level_text(&mut merged, "page-type", page_type) {
        log.info(format!("page-type = {page_type}"));
    }
    if let Some(headline) = &headline
        && set_group_child_text(&mut merged, "group-hero", "heading", headline)
    {
        log.info(format!("heading = {headline}"));
    }

    let diff = if dry_run {
        Some(render_diff(&current_nodes, &merged)?)
    } else {
        set_structured_nodes(&mut page, merged)?;
        cms.edit_page(page_id, &page)
            .with_context(|| format!("failed to write destination page {page_id}"))?;
        None
    };

    if let Some(stream) = log_stream {
        log.append_to_stream(stream)?;
    }

    Ok(PageResult {
        page_path,
        sections: sections.len(),
        content_items,
        log_stats: log.stats(),
        diff,
    })
}

/// Apply the pages-from and resume-after filters to the indexed records.
fn select_pages(records: Vec<PageRecord>, options: &BatchOptions) -> Result<Vec<PageRecord>> {
    let filter = match &options.pages_from {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let set = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect::<HashSet<_>>();
            Some(set)
        }
        None => None,
    };

    let mut selected = Vec::new();
    let mut resuming = options.resume_after.is_some();
    for record in records {
        if resuming {
            if Some(record.source_path.as_str()) == options.resume_after.as_deref() {
                resuming = false;
            }
            continue;
        }
        if let Some(filter) = &filter {
            let bare = record.source_path.trim_end_matches(".xml");
            if !filter.contains(&record.source_path) && !filter.contains(bare) {
                continue;
            }
        }
        selected.push(record);
    }
    Ok(selected)
}

fn page_path_for(metadata: &PageMetadata, source_path: &str) -> String {
    if let Some(path) = &metadata.path {
        return path.clone();
    }
    format!("/{}", source_path.trim_end_matches(".xml"))
}

fn render_diff(before: &[Value], after: &[Value]) -> Result<String> {
    let before = serde_json::to_string_pretty(&Value::Array(before.to_vec()))
        .context("failed to render live document")?;
    let after = serde_json::to_string_pretty(&Value::Array(after.to_vec()))
        .context("failed to render merged document")?;
    Ok(TextDiff::from_lines(before.as_str(), after.as_str())
        .unified_diff()
        .header("live", "merged")
        .to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::{BatchOptions, page_path_for, render_diff, select_pages};
    use crate::db::PageRecord;
    use crate::origin::PageMetadata;

    fn record(source_path: &str) -> PageRecord {
        PageRecord {
            source_path: source_path.to_string(),
            page_id: Some("p-1".to_string()),
            content_hash: None,
        }
    }

    #[test]
    fn resume_after_skips_up_to_and_including_the_marker() {
        let records = vec![record("a.xml"), record("b.xml"), record("c.xml")];
        let options = BatchOptions {
            resume_after: Some("b.xml".to_string()),
            ..BatchOptions::default()
        };
        let selected = select_pages(records, &options).expect("select");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].source_path, "c.xml");
    }

    #[test]
    fn pages_from_accepts_paths_with_and_without_extension() {
        let temp = tempfile::tempdir().expect("tempdir");
        let list = temp.path().join("pages.txt");
        fs::write(&list, "about/index\nnews/a.xml\n\n").expect("write list");

        let records = vec![
            record("about/index.xml"),
            record("news/a.xml"),
            record("news/b.xml"),
        ];
        let options = BatchOptions {
            pages_from: Some(list),
            ..BatchOptions::default()
        };
        let selected = select_pages(records, &options).expect("select");
        assert_eq!(
            selected
                .iter()
                .map(|record| record.source_path.as_str())
                .collect::<Vec<_>>(),
            vec!["about/index.xml", "news/a.xml"]
        );
    }

    #[test]
    fn page_path_prefers_metadata() {
        let metadata = PageMetadata {
            path: Some("/about/history".to_string()),
            ..PageMetadata::default()
        };
        assert_eq!(page_path_for(&metadata, "about/history.xml"), "/about/history");
        assert_eq!(
            page_path_for(&PageMetadata::default(), "about/history.xml"),
            "/about/history"
        );
    }

    #[test]
    fn diff_reports_changed_lines() {
        let before = vec![json!({"identifier": "a", "text": "old"})];
        let after = vec![json!({"identifier": "a", "text": "new"})];
        let diff = render_diff(&before, &after).expect("diff");
        assert!(diff.contains("-"));
        assert!(diff.contains("\"old\""));
        assert!(diff.contains("\"new\""));

        let unchanged = render_diff(&before, &before).expect("diff");
        assert!(unchanged.trim().is_empty());
    }
}
