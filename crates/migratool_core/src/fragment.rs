//! Rich-text fragment cleaning.
//!
//! Cleaning is applied to every content fragment before it is emitted into
//! the destination document: internal links are rewritten to root-relative
//! managed paths, presentation wrappers are unwrapped, presentation
//! attributes are stripped, and elements left empty by the above are pruned.
//! The pass is recursive and idempotent.

use crate::xml::{Element, XmlNode};

const UNWRAP_TAGS: [&str; 3] = ["span", "div", "u"];
const KEEP_EMPTY_TAGS: [&str; 2] = ["br", "wbr"];
const MIGRATION_SUFFIX: &str = "-migration.html";

#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Host of the origin site, e.g. `www.example.edu`. Links to this host
    /// are rewritten to root-relative managed paths.
    pub origin_host: String,
}

/// What a cleaning pass removed or flagged; the caller turns this into
/// migration log entries.
#[derive(Debug, Default)]
pub struct CleanReport {
    /// Filenames of inline images removed from the fragment.
    pub removed_images: Vec<String>,
    /// Internal PDF links left fully qualified for manual follow-up.
    pub pdf_links: Vec<String>,
}

/// Clean a fragment in place. Safe to run repeatedly; a second pass is a
/// no-op on the output of the first.
pub fn clean_fragment(root: &mut Element, options: &CleanOptions) -> CleanReport {
    let mut report = CleanReport::default();
    clean_children(root, options, &mut report);
    report
}

fn clean_children(element: &mut Element, options: &CleanOptions, report: &mut CleanReport) {
    let previous = std::mem::take(&mut element.children);
    let mut output: Vec<XmlNode> = Vec::with_capacity(previous.len());

    for node in previous {
        match node {
            XmlNode::Text(text) => push_text(&mut output, &text.replace('\u{a0}', " ")),
            XmlNode::Element(mut child) => {
                if child.tag == "img" {
                    if let Some(src) = child.attr("src") {
                        report.removed_images.push(image_filename(src));
                    }
                    continue;
                }
                if UNWRAP_TAGS.contains(&child.tag.as_str()) {
                    clean_children(&mut child, options, report);
                    for inner in child.children {
                        match inner {
                            XmlNode::Text(text) => push_text(&mut output, &text),
                            other => output.push(other),
                        }
                    }
                    continue;
                }

                if child.tag == "a" {
                    let rewritten = child
                        .attr("href")
                        .and_then(|href| rewrite_internal_link(href, options, report));
                    if let Some(rewritten) = rewritten {
                        child.set_attr("href", &rewritten);
                    }
                }
                child
                    .attrs
                    .retain(|(key, _)| key != "class" && !key.starts_with("aria-"));

                clean_children(&mut child, options, report);

                if child.is_empty_shell() && !KEEP_EMPTY_TAGS.contains(&child.tag.as_str()) {
                    continue;
                }
                output.push(XmlNode::Element(child));
            }
        }
    }

    element.children = output;
}

fn push_text(output: &mut Vec<XmlNode>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(XmlNode::Text(previous)) = output.last_mut() {
        previous.push_str(text);
    } else {
        output.push(XmlNode::Text(text.to_string()));
    }
}

/// Rewrite a link target when it points at the origin site. Returns `None`
/// when the href must be left untouched (external, mailto/tel, anchors,
/// PDFs, already-managed paths).
fn rewrite_internal_link(
    href: &str,
    options: &CleanOptions,
    report: &mut CleanReport,
) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("mailto:")
        || trimmed.starts_with("tel:")
    {
        return None;
    }

    let absolute_path = ["https://", "http://"].iter().find_map(|scheme| {
        let prefix = format!("{scheme}{}", options.origin_host);
        trimmed
            .strip_prefix(&prefix)
            .map(|remainder| remainder.to_string())
    });

    match absolute_path {
        Some(path) => {
            if path.to_ascii_lowercase().contains(".pdf") {
                report.pdf_links.push(trimmed.to_string());
                return None;
            }
            Some(normalize_managed_path(&path))
        }
        None if trimmed.starts_with('/') => {
            if trimmed.to_ascii_lowercase().contains(".pdf") {
                return None;
            }
            let normalized = normalize_managed_path(trimmed);
            if normalized == trimmed {
                None
            } else {
                Some(normalized)
            }
        }
        None => None,
    }
}

/// Root-relative path with hash fragment dropped and migration/export
/// suffixes stripped; bare directories point at their index page.
fn normalize_managed_path(path: &str) -> String {
    let mut path = match path.split_once('#') {
        Some((before, _)) => before.to_string(),
        None => path.to_string(),
    };

    if path.is_empty() || path == "/" {
        return "/index".to_string();
    }
    if path.ends_with('/') {
        path.push_str("index");
        return path;
    }
    if let Some(stripped) = path.strip_suffix(MIGRATION_SUFFIX) {
        return stripped.to_string();
    }
    if let Some(stripped) = path.strip_suffix(".html") {
        return stripped.to_string();
    }
    path
}

/// Last path segment of an image source.
pub fn image_filename(src: &str) -> String {
    src.rsplit('/').next().unwrap_or(src).to_string()
}
