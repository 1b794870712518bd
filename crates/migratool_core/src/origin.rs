//! Origin document model.
//!
//! The legacy export carries the canonical content under a `calling-page`
//! subtree; a structurally duplicated top-level hierarchy in the same file
//! is ignored. The document is immutable input and is never mutated.

use anyhow::{Context, Result};

use crate::xml::{Element, parse_document};

pub const CALLING_PAGE_TAG: &str = "calling-page";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegionName {
    Intro,
    Grid,
    Nav,
    Primary,
    Secondary,
}

impl RegionName {
    pub const ALL: [Self; 5] = [Self::Intro, Self::Grid, Self::Nav, Self::Primary, Self::Secondary];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Grid => "grid",
            Self::Nav => "nav",
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    pub fn group_tag(self) -> &'static str {
        match self {
            Self::Intro => "group-intro",
            Self::Grid => "group-grid",
            Self::Nav => "group-nav",
            Self::Primary => "group-primary",
            Self::Secondary => "group-secondary",
        }
    }

    /// Repeating regions hold per-item on/off status; single-valued
    /// regions are governed by the settings block alone.
    pub fn is_repeating(self) -> bool {
        matches!(self, Self::Nav | Self::Primary | Self::Secondary)
    }
}

/// Closed set of origin item types. Anything the tool does not recognize
/// lands in `Unknown` and maps to a logged exclusion, never a fallthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Text,
    Accordion,
    Quote,
    Video,
    Image,
    Form,
    Gallery,
    ExternalBlock,
    ButtonNavGroup,
    ActionLinks,
    Unknown(String),
}

impl ItemKind {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Text" => Self::Text,
            "Accordion" => Self::Accordion,
            "Quote" => Self::Quote,
            "Video" => Self::Video,
            "Image" => Self::Image,
            "Form" => Self::Form,
            "Publish API Gallery" => Self::Gallery,
            "External Block" => Self::ExternalBlock,
            "Button navigation group" => Self::ButtonNavGroup,
            "Action Links" => Self::ActionLinks,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Text => "Text",
            Self::Accordion => "Accordion",
            Self::Quote => "Quote",
            Self::Video => "Video",
            Self::Image => "Image",
            Self::Form => "Form",
            Self::Gallery => "Publish API Gallery",
            Self::ExternalBlock => "External Block",
            Self::ButtonNavGroup => "Button navigation group",
            Self::ActionLinks => "Action Links",
            Self::Unknown(label) => label,
        }
    }
}

/// One active entry of a repeating region, borrowed from the document.
#[derive(Debug)]
pub struct OriginItem<'a> {
    pub element: &'a Element,
    pub kind: ItemKind,
    /// 1-based position among the region's active items, used in
    /// exclusion context strings.
    pub index: usize,
}

#[derive(Debug, Default, Clone)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub display_name: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug)]
pub struct OriginDocument {
    page: Element,
}

impl OriginDocument {
    pub fn parse(xml: &str) -> Result<Self> {
        let root = parse_document(xml).context("failed to parse origin document")?;
        let page = if root.tag == CALLING_PAGE_TAG {
            root
        } else {
            root.find(CALLING_PAGE_TAG)
                .cloned()
                .context("origin document has no calling-page subtree")?
        };
        Ok(Self { page })
    }

    pub fn page(&self) -> &Element {
        &self.page
    }

    /// Page metadata from the current system-page record.
    pub fn metadata(&self) -> PageMetadata {
        let records = self.page.find_all("system-page");
        let record = records
            .iter()
            .find(|record| record.attr("current") == Some("true"))
            .or_else(|| records.first());
        let Some(record) = record else {
            return PageMetadata::default();
        };
        PageMetadata {
            title: record.find_text("title").filter(|value| !value.is_empty()),
            display_name: record
                .find_text("display-name")
                .filter(|value| !value.is_empty()),
            path: record.find_text("path").filter(|value| !value.is_empty()),
        }
    }
}
