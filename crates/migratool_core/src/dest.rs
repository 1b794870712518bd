//! Destination vocabulary.
//!
//! Mappers emit sparse `NewNode` value trees: only the fields they set.
//! The merge engine supplies the complete field shape by cloning a
//! template node from the live document, so destination items are never
//! hand-built field-by-field.

use crate::sections::HeadingLevel;

pub const SECTION_IDENT: &str = "group-page-section-item";
pub const CONTENT_ITEM_IDENT: &str = "group-section-content-item";
pub const CONTENT_TYPE_IDENT: &str = "content-item-type";
pub const STATUS_IDENT: &str = "bool-status";
pub const SENTINEL_IDENT: &str = "group-cta-banner";
pub const SUMMARY_IDENT: &str = "migration-summary";
pub const SECTION_MODE_IDENT: &str = "section-mode";
pub const SECTION_HEADING_IDENT: &str = "content-heading";
pub const MEDIA_GROUP_IDENT: &str = "group-single-media";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentItemType {
    Prose,
    ProseImage,
    Media,
    Accordion,
    Cards,
    Quote,
    Form,
    Gallery,
}

impl ContentItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prose => "prose",
            Self::ProseImage => "prose-image",
            Self::Media => "media",
            Self::Accordion => "accordion",
            Self::Cards => "cards",
            Self::Quote => "quote",
            Self::Form => "form",
            Self::Gallery => "gallery",
        }
    }
}

/// Sparse value tree in the destination vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub identifier: String,
    pub text: Option<String>,
    pub children: Vec<NewNode>,
}

impl NewNode {
    pub fn text(identifier: &str, value: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            text: Some(value.to_string()),
            children: Vec::new(),
        }
    }

    pub fn group(identifier: &str, children: Vec<NewNode>) -> Self {
        Self {
            identifier: identifier.to_string(),
            text: None,
            children,
        }
    }

    pub fn child(&self, identifier: &str) -> Option<&NewNode> {
        self.children
            .iter()
            .find(|child| child.identifier == identifier)
    }

    pub fn push(&mut self, node: NewNode) {
        self.children.push(node);
    }
}

/// Builder for one content item, starting from its type discriminator.
#[derive(Debug)]
pub struct ContentItemBuilder {
    node: NewNode,
}

impl ContentItemBuilder {
    pub fn new(item_type: ContentItemType) -> Self {
        let node = NewNode::group(
            CONTENT_ITEM_IDENT,
            vec![NewNode::text(CONTENT_TYPE_IDENT, item_type.as_str())],
        );
        Self { node }
    }

    pub fn heading(mut self, text: &str, level: HeadingLevel) -> Self {
        if text.is_empty() {
            return self;
        }
        self.node.push(NewNode::group(
            "group-content-heading",
            vec![
                NewNode::text("heading-text", text),
                NewNode::text("heading-level", level.as_str()),
            ],
        ));
        self
    }

    pub fn body_html(mut self, html: &str) -> Self {
        if html.trim().is_empty() {
            return self;
        }
        self.node.push(NewNode::text("wysiwyg", html));
        self
    }

    pub fn push(mut self, node: NewNode) -> Self {
        self.node.push(node);
        self
    }

    pub fn build(self) -> NewNode {
        self.node
    }
}

/// Media group pointing at a destination image asset.
pub fn image_media_group(
    asset_id: &str,
    size: &str,
    position: Option<&str>,
    caption: Option<&str>,
) -> NewNode {
    let mut group = NewNode::group(
        MEDIA_GROUP_IDENT,
        vec![
            NewNode::text("media-type", "img-pub-api"),
            NewNode::text("pub-api-asset-id", asset_id),
            NewNode::text("size", size),
        ],
    );
    if let Some(position) = position {
        group.push(NewNode::text("position", position));
    }
    if let Some(caption) = caption.filter(|caption| !caption.is_empty()) {
        group.push(NewNode::text("caption", caption));
    }
    group
}

/// One logical group of content items bound for a single destination
/// section; the heading comes from an h2→h3 override when present.
#[derive(Debug)]
pub struct NewSection {
    pub content_heading: Option<String>,
    pub items: Vec<NewNode>,
}

impl NewSection {
    pub fn new(content_heading: Option<String>) -> Self {
        Self {
            content_heading,
            items: Vec::new(),
        }
    }
}
