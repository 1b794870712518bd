//! Section splitting.
//!
//! One rich-text field becomes an ordered list of (heading, content)
//! sections. Headings h2–h5 open sections, embedded images are classified
//! by their class attribute and either promoted (floated), pulled out as
//! standalone media sections (block), or left for the cleaning pass to
//! strip (inline). An empty h2 immediately followed by an h3 collapses
//! into the h3 section's heading override.

use crate::fragment::image_filename;
use crate::log::MigrationLog;
use crate::xml::{Element, FRAGMENT_TAG, XmlNode};

pub const FLOAT_LEFT_CLASS: &str = "float-left";
pub const FLOAT_RIGHT_CLASS: &str = "float-right";
pub const BLOCK_CLASS: &str = "full-width";
pub const CAPTION_CLASS: &str = "alt-caption";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    H2,
    H3,
    H4,
    H5,
}

impl HeadingLevel {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "h2" => Some(Self::H2),
            "h3" => Some(Self::H3),
            "h4" => Some(Self::H4),
            "h5" => Some(Self::H5),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::H2 => "h2",
            Self::H3 => "h3",
            Self::H4 => "h4",
            Self::H5 => "h5",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    FloatedLeft,
    FloatedRight,
    Block,
    Inline,
}

impl ImageRole {
    /// Derive the visual role from the class attribute. Exact token match;
    /// anything unrecognized is an inline image.
    pub fn from_class(class: Option<&str>) -> Self {
        let Some(class) = class else {
            return Self::Inline;
        };
        for token in class.split_whitespace() {
            match token {
                FLOAT_LEFT_CLASS => return Self::FloatedLeft,
                FLOAT_RIGHT_CLASS => return Self::FloatedRight,
                BLOCK_CLASS => return Self::Block,
                _ => {}
            }
        }
        Self::Inline
    }

    pub fn is_floated(self) -> bool {
        matches!(self, Self::FloatedLeft | Self::FloatedRight)
    }
}

#[derive(Debug, Clone)]
pub struct ImageRef {
    pub filename: String,
    pub src: String,
    pub alt_text: String,
    pub role: ImageRole,
    /// Set when the markup carries the caption marker class; the alt text
    /// then doubles as a visible caption.
    pub show_caption: bool,
}

impl ImageRef {
    pub fn from_element(img: &Element) -> Self {
        let src = img.attr("src").unwrap_or_default().to_string();
        let class = img.attr("class");
        Self {
            filename: image_filename(&src),
            role: ImageRole::from_class(class),
            alt_text: img.attr("alt").unwrap_or_default().to_string(),
            show_caption: class
                .map(|value| value.split_whitespace().any(|token| token == CAPTION_CLASS))
                .unwrap_or(false),
            src,
        }
    }
}

#[derive(Debug)]
pub struct Section {
    /// Heading markup with bold wrappers stripped; empty for headless
    /// leading content and block-image sections.
    pub heading: String,
    pub heading_level: Option<HeadingLevel>,
    pub content: Element,
    pub floated_image: Option<ImageRef>,
    /// Set when this section exists only to carry a block image.
    pub block_image: Option<ImageRef>,
    pub section_heading_override: Option<String>,
}

impl Section {
    fn headless() -> Self {
        Self {
            heading: String::new(),
            heading_level: None,
            content: Element::new(FRAGMENT_TAG),
            floated_image: None,
            block_image: None,
            section_heading_override: None,
        }
    }

    fn for_block_image(image: ImageRef) -> Self {
        let mut section = Self::headless();
        section.block_image = Some(image);
        section
    }

    pub fn is_block_image(&self) -> bool {
        self.block_image.is_some()
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty_shell()
    }

    fn is_worth_emitting(&self) -> bool {
        self.heading_level.is_some()
            || self.has_content()
            || self.floated_image.is_some()
            || self.block_image.is_some()
    }
}

/// Split one rich-text fragment into ordered sections. Images found inside
/// headings are always logged; body images are classified and either
/// promoted, split out, or left in place for the cleaning pass.
pub fn split_into_sections(fragment: &Element, log: &mut MigrationLog) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current = Section::headless();

    for node in &fragment.children {
        match node {
            XmlNode::Text(text) => {
                if !text.trim().is_empty() || current.has_content() {
                    current.content.push_text(text);
                }
            }
            XmlNode::Element(element) => {
                if let Some(level) = HeadingLevel::from_tag(&element.tag) {
                    if current.is_worth_emitting() {
                        sections.push(current);
                    }
                    current = open_section(element, level, log);
                } else {
                    let mut body = element.clone();
                    let blocks = take_body_images(&mut body, &mut current, log);
                    if !body.is_empty_shell() {
                        current.content.push_element(body);
                    }
                    for image in blocks {
                        if current.is_worth_emitting() {
                            sections.push(current);
                        }
                        sections.push(Section::for_block_image(image));
                        current = Section::headless();
                    }
                }
            }
        }
    }

    if current.is_worth_emitting() {
        sections.push(current);
    }
    if sections.is_empty() {
        sections.push(Section::headless());
    }

    merge_h2_h3(sections)
}

fn open_section(heading: &Element, level: HeadingLevel, log: &mut MigrationLog) -> Section {
    let mut section = Section::headless();
    section.heading_level = Some(level);

    let mut copy = heading.clone();
    for image in take_all_images(&mut copy) {
        if image.role.is_floated() && section.floated_image.is_none() {
            section.floated_image = Some(image);
        } else if image.role.is_floated() {
            log.warning(format!("Second floated image removed: {}", image.filename));
        } else {
            log.warning(format!(
                "Image found in heading, no float class: {}",
                image.filename
            ));
        }
    }

    strip_bold_wrappers(&mut copy);
    section.heading = copy.inner_html().trim().to_string();
    section
}

/// Remove floated and block images from a body element. The first floated
/// image becomes the section's floated image, later floated images are
/// logged as removed, block images are returned for standalone sections,
/// and inline images stay put for the cleaning pass.
fn take_body_images(
    element: &mut Element,
    section: &mut Section,
    log: &mut MigrationLog,
) -> Vec<ImageRef> {
    let mut blocks = Vec::new();
    take_body_images_inner(element, section, log, &mut blocks);
    blocks
}

fn take_body_images_inner(
    element: &mut Element,
    section: &mut Section,
    log: &mut MigrationLog,
    blocks: &mut Vec<ImageRef>,
) {
    let previous = std::mem::take(&mut element.children);
    for mut node in previous {
        if let XmlNode::Element(child) = &mut node {
            if child.tag == "img" {
                let image = ImageRef::from_element(child);
                match image.role {
                    ImageRole::FloatedLeft | ImageRole::FloatedRight => {
                        if section.floated_image.is_none() {
                            section.floated_image = Some(image);
                        } else {
                            log.warning(format!(
                                "Second floated image removed: {}",
                                image.filename
                            ));
                        }
                        continue;
                    }
                    ImageRole::Block => {
                        blocks.push(image);
                        continue;
                    }
                    ImageRole::Inline => {}
                }
            } else {
                take_body_images_inner(child, section, log, blocks);
            }
        }
        element.children.push(node);
    }
}

fn take_all_images(element: &mut Element) -> Vec<ImageRef> {
    let mut images = Vec::new();
    let previous = std::mem::take(&mut element.children);
    for mut node in previous {
        if let XmlNode::Element(child) = &mut node {
            if child.tag == "img" {
                images.push(ImageRef::from_element(child));
                continue;
            }
            images.extend(take_all_images(child));
        }
        element.children.push(node);
    }
    images
}

/// Unwrap `<strong>`/`<b>` in heading markup while keeping emphasis.
fn strip_bold_wrappers(element: &mut Element) {
    let previous = std::mem::take(&mut element.children);
    for mut node in previous {
        if let XmlNode::Element(child) = &mut node {
            strip_bold_wrappers(child);
            if child.tag == "strong" || child.tag == "b" {
                element.children.append(&mut child.children);
                continue;
            }
        }
        element.children.push(node);
    }
}

/// Collapse an empty h2 immediately followed by an h3: the h2's text moves
/// into the h3 section's heading override and the h2 section disappears.
/// Applied once, left to right, looking one section ahead.
fn merge_h2_h3(sections: Vec<Section>) -> Vec<Section> {
    let mut output = Vec::with_capacity(sections.len());
    let mut iterator = sections.into_iter().peekable();
    while let Some(section) = iterator.next() {
        let collapses = section.heading_level == Some(HeadingLevel::H2)
            && !section.has_content()
            && section.floated_image.is_none()
            && section.block_image.is_none()
            && iterator
                .peek()
                .is_some_and(|next| next.heading_level == Some(HeadingLevel::H3));
        if collapses
            && let Some(mut next) = iterator.next()
        {
            next.section_heading_override = Some(section.heading.clone());
            output.push(next);
            continue;
        }
        output.push(section);
    }
    output
}
