//! Content-type mappers.
//!
//! One pure function per origin item type, dispatched over the closed
//! `ItemKind` set. Each mapper consumes one origin item and returns zero
//! or more sparse destination items; content gaps degrade to log entries,
//! never errors.

use crate::assets::AssetLookup;
use crate::dest::{
    ContentItemBuilder, ContentItemType, MEDIA_GROUP_IDENT, NewNode, image_media_group,
};
use crate::fragment::{CleanOptions, CleanReport, clean_fragment};
use crate::log::MigrationLog;
use crate::origin::{ItemKind, OriginItem, RegionName};
use crate::sections::{HeadingLevel, ImageRef, ImageRole, split_into_sections};
use crate::xml::{Element, escape_text};

pub const DEFAULT_FORM_PROVIDER: &str = "basin";
const FORM_PROVIDERS: [&str; 2] = ["basin", "slate"];

const LIST_INDEX_SUBTYPE: &str = "List Index";
const FULL_WIDTH_LAYOUT: &str = "Full Width";

#[derive(Debug, Clone, Copy)]
pub struct MapContext<'a> {
    pub assets: &'a AssetLookup,
    pub clean: &'a CleanOptions,
}

/// One mapped destination item; a set `section_heading` asks the caller to
/// open a new destination section headed by that text.
#[derive(Debug)]
pub struct MappedItem {
    pub node: NewNode,
    pub section_heading: Option<String>,
}

impl MappedItem {
    fn plain(node: NewNode) -> Self {
        Self {
            node,
            section_heading: None,
        }
    }
}

/// Map one active origin item into destination items, in item order.
pub fn map_item(
    item: &OriginItem<'_>,
    region: RegionName,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Vec<MappedItem> {
    match &item.kind {
        ItemKind::Text => map_text(item.element, context, log),
        ItemKind::Accordion => map_accordion(item.element, context, log),
        ItemKind::Quote => map_quote(item.element, log),
        ItemKind::Video => map_video(item.element, log),
        ItemKind::Image => map_image(item.element, context, log),
        ItemKind::Form => map_form(item.element, log),
        ItemKind::Gallery => map_gallery(item.element, log),
        ItemKind::ExternalBlock => map_external_block(item, region, context, log),
        ItemKind::ButtonNavGroup => {
            log_button_navigation(item.element, item, region, log);
            Vec::new()
        }
        ItemKind::ActionLinks => {
            log_action_links(item.element, item, region, log);
            Vec::new()
        }
        ItemKind::Unknown(label) => {
            log.warning_with(
                format!("Unmapped item type: {label}"),
                exclusion_context(region, item.index, &item.kind),
            );
            Vec::new()
        }
    }
}

/// Intro region content: rich text split into sections, a configured
/// gallery logged for manual placement, a configured video mapped to a
/// media item.
pub fn map_intro(
    intro: &Element,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Vec<MappedItem> {
    let mut output = Vec::new();

    if let Some(wysiwyg) = intro.child("wysiwyg")
        && !wysiwyg.is_empty_shell()
    {
        output.extend(map_wysiwyg_sections(wysiwyg, context, log));
    }

    if let Some(gallery_id) = intro
        .find_text("gallery-api-id")
        .filter(|value| !value.is_empty())
    {
        log.warning(format!(
            "Gallery requires manual placement (gallery {gallery_id})"
        ));
    }

    if let Some(video) = intro.find("intro-video") {
        let video_id = video.find_text("video-id").unwrap_or_default();
        if !video_id.is_empty() {
            let source = video
                .find_text("video-source")
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "vimeo".to_string());
            let id_field = if source == "youtube" { "youtube-id" } else { "vimeo-id" };
            let media = NewNode::group(
                MEDIA_GROUP_IDENT,
                vec![
                    NewNode::text("media-type", &source),
                    NewNode::text(id_field, &video_id),
                ],
            );
            output.push(MappedItem::plain(
                ContentItemBuilder::new(ContentItemType::Media).push(media).build(),
            ));
            log.info(format!("Intro video mapped ({source} {video_id})"));
        }
    }

    output
}

fn map_text(
    element: &Element,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Vec<MappedItem> {
    let Some(wysiwyg) = element
        .find("group-text")
        .and_then(|group| group.child("wysiwyg"))
    else {
        return Vec::new();
    };
    map_wysiwyg_sections(wysiwyg, context, log)
}

/// Shared by the Text mapper and the intro region: split one rich-text
/// field and emit prose / prose-image / media items per section.
fn map_wysiwyg_sections(
    wysiwyg: &Element,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Vec<MappedItem> {
    let sections = split_into_sections(wysiwyg, log);
    let mut output = Vec::new();

    for mut section in sections {
        if let Some(block) = section.block_image.take() {
            if let Some(item) = block_image_item(&block, context.assets, log) {
                output.push(MappedItem::plain(item));
            }
            continue;
        }

        let report = clean_fragment(&mut section.content, context.clean);
        log_clean_report(&report, log);
        let body = section.content.inner_html().trim().to_string();

        let mut item_type = ContentItemType::Prose;
        let mut media = None;
        if let Some(image) = &section.floated_image {
            match context.assets.resolve(&image.src) {
                Some(asset_id) => {
                    item_type = ContentItemType::ProseImage;
                    media = Some(image_media_group(
                        asset_id,
                        "md",
                        Some(float_position(image.role)),
                        Some(image.alt_text.as_str()),
                    ));
                    log.info(format!(
                        "Floated image attached: {} (asset {asset_id})",
                        image.filename
                    ));
                }
                None => {
                    log.error(format!("NO ASSET ID FOUND for image: {}", image.filename));
                }
            }
        }

        if body.is_empty() && section.heading.is_empty() && media.is_none() {
            continue;
        }

        let mut builder = ContentItemBuilder::new(item_type);
        if !section.heading.is_empty() {
            builder = builder.heading(
                &section.heading,
                section.heading_level.unwrap_or(HeadingLevel::H2),
            );
        }
        builder = builder.body_html(&body);
        if let Some(media) = media {
            builder = builder.push(media);
        }
        output.push(MappedItem {
            node: builder.build(),
            section_heading: section.section_heading_override.take(),
        });
    }

    output
}

fn block_image_item(
    image: &ImageRef,
    assets: &AssetLookup,
    log: &mut MigrationLog,
) -> Option<NewNode> {
    match assets.resolve(&image.src) {
        Some(asset_id) => {
            log.info(format!(
                "Block image placed as media item: {} (asset {asset_id})",
                image.filename
            ));
            let caption = if image.alt_text.is_empty() {
                None
            } else {
                Some(image.alt_text.as_str())
            };
            Some(
                ContentItemBuilder::new(ContentItemType::Media)
                    .push(image_media_group(asset_id, "lg", None, caption))
                    .build(),
            )
        }
        None => {
            log.error(format!("NO ASSET ID FOUND for image: {}", image.filename));
            None
        }
    }
}

/// All retained panels collapse into a single accordion item. Headings in
/// panel bodies are downgraded to bold, every image is removed and logged
/// with its resolved asset ID.
fn map_accordion(
    element: &Element,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Vec<MappedItem> {
    let Some(accordion) = element.find("group-accordion") else {
        return Vec::new();
    };
    let panels = accordion.find_all("group-panel");
    if panels.is_empty() {
        return Vec::new();
    }

    let layout = accordion
        .find_text("layout")
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "large".to_string());

    let mut panel_nodes = Vec::new();
    for panel in panels {
        let heading = panel.find_text("heading").unwrap_or_default();
        let display = panel
            .find_text("display")
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "Collapsed".to_string());
        if display == "Off" {
            log.warning(format!("Accordion panel dropped (display=Off): {heading}"));
            continue;
        }

        let mut body = panel
            .child("wysiwyg")
            .cloned()
            .unwrap_or_else(|| Element::new("wysiwyg"));
        for downgraded in downgrade_headings(&mut body) {
            log.warning(format!(
                "Heading downgraded to bold in accordion panel \"{heading}\": {downgraded}"
            ));
        }
        let report = clean_fragment(&mut body, context.clean);
        for filename in &report.removed_images {
            match context.assets.resolve(filename) {
                Some(asset_id) => log.warning(format!(
                    "Image removed from accordion panel \"{heading}\": {filename} (asset {asset_id})"
                )),
                None => log.warning(format!(
                    "Image removed from accordion panel \"{heading}\": {filename} (NO ASSET ID FOUND)"
                )),
            }
        }

        panel_nodes.push(NewNode::group(
            "group-panel",
            vec![
                NewNode::text("heading", &heading),
                NewNode::text("display", &display),
                NewNode::text("wysiwyg", body.inner_html().trim()),
            ],
        ));
    }

    if panel_nodes.is_empty() {
        return Vec::new();
    }

    let mut group = NewNode::group("group-accordion", vec![NewNode::text("layout", &layout)]);
    for panel in panel_nodes {
        group.push(panel);
    }
    vec![MappedItem::plain(
        ContentItemBuilder::new(ContentItemType::Accordion).push(group).build(),
    )]
}

fn map_quote(element: &Element, log: &mut MigrationLog) -> Vec<MappedItem> {
    let Some(quote) = element.find("group-quote") else {
        return Vec::new();
    };
    let body = quote.find_text("quote-text").unwrap_or_default();
    if body.is_empty() {
        log.warning("Quote item skipped: empty quote body");
        return Vec::new();
    }
    let citation = quote.find_text("quote-citation-text").unwrap_or_default();

    let mut builder = ContentItemBuilder::new(ContentItemType::Quote)
        .body_html(&escape_text(&body));
    if !citation.is_empty() {
        builder = builder.push(NewNode::group(
            "quote",
            vec![NewNode::text("quote-author", &citation)],
        ));
    }
    vec![MappedItem::plain(builder.build())]
}

fn map_video(element: &Element, log: &mut MigrationLog) -> Vec<MappedItem> {
    let url = element
        .find("group-video")
        .and_then(|group| group.find_text("video-url"))
        .or_else(|| element.find_text("video-url"))
        .unwrap_or_default();

    match classify_embed_url(&url) {
        EmbedUrl::Parsed(provider, video_id) => {
            let media = NewNode::group(
                MEDIA_GROUP_IDENT,
                vec![
                    NewNode::text("media-type", provider.as_str()),
                    NewNode::text(provider.id_field(), &video_id),
                ],
            );
            log.info(format!("Video mapped ({} {video_id})", provider.as_str()));
            vec![MappedItem::plain(
                ContentItemBuilder::new(ContentItemType::Media).push(media).build(),
            )]
        }
        EmbedUrl::EmptyId => Vec::new(),
        EmbedUrl::Unrecognized => {
            if !url.is_empty() {
                log.warning(format!("Video embed URL not recognized: {url}"));
            }
            Vec::new()
        }
    }
}

fn map_image(
    element: &Element,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Vec<MappedItem> {
    let Some(group) = element.find("group-image") else {
        return Vec::new();
    };
    let name = group
        .find("image")
        .and_then(|image| image.find_text("name"))
        .unwrap_or_default();
    if name.is_empty() {
        log.warning("Image item skipped: no image selected");
        return Vec::new();
    }

    let Some(asset_id) = context.assets.resolve(&name) else {
        log.error(format!("NO ASSET ID FOUND for image: {name}"));
        return Vec::new();
    };

    let layout = group.find_text("layout").unwrap_or_default();
    let size = if layout == FULL_WIDTH_LAYOUT { "lg" } else { "md" };
    let caption = group.find_text("caption").unwrap_or_default();
    let caption = if caption.is_empty() { None } else { Some(caption.as_str()) };

    log.info(format!("Image mapped: {name} (asset {asset_id}, size {size})"));
    vec![MappedItem::plain(
        ContentItemBuilder::new(ContentItemType::Media)
            .push(image_media_group(asset_id, size, None, caption))
            .build(),
    )]
}

fn map_form(element: &Element, log: &mut MigrationLog) -> Vec<MappedItem> {
    let Some(group) = element.find("group-form") else {
        return Vec::new();
    };
    let form_id = group.find_text("form-id").unwrap_or_default();
    if form_id.is_empty() {
        log.warning("Form item skipped: no form ID");
        return Vec::new();
    }

    let label = group.find_text("form-provider").unwrap_or_default();
    let provider = map_form_provider(&label);
    if provider != label.to_ascii_lowercase() && !label.is_empty() {
        log.warning(format!(
            "Unrecognized form provider \"{label}\", defaulting to {DEFAULT_FORM_PROVIDER}"
        ));
    }

    let mut forms = NewNode::group(
        "group-forms",
        vec![
            NewNode::text("form-type", &provider),
            NewNode::text("form-id", &form_id),
        ],
    );
    if let Some(title) = group
        .find_text("accessible-title")
        .filter(|value| !value.is_empty())
    {
        forms.push(NewNode::text("accessible-title", &title));
    }
    vec![MappedItem::plain(
        ContentItemBuilder::new(ContentItemType::Form).push(forms).build(),
    )]
}

/// Galleries attach at the section level in the destination schema, so no
/// content item can carry one; they are always routed to manual follow-up.
fn map_gallery(element: &Element, log: &mut MigrationLog) -> Vec<MappedItem> {
    let gallery_id = element
        .find("publish-api-gallery")
        .and_then(|gallery| gallery.find_text("gallery-api-id"))
        .filter(|value| !value.is_empty());
    match gallery_id {
        Some(gallery_id) => log.warning(format!(
            "Gallery requires manual placement (gallery {gallery_id})"
        )),
        None => log.warning("Gallery requires manual placement (no gallery ID)"),
    }
    Vec::new()
}

fn map_external_block(
    item: &OriginItem<'_>,
    region: RegionName,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Vec<MappedItem> {
    let Some(block_group) = item.element.find("group-block") else {
        log.warning_with(
            "External block without block content",
            exclusion_context(region, item.index, &item.kind),
        );
        return Vec::new();
    };
    let subtype = block_group.find_text("type").unwrap_or_default();
    if subtype != LIST_INDEX_SUBTYPE {
        log.warning_with(
            format!("External block subtype not migrated: {subtype}"),
            exclusion_context(region, item.index, &item.kind),
        );
        return Vec::new();
    }
    map_list_index(block_group, context, log)
}

/// A List Index block becomes one cards item with one card per visible
/// origin entry.
fn map_list_index(
    block_group: &Element,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Vec<MappedItem> {
    let Some(block) = block_group.find("block") else {
        return Vec::new();
    };

    let mut cards = Vec::new();
    for entry in block.find_all("item") {
        let visibility = entry
            .find_text("visibility")
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "on".to_string());
        if visibility != "on" {
            continue;
        }

        let heading = entry.find_text("heading").unwrap_or_default();
        let mut heading_group = vec![NewNode::text("heading-text", &heading)];
        match entry.find_text("heading-link-type").as_deref() {
            Some("int") => {
                let path = entry
                    .find("heading-link")
                    .and_then(|link| link.find_text("path"))
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| "/".to_string());
                heading_group.push(NewNode::group(
                    "heading-link",
                    vec![NewNode::text("path", &path)],
                ));
            }
            Some("ext") => {
                let target = entry.find_text("ext-heading-link").unwrap_or_default();
                if !target.is_empty() {
                    log.warning(format!("List entry external link excluded: {target}"));
                }
            }
            _ => {}
        }

        let mut card = NewNode::group(
            "group-card-item",
            vec![NewNode::group("group-card-item-heading", heading_group)],
        );

        if let Some(name) = entry
            .find("image")
            .and_then(|image| image.find_text("name"))
            .filter(|value| !value.is_empty())
        {
            match context.assets.resolve(&name) {
                Some(asset_id) => card.push(image_media_group(asset_id, "md", None, None)),
                None => log.error(format!("NO ASSET ID FOUND for image: {name}")),
            }
        }

        if let Some(wysiwyg) = entry.child("wysiwyg")
            && !wysiwyg.is_empty_shell()
        {
            let mut body = wysiwyg.clone();
            let report = clean_fragment(&mut body, context.clean);
            log_clean_report(&report, log);
            card.push(NewNode::text("wysiwyg", body.inner_html().trim()));
        }

        cards.push(card);
    }

    if cards.is_empty() {
        return Vec::new();
    }

    let mut group = NewNode::group(
        "group-cards",
        vec![NewNode::text("card-options", "default")],
    );
    for card in cards {
        group.push(card);
    }
    vec![MappedItem::plain(
        ContentItemBuilder::new(ContentItemType::Cards).push(group).build(),
    )]
}

fn log_button_navigation(
    element: &Element,
    item: &OriginItem<'_>,
    region: RegionName,
    log: &mut MigrationLog,
) {
    let buttons = element.find_all("group-button-links");
    let mut details = Vec::new();
    for button in buttons {
        let label = button.find_text("button-link-label").unwrap_or_default();
        let external = button.find_text("ext-button-link").unwrap_or_default();
        let internal = button
            .find("button-link")
            .and_then(|link| link.find_text("path"))
            .unwrap_or_default();
        if !external.is_empty() {
            details.push(format!("{label} -> {external}"));
        } else if !internal.is_empty() {
            details.push(format!("{label} -> {internal}"));
        } else {
            details.push(label);
        }
    }
    let detail = if details.is_empty() {
        "no buttons".to_string()
    } else {
        details.join(", ")
    };
    log.warning_with(
        format!("Button navigation group excluded: {detail}"),
        exclusion_context(region, item.index, &item.kind),
    );
}

fn log_action_links(
    element: &Element,
    item: &OriginItem<'_>,
    region: RegionName,
    log: &mut MigrationLog,
) {
    let mut details = Vec::new();
    for link in element.find_all("group-action-link") {
        let label = link.find_text("link-label").unwrap_or_default();
        let target = link
            .find_text("ext-link")
            .filter(|value| !value.is_empty())
            .or_else(|| link.find("link").and_then(|node| node.find_text("path")))
            .unwrap_or_default();
        if target.is_empty() {
            details.push(label);
        } else {
            details.push(format!("{label} -> {target}"));
        }
    }
    let detail = if details.is_empty() {
        "Action Links excluded".to_string()
    } else {
        format!("Action Links excluded: {}", details.join(", "))
    };
    log.warning_with(detail, exclusion_context(region, item.index, &item.kind));
}

pub fn exclusion_context(region: RegionName, index: usize, kind: &ItemKind) -> String {
    format!("{}[{}][type=\"{}\"]", region.group_tag(), index, kind.label())
}

pub fn map_form_provider(label: &str) -> String {
    let lowered = label.trim().to_ascii_lowercase();
    if FORM_PROVIDERS.contains(&lowered.as_str()) {
        lowered
    } else {
        DEFAULT_FORM_PROVIDER.to_string()
    }
}

fn float_position(role: ImageRole) -> &'static str {
    match role {
        ImageRole::FloatedRight => "right",
        _ => "left",
    }
}

fn log_clean_report(report: &CleanReport, log: &mut MigrationLog) {
    for filename in &report.removed_images {
        log.warning(format!("Inline image removed: {filename}"));
    }
    for link in &report.pdf_links {
        log.warning(format!("PDF link left fully qualified: {link}"));
    }
}

/// Replace h2–h5 elements with bold paragraphs, returning the downgraded
/// heading texts.
fn downgrade_headings(element: &mut Element) -> Vec<String> {
    let mut downgraded = Vec::new();
    let previous = std::mem::take(&mut element.children);
    for mut node in previous {
        if let crate::xml::XmlNode::Element(child) = &mut node {
            if HeadingLevel::from_tag(&child.tag).is_some() {
                downgraded.push(child.text_content().trim().to_string());
                let mut strong = Element::new("strong");
                strong.children = std::mem::take(&mut child.children);
                let mut paragraph = Element::new("p");
                paragraph.push_element(strong);
                element.push_element(paragraph);
                continue;
            }
            downgraded.extend(downgrade_headings(child));
        }
        element.children.push(node);
    }
    downgraded
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoProvider {
    Youtube,
    Vimeo,
}

impl VideoProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Vimeo => "vimeo",
        }
    }

    pub fn id_field(self) -> &'static str {
        match self {
            Self::Youtube => "youtube-id",
            Self::Vimeo => "vimeo-id",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum EmbedUrl {
    Parsed(VideoProvider, String),
    /// A recognized provider URL whose ID segment is empty; the default
    /// editor value, never worth an exclusion entry.
    EmptyId,
    Unrecognized,
}

/// Resolve a provider video ID from an embed URL. Supports the embed,
/// watch and short-link YouTube shapes and the numeric Vimeo shapes.
pub fn classify_embed_url(url: &str) -> EmbedUrl {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return EmbedUrl::EmptyId;
    }
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host_and_path = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);

    for host in ["youtube.com", "youtube-nocookie.com"] {
        if let Some(path) = host_and_path.strip_prefix(&format!("{host}/")) {
            if let Some(rest) = path.strip_prefix("embed/") {
                return youtube_id(first_segment(rest));
            }
            if let Some(query) = path.strip_prefix("watch?") {
                let id = query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("v="))
                    .unwrap_or_default();
                return youtube_id(id);
            }
            return EmbedUrl::Unrecognized;
        }
    }
    if let Some(rest) = host_and_path.strip_prefix("youtu.be/") {
        return youtube_id(first_segment(rest));
    }
    if let Some(rest) = host_and_path.strip_prefix("player.vimeo.com/video/") {
        return vimeo_id(first_segment(rest));
    }
    if let Some(rest) = host_and_path.strip_prefix("vimeo.com/") {
        return vimeo_id(first_segment(rest));
    }
    EmbedUrl::Unrecognized
}

fn first_segment(path: &str) -> &str {
    path.split(['/', '?', '&', '#']).next().unwrap_or_default()
}

fn youtube_id(id: &str) -> EmbedUrl {
    if id.is_empty() {
        EmbedUrl::EmptyId
    } else {
        EmbedUrl::Parsed(VideoProvider::Youtube, id.to_string())
    }
}

fn vimeo_id(id: &str) -> EmbedUrl {
    if id.is_empty() {
        return EmbedUrl::EmptyId;
    }
    if id.chars().all(|ch| ch.is_ascii_digit()) {
        EmbedUrl::Parsed(VideoProvider::Vimeo, id.to_string())
    } else {
        EmbedUrl::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EmbedUrl, MapContext, MappedItem, VideoProvider, classify_embed_url, map_form_provider,
        map_intro, map_item,
    };
    use crate::assets::AssetLookup;
    use crate::fragment::CleanOptions;
    use crate::log::MigrationLog;
    use crate::origin::{ItemKind, OriginItem, RegionName};
    use crate::xml::{Element, parse_fragment};

    fn clean_options() -> CleanOptions {
        CleanOptions {
            origin_host: "www.example.edu".to_string(),
        }
    }

    fn item_element(markup: &str) -> Element {
        let mut fragment = parse_fragment(markup).expect("parse");
        match fragment.children.remove(0) {
            crate::xml::XmlNode::Element(element) => element,
            crate::xml::XmlNode::Text(_) => panic!("expected element"),
        }
    }

    fn run_mapper(markup: &str, kind: ItemKind, assets: &AssetLookup) -> (Vec<MappedItem>, MigrationLog) {
        let element = item_element(markup);
        let mut log = MigrationLog::new("/test", "test.xml");
        let clean = clean_options();
        let context = MapContext { assets, clean: &clean };
        let item = OriginItem {
            element: &element,
            kind,
            index: 1,
        };
        let mapped = map_item(&item, RegionName::Primary, &context, &mut log);
        (mapped, log)
    }

    fn content_type(item: &MappedItem) -> &str {
        item.node
            .child("content-item-type")
            .and_then(|node| node.text.as_deref())
            .unwrap_or_default()
    }

    #[test]
    fn text_item_splits_into_prose_items() {
        let markup = "<group-primary><group-text><wysiwyg>\
<p>intro</p><h2>A</h2><p>one</p><h3>B</h3><p>two</p>\
</wysiwyg></group-text></group-primary>";
        let (mapped, _log) = run_mapper(markup, ItemKind::Text, &AssetLookup::empty());
        assert_eq!(mapped.len(), 3);
        assert!(mapped.iter().all(|item| content_type(item) == "prose"));
        assert_eq!(
            mapped[0].node.child("wysiwyg").and_then(|node| node.text.as_deref()),
            Some("<p>intro</p>")
        );
        let heading = mapped[1].node.child("group-content-heading").expect("heading");
        assert_eq!(
            heading.child("heading-text").and_then(|node| node.text.as_deref()),
            Some("A")
        );
    }

    #[test]
    fn empty_h2_collapses_into_single_prose_item_with_override() {
        let markup = "<group-primary><group-text><wysiwyg>\
<h2>A</h2><h3>B</h3><p>two</p>\
</wysiwyg></group-text></group-primary>";
        let (mapped, _log) = run_mapper(markup, ItemKind::Text, &AssetLookup::empty());
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].section_heading.as_deref(), Some("A"));
        let heading = mapped[0].node.child("group-content-heading").expect("heading");
        assert_eq!(
            heading.child("heading-text").and_then(|node| node.text.as_deref()),
            Some("B")
        );
        assert_eq!(
            mapped[0].node.child("wysiwyg").and_then(|node| node.text.as_deref()),
            Some("<p>two</p>")
        );
    }

    #[test]
    fn floated_image_with_asset_id_becomes_prose_image() {
        let mut assets = AssetLookup::empty();
        assets.insert("dean.jpg", "a-9");
        let markup = "<group-primary><group-text><wysiwyg>\
<h2>T</h2><p><img src=\"/img/dean.jpg\" class=\"float-right\" alt=\"Dean\"/>body</p>\
</wysiwyg></group-text></group-primary>";
        let (mapped, _log) = run_mapper(markup, ItemKind::Text, &assets);
        assert_eq!(mapped.len(), 1);
        assert_eq!(content_type(&mapped[0]), "prose-image");
        let media = mapped[0].node.child("group-single-media").expect("media");
        assert_eq!(
            media.child("pub-api-asset-id").and_then(|node| node.text.as_deref()),
            Some("a-9")
        );
        assert_eq!(
            media.child("position").and_then(|node| node.text.as_deref()),
            Some("right")
        );
    }

    #[test]
    fn floated_image_without_asset_id_degrades_to_prose() {
        let markup = "<group-primary><group-text><wysiwyg>\
<p><img src=\"lost.jpg\" class=\"float-left\"/>body</p>\
</wysiwyg></group-text></group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::Text, &AssetLookup::empty());
        assert_eq!(mapped.len(), 1);
        assert_eq!(content_type(&mapped[0]), "prose");
        assert!(log.entries().iter().any(|entry| {
            entry.message.contains("NO ASSET ID FOUND") && entry.message.contains("lost.jpg")
        }));
    }

    #[test]
    fn block_image_yields_standalone_media_item() {
        let mut assets = AssetLookup::empty();
        assets.insert("wide.jpg", "a-4");
        let markup = "<group-primary><group-text><wysiwyg>\
<p>before</p><p><img src=\"wide.jpg\" class=\"full-width\"/></p><p>after</p>\
</wysiwyg></group-text></group-primary>";
        let (mapped, _log) = run_mapper(markup, ItemKind::Text, &assets);
        assert_eq!(mapped.len(), 3);
        assert_eq!(content_type(&mapped[1]), "media");
        let media = mapped[1].node.child("group-single-media").expect("media");
        assert_eq!(
            media.child("size").and_then(|node| node.text.as_deref()),
            Some("lg")
        );
    }

    #[test]
    fn accordion_collapses_into_one_item_and_drops_off_panels() {
        let markup = "<group-primary><group-accordion><layout>small</layout>\
<group-panel><heading>Open</heading><display>Collapsed</display>\
<wysiwyg><h3>Sub</h3><p>text <img src=\"p.png\"/></p></wysiwyg></group-panel>\
<group-panel><heading>Hidden</heading><display>Off</display><wysiwyg><p>x</p></wysiwyg></group-panel>\
</group-accordion></group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::Accordion, &AssetLookup::empty());
        assert_eq!(mapped.len(), 1);
        assert_eq!(content_type(&mapped[0]), "accordion");
        let accordion = mapped[0].node.child("group-accordion").expect("accordion");
        let panels: Vec<_> = accordion
            .children
            .iter()
            .filter(|child| child.identifier == "group-panel")
            .collect();
        assert_eq!(panels.len(), 1);
        let body = panels[0].child("wysiwyg").and_then(|node| node.text.as_deref());
        assert_eq!(body, Some("<p><strong>Sub</strong></p><p>text </p>"));
        assert!(log.entries().iter().any(|entry| entry.message.contains("display=Off")));
        assert!(log.entries().iter().any(|entry| entry.message.contains("downgraded to bold")));
        assert!(log.entries().iter().any(|entry| {
            entry.message.contains("Image removed from accordion panel")
                && entry.message.contains("NO ASSET ID FOUND")
        }));
    }

    #[test]
    fn quote_maps_body_and_citation_and_skips_empty() {
        let markup = "<group-primary><group-quote>\
<quote-text>Go boldly</quote-text><quote-citation-text>A. Dean</quote-citation-text>\
</group-quote></group-primary>";
        let (mapped, _log) = run_mapper(markup, ItemKind::Quote, &AssetLookup::empty());
        assert_eq!(mapped.len(), 1);
        assert_eq!(content_type(&mapped[0]), "quote");
        let quote = mapped[0].node.child("quote").expect("quote group");
        assert_eq!(
            quote.child("quote-author").and_then(|node| node.text.as_deref()),
            Some("A. Dean")
        );

        let empty = "<group-primary><group-quote><quote-text/></group-quote></group-primary>";
        let (mapped, log) = run_mapper(empty, ItemKind::Quote, &AssetLookup::empty());
        assert!(mapped.is_empty());
        assert!(log.entries()[0].message.contains("empty quote body"));
    }

    #[test]
    fn video_embed_families_parse() {
        assert_eq!(
            classify_embed_url("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            EmbedUrl::Parsed(VideoProvider::Youtube, "dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            classify_embed_url("https://www.youtube.com/watch?v=abc123&t=4"),
            EmbedUrl::Parsed(VideoProvider::Youtube, "abc123".to_string())
        );
        assert_eq!(
            classify_embed_url("https://youtu.be/xyz"),
            EmbedUrl::Parsed(VideoProvider::Youtube, "xyz".to_string())
        );
        assert_eq!(
            classify_embed_url("https://player.vimeo.com/video/123456"),
            EmbedUrl::Parsed(VideoProvider::Vimeo, "123456".to_string())
        );
        assert_eq!(
            classify_embed_url("https://vimeo.com/98765?h=1"),
            EmbedUrl::Parsed(VideoProvider::Vimeo, "98765".to_string())
        );
        assert_eq!(
            classify_embed_url("https://www.youtube.com/embed/"),
            EmbedUrl::EmptyId
        );
        assert_eq!(classify_embed_url(""), EmbedUrl::EmptyId);
        assert_eq!(
            classify_embed_url("https://example.org/video/1"),
            EmbedUrl::Unrecognized
        );
        assert_eq!(
            classify_embed_url("https://vimeo.com/about"),
            EmbedUrl::Unrecognized
        );
    }

    #[test]
    fn default_embed_url_produces_no_item_and_no_log() {
        let markup = "<group-primary><group-video>\
<video-url>https://www.youtube.com/embed/</video-url>\
</group-video></group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::Video, &AssetLookup::empty());
        assert!(mapped.is_empty());
        assert!(log.entries().is_empty());
    }

    #[test]
    fn unrecognized_embed_url_is_logged() {
        let markup = "<group-primary><group-video>\
<video-url>https://media.example.edu/play/77</video-url>\
</group-video></group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::Video, &AssetLookup::empty());
        assert!(mapped.is_empty());
        assert_eq!(log.entries().len(), 1);
        assert!(log.entries()[0].message.contains("not recognized"));
    }

    #[test]
    fn image_item_resolves_size_from_layout() {
        let mut assets = AssetLookup::empty();
        assets.insert("hero.jpg", "a-7");
        let markup = "<group-primary><group-image><layout>Full Width</layout>\
<image><name>hero.jpg</name></image></group-image></group-primary>";
        let (mapped, _log) = run_mapper(markup, ItemKind::Image, &assets);
        let media = mapped[0].node.child("group-single-media").expect("media");
        assert_eq!(
            media.child("size").and_then(|node| node.text.as_deref()),
            Some("lg")
        );
    }

    #[test]
    fn image_item_without_asset_id_is_excluded_with_filename() {
        let markup = "<group-primary><group-image>\
<image><name>ghost.png</name></image></group-image></group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::Image, &AssetLookup::empty());
        assert!(mapped.is_empty());
        assert_eq!(log.entries().len(), 1);
        assert!(log.entries()[0].message.contains("ghost.png"));
        assert!(log.entries()[0].message.contains("NO ASSET ID FOUND"));
    }

    #[test]
    fn form_provider_vocabulary_and_fallback() {
        assert_eq!(map_form_provider("Basin"), "basin");
        assert_eq!(map_form_provider("slate"), "slate");
        assert_eq!(map_form_provider("Google Forms"), "basin");

        let markup = "<group-primary><group-form>\
<form-provider>Google Forms</form-provider><form-id>f-1</form-id>\
</group-form></group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::Form, &AssetLookup::empty());
        let forms = mapped[0].node.child("group-forms").expect("forms");
        assert_eq!(
            forms.child("form-type").and_then(|node| node.text.as_deref()),
            Some("basin")
        );
        assert!(log.entries()[0].message.contains("defaulting to basin"));

        let no_id = "<group-primary><group-form><form-id/></group-form></group-primary>";
        let (mapped, _log) = run_mapper(no_id, ItemKind::Form, &AssetLookup::empty());
        assert!(mapped.is_empty());
    }

    #[test]
    fn gallery_never_produces_items() {
        let markup = "<group-primary><publish-api-gallery>\
<gallery-api-id>g-12</gallery-api-id></publish-api-gallery></group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::Gallery, &AssetLookup::empty());
        assert!(mapped.is_empty());
        assert!(log.entries()[0].message.contains("manual placement"));
        assert!(log.entries()[0].message.contains("g-12"));
    }

    #[test]
    fn list_index_expands_to_cards_and_logs_external_links() {
        let mut assets = AssetLookup::empty();
        assets.insert("card.jpg", "a-3");
        let markup = "<group-primary><group-block><type>List Index</type><block>\
<item><visibility>on</visibility><heading>First</heading>\
<heading-link-type>int</heading-link-type><heading-link><path>/first</path></heading-link>\
<image><name>card.jpg</name></image><wysiwyg><p>one</p></wysiwyg></item>\
<item><visibility>off</visibility><heading>Hidden</heading></item>\
<item><visibility>on</visibility><heading>Ext</heading>\
<heading-link-type>ext</heading-link-type>\
<ext-heading-link>https://elsewhere.org</ext-heading-link></item>\
</block></group-block></group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::ExternalBlock, &assets);
        assert_eq!(mapped.len(), 1);
        assert_eq!(content_type(&mapped[0]), "cards");
        let cards = mapped[0].node.child("group-cards").expect("cards");
        let card_items: Vec<_> = cards
            .children
            .iter()
            .filter(|child| child.identifier == "group-card-item")
            .collect();
        assert_eq!(card_items.len(), 2);
        assert!(log.entries().iter().any(|entry| {
            entry.message.contains("external link excluded")
                && entry.message.contains("elsewhere.org")
        }));
    }

    #[test]
    fn other_external_block_subtypes_are_excluded() {
        let markup = "<group-primary><group-block><type>Simple Content</type>\
<block/></group-block></group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::ExternalBlock, &AssetLookup::empty());
        assert!(mapped.is_empty());
        assert!(log.entries()[0].message.contains("Simple Content"));
        assert_eq!(
            log.entries()[0].context.as_deref(),
            Some("group-primary[1][type=\"External Block\"]")
        );
    }

    #[test]
    fn button_navigation_is_excluded_with_targets() {
        let markup = "<group-primary>\
<group-button-links><button-link-label>Apply</button-link-label>\
<ext-button-link>https://apply.example.edu</ext-button-link></group-button-links>\
<group-button-links><button-link-label>Visit</button-link-label>\
<button-link><path>/visit</path></button-link></group-button-links>\
</group-primary>";
        let (mapped, log) = run_mapper(markup, ItemKind::ButtonNavGroup, &AssetLookup::empty());
        assert!(mapped.is_empty());
        let message = &log.entries()[0].message;
        assert!(message.contains("Apply -> https://apply.example.edu"));
        assert!(message.contains("Visit -> /visit"));
    }

    #[test]
    fn unknown_types_are_excluded_with_context() {
        let markup = "<group-primary><stats-grid/></group-primary>";
        let (mapped, log) = run_mapper(
            markup,
            ItemKind::Unknown("Stats Grid".to_string()),
            &AssetLookup::empty(),
        );
        assert!(mapped.is_empty());
        assert_eq!(
            log.entries()[0].context.as_deref(),
            Some("group-primary[1][type=\"Stats Grid\"]")
        );
    }

    #[test]
    fn intro_maps_text_gallery_and_video() {
        let intro = item_element(
            "<group-intro><wysiwyg><p>welcome</p></wysiwyg>\
<gallery-api-id>g-5</gallery-api-id>\
<intro-video><video-source>youtube</video-source><video-id>abc</video-id></intro-video>\
</group-intro>",
        );
        let mut log = MigrationLog::new("/test", "test.xml");
        let assets = AssetLookup::empty();
        let clean = clean_options();
        let context = MapContext { assets: &assets, clean: &clean };
        let mapped = map_intro(&intro, &context, &mut log);
        assert_eq!(mapped.len(), 2);
        assert_eq!(content_type(&mapped[0]), "prose");
        assert_eq!(content_type(&mapped[1]), "media");
        let media = mapped[1].node.child("group-single-media").expect("media");
        assert_eq!(
            media.child("youtube-id").and_then(|node| node.text.as_deref()),
            Some("abc")
        );
        assert!(log.entries().iter().any(|entry| entry.message.contains("manual placement")));
    }
}
