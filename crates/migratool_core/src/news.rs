//! News-article body mapping.
//!
//! News bodies are a flat run of paragraph-level nodes rather than a
//! regioned page. The walker splits on image roles: full-width images
//! become standalone large media items, floated images become prose-image
//! items (caption from alt text when the marker class is present), and
//! unclassified images are stripped and logged. Text runs between images
//! become prose items.

use crate::assets::AssetLookup;
use crate::dest::{ContentItemBuilder, ContentItemType, NewNode, image_media_group};
use crate::fragment::clean_fragment;
use crate::log::MigrationLog;
use crate::mappers::MapContext;
use crate::origin::OriginDocument;
use crate::sections::{ImageRef, ImageRole};
use crate::xml::{Element, FRAGMENT_TAG, XmlNode};

/// Map a news article's content element into destination items.
pub fn map_news_body(
    content: &Element,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Vec<NewNode> {
    let mut items = Vec::new();
    let mut run = Element::new(FRAGMENT_TAG);

    for node in &content.children {
        match node {
            XmlNode::Text(text) => run.push_text(text),
            XmlNode::Element(element) => {
                let mut paragraph = element.clone();
                let (floated, blocks) = take_classified_images(&mut paragraph, log);

                if let Some(image) = floated {
                    flush_run(&mut run, &mut items, context, log);
                    if let Some(item) =
                        prose_image_item(&mut paragraph, &image, context, log)
                    {
                        items.push(item);
                    } else if !paragraph.is_empty_shell() {
                        run.push_element(paragraph);
                    }
                } else if !paragraph.is_empty_shell() {
                    run.push_element(paragraph);
                }

                for image in blocks {
                    flush_run(&mut run, &mut items, context, log);
                    if let Some(item) = block_media_item(&image, context.assets, log) {
                        items.push(item);
                    }
                }
            }
        }
    }

    flush_run(&mut run, &mut items, context, log);
    items
}

/// Page-type discriminator for the destination: feature stories are
/// exported with a `feature-` filename prefix.
pub fn news_page_type(filename: &str) -> &'static str {
    if filename.starts_with("feature-") {
        "feature-story"
    } else {
        "news"
    }
}

/// Headline for the destination hero heading: the article's own headline
/// field, falling back to the page title.
pub fn news_headline(document: &OriginDocument) -> Option<String> {
    document
        .page()
        .find_text("headline")
        .filter(|value| !value.is_empty())
        .or_else(|| document.metadata().title)
}

fn take_classified_images(
    element: &mut Element,
    log: &mut MigrationLog,
) -> (Option<ImageRef>, Vec<ImageRef>) {
    let mut floated = None;
    let mut blocks = Vec::new();
    take_images_inner(element, &mut floated, &mut blocks, log);
    (floated, blocks)
}

fn take_images_inner(
    element: &mut Element,
    floated: &mut Option<ImageRef>,
    blocks: &mut Vec<ImageRef>,
    log: &mut MigrationLog,
) {
    let previous = std::mem::take(&mut element.children);
    for mut node in previous {
        if let XmlNode::Element(child) = &mut node {
            if child.tag == "img" {
                let image = ImageRef::from_element(child);
                match image.role {
                    ImageRole::FloatedLeft | ImageRole::FloatedRight => {
                        if floated.is_none() {
                            *floated = Some(image);
                        } else {
                            log.warning(format!(
                                "Second floated image removed: {}",
                                image.filename
                            ));
                        }
                    }
                    ImageRole::Block => blocks.push(image),
                    ImageRole::Inline => log.warning(format!(
                        "Unclassified image stripped from article body: {}",
                        image.filename
                    )),
                }
                continue;
            }
            take_images_inner(child, floated, blocks, log);
        }
        element.children.push(node);
    }
}

fn flush_run(
    run: &mut Element,
    items: &mut Vec<NewNode>,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) {
    let mut fragment = std::mem::replace(run, Element::new(FRAGMENT_TAG));
    let report = clean_fragment(&mut fragment, context.clean);
    for filename in &report.removed_images {
        log.warning(format!("Inline image removed: {filename}"));
    }
    for link in &report.pdf_links {
        log.warning(format!("PDF link left fully qualified: {link}"));
    }
    let body = fragment.inner_html().trim().to_string();
    if body.is_empty() {
        return;
    }
    items.push(
        ContentItemBuilder::new(ContentItemType::Prose)
            .body_html(&body)
            .build(),
    );
}

fn prose_image_item(
    paragraph: &mut Element,
    image: &ImageRef,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> Option<NewNode> {
    let Some(asset_id) = context.assets.resolve(&image.src) else {
        log.error(format!("NO ASSET ID FOUND for image: {}", image.filename));
        return None;
    };

    let report = clean_fragment(paragraph, context.clean);
    for filename in &report.removed_images {
        log.warning(format!("Inline image removed: {filename}"));
    }
    let body = paragraph.inner_html().trim().to_string();

    let caption = if image.show_caption && !image.alt_text.is_empty() {
        Some(image.alt_text.as_str())
    } else {
        None
    };
    let position = match image.role {
        ImageRole::FloatedRight => "right",
        _ => "left",
    };
    log.info(format!(
        "Floated article image attached: {} (asset {asset_id})",
        image.filename
    ));
    Some(
        ContentItemBuilder::new(ContentItemType::ProseImage)
            .body_html(&body)
            .push(image_media_group(asset_id, "md", Some(position), caption))
            .build(),
    )
}

fn block_media_item(
    image: &ImageRef,
    assets: &AssetLookup,
    log: &mut MigrationLog,
) -> Option<NewNode> {
    let Some(asset_id) = assets.resolve(&image.src) else {
        log.error(format!("NO ASSET ID FOUND for image: {}", image.filename));
        return None;
    };
    let caption = if image.alt_text.is_empty() {
        None
    } else {
        Some(image.alt_text.as_str())
    };
    log.info(format!(
        "Full-width article image placed: {} (asset {asset_id})",
        image.filename
    ));
    Some(
        ContentItemBuilder::new(ContentItemType::Media)
            .push(image_media_group(asset_id, "lg", None, caption))
            .build(),
    )
}
