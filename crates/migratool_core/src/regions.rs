//! Region detection.
//!
//! A region's settings flag is tri-state: `On`, explicitly off (the tag is
//! present but does not say `On`), or absent. Explicit-off always wins;
//! content-based auto-detection only applies to the intro region and only
//! when its flag is absent.

use std::collections::BTreeMap;

use crate::origin::{ItemKind, OriginDocument, OriginItem, RegionName};

const SETTINGS_TAG: &str = "group-settings";

/// CTA display modes under which a configured CTA image activates the
/// intro region.
const CTA_IMAGE_MODES: [&str; 2] = ["Image", "Image + Text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionFlag {
    On,
    ExplicitOff,
    Absent,
}

/// Read one region's settings flag.
pub fn region_flag(document: &OriginDocument, region: RegionName) -> RegionFlag {
    let Some(settings) = document.page().find(SETTINGS_TAG) else {
        return RegionFlag::Absent;
    };
    match settings.child(region.as_str()) {
        None => RegionFlag::Absent,
        Some(node) => {
            if node.find_text("value").as_deref() == Some("On") {
                RegionFlag::On
            } else {
                RegionFlag::ExplicitOff
            }
        }
    }
}

/// Which regions are active for this document. Explicit-off regions are
/// never auto-activated regardless of content.
pub fn detect_active_regions(document: &OriginDocument) -> BTreeMap<RegionName, bool> {
    let mut regions = BTreeMap::new();
    for region in RegionName::ALL {
        let active = match region_flag(document, region) {
            RegionFlag::On => true,
            RegionFlag::ExplicitOff => false,
            RegionFlag::Absent => region == RegionName::Intro && intro_has_content(document),
        };
        regions.insert(region, active);
    }
    regions
}

/// Content-based intro activation: non-empty rich text, a configured
/// gallery or video, or a CTA image with a non-root path under an
/// image-bearing CTA display mode.
pub fn intro_has_content(document: &OriginDocument) -> bool {
    let Some(intro) = document.page().find(RegionName::Intro.group_tag()) else {
        return false;
    };

    if intro
        .child("wysiwyg")
        .is_some_and(|wysiwyg| !wysiwyg.is_empty_shell())
    {
        return true;
    }
    if intro
        .find_text("gallery-api-id")
        .is_some_and(|value| !value.is_empty())
    {
        return true;
    }
    if intro
        .find("intro-video")
        .and_then(|video| video.find_text("video-id"))
        .is_some_and(|value| !value.is_empty())
    {
        return true;
    }

    let cta_display = intro.find_text("cta-display").unwrap_or_default();
    if CTA_IMAGE_MODES.contains(&cta_display.as_str())
        && let Some(path) = intro
            .find("cta-image")
            .and_then(|image| image.find_text("path"))
        && !path.is_empty()
        && path != "/"
    {
        return true;
    }
    false
}

/// Active items of a repeating region, in document order. An item is
/// active iff its own status field equals `On`.
pub fn active_items(document: &OriginDocument, region: RegionName) -> Vec<OriginItem<'_>> {
    let mut items = Vec::new();
    for element in document.page().find_all(region.group_tag()) {
        if element.find_text("status").as_deref() != Some("On") {
            continue;
        }
        let kind = ItemKind::from_label(&element.find_text("type").unwrap_or_default());
        items.push(OriginItem {
            element,
            kind,
            index: items.len() + 1,
        });
    }
    items
}
