//! Per-document migration pass.
//!
//! One page is fully detected, split, mapped and grouped before the next
//! begins. Region order is fixed: intro content first, then primary, then
//! secondary. Secondary content opens a new destination section, as does
//! any mapped item carrying an h2→h3 heading override.

use crate::dest::NewSection;
use crate::log::MigrationLog;
use crate::mappers::{MapContext, MappedItem, map_intro, map_item};
use crate::origin::{OriginDocument, RegionName};
use crate::regions::{active_items, detect_active_regions};

#[derive(Debug)]
pub struct PageMigration {
    pub sections: Vec<NewSection>,
    pub content_items: usize,
}

pub fn migrate_document(
    document: &OriginDocument,
    context: &MapContext<'_>,
    log: &mut MigrationLog,
) -> PageMigration {
    let regions = detect_active_regions(document);
    let mut accumulator = SectionAccumulator::new();

    if regions[&RegionName::Intro]
        && let Some(intro) = document.page().find(RegionName::Intro.group_tag())
    {
        for mapped in map_intro(intro, context, log) {
            accumulator.push(mapped);
        }
    }

    for region in [RegionName::Primary, RegionName::Secondary] {
        if !regions[&region] {
            continue;
        }
        let items = active_items(document, region);
        if items.is_empty() {
            continue;
        }
        if region == RegionName::Secondary {
            accumulator.close_group();
        }
        for item in &items {
            for mapped in map_item(item, region, context, log) {
                accumulator.push(mapped);
            }
        }
    }

    let sections = accumulator.finish();
    let content_items = sections.iter().map(|section| section.items.len()).sum();
    if content_items > 0 {
        log.info(format!(
            "Created {} section(s) with {} content item(s)",
            sections.len(),
            content_items
        ));
    }
    PageMigration {
        sections,
        content_items,
    }
}

/// Groups mapped items into destination sections. A heading override
/// closes the running group and opens a headed one.
struct SectionAccumulator {
    done: Vec<NewSection>,
    current: NewSection,
}

impl SectionAccumulator {
    fn new() -> Self {
        Self {
            done: Vec::new(),
            current: NewSection::new(None),
        }
    }

    fn push(&mut self, mapped: MappedItem) {
        if let Some(heading) = mapped.section_heading {
            self.close_group();
            self.current.content_heading = Some(heading);
        }
        self.current.items.push(mapped.node);
    }

    fn close_group(&mut self) {
        if self.current.items.is_empty() {
            self.current.content_heading = None;
            return;
        }
        let finished = std::mem::replace(&mut self.current, NewSection::new(None));
        self.done.push(finished);
    }

    fn finish(mut self) -> Vec<NewSection> {
        self.close_group();
        self.done
    }
}
