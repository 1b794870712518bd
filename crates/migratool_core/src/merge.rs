//! Template merge engine.
//!
//! The live destination document already contains one instance of every
//! content-item template. New content is grafted in by cloning the first
//! section-container node and populating the clone from sparse new-data
//! trees, keyed by field identifier. Fields the new data does not mention
//! are retained from the template, and nodes this engine does not touch
//! pass through byte-for-byte.

use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};

use crate::dest::{
    CONTENT_ITEM_IDENT, NewNode, NewSection, SECTION_HEADING_IDENT, SECTION_IDENT,
    SECTION_MODE_IDENT, SENTINEL_IDENT, STATUS_IDENT, SUMMARY_IDENT,
};

pub fn node_identifier(node: &Value) -> Option<&str> {
    node.get("identifier").and_then(Value::as_str)
}

/// Merge newly produced sections and the rendered migration summary into
/// the live document's structured-data nodes.
///
/// Structural preconditions (template section present, summary field
/// present) abort with an error; everything else is preserved.
pub fn merge_into_live_document(
    current_nodes: &[Value],
    sections: &[NewSection],
    summary_html: &str,
) -> Result<Vec<Value>> {
    let template = current_nodes
        .iter()
        .find(|node| node_identifier(node) == Some(SECTION_IDENT))
        .context("live document has no section template node")?;

    let mut pending = sections
        .iter()
        .map(|section| clone_section(template, section))
        .collect::<Result<Vec<_>>>()?;

    let mut result = Vec::with_capacity(current_nodes.len() + pending.len());
    let mut summary_updated = false;
    let mut first_placed = false;

    for node in current_nodes {
        match node_identifier(node) {
            Some(SECTION_IDENT) if !sections.is_empty() => {
                if !first_placed {
                    result.push(pending.remove(0));
                    first_placed = true;
                }
                // Placeholder sections beyond the first are replaced.
            }
            Some(SUMMARY_IDENT) => {
                let mut updated = node.clone();
                if let Some(object) = updated.as_object_mut() {
                    object.insert("text".to_string(), json!(summary_html));
                }
                result.push(updated);
                summary_updated = true;
            }
            _ => result.push(node.clone()),
        }
    }

    if !summary_updated {
        bail!("live document has no migration-summary field");
    }

    let insert_at = result
        .iter()
        .position(|node| node_identifier(node) == Some(SENTINEL_IDENT))
        .unwrap_or(result.len());
    for (offset, section) in pending.into_iter().enumerate() {
        result.insert(insert_at + offset, section);
    }

    Ok(result)
}

/// Clone the template section for one group of new content items. The
/// clone keeps every template field, replaces the placeholder content
/// items one-for-one, and is activated for rendering.
fn clone_section(template: &Value, section: &NewSection) -> Result<Value> {
    let mut clone = template.clone();
    let children = clone
        .get_mut("structuredDataNodes")
        .and_then(Value::as_array_mut)
        .context("section template has no structuredDataNodes")?;

    let item_template = children
        .iter()
        .find(|child| node_identifier(child) == Some(CONTENT_ITEM_IDENT))
        .cloned()
        .context("section template has no content-item slot")?;
    let first_index = children
        .iter()
        .position(|child| node_identifier(child) == Some(CONTENT_ITEM_IDENT))
        .unwrap_or(children.len());
    children.retain(|child| node_identifier(child) != Some(CONTENT_ITEM_IDENT));

    for (offset, item) in section.items.iter().enumerate() {
        children.insert(
            first_index + offset,
            clone_node_with_values(&item_template, item),
        );
    }

    set_child_text(children, SECTION_MODE_IDENT, "flow");
    set_child_text(children, STATUS_IDENT, "true");
    if let Some(heading) = &section.content_heading {
        set_child_text(children, SECTION_HEADING_IDENT, heading);
    }
    Ok(clone)
}

/// Deep-clone a template node, populating values from the sparse source
/// tree by identifier. Group children present in the template but absent
/// from the source are retained as-is; repeating source children clone
/// the first matching template child once per entry.
pub fn clone_node_with_values(template: &Value, source: &NewNode) -> Value {
    let mut cloned = template.clone();
    match cloned.get("type").and_then(Value::as_str) {
        Some("asset") => {
            if let Some(path) = source
                .child("path")
                .and_then(|child| child.text.as_deref())
                .filter(|path| !path.is_empty() && *path != "/")
            {
                if let Some(object) = cloned.as_object_mut() {
                    object.insert("pagePath".to_string(), json!(path));
                }
            }
        }
        Some("group") => {
            let template_children = cloned
                .get("structuredDataNodes")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let mut new_children = Vec::with_capacity(template_children.len());
            let mut seen = HashSet::new();

            for template_child in &template_children {
                let Some(identifier) = node_identifier(template_child) else {
                    new_children.push(template_child.clone());
                    continue;
                };
                if !seen.insert(identifier.to_string()) {
                    continue;
                }
                let matching = source
                    .children
                    .iter()
                    .filter(|child| child.identifier == identifier)
                    .collect::<Vec<_>>();
                if matching.is_empty() {
                    new_children.push(template_child.clone());
                } else {
                    for entry in matching {
                        new_children.push(clone_node_with_values(template_child, entry));
                    }
                }
            }
            if let Some(object) = cloned.as_object_mut() {
                object.insert(
                    "structuredDataNodes".to_string(),
                    Value::Array(new_children),
                );
            }
        }
        _ => match source.text.as_deref().filter(|text| !text.is_empty()) {
            Some(text) => {
                if let Some(object) = cloned.as_object_mut() {
                    object.insert("text".to_string(), json!(text));
                }
            }
            None => {
                if let Some(object) = cloned.as_object_mut() {
                    object.remove("text");
                }
            }
        },
    }
    cloned
}

/// Set a top-level text field in a merged node list. Returns whether the
/// field was present.
pub fn set_top_level_text(nodes: &mut [Value], identifier: &str, value: &str) -> bool {
    for node in nodes.iter_mut() {
        if node_identifier(node) == Some(identifier)
            && node.get("type").and_then(Value::as_str) == Some("text")
        {
            if let Some(object) = node.as_object_mut() {
                object.insert("text".to_string(), json!(value));
            }
            return true;
        }
    }
    false
}

/// Set a text field nested in a top-level group node. Returns whether both
/// the group and the field were present.
pub fn set_group_child_text(
    nodes: &mut [Value],
    group_identifier: &str,
    child_identifier: &str,
    value: &str,
) -> bool {
    for node in nodes.iter_mut() {
        if node_identifier(node) != Some(group_identifier) {
            continue;
        }
        if let Some(children) = node
            .get_mut("structuredDataNodes")
            .and_then(Value::as_array_mut)
        {
            set_child_text(children, child_identifier, value);
            return children
                .iter()
                .any(|child| node_identifier(child) == Some(child_identifier));
        }
    }
    false
}

fn set_child_text(children: &mut [Value], identifier: &str, value: &str) {
    for child in children {
        if node_identifier(child) == Some(identifier)
            && child.get("type").and_then(Value::as_str) == Some("text")
        {
            if let Some(object) = child.as_object_mut() {
                object.insert("text".to_string(), json!(value));
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{clone_node_with_values, merge_into_live_document, node_identifier};
    use crate::dest::{NewNode, NewSection};

    fn text_node(identifier: &str, text: Option<&str>) -> Value {
        let mut node = json!({
            "type": "text",
            "identifier": identifier,
            "recycled": false
        });
        if let Some(text) = text {
            node["text"] = json!(text);
        }
        node
    }

    fn section_template() -> Value {
        json!({
            "type": "group",
            "identifier": "group-page-section-item",
            "recycled": false,
            "structuredDataNodes": [
                text_node("section-mode", Some("full")),
                text_node("content-heading", None),
                {
                    "type": "group",
                    "identifier": "group-section-content-item",
                    "recycled": false,
                    "structuredDataNodes": [
                        text_node("content-item-type", None),
                        text_node("wysiwyg", None),
                        {
                            "type": "group",
                            "identifier": "group-content-heading",
                            "structuredDataNodes": [
                                text_node("heading-text", None),
                                text_node("heading-level", Some("h2")),
                                {
                                    "type": "asset",
                                    "identifier": "heading-link",
                                    "assetType": "page"
                                }
                            ]
                        },
                        {
                            "type": "group",
                            "identifier": "group-accordion",
                            "structuredDataNodes": [
                                text_node("layout", Some("large")),
                                {
                                    "type": "group",
                                    "identifier": "group-panel",
                                    "structuredDataNodes": [
                                        text_node("heading", None),
                                        text_node("display", Some("Collapsed")),
                                        text_node("wysiwyg", None)
                                    ]
                                }
                            ]
                        }
                    ]
                },
                text_node("bool-status", Some("false"))
            ]
        })
    }

    fn live_document() -> Vec<Value> {
        vec![
            text_node("page-type", Some("standard")),
            text_node("source-content", Some("<p>legacy snapshot &amp; markup</p>")),
            section_template(),
            json!({
                "type": "group",
                "identifier": "group-cta-banner",
                "structuredDataNodes": [ text_node("cta-label", Some("Apply")) ]
            }),
            text_node("migration-summary", Some("old summary")),
        ]
    }

    fn prose_item(body: &str) -> NewNode {
        NewNode::group(
            "group-section-content-item",
            vec![
                NewNode::text("content-item-type", "prose"),
                NewNode::text("wysiwyg", body),
            ],
        )
    }

    #[test]
    fn untouched_fields_round_trip_unchanged() {
        let live = live_document();
        let mut section = NewSection::new(None);
        section.items.push(prose_item("<p>new</p>"));
        let merged = merge_into_live_document(&live, &[section], "<ul/>").expect("merge");

        assert_eq!(merged[0], live[0]);
        assert_eq!(merged[1], live[1]);
        let banner = merged
            .iter()
            .find(|node| node_identifier(node) == Some("group-cta-banner"))
            .expect("banner");
        assert_eq!(banner, &live[3]);
    }

    #[test]
    fn populated_section_is_activated_and_set_to_flow() {
        let live = live_document();
        let mut section = NewSection::new(Some("Overview".to_string()));
        section.items.push(prose_item("<p>new</p>"));
        let merged = merge_into_live_document(&live, &[section], "<ul/>").expect("merge");

        let section = merged
            .iter()
            .find(|node| node_identifier(node) == Some("group-page-section-item"))
            .expect("section");
        let children = section["structuredDataNodes"].as_array().expect("children");
        let field = |identifier: &str| {
            children
                .iter()
                .find(|child| node_identifier(child) == Some(identifier))
                .and_then(|child| child.get("text"))
                .and_then(Value::as_str)
        };
        assert_eq!(field("bool-status"), Some("true"));
        assert_eq!(field("section-mode"), Some("flow"));
        assert_eq!(field("content-heading"), Some("Overview"));
    }

    #[test]
    fn template_fields_absent_from_new_data_are_retained() {
        let live = live_document();
        let mut section = NewSection::new(None);
        section.items.push(prose_item("<p>new</p>"));
        let merged = merge_into_live_document(&live, &[section], "<ul/>").expect("merge");

        let section = merged
            .iter()
            .find(|node| node_identifier(node) == Some("group-page-section-item"))
            .expect("section");
        let item = section["structuredDataNodes"]
            .as_array()
            .expect("children")
            .iter()
            .find(|child| node_identifier(child) == Some("group-section-content-item"))
            .expect("item")
            .clone();
        let children = item["structuredDataNodes"].as_array().expect("item children");

        assert_eq!(
            children
                .iter()
                .find(|child| node_identifier(child) == Some("wysiwyg"))
                .and_then(|child| child.get("text"))
                .and_then(Value::as_str),
            Some("<p>new</p>")
        );
        // The untouched heading group keeps its full template shape,
        // including the asset chooser and its vendor fields.
        let heading = children
            .iter()
            .find(|child| node_identifier(child) == Some("group-content-heading"))
            .expect("heading group");
        let heading_children = heading["structuredDataNodes"].as_array().expect("nodes");
        assert!(heading_children.iter().any(|child| {
            node_identifier(child) == Some("heading-link")
                && child.get("assetType").and_then(Value::as_str) == Some("page")
        }));
    }

    #[test]
    fn repeating_groups_clone_once_per_source_entry() {
        let item_template = section_template()["structuredDataNodes"][2].clone();
        let source = NewNode::group(
            "group-section-content-item",
            vec![
                NewNode::text("content-item-type", "accordion"),
                NewNode::group(
                    "group-accordion",
                    vec![
                        NewNode::text("layout", "large"),
                        NewNode::group(
                            "group-panel",
                            vec![NewNode::text("heading", "One")],
                        ),
                        NewNode::group(
                            "group-panel",
                            vec![NewNode::text("heading", "Two")],
                        ),
                    ],
                ),
            ],
        );
        let cloned = clone_node_with_values(&item_template, &source);
        let accordion = cloned["structuredDataNodes"]
            .as_array()
            .expect("children")
            .iter()
            .find(|child| node_identifier(child) == Some("group-accordion"))
            .expect("accordion")
            .clone();
        let panels: Vec<_> = accordion["structuredDataNodes"]
            .as_array()
            .expect("nodes")
            .iter()
            .filter(|child| node_identifier(child) == Some("group-panel"))
            .cloned()
            .collect();
        assert_eq!(panels.len(), 2);
        // Each clone keeps the template's display default.
        for panel in &panels {
            let display = panel["structuredDataNodes"]
                .as_array()
                .expect("panel nodes")
                .iter()
                .find(|child| node_identifier(child) == Some("display"))
                .and_then(|child| child.get("text"))
                .and_then(Value::as_str);
            assert_eq!(display, Some("Collapsed"));
        }
    }

    #[test]
    fn asset_nodes_take_page_paths_from_source() {
        let template = json!({
            "type": "asset",
            "identifier": "heading-link",
            "assetType": "page"
        });
        let source = NewNode::group(
            "heading-link",
            vec![NewNode::text("path", "/about/history")],
        );
        let cloned = clone_node_with_values(&template, &source);
        assert_eq!(cloned["pagePath"], json!("/about/history"));

        let root_only = NewNode::group("heading-link", vec![NewNode::text("path", "/")]);
        let cloned = clone_node_with_values(&template, &root_only);
        assert!(cloned.get("pagePath").is_none());
    }

    #[test]
    fn extra_sections_insert_before_the_sentinel() {
        let live = live_document();
        let mut first = NewSection::new(None);
        first.items.push(prose_item("<p>one</p>"));
        let mut second = NewSection::new(None);
        second.items.push(prose_item("<p>two</p>"));
        let merged =
            merge_into_live_document(&live, &[first, second], "<ul/>").expect("merge");

        let idents: Vec<_> = merged.iter().filter_map(node_identifier).collect();
        let first_section = idents
            .iter()
            .position(|identifier| *identifier == "group-page-section-item")
            .expect("first");
        let second_section = idents
            .iter()
            .rposition(|identifier| *identifier == "group-page-section-item")
            .expect("second");
        let sentinel = idents
            .iter()
            .position(|identifier| *identifier == "group-cta-banner")
            .expect("sentinel");
        assert!(first_section < second_section);
        assert!(second_section < sentinel);
    }

    #[test]
    fn summary_is_replaced_wholesale() {
        let live = live_document();
        let merged = merge_into_live_document(&live, &[], "<ul><li>INFO</li></ul>").expect("merge");
        let summary = merged
            .iter()
            .find(|node| node_identifier(node) == Some("migration-summary"))
            .expect("summary");
        assert_eq!(summary["text"], json!("<ul><li>INFO</li></ul>"));
        // With no new sections the placeholder section is left alone.
        assert!(
            merged
                .iter()
                .any(|node| node_identifier(node) == Some("group-page-section-item"))
        );
    }

    #[test]
    fn top_level_and_group_fields_can_be_set() {
        let mut nodes = vec![
            text_node("page-type", Some("standard")),
            json!({
                "type": "group",
                "identifier": "group-hero",
                "structuredDataNodes": [ text_node("heading", None) ]
            }),
        ];
        assert!(super::set_top_level_text(&mut nodes, "page-type", "news"));
        assert!(super::set_group_child_text(&mut nodes, "group-hero", "heading", "Big News"));
        assert!(!super::set_top_level_text(&mut nodes, "absent", "x"));
        assert_eq!(nodes[0]["text"], json!("news"));
        assert_eq!(
            nodes[1]["structuredDataNodes"][0]["text"],
            json!("Big News")
        );
    }

    #[test]
    fn missing_template_section_is_a_structural_failure() {
        let live = vec![text_node("migration-summary", None)];
        let error = merge_into_live_document(&live, &[], "<ul/>").expect_err("must fail");
        assert!(error.to_string().contains("section template"));
    }

    #[test]
    fn missing_summary_field_is_a_structural_failure() {
        let live = vec![section_template()];
        let error = merge_into_live_document(&live, &[], "<ul/>").expect_err("must fail");
        assert!(error.to_string().contains("migration-summary"));
    }
}
