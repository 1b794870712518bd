use anyhow::{Context, Result, bail};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Tag used for the synthetic root wrapped around parsed fragments.
pub const FRAGMENT_TAG: &str = "fragment";

const VOID_TAGS: [&str; 4] = ["br", "wbr", "hr", "img"];

/// One node of a mixed-content tree: markup element or a text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(Element),
    Text(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }
}

/// An element with ordered attributes and interleaved text/element children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            entry.1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }

    pub fn push_text(&mut self, text: &str) {
        self.children.push(XmlNode::Text(text.to_string()));
    }

    pub fn push_element(&mut self, element: Element) {
        self.children.push(XmlNode::Element(element));
    }

    /// First direct child element with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.child_elements().find(|element| element.tag == tag)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// First descendant element with the given tag, depth first.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        for element in self.child_elements() {
            if element.tag == tag {
                return Some(element);
            }
            if let Some(found) = element.find(tag) {
                return Some(found);
            }
        }
        None
    }

    /// All descendant elements with the given tag, in document order.
    pub fn find_all(&self, tag: &str) -> Vec<&Element> {
        let mut output = Vec::new();
        collect_named(self, tag, &mut output);
        output
    }

    /// Trimmed text content of the first descendant with the given tag.
    pub fn find_text(&self, tag: &str) -> Option<String> {
        self.find(tag)
            .map(|element| element.text_content().trim().to_string())
    }

    /// All descendant text runs concatenated, markup dropped.
    pub fn text_content(&self) -> String {
        let mut output = String::new();
        collect_text(self, &mut output);
        output
    }

    /// True when the element holds neither non-whitespace text nor child elements.
    pub fn is_empty_shell(&self) -> bool {
        self.children.iter().all(|node| match node {
            XmlNode::Element(_) => false,
            XmlNode::Text(text) => text.trim().is_empty(),
        })
    }

    /// Serialize the children only, as an HTML string.
    pub fn inner_html(&self) -> String {
        let mut output = String::new();
        for node in &self.children {
            write_node(node, &mut output);
        }
        output
    }

    /// Serialize the element itself, as an HTML string.
    pub fn to_html(&self) -> String {
        let mut output = String::new();
        write_element(self, &mut output);
        output
    }
}

fn collect_named<'a>(element: &'a Element, tag: &str, output: &mut Vec<&'a Element>) {
    for child in element.child_elements() {
        if child.tag == tag {
            output.push(child);
        }
        collect_named(child, tag, output);
    }
}

fn collect_text(element: &Element, output: &mut String) {
    for node in &element.children {
        match node {
            XmlNode::Text(text) => output.push_str(text),
            XmlNode::Element(child) => collect_text(child, output),
        }
    }
}

/// Parse a complete document and return its single root element.
pub fn parse_document(xml: &str) -> Result<Element> {
    let mut roots = parse_nodes(xml)?;
    let mut iterator = roots.drain(..).filter_map(|node| match node {
        XmlNode::Element(element) => Some(element),
        XmlNode::Text(_) => None,
    });
    let root = iterator.next().context("document has no root element")?;
    if iterator.next().is_some() {
        bail!("document has more than one root element");
    }
    Ok(root)
}

/// Parse markup that may have several top-level nodes, wrapping the result
/// in a synthetic root so text runs at the edges survive.
pub fn parse_fragment(markup: &str) -> Result<Element> {
    let nodes = parse_nodes(markup)?;
    let mut root = Element::new(FRAGMENT_TAG);
    root.children = nodes;
    Ok(root)
}

fn parse_nodes(markup: &str) -> Result<Vec<XmlNode>> {
    // WYSIWYG exports carry a handful of HTML-only named entities that a
    // strict XML reader rejects; fold them to numeric references up front.
    let prepared = markup
        .replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&rsquo;", "&#8217;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rdquo;", "&#8221;")
        .replace("&ldquo;", "&#8220;");

    let mut reader = Reader::from_str(&prepared);
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<Element> = Vec::new();
    let mut roots: Vec<XmlNode> = Vec::new();

    loop {
        match reader.read_event().context("malformed markup")? {
            Event::Start(start) => {
                let element = element_from_start(&start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(XmlNode::Element(element), &mut stack, &mut roots);
            }
            Event::End(_) => {
                let Some(done) = stack.pop() else {
                    bail!("unbalanced closing tag in markup");
                };
                attach(XmlNode::Element(done), &mut stack, &mut roots);
            }
            Event::Text(text) => {
                let value = text.unescape().context("bad text escape")?.into_owned();
                if !value.is_empty() {
                    attach(XmlNode::Text(value), &mut stack, &mut roots);
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                if !value.is_empty() {
                    attach(XmlNode::Text(value), &mut stack, &mut roots);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        bail!("unclosed element in markup");
    }
    Ok(roots)
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<Element> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(&tag);
    for attribute in start.attributes() {
        let attribute = attribute.context("malformed attribute")?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .context("bad attribute escape")?
            .into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

fn attach(node: XmlNode, stack: &mut [Element], roots: &mut Vec<XmlNode>) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else {
        roots.push(node);
    }
}

fn write_node(node: &XmlNode, output: &mut String) {
    match node {
        XmlNode::Text(text) => output.push_str(&escape_text(text)),
        XmlNode::Element(element) => write_element(element, output),
    }
}

fn write_element(element: &Element, output: &mut String) {
    output.push('<');
    output.push_str(&element.tag);
    for (key, value) in &element.attrs {
        output.push(' ');
        output.push_str(key);
        output.push_str("=\"");
        output.push_str(&escape_attr(value));
        output.push('"');
    }
    if element.children.is_empty() && VOID_TAGS.contains(&element.tag.as_str()) {
        output.push_str("/>");
        return;
    }
    output.push('>');
    for child in &element.children {
        write_node(child, output);
    }
    output.push_str("</");
    output.push_str(&element.tag);
    output.push('>');
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
