//! Strategies for finding the host's configuration surface

use super::dom::{HostDocument, NodeId, Selector};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Element carrying `name="value"`
    ByAttribute { name: String, value: String },
    /// Element whose class attribute contains the substring
    ByClassSubstring(String),
    /// Parent of the first row whose text carries `label_marker` and that holds an input
    ByStructure { label_marker: String },
}

impl Locator {
    pub fn by_attribute(name: &str, value: &str) -> Self {
        Locator::ByAttribute {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn by_class_substring(needle: &str) -> Self {
        Locator::ByClassSubstring(needle.to_string())
    }

    pub fn by_structure(label_marker: &str) -> Self {
        Locator::ByStructure {
            label_marker: label_marker.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Locator::ByAttribute { .. } => "attribute",
            Locator::ByClassSubstring(_) => "class-substring",
            Locator::ByStructure { .. } => "structure",
        }
    }

    /// Found or not found; never errors
    pub fn locate(&self, doc: &dyn HostDocument) -> Option<NodeId> {
        let root = doc.root();
        match self {
            Locator::ByAttribute { name, value } => doc.query(root, &Selector::attr(name, value)),
            Locator::ByClassSubstring(needle) => doc.query(root, &Selector::class_contains(needle)),
            Locator::ByStructure { label_marker } => locate_by_structure(doc, label_marker),
        }
    }
}

fn locate_by_structure(doc: &dyn HostDocument, marker: &str) -> Option<NodeId> {
    let needle = Selector::text_contains(marker);
    // Innermost element carrying the marker text: the label itself.
    let label = doc
        .query_all(doc.root(), &needle)
        .into_iter()
        .find(|node| doc.query(*node, &needle).is_none())?;

    let input = Selector::tag("input");
    let mut current = Some(label);
    while let Some(node) = current {
        if doc.query(node, &input).is_some() {
            return Some(doc.parent(node).unwrap_or(node));
        }
        current = doc.parent(node);
    }
    None
}

/// Surface strategies in priority order for a host labelled with `label_prefix`
pub fn default_surface_locators(label_prefix: &str) -> Vec<Locator> {
    vec![
        Locator::by_attribute("data-dialog-name", "Indicator Properties"),
        Locator::by_attribute("data-name", "indicator-properties-dialog"),
        Locator::by_class_substring("dialog"),
        Locator::by_structure(label_prefix),
    ]
}

/// First strategy that finds something wins
pub fn locate_first<'a>(
    locators: &'a [Locator],
    doc: &dyn HostDocument,
) -> Option<(NodeId, &'a Locator)> {
    for locator in locators {
        match locator.locate(doc) {
            Some(node) => return Some((node, locator)),
            None => debug!(strategy = locator.kind(), "Locator: no match"),
        }
    }
    None
}
