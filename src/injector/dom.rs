//! Host document seam and an in-memory implementation.
//!
//! The injector only touches the host page through [`HostDocument`]. Queries
//! follow `querySelectorAll` semantics: descendants of the scope in document
//! order, the scope itself excluded.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `tag`
    Tag(String),
    /// `[name]` or `[name="value"]`
    Attribute { name: String, value: Option<String> },
    /// `[name*="needle"]`
    AttributeContains { name: String, needle: String },
    /// `[class*="needle"]`
    ClassContains(String),
    /// `input[type="kind"]`
    InputType(String),
    /// Elements whose text content contains the needle
    TextContains(String),
}

impl Selector {
    pub fn tag(tag: &str) -> Self {
        Selector::Tag(tag.to_string())
    }

    pub fn attr(name: &str, value: &str) -> Self {
        Selector::Attribute {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    pub fn attr_contains(name: &str, needle: &str) -> Self {
        Selector::AttributeContains {
            name: name.to_string(),
            needle: needle.to_string(),
        }
    }

    pub fn class_contains(needle: &str) -> Self {
        Selector::ClassContains(needle.to_string())
    }

    pub fn input_type(kind: &str) -> Self {
        Selector::InputType(kind.to_string())
    }

    pub fn text_contains(needle: &str) -> Self {
        Selector::TextContains(needle.to_string())
    }
}

/// Events the injector dispatches so the host believes a user typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
    KeyUp,
    DoubleClick,
}

pub trait HostDocument: Send + Sync {
    fn root(&self) -> NodeId;

    fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId>;

    fn query(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.query_all(scope, selector).into_iter().next()
    }

    /// First match of the first selector that matches anything
    fn query_first_of(&self, scope: NodeId, selectors: &[Selector]) -> Option<NodeId> {
        selectors.iter().find_map(|s| self.query(scope, s))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn text_content(&self, node: NodeId) -> String;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// `checked` property or `aria-checked="true"`
    fn is_checked(&self, node: NodeId) -> bool;

    fn click(&self, node: NodeId);

    fn focus(&self, node: NodeId);

    /// Write the value through the element's own setter, skipping any
    /// property interception the host framework installed.
    fn set_native_value(&self, node: NodeId, value: &str);

    fn dispatch(&self, node: NodeId, event: DomEvent);

    /// Attach an overlay with the given id, replacing any previous one
    fn mount_overlay(&self, overlay_id: &str, content: &str);

    fn remove_overlay(&self, overlay_id: &str) -> bool;
}

/// Element description used to build a [`VirtualDocument`]
#[derive(Debug, Clone, Default)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    value: String,
    checked: bool,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_class(self, class: &str) -> Self {
        self.with_attr("class", class)
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn is_toggle(&self) -> bool {
        (self.tag == "input" && self.attr("type") == Some("checkbox"))
            || self.attr("role") == Some("checkbox")
            || self.attr("class").is_some_and(|c| c.contains("switcher"))
    }

    fn is_dropdown(&self) -> bool {
        self.tag == "select"
            || self.attr("role") == Some("listbox")
            || self.attr("class").is_some_and(|c| c.contains("dropdown"))
    }

    fn is_option(&self) -> bool {
        self.attr("role") == Some("option")
            || self.attr("class").is_some_and(|c| c.contains("menuItem"))
    }
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<Element>,
    events: Vec<(NodeId, DomEvent)>,
    clicks: Vec<NodeId>,
    focused: Option<NodeId>,
    open_dropdown: Option<NodeId>,
}

impl Tree {
    fn node(&self, id: NodeId) -> &Element {
        &self.nodes[id.0]
    }

    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(scope).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    fn text_content(&self, id: NodeId) -> String {
        let mut text = self.node(id).text.clone();
        for child in self.descendants(id) {
            text.push_str(&self.node(child).text);
        }
        text
    }

    fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        let el = self.node(id);
        match selector {
            Selector::Tag(tag) => el.tag.eq_ignore_ascii_case(tag),
            Selector::Attribute { name, value } => match (el.attr(name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
            Selector::AttributeContains { name, needle } => {
                el.attr(name).is_some_and(|v| v.contains(needle.as_str()))
            }
            Selector::ClassContains(needle) => {
                el.attr("class").is_some_and(|v| v.contains(needle.as_str()))
            }
            Selector::InputType(kind) => {
                el.tag == "input" && el.attr("type") == Some(kind.as_str())
            }
            Selector::TextContains(needle) => self.text_content(id).contains(needle.as_str()),
        }
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    fn append(&mut self, parent: NodeId, mut element: Element) -> NodeId {
        let id = NodeId(self.nodes.len());
        element.parent = Some(parent);
        element.children.clear();
        self.nodes.push(element);
        self.nodes[parent.0].children.push(id);
        id
    }
}

/// In-memory document for headless runs and tests.
///
/// Clicks behave like a minimal host: toggles flip, dropdowns open, and an
/// option clicked while a dropdown is open becomes that dropdown's value.
#[derive(Debug)]
pub struct VirtualDocument {
    tree: Mutex<Tree>,
}

impl Default for VirtualDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDocument {
    pub fn new() -> Self {
        let tree = Tree {
            nodes: vec![Element::new("body")],
            ..Default::default()
        };
        Self {
            tree: Mutex::new(tree),
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, parent: NodeId, element: Element) -> NodeId {
        self.tree().append(parent, element)
    }

    pub fn remove(&self, node: NodeId) {
        self.tree().detach(node);
    }

    pub fn value(&self, node: NodeId) -> String {
        self.tree().node(node).value.clone()
    }

    pub fn events(&self, node: NodeId) -> Vec<DomEvent> {
        self.tree()
            .events
            .iter()
            .filter(|(id, _)| *id == node)
            .map(|(_, e)| *e)
            .collect()
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.tree().clicks.clone()
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.tree().focused
    }
}

impl HostDocument for VirtualDocument {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let tree = self.tree();
        tree.descendants(scope)
            .into_iter()
            .filter(|id| tree.matches(*id, selector))
            .collect()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree().node(node).parent
    }

    fn text_content(&self, node: NodeId) -> String {
        self.tree().text_content(node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree().node(node).attr(name).map(str::to_string)
    }

    fn is_checked(&self, node: NodeId) -> bool {
        let tree = self.tree();
        let el = tree.node(node);
        el.checked || el.attr("aria-checked") == Some("true")
    }

    fn click(&self, node: NodeId) {
        let mut tree = self.tree();
        tree.clicks.push(node);

        let (toggle, dropdown, option) = {
            let el = tree.node(node);
            (el.is_toggle(), el.is_dropdown(), el.is_option())
        };

        if toggle {
            let checked = {
                let el = tree.node(node);
                el.checked || el.attr("aria-checked") == Some("true")
            };
            let el = &mut tree.nodes[node.0];
            el.checked = !checked;
            if el.attributes.contains_key("aria-checked") {
                el.attributes
                    .insert("aria-checked".to_string(), (!checked).to_string());
            }
        } else if dropdown {
            tree.open_dropdown = Some(node);
        } else if option {
            if let Some(open) = tree.open_dropdown.take() {
                let label = tree.text_content(node);
                tree.nodes[open.0].value = label;
            }
        }
    }

    fn focus(&self, node: NodeId) {
        self.tree().focused = Some(node);
    }

    fn set_native_value(&self, node: NodeId, value: &str) {
        self.tree().nodes[node.0].value = value.to_string();
    }

    fn dispatch(&self, node: NodeId, event: DomEvent) {
        self.tree().events.push((node, event));
    }

    fn mount_overlay(&self, overlay_id: &str, content: &str) {
        let mut tree = self.tree();
        let root = NodeId(0);
        let existing: Vec<NodeId> = tree
            .descendants(root)
            .into_iter()
            .filter(|id| tree.node(*id).attr("id") == Some(overlay_id))
            .collect();
        for id in existing {
            tree.detach(id);
        }
        let overlay = Element::new("div")
            .with_attr("id", overlay_id)
            .with_text(content);
        tree.append(root, overlay);
    }

    fn remove_overlay(&self, overlay_id: &str) -> bool {
        let mut tree = self.tree();
        let existing: Vec<NodeId> = tree
            .descendants(NodeId(0))
            .into_iter()
            .filter(|id| tree.node(*id).attr("id") == Some(overlay_id))
            .collect();
        let found = !existing.is_empty();
        for id in existing {
            tree.detach(id);
        }
        found
    }
}
