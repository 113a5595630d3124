//! DOM tree data structures.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by [`NodeId`].
//! Removing a node frees its whole subtree; freed slots are reused by later inserts.

mod selector;
mod serialize;

pub use selector::Selector;
pub use serialize::is_raw_text_tag;
pub use serialize::is_void;

use core::fmt;
use sf_core::SyncError;
use sf_core::SyncResult;

/// Handle to a node in the DOM arena.
///
/// A handle stops resolving once its node is removed, even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.index, self.generation)
    }
}

/// Payload of a single arena slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
}

/// Tag name and attributes of an element, attributes kept in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Mutable document tree with focus tracking.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<usize>,
    focused: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node {
                    data: NodeData::Document,
                    parent: None,
                    children: Vec::new(),
                }),
            }],
            free: Vec::new(),
            focused: None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId {
            index: 0,
            generation: 0,
        }
    }

    /// Arena slots in use or waiting for reuse.
    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// Nodes currently allocated, attached or not.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_element_with_attrs(tag, Vec::new())
    }

    pub fn create_element_with_attrs(&mut self, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push_node(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs,
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_owned()))
    }

    /// Creates an element as the last child of `parent`, which must be a live element
    /// or the document node.
    pub fn append_new_element(&mut self, parent: NodeId, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        let node = self.create_element_with_attrs(tag, attrs);
        self.link(parent, node, None);
        node
    }

    /// Text counterpart of [`Document::append_new_element`].
    pub fn append_new_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let node = self.create_text(text);
        self.link(parent, node, None);
        node
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let node = Node {
            data,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// True while `node` has not been removed.
    pub fn is_live(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    pub fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.node(node).map(|slot| &slot.data)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.data(node), Some(NodeData::Element(_)))
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match self.data(node) {
            Some(NodeData::Element(element)) => Some(element.tag.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|slot| slot.parent)
    }

    /// Parent when it is an element; the document node is not one.
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|parent| self.is_element(*parent))
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// Pre-order descendants of `node`, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.parent(node),
        }
    }

    /// True when `node` is `ancestor` or sits below it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|candidate| candidate == ancestor)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.root(), node)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> SyncResult<()> {
        self.check_insertable(parent, child)?;
        self.detach(child);
        self.link(parent, child, None);
        Ok(())
    }

    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> SyncResult<()> {
        self.insert_adjacent(reference, node, 0)
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> SyncResult<()> {
        self.insert_adjacent(reference, node, 1)
    }

    fn insert_adjacent(&mut self, reference: NodeId, node: NodeId, offset: usize) -> SyncResult<()> {
        let parent = self.parent(reference).ok_or_else(|| {
            SyncError::new(
                "dom.hierarchy_invalid",
                format!("reference node {reference} has no parent"),
            )
        })?;
        if reference == node {
            return Ok(());
        }
        self.check_insertable(parent, node)?;
        self.detach(node);

        let position = self
            .children(parent)
            .iter()
            .position(|child| *child == reference)
            .ok_or_else(|| {
                SyncError::new(
                    "dom.hierarchy_invalid",
                    format!("node {reference} is not listed under its parent {parent}"),
                )
            })?;
        self.link(parent, node, Some(position + offset));
        Ok(())
    }

    fn link(&mut self, parent: NodeId, child: NodeId, position: Option<usize>) {
        let Some(slot) = self.node_mut(parent) else {
            return;
        };
        if matches!(slot.data, NodeData::Text(_)) {
            return;
        }
        match position {
            Some(position) => slot.children.insert(position, child),
            None => slot.children.push(child),
        }
        if let Some(slot) = self.node_mut(child) {
            slot.parent = Some(parent);
        }
    }

    /// Puts `replacement` where `old` was and removes `old`.
    pub fn replace_with(&mut self, old: NodeId, replacement: NodeId) -> SyncResult<()> {
        self.insert_before(old, replacement)?;
        self.remove(old);
        Ok(())
    }

    /// Removes `node` and frees its subtree. Focus inside it is dropped.
    ///
    /// Move a descendant elsewhere first to keep it.
    pub fn remove(&mut self, node: NodeId) {
        if node == self.root() || !self.is_live(node) {
            return;
        }
        if let Some(focused) = self.focused {
            if self.contains(node, focused) {
                self.focused = None;
            }
        }
        self.detach(node);

        let mut doomed = self.descendants(node);
        doomed.push(node);
        for id in doomed {
            if let Some(slot) = self.slots.get_mut(id.index) {
                slot.node = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    pub fn clear_children(&mut self, node: NodeId) {
        for child in self.children(node).to_vec() {
            self.remove(child);
        }
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(slot) = self.node_mut(parent) {
            slot.children.retain(|child| *child != node);
        }
        if let Some(slot) = self.node_mut(node) {
            slot.parent = None;
        }
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> SyncResult<()> {
        let Some(parent_node) = self.node(parent) else {
            return Err(SyncError::new(
                "dom.node_invalid",
                format!("parent node {parent} does not exist"),
            ));
        };
        if !self.is_live(child) {
            return Err(SyncError::new(
                "dom.node_invalid",
                format!("child node {child} does not exist"),
            ));
        }
        if matches!(parent_node.data, NodeData::Text(_)) {
            return Err(SyncError::new(
                "dom.hierarchy_invalid",
                "text nodes cannot have children",
            ));
        }
        if child == self.root() || self.contains(child, parent) {
            return Err(SyncError::new(
                "dom.hierarchy_invalid",
                format!("inserting node {child} under {parent} would create a cycle"),
            ));
        }
        Ok(())
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match self.data(node) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match self.node_mut(node).map(|slot| &mut slot.data) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn attrs(&self, node: NodeId) -> &[(String, String)] {
        self.element(node)
            .map(|element| element.attrs.as_slice())
            .unwrap_or(&[])
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attrs(node)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        let name = name.to_ascii_lowercase();
        match element.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => element.attrs.push((name, value.to_owned())),
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> bool {
        let Some(element) = self.element_mut(node) else {
            return false;
        };
        let before = element.attrs.len();
        element.attrs.retain(|(key, _)| key != name);
        before != element.attrs.len()
    }

    /// Value of the `id` attribute, treating an empty id as absent.
    pub fn element_id(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "id").filter(|id| !id.is_empty())
    }

    pub fn class_list(&self, node: NodeId) -> Vec<&str> {
        self.attr(node, "class")
            .map(|value| value.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class_list(node).contains(&class)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        self.toggle_class(node, class, true);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        self.toggle_class(node, class, false);
    }

    /// Forces `class` on (`present == true`) or off.
    pub fn toggle_class(&mut self, node: NodeId, class: &str, present: bool) {
        if !self.is_element(node) || self.has_class(node, class) == present {
            return;
        }

        let mut classes: Vec<String> = self
            .class_list(node)
            .into_iter()
            .map(str::to_owned)
            .collect();
        if present {
            classes.push(class.to_owned());
        } else {
            classes.retain(|existing| existing != class);
        }
        self.set_attr(node, "class", &classes.join(" "));
    }

    /// Swaps `old` for `new` in place. Returns false when `old` was not present.
    pub fn replace_class(&mut self, node: NodeId, old: &str, new: &str) -> bool {
        if !self.has_class(node, old) {
            return false;
        }

        let classes: Vec<String> = self
            .class_list(node)
            .into_iter()
            .map(|class| if class == old { new } else { class })
            .fold(Vec::new(), |mut acc, class| {
                if !acc.iter().any(|seen: &String| seen == class) {
                    acc.push(class.to_owned());
                }
                acc
            });
        self.set_attr(node, "class", &classes.join(" "));
        true
    }

    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(NodeData::Text(text)) = self.data(node) {
            return text.clone();
        }

        let mut out = String::new();
        for descendant in self.descendants(node) {
            if let Some(NodeData::Text(text)) = self.data(descendant) {
                out.push_str(text);
            }
        }
        out
    }

    /// Replaces all children with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> SyncResult<()> {
        self.clear_children(node);
        if text.is_empty() {
            return Ok(());
        }
        let text_node = self.create_text(text);
        self.append_child(node, text_node)
    }

    /// First connected element with the given id, in document order.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.descendants(self.root())
            .into_iter()
            .find(|node| self.attr(*node, "id") == Some(id))
    }

    /// First element below `scope` matching `selector`, in document order.
    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|node| selector.matches(self, *node))
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }

    /// Parses `selector` and returns the first match below `scope`.
    pub fn select_first(&self, scope: NodeId, selector: &str) -> SyncResult<Option<NodeId>> {
        let parsed = Selector::parse(selector)?;
        Ok(self.query_selector(scope, &parsed))
    }

    /// Parses `selector` and returns every match below `scope`.
    pub fn select_all(&self, scope: NodeId, selector: &str) -> SyncResult<Vec<NodeId>> {
        let parsed = Selector::parse(selector)?;
        Ok(self.query_selector_all(scope, &parsed))
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> SyncResult<bool> {
        let parsed = Selector::parse(selector)?;
        Ok(parsed.matches(self, node))
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &str) -> SyncResult<Option<NodeId>> {
        let parsed = Selector::parse(selector)?;
        if parsed.matches(self, node) {
            return Ok(Some(node));
        }
        Ok(self
            .ancestors(node)
            .find(|ancestor| parsed.matches(self, *ancestor)))
    }

    /// Deep-copies `source_node` from another document into this one, detached.
    pub fn import_subtree(&mut self, source: &Document, source_node: NodeId) -> SyncResult<NodeId> {
        let data = source.data(source_node).cloned().ok_or_else(|| {
            SyncError::new(
                "dom.node_invalid",
                format!("source node {source_node} does not exist"),
            )
        })?;
        let data = match data {
            NodeData::Document => NodeData::Element(ElementData {
                tag: "template".to_owned(),
                attrs: Vec::new(),
            }),
            other => other,
        };

        let copy = self.push_node(data);
        for child in source.children(source_node).to_vec() {
            let child_copy = self.import_subtree(source, child)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// `target.innerHTML = source_node.innerHTML`, without the string round-trip.
    pub fn replace_children_from(
        &mut self,
        target: NodeId,
        source: &Document,
        source_node: NodeId,
    ) -> SyncResult<()> {
        self.clear_children(target);
        for child in source.children(source_node).to_vec() {
            let copy = self.import_subtree(source, child)?;
            self.append_child(target, copy)?;
        }
        Ok(())
    }

    /// `target.outerHTML = source_node.outerHTML`; returns the node now in `target`'s place.
    pub fn replace_with_import(
        &mut self,
        target: NodeId,
        source: &Document,
        source_node: NodeId,
    ) -> SyncResult<NodeId> {
        let copy = self.import_subtree(source, source_node)?;
        self.replace_with(target, copy)?;
        Ok(copy)
    }

    pub fn focus(&mut self, node: NodeId) {
        if self.is_element(node) && self.is_connected(node) {
            self.focused = Some(node);
        }
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            serialize::write_node(self, *child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        serialize::write_node(self, node, &mut out);
        out
    }
}

/// Iterator over a node's ancestors, nearest first, ending at the document node.
pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.document.parent(current);
        Some(current)
    }
}
