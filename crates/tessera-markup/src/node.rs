//! Arena-backed document tree.
//!
//! Nodes refer to each other by [`NodeId`] instead of references, so a tree can
//! be copied into another arena by remapping indices. Parent links are
//! back-references into the same arena.

use std::collections::HashMap;

/// Index of a node inside an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in its arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single element attribute. `value` is `None` for boolean attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// An element node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name
    pub name: String,

    /// Attributes in source order
    pub attrs: Vec<Attribute>,

    /// Whether the tag name is a custom element name
    pub custom: bool,

    /// Whether an ignore rule matched this element
    pub ignored: bool,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            custom: crate::names::is_custom_element(&name),
            name,
            attrs: Vec::new(),
            ignored: false,
        }
    }

    /// Value of an attribute. Boolean attributes yield an empty string.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Set an attribute, replacing an existing one with the same name.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attrs.push(Attribute::new(name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<Attribute> {
        let pos = self.attrs.iter().position(|a| a.name == name)?;
        Some(self.attrs.remove(pos))
    }
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Element(Element),
    Text(String),
    Comment(String),
    Directive(String),
}

/// A node stored in an arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Elements that never have content or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Owner of a node tree. Index 0 is always the root.
#[derive(Debug, Clone)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    /// Create an arena holding a single root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Allocate a detached node.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Allocate a detached fragment root that can hold spliceable children.
    pub fn alloc_fragment(&mut self) -> NodeId {
        self.alloc(NodeKind::Root)
    }

    /// Whether the node is attached below the arena root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current == self.root()
    }

    /// Position of a node among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Remove a node from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` at `index` among `parent`'s children, detaching it first.
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Insert `nodes` right before `anchor`.
    pub fn insert_before(&mut self, anchor: NodeId, nodes: &[NodeId]) {
        let Some(parent) = self.parent(anchor) else {
            return;
        };
        for &node in nodes {
            self.detach(node);
        }
        let Some(mut index) = self.index_in_parent(anchor) else {
            return;
        };
        for &node in nodes {
            self.nodes[parent.0].children.insert(index, node);
            self.nodes[node.0].parent = Some(parent);
            index += 1;
        }
    }

    /// Replace `target` with `nodes` at the same position. `target` ends up detached.
    pub fn replace_with(&mut self, target: NodeId, nodes: &[NodeId]) {
        self.insert_before(target, nodes);
        self.detach(target);
    }

    /// Detach and return all children of `id`.
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for &child in &children {
            self.nodes[child.0].parent = None;
        }
        children
    }

    /// Node ids of the subtree rooted at `id` in document (pre-) order, including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Whether any proper ancestor of `id`, up to but excluding `stop`, satisfies `pred`.
    pub fn has_ancestor_until(
        &self,
        id: NodeId,
        stop: NodeId,
        pred: impl Fn(&NodeKind) -> bool,
    ) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == stop {
                return false;
            }
            if pred(self.kind(node)) {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Copy the subtree rooted at `src` into `into`, returning the new root and
    /// the mapping from old to new ids. The copy is detached.
    pub fn copy_into(&self, src: NodeId, into: &mut Arena) -> (NodeId, HashMap<NodeId, NodeId>) {
        let mut map = HashMap::new();
        let new_root = self.copy_node(src, into, &mut map);
        (new_root, map)
    }

    fn copy_node(&self, src: NodeId, into: &mut Arena, map: &mut HashMap<NodeId, NodeId>) -> NodeId {
        let copy = into.alloc(self.kind(src).clone());
        map.insert(src, copy);
        for &child in self.children(src) {
            let child_copy = self.copy_node(child, into, map);
            into.nodes[child_copy.0].parent = Some(copy);
            into.nodes[copy.0].children.push(child_copy);
        }
        copy
    }

    /// Structural equality of two subtrees, ignoring node identity.
    pub fn subtree_eq(&self, a: NodeId, other: &Arena, b: NodeId) -> bool {
        if self.kind(a) != other.kind(b) {
            return false;
        }
        let (left, right) = (self.children(a), other.children(b));
        left.len() == right.len()
            && left
                .iter()
                .zip(right)
                .all(|(&l, &r)| self.subtree_eq(l, other, r))
    }

    /// Concatenated text of all text descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Whether the node is a text node containing only whitespace.
    pub fn is_blank_text(&self, id: NodeId) -> bool {
        self.text(id).is_some_and(|t| t.trim().is_empty())
    }

    /// Serialize a node and its subtree.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serialize only the children of a node.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Root => {
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Directive(text) => {
                out.push_str("<!");
                out.push_str(text);
                out.push('>');
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for attr in &el.attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    if let Some(value) = &attr.value {
                        out.push_str("=\"");
                        out.push_str(&value.replace('"', "&quot;"));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void_element(&el.name) {
                    return;
                }
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
        }
    }

    /// First element in document order with the given name.
    pub fn find_element(&self, from: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(from)
            .into_iter()
            .find(|&n| self.element(n).is_some_and(|el| el.name == name))
    }
}

/// Escape text for use inside a text node.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for use inside a double-quoted attribute value.
pub fn escape_attribute(text: &str) -> String {
    text.replace('&', "&amp;").replace('"', "&quot;")
}

/// Decode the basic named and numeric character references. Anything else is
/// kept as written.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => {
                    let code = if let Some(hex) = entity.strip_prefix("#x").or(entity.strip_prefix("#X")) {
                        u32::from_str_radix(hex, 16).ok()
                    } else if let Some(dec) = entity.strip_prefix('#') {
                        dec.parse().ok()
                    } else {
                        None
                    };
                    code.and_then(char::from_u32)
                }
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(arena: &mut Arena, name: &str) -> NodeId {
        arena.alloc(NodeKind::Element(Element::new(name)))
    }

    #[test]
    fn append_sets_parent_links() {
        let mut arena = Arena::new();
        let root = arena.root();
        let div = element(&mut arena, "div");
        let text = arena.alloc(NodeKind::Text("hi".into()));

        arena.append(root, div);
        arena.append(div, text);

        assert_eq!(arena.parent(text), Some(div));
        assert_eq!(arena.children(root), &[div]);
        assert!(arena.is_attached(text));
    }

    #[test]
    fn replace_with_splices_in_place() {
        let mut arena = Arena::new();
        let root = arena.root();
        let a = element(&mut arena, "a");
        let b = element(&mut arena, "b");
        let c = element(&mut arena, "c");
        arena.append(root, a);
        arena.append(root, b);
        arena.append(root, c);

        let x = element(&mut arena, "x");
        let y = element(&mut arena, "y");
        arena.replace_with(b, &[x, y]);

        assert_eq!(arena.children(root), &[a, x, y, c]);
        assert_eq!(arena.parent(b), None);
        assert_eq!(arena.parent(y), Some(root));
    }

    #[test]
    fn replace_with_own_children() {
        let mut arena = Arena::new();
        let root = arena.root();
        let slot = element(&mut arena, "slot");
        let text = arena.alloc(NodeKind::Text("fallback".into()));
        arena.append(root, slot);
        arena.append(slot, text);

        let children = arena.children(slot).to_vec();
        arena.replace_with(slot, &children);

        assert_eq!(arena.inner_html(root), "fallback");
    }

    #[test]
    fn copy_into_maps_every_node() {
        let mut arena = Arena::new();
        let root = arena.root();
        let div = element(&mut arena, "div");
        let text = arena.alloc(NodeKind::Text("hello".into()));
        arena.append(root, div);
        arena.append(div, text);

        let mut target = Arena::new();
        let (copy, map) = arena.copy_into(root, &mut target);

        assert_eq!(map.len(), 3);
        assert!(arena.subtree_eq(root, &target, copy));
        assert_eq!(target.parent(map[&text]), Some(map[&div]));
    }

    #[test]
    fn serializes_void_and_boolean_attributes() {
        let mut arena = Arena::new();
        let root = arena.root();
        let input = element(&mut arena, "input");
        if let Some(el) = arena.element_mut(input) {
            el.attrs.push(Attribute::new("disabled", None));
            el.attrs.push(Attribute::new("value", Some("say \"hi\"".into())));
        }
        arena.append(root, input);

        assert_eq!(
            arena.to_html(root),
            r#"<input disabled value="say &quot;hi&quot;">"#
        );
    }

    #[test]
    fn escapes_text() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attribute("\"x\" & y"), "&quot;x&quot; &amp; y");
    }

    #[test]
    fn decodes_character_references() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&#65;&#x42;&quot;"), "AB\"");
        assert_eq!(decode_entities("AT&T &unknown; &"), "AT&T &unknown; &");
    }
}
