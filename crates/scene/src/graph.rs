//! Retained scene graph.
//!
//! Nodes live in a slotmap arena owned by the surface. A node is attached when it has a
//! parent; destroying a node detaches it and frees its whole subtree, including any
//! mask shape it references.

use std::sync::Arc;

use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::blur::BlurFilter;
use crate::geometry::Shape;
use crate::texture::Texture;

slotmap::new_key_type! {
    pub struct NodeKey;
}

#[derive(Debug, Clone)]
pub struct Sprite {
    pub texture: Option<Arc<Texture>>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Tiling sprites repeat the texture at its natural size instead of stretching it.
    pub tiling: bool,
}

impl Sprite {
    pub fn from_texture(texture: Arc<Texture>) -> Self {
        let width = texture.natural_width();
        let height = texture.natural_height();
        Self {
            texture: Some(texture),
            x: 0.0,
            y: 0.0,
            width,
            height,
            tiling: false,
        }
    }

    pub fn tiling() -> Self {
        Self {
            texture: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            tiling: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Container,
    Sprite(Sprite),
    /// Only ever drawn as another node's mask.
    Mask(Shape),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    parent: Option<NodeKey>,
    children: SmallVec<[NodeKey; 4]>,
    pub z_index: i32,
    pub sortable_children: bool,
    pub visible: bool,
    pub alpha: f32,
    pub mask: Option<NodeKey>,
    pub filter: Option<BlurFilter>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: SmallVec::new(),
            z_index: 0,
            sortable_children: false,
            visible: true,
            alpha: 1.0,
            mask: None,
            filter: None,
        }
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn sprite(&self) -> Option<&Sprite> {
        match &self.kind {
            NodeKind::Sprite(sprite) => Some(sprite),
            _ => None,
        }
    }

    pub fn sprite_mut(&mut self) -> Option<&mut Sprite> {
        match &mut self.kind {
            NodeKind::Sprite(sprite) => Some(sprite),
            _ => None,
        }
    }

    pub fn shape_mut(&mut self) -> Option<&mut Shape> {
        match &mut self.kind {
            NodeKind::Mask(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn shape(&self) -> Option<&Shape> {
        match &self.kind {
            NodeKind::Mask(shape) => Some(shape),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let mut root = Node::new(NodeKind::Container);
        root.sortable_children = true;
        let root = nodes.insert(root);
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Creates a detached node.
    pub fn insert(&mut self, kind: NodeKind) -> NodeKey {
        self.nodes.insert(Node::new(kind))
    }

    /// Appends `child` under `parent`, detaching it from any previous parent first.
    pub fn add_child(&mut self, parent: NodeKey, child: NodeKey) -> bool {
        if parent == child || !self.nodes.contains_key(parent) || !self.nodes.contains_key(child)
        {
            return false;
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        true
    }

    pub fn detach(&mut self, key: NodeKey) {
        let Some(parent) = self.nodes.get_mut(key).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|child| *child != key);
        }
    }

    /// Detaches `key` and frees it with its subtree and referenced masks. The root is
    /// never freed; destroying it only empties it.
    pub fn destroy(&mut self, key: NodeKey) {
        if key == self.root {
            self.remove_children(key);
            return;
        }
        self.detach(key);
        self.free_subtree(key);
    }

    pub fn remove_children(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        let children = std::mem::take(&mut node.children);
        for child in children {
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent = None;
            }
            self.free_subtree(child);
        }
    }

    fn free_subtree(&mut self, key: NodeKey) {
        let mut pending = vec![key];
        while let Some(current) = pending.pop() {
            let Some(node) = self.nodes.remove(current) else {
                continue;
            };
            pending.extend(node.children);
            if let Some(mask) = node.mask {
                if let Some(mask_node) = self.nodes.get(mask) {
                    if let Some(parent) = mask_node.parent {
                        if let Some(parent_node) = self.nodes.get_mut(parent) {
                            parent_node.children.retain(|child| *child != mask);
                        }
                    }
                }
                pending.push(mask);
            }
        }
    }

    /// Children in draw order: stable z-order when the node sorts its children.
    pub fn draw_order(&self, key: NodeKey) -> SmallVec<[NodeKey; 8]> {
        let Some(node) = self.nodes.get(key) else {
            return SmallVec::new();
        };
        let mut children: SmallVec<[NodeKey; 8]> = node.children.iter().copied().collect();
        if node.sortable_children {
            children.sort_by_key(|child| self.nodes.get(*child).map_or(0, |node| node.z_index));
        }
        children
    }
}
