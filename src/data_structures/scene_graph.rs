//! Scene graph and hierarchical scene organization.
//!
//! A [`SceneAsset`] is an arena of [`SceneNode`]s addressed by [`NodeId`].
//! The parsed asset acts as an immutable template: the loader hands out
//! shared references and every consumer clones the whole arena before it
//! hides nodes, rewrites materials or moves the root. Node ids stay valid
//! across a clone, so a [`NodeId`] taken from a template can address the same
//! node in any of its copies.

use cgmath::{Matrix4, Point3, Transform};

use crate::data_structures::{
    bounds::Aabb, instance::Instance, material::Material, mesh::Mesh,
};

/// Index of a node inside its owning [`SceneAsset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub local: Instance,
    pub mesh: Option<Mesh>,
    pub visible: bool,
}

impl SceneNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            local: Instance::default(),
            mesh: None,
            visible: true,
        }
    }

    pub fn with_local(mut self, local: Instance) -> Self {
        self.local = local;
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneAsset {
    source: String,
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
    pub materials: Vec<Material>,
    /// Transform applied on top of every root node. Placement code (composer,
    /// fitment) only ever writes this, never the authored node transforms.
    pub root: Instance,
}

impl SceneAsset {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            nodes: Vec::new(),
            roots: Vec::new(),
            materials: Vec::new(),
            root: Instance::default(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Appends `node` under `parent` (or as a root) and returns its id.
    pub fn add_node(&mut self, parent: Option<NodeId>, mut node: SceneNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = parent;
        node.children.clear();
        self.nodes.push(node);
        match parent.and_then(|p| self.nodes.get_mut(p.0)) {
            Some(parent_node) => parent_node.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in depth-first pre-order (parents before children).
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// Ids of `id` and everything below it, pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node(current) {
                order.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    pub fn parent_of(&self, id: NodeId) -> Option<&SceneNode> {
        self.node(id)
            .and_then(|node| node.parent)
            .and_then(|parent| self.node(parent))
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.node(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.node(parent).and_then(|node| node.parent);
        }
        false
    }

    /// World transform of a node, root transform included.
    pub fn world_transform(&self, id: NodeId) -> Instance {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.node(node_id) {
                Some(node) => {
                    chain.push(node.local);
                    current = node.parent;
                }
                None => break,
            }
        }
        chain
            .iter()
            .rev()
            .fold(self.root, |parent, local| &parent * local)
    }

    pub fn world_matrix(&self, id: NodeId) -> Matrix4<f32> {
        let mut matrix = Matrix4::from_scale(1.0);
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.node(node_id) {
                Some(node) => {
                    matrix = node.local.to_matrix() * matrix;
                    current = node.parent;
                }
                None => break,
            }
        }
        self.root.to_matrix() * matrix
    }

    /// World-space box of the geometry in the subtree rooted at `id`.
    ///
    /// Every vertex is transformed, so rotated subtrees are measured exactly.
    /// Hidden nodes are measured too: hiding a wheel must not change where it
    /// is or how big it is.
    pub fn subtree_bounds(&self, id: NodeId) -> Aabb {
        self.measure(self.subtree(id))
    }

    /// World-space box of the whole asset.
    pub fn world_bounds(&self) -> Aabb {
        self.measure(self.traverse())
    }

    fn measure(&self, ids: Vec<NodeId>) -> Aabb {
        let mut bounds = Aabb::empty();
        for id in ids {
            let Some(mesh) = self.node(id).and_then(|node| node.mesh.as_ref()) else {
                continue;
            };
            let matrix = self.world_matrix(id);
            for position in mesh.positions() {
                bounds.grow(matrix.transform_point(*position));
            }
        }
        bounds
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.node_mut(id) {
            node.visible = visible;
        }
    }

    /// A node is effectively visible only if it and all its ancestors are.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.node(node_id) {
                Some(node) if !node.visible => return false,
                Some(node) => current = node.parent,
                None => return false,
            }
        }
        true
    }

    pub fn meshes(&self) -> impl Iterator<Item = (NodeId, &Mesh)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| node.mesh.as_ref().map(|mesh| (NodeId(idx), mesh)))
    }

    /// World-space center of a node's geometry, or its origin if it has none.
    pub fn world_center(&self, id: NodeId) -> Point3<f32> {
        let bounds = self.subtree_bounds(id);
        if bounds.is_empty() {
            let position = self.world_transform(id).position;
            return Point3::new(position.x, position.y, position.z);
        }
        bounds.center()
    }
}
