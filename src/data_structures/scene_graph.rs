//! Scene graph and hierarchical scene organization.
//!
//! A [`Scene`] owns a forest of [`Node`]s plus the lights that shade them. Nodes
//! get a [`NodeId`] when they enter the scene; renderers key their GPU resources by
//! that id. Removing a node only detaches it. [`Scene::dispose`] additionally queues
//! the ids of the whole subtree so the renderer can free what it uploaded for them.

use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::data_structures::{
    geometry::Geometry, instance::Instance, light::Light, material::Material,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
}

/// Local transform of a node.
///
/// With `matrix_auto_update` set (the default) the matrix is derived from
/// `local`. Nodes driven by externally supplied poses turn it off and call
/// [`Transform::set_matrix`] instead.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub local: Instance,
    pub matrix_auto_update: bool,
    matrix: Matrix4<f32>,
}

impl Transform {
    pub fn matrix(&self) -> Matrix4<f32> {
        if self.matrix_auto_update {
            self.local.to_matrix()
        } else {
            self.matrix
        }
    }

    /// Sets the matrix verbatim and keeps `local` in sync with it.
    pub fn set_matrix(&mut self, matrix: Matrix4<f32>) {
        self.matrix = matrix;
        self.local = Instance::from_matrix(matrix);
    }
}

impl From<Instance> for Transform {
    fn from(local: Instance) -> Self {
        Self {
            local,
            matrix_auto_update: true,
            matrix: Matrix4::identity(),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Instance::new().into()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    id: Option<NodeId>,
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub visible: bool,
    pub children: Vec<Node>,
}

impl Node {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: NodeKind::Group,
            transform: Transform::default(),
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, geometry: Geometry, material: Material) -> Self {
        Self {
            kind: NodeKind::Mesh(Mesh { geometry, material }),
            ..Self::group(name)
        }
    }

    /// Three unlit line segments along +X (red), +Y (green) and +Z (blue).
    pub fn axes_helper(size: f32) -> Self {
        let axis = |name: &str, end: [f32; 3], hex: u32| {
            Node::mesh(
                name,
                Geometry::lines(&[[0.0; 3], end]),
                Material::basic(hex),
            )
        };
        Node::group("axes")
            .with_child(axis("axis-x", [size, 0.0, 0.0], 0xff0000))
            .with_child(axis("axis-y", [0.0, size, 0.0], 0x00ff00))
            .with_child(axis("axis-z", [0.0, 0.0, size], 0x0000ff))
    }

    pub fn with_transform(mut self, local: Instance) -> Self {
        self.transform.local = local;
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// `None` until the node has been added to a [`Scene`].
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub fn mesh_data(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.transform.local.position
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Ids of this node and all of its descendants.
    pub fn subtree_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.visit(&mut |node| ids.extend(node.id));
        ids
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |node| count += node.mesh_data().is_some() as usize);
        count
    }

    fn visit(&self, f: &mut dyn FnMut(&Node)) {
        f(self);
        self.children.iter().for_each(|child| child.visit(f));
    }

    fn detach(&mut self, id: NodeId) -> Option<Node> {
        if let Some(idx) = self.children.iter().position(|c| c.id == Some(id)) {
            return Some(self.children.remove(idx));
        }
        self.children.iter_mut().find_map(|child| child.detach(id))
    }
}

/// A visible mesh together with its world matrix, as handed to renderers.
pub struct DrawItem<'a> {
    pub id: NodeId,
    pub world: Matrix4<f32>,
    pub mesh: &'a Mesh,
}

#[derive(Debug, Default)]
pub struct Scene {
    roots: Vec<Node>,
    pub lights: Vec<Light>,
    next_id: u64,
    released: Vec<NodeId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// Adds `node` (and its children) at the top level and returns its id.
    pub fn add(&mut self, mut node: Node) -> NodeId {
        let id = self.assign_ids(&mut node);
        self.roots.push(node);
        id
    }

    /// Adds `node` below `parent`. Gives the node back if `parent` is unknown.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> Result<NodeId, Node> {
        if self.get(parent).is_none() {
            return Err(node);
        }
        let id = self.assign_ids(&mut node);
        if let Some(parent) = self.get_mut(parent) {
            parent.children.push(node);
        }
        Ok(id)
    }

    fn assign_ids(&mut self, node: &mut Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        node.id = Some(id);
        for child in &mut node.children {
            self.assign_ids(child);
        }
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.roots.iter().find_map(|node| node.find(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.roots.iter_mut().find_map(|node| node.find_mut(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Detaches the node from the scene without releasing anything.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        if let Some(idx) = self.roots.iter().position(|n| n.id == Some(id)) {
            return Some(self.roots.remove(idx));
        }
        self.roots.iter_mut().find_map(|node| node.detach(id))
    }

    /// Queues every id of the subtree for release by the renderer.
    pub fn dispose(&mut self, node: Node) {
        self.released.extend(node.subtree_ids());
    }

    /// [`Scene::remove`] followed by [`Scene::dispose`]. Returns whether anything was removed.
    pub fn remove_and_dispose(&mut self, id: NodeId) -> bool {
        match self.remove(id) {
            Some(node) => {
                self.dispose(node);
                true
            }
            None => false,
        }
    }

    /// Drains the ids disposed since the last call.
    pub fn take_released(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.released)
    }

    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// Number of top level nodes.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<Matrix4<f32>> {
        fn walk(node: &Node, parent: Matrix4<f32>, id: NodeId) -> Option<Matrix4<f32>> {
            let world = parent * node.transform.matrix();
            if node.id == Some(id) {
                return Some(world);
            }
            node.children.iter().find_map(|c| walk(c, world, id))
        }
        self.roots
            .iter()
            .find_map(|root| walk(root, Matrix4::identity(), id))
    }

    /// Visible meshes with their world matrices. Hidden nodes hide their subtree.
    pub fn draw_items(&self) -> Vec<DrawItem<'_>> {
        fn walk<'a>(node: &'a Node, parent: Matrix4<f32>, out: &mut Vec<DrawItem<'a>>) {
            if !node.visible {
                return;
            }
            let world = parent * node.transform.matrix();
            if let (Some(id), NodeKind::Mesh(mesh)) = (node.id, &node.kind) {
                out.push(DrawItem { id, world, mesh });
            }
            node.children.iter().for_each(|c| walk(c, world, out));
        }
        let mut items = Vec::new();
        self.roots
            .iter()
            .for_each(|root| walk(root, Matrix4::identity(), &mut items));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::geometry::Geometry;

    fn cube() -> Node {
        Node::mesh("tetra", Geometry::tetrahedron(1.0), Material::default())
    }

    #[test]
    fn ids_are_assigned_to_whole_subtree() {
        let mut scene = Scene::new();
        let id = scene.add(Node::group("root").with_child(cube()).with_child(cube()));
        let root = scene.get(id).expect("root");
        assert_eq!(root.subtree_ids().len(), 3);
        assert!(root.children.iter().all(|c| c.id().is_some()));
        assert_eq!(root.mesh_count(), 2);
    }

    #[test]
    fn dispose_releases_children_too() {
        let mut scene = Scene::new();
        let id = scene.add(Node::group("model").with_child(cube()));
        let kept = scene.add(cube());
        assert!(scene.remove_and_dispose(id));
        let released = scene.take_released();
        assert_eq!(released.len(), 2);
        assert!(released.contains(&id));
        assert!(scene.take_released().is_empty());
        assert!(scene.contains(kept));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn remove_finds_nested_nodes() {
        let mut scene = Scene::new();
        let parent = scene.add(Node::group("parent"));
        let child = scene.add_child(parent, cube()).expect("parent exists");
        assert!(scene.remove(child).is_some());
        assert!(!scene.contains(child));
        assert!(scene.contains(parent));
        assert!(scene.take_released().is_empty());
    }

    #[test]
    fn hidden_nodes_hide_their_subtree() {
        let mut scene = Scene::new();
        let id = scene.add(Node::axes_helper(1.0));
        assert_eq!(scene.draw_items().len(), 3);
        scene.get_mut(id).expect("axes").visible = false;
        assert!(scene.draw_items().is_empty());
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let parent = scene.add(Node::group("parent").with_transform(Instance::at(1.0, 0.0, 0.0)));
        let child = scene
            .add_child(parent, cube().with_transform(Instance::at(0.0, 2.0, 0.0)))
            .expect("parent exists");
        let world = scene.world_matrix(child).expect("child");
        assert_eq!(world.w.truncate(), Vector3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn explicit_matrix_wins_over_local_when_auto_update_is_off() {
        let mut transform = Transform::default();
        transform.matrix_auto_update = false;
        let pose = Matrix4::from_translation(Vector3::new(0.0, -1.0, -2.0));
        transform.set_matrix(pose);
        transform.local.position = Vector3::new(5.0, 5.0, 5.0);
        assert_eq!(transform.matrix(), pose);
    }
}
