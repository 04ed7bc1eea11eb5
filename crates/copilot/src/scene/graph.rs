use super::capability::{Capability, PrimitiveKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    pub rotation_degrees: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation_degrees: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    pub fn rotate(&mut self, x: f32, y: f32, z: f32) {
        for (axis, delta) in self.rotation_degrees.iter_mut().zip([x, y, z]) {
            *axis = (*axis + delta).rem_euclid(360.0);
        }
    }
}

#[derive(Debug)]
pub struct SceneNode {
    pub id: NodeId,
    pub name: String,
    pub transform: Transform,
    capabilities: Vec<Capability>,
}

impl SceneNode {
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn capability_mut(&mut self, index: usize) -> Option<&mut Capability> {
        self.capabilities.get_mut(index)
    }

    pub fn has_renderer(&self) -> bool {
        self.capabilities.iter().any(Capability::is_renderer)
    }

    pub fn has_mesh_provider(&self) -> bool {
        self.capabilities.iter().any(Capability::is_mesh_provider)
    }

    pub fn count_named(&self, type_name: &str) -> usize {
        self.capabilities
            .iter()
            .filter(|capability| capability.type_name() == type_name)
            .count()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut Capability> {
        self.capabilities.iter_mut().find(|c| c.is_renderer())
    }

    pub fn renderer(&self) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.is_renderer())
    }

    /// Attaches `capability`, or returns the index of the one already present
    /// when the capability may only appear once per node.
    pub fn attach(&mut self, capability: Capability) -> usize {
        if capability.is_unique() {
            if let Some(index) = self
                .capabilities
                .iter()
                .position(|existing| existing.type_name() == capability.type_name())
            {
                return index;
            }
        }
        self.capabilities.push(capability);
        self.capabilities.len() - 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    pub node: NodeId,
    pub label: String,
}

#[derive(Debug, Default)]
struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    allocator: NodeIdAllocator,
    nodes: Vec<SceneNode>,
    selection: Option<NodeId>,
    undo: Vec<UndoEntry>,
}

impl SceneGraph {
    pub fn create_empty(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.allocator.allocate();
        self.nodes.push(SceneNode {
            id,
            name: name.into(),
            transform: Transform::default(),
            capabilities: Vec::new(),
        });
        id
    }

    /// Creates a node with the primitive's mesh, a renderer without material,
    /// and the matching collider. The node is named after the primitive.
    pub fn create_primitive(&mut self, kind: PrimitiveKind) -> NodeId {
        let id = self.create_empty(kind.default_name());
        if let Some(node) = self.find_mut(id) {
            node.attach(Capability::MeshFilter { mesh: kind });
            node.attach(Capability::MeshRenderer { material: None });
            node.attach(Capability::Collider {
                shape: kind.collider_shape(),
            });
        }
        id
    }

    pub fn find(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn selection(&self) -> Option<NodeId> {
        self.selection
    }

    pub fn select(&mut self, id: NodeId) -> bool {
        if self.find(id).is_none() {
            return false;
        }
        self.selection = Some(id);
        true
    }

    pub fn register_created_undo(&mut self, id: NodeId, label: impl Into<String>) {
        self.undo.push(UndoEntry {
            node: id,
            label: label.into(),
        });
    }

    pub fn undo_entries(&self) -> &[UndoEntry] {
        &self.undo
    }

    /// Reverts the most recent creation, removing its node.
    pub fn undo_last(&mut self) -> Option<UndoEntry> {
        let entry = self.undo.pop()?;
        self.nodes.retain(|node| node.id != entry.node);
        if self.selection == Some(entry.node) {
            self.selection = None;
        }
        Some(entry)
    }

    pub fn tick(&mut self, dt_seconds: f32) {
        for node in &mut self.nodes {
            let SceneNode {
                transform,
                capabilities,
                ..
            } = node;
            for capability in capabilities.iter_mut() {
                if let Capability::Script {
                    behaviour: Some(behaviour),
                    ..
                } = capability
                {
                    behaviour.update(dt_seconds, transform);
                }
            }
        }
    }
}
