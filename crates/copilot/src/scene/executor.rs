use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::reply::{ActionRequest, ComponentEntry};

use super::capability::{Capability, CapabilityRegistry, PrimitiveKind};
use super::graph::{NodeId, SceneGraph};
use super::material::{Color, Material, MaterialLibrary, MaterialMode};

pub const UNDO_LABEL: &str = "Copilot create GameObject";
const DEFAULT_NODE_NAME: &str = "NewGameObject";
const MATERIAL_COLOR_KEY: &str = "materialColor";

/// Applies `create_gameobject` actions to a scene graph.
#[derive(Debug)]
pub struct SceneActionExecutor {
    registry: CapabilityRegistry,
    materials: MaterialLibrary,
    materials_dir: PathBuf,
}

impl SceneActionExecutor {
    pub fn new(registry: CapabilityRegistry, mode: MaterialMode, materials_dir: PathBuf) -> Self {
        Self {
            registry,
            materials: MaterialLibrary::new(mode),
            materials_dir,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CapabilityRegistry {
        &mut self.registry
    }

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    pub fn execute_all(&mut self, scene: &mut SceneGraph, actions: &[ActionRequest]) -> Vec<NodeId> {
        actions
            .iter()
            .filter_map(|action| self.execute(scene, action))
            .collect()
    }

    /// Returns the created node, or `None` for unrecognized action types.
    pub fn execute(&mut self, scene: &mut SceneGraph, action: &ActionRequest) -> Option<NodeId> {
        if !action.is_create_gameobject() {
            debug!(action_type = ?action.kind, "copilot_action_ignored");
            return None;
        }
        Some(self.create_gameobject(scene, action))
    }

    fn create_gameobject(&mut self, scene: &mut SceneGraph, action: &ActionRequest) -> NodeId {
        let primitive = action
            .components
            .iter()
            .find_map(ComponentEntry::primitive_name)
            .and_then(|name| name.parse::<PrimitiveKind>().ok());

        let id = match primitive {
            Some(kind) => scene.create_primitive(kind),
            None => scene.create_empty(action.requested_name().unwrap_or(DEFAULT_NODE_NAME)),
        };
        if let (Some(name), Some(node)) = (action.requested_name(), scene.find_mut(id)) {
            node.name = name.to_string();
        }

        for entry in &action.components {
            match entry {
                ComponentEntry::Name(name) => {
                    self.attach_by_name(scene, id, name);
                }
                ComponentEntry::Object(fields) if entry.is_primitive_helper() => {
                    debug!(fields = ?fields, "copilot_primitive_helper_skipped");
                }
                ComponentEntry::Object(fields) => {
                    for (name, settings) in fields {
                        if let Some(index) = self.attach_by_name(scene, id, name) {
                            self.apply_material_color(scene, id, index, settings);
                        }
                    }
                }
                ComponentEntry::Other(value) => {
                    debug!(value = %value, "copilot_component_entry_ignored");
                }
            }
        }

        self.complete_visuals(scene, id);

        scene.register_created_undo(id, UNDO_LABEL);
        scene.select(id);
        if let Some(node) = scene.find(id) {
            info!(
                node_id = id.0,
                name = %node.name,
                capability_count = node.capabilities().len(),
                "copilot_gameobject_created"
            );
        }
        id
    }

    fn attach_by_name(&self, scene: &mut SceneGraph, id: NodeId, name: &str) -> Option<usize> {
        let Some(capability) = self.registry.resolve(name) else {
            warn!(component = name, "copilot_component_not_found");
            return None;
        };
        scene.find_mut(id).map(|node| node.attach(capability))
    }

    fn apply_material_color(
        &mut self,
        scene: &mut SceneGraph,
        id: NodeId,
        index: usize,
        settings: &Value,
    ) {
        let Some(node) = scene.find_mut(id) else {
            return;
        };
        let is_renderer = node
            .capabilities()
            .get(index)
            .is_some_and(Capability::is_renderer);
        if !is_renderer {
            return;
        }
        let Some(raw) = settings.get(MATERIAL_COLOR_KEY).and_then(Value::as_str) else {
            return;
        };
        let Some(color) = Color::parse_html(raw) else {
            warn!(value = raw, "copilot_material_color_invalid");
            return;
        };

        let base_name = format!("{}_Material", node.name);
        let material = match self
            .materials
            .create_colored_asset(&base_name, color, &self.materials_dir)
        {
            Ok(material) => material,
            Err(error) => {
                warn!(error = %error, "copilot_material_asset_failed");
                Material::standard(base_name, color)
            }
        };
        if let Some(capability) = node.capability_mut(index) {
            capability.set_material(material);
        }
    }

    fn complete_visuals(&mut self, scene: &mut SceneGraph, id: NodeId) {
        let Some(node) = scene.find_mut(id) else {
            return;
        };

        if node.has_renderer() && !node.has_mesh_provider() {
            node.attach(Capability::MeshFilter {
                mesh: PrimitiveKind::Cube,
            });
        } else if node.has_mesh_provider() && !node.has_renderer() {
            node.attach(Capability::MeshRenderer { material: None });
        }

        if let Some(renderer) = node.renderer_mut() {
            if renderer.material().is_none() {
                renderer.set_material(self.materials.default_material());
            }
        }
    }
}
