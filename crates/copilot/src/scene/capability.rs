use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::behaviour::{Behaviour, SpinningCube};
use super::material::Material;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Sphere,
    Capsule,
    Cylinder,
    Cube,
    Plane,
    Quad,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 6] = [
        Self::Sphere,
        Self::Capsule,
        Self::Cylinder,
        Self::Cube,
        Self::Plane,
        Self::Quad,
    ];

    pub fn default_name(self) -> &'static str {
        match self {
            Self::Sphere => "Sphere",
            Self::Capsule => "Capsule",
            Self::Cylinder => "Cylinder",
            Self::Cube => "Cube",
            Self::Plane => "Plane",
            Self::Quad => "Quad",
        }
    }

    pub fn collider_shape(self) -> ColliderShape {
        match self {
            Self::Sphere => ColliderShape::Sphere,
            Self::Capsule | Self::Cylinder => ColliderShape::Capsule,
            Self::Cube => ColliderShape::Box,
            Self::Plane | Self::Quad => ColliderShape::Mesh,
        }
    }
}

impl FromStr for PrimitiveKind {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.default_name().eq_ignore_ascii_case(trimmed))
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderShape {
    Box,
    Sphere,
    Capsule,
    Mesh,
}

impl ColliderShape {
    fn type_name(self) -> &'static str {
        match self {
            Self::Box => "BoxCollider",
            Self::Sphere => "SphereCollider",
            Self::Capsule => "CapsuleCollider",
            Self::Mesh => "MeshCollider",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    MeshProvider,
    Renderer,
    Collider,
    Physics,
    Audio,
    Light,
    Camera,
    Script,
}

#[derive(Debug)]
pub enum Capability {
    MeshFilter {
        mesh: PrimitiveKind,
    },
    MeshRenderer {
        material: Option<Material>,
    },
    Collider {
        shape: ColliderShape,
    },
    Rigidbody {
        mass: f32,
        use_gravity: bool,
    },
    AudioSource,
    Light,
    Camera,
    /// A generated or built-in script. `behaviour` is `None` for compiled
    /// types the host knows by name only.
    Script {
        type_name: String,
        behaviour: Option<Box<dyn Behaviour>>,
    },
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::MeshFilter { mesh: a }, Self::MeshFilter { mesh: b }) => a == b,
            (Self::MeshRenderer { material: a }, Self::MeshRenderer { material: b }) => a == b,
            (Self::Collider { shape: a }, Self::Collider { shape: b }) => a == b,
            (
                Self::Rigidbody {
                    mass: a,
                    use_gravity: ga,
                },
                Self::Rigidbody {
                    mass: b,
                    use_gravity: gb,
                },
            ) => a == b && ga == gb,
            (Self::AudioSource, Self::AudioSource)
            | (Self::Light, Self::Light)
            | (Self::Camera, Self::Camera) => true,
            (Self::Script { type_name: a, .. }, Self::Script { type_name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Capability {
    pub fn type_name(&self) -> &str {
        match self {
            Self::MeshFilter { .. } => "MeshFilter",
            Self::MeshRenderer { .. } => "MeshRenderer",
            Self::Collider { shape } => shape.type_name(),
            Self::Rigidbody { .. } => "Rigidbody",
            Self::AudioSource => "AudioSource",
            Self::Light => "Light",
            Self::Camera => "Camera",
            Self::Script { type_name, .. } => type_name,
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::MeshFilter { .. } => CapabilityKind::MeshProvider,
            Self::MeshRenderer { .. } => CapabilityKind::Renderer,
            Self::Collider { .. } => CapabilityKind::Collider,
            Self::Rigidbody { .. } => CapabilityKind::Physics,
            Self::AudioSource => CapabilityKind::Audio,
            Self::Light => CapabilityKind::Light,
            Self::Camera => CapabilityKind::Camera,
            Self::Script { .. } => CapabilityKind::Script,
        }
    }

    pub fn is_renderer(&self) -> bool {
        self.kind() == CapabilityKind::Renderer
    }

    pub fn is_mesh_provider(&self) -> bool {
        self.kind() == CapabilityKind::MeshProvider
    }

    pub fn is_unique(&self) -> bool {
        !matches!(
            self.kind(),
            CapabilityKind::Audio | CapabilityKind::Script
        )
    }

    pub fn material(&self) -> Option<&Material> {
        match self {
            Self::MeshRenderer { material } => material.as_ref(),
            _ => None,
        }
    }

    pub fn set_material(&mut self, new_material: Material) -> bool {
        match self {
            Self::MeshRenderer { material } => {
                *material = Some(new_material);
                true
            }
            _ => false,
        }
    }
}

type FactoryFn = dyn Fn() -> Capability + Send + Sync;

struct RegistryEntry {
    short_name: String,
    full_name: String,
    component_derived: bool,
    factory: Box<FactoryFn>,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("short_name", &self.short_name)
            .field("full_name", &self.full_name)
            .field("component_derived", &self.component_derived)
            .finish()
    }
}

/// Name → constructor table for attachable capabilities.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: Vec<RegistryEntry>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_component("UnityEngine.MeshFilter", || Capability::MeshFilter {
            mesh: PrimitiveKind::Cube,
        });
        registry.register_component("UnityEngine.MeshRenderer", || Capability::MeshRenderer {
            material: None,
        });
        // The abstract renderer resolves to the concrete mesh renderer.
        registry.register_component("UnityEngine.Renderer", || Capability::MeshRenderer {
            material: None,
        });
        for shape in [
            ColliderShape::Box,
            ColliderShape::Sphere,
            ColliderShape::Capsule,
            ColliderShape::Mesh,
        ] {
            registry.register_component(format!("UnityEngine.{}", shape.type_name()), move || {
                Capability::Collider { shape }
            });
        }
        registry.register_component("UnityEngine.Rigidbody", || Capability::Rigidbody {
            mass: 1.0,
            use_gravity: true,
        });
        registry.register_component("UnityEngine.AudioSource", || Capability::AudioSource);
        registry.register_component("UnityEngine.Light", || Capability::Light);
        registry.register_component("UnityEngine.Camera", || Capability::Camera);
        registry.register_component("SpinningCube", || Capability::Script {
            type_name: "SpinningCube".to_string(),
            behaviour: Some(Box::new(SpinningCube::default())),
        });
        registry
    }

    pub fn register<F>(&mut self, full_name: impl Into<String>, component_derived: bool, factory: F)
    where
        F: Fn() -> Capability + Send + Sync + 'static,
    {
        let full_name = full_name.into();
        let short_name = short_name_of(&full_name).to_string();
        self.entries.retain(|entry| entry.full_name != full_name);
        self.entries.push(RegistryEntry {
            short_name,
            full_name,
            component_derived,
            factory: Box::new(factory),
        });
    }

    pub fn register_component<F>(&mut self, full_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Capability + Send + Sync + 'static,
    {
        self.register(full_name, true, factory);
    }

    /// Registers a compiled script type by name. Types that already have an
    /// entry (for example a built-in behaviour) keep their factory.
    pub fn register_script_type(&mut self, full_name: &str) -> bool {
        if self.entries.iter().any(|entry| entry.full_name == full_name) {
            return false;
        }
        let type_name = short_name_of(full_name).to_string();
        self.register_component(full_name, move || Capability::Script {
            type_name: type_name.clone(),
            behaviour: None,
        });
        debug!(type_name = full_name, "copilot_script_type_registered");
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolution order: exact short name, then fully-qualified name ignoring
    /// case, then component types by short or full name ignoring case.
    pub fn resolve(&self, name: &str) -> Option<Capability> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.short_name == name)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|entry| entry.full_name.eq_ignore_ascii_case(name))
            })
            .or_else(|| {
                self.entries.iter().filter(|entry| entry.component_derived).find(|entry| {
                    entry.short_name.eq_ignore_ascii_case(name)
                        || entry.full_name.eq_ignore_ascii_case(name)
                })
            })
            .map(|entry| (entry.factory)())
    }
}

fn short_name_of(full_name: &str) -> &str {
    full_name.rsplit('.').next().unwrap_or(full_name)
}
