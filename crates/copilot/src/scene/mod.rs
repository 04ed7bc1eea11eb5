mod behaviour;
mod capability;
mod executor;
mod graph;
mod material;

pub use behaviour::{Behaviour, SpinningCube, SPIN_INTERVAL_SECONDS, SPIN_STEP_DEGREES};
pub use capability::{
    Capability, CapabilityKind, CapabilityRegistry, ColliderShape, PrimitiveKind,
};
pub use executor::{SceneActionExecutor, UNDO_LABEL};
pub use graph::{NodeId, SceneGraph, SceneNode, Transform, UndoEntry};
pub use material::{
    Color, Material, MaterialAssetError, MaterialLibrary, MaterialMode, DEFAULT_MATERIAL_NAME,
    DEFAULT_SHADER,
};
