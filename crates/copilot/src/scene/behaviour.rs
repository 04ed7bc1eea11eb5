use std::fmt::Debug;

use super::graph::Transform;

/// Per-frame logic attached to a node through a script capability.
pub trait Behaviour: Debug + Send + Sync {
    fn update(&mut self, dt_seconds: f32, transform: &mut Transform);
}

pub const SPIN_STEP_DEGREES: f32 = 30.0;
pub const SPIN_INTERVAL_SECONDS: f32 = 5.0;

/// Turns the node 30 degrees about Y on its first update and again after
/// every 5 seconds of accumulated time.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpinningCube {
    started: bool,
    elapsed_seconds: f32,
}

impl Behaviour for SpinningCube {
    fn update(&mut self, dt_seconds: f32, transform: &mut Transform) {
        if !self.started {
            self.started = true;
            transform.rotate(0.0, SPIN_STEP_DEGREES, 0.0);
            return;
        }

        self.elapsed_seconds += dt_seconds.max(0.0);
        while self.elapsed_seconds >= SPIN_INTERVAL_SECONDS {
            self.elapsed_seconds -= SPIN_INTERVAL_SECONDS;
            transform.rotate(0.0, SPIN_STEP_DEGREES, 0.0);
        }
    }
}
