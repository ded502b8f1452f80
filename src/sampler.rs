use std::sync::{Arc, PoisonError, RwLock};

use crate::clock::DEFAULT_FRAME_RATE;
use crate::data_structures::{ScaleConfig, Transform, TransformSample};

// host scene, polled on every tick
pub trait SceneSource: Send + Sync {
    fn transform(&self) -> Option<Transform>; // None when nothing is bound
    fn frame_rate(&self) -> f64;
}

// rotation goes to degrees before scaling
pub fn sample(transform: &Transform, scale: &ScaleConfig) -> TransformSample {
    let f = &scale.factors;
    let [lx, ly, lz] = transform.location;
    let [rx, ry, rz] = transform.rotation;
    TransformSample {
        values: [
            (lx * f[0]) as f32,
            (ly * f[1]) as f32,
            (lz * f[2]) as f32,
            (rx.to_degrees() * f[3]) as f32,
            (ry.to_degrees() * f[4]) as f32,
            (rz.to_degrees() * f[5]) as f32,
        ],
    }
}

// -------------------- In-process scene --------------------

#[derive(Debug)]
struct SceneState {
    bound: Option<Transform>,
    frame_rate: f64,
}

// clones share state
#[derive(Debug, Clone)]
pub struct SharedScene {
    inner: Arc<RwLock<SceneState>>,
}

impl Default for SharedScene {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_RATE)
    }
}

impl SharedScene {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SceneState {
                bound: None,
                frame_rate,
            })),
        }
    }

    pub fn bind(&self, transform: Transform) {
        self.write(|s| s.bound = Some(transform));
    }

    pub fn unbind(&self) {
        self.write(|s| s.bound = None);
    }

    // no-op while nothing is bound
    pub fn set_transform(&self, transform: Transform) {
        self.write(|s| {
            if let Some(t) = s.bound.as_mut() {
                *t = transform;
            }
        });
    }

    pub fn set_frame_rate(&self, frame_rate: f64) {
        self.write(|s| s.frame_rate = frame_rate);
    }

    fn write(&self, f: impl FnOnce(&mut SceneState)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl SceneSource for SharedScene {
    fn transform(&self) -> Option<Transform> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bound
    }

    fn frame_rate(&self) -> f64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .frame_rate
    }
}
