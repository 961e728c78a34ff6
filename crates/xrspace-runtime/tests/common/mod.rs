//! Helpers shared by the session integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use xrspace_geometry::{Quaternion, RigidTransform, Vec3};
use xrspace_tracking::{SimTrackingSource, SpatialRoot, TrackingSample, TrackingSource};
use xrspace_types::{FrameError, FrameOfReferenceOptions, StationarySubtype, TrackingQuality};

pub const QUALITIES: [TrackingQuality; 4] = [
    TrackingQuality::None,
    TrackingQuality::OrientationOnly,
    TrackingQuality::OutsideIn,
    TrackingQuality::InsideOut,
];

pub fn stationary(subtype: StationarySubtype) -> FrameOfReferenceOptions {
    FrameOfReferenceOptions::stationary(subtype)
}

pub fn eye_level() -> FrameOfReferenceOptions {
    stationary(StationarySubtype::EyeLevel)
}

pub fn pose(x: f32, y: f32, z: f32, yaw: f32) -> RigidTransform {
    RigidTransform::new(Vec3::new(x, y, z), Quaternion::from_yaw(yaw))
}

/// Observable power state of a [`CountingSource`].
#[derive(Debug, Default)]
pub struct Power {
    pub starts: AtomicUsize,
    pub running: AtomicBool,
}

impl Power {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Wraps a simulated source and records every start and stop.
pub struct CountingSource {
    inner: SimTrackingSource,
    power: Arc<Power>,
}

impl CountingSource {
    pub fn new(inner: SimTrackingSource) -> (Self, Arc<Power>) {
        let power = Arc::new(Power::default());
        (
            Self {
                inner,
                power: Arc::clone(&power),
            },
            power,
        )
    }
}

impl TrackingSource for CountingSource {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn quality(&self) -> TrackingQuality {
        self.inner.quality()
    }

    fn describe_roots(&self) -> Vec<SpatialRoot> {
        self.inner.describe_roots()
    }

    fn start(&mut self) -> Result<(), FrameError> {
        self.power.starts.fetch_add(1, Ordering::SeqCst);
        self.power.running.store(true, Ordering::SeqCst);
        self.inner.start()
    }

    fn stop(&mut self) {
        self.power.running.store(false, Ordering::SeqCst);
        self.inner.stop();
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    fn sample(&mut self, tick: u64) -> Result<TrackingSample, FrameError> {
        self.inner.sample(tick)
    }
}

/// Simulated source whose tracking root is edited by a script every tick.
pub struct ScriptedRoot {
    inner: SimTrackingSource,
    script: Box<dyn Fn(u64, &mut SpatialRoot) + Send>,
}

impl ScriptedRoot {
    pub fn new(inner: SimTrackingSource, script: impl Fn(u64, &mut SpatialRoot) + Send + 'static) -> Self {
        Self {
            inner,
            script: Box::new(script),
        }
    }
}

impl TrackingSource for ScriptedRoot {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn quality(&self) -> TrackingQuality {
        self.inner.quality()
    }

    fn describe_roots(&self) -> Vec<SpatialRoot> {
        self.inner.describe_roots()
    }

    fn start(&mut self) -> Result<(), FrameError> {
        self.inner.start()
    }

    fn stop(&mut self) {
        self.inner.stop();
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    fn sample(&mut self, tick: u64) -> Result<TrackingSample, FrameError> {
        let mut sample = self.inner.sample(tick)?;
        if let Some(root) = sample.roots.first_mut() {
            (self.script)(tick, root);
        }
        Ok(sample)
    }
}
