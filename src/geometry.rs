use crate::Shape;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Where the current window's on-screen position and size come from.
pub trait GeometrySource {
    fn sample(&self) -> Shape;
}

/// Geometry held in memory; clones share it, so whoever holds a clone can
/// "drag" the window.
#[derive(Debug, Clone)]
pub struct SharedGeometry {
    shape: Arc<Mutex<Shape>>,
}

impl SharedGeometry {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape: Arc::new(Mutex::new(shape)),
        }
    }

    pub fn set(&self, shape: Shape) {
        *self.shape.lock().unwrap_or_else(|e| e.into_inner()) = shape;
    }
}

impl GeometrySource for SharedGeometry {
    fn sample(&self) -> Shape {
        *self.shape.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Geometry read from a small JSON file (`{"x":..,"y":..,"w":..,"h":..}`) on
/// every sample. Falls back to the last good shape while the file is missing
/// or mid-edit.
pub struct FileGeometry {
    path: PathBuf,
    last_good: Mutex<Shape>,
}

impl FileGeometry {
    pub fn new<P: AsRef<Path>>(path: P, initial: Shape) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last_good: Mutex::new(initial),
        }
    }
}

impl GeometrySource for FileGeometry {
    fn sample(&self) -> Shape {
        let mut last_good = self.last_good.lock().unwrap_or_else(|e| e.into_inner());
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Shape>(&content) {
                Ok(shape) => *last_good = shape,
                Err(e) => warn!("Ignoring unreadable geometry file {:?}: {}", self.path, e),
            },
            Err(e) => debug!("Geometry file {:?} not readable: {}", self.path, e),
        }
        *last_good
    }
}

/// Samples a [`GeometrySource`] at most once per interval and reports only
/// actual changes. Never touches the registry store.
pub struct GeometryPoller {
    source: Box<dyn GeometrySource>,
    interval: Duration,
    last_sample: Option<Shape>,
    last_poll: Option<DateTime<Utc>>,
}

impl GeometryPoller {
    pub fn new(source: Box<dyn GeometrySource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            last_sample: None,
            last_poll: None,
        }
    }

    /// Samples unconditionally and makes the result the baseline for change
    /// detection. A non-finite sample falls back to the previous baseline, or
    /// an empty shape at the origin.
    pub fn sample_now(&mut self, now: DateTime<Utc>) -> Shape {
        self.last_poll = Some(now);
        let shape = match self.finite_sample() {
            Some(shape) => shape,
            None => self.last_sample.unwrap_or_default(),
        };
        self.last_sample = Some(shape);
        shape
    }

    /// Returns the new shape if the interval has elapsed and the window moved
    /// or resized since the previous sample.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Shape> {
        if let Some(last) = self.last_poll {
            if now.signed_duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_poll = Some(now);

        let shape = self.finite_sample()?;
        if self.last_sample == Some(shape) {
            return None;
        }
        debug!("Local shape changed to {:?}", shape);
        self.last_sample = Some(shape);
        Some(shape)
    }

    pub fn last_sample(&self) -> Option<Shape> {
        self.last_sample
    }

    fn finite_sample(&mut self) -> Option<Shape> {
        let shape = self.source.sample();
        if shape.is_finite() {
            Some(shape)
        } else {
            warn!("Ignoring non-finite geometry sample {:?}", shape);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_changes_only_after_interval() {
        let geometry = SharedGeometry::new(Shape::new(0.0, 0.0, 800.0, 600.0));
        let mut poller = GeometryPoller::new(Box::new(geometry.clone()), Duration::milliseconds(200));
        let start = Utc::now();
        poller.sample_now(start);

        geometry.set(Shape::new(100.0, 50.0, 800.0, 600.0));
        assert_eq!(poller.poll(start + Duration::milliseconds(100)), None);
        assert_eq!(
            poller.poll(start + Duration::milliseconds(200)),
            Some(Shape::new(100.0, 50.0, 800.0, 600.0))
        );
        assert_eq!(poller.poll(start + Duration::milliseconds(400)), None);
    }

    #[test]
    fn zero_interval_samples_every_poll() {
        let geometry = SharedGeometry::new(Shape::new(0.0, 0.0, 10.0, 10.0));
        let mut poller = GeometryPoller::new(Box::new(geometry.clone()), Duration::zero());
        let now = Utc::now();

        assert_eq!(poller.poll(now), Some(Shape::new(0.0, 0.0, 10.0, 10.0)));
        geometry.set(Shape::new(1.0, 0.0, 10.0, 10.0));
        assert_eq!(poller.poll(now), Some(Shape::new(1.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let geometry = SharedGeometry::new(Shape::new(f64::NAN, 0.0, 800.0, 600.0));
        let mut poller = GeometryPoller::new(Box::new(geometry.clone()), Duration::zero());
        let now = Utc::now();

        assert_eq!(poller.sample_now(now), Shape::default());
        assert_eq!(poller.poll(now), None);

        geometry.set(Shape::new(10.0, 0.0, 800.0, 600.0));
        assert_eq!(poller.poll(now), Some(Shape::new(10.0, 0.0, 800.0, 600.0)));

        geometry.set(Shape::new(f64::INFINITY, 0.0, 800.0, 600.0));
        assert_eq!(poller.poll(now), None);
        assert_eq!(poller.last_sample(), Some(Shape::new(10.0, 0.0, 800.0, 600.0)));
    }

    #[test]
    fn file_geometry_keeps_last_good_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shape.json");
        let initial = Shape::new(0.0, 0.0, 800.0, 600.0);
        let source = FileGeometry::new(&path, initial);

        assert_eq!(source.sample(), initial);

        std::fs::write(&path, r#"{"x":100,"y":50,"w":800,"h":600}"#).unwrap();
        assert_eq!(source.sample(), Shape::new(100.0, 50.0, 800.0, 600.0));

        std::fs::write(&path, "{\"x\":").unwrap();
        assert_eq!(source.sample(), Shape::new(100.0, 50.0, 800.0, 600.0));
    }
}
