use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::error::StoreError;
use crate::geometry::{GeometryPoller, GeometrySource};
use crate::identity::{IdGenerator, RandomIds};
use crate::registry::{Registry, RegistryDiff, WindowRecord};
use crate::store::RegistryStore;
use crate::{Shape, WindowId};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::sync::Arc;

pub type ShapeChangeCallback = Box<dyn FnMut(&Shape)>;
pub type WindowsChangeCallback = Box<dyn FnMut(&[WindowRecord])>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Registering,
    Active,
    TearingDown,
}

/// Keeps this window's record in the shared registry and maintains an ordered
/// view of every live window.
///
/// Local moves are written through immediately and reported to this window's
/// own callbacks before any other window sees them. Remote changes arrive
/// through the store and are picked up on the next [`update`](Self::update).
/// Windows that stop refreshing their `last_seen` are reaped by whichever
/// survivor notices first.
pub struct WindowManager {
    stale_timeout: Duration,
    heartbeat_interval: Duration,

    store: Box<dyn RegistryStore>,
    poller: GeometryPoller,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,

    state: ManagerState,
    this_window: Option<WindowRecord>,
    registry: Registry,
    degraded: bool,
    last_sync: Option<DateTime<Utc>>,

    shape_callback: Option<ShapeChangeCallback>,
    windows_callback: Option<WindowsChangeCallback>,
}

impl WindowManager {
    pub fn new(
        config: &RegistryConfig,
        store: Box<dyn RegistryStore>,
        geometry: Box<dyn GeometrySource>,
    ) -> Self {
        Self {
            stale_timeout: config.stale_timeout(),
            heartbeat_interval: config.heartbeat_interval(),
            store,
            poller: GeometryPoller::new(geometry, config.poll_interval()),
            clock: Arc::new(SystemClock),
            ids: Box::new(RandomIds),
            state: ManagerState::Uninitialized,
            this_window: None,
            registry: Registry::default(),
            degraded: false,
            last_sync: None,
            shape_callback: None,
            windows_callback: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Box<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn set_win_shape_change_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Shape) + 'static,
    {
        self.shape_callback = Some(Box::new(callback));
    }

    pub fn set_win_change_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&[WindowRecord]) + 'static,
    {
        self.windows_callback = Some(Box::new(callback));
    }

    /// Registers this window in the shared registry and reports the initial
    /// window set. Calling it again is a no-op returning the existing id.
    pub fn init(&mut self, meta_data: serde_json::Value) -> WindowId {
        if let Some(own) = &self.this_window {
            warn!("Window {} is already registered", own.id);
            return own.id;
        }

        self.state = ManagerState::Registering;
        let now = self.clock.now();
        let id = self.ids.next_id();
        let shape = self.poller.sample_now(now);

        let mut registry = self.load();
        let seq = registry.allocate_seq();
        info!("Registering window {} (seq {}) at {:?}", id, seq, shape);

        self.this_window = Some(WindowRecord {
            id,
            seq,
            shape,
            meta_data,
            last_seen: now,
        });
        self.commit(registry, now);

        self.state = ManagerState::Active;
        info!("{} window(s) live", self.registry.len());
        self.notify_windows();
        id
    }

    /// Called once per render tick. Re-samples local geometry, keeps this
    /// window's heartbeat fresh, reaps stale peers and applies any change a
    /// sibling window wrote since the last tick.
    pub fn update(&mut self) {
        if self.state != ManagerState::Active {
            return;
        }
        let now = self.clock.now();

        if let Some(shape) = self.poller.poll(now) {
            self.apply_local_shape(shape, now);
        } else if self.heartbeat_due(now) || self.has_stale_peers(now) {
            let diff = self.refresh(now, true);
            self.notify_if_changed(&diff);
        }

        if self.store.take_remote_change() {
            debug!("Registry changed remotely");
            let diff = self.refresh(now, false);
            self.notify_if_changed(&diff);
        }
    }

    /// Best-effort removal of this window's record. Peers reap it anyway once
    /// it goes stale, so failures are only logged.
    pub fn teardown(&mut self) {
        if self.state != ManagerState::Active {
            return;
        }
        self.state = ManagerState::TearingDown;

        let Some(own) = self.this_window.as_ref() else {
            return;
        };
        let result = self.store.read().and_then(|mut registry| {
            registry.remove(own.id);
            self.store.write(&registry)
        });
        match result {
            Ok(()) => info!("Window {} deregistered", own.id),
            Err(e) => warn!("Could not deregister window {}: {}", own.id, e),
        }
    }

    /// Snapshot of every live window in `(seq, id)` order.
    pub fn get_windows(&self) -> Vec<WindowRecord> {
        self.registry.windows.clone()
    }

    pub fn this_window(&self) -> Option<&WindowRecord> {
        self.this_window.as_ref()
    }

    pub fn this_window_id(&self) -> Option<WindowId> {
        self.this_window.as_ref().map(|w| w.id)
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// True while the store is unreachable and only this window is shown.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn apply_local_shape(&mut self, shape: Shape, now: DateTime<Utc>) {
        let Some(own) = self.this_window.as_mut() else {
            return;
        };
        own.shape = shape;
        own.last_seen = now;
        self.registry.upsert(own.clone());

        if let Some(callback) = self.shape_callback.as_mut() {
            callback(&shape);
        }
        self.notify_windows();

        let diff = self.refresh(now, true);
        self.notify_if_changed(&diff);
    }

    fn load(&mut self) -> Registry {
        match self.store.read() {
            Ok(registry) => registry,
            Err(e) => {
                self.enter_degraded(&e);
                self.registry.clone()
            }
        }
    }

    /// Re-reads the store and merges this window's record into it. Writes
    /// back when forced, when stale peers need reaping, when the store's copy
    /// of this window is missing or outdated, or while degraded. Only a
    /// successful write ends degraded mode.
    fn refresh(&mut self, now: DateTime<Utc>, force_write: bool) -> RegistryDiff {
        let registry = match self.store.read() {
            Ok(registry) => registry,
            Err(e) => {
                self.enter_degraded(&e);
                self.last_sync = Some(now);
                return self.adopt(Registry::default());
            }
        };

        let (own_current, has_stale) = match &self.this_window {
            Some(own) => (
                registry.get(own.id).is_some_and(|r| r.shape == own.shape),
                registry.has_stale(now, self.stale_timeout, own.id),
            ),
            None => (true, false),
        };

        if !own_current {
            debug!("Store copy of this window is missing or outdated, rewriting");
        }
        if force_write || self.degraded || !own_current || has_stale {
            self.commit(registry, now)
        } else {
            self.adopt(registry)
        }
    }

    /// Prunes stale peers, stamps and inserts this window's record, persists
    /// the result and adopts it as the current view.
    fn commit(&mut self, mut registry: Registry, now: DateTime<Utc>) -> RegistryDiff {
        if let Some(own) = self.this_window.as_mut() {
            own.last_seen = now;
            for id in registry.prune_stale(now, self.stale_timeout, own.id) {
                info!("Reaped stale window {}", id);
            }
            registry.upsert(own.clone());
        }

        self.last_sync = Some(now);
        match self.store.write(&registry) {
            Ok(()) => self.leave_degraded(),
            Err(e) => self.enter_degraded(&e),
        }
        self.adopt(registry)
    }

    fn adopt(&mut self, mut registry: Registry) -> RegistryDiff {
        if let Some(own) = &self.this_window {
            if self.degraded {
                registry.windows.retain(|w| w.id == own.id);
            }
            registry.upsert(own.clone());
        }

        let diff = RegistryDiff::between(&self.registry.windows, &registry.windows);
        self.registry = registry;
        diff
    }

    fn heartbeat_due(&self, now: DateTime<Utc>) -> bool {
        self.last_sync
            .map_or(true, |last| now.signed_duration_since(last) >= self.heartbeat_interval)
    }

    fn has_stale_peers(&self, now: DateTime<Utc>) -> bool {
        self.this_window
            .as_ref()
            .is_some_and(|own| self.registry.has_stale(now, self.stale_timeout, own.id))
    }

    fn notify_if_changed(&mut self, diff: &RegistryDiff) {
        if diff.is_empty() {
            return;
        }
        debug!("Window set changed: {:?}", diff);
        if diff.membership_changed() {
            info!("{} window(s) live", self.registry.len());
        }
        self.notify_windows();
    }

    fn notify_windows(&mut self) {
        if let Some(callback) = self.windows_callback.as_mut() {
            callback(&self.registry.windows);
        }
    }

    fn enter_degraded(&mut self, error: &StoreError) {
        if !self.degraded {
            warn!(
                "Registry store unavailable, continuing in single-window mode: {}",
                error
            );
            self.degraded = true;
        }
    }

    fn leave_degraded(&mut self) {
        if self.degraded {
            info!("Registry store reachable again, resuming cross-window sync");
            self.degraded = false;
        }
    }
}
