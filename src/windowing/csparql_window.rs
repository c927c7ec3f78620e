use crate::quad_container::QuadContainer;
use oxigraph::model::Quad;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bounds of one window, `[open, close)` in stream milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowInstance {
    pub open: i64,
    pub close: i64,
}

impl WindowInstance {
    pub fn new(open: i64, close: i64) -> Self {
        Self { open, close }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.open <= timestamp && timestamp < self.close
    }
}

/// Callback type for window content emission
pub type WindowCallback = Arc<dyn Fn(WindowInstance, &QuadContainer) + Send + Sync>;

/// Time-driven sliding window over a quad stream.
///
/// Windows are aligned to the first event seen (`t0`) and open every `slide`
/// milliseconds for `width` milliseconds. A window reports once an event later
/// than its close arrives. A window that closes empty is dropped without a
/// report.
pub struct CSPARQLWindow {
    pub name: String,
    pub width: i64,
    pub slide: i64,
    pub time: i64,
    pub t0: Option<i64>,
    // Keyed by close first so reporting walks windows in close order.
    active_windows: BTreeMap<(i64, i64), QuadContainer>,
    callbacks: Vec<WindowCallback>,
}

impl CSPARQLWindow {
    pub fn new(name: String, width: i64, slide: i64) -> Self {
        Self {
            name,
            width,
            slide,
            time: i64::MIN,
            t0: None,
            active_windows: BTreeMap::new(),
            callbacks: Vec::new(),
        }
    }

    /// Number of windows currently collecting.
    pub fn active_window_count(&self) -> usize {
        self.active_windows.len()
    }

    /// Get window content at a specific timestamp
    /// Returns the window with the smallest close time that contains the timestamp
    pub fn get_content(&self, timestamp: i64) -> Option<&QuadContainer> {
        self.active_windows
            .iter()
            .find(|((close, open), _)| WindowInstance::new(*open, *close).contains(timestamp))
            .map(|(_, container)| container)
    }

    /// Add a quad to the window at the given timestamp
    pub fn add(&mut self, quad: Quad, timestamp: i64) {
        if timestamp < self.time {
            warn!(
                window = %self.name,
                timestamp,
                latest = self.time,
                "Out-of-order element added to open windows only"
            );
        }

        self.scope(timestamp);

        for ((close, open), container) in self.active_windows.iter_mut() {
            if *open <= timestamp && timestamp < *close {
                container.add(quad.clone(), timestamp);
            }
        }

        self.report(timestamp);
    }

    /// Adds a batch of quads sharing one timestamp.
    pub fn add_all<I: IntoIterator<Item = Quad>>(&mut self, quads: I, timestamp: i64) {
        for quad in quads {
            self.add(quad, timestamp);
        }
    }

    /// Emits and evicts every window closing before `timestamp`, earliest first.
    fn report(&mut self, timestamp: i64) {
        if timestamp > self.time {
            self.time = timestamp;
        }
        let expired: Vec<(i64, i64)> = self
            .active_windows
            .range(..(timestamp, i64::MIN))
            .map(|(key, _)| *key)
            .collect();
        for key in expired {
            let Some(content) = self.active_windows.remove(&key) else {
                continue;
            };
            let (close, open) = key;
            if content.is_empty() {
                debug!(window = %self.name, open, close, "Evicting empty window");
                continue;
            }
            debug!(
                window = %self.name,
                open,
                close,
                quads = content.len(),
                "Window triggers"
            );
            self.emit(WindowInstance::new(open, close), &content);
        }
    }

    /// Opens every window that covers `t_e` and is not open yet.
    pub fn scope(&mut self, t_e: i64) {
        let t0 = *self.t0.get_or_insert(t_e);
        let offset = t_e - t0;
        let first = (offset - self.width).div_euclid(self.slide) + 1;
        let last = offset.div_euclid(self.slide);
        for k in first..=last {
            let open = t0 + k * self.slide;
            let close = open + self.width;
            self.active_windows.entry((close, open)).or_default();
        }
    }

    /// Subscribe a callback to window emissions
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: Fn(WindowInstance, &QuadContainer) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(callback));
    }

    fn emit(&self, window: WindowInstance, content: &QuadContainer) {
        for callback in &self.callbacks {
            callback(window, content);
        }
    }
}
