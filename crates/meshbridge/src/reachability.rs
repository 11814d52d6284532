//! Uplink reachability tracking
//!
//! The transport-reachability collaborator (Wi-Fi driver, link probe, ...)
//! reports every connectivity change through [`ReachabilityListener`]. The
//! [`ReachabilityMonitor`] collapses repeated identical reports and notifies
//! its subscribers only on actual transitions.
//!
//! Subscribers run synchronously while the monitor's lock is held, so every
//! subscriber observes transitions in the order they were delivered. A
//! subscriber must not call back into the monitor.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

/// Callback invoked with the new reachability on every transition
pub type StatusCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Receives connectivity notifications from the transport collaborator
pub trait ReachabilityListener: Send + Sync {
    /// Report whether the uplink is currently usable
    fn on_transport_status(&self, reachable: bool);
}

/// Reachability of the uplink transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReachabilityState {
    /// Uplink usable
    Up,
    /// Uplink not usable
    #[default]
    Down,
}

impl ReachabilityState {
    /// Convert a reachability flag into a state
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            ReachabilityState::Up
        } else {
            ReachabilityState::Down
        }
    }

    /// Whether this state means the uplink is usable
    pub fn is_up(self) -> bool {
        self == ReachabilityState::Up
    }
}

impl std::fmt::Display for ReachabilityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReachabilityState::Up => write!(f, "up"),
            ReachabilityState::Down => write!(f, "down"),
        }
    }
}

/// Tracks uplink reachability and fans transitions out to subscribers
#[derive(Default)]
pub struct ReachabilityMonitor {
    state: Mutex<ReachabilityState>,
    subscribers: RwLock<Vec<StatusCallback>>,
}

impl ReachabilityMonitor {
    /// Create a monitor in the `Down` state with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for state transitions
    pub fn subscribe(&self, callback: StatusCallback) {
        self.subscribers.write().push(callback);
    }

    /// Current state
    pub fn state(&self) -> ReachabilityState {
        *self.state.lock()
    }

    /// Whether the uplink is currently usable
    pub fn is_reachable(&self) -> bool {
        self.state().is_up()
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl ReachabilityListener for ReachabilityMonitor {
    fn on_transport_status(&self, reachable: bool) {
        let next = ReachabilityState::from_reachable(reachable);

        let mut state = self.state.lock();
        if *state == next {
            debug!("Reachability unchanged ({})", next);
            return;
        }

        info!("Uplink reachability {} -> {}", *state, next);
        *state = next;

        for subscriber in self.subscribers.read().iter() {
            subscriber(reachable);
        }
    }
}

impl std::fmt::Debug for ReachabilityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReachabilityMonitor")
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_monitor() -> (ReachabilityMonitor, Arc<Mutex<Vec<bool>>>) {
        let monitor = ReachabilityMonitor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        monitor.subscribe(Arc::new(move |reachable| sink.lock().push(reachable)));
        (monitor, seen)
    }

    #[test]
    fn test_starts_down() {
        let monitor = ReachabilityMonitor::new();
        assert_eq!(monitor.state(), ReachabilityState::Down);
        assert!(!monitor.is_reachable());
    }

    #[test]
    fn test_notifies_only_on_transition() {
        let (monitor, seen) = recording_monitor();

        monitor.on_transport_status(false);
        monitor.on_transport_status(true);
        monitor.on_transport_status(true);
        monitor.on_transport_status(false);
        monitor.on_transport_status(false);

        assert_eq!(*seen.lock(), vec![true, false]);
        assert_eq!(monitor.state(), ReachabilityState::Down);
    }

    #[test]
    fn test_all_subscribers_notified_in_order() {
        let monitor = ReachabilityMonitor::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = order.clone();
            monitor.subscribe(Arc::new(move |reachable| order.lock().push((id, reachable))));
        }
        assert_eq!(monitor.subscriber_count(), 3);

        monitor.on_transport_status(true);
        assert_eq!(*order.lock(), vec![(0, true), (1, true), (2, true)]);
    }

    #[test]
    fn test_concurrent_notifications_alternate() {
        let (monitor, seen) = recording_monitor();
        let monitor = Arc::new(monitor);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        monitor.on_transport_status(i % 2 == 0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seen = seen.lock();
        // Every recorded transition flips the previous one, starting from Down.
        let mut previous = false;
        for &reachable in seen.iter() {
            assert_ne!(reachable, previous);
            previous = reachable;
        }
        assert_eq!(monitor.is_reachable(), previous);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ReachabilityState::Up.to_string(), "up");
        assert_eq!(ReachabilityState::from_reachable(false), ReachabilityState::Down);
    }
}
