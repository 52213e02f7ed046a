//! # Callback Registry
//!
//! Fire-and-forget fan-out to collaborators. The firing component never sees
//! a callback's error or panic; both are logged with the callback label.
//!
//! Callbacks run on the caller's task after the component has released its
//! own lock, so a callback may call back into the component.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Result a callback reports. Errors are logged only.
pub type CallbackResult = Result<(), String>;

type Callback<T> = Arc<dyn Fn(&T) -> CallbackResult + Send + Sync>;

/// Outcome of one [`CallbackRegistry::fire`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireReport {
    /// Callbacks that returned `Ok`.
    pub delivered: usize,
    /// Callbacks that returned `Err` or panicked.
    pub failed: usize,
}

/// Ordered list of labelled callbacks for payload type `T`.
pub struct CallbackRegistry<T> {
    component: &'static str,
    callbacks: RwLock<Vec<(String, Callback<T>)>>,
}

impl<T> CallbackRegistry<T> {
    /// Empty registry owned by `component` (used in log lines).
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Register a callback under a label.
    pub fn register<F>(&self, label: impl Into<String>, callback: F)
    where
        F: Fn(&T) -> CallbackResult + Send + Sync + 'static,
    {
        self.callbacks.write().push((label.into(), Arc::new(callback)));
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback with `payload`.
    pub fn fire(&self, payload: &T) -> FireReport {
        let snapshot: Vec<(String, Callback<T>)> = self.callbacks.read().clone();
        let mut report = FireReport::default();

        for (label, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(error)) => {
                    report.failed += 1;
                    warn!(subsystem = self.component, callback = %label, %error, "callback failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(subsystem = self.component, callback = %label, "callback panicked");
                }
            }
        }
        report
    }
}

impl<T> std::fmt::Debug for CallbackRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("component", &self.component)
            .field("callbacks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fire_delivers_to_all() {
        let registry = CallbackRegistry::<u32>::new("test");
        let seen = Arc::new(AtomicUsize::new(0));
        for i in 0..3 {
            let seen = seen.clone();
            registry.register(format!("cb-{i}"), move |v: &u32| {
                seen.fetch_add(*v as usize, Ordering::SeqCst);
                Ok(())
            });
        }

        let report = registry.fire(&2);
        assert_eq!(report, FireReport { delivered: 3, failed: 0 });
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_failures_do_not_stop_fanout() {
        let registry = CallbackRegistry::<()>::new("test");
        let reached = Arc::new(AtomicUsize::new(0));

        registry.register("errors", |_: &()| Err("smtp down".into()));
        registry.register("panics", |_: &()| panic!("collaborator bug"));
        let r = reached.clone();
        registry.register("last", move |_: &()| {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = registry.fire(&());
        assert_eq!(report, FireReport { delivered: 1, failed: 2 });
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_registry() {
        let registry = CallbackRegistry::<String>::new("test");
        assert!(registry.is_empty());
        assert_eq!(registry.fire(&"x".to_string()), FireReport::default());
    }
}
