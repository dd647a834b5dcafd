//! Ordered observer lists with explicit removal tokens.
//!
//! Used by the connection monitor and the token stores. Callbacks run
//! synchronously in registration order. A callback that panics is logged and
//! skipped; delivery continues with the next one. Removal is idempotent and may
//! happen from inside another callback.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback<T>,
}

/// Registered observers for values of type `T`.
pub(crate) struct ObserverList<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry<T>>>,
}

impl<T> Default for ObserverList<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T: 'static> ObserverList<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve a slot without registering the callback yet.
    ///
    /// The returned [`Subscription`] is live immediately; [`attach`](Self::attach)
    /// makes the callback visible to deliveries unless the subscription was
    /// cancelled in the meantime.
    pub(crate) fn reserve(self: &Arc<Self>) -> (Subscription, Pending) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let list: Weak<Self> = Arc::downgrade(self);
        let flag = Arc::clone(&active);
        let subscription = Subscription {
            active: Arc::clone(&active),
            remove: Some(Box::new(move || {
                flag.store(false, Ordering::SeqCst);
                if let Some(list) = list.upgrade() {
                    list.remove(id);
                }
            })),
        };
        (subscription, Pending { id, active })
    }

    /// Register `callback` under a reserved slot. Returns false if the slot was already cancelled.
    pub(crate) fn attach(&self, pending: &Pending, callback: Callback<T>) -> bool {
        let mut entries = self.lock();
        if !pending.active.load(Ordering::SeqCst) {
            return false;
        }
        entries.push(Entry {
            id: pending.id,
            active: Arc::clone(&pending.active),
            callback,
        });
        true
    }

    /// Reserve and attach in one step.
    pub(crate) fn register(self: &Arc<Self>, callback: Callback<T>) -> Subscription {
        let (subscription, pending) = self.reserve();
        self.attach(&pending, callback);
        subscription
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|e| e.id != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `value` to every observer registered at the time of the call, in order.
    pub(crate) fn notify(&self, value: &T) {
        let targets: Vec<(Arc<AtomicBool>, Callback<T>)> = self
            .lock()
            .iter()
            .map(|e| (Arc::clone(&e.active), Arc::clone(&e.callback)))
            .collect();
        for (active, callback) in targets {
            if active.load(Ordering::SeqCst) {
                invoke(&callback, value);
            }
        }
    }
}

/// Call one observer, containing a panic to that observer.
pub(crate) fn invoke<T>(callback: &Callback<T>, value: &T) {
    if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
        tracing::warn!("observer panicked; continuing delivery");
    }
}

/// A reserved observer slot awaiting [`ObserverList::attach`].
pub(crate) struct Pending {
    id: u64,
    active: Arc<AtomicBool>,
}

#[cfg(test)]
impl Pending {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Removal token for a registered observer.
///
/// Unsubscribes on drop. The observer list is held weakly, so a subscription
/// never keeps its source alive.
pub struct Subscription {
    active: Arc<AtomicBool>,
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Stop receiving notifications. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Callback<u32>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let make = move |name: &str| {
            let l = Arc::clone(&l);
            let name = name.to_string();
            let cb: Callback<u32> = Arc::new(move |v: &u32| {
                l.lock().unwrap().push(format!("{}:{}", name, v));
            });
            cb
        };
        (log, make)
    }

    #[test]
    fn delivers_in_registration_order() {
        let list = ObserverList::<u32>::new();
        let (log, make) = recorder();
        let _a = list.register(make("a"));
        let _b = list.register(make("b"));
        list.notify(&1);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_stops_delivery() {
        let list = ObserverList::<u32>::new();
        let (log, make) = recorder();
        let mut a = list.register(make("a"));
        a.unsubscribe();
        a.unsubscribe();
        assert!(!a.is_active());
        list.notify(&1);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn drop_unsubscribes() {
        let list = ObserverList::<u32>::new();
        let (_log, make) = recorder();
        {
            let _a = list.register(make("a"));
            assert_eq!(list.len(), 1);
        }
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let list = ObserverList::<u32>::new();
        let (log, make) = recorder();
        let _boom = list.register(Arc::new(|_: &u32| panic!("observer bug")));
        let _b = list.register(make("b"));
        list.notify(&7);
        list.notify(&8);
        assert_eq!(*log.lock().unwrap(), vec!["b:7", "b:8"]);
    }

    #[test]
    fn observer_can_remove_a_later_observer_mid_delivery() {
        let list = ObserverList::<u32>::new();
        let (log, make) = recorder();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let v = Arc::clone(&victim);
        let _killer = list.register(Arc::new(move |_: &u32| {
            v.lock().unwrap().take();
        }));
        *victim.lock().unwrap() = Some(list.register(make("victim")));

        list.notify(&1);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn cancelled_reservation_never_attaches() {
        let list = ObserverList::<u32>::new();
        let (_log, make) = recorder();
        let (mut sub, pending) = list.reserve();
        sub.unsubscribe();
        assert!(!pending.is_active());
        assert!(!list.attach(&pending, make("late")));
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn subscription_outliving_list_is_harmless() {
        let list = ObserverList::<u32>::new();
        let (_log, make) = recorder();
        let mut sub = list.register(make("a"));
        drop(list);
        sub.unsubscribe();
    }
}
