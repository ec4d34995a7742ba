//! The observable cell: a mutable box with change notification.
//!
//! Cells live in the thread-local arena; `Observable<T>` is a `Copy` handle.
//! Pushing with [`Observable::next`] overwrites the stored value and fans out
//! to every subscriber synchronously. There is no equality check and no
//! re-entrancy guard at this layer: change filtering belongs to the consumer
//! side, and a subscriber that pushes into the same cell it is observing is
//! responsible for its own termination.

use crate::storage::{with_storage, ObservableId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;
use tracing::trace;

/// A `Copy` handle to a value cell with change notification.
///
/// New subscribers replay: [`Observable::on_next`] synchronously invokes the
/// callback once with the current value (if one has been pushed) before
/// returning, so a late subscriber never waits for the next push to see
/// state.
///
/// # Examples
///
/// ```rust,no_run
/// use tree_signals::Observable;
///
/// let cell = Observable::with_value(1);
/// let sub = cell.on_next(|value| println!("saw {value}"));
/// cell.next(2);
/// drop(sub); // unsubscribes
/// ```
pub struct Observable<T> {
    id: ObservableId,
    _marker: PhantomData<T>,
}

impl<T> Copy for Observable<T> {}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Observable<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Observable<T> {}

impl<T> Hash for Observable<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: 'static> Observable<T> {
    /// Create a new cell with no value yet. The first [`Observable::next`]
    /// initializes it.
    pub fn new() -> Self {
        let id = with_storage(|storage| storage.insert::<T>());
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Create a new cell already holding `value`.
    pub fn with_value(value: T) -> Self {
        let observable = Self::new();
        with_storage(|storage| storage.write(observable.id, value));
        observable
    }

    pub(crate) fn from_id(id: ObservableId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> ObservableId {
        self.id
    }

    /// Remove the cell from storage. All handles to it become inert; reads
    /// through them will fail.
    pub(crate) fn remove(self) {
        with_storage(|storage| storage.remove(self.id));
    }

    /// Whether a value has ever been pushed.
    pub fn initialized(&self) -> bool {
        with_storage(|storage| storage.initialized(self.id))
    }

    /// Number of live value subscribers.
    pub fn subscriber_count(&self) -> usize {
        with_storage(|storage| storage.subscriber_count(self.id))
    }

    /// Get a clone of the current value.
    ///
    /// Panics if the cell is uninitialized or has been removed.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.try_get().expect("observable value not found")
    }

    /// Get a clone of the current value, or `None` if the cell is
    /// uninitialized or gone.
    pub fn try_get(&self) -> Option<T>
    where
        T: Clone,
    {
        with_storage(|storage| storage.get::<T>(self.id).cloned())
    }

    /// Read the current value with a closure.
    ///
    /// The storage is borrowed while `f` runs, so `f` must not touch other
    /// observables; prefer [`Observable::get`] when it might.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        with_storage(|storage| {
            let value = storage
                .get::<T>(self.id)
                .expect("observable value not found");
            f(value)
        })
    }

    /// Overwrite the stored value, then synchronously invoke every
    /// subscriber. Subscribers registered during the fan-out are not called
    /// for this push.
    pub fn next(&self, value: T) {
        let callbacks = with_storage(|storage| storage.write(self.id, value)).unwrap_or_default();
        trace!(subscribers = callbacks.len(), "observable push");
        for callback in callbacks {
            callback();
        }
    }

    /// Push only when `value` differs from the stored one.
    ///
    /// Returns true if the value was pushed. An uninitialized cell always
    /// pushes.
    pub fn next_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let unchanged =
            with_storage(|storage| storage.get::<T>(self.id).is_some_and(|current| *current == value));
        if unchanged {
            return false;
        }
        self.next(value);
        true
    }

    /// Subscribe to value pushes.
    ///
    /// Registers the callback, replays the current value to it once if the
    /// cell is initialized, then notifies count listeners of the new
    /// subscriber count. Dropping the returned [`Subscription`] removes the
    /// callback.
    pub fn on_next(&self, callback: impl Fn(&T) + 'static) -> Subscription
    where
        T: Clone,
    {
        let cell = *self;
        let wrapped: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(value) = cell.try_get() {
                callback(&value);
            }
        });

        let registered = with_storage(|storage| storage.subscribe(self.id, Rc::clone(&wrapped)));
        let Some((token, count, count_callbacks)) = registered else {
            return Subscription::inert();
        };
        if self.initialized() {
            wrapped();
        }
        for listener in count_callbacks {
            listener(count);
        }

        let id = self.id;
        Subscription::new(move || {
            let removed = with_storage(|storage| storage.unsubscribe(id, token));
            if let Some((count, count_callbacks)) = removed {
                for listener in count_callbacks {
                    listener(count);
                }
            }
        })
    }

    /// Subscribe to subscriber-count changes (not value changes). The
    /// listener is immediately invoked with the current count.
    pub fn on_subscribe(&self, listener: impl Fn(usize) + 'static) -> Subscription {
        let listener: Rc<dyn Fn(usize)> = Rc::new(listener);
        let registered =
            with_storage(|storage| storage.add_count_listener(self.id, Rc::clone(&listener)));
        let Some((token, count)) = registered else {
            return Subscription::inert();
        };
        listener(count);

        let id = self.id;
        Subscription::new(move || {
            with_storage(|storage| storage.remove_count_listener(id, token));
        })
    }
}

impl<T: 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static + fmt::Debug + Clone> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id)
            .field("value", &self.try_get())
            .finish()
    }
}

/// Removes a registered callback when dropped.
///
/// Removal happens at most once: dropping after an explicit
/// [`Subscription::unsubscribe`] is a no-op, and count listeners are
/// re-notified only when a removal actually changed membership.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    fn inert() -> Self {
        Self { cancel: None }
    }

    /// Remove the callback now instead of at drop time.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the callback registered for the life of its cell.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_observable_creation() {
        let cell = Observable::with_value(42);
        assert_eq!(cell.get(), 42);
        assert!(cell.initialized());
    }

    #[test]
    fn test_uninitialized_until_first_push() {
        let cell = Observable::<i32>::new();
        assert!(!cell.initialized());
        assert_eq!(cell.try_get(), None);

        cell.next(7);
        assert!(cell.initialized());
        assert_eq!(cell.get(), 7);
    }

    #[test]
    fn test_next_notifies_every_subscriber() {
        use parking_lot::Mutex;
        use std::sync::Arc;

        let cell = Observable::with_value(0);
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();

        let _sub = cell.on_next(move |_| {
            *count_clone.lock() += 1;
        });

        cell.next(1);
        cell.next(2);
        cell.next(2); // no equality check at this layer
        assert_eq!(*count.lock(), 4); // replay + three pushes
    }

    #[test]
    fn test_replay_on_subscribe() {
        let cell = Observable::with_value(5);
        let seen = Rc::new(Cell::new(None));
        let seen_clone = seen.clone();

        let _sub = cell.on_next(move |value| seen_clone.set(Some(*value)));
        // The current value arrived synchronously, before any next() call.
        assert_eq!(seen.get(), Some(5));
    }

    #[test]
    fn test_next_if_changed() {
        let cell = Observable::with_value(5);
        let pushes = Rc::new(Cell::new(0));
        let pushes_clone = pushes.clone();
        let _sub = cell.on_next(move |_| pushes_clone.set(pushes_clone.get() + 1));
        pushes.set(0); // discount the replay

        assert!(!cell.next_if_changed(5));
        assert_eq!(pushes.get(), 0);
        assert!(cell.next_if_changed(6));
        assert_eq!(pushes.get(), 1);
        assert_eq!(cell.get(), 6);
    }

    #[test]
    fn test_count_listeners() {
        let cell = Observable::with_value(0);
        let counts = Rc::new(std::cell::RefCell::new(Vec::new()));
        let counts_clone = counts.clone();
        let _listener = cell.on_subscribe(move |count| counts_clone.borrow_mut().push(count));

        let first = cell.on_next(|_| {});
        let second = cell.on_next(|_| {});
        drop(first);
        drop(second);

        // Immediate replay of 0, then one notification per membership change.
        assert_eq!(*counts.borrow(), vec![0, 1, 2, 1, 0]);
    }

    #[test]
    fn test_unsubscribe_once() {
        let cell = Observable::with_value(0);
        let sub = cell.on_next(|_| {});
        assert_eq!(cell.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_detach_keeps_subscriber() {
        let cell = Observable::with_value(0);
        cell.on_next(|_| {}).detach();
        assert_eq!(cell.subscriber_count(), 1);
    }

    #[test]
    fn test_removed_cell_is_inert() {
        let cell = Observable::with_value(1);
        let sub = cell.on_next(|_| {});
        cell.remove();

        assert_eq!(cell.try_get(), None);
        cell.next(2); // dropped silently
        drop(sub); // no panic
    }

    #[test]
    fn test_observable_eq() {
        let a = Observable::with_value(10);
        let b = a;
        let c = Observable::with_value(10);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

}
