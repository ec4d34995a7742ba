//! Generational arena storage for observable cells.
//!
//! Uses slot maps with generational indices so that `Observable` handles are
//! cheap `Copy` values and a stale handle can never reach another cell's data.
//! Subscriber registries are slot maps as well: every registered callback gets
//! a stable `SubscriberId` token, and removal goes through that token rather
//! than through closure identity.

use slotmap::{new_key_type, SlotMap};
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

new_key_type! {
    /// Unique identifier for an observable cell in the storage.
    pub struct ObservableId;

    /// Token handed out for a registered subscriber or count listener.
    pub struct SubscriberId;
}

/// Value-change subscriber. Carries no payload: the observable layer wraps
/// typed callbacks so that each invocation re-reads the cell outside of any
/// storage borrow.
pub(crate) type ValueCallback = Rc<dyn Fn()>;

/// Subscriber-count listener.
pub(crate) type CountCallback = Rc<dyn Fn(usize)>;

/// A type-erased cell value. The box always holds an `Option<T>`; `None`
/// until the first push.
struct CellSlot {
    value: Box<dyn Any>,
    initialized: bool,
}

/// Thread-local backing store for all observable cells.
///
/// Interior mutability lets `Copy` handles read and write cells. Callbacks
/// are never invoked while the store is borrowed: mutating operations hand
/// back `Rc` clones of the registered callbacks and the caller runs them
/// after the borrow is released, because callbacks commonly re-enter the
/// store.
pub(crate) struct Storage {
    cells: SlotMap<ObservableId, CellSlot>,
    subscribers: BTreeMap<ObservableId, SlotMap<SubscriberId, ValueCallback>>,
    count_listeners: BTreeMap<ObservableId, SlotMap<SubscriberId, CountCallback>>,
}

impl Storage {
    fn new() -> Self {
        Self {
            cells: SlotMap::with_key(),
            subscribers: BTreeMap::new(),
            count_listeners: BTreeMap::new(),
        }
    }

    /// Insert a new, uninitialized cell for values of type `T`.
    pub fn insert<T: 'static>(&mut self) -> ObservableId {
        self.cells.insert(CellSlot {
            value: Box::new(Option::<T>::None),
            initialized: false,
        })
    }

    /// Remove a cell together with its subscriber and count-listener
    /// registries. Handles pointing at the removed cell become inert.
    pub fn remove(&mut self, id: ObservableId) {
        self.cells.remove(id);
        self.subscribers.remove(&id);
        self.count_listeners.remove(&id);
    }

    /// Get a reference to a cell's value, if the cell exists and has been
    /// pushed to at least once.
    pub fn get<T: 'static>(&self, id: ObservableId) -> Option<&T> {
        self.cells
            .get(id)
            .and_then(|slot| slot.value.downcast_ref::<Option<T>>())
            .and_then(|value| value.as_ref())
    }

    pub fn initialized(&self, id: ObservableId) -> bool {
        self.cells.get(id).is_some_and(|slot| slot.initialized)
    }

    /// Overwrite a cell's value and return the subscribers to notify.
    pub fn write<T: 'static>(&mut self, id: ObservableId, value: T) -> Option<Vec<ValueCallback>> {
        let slot = self.cells.get_mut(id)?;
        slot.value = Box::new(Some(value));
        slot.initialized = true;
        Some(self.value_callbacks(id))
    }

    /// Register a value subscriber. Returns the removal token, the new
    /// subscriber count, and the count listeners to notify of it.
    pub fn subscribe(
        &mut self,
        id: ObservableId,
        callback: ValueCallback,
    ) -> Option<(SubscriberId, usize, Vec<CountCallback>)> {
        if !self.cells.contains_key(id) {
            return None;
        }
        let (token, count) = {
            let registry = self.subscribers.entry(id).or_default();
            let token = registry.insert(callback);
            (token, registry.len())
        };
        Some((token, count, self.count_callbacks(id)))
    }

    /// Remove a value subscriber by token. Returns the new count and the
    /// count listeners to notify only when the token actually removed an
    /// entry; removing twice is a no-op.
    pub fn unsubscribe(
        &mut self,
        id: ObservableId,
        token: SubscriberId,
    ) -> Option<(usize, Vec<CountCallback>)> {
        let count = {
            let registry = self.subscribers.get_mut(&id)?;
            registry.remove(token)?;
            registry.len()
        };
        Some((count, self.count_callbacks(id)))
    }

    /// Register a subscriber-count listener. Returns the removal token and
    /// the current count for the caller to replay.
    pub fn add_count_listener(
        &mut self,
        id: ObservableId,
        callback: CountCallback,
    ) -> Option<(SubscriberId, usize)> {
        if !self.cells.contains_key(id) {
            return None;
        }
        let token = self.count_listeners.entry(id).or_default().insert(callback);
        Some((token, self.subscriber_count(id)))
    }

    pub fn remove_count_listener(&mut self, id: ObservableId, token: SubscriberId) {
        if let Some(registry) = self.count_listeners.get_mut(&id) {
            registry.remove(token);
        }
    }

    pub fn subscriber_count(&self, id: ObservableId) -> usize {
        self.subscribers.get(&id).map_or(0, SlotMap::len)
    }

    fn value_callbacks(&self, id: ObservableId) -> Vec<ValueCallback> {
        self.subscribers
            .get(&id)
            .map(|registry| registry.values().cloned().collect())
            .unwrap_or_default()
    }

    fn count_callbacks(&self, id: ObservableId) -> Vec<CountCallback> {
        self.count_listeners
            .get(&id)
            .map(|registry| registry.values().cloned().collect())
            .unwrap_or_default()
    }
}

thread_local! {
    static STORAGE: RefCell<Storage> = RefCell::new(Storage::new());
}

/// Access the thread-local cell storage.
pub(crate) fn with_storage<R>(f: impl FnOnce(&mut Storage) -> R) -> R {
    STORAGE.with(|storage| f(&mut storage.borrow_mut()))
}
