//! Publishing a computed value to a subtree.
//!
//! A [`Publisher`] is a reusable definition: a computation plus a binding
//! key. Mounting it yields a [`Mount`] that owns one value cell for its
//! whole mounted lifetime and re-runs the computation once per host cycle.
//! Descendants reach the nearest enclosing mount of a given publisher
//! through a thread-local per-key binding stack, the stand-in for a UI
//! framework's context propagation, and subscribe to projections of the
//! published value.
//!
//! Visibility is gated: until a mount is committed, [`Mount::provide`]
//! refuses to run the subtree at all, so a descendant can never observe a
//! cell without a value in it.

use crate::consumer::Reader;
use crate::observable::Observable;
use crate::producer::Producer;
use crate::scope::Status;
use crate::selector::Selector;
use crate::storage::ObservableId;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Subscription failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// `subscribe` was called with no mounted publisher bound in scope.
    #[error("no mounted publisher provides this value in the current scope")]
    PublisherNotFound,
}

/// A per-mount stateful computation, produced by a factory on every mount.
pub type BoxCompute<P, V> = Box<dyn FnMut(&P) -> V>;

enum ComputeKind<P: 'static, V: 'static> {
    /// One computation shared by every mount.
    Shared(Rc<dyn Fn(&P) -> V>),
    /// A factory invoked per mount, so each mount carries its own state.
    Factory(Rc<dyn Fn() -> BoxCompute<P, V>>),
}

struct PublisherInner<P: 'static, V: 'static> {
    key: BindingKey,
    compute: RefCell<Option<ComputeKind<P, V>>>,
}

/// A reusable definition of a published value: the computation that
/// produces it, identified by a unique binding key.
///
/// Cloning a publisher clones the definition handle, not the computation
/// state; all clones mount and subscribe against the same key.
///
/// # Examples
///
/// ```rust,no_run
/// use tree_signals::Publisher;
///
/// let doubled = Publisher::new(|input: &i32| input * 2);
/// let mount = doubled.mount(&21);
/// mount.commit();
/// mount.provide(|| {
///     let reader = doubled.subscribe(|| println!("changed")).unwrap();
///     assert_eq!(reader.value(), 42);
/// });
/// ```
pub struct Publisher<P: 'static, V: 'static> {
    inner: Rc<PublisherInner<P, V>>,
}

impl<P: 'static, V: 'static> Clone for Publisher<P, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: 'static, V> Publisher<P, V>
where
    V: Clone + PartialEq + 'static,
{
    /// Define a publisher whose computation is shared by every mount.
    pub fn new(compute: impl Fn(&P) -> V + 'static) -> Self {
        Self::with_kind(ComputeKind::Shared(Rc::new(compute)))
    }

    /// Define a publisher whose computation carries per-mount state: the
    /// factory runs once per [`Publisher::mount`].
    pub fn new_stateful(factory: impl Fn() -> BoxCompute<P, V> + 'static) -> Self {
        Self::with_kind(ComputeKind::Factory(Rc::new(factory)))
    }

    /// Define a self-referential publisher: `build` receives the publisher
    /// under construction, so the computation can subscribe to its own
    /// nearest enclosing mount.
    pub fn new_cyclic<F>(build: impl FnOnce(Publisher<P, V>) -> F) -> Self
    where
        F: Fn(&P) -> V + 'static,
    {
        let publisher = Self {
            inner: Rc::new(PublisherInner {
                key: BindingKey::next(),
                compute: RefCell::new(None),
            }),
        };
        let compute = build(publisher.clone());
        *publisher.inner.compute.borrow_mut() = Some(ComputeKind::Shared(Rc::new(compute)));
        publisher
    }

    fn with_kind(kind: ComputeKind<P, V>) -> Self {
        Self {
            inner: Rc::new(PublisherInner {
                key: BindingKey::next(),
                compute: RefCell::new(Some(kind)),
            }),
        }
    }

    fn materialize(&self) -> BoxCompute<P, V> {
        match self
            .inner
            .compute
            .borrow()
            .as_ref()
            .expect("publisher mounted during construction")
        {
            ComputeKind::Shared(compute) => {
                let compute = Rc::clone(compute);
                Box::new(move |input| compute(input))
            }
            ComputeKind::Factory(factory) => factory(),
        }
    }

    /// Mount this publisher: runs the first cycle synchronously, so the
    /// value cell holds its first result before the mount can be provided.
    pub fn mount(&self, input: &P) -> Mount<P, V> {
        let producer = Producer::new(self.materialize(), input);
        debug!(key = self.inner.key.0, "publisher mounted");
        Mount {
            publisher: self.clone(),
            producer,
            committed: Cell::new(false),
        }
    }

    /// Subscribe to the nearest enclosing mount with the identity
    /// projection.
    ///
    /// Fails with [`Error::PublisherNotFound`] when no mount of this
    /// publisher is bound in the current scope.
    pub fn subscribe(&self, on_change: impl Fn() + 'static) -> Result<Reader<V, V>, Error> {
        self.subscribe_with(Selector::identity(), on_change)
    }

    /// Subscribe to the nearest enclosing mount through `selector`.
    pub fn subscribe_with<S: PartialEq + 'static>(
        &self,
        selector: Selector<V, S>,
        on_change: impl Fn() + 'static,
    ) -> Result<Reader<V, S>, Error> {
        let cell = self.lookup().ok_or(Error::PublisherNotFound)?;
        Ok(Reader::bind(cell, selector, on_change))
    }

    /// Like [`Publisher::subscribe`], but absence of an enclosing mount is
    /// an answer, not an error.
    pub fn subscribe_optional(&self, on_change: impl Fn() + 'static) -> Option<Reader<V, V>> {
        self.subscribe_optional_with(Selector::identity(), on_change)
    }

    /// Like [`Publisher::subscribe_with`], but returns `None` when no mount
    /// of this publisher is bound in the current scope.
    pub fn subscribe_optional_with<S: PartialEq + 'static>(
        &self,
        selector: Selector<V, S>,
        on_change: impl Fn() + 'static,
    ) -> Option<Reader<V, S>> {
        let cell = self.lookup()?;
        Some(Reader::bind(cell, selector, on_change))
    }

    /// The nearest enclosing bound cell for this publisher's key.
    fn lookup(&self) -> Option<Observable<V>> {
        nearest_binding(self.inner.key).map(Observable::from_id)
    }
}

impl<P: 'static, V: 'static> fmt::Debug for Publisher<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("key", &self.inner.key.0)
            .finish()
    }
}

/// One mounted publisher instance: one value cell for its whole life.
///
/// Dropping the mount removes its cells; remounting the publisher creates
/// fresh ones.
pub struct Mount<P: 'static, V: 'static> {
    publisher: Publisher<P, V>,
    producer: Producer<P, V>,
    committed: Cell<bool>,
}

impl<P: 'static, V> Mount<P, V>
where
    V: Clone + PartialEq + 'static,
{
    /// Make the mount visible to descendants. The host calls this from its
    /// after-commit effect phase; until then, [`Mount::provide`] is gated.
    pub fn commit(&self) {
        if !self.committed.replace(true) {
            debug!(key = self.publisher.inner.key.0, "publisher committed");
        }
    }

    /// One scheduling cycle: re-run the computation against `input` and
    /// push the result if it differs from the last pushed value.
    pub fn update(&mut self, input: &P) {
        self.producer.run(input);
    }

    /// Run `f`, the descendant subtree, with this mount's cell bound as
    /// the nearest value for its publisher. Returns `None` without running
    /// `f` while the mount is uncommitted or its cell holds no value yet:
    /// gated descendants do not run at all.
    pub fn provide<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.committed.get() || !self.producer.cell().initialized() {
            return None;
        }
        let _binding = bind(self.publisher.inner.key, self.producer.cell().id());
        Some(f())
    }

    /// The published value cell.
    pub fn observable(&self) -> Observable<V> {
        self.producer.cell()
    }

    /// The live subscriber count of the value cell, as a cell of its own.
    pub fn ref_count(&self) -> Observable<usize> {
        self.producer.ref_count()
    }

    /// The activity status derived from the subscriber count.
    pub fn status(&self) -> Observable<Status> {
        self.producer.status()
    }
}

impl<P: 'static, V: 'static> Drop for Mount<P, V> {
    fn drop(&mut self) {
        debug!(key = self.publisher.inner.key.0, "publisher unmounted");
    }
}

/// Identity of a publisher definition in the binding stacks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct BindingKey(u64);

impl BindingKey {
    fn next() -> Self {
        thread_local! {
            static NEXT: Cell<u64> = const { Cell::new(0) };
        }
        NEXT.with(|next| {
            let key = next.get();
            next.set(key + 1);
            Self(key)
        })
    }
}

thread_local! {
    /// Per-key stacks of provided cells; the top of a stack is the nearest
    /// enclosing binding.
    static BINDINGS: RefCell<BTreeMap<BindingKey, Vec<ObservableId>>> =
        const { RefCell::new(BTreeMap::new()) };
}

fn bind(key: BindingKey, cell: ObservableId) -> BindingGuard {
    BINDINGS.with(|bindings| bindings.borrow_mut().entry(key).or_default().push(cell));
    BindingGuard { key }
}

fn nearest_binding(key: BindingKey) -> Option<ObservableId> {
    BINDINGS.with(|bindings| bindings.borrow().get(&key).and_then(|stack| stack.last().copied()))
}

struct BindingGuard {
    key: BindingKey,
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        BINDINGS.with(|bindings| {
            let mut bindings = bindings.borrow_mut();
            if let Some(stack) = bindings.get_mut(&self.key) {
                stack.pop();
                if stack.is_empty() {
                    bindings.remove(&self.key);
                }
            }
        });
    }
}
