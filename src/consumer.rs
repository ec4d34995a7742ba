//! The consumer side: one live subscription with projection diffing.
//!
//! A [`Reader`] binds a selector to an observable cell. Every cell push
//! re-evaluates the latest selector and compares the new selection against
//! the previously delivered one; only a real difference stores the new
//! selection and invokes the change callback. Replacing the selector between
//! pushes never resubscribes and never triggers work by itself.

use crate::diff::is_changed;
use crate::observable::{Observable, Subscription};
use crate::selector::{Selected, Selector};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

struct ReaderState<V: 'static, S: 'static> {
    selector: Selector<V, S>,
    selected: Selected<S>,
    deps: Option<Box<dyn Any>>,
    on_change: Rc<dyn Fn()>,
}

/// A live, diffed subscription to an observable cell.
///
/// Dropping the reader unsubscribes from the cell, exactly once.
pub struct Reader<V: 'static, S: 'static = V> {
    cell: Observable<V>,
    state: Rc<RefCell<ReaderState<V, S>>>,
    _subscription: Subscription,
}

impl<V, S> Reader<V, S>
where
    V: Clone + 'static,
    S: PartialEq + 'static,
{
    /// Bind `selector` to `cell`. The initial selection is computed from the
    /// cell's current value; the cell must be initialized.
    ///
    /// `on_change` is invoked after each push whose selection differs from
    /// the previous one. It is not invoked for the initial selection.
    pub fn bind(
        cell: Observable<V>,
        selector: Selector<V, S>,
        on_change: impl Fn() + 'static,
    ) -> Self {
        let selected = {
            let value = cell.get();
            selector.select(&value)
        };
        let state = Rc::new(RefCell::new(ReaderState {
            selector,
            selected,
            deps: None,
            on_change: Rc::new(on_change),
        }));

        let subscription = {
            let state = Rc::clone(&state);
            // The subscribe-time replay re-selects the value just cached
            // above; the diff filters it out.
            cell.on_next(move |value| apply(&state, value))
        };

        Self {
            cell,
            state,
            _subscription: subscription,
        }
    }

    /// Replace the selector used for future evaluations.
    ///
    /// This neither resubscribes nor re-evaluates: a new selector instance
    /// with the same logic is free.
    pub fn set_selector(&self, selector: Selector<V, S>) {
        self.state.borrow_mut().selector = selector;
    }

    /// Re-evaluate against the cell's current value if `deps` differ from
    /// the previously tracked deps (positionally, by `PartialEq`).
    ///
    /// This lets a caller re-project the same value through changed inputs
    /// of its own (a lookup key, say) without any push having happened.
    /// The evaluation uses the latest selector and is diffed as usual. The
    /// first call counts as changed.
    pub fn track<D: PartialEq + 'static>(&self, deps: D) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = match state.deps.as_ref().and_then(|d| d.downcast_ref::<D>()) {
                Some(previous) => *previous != deps,
                None => true,
            };
            if changed {
                state.deps = Some(Box::new(deps));
            }
            changed
        };
        if changed {
            let value = self.cell.get();
            apply(&self.state, &value);
        }
    }

    /// The last delivered selection.
    pub fn get(&self) -> Selected<S>
    where
        S: Clone,
    {
        self.state.borrow().selected.clone()
    }

    /// Read the last delivered selection with a closure.
    pub fn with<R>(&self, f: impl FnOnce(&Selected<S>) -> R) -> R {
        f(&self.state.borrow().selected)
    }

    /// The last delivered selection of a single-value selector.
    ///
    /// Panics for tuple or record selectors.
    pub fn value(&self) -> S
    where
        S: Clone,
    {
        self.get().into_value()
    }

    /// The cell this reader is bound to.
    pub fn observable(&self) -> Observable<V> {
        self.cell
    }
}

/// Select `value` with the latest selector and deliver it if it differs
/// from the previous selection.
fn apply<V: 'static, S: PartialEq + 'static>(state: &Rc<RefCell<ReaderState<V, S>>>, value: &V) {
    let notify = {
        let mut state = state.borrow_mut();
        let next = state.selector.select(value);
        if is_changed(&state.selected, &next) {
            state.selected = next;
            Some(Rc::clone(&state.on_change))
        } else {
            None
        }
    };
    // Invoked with the state borrow released: the callback may read the
    // reader, or push into other cells.
    if let Some(on_change) = notify {
        on_change();
    }
}
