//! Projection of a published value into the shape a consumer cares about.
//!
//! A selector is one of three shapes, dispatched once per evaluation:
//! a single projection function, an ordered tuple of them, or a keyed record
//! of them. Evaluation never mutates the source value.

use std::fmt;
use std::rc::Rc;

/// A single projection function.
pub type SelectorFn<V, S> = Rc<dyn Fn(&V) -> S>;

/// Wrap a closure as a [`SelectorFn`], for use in tuple and record
/// selectors.
pub fn part<V: 'static, S: 'static>(f: impl Fn(&V) -> S + 'static) -> SelectorFn<V, S> {
    Rc::new(f)
}

/// A projection specification over values of type `V`, producing elements of
/// type `S`.
pub enum Selector<V: 'static, S: 'static> {
    /// One projection; the selection is its result.
    Value(SelectorFn<V, S>),
    /// Ordered projections; the selection is the positional results.
    Tuple(Vec<SelectorFn<V, S>>),
    /// Keyed projections; the selection keeps the key order given here.
    Record(Vec<(&'static str, SelectorFn<V, S>)>),
}

impl<V: 'static, S: 'static> Selector<V, S> {
    pub fn value(f: impl Fn(&V) -> S + 'static) -> Self {
        Self::Value(Rc::new(f))
    }

    pub fn tuple(parts: Vec<SelectorFn<V, S>>) -> Self {
        Self::Tuple(parts)
    }

    pub fn record(entries: Vec<(&'static str, SelectorFn<V, S>)>) -> Self {
        Self::Record(entries)
    }

    /// Apply the projection to a value.
    pub fn select(&self, value: &V) -> Selected<S> {
        match self {
            Self::Value(f) => Selected::Value(f(value)),
            Self::Tuple(parts) => Selected::Tuple(parts.iter().map(|f| f(value)).collect()),
            Self::Record(entries) => Selected::Record(
                entries.iter().map(|(key, f)| (*key, f(value))).collect(),
            ),
        }
    }
}

impl<V: Clone + 'static> Selector<V, V> {
    /// The no-op projection: the consumer receives the raw value.
    pub fn identity() -> Self {
        Self::Value(Rc::new(|value: &V| value.clone()))
    }
}

impl<V: 'static, S: 'static> Clone for Selector<V, S> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(f) => Self::Value(Rc::clone(f)),
            Self::Tuple(parts) => Self::Tuple(parts.clone()),
            Self::Record(entries) => Self::Record(entries.clone()),
        }
    }
}

impl<V: 'static, S: 'static> fmt::Debug for Selector<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Selector::Value"),
            Self::Tuple(parts) => write!(f, "Selector::Tuple({})", parts.len()),
            Self::Record(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(key, _)| (key, "..")))
                .finish(),
        }
    }
}

/// The result of applying a [`Selector`]: same shape, projected elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selected<S> {
    Value(S),
    Tuple(Vec<S>),
    Record(Vec<(&'static str, S)>),
}

impl<S> Selected<S> {
    /// Unwrap a single-value selection.
    ///
    /// Panics on tuple or record selections.
    pub fn into_value(self) -> S {
        match self {
            Self::Value(value) => value,
            _ => panic!("selection is not a single value"),
        }
    }

    pub fn as_tuple(&self) -> Option<&[S]> {
        match self {
            Self::Tuple(values) => Some(values),
            _ => None,
        }
    }

    /// Look up a record selection element by key.
    pub fn field(&self, key: &str) -> Option<&S> {
        match self {
            Self::Record(entries) => entries
                .iter()
                .find(|(entry_key, _)| *entry_key == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }
}
