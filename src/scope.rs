//! Ambient registry of the producer computation currently executing.
//!
//! Producers install a [`Scope`] for the duration of each computation run.
//! The registry is an explicit thread-local stack with RAII pop, so nested
//! runs shadow correctly and a panicking computation still restores the
//! outer scope before unwinding past it.

use crate::observable::Observable;
use std::cell::RefCell;
use std::fmt;
use tracing::trace;

/// Activity of a published value: whether anything is consuming it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// At least one live subscriber.
    Active,
    /// No subscribers, or the producing computation itself is running.
    Idle,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Idle => "idle",
        })
    }
}

/// The activity cells of the producer whose computation is running:
/// its live subscriber count and the status derived from it.
#[derive(Clone, Copy, Debug)]
pub struct Scope {
    pub ref_count: Observable<usize>,
    pub status: Observable<Status>,
}

thread_local! {
    static SCOPES: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

/// Push `scope` for the duration of the returned guard.
pub(crate) fn enter(scope: Scope) -> ScopeGuard {
    SCOPES.with(|scopes| {
        let mut scopes = scopes.borrow_mut();
        scopes.push(scope);
        trace!(depth = scopes.len(), "entered producer scope");
    });
    ScopeGuard { _private: () }
}

/// Pops the innermost scope on drop. Held across exactly one computation
/// run; drop order enforces the LIFO discipline.
pub(crate) struct ScopeGuard {
    _private: (),
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            scopes.pop();
            trace!(depth = scopes.len(), "left producer scope");
        });
    }
}

/// The innermost installed scope, if a producer computation is executing.
pub fn current_scope() -> Option<Scope> {
    SCOPES.with(|scopes| scopes.borrow().last().copied())
}

/// The status as seen from the current call site.
///
/// [`Status::Idle`] while any producer computation is executing (including
/// a nested, self-referential run) and [`Status::Active`] everywhere else.
/// Transitions driven by subscriber counts are observed through the scope's
/// status cell, not through this snapshot.
pub fn current_status() -> Status {
    if current_scope().is_some() {
        Status::Idle
    } else {
        Status::Active
    }
}

/// The enclosing producer's live subscriber count, or `None` when called
/// outside any producer computation.
pub fn current_ref_count() -> Option<usize> {
    current_scope().map(|scope| scope.ref_count.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scope() -> Scope {
        Scope {
            ref_count: Observable::with_value(0),
            status: Observable::with_value(Status::Idle),
        }
    }

    #[test]
    fn test_outside_any_scope() {
        assert!(current_scope().is_none());
        assert_eq!(current_status(), Status::Active);
        assert_eq!(current_ref_count(), None);
    }

    #[test]
    fn test_nested_scopes_shadow_and_restore() {
        let outer = test_scope();
        let inner = test_scope();

        let outer_guard = enter(outer);
        assert_eq!(current_scope().unwrap().ref_count, outer.ref_count);
        assert_eq!(current_status(), Status::Idle);

        {
            let _inner_guard = enter(inner);
            assert_eq!(current_scope().unwrap().ref_count, inner.ref_count);
        }

        assert_eq!(current_scope().unwrap().ref_count, outer.ref_count);
        drop(outer_guard);
        assert!(current_scope().is_none());
    }

    #[test]
    fn test_ref_count_reads_the_scope_cell() {
        let scope = test_scope();
        scope.ref_count.next(3);

        let _guard = enter(scope);
        assert_eq!(current_ref_count(), Some(3));
    }

    #[test]
    fn test_scope_restored_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _guard = enter(test_scope());
            panic!("computation failed");
        });
        assert!(result.is_err());
        assert!(current_scope().is_none());
    }
}
