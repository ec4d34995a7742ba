//! # Tree Signals
//!
//! Scoped reactive state sharing for component-tree UIs.
//!
//! A [`Publisher`] runs a computation once per host scheduling cycle and
//! publishes the result to its subtree. Descendants subscribe to the whole
//! value or to a projection of it, and are notified only when their own
//! projection actually changes.
//!
//! ## Features
//!
//! - **Copy-able handles**: observable cells are `Copy` handles into a
//!   generational arena, memory safe without `unsafe` code
//! - **Projection diffing**: value, tuple, and record selectors with strict
//!   no-change-no-notification semantics
//! - **Scoped publishing**: descendants resolve the nearest enclosing mount;
//!   nested mounts of the same publisher shadow correctly, and a computation
//!   can subscribe to its own enclosing mount
//! - **Activity tracking**: per-mount subscriber-count and `active`/`idle`
//!   status cells, observable like any other value
//!
//! ## Example
//!
//! ```rust,no_run
//! use tree_signals::prelude::*;
//!
//! #[derive(Clone, PartialEq)]
//! struct Session {
//!     user: &'static str,
//!     unread: u32,
//! }
//!
//! let session = Publisher::new(|unread: &u32| Session {
//!     user: "ada",
//!     unread: *unread,
//! });
//!
//! let mut mount = session.mount(&0);
//! mount.commit();
//! mount.provide(|| {
//!     // Only changes to `unread` reach this subscriber.
//!     let unread = session
//!         .subscribe_with(Selector::value(|s: &Session| s.unread), || {
//!             println!("unread changed")
//!         })
//!         .unwrap();
//!     assert_eq!(unread.value(), 0);
//! });
//! mount.update(&3);
//! ```

mod consumer;
mod diff;
mod mount_effect;
mod observable;
mod producer;
mod publisher;
pub mod scope;
pub mod selector;
mod storage;

pub use consumer::Reader;
pub use diff::is_changed;
pub use mount_effect::{on_mount_effect, MountEffect};
pub use observable::{Observable, Subscription};
pub use publisher::{BoxCompute, Error, Mount, Publisher};
pub use scope::{current_ref_count, current_scope, current_status, Scope, Status};
pub use selector::{Selected, Selector, SelectorFn};

// Re-export the prelude
pub mod prelude {
    pub use crate::selector::part;
    pub use crate::{
        current_ref_count, current_status, on_mount_effect, Mount, Observable, Publisher, Reader,
        Selected, Selector, Status, Subscription,
    };
}
