//! Effects that fire when new consumers attach to the enclosing publisher.

use crate::observable::Subscription;
use crate::scope;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Keeps an effect registered; dropping it stops the effect.
#[derive(Debug)]
pub struct MountEffect {
    _subscription: Option<Subscription>,
}

/// Run `effect` once per increase of the enclosing publisher's subscriber
/// count above its previously observed level.
///
/// Call from within a producer computation. If the count is already positive
/// at registration, the effect runs once immediately. Decreases only lower
/// the observed level, so a later re-attach fires again. Outside any
/// producer computation there is no count to observe and the effect simply
/// runs once.
pub fn on_mount_effect(effect: impl FnMut() + 'static) -> MountEffect {
    let Some(current) = scope::current_scope() else {
        let mut effect = effect;
        effect();
        return MountEffect {
            _subscription: None,
        };
    };

    let effect = Rc::new(RefCell::new(effect));
    let observed = Cell::new(current.ref_count.get());
    if observed.get() > 0 {
        (effect.borrow_mut())();
    }

    let subscription = current.ref_count.on_next(move |count| {
        // The subscribe-time replay delivers the level just observed, so it
        // never fires the effect.
        if *count > observed.get() {
            (effect.borrow_mut())();
        }
        observed.set(*count);
    });

    MountEffect {
        _subscription: Some(subscription),
    }
}
