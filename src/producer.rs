//! The producer side: one computation run per host scheduling cycle.
//!
//! A producer owns the value cell and the activity cells derived from it.
//! Each run installs the activity cells as the ambient scope, invokes the
//! computation, and unconditionally restores the previous scope, including
//! when the computation panics. Results only fan out when they differ from
//! the last pushed value.

use crate::observable::{Observable, Subscription};
use crate::scope::{self, Scope, Status};

pub(crate) struct Producer<P: 'static, V: 'static> {
    compute: Box<dyn FnMut(&P) -> V>,
    cell: Observable<V>,
    ref_count: Observable<usize>,
    status: Observable<Status>,
    _count_subscription: Subscription,
}

impl<P: 'static, V> Producer<P, V>
where
    V: Clone + PartialEq + 'static,
{
    /// Create the cells and run the computation once, so the value cell is
    /// initialized before anything else can reach it.
    pub fn new(compute: Box<dyn FnMut(&P) -> V>, input: &P) -> Self {
        let cell = Observable::<V>::new();
        let ref_count = Observable::with_value(0usize);
        let status = Observable::with_value(Status::Idle);

        // Every membership change on the value cell drives the activity
        // cells; both are change-filtered so plain churn does not fan out.
        let count_subscription = cell.on_subscribe(move |count| {
            ref_count.next_if_changed(count);
            status.next_if_changed(if count > 0 { Status::Active } else { Status::Idle });
        });

        let mut producer = Self {
            compute,
            cell,
            ref_count,
            status,
            _count_subscription: count_subscription,
        };
        let first = producer.cycle(input);
        producer.cell.next(first);
        producer
    }

    /// Run the computation under this producer's scope and return its
    /// result without pushing it.
    pub fn cycle(&mut self, input: &P) -> V {
        let _scope = scope::enter(Scope {
            ref_count: self.ref_count,
            status: self.status,
        });
        (self.compute)(input)
        // Scope restored here, panic included.
    }

    /// One scheduling cycle: run the computation and push the result if it
    /// differs from the last pushed value.
    pub fn run(&mut self, input: &P) {
        let value = self.cycle(input);
        self.cell.next_if_changed(value);
    }

    pub fn cell(&self) -> Observable<V> {
        self.cell
    }

    pub fn ref_count(&self) -> Observable<usize> {
        self.ref_count
    }

    pub fn status(&self) -> Observable<Status> {
        self.status
    }
}

impl<P: 'static, V: 'static> Drop for Producer<P, V> {
    fn drop(&mut self) {
        self.cell.remove();
        self.ref_count.remove();
        self.status.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_first_result_initializes_the_cell() {
        let producer = Producer::new(Box::new(|input: &i32| input * 2), &21);
        assert!(producer.cell().initialized());
        assert_eq!(producer.cell().get(), 42);
    }

    #[test]
    fn test_run_pushes_only_on_change() {
        let mut producer = Producer::new(Box::new(|input: &i32| *input), &1);
        let pushes = Rc::new(Cell::new(0));
        let pushes_clone = pushes.clone();
        let _sub = producer
            .cell()
            .on_next(move |_| pushes_clone.set(pushes_clone.get() + 1));
        pushes.set(0); // discount the replay

        producer.run(&1);
        assert_eq!(pushes.get(), 0);

        producer.run(&2);
        assert_eq!(pushes.get(), 1);
        assert_eq!(producer.cell().get(), 2);
    }

    #[test]
    fn test_scope_installed_during_computation() {
        let depth = Rc::new(Cell::new(None));
        let depth_clone = depth.clone();
        let producer = Producer::new(
            Box::new(move |_: &()| {
                depth_clone.set(Some(scope::current_status()));
                scope::current_ref_count()
            }),
            &(),
        );

        assert_eq!(depth.get(), Some(Status::Idle));
        assert_eq!(producer.cell().get(), Some(0));
        assert!(scope::current_scope().is_none());
    }

    #[test]
    fn test_activity_cells_follow_subscriber_count() {
        let producer = Producer::new(Box::new(|_: &()| 0u32), &());
        assert_eq!(producer.status().get(), Status::Idle);
        assert_eq!(producer.ref_count().get(), 0);

        let first = producer.cell().on_next(|_| {});
        assert_eq!(producer.status().get(), Status::Active);
        assert_eq!(producer.ref_count().get(), 1);

        let second = producer.cell().on_next(|_| {});
        assert_eq!(producer.ref_count().get(), 2);

        drop(second);
        assert_eq!(producer.status().get(), Status::Active);

        drop(first);
        assert_eq!(producer.status().get(), Status::Idle);
        assert_eq!(producer.ref_count().get(), 0);
    }

    #[test]
    fn test_status_transitions_are_change_filtered() {
        let producer = Producer::new(Box::new(|_: &()| 0u32), &());
        let statuses = Rc::new(std::cell::RefCell::new(Vec::new()));
        let statuses_clone = statuses.clone();
        let _watch = producer
            .status()
            .on_next(move |status| statuses_clone.borrow_mut().push(*status));

        let first = producer.cell().on_next(|_| {});
        let second = producer.cell().on_next(|_| {});
        drop(second);
        drop(first);

        // Replay, one rising edge, one falling edge; the 1 -> 2 -> 1
        // membership changes produced no status pushes.
        assert_eq!(
            *statuses.borrow(),
            vec![Status::Idle, Status::Active, Status::Idle]
        );
    }

    #[test]
    fn test_scope_restored_when_computation_panics() {
        let result = std::panic::catch_unwind(|| {
            Producer::new(Box::new(|_: &()| -> u32 { panic!("boom") }), &());
        });
        assert!(result.is_err());
        assert!(scope::current_scope().is_none());
    }

    #[test]
    fn test_drop_removes_cells() {
        let producer = Producer::new(Box::new(|_: &()| 5u32), &());
        let cell = producer.cell();
        let status = producer.status();

        drop(producer);
        assert_eq!(cell.try_get(), None);
        assert_eq!(status.try_get(), None);
    }
}
