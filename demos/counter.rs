//! Counter demo: one published value, several projections.
//!
//! This demo shows:
//! - Mounting a publisher and committing it to its subtree
//! - Subscribing to a single projection vs. a tuple of projections
//! - Change filtering: a subscriber only hears about its own projection

use tree_signals::prelude::*;

#[derive(Clone, PartialEq)]
struct Stats {
    count: i32,
    doubled: i32,
    label: &'static str,
}

fn main() {
    let stats = Publisher::new(|count: &i32| Stats {
        count: *count,
        doubled: count * 2,
        label: "counter",
    });

    let mut mount = stats.mount(&0);
    mount.commit();

    let (count_reader, label_reader) = mount
        .provide(|| {
            let count = stats
                .subscribe_with(Selector::value(|s: &Stats| s.count), || {
                    println!("count projection changed")
                })
                .unwrap();
            let label = stats
                .subscribe_with(Selector::value(|s: &Stats| s.label), || {
                    println!("label projection changed (never happens)")
                })
                .unwrap();
            (count, label)
        })
        .expect("mount was committed");

    for input in [1, 2, 2, 3] {
        println!("cycle with input {input}");
        mount.update(&input);
        println!(
            "  count = {}, label = {:?}",
            count_reader.value(),
            label_reader.value()
        );
    }

    let tuple_reader = mount
        .provide(|| {
            stats
                .subscribe_with(
                    Selector::tuple(vec![part(|s: &Stats| s.count), part(|s: &Stats| s.doubled)]),
                    || println!("tuple projection changed"),
                )
                .unwrap()
        })
        .expect("mount was committed");

    mount.update(&10);
    println!("tuple = {:?}", tuple_reader.get());
    println!("subscribers = {}", mount.ref_count().get());
}
