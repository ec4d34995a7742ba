//! Nesting demo: a self-referential publisher that counts its own depth,
//! plus activity tracking through the status cell.

use tree_signals::prelude::*;

fn main() {
    // Each mount reads the nearest enclosing mount of the same publisher
    // and goes one deeper.
    let depth: Publisher<(), u32> = Publisher::new_cyclic(|publisher| {
        move |_: &()| {
            publisher
                .subscribe_optional(|| {})
                .map(|reader| reader.value() + 1)
                .unwrap_or(1)
        }
    });

    let outer = depth.mount(&());
    outer.commit();
    println!("outer depth = {}", outer.observable().get());

    outer
        .provide(|| {
            let middle = depth.mount(&());
            middle.commit();
            println!("middle depth = {}", middle.observable().get());

            middle
                .provide(|| {
                    let inner = depth.mount(&());
                    inner.commit();
                    println!("inner depth = {}", inner.observable().get());
                })
                .expect("middle mount was committed");
        })
        .expect("outer mount was committed");

    // Activity follows the subscriber count.
    println!("status with no subscribers: {}", outer.status().get());
    let reader = outer
        .provide(|| depth.subscribe(|| println!("outer value changed")).unwrap())
        .expect("outer mount was committed");
    println!("status with one subscriber: {}", outer.status().get());
    drop(reader);
    println!("status after detach: {}", outer.status().get());

    // Outside any producer computation the ambient reads are sentinels.
    println!("ambient status: {}", current_status());
    println!("ambient ref count: {:?}", current_ref_count());
}
