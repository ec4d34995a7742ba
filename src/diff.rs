//! Change detection between two selections.

use crate::selector::Selected;

/// Whether a new selection differs from the previous one.
///
/// A shape mismatch (value vs tuple vs record) is always a change. Tuples
/// change when their lengths differ or any positional element differs.
/// Records change when their key counts differ, when a key of one is absent
/// from the other, or when any shared key's element differs; key order is
/// irrelevant. Elements compare with `PartialEq`.
pub fn is_changed<S: PartialEq>(previous: &Selected<S>, next: &Selected<S>) -> bool {
    match (previous, next) {
        (Selected::Value(a), Selected::Value(b)) => a != b,
        (Selected::Tuple(a), Selected::Tuple(b)) => {
            a.len() != b.len() || a.iter().zip(b).any(|(x, y)| x != y)
        }
        (Selected::Record(a), Selected::Record(b)) => {
            a.len() != b.len()
                || a.iter().any(|(key, x)| {
                    b.iter()
                        .find(|(other_key, _)| other_key == key)
                        .map_or(true, |(_, y)| x != y)
                })
        }
        _ => true,
    }
}
