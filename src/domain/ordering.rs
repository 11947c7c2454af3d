use crate::domain::card::CardId;
use std::collections::HashSet;

/// Direction of a single-step move inside a lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Places `id` at index 0, removing any earlier occurrence first
pub fn insert_top(order: &mut Vec<CardId>, id: &CardId) {
    remove(order, id);
    order.insert(0, id.clone());
}

/// Removes every occurrence of `id`; returns whether anything was removed
pub fn remove(order: &mut Vec<CardId>, id: &CardId) -> bool {
    let before = order.len();
    order.retain(|existing| existing != id);
    order.len() != before
}

/// Swaps `id` with its neighbour in the given direction.
///
/// Returns `None` when `id` is not in the ordering, `Some(false)` when it
/// already sits at the boundary and `Some(true)` when a swap happened.
pub fn shift(order: &mut [CardId], id: &CardId, direction: Direction) -> Option<bool> {
    let index = order.iter().position(|existing| existing == id)?;
    let neighbour = match direction {
        Direction::Up if index > 0 => index - 1,
        Direction::Down if index + 1 < order.len() => index + 1,
        _ => return Some(false),
    };
    order.swap(index, neighbour);
    Some(true)
}

/// Drops duplicates and entries rejected by `keep`, preserving first-seen order.
///
/// Returns the number of entries dropped.
pub fn retain_unique(order: &mut Vec<CardId>, mut keep: impl FnMut(&CardId) -> bool) -> usize {
    let before = order.len();
    let mut seen = HashSet::new();
    order.retain(|id| keep(id) && seen.insert(id.clone()));
    before - order.len()
}
