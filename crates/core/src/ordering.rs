//! Dense ordering and linked-list maintenance for a project's cards.
//!
//! A project's cards form a sequence whose `order_index` values are exactly
//! `0..N-1`, whose `scene_number` is `order_index + 1`, and whose
//! `prev_card_id` / `next_card_id` pointers agree with that order. Every
//! mutating function here leaves the sequence in that state.

use std::collections::HashSet;

use crate::card::{Card, OrderPatch};
use crate::error::CoreError;

/// Recompute ordering fields for the whole sequence.
///
/// Returns the positions whose `order_index`, `scene_number`, or link
/// pointers changed, ascending. Those are the rows that must be persisted.
pub fn reindex(cards: &mut [Card]) -> Vec<usize> {
    let ids: Vec<String> = cards.iter().map(|c| c.id.clone()).collect();
    let mut changed = Vec::new();

    for (i, card) in cards.iter_mut().enumerate() {
        let order_index = i as i32;
        let scene_number = Some(order_index + 1);
        let prev = i.checked_sub(1).map(|p| ids[p].clone());
        let next = ids.get(i + 1).cloned();

        let dirty = card.order_index != order_index
            || card.scene_number != scene_number
            || card.prev_card_id != prev
            || card.next_card_id != next;

        if dirty {
            card.order_index = order_index;
            card.scene_number = scene_number;
            card.prev_card_id = prev;
            card.next_card_id = next;
            changed.push(i);
        }
    }

    changed
}

/// Set the ordering fields a card will have once spliced in at `index`,
/// without touching the sequence itself.
///
/// Used to persist a new card before it becomes part of the in-memory view.
pub fn place_for_insert(cards: &[Card], index: usize, card: &mut Card) {
    let index = index.min(cards.len());
    card.order_index = index as i32;
    card.scene_number = Some(index as i32 + 1);
    card.prev_card_id = index.checked_sub(1).map(|p| cards[p].id.clone());
    card.next_card_id = cards.get(index).map(|c| c.id.clone());
}

/// Splice `card` into the sequence at `index` (0 ≤ index ≤ N) and reindex.
///
/// Returns the positions whose ordering fields changed, including the new
/// card itself.
pub fn insert_at(cards: &mut Vec<Card>, index: usize, card: Card) -> Result<Vec<usize>, CoreError> {
    if index > cards.len() {
        return Err(CoreError::Validation(format!(
            "insert index {index} out of range for {} cards",
            cards.len()
        )));
    }
    cards.insert(index, card);
    let mut changed = reindex(cards);
    if !changed.contains(&index) {
        changed.push(index);
        changed.sort_unstable();
    }
    Ok(changed)
}

/// Remove the card with `id` and reindex the remainder.
///
/// Returns the removed card and the positions (in the new sequence) whose
/// ordering fields changed, or `None` if no card has that id.
pub fn remove_by_id(cards: &mut Vec<Card>, id: &str) -> Option<(Card, Vec<usize>)> {
    let pos = cards.iter().position(|c| c.id == id)?;
    let removed = cards.remove(pos);
    let changed = reindex(cards);
    Some((removed, changed))
}

/// Move the card at `from` to `to` (remove-then-insert, not swap).
///
/// Returns `Ok(false)` without touching anything when `from == to`.
pub fn move_card(cards: &mut Vec<Card>, from: usize, to: usize) -> Result<bool, CoreError> {
    let len = cards.len();
    if from >= len || to >= len {
        return Err(CoreError::Validation(format!(
            "reorder indices ({from} -> {to}) out of range for {len} cards"
        )));
    }
    if from == to {
        return Ok(false);
    }
    let card = cards.remove(from);
    cards.insert(to, card);
    reindex(cards);
    Ok(true)
}

/// Sort a freshly loaded sequence by its stored order.
///
/// Ties and gaps left by partial writes are resolved by creation time, then
/// id, so the result is deterministic. Callers should [`reindex`] after.
pub fn sort_loaded(cards: &mut [Card]) {
    cards.sort_by(|a, b| {
        a.order_index
            .cmp(&b.order_index)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Ordering patches for the given positions.
pub fn order_patches(cards: &[Card], positions: &[usize]) -> Vec<OrderPatch> {
    positions
        .iter()
        .filter_map(|&i| cards.get(i))
        .map(order_patch)
        .collect()
}

/// Ordering patches for every card in the sequence.
pub fn all_order_patches(cards: &[Card]) -> Vec<OrderPatch> {
    cards.iter().map(order_patch).collect()
}

fn order_patch(card: &Card) -> OrderPatch {
    OrderPatch {
        id: card.id.clone(),
        order_index: card.order_index,
        scene_number: card.scene_number.unwrap_or(card.order_index + 1),
        prev_card_id: card.prev_card_id.clone(),
        next_card_id: card.next_card_id.clone(),
    }
}

/// Check the dense-order and link invariants.
///
/// Following `next_card_id` from the first card must visit every card once,
/// in `order_index` order.
pub fn validate_ordering(cards: &[Card]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for (i, card) in cards.iter().enumerate() {
        if card.order_index != i as i32 {
            return Err(CoreError::Internal(format!(
                "card {} at position {i} has order_index {}",
                card.id, card.order_index
            )));
        }
        if card.scene_number != Some(i as i32 + 1) {
            return Err(CoreError::Internal(format!(
                "card {} at position {i} has scene_number {:?}",
                card.id, card.scene_number
            )));
        }
        if !seen.insert(card.id.as_str()) {
            return Err(CoreError::Internal(format!("duplicate card id {}", card.id)));
        }
    }

    let Some(first) = cards.first() else {
        return Ok(());
    };
    if first.prev_card_id.is_some() {
        return Err(CoreError::Internal(format!(
            "first card {} has a prev_card_id",
            first.id
        )));
    }

    let mut visited = 0usize;
    let mut cursor = Some(first);
    let mut prev_id: Option<&str> = None;
    while let Some(card) = cursor {
        if visited >= cards.len() || cards[visited].id != card.id {
            return Err(CoreError::Internal(format!(
                "link chain diverges from order at card {}",
                card.id
            )));
        }
        if card.prev_card_id.as_deref() != prev_id {
            return Err(CoreError::Internal(format!(
                "card {} has prev_card_id {:?}, expected {:?}",
                card.id, card.prev_card_id, prev_id
            )));
        }
        visited += 1;
        prev_id = Some(card.id.as_str());
        cursor = card
            .next_card_id
            .as_deref()
            .and_then(|next| cards.iter().find(|c| c.id == next));
        if cursor.is_none() && card.next_card_id.is_some() {
            return Err(CoreError::Internal(format!(
                "card {} links to missing card {:?}",
                card.id, card.next_card_id
            )));
        }
    }

    if visited != cards.len() {
        return Err(CoreError::Internal(format!(
            "link chain visits {visited} of {} cards",
            cards.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
