//! Memoized card → frame view-model mapping.
//!
//! Streams re-send the same frames many times (init, per-frame updates,
//! complete). [`FrameCache`] keeps the last view built for each card id
//! together with a signature of the fields it was built from, and hands
//! back the same `Arc` until the card's content changes.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;

use crate::card::{Card, StoryboardStatus};
use crate::types::EntityId;

/// Client-facing view of a single frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameView {
    pub id: EntityId,
    pub order_index: i32,
    pub scene_number: i32,
    pub title: String,
    pub description: String,
    pub shot_type: Option<String>,
    pub shot_description: Option<String>,
    pub dialogue: Option<String>,
    pub sound: Option<String>,
    pub image_prompt: Option<String>,
    pub background: Option<String>,
    pub status: StoryboardStatus,
    pub image_url: Option<String>,
    pub image_urls: Vec<String>,
    pub video_url: Option<String>,
    pub prev_card_id: Option<EntityId>,
    pub next_card_id: Option<EntityId>,
}

impl From<&Card> for FrameView {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.clone(),
            order_index: card.order_index,
            scene_number: card.scene_number.unwrap_or(card.order_index + 1),
            title: card.title.clone(),
            description: card.content.clone(),
            shot_type: card.shot_type.clone(),
            shot_description: card.shot_description.clone(),
            dialogue: card.dialogue.clone(),
            sound: card.sound.clone(),
            image_prompt: card.image_prompt.clone(),
            background: card.background.clone(),
            status: card.storyboard_status.unwrap_or(StoryboardStatus::Pending),
            image_url: card.selected_image().map(str::to_string),
            image_urls: card.image_urls.clone(),
            video_url: card.video_url.clone(),
            prev_card_id: card.prev_card_id.clone(),
            next_card_id: card.next_card_id.clone(),
        }
    }
}

/// Content signature of every field that feeds a [`FrameView`].
pub fn signature(card: &Card) -> u64 {
    let mut h = DefaultHasher::new();
    card.order_index.hash(&mut h);
    card.scene_number.hash(&mut h);
    card.title.hash(&mut h);
    card.content.hash(&mut h);
    card.shot_type.hash(&mut h);
    card.shot_description.hash(&mut h);
    card.dialogue.hash(&mut h);
    card.sound.hash(&mut h);
    card.image_prompt.hash(&mut h);
    card.background.hash(&mut h);
    card.storyboard_status.hash(&mut h);
    card.image_url.hash(&mut h);
    card.image_urls.hash(&mut h);
    card.selected_image_url.hash(&mut h);
    card.video_url.hash(&mut h);
    card.prev_card_id.hash(&mut h);
    card.next_card_id.hash(&mut h);
    card.updated_at.hash(&mut h);
    h.finish()
}

/// Per-owner cache of frame views, keyed by card id.
#[derive(Debug, Default)]
pub struct FrameCache {
    entries: HashMap<EntityId, (u64, Arc<FrameView>)>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// View for `card`, rebuilt only when its signature changed.
    pub fn view(&mut self, card: &Card) -> Arc<FrameView> {
        let sig = signature(card);
        match self.entries.get(&card.id) {
            Some((cached, view)) if *cached == sig => Arc::clone(view),
            _ => {
                let view = Arc::new(FrameView::from(card));
                self.entries
                    .insert(card.id.clone(), (sig, Arc::clone(&view)));
                view
            }
        }
    }

    /// Views for a whole sequence; drops entries for cards no longer present.
    pub fn views(&mut self, cards: &[Card]) -> Vec<Arc<FrameView>> {
        let ids: HashSet<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        self.retain(&ids);
        cards.iter().map(|c| self.view(c)).collect()
    }

    /// Keep only entries whose id is in `ids`.
    pub fn retain(&mut self, ids: &HashSet<&str>) {
        self.entries.retain(|id, _| ids.contains(id.as_str()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::NewCard;

    fn card(id: &str) -> Card {
        Card::from_draft(
            id.into(),
            "p1".into(),
            "u1".into(),
            NewCard {
                title: "Opening".into(),
                content: "Harbor at dawn".into(),
                ..Default::default()
            },
            chrono::Utc::now(),
        )
    }

    #[test]
    fn unchanged_card_reuses_view() {
        let mut cache = FrameCache::new();
        let c = card("a");
        let first = cache.view(&c);
        let second = cache.view(&c);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn changed_content_rebuilds_view() {
        let mut cache = FrameCache::new();
        let mut c = card("a");
        let first = cache.view(&c);

        c.storyboard_status = Some(StoryboardStatus::Ready);
        c.image_url = Some("https://img/a.png".into());
        let second = cache.view(&c);

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.status, StoryboardStatus::Ready);
        assert_eq!(second.image_url.as_deref(), Some("https://img/a.png"));
    }

    #[test]
    fn views_prunes_removed_cards() {
        let mut cache = FrameCache::new();
        let a = card("a");
        let b = card("b");
        cache.views(&[a.clone(), b]);
        assert_eq!(cache.len(), 2);

        cache.views(&[a]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn view_serializes_camel_case() {
        let json = serde_json::to_value(FrameView::from(&card("a"))).unwrap();
        assert_eq!(json["sceneNumber"], 1);
        assert_eq!(json["description"], "Harbor at dawn");
        assert_eq!(json["status"], "pending");
    }
}
