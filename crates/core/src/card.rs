//! Card (storyboard frame) model, generation status, and patch DTOs.
//!
//! A card is one scene of a storyboard. Cards belong to exactly one project
//! and are kept in a dense order (`order_index` 0..N-1) with redundant
//! `prev_card_id` / `next_card_id` links.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};

/// Card `type` value for frames produced by the storyboard feature.
pub const CARD_TYPE_STORYBOARD: &str = "storyboard";

// ---------------------------------------------------------------------------
// Storyboard status
// ---------------------------------------------------------------------------

/// Image generation status of a card.
///
/// `pending -> enhancing -> prompted -> generating -> ready`, with `error`
/// reachable from any non-terminal state. Transitions are driven by the
/// build pipeline; the frame store treats the value as plain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryboardStatus {
    Pending,
    Enhancing,
    Prompted,
    Generating,
    Ready,
    Error,
}

/// Every status value, in lifecycle order.
pub const ALL_STATUSES: [StoryboardStatus; 6] = [
    StoryboardStatus::Pending,
    StoryboardStatus::Enhancing,
    StoryboardStatus::Prompted,
    StoryboardStatus::Generating,
    StoryboardStatus::Ready,
    StoryboardStatus::Error,
];

impl StoryboardStatus {
    /// Column value stored in `cards.storyboard_status`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Enhancing => "enhancing",
            Self::Prompted => "prompted",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Parse from the stored column value.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        ALL_STATUSES
            .into_iter()
            .find(|s| s.as_str() == name)
            .ok_or_else(|| CoreError::Validation(format!("Unknown storyboard status '{name}'")))
    }

    /// `ready` and `error` end a generation attempt.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }

    /// Whether moving from `self` to `next` follows the lifecycle.
    ///
    /// A terminal status may only re-enter `pending` or `generating`
    /// (explicit regeneration).
    pub fn can_transition_to(self, next: Self) -> bool {
        use StoryboardStatus::*;
        match (self, next) {
            (from, Error) => !from.is_terminal(),
            (Pending, Enhancing)
            | (Enhancing, Prompted)
            | (Prompted, Generating)
            | (Generating, Ready) => true,
            (Ready | Error, Pending | Generating) => true,
            _ => false,
        }
    }
}

impl fmt::Display for StoryboardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A card row, independent of which optional columns the table carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: EntityId,
    pub project_id: EntityId,
    pub user_id: EntityId,
    #[serde(rename = "type")]
    pub card_type: String,
    pub title: String,
    pub content: String,
    pub order_index: i32,
    // -- Shot metadata --
    pub scene_number: Option<i32>,
    pub shot_type: Option<String>,
    pub shot_description: Option<String>,
    pub dialogue: Option<String>,
    pub sound: Option<String>,
    pub image_prompt: Option<String>,
    pub background: Option<String>,
    pub storyboard_status: Option<StoryboardStatus>,
    // -- Images --
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Index into `image_urls` of the image shown for this frame.
    pub selected_image_url: Option<i32>,
    pub image_key: Option<String>,
    pub image_size: Option<i64>,
    pub image_type: Option<String>,
    // -- Linked-list pointers --
    pub prev_card_id: Option<EntityId>,
    pub next_card_id: Option<EntityId>,
    // -- Video --
    pub video_url: Option<String>,
    pub video_key: Option<String>,
    pub video_prompt: Option<String>,
    // -- Timestamps --
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Card {
    /// Build a card from a draft, with ordering fields left for the caller
    /// (or [`crate::ordering::reindex`]) to fill.
    pub fn from_draft(
        id: EntityId,
        project_id: EntityId,
        user_id: EntityId,
        draft: NewCard,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            project_id,
            user_id,
            card_type: draft
                .card_type
                .unwrap_or_else(|| CARD_TYPE_STORYBOARD.to_string()),
            title: draft.title,
            content: draft.content,
            order_index: 0,
            scene_number: None,
            shot_type: draft.shot_type,
            shot_description: draft.shot_description,
            dialogue: draft.dialogue,
            sound: draft.sound,
            image_prompt: draft.image_prompt,
            background: draft.background,
            storyboard_status: Some(draft.storyboard_status.unwrap_or(StoryboardStatus::Pending)),
            image_url: None,
            image_urls: Vec::new(),
            selected_image_url: None,
            image_key: None,
            image_size: None,
            image_type: None,
            prev_card_id: None,
            next_card_id: None,
            video_url: None,
            video_key: None,
            video_prompt: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// URL of the image currently selected for display.
    ///
    /// Falls back to `image_url` when the selection pointer is unset or out
    /// of range.
    pub fn selected_image(&self) -> Option<&str> {
        self.selected_image_url
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.image_urls.get(i))
            .map(String::as_str)
            .or(self.image_url.as_deref())
    }

    /// Apply a partial update in memory. Ordering fields are applied as-is;
    /// callers that touch them are responsible for re-validating the order.
    pub fn apply_patch(&mut self, patch: &CardPatch) {
        macro_rules! set {
            ($field:ident) => {
                if let Some(v) = &patch.$field {
                    self.$field = v.clone();
                }
            };
        }
        set!(title);
        set!(content);
        set!(order_index);
        set!(scene_number);
        set!(shot_type);
        set!(shot_description);
        set!(dialogue);
        set!(sound);
        set!(image_prompt);
        set!(background);
        set!(storyboard_status);
        set!(image_url);
        set!(image_urls);
        set!(selected_image_url);
        set!(image_key);
        set!(image_size);
        set!(image_type);
        set!(prev_card_id);
        set!(next_card_id);
        set!(video_url);
        set!(video_key);
        set!(video_prompt);
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// Input for a new card. Identity, ownership and ordering are assigned by
/// the frame store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCard {
    #[serde(rename = "type")]
    pub card_type: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub shot_type: Option<String>,
    pub shot_description: Option<String>,
    pub dialogue: Option<String>,
    pub sound: Option<String>,
    pub image_prompt: Option<String>,
    pub background: Option<String>,
    pub storyboard_status: Option<StoryboardStatus>,
}

// ---------------------------------------------------------------------------
// Patch DTOs
// ---------------------------------------------------------------------------

/// Deserialize a present-but-null field as `Some(None)` so that patches can
/// clear nullable columns.
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Partial card update keyed by id.
///
/// Outer `None` leaves a field untouched; for nullable fields `Some(None)`
/// clears the column.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CardPatch {
    pub id: EntityId,
    pub title: Option<String>,
    pub content: Option<String>,
    pub order_index: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub scene_number: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub shot_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub shot_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub dialogue: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sound: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_prompt: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub background: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub storyboard_status: Option<Option<StoryboardStatus>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    pub image_urls: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub selected_image_url: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_size: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub prev_card_id: Option<Option<EntityId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub next_card_id: Option<Option<EntityId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub video_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub video_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub video_prompt: Option<Option<String>>,
}

impl CardPatch {
    /// An empty patch for `id`.
    pub fn for_id(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Whether the patch touches any ordering field.
    pub fn touches_order(&self) -> bool {
        self.order_index.is_some()
            || self.scene_number.is_some()
            || self.prev_card_id.is_some()
            || self.next_card_id.is_some()
    }
}

/// Ordering fields of a single card, as written after a reindex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub id: EntityId,
    pub order_index: i32,
    pub scene_number: i32,
    pub prev_card_id: Option<EntityId>,
    pub next_card_id: Option<EntityId>,
}

impl From<&OrderPatch> for CardPatch {
    fn from(p: &OrderPatch) -> Self {
        CardPatch {
            id: p.id.clone(),
            order_index: Some(p.order_index),
            scene_number: Some(Some(p.scene_number)),
            prev_card_id: Some(p.prev_card_id.clone()),
            next_card_id: Some(p.next_card_id.clone()),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
