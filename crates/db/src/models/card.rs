//! Row decoding and write value lists for the `cards` table.
//!
//! Rows are read with `SELECT *` and decoded column by column so that
//! optional columns missing from a partially migrated table decode as
//! `None` instead of failing the whole row.

use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use storyboard_core::card::{Card, CardPatch, StoryboardStatus};
use storyboard_core::types::Timestamp;

// ---------------------------------------------------------------------------
// Column values
// ---------------------------------------------------------------------------

/// A single bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Int(Option<i32>),
    BigInt(Option<i64>),
    Timestamp(Timestamp),
}

impl ColumnValue {
    /// Bind this value as the next placeholder of `qb`.
    pub fn push_bind(self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            ColumnValue::Text(v) => qb.push_bind(v),
            ColumnValue::Int(v) => qb.push_bind(v),
            ColumnValue::BigInt(v) => qb.push_bind(v),
            ColumnValue::Timestamp(v) => qb.push_bind(v),
        };
    }
}

fn encode_urls(urls: &[String]) -> Option<String> {
    // Serializing a list of strings cannot fail.
    serde_json::to_string(urls).ok()
}

fn status_text(status: Option<StoryboardStatus>) -> ColumnValue {
    ColumnValue::Text(status.map(|s| s.as_str().to_string()))
}

/// Every column of a full card row with its value, in catalog order.
pub fn card_values(card: &Card) -> Vec<(&'static str, ColumnValue)> {
    use ColumnValue::{BigInt, Int, Text};
    vec![
        ("id", Text(Some(card.id.clone()))),
        ("project_id", Text(Some(card.project_id.clone()))),
        ("user_id", Text(Some(card.user_id.clone()))),
        ("type", Text(Some(card.card_type.clone()))),
        ("title", Text(Some(card.title.clone()))),
        ("content", Text(Some(card.content.clone()))),
        ("order_index", Int(Some(card.order_index))),
        ("created_at", ColumnValue::Timestamp(card.created_at)),
        ("updated_at", ColumnValue::Timestamp(card.updated_at)),
        ("scene_number", Int(card.scene_number)),
        ("shot_type", Text(card.shot_type.clone())),
        ("shot_description", Text(card.shot_description.clone())),
        ("dialogue", Text(card.dialogue.clone())),
        ("sound", Text(card.sound.clone())),
        ("image_prompt", Text(card.image_prompt.clone())),
        ("storyboard_status", status_text(card.storyboard_status)),
        ("image_url", Text(card.image_url.clone())),
        ("image_urls", Text(encode_urls(&card.image_urls))),
        ("selected_image_url", Int(card.selected_image_url)),
        ("image_key", Text(card.image_key.clone())),
        ("image_size", BigInt(card.image_size)),
        ("image_type", Text(card.image_type.clone())),
        ("prev_card_id", Text(card.prev_card_id.clone())),
        ("next_card_id", Text(card.next_card_id.clone())),
        ("background", Text(card.background.clone())),
        ("video_url", Text(card.video_url.clone())),
        ("video_key", Text(card.video_key.clone())),
        ("video_prompt", Text(card.video_prompt.clone())),
    ]
}

/// Columns touched by a patch, with their new values.
///
/// `updated_at` is not included; the repository always sets it.
pub fn patch_values(patch: &CardPatch) -> Vec<(&'static str, ColumnValue)> {
    use ColumnValue::{BigInt, Int, Text};
    let mut out = Vec::new();

    if let Some(v) = &patch.title {
        out.push(("title", Text(Some(v.clone()))));
    }
    if let Some(v) = &patch.content {
        out.push(("content", Text(Some(v.clone()))));
    }
    if let Some(v) = patch.order_index {
        out.push(("order_index", Int(Some(v))));
    }
    if let Some(v) = patch.scene_number {
        out.push(("scene_number", Int(v)));
    }

    let texts = [
        ("shot_type", &patch.shot_type),
        ("shot_description", &patch.shot_description),
        ("dialogue", &patch.dialogue),
        ("sound", &patch.sound),
        ("image_prompt", &patch.image_prompt),
        ("background", &patch.background),
        ("image_url", &patch.image_url),
        ("image_key", &patch.image_key),
        ("image_type", &patch.image_type),
        ("prev_card_id", &patch.prev_card_id),
        ("next_card_id", &patch.next_card_id),
        ("video_url", &patch.video_url),
        ("video_key", &patch.video_key),
        ("video_prompt", &patch.video_prompt),
    ];
    for (column, value) in texts {
        if let Some(v) = value {
            out.push((column, Text(v.clone())));
        }
    }

    if let Some(v) = patch.storyboard_status {
        out.push(("storyboard_status", status_text(v)));
    }
    if let Some(v) = &patch.image_urls {
        out.push(("image_urls", Text(encode_urls(v))));
    }
    if let Some(v) = patch.selected_image_url {
        out.push(("selected_image_url", Int(v)));
    }
    if let Some(v) = patch.image_size {
        out.push(("image_size", BigInt(v)));
    }
    out
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

/// Decode an optional column, treating an absent column as `None`.
fn optional<'r, T>(row: &'r PgRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(column) {
        Ok(v) => Ok(v),
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Decode a card from a `SELECT *` row.
///
/// Required columns must be present. An unknown `storyboard_status` or a
/// malformed `image_urls` list is logged and read as empty rather than
/// failing the row.
pub fn card_from_row(row: &PgRow) -> Result<Card, sqlx::Error> {
    let id: String = row.try_get("id")?;

    let storyboard_status = match optional::<String>(row, "storyboard_status")? {
        Some(raw) => match StoryboardStatus::from_name(&raw) {
            Ok(s) => Some(s),
            Err(_) => {
                tracing::warn!(card_id = %id, status = %raw, "Ignoring unknown storyboard status");
                None
            }
        },
        None => None,
    };

    let image_urls = match optional::<String>(row, "image_urls")? {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(card_id = %id, error = %e, "Ignoring malformed image_urls");
            Vec::new()
        }),
        _ => Vec::new(),
    };

    Ok(Card {
        project_id: row.try_get("project_id")?,
        user_id: row.try_get("user_id")?,
        card_type: row.try_get("type")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        order_index: row.try_get("order_index")?,
        scene_number: optional(row, "scene_number")?,
        shot_type: optional(row, "shot_type")?,
        shot_description: optional(row, "shot_description")?,
        dialogue: optional(row, "dialogue")?,
        sound: optional(row, "sound")?,
        image_prompt: optional(row, "image_prompt")?,
        background: optional(row, "background")?,
        storyboard_status,
        image_url: optional(row, "image_url")?,
        image_urls,
        selected_image_url: optional(row, "selected_image_url")?,
        image_key: optional(row, "image_key")?,
        image_size: optional(row, "image_size")?,
        image_type: optional(row, "image_type")?,
        prev_card_id: optional(row, "prev_card_id")?,
        next_card_id: optional(row, "next_card_id")?,
        video_url: optional(row, "video_url")?,
        video_key: optional(row, "video_key")?,
        video_prompt: optional(row, "video_prompt")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        id,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
