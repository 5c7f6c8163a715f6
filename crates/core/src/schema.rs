//! Column catalog for the `cards` table and write planning against a live
//! column set.
//!
//! The application's field set may run ahead of the deployed table (rolling
//! migrations). A write keeps only the columns the table actually has;
//! optional columns are dropped, required ones are a hard configuration
//! error.

use std::collections::HashSet;

use crate::error::CoreError;

/// Table holding storyboard cards.
pub const CARDS_TABLE: &str = "cards";

/// Columns every write depends on. A table missing any of these is
/// misconfigured.
pub const REQUIRED_CARD_COLUMNS: &[&str] = &[
    "id",
    "project_id",
    "user_id",
    "type",
    "title",
    "content",
    "order_index",
    "created_at",
    "updated_at",
];

/// Columns that may lag behind in a partially migrated table.
pub const OPTIONAL_CARD_COLUMNS: &[&str] = &[
    "scene_number",
    "shot_type",
    "shot_description",
    "dialogue",
    "sound",
    "image_prompt",
    "storyboard_status",
    "image_url",
    "image_urls",
    "selected_image_url",
    "image_key",
    "image_size",
    "image_type",
    "prev_card_id",
    "next_card_id",
    "background",
    "video_url",
    "video_key",
    "video_prompt",
];

/// Outcome of planning a write against the live column set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan<'a> {
    /// Requested columns present in the table, in request order.
    pub kept: Vec<&'a str>,
    /// Requested optional columns the table lacks.
    pub dropped: Vec<&'a str>,
}

/// Fail with a configuration error if `available` lacks any required column.
pub fn check_required(table: &str, required: &[&str], available: &HashSet<String>) -> Result<(), CoreError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !available.contains(*c))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Configuration(format!(
            "table '{table}' is missing required column(s): {}",
            missing.join(", ")
        )))
    }
}

/// Intersect the requested columns with the table's live columns.
///
/// The required columns are checked first, regardless of whether this
/// particular write touches them: a table without them cannot hold a valid
/// card, so nothing is written.
pub fn plan_columns<'a>(
    table: &str,
    requested: &[&'a str],
    available: &HashSet<String>,
) -> Result<ColumnPlan<'a>, CoreError> {
    check_required(table, REQUIRED_CARD_COLUMNS, available)?;

    let mut plan = ColumnPlan {
        kept: Vec::with_capacity(requested.len()),
        dropped: Vec::new(),
    };
    for &column in requested {
        if available.contains(column) {
            plan.kept.push(column);
        } else {
            plan.dropped.push(column);
        }
    }
    Ok(plan)
}

/// Every column a full card row can carry.
pub fn all_card_columns() -> impl Iterator<Item = &'static str> {
    REQUIRED_CARD_COLUMNS
        .iter()
        .chain(OPTIONAL_CARD_COLUMNS.iter())
        .copied()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn columns_without(missing: &[&str]) -> HashSet<String> {
        all_card_columns()
            .filter(|c| !missing.contains(c))
            .map(String::from)
            .collect()
    }

    #[test]
    fn full_table_keeps_everything() {
        let available = columns_without(&[]);
        let requested: Vec<&str> = all_card_columns().collect();
        let plan = plan_columns(CARDS_TABLE, &requested, &available).unwrap();
        assert_eq!(plan.kept.len(), requested.len());
        assert!(plan.dropped.is_empty());
    }

    #[test]
    fn missing_optional_column_is_dropped() {
        let available = columns_without(&["sound", "video_prompt"]);
        let plan = plan_columns(CARDS_TABLE, &["id", "title", "sound", "video_prompt"], &available)
            .unwrap();
        assert_eq!(plan.kept, ["id", "title"]);
        assert_eq!(plan.dropped, ["sound", "video_prompt"]);
    }

    #[test]
    fn missing_required_column_is_configuration_error() {
        let available = columns_without(&["project_id"]);
        let err = plan_columns(CARDS_TABLE, &["id", "title"], &available).unwrap_err();
        match err {
            CoreError::Configuration(msg) => assert!(msg.contains("project_id")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn catalog_has_no_overlap() {
        for c in OPTIONAL_CARD_COLUMNS {
            assert!(!REQUIRED_CARD_COLUMNS.contains(c), "{c} listed twice");
        }
    }
}
