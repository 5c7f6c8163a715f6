/// Card, project and user identifiers are opaque strings.
///
/// Ids minted by this service are UUID v4 text; ids coming from the auth
/// provider (user ids) are passed through unchanged.
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Mint a fresh opaque entity id.
pub fn new_entity_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}
