/// Videos and AI results are keyed by UUID v4.
pub type VideoId = uuid::Uuid;

/// Processing task rows are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, globally unique entity id.
pub fn new_id() -> VideoId {
    uuid::Uuid::new_v4()
}
