/// Models are keyed by a random UUID assigned at deploy time.
pub type ModelId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
