use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::EncodedImage;

/// One successful caption, as kept in the local history slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unique id, prefixed with the creation time so ids sort by age
    pub id: String,

    /// Captioned image as a data URI
    pub image: String,

    pub caption: String,

    /// Creation time in epoch milliseconds
    pub timestamp: i64,
}

impl HistoryRecord {
    /// Creates a record stamped with the current time and a fresh id
    pub fn new(image: &EncodedImage, caption: &str) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        Self {
            id: format!("{}-{}", timestamp, Uuid::new_v4().simple()),
            image: image.to_data_uri(),
            caption: caption.to_string(),
            timestamp,
        }
    }
}
