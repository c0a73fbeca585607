use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::storage::{DocumentFields, FieldValue};

/// A login session as persisted in the session collection. Written once, never read back.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn issue(user_id: impl Into<String>) -> Self {
        Self { session_id: Uuid::new_v4(), user_id: user_id.into(), created_at: Utc::now() }
    }

    /// Document key.
    pub fn key(&self) -> String {
        self.session_id.to_string()
    }

    /// Stored fields; the key itself is not repeated inside the document.
    pub fn fields(&self) -> DocumentFields {
        let mut f = DocumentFields::new();
        f.insert("user_id".to_string(), FieldValue::from(self.user_id.as_str()));
        f.insert("created_at".to_string(), FieldValue::from(self.created_at));
        f
    }
}
