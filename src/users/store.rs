use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;

use super::model::{to_bson_datetime, User, UserDocument};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    MongoDB(#[from] mongodb::error::Error),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Persistence for the user collection.
///
/// A missing document is `Ok(None)` (or `Ok(false)` for `delete`); `Err` is
/// reserved for the backend itself failing.
#[async_trait]
pub trait UsersStore: Send + Sync {
    /// Newest first. An empty `query` matches everything; `limit == 0` means
    /// no limit.
    async fn list(&self, query: &str, limit: u64, skip: u64) -> Result<Vec<User>, StoreError>;
    async fn get_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn create(&self, user: User) -> Result<User, StoreError>;
    /// Applies only the fields [`UserPatch`] accepts and returns the document
    /// as it is after the write.
    async fn update(
        &self,
        id: ObjectId,
        fields: &Map<String, Value>,
    ) -> Result<Option<User>, StoreError>;
    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError>;
}

/// The only fields a caller may change after creation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub telegram_handle: Option<String>,
}

impl UserPatch {
    /// Unknown keys are dropped. `null` clears a field; other non-string
    /// values are dropped.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let text = |key: &str| match fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => Some(String::new()),
            _ => None,
        };
        Self {
            name: text("name"),
            telegram_handle: text("telegramHandle"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.telegram_handle.is_none()
    }

    pub fn apply(&self, doc: &mut UserDocument) {
        if let Some(name) = &self.name {
            doc.name = name.clone();
        }
        if let Some(handle) = &self.telegram_handle {
            doc.telegram_handle = handle.clone();
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Fill in server-owned fields before the first insert.
pub fn prepare_new(user: User) -> UserDocument {
    let created_at = user.created_at.unwrap_or_else(OffsetDateTime::now_utc);
    UserDocument {
        id: user.id.unwrap_or_else(ObjectId::new),
        name: user.name,
        email: normalize_email(&user.email),
        telegram_handle: user.telegram_handle,
        password_hash: user.password_hash,
        created_at: to_bson_datetime(created_at),
    }
}
