use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{
    model::{User, UserDocument},
    store::{normalize_email, prepare_new, StoreError, UserPatch, UsersStore},
};

/// Process-local backend with the same query semantics as the Mongo one.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUsersStore {
    documents: Arc<RwLock<Vec<UserDocument>>>,
}

impl InMemoryUsersStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(doc: &UserDocument, needle: &str) -> bool {
    doc.name.to_lowercase().contains(needle) || doc.email.to_lowercase().contains(needle)
}

#[async_trait]
impl UsersStore for InMemoryUsersStore {
    async fn list(&self, query: &str, limit: u64, skip: u64) -> Result<Vec<User>, StoreError> {
        let needle = query.to_lowercase();
        let mut found: Vec<UserDocument> = self
            .documents
            .read()
            .await
            .iter()
            .filter(|doc| needle.is_empty() || matches(doc, &needle))
            .cloned()
            .collect();

        found.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = match limit {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };
        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(User::from)
            .collect())
    }

    async fn get_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .find(|doc| doc.id == id)
            .cloned()
            .map(User::from))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .find(|doc| doc.email == email)
            .cloned()
            .map(User::from))
    }

    async fn create(&self, user: User) -> Result<User, StoreError> {
        let document = prepare_new(user);
        let mut documents = self.documents.write().await;
        if documents.iter().any(|doc| doc.id == document.id) {
            return Err(StoreError::Internal(
                format!("duplicate key: _id {}", document.id).into(),
            ));
        }
        documents.push(document.clone());
        Ok(document.into())
    }

    async fn update(
        &self,
        id: ObjectId,
        fields: &Map<String, Value>,
    ) -> Result<Option<User>, StoreError> {
        let patch = UserPatch::from_fields(fields);
        let mut documents = self.documents.write().await;
        Ok(documents.iter_mut().find(|doc| doc.id == id).map(|doc| {
            patch.apply(doc);
            User::from(doc.clone())
        }))
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|doc| doc.id != id);
        Ok(documents.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::{macros::datetime, OffsetDateTime};

    async fn seed(store: &InMemoryUsersStore, name: &str, email: &str, at: OffsetDateTime) -> User {
        store
            .create(User {
                name: name.into(),
                email: email.into(),
                password_hash: "hash".into(),
                created_at: Some(at),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_assigns_id_timestamp_and_normalizes_email() {
        let store = InMemoryUsersStore::new();
        let user = store
            .create(User {
                name: "Alice".into(),
                email: "  ALICE@Example.com\n".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(user.id.is_some());
        assert!(user.created_at.is_some());
        assert_eq!(user.email, "alice@example.com");

        let fetched = store.get_by_id(user.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(fetched, user);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = InMemoryUsersStore::new();
        let first = seed(&store, "a", "a@x.io", datetime!(2024-01-01 0:00 UTC)).await;
        let dup = store
            .create(User {
                id: first.id,
                ..Default::default()
            })
            .await;
        assert!(matches!(dup, Err(StoreError::Internal(_))));
    }

    #[tokio::test]
    async fn list_filters_case_insensitively_and_sorts_newest_first() {
        let store = InMemoryUsersStore::new();
        seed(&store, "Alice", "a@x.io", datetime!(2024-01-01 0:00 UTC)).await;
        seed(&store, "Bob", "bob@alice.dev", datetime!(2024-01-03 0:00 UTC)).await;
        seed(&store, "Carol", "carol@x.io", datetime!(2024-01-02 0:00 UTC)).await;

        let hits = store.list("ALICE", 0, 0).await.unwrap();
        let names: Vec<_> = hits.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Bob", "Alice"]);

        let all = store.list("", 0, 0).await.unwrap();
        let names: Vec<_> = all.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Bob", "Carol", "Alice"]);

        assert!(store.list("zed", 0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_treats_query_as_literal_text() {
        let store = InMemoryUsersStore::new();
        seed(&store, "a.b", "x@x.io", datetime!(2024-01-01 0:00 UTC)).await;
        seed(&store, "axb", "y@x.io", datetime!(2024-01-02 0:00 UTC)).await;

        let hits = store.list("a.b", 0, 0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "a.b");
    }

    #[tokio::test]
    async fn list_pages_are_contiguous() {
        let store = InMemoryUsersStore::new();
        for day in 1..=5u8 {
            let at = datetime!(2024-01-01 0:00 UTC) + time::Duration::days(day.into());
            seed(&store, &format!("user{day}"), &format!("u{day}@x.io"), at).await;
        }

        let all = store.list("", 0, 0).await.unwrap();
        let first = store.list("", 2, 0).await.unwrap();
        let second = store.list("", 2, 2).await.unwrap();
        let tail = store.list("", 0, 4).await.unwrap();

        assert_eq!(first.as_slice(), &all[0..2]);
        assert_eq!(second.as_slice(), &all[2..4]);
        assert_eq!(tail.as_slice(), &all[4..]);
    }

    #[tokio::test]
    async fn get_by_email_normalizes_lookup() {
        let store = InMemoryUsersStore::new();
        let user = seed(&store, "Alice", "alice@example.com", datetime!(2024-01-01 0:00 UTC)).await;

        let found = store.get_by_email(" Alice@EXAMPLE.com ").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(store.get_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_applies_whitelist_only() {
        let store = InMemoryUsersStore::new();
        let user = seed(&store, "Alice", "alice@example.com", datetime!(2024-01-01 0:00 UTC)).await;
        let id = user.id.unwrap();

        let fields = json!({ "passwordHash": "x", "name": "Bob", "email": "bob@example.com" });
        let updated = store
            .update(id, fields.as_object().unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Bob");
        assert_eq!(updated.email, "alice@example.com");
        assert_eq!(updated.password_hash, "hash");
        assert_eq!(updated.created_at, user.created_at);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_documents() {
        let store = InMemoryUsersStore::new();
        let missing = ObjectId::new();
        let fields = json!({ "name": "Bob" });

        assert!(store
            .update(missing, fields.as_object().unwrap())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete(missing).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let store = InMemoryUsersStore::new();
        let user = seed(&store, "Alice", "alice@example.com", datetime!(2024-01-01 0:00 UTC)).await;
        let id = user.id.unwrap();

        assert!(store.delete(id).await.unwrap());
        assert!(store.get_by_id(id).await.unwrap().is_none());
        assert!(!store.delete(id).await.unwrap());
    }
}
