use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Collection, Database,
};
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    model::{User, UserDocument},
    store::{normalize_email, prepare_new, StoreError, UserPatch, UsersStore},
};

pub const MONGODB_COLLECTION_USERS: &str = "users";

#[derive(Debug, Clone)]
pub struct MongoUsersStore {
    collection: Collection<UserDocument>,
}

impl MongoUsersStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<UserDocument>(MONGODB_COLLECTION_USERS),
        }
    }
}

/// Case-insensitive literal substring match on name or email.
fn search_filter(query: &str) -> Document {
    if query.is_empty() {
        return doc! {};
    }
    let pattern = regex::escape(query);
    doc! {
        "$or": [
            { "name": { "$regex": pattern.as_str(), "$options": "i" } },
            { "email": { "$regex": pattern.as_str(), "$options": "i" } },
        ]
    }
}

fn list_options(limit: u64, skip: u64) -> FindOptions {
    let mut options = FindOptions::default();
    options.sort = Some(doc! { "createdAt": -1, "_id": -1 });
    if limit > 0 {
        options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    if skip > 0 {
        // serialized as i64 by the driver
        options.skip = Some(skip.min(i64::MAX as u64));
    }
    options
}

fn set_document(patch: &UserPatch) -> Document {
    let mut set = doc! {};
    if let Some(name) = &patch.name {
        set.insert("name", name.as_str());
    }
    if let Some(handle) = &patch.telegram_handle {
        set.insert("telegramHandle", handle.as_str());
    }
    set
}

#[async_trait]
impl UsersStore for MongoUsersStore {
    async fn list(&self, query: &str, limit: u64, skip: u64) -> Result<Vec<User>, StoreError> {
        let documents: Vec<UserDocument> = self
            .collection
            .find(search_filter(query))
            .with_options(list_options(limit, skip))
            .await?
            .try_collect()
            .await?;

        debug!(count = documents.len(), %query, limit, skip, "listed users");
        Ok(documents.into_iter().map(User::from).collect())
    }

    async fn get_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        let found = self.collection.find_one(doc! { "_id": id }).await?;
        Ok(found.map(User::from))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        let found = self.collection.find_one(doc! { "email": email }).await?;
        Ok(found.map(User::from))
    }

    async fn create(&self, user: User) -> Result<User, StoreError> {
        let document = prepare_new(user);
        self.collection.insert_one(&document).await?;
        Ok(document.into())
    }

    async fn update(
        &self,
        id: ObjectId,
        fields: &Map<String, Value>,
    ) -> Result<Option<User>, StoreError> {
        let patch = UserPatch::from_fields(fields);
        if patch.is_empty() {
            return self.get_by_id(id).await;
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set_document(&patch) })
            .with_options(options)
            .await?;
        Ok(updated.map(User::from))
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}
