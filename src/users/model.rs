use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use tracing::warn;

/// User as exchanged with API clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, with = "object_id_hex")]
    pub id: Option<ObjectId>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "String::is_empty"
    )]
    pub telegram_handle: String,
    // accepted on create, never sent back
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing)]
    pub password_hash: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// User record in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub telegram_handle: String,
    #[serde(default)]
    pub password_hash: String,
    pub created_at: DateTime,
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        Self {
            id: Some(doc.id),
            name: doc.name,
            email: doc.email,
            telegram_handle: doc.telegram_handle,
            password_hash: doc.password_hash,
            created_at: Some(from_bson_datetime(doc.created_at)),
        }
    }
}

/// BSON datetimes carry milliseconds; anything finer is dropped.
pub fn to_bson_datetime(ts: OffsetDateTime) -> DateTime {
    let millis = ts.unix_timestamp_nanos().div_euclid(1_000_000);
    DateTime::from_millis(millis as i64)
}

pub fn from_bson_datetime(dt: DateTime) -> OffsetDateTime {
    let millis = dt.timestamp_millis();
    match OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000) {
        Ok(ts) => ts,
        Err(e) => {
            warn!(millis, error = %e, "createdAt out of range, using unix epoch");
            OffsetDateTime::UNIX_EPOCH
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

mod object_id_hex {
    use mongodb::bson::oid::ObjectId;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(id: &Option<ObjectId>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match id {
            Some(id) => serializer.serialize_str(&id.to_hex()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<ObjectId>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)?.as_deref() {
            None | Some("") => Ok(None),
            Some(hex) => ObjectId::parse_str(hex).map(Some).map_err(de::Error::custom),
        }
    }
}
