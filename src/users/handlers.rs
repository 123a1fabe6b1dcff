use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};

use crate::{error::ApiError, state::AppState};

use super::model::User;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
}

/// Unparseable or negative counts fall back to 0.
fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0)
}

// Malformed ids are answered like missing documents.
fn parse_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|e| {
        warn!(id = %raw, "malformed user id");
        ApiError::not_found(e)
    })
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    params: Option<Query<HashMap<String, String>>>,
) -> Result<Json<UserList>, ApiError> {
    // each parameter is read on its own so one bad value can't drop the rest
    let params = params.map(|Query(p)| p).unwrap_or_default();
    let query = params.get("q").map(String::as_str).unwrap_or_default();
    let limit = parse_count(params.get("limit").map(String::as_str));
    let skip = parse_count(params.get("skip").map(String::as_str));

    let users = state.users.list(query, limit, skip).await?;
    Ok(Json(UserList { users }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    match state.users.get_by_id(id).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(ApiError::not_found("user not found")),
        Err(e) => {
            error!(error = %e, %id, "get_by_id failed");
            Err(ApiError::not_found(e))
        }
    }
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user: User = serde_json::from_slice(&body).map_err(ApiError::bad_request)?;
    let user = state.users.create(user).await?;

    if let Some(id) = user.id {
        info!(user_id = %id, email = %user.email, "user created");
    }
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    let fields: Map<String, Value> =
        serde_json::from_slice(&body).map_err(ApiError::bad_request)?;

    // store failures share the 404 with missing documents here
    match state.users.update(id, &fields).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(ApiError::not_found("user not found")),
        Err(e) => {
            error!(error = %e, %id, "update failed");
            Err(ApiError::not_found(e))
        }
    }
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    match state.users.delete(id).await {
        Ok(true) => {
            info!(user_id = %id, "user deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(ApiError::not_found("user not found")),
        Err(e) => {
            error!(error = %e, %id, "delete failed");
            Err(ApiError::not_found(e))
        }
    }
}
