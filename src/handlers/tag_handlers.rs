//! Tag registry endpoints.

use crate::{
    errors::AppError,
    models::tag::{Tag, TagPatch},
    services::drive_service::DriveService,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_TAG_COLOR: &str = "#6b7280";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagReq {
    pub name: String,
    pub color: Option<String>,
    pub parent_id: Option<Uuid>,
}

/// GET `/tags`
pub async fn list_tags(State(service): State<DriveService>) -> Json<Vec<Tag>> {
    Json(service.list_tags().await)
}

/// POST `/tags`
pub async fn create_tag(
    State(service): State<DriveService>,
    Json(req): Json<CreateTagReq>,
) -> Result<impl IntoResponse, AppError> {
    let color = req.color.as_deref().unwrap_or(DEFAULT_TAG_COLOR);
    let tag = service.create_tag(&req.name, color, req.parent_id).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// GET `/tags/{id}`
pub async fn get_tag(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tag>, AppError> {
    Ok(Json(service.get_tag(id).await?))
}

/// PATCH `/tags/{id}`: rename, recolor or re-parent.
pub async fn update_tag(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TagPatch>,
) -> Result<Json<Tag>, AppError> {
    Ok(Json(service.update_tag(id, patch).await?))
}

/// DELETE `/tags/{id}`
pub async fn delete_tag(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tag>, AppError> {
    Ok(Json(service.delete_tag(id).await?))
}
