//! Smart collection endpoints.

use crate::{
    errors::AppError,
    models::{
        collection::{CollectionRule, SmartCollection},
        file_record::FileRecord,
    },
    services::{collections::NewCollection, drive_service::DriveService},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateCollectionReq {
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub rules: Vec<CollectionRule>,
}

impl From<CreateCollectionReq> for NewCollection {
    fn from(req: CreateCollectionReq) -> Self {
        Self {
            name: req.name,
            icon: req.icon,
            color: req.color,
            rules: req.rules,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EvaluateReq {
    #[serde(default)]
    pub rules: Vec<CollectionRule>,
}

/// GET `/collections`
pub async fn list_collections(State(service): State<DriveService>) -> Json<Vec<SmartCollection>> {
    Json(service.list_collections().await)
}

/// POST `/collections`
pub async fn create_collection(
    State(service): State<DriveService>,
    Json(req): Json<CreateCollectionReq>,
) -> Result<impl IntoResponse, AppError> {
    let collection = service.create_collection(req.into()).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

/// GET `/collections/{id}`
pub async fn get_collection(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
) -> Result<Json<SmartCollection>, AppError> {
    Ok(Json(service.get_collection(id).await?))
}

/// DELETE `/collections/{id}`
pub async fn delete_collection(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
) -> Result<Json<SmartCollection>, AppError> {
    Ok(Json(service.delete_collection(id).await?))
}

/// GET `/collections/{id}/files`: current members.
pub async fn collection_files(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    Ok(Json(service.collection_files(id).await?))
}

/// POST `/collections/evaluate`: preview a rule chain without saving it.
pub async fn evaluate(
    State(service): State<DriveService>,
    Json(req): Json<EvaluateReq>,
) -> Json<Vec<FileRecord>> {
    Json(service.evaluate_rules(&req.rules).await)
}
