//! HTTP handlers for file and folder operations.
//! Upload bodies are streamed through the drive service, which measures and
//! fingerprints them without buffering.

use crate::{
    errors::AppError,
    models::file_record::{EncryptionType, FileRecord, FileType},
    services::{
        analytics::StorageStats,
        drive_service::DriveService,
        file_tree::ROOT,
        query::{FileFilter, SortDirection, SortKey, SortSpec, View},
    },
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use uuid::Uuid;

const MAX_PAGE: usize = 1000;

/// Query params for `GET /files/children`.
#[derive(Debug, Deserialize)]
pub struct ChildrenQuery {
    pub path: Option<String>,
    pub sort: Option<SortKey>,
    pub direction: Option<SortDirection>,
}

/// Query params for `GET /files`. `types` and `tags` are comma-separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesQuery {
    pub view: Option<View>,
    pub q: Option<String>,
    pub types: Option<String>,
    pub tags: Option<String>,
    pub starred: Option<bool>,
    pub shared: Option<bool>,
    pub offline: Option<bool>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub sort: Option<SortKey>,
    pub direction: Option<SortDirection>,
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesResponse {
    pub files: Vec<FileRecord>,
    pub key_count: usize,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderReq {
    pub parent_path: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub path: Option<String>,
    pub name: String,
}

/// Query params for `PUT /files/{id}/content`.
#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameReq {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveReq {
    pub parent_path: String,
}

#[derive(Debug, Deserialize)]
pub struct IdsReq {
    pub ids: Vec<Uuid>,
}

/// Bulk flag update, e.g. `{"ids": [...], "value": true}`.
#[derive(Debug, Deserialize)]
pub struct FlagReq {
    pub ids: Vec<Uuid>,
    pub value: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionReq {
    pub encrypted: bool,
    pub encryption_type: Option<EncryptionType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveReq {
    pub ids: Vec<Uuid>,
    pub parent_path: Option<String>,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: Vec<Uuid>,
}

fn encode_continuation_token(offset: usize) -> String {
    general_purpose::STANDARD.encode(offset.to_string())
}

fn decode_continuation_token(token: &str) -> Result<usize, AppError> {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| AppError::bad_request("invalid continuation token"))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl ListFilesQuery {
    /// Start from the view preset, then narrow with explicit params.
    fn filter(&self) -> Result<FileFilter, AppError> {
        let mut filter = self.view.unwrap_or_default().filter();
        filter.query = self.q.clone().filter(|q| !q.is_empty());
        if let Some(raw) = &self.types {
            filter.types = split_list(raw)
                .map(|t| t.parse::<FileType>().map_err(AppError::bad_request))
                .collect::<Result<_, _>>()?;
        }
        if let Some(raw) = &self.tags {
            filter.tags = split_list(raw)
                .map(|t| {
                    Uuid::parse_str(t)
                        .map_err(|_| AppError::bad_request(format!("invalid tag id `{}`", t)))
                })
                .collect::<Result<_, _>>()?;
        }
        if self.starred.is_some() {
            filter.starred = self.starred;
        }
        if self.shared.is_some() {
            filter.shared = self.shared;
        }
        if self.offline.is_some() {
            filter.offline_available = self.offline;
        }
        filter.min_size = self.min_size;
        filter.max_size = self.max_size;
        filter.updated_after = self.after;
        filter.updated_before = self.before;
        Ok(filter)
    }

    fn sort(&self) -> Option<SortSpec> {
        match self.sort {
            Some(key) => Some(SortSpec::new(key, self.direction.unwrap_or_default())),
            None => self.view.and_then(View::default_sort),
        }
    }
}

/// GET `/files/children?path=&sort=&direction=`
pub async fn list_children(
    State(service): State<DriveService>,
    Query(q): Query<ChildrenQuery>,
) -> Json<Vec<FileRecord>> {
    let sort = SortSpec::new(q.sort.unwrap_or_default(), q.direction.unwrap_or_default());
    let path = q.path.as_deref().unwrap_or(ROOT);
    Json(service.list_children(path, sort).await)
}

/// GET `/files`: flat, filtered, paginated listing.
pub async fn list_files(
    State(service): State<DriveService>,
    Query(q): Query<ListFilesQuery>,
) -> Result<Json<ListFilesResponse>, AppError> {
    let filter = q.filter()?;
    let offset = match q.continuation_token.as_deref() {
        Some(token) => decode_continuation_token(token)?,
        None => 0,
    };
    let max_keys = q.max_keys.unwrap_or(MAX_PAGE).clamp(1, MAX_PAGE);

    let all = service.list_flat(&filter, q.sort()).await;
    let total = all.len();
    let files: Vec<FileRecord> = all.into_iter().skip(offset).take(max_keys).collect();
    let next = offset + files.len();
    let is_truncated = next < total;

    Ok(Json(ListFilesResponse {
        key_count: files.len(),
        files,
        is_truncated,
        next_continuation_token: is_truncated.then(|| encode_continuation_token(next)),
    }))
}

/// GET `/files/{id}`
pub async fn get_file(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
) -> Result<Json<FileRecord>, AppError> {
    Ok(Json(service.get(id).await?))
}

/// POST `/folders`
pub async fn create_folder(
    State(service): State<DriveService>,
    Json(req): Json<CreateFolderReq>,
) -> Result<impl IntoResponse, AppError> {
    let parent = req.parent_path.as_deref().unwrap_or(ROOT);
    let folder = service.create_folder(parent, &req.name).await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

fn body_stream(body: Body) -> impl futures::Stream<Item = io::Result<bytes::Bytes>> + Send {
    body.into_data_stream().map(|chunk| chunk.map_err(io::Error::other))
}

/// PUT `/upload?path=&name=`: add a file from the raw request body.
pub async fn upload_file(
    State(service): State<DriveService>,
    Query(q): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let parent = q.path.as_deref().unwrap_or(ROOT);

    let file = service
        .upload_file_stream(parent, &q.name, content_type, body_stream(body))
        .await?;
    Ok((StatusCode::CREATED, Json(file)))
}

/// PUT `/files/{id}/content?comment=`
///
/// The comment labels the new version and is kept on the version it
/// supersedes later.
pub async fn replace_content(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
    Query(q): Query<ContentQuery>,
    body: Body,
) -> Result<Json<FileRecord>, AppError> {
    Ok(Json(
        service
            .replace_content_stream(id, q.comment, body_stream(body))
            .await?,
    ))
}

/// POST `/files/{id}/versions/{version}/restore`
pub async fn restore_version(
    State(service): State<DriveService>,
    Path((id, version)): Path<(Uuid, u32)>,
) -> Result<Json<FileRecord>, AppError> {
    Ok(Json(service.restore_version(id, version).await?))
}

/// POST `/files/{id}/rename`
pub async fn rename(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameReq>,
) -> Result<Json<FileRecord>, AppError> {
    Ok(Json(service.rename(id, &req.name).await?))
}

/// POST `/files/{id}/move`
pub async fn move_file(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveReq>,
) -> Result<Json<FileRecord>, AppError> {
    Ok(Json(service.move_to(id, &req.parent_path).await?))
}

/// POST `/files/{id}/duplicate`
pub async fn duplicate(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let copy = service.duplicate(id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// POST `/files/{id}/encryption`
pub async fn set_encryption(
    State(service): State<DriveService>,
    Path(id): Path<Uuid>,
    Json(req): Json<EncryptionReq>,
) -> Result<Json<FileRecord>, AppError> {
    Ok(Json(
        service
            .set_encryption(id, req.encrypted, req.encryption_type)
            .await?,
    ))
}

/// POST `/files/trash`
pub async fn trash(
    State(service): State<DriveService>,
    Json(req): Json<IdsReq>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    Ok(Json(service.set_trashed(&req.ids, true).await?))
}

/// POST `/files/restore`
pub async fn restore(
    State(service): State<DriveService>,
    Json(req): Json<IdsReq>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    Ok(Json(service.set_trashed(&req.ids, false).await?))
}

/// POST `/files/purge`: permanent deletion of trashed records.
pub async fn purge(
    State(service): State<DriveService>,
    Json(req): Json<IdsReq>,
) -> Result<Json<RemovedResponse>, AppError> {
    let removed = service.delete_permanently(&req.ids).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// POST `/files/star`
pub async fn toggle_star(
    State(service): State<DriveService>,
    Json(req): Json<IdsReq>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    Ok(Json(service.toggle_star(&req.ids).await?))
}

/// POST `/files/share`
pub async fn set_shared(
    State(service): State<DriveService>,
    Json(req): Json<FlagReq>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    Ok(Json(service.set_shared(&req.ids, req.value).await?))
}

/// POST `/files/offline`
pub async fn set_offline(
    State(service): State<DriveService>,
    Json(req): Json<FlagReq>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    Ok(Json(
        service.set_offline_available(&req.ids, req.value).await?,
    ))
}

/// PUT `/files/{id}/tags/{tagId}`
pub async fn add_tag(
    State(service): State<DriveService>,
    Path((id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<FileRecord>, AppError> {
    Ok(Json(service.add_tag(id, tag_id).await?))
}

/// DELETE `/files/{id}/tags/{tagId}`
pub async fn remove_tag(
    State(service): State<DriveService>,
    Path((id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<FileRecord>, AppError> {
    Ok(Json(service.remove_tag(id, tag_id).await?))
}

/// POST `/files/archive`
pub async fn archive(
    State(service): State<DriveService>,
    Json(req): Json<ArchiveReq>,
) -> Result<impl IntoResponse, AppError> {
    let parent = req.parent_path.as_deref().unwrap_or(ROOT);
    let archive = service.archive(&req.ids, parent, &req.name).await?;
    Ok((StatusCode::CREATED, Json(archive)))
}

/// GET `/duplicates`
pub async fn list_duplicates(State(service): State<DriveService>) -> Json<Vec<Vec<FileRecord>>> {
    Json(service.detect_duplicates().await)
}

/// POST `/duplicates/remove`
pub async fn remove_duplicates(State(service): State<DriveService>) -> Json<RemovedResponse> {
    Json(RemovedResponse {
        removed: service.remove_duplicates().await,
    })
}

/// GET `/analytics`
pub async fn analytics(State(service): State<DriveService>) -> Json<StorageStats> {
    Json(service.storage_stats(Utc::now()).await)
}
