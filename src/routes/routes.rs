//! Defines routes for every file model, tag, collection and session operation.
//!
//! ## Structure
//! - **Files**
//!   - `GET  /files/children` list one folder
//!   - `GET  /files` flat, filtered, paginated listing
//!   - `PUT  /upload?path=&name=` streamed upload
//!   - `POST /files/{trash,restore,purge,star,share,offline,archive}` bulk operations
//!   - `/files/{id}/...` per-record operations
//! - **Tags**: `/tags`, `/tags/{id}`
//! - **Collections**: `/collections`, `/collections/{id}`, `/collections/{id}/files`,
//!   `/collections/evaluate`
//! - **Session**: `/session/...`

use crate::{
    handlers::{
        collection_handlers, file_handlers, health_handlers::{healthz, readyz},
        session_handlers, tag_handlers,
    },
    services::drive_service::DriveService,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build and return the router for the whole API.
///
/// The router carries shared state (`DriveService`) to all handlers.
pub fn routes() -> Router<DriveService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(file_routes())
        .merge(tag_routes())
        .merge(collection_routes())
        .merge(session_routes())
}

fn file_routes() -> Router<DriveService> {
    use file_handlers::*;

    Router::new()
        .route("/files", get(list_files))
        .route("/files/children", get(list_children))
        .route("/folders", post(create_folder))
        .route("/upload", put(upload_file))
        // Bulk operations
        .route("/files/trash", post(trash))
        .route("/files/restore", post(restore))
        .route("/files/purge", post(purge))
        .route("/files/star", post(toggle_star))
        .route("/files/share", post(set_shared))
        .route("/files/offline", post(set_offline))
        .route("/files/archive", post(archive))
        // Per-record operations
        .route("/files/{id}", get(get_file))
        .route("/files/{id}/content", put(replace_content))
        .route(
            "/files/{id}/versions/{version}/restore",
            post(restore_version),
        )
        .route("/files/{id}/rename", post(rename))
        .route("/files/{id}/move", post(move_file))
        .route("/files/{id}/duplicate", post(duplicate))
        .route("/files/{id}/encryption", post(set_encryption))
        .route("/files/{id}/tags/{tag_id}", put(add_tag).delete(remove_tag))
        // Housekeeping
        .route("/duplicates", get(list_duplicates))
        .route("/duplicates/remove", post(remove_duplicates))
        .route("/analytics", get(analytics))
}

fn tag_routes() -> Router<DriveService> {
    use tag_handlers::*;

    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route(
            "/tags/{id}",
            get(get_tag).patch(update_tag).delete(delete_tag),
        )
}

fn collection_routes() -> Router<DriveService> {
    use collection_handlers::*;

    Router::new()
        .route("/collections", get(list_collections).post(create_collection))
        .route("/collections/evaluate", post(evaluate))
        .route(
            "/collections/{id}",
            get(get_collection).delete(delete_collection),
        )
        .route("/collections/{id}/files", get(collection_files))
}

fn session_routes() -> Router<DriveService> {
    use session_handlers::*;

    Router::new()
        .route("/session", get(get_session))
        .route("/session/user", put(login))
        .route("/session/plan", put(update_plan))
        .route("/session/logout", post(logout))
        .route("/session/power-mode", put(set_power_mode))
        .route("/session/onboarding", post(complete_onboarding))
}
