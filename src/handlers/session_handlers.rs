//! Session blob endpoints: signed-in user, plan, power mode, onboarding.

use crate::{
    errors::AppError,
    models::session::{PlanType, SessionState, SessionUser},
    services::drive_service::DriveService,
};
use axum::{Json, extract::State};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PowerModeReq {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlanReq {
    pub plan: PlanType,
}

type SessionReply = Result<Json<SessionState>, AppError>;

/// GET `/session`
pub async fn get_session(State(service): State<DriveService>) -> SessionReply {
    Ok(Json(service.sessions().load().await?))
}

/// PUT `/session/user`
pub async fn login(
    State(service): State<DriveService>,
    Json(user): Json<SessionUser>,
) -> SessionReply {
    tracing::info!("signing in {}", user.email);
    Ok(Json(service.sessions().login(&user).await?))
}

/// PUT `/session/plan`
pub async fn update_plan(
    State(service): State<DriveService>,
    Json(req): Json<PlanReq>,
) -> SessionReply {
    Ok(Json(service.sessions().update_plan(req.plan).await?))
}

/// POST `/session/logout`
pub async fn logout(State(service): State<DriveService>) -> SessionReply {
    tracing::info!("signing out");
    Ok(Json(service.sessions().logout().await?))
}

/// PUT `/session/power-mode`
pub async fn set_power_mode(
    State(service): State<DriveService>,
    Json(req): Json<PowerModeReq>,
) -> SessionReply {
    Ok(Json(service.sessions().set_power_mode(req.enabled).await?))
}

/// POST `/session/onboarding`
pub async fn complete_onboarding(State(service): State<DriveService>) -> SessionReply {
    Ok(Json(service.sessions().complete_onboarding().await?))
}
