//! Session data cached in the local key-value store.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlanType {
    #[default]
    Free,
    Silver,
    Gold,
    Platinum,
}

/// The signed-in user as remembered between launches.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    #[serde(default)]
    pub plan: PlanType,
}

/// Everything the front end restores at startup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub user: Option<SessionUser>,
    pub power_mode: bool,
    pub onboarding_completed: bool,
}
