//! Represents a user-defined label that can be attached to files.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tag. Tags form their own tree of categories through `parent_id`,
/// independent of the folder hierarchy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,

    pub name: String,

    /// Display color, e.g. `#8b5cf6`.
    pub color: String,

    /// Parent category, if any.
    pub parent_id: Option<Uuid>,
}

/// Partial update for a tag. `parent_id` distinguishes "leave as is"
/// (field absent) from "move to the top level" (`null`).
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TagPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub parent_id: Option<Option<Uuid>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
