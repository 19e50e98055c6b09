//! Represents a file or folder entry in the drive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};
use uuid::Uuid;

/// Kind of entry. Only `Folder` can hold children.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FileType {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Folder,
}

impl FileType {
    /// Guess a type from a MIME type first, then from the file extension.
    pub fn infer(content_type: Option<&str>, name: &str) -> Self {
        if let Some(mime) = content_type {
            if mime.starts_with("image/") {
                return FileType::Image;
            }
            if mime.starts_with("video/") {
                return FileType::Video;
            }
            if mime.starts_with("audio/") {
                return FileType::Audio;
            }
        }

        match extension_of(name).as_deref() {
            Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "heic") => FileType::Image,
            Some("mp4" | "mov" | "mkv" | "webm" | "avi") => FileType::Video,
            Some("mp3" | "wav" | "flac" | "ogg" | "m4a") => FileType::Audio,
            Some("zip" | "tar" | "gz" | "tgz" | "7z" | "rar") => FileType::Archive,
            _ => FileType::Document,
        }
    }
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Document => "document",
            FileType::Archive => "archive",
            FileType::Folder => "folder",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(FileType::Image),
            "video" => Ok(FileType::Video),
            "audio" => Ok(FileType::Audio),
            "document" => Ok(FileType::Document),
            "archive" => Ok(FileType::Archive),
            "folder" => Ok(FileType::Folder),
            other => Err(format!("unknown file type `{}`", other)),
        }
    }
}

/// Lowercased extension of a file name, without the dot.
///
/// Dotfiles such as `.env` have no extension.
pub fn extension_of(name: &str) -> Option<String> {
    match name.rfind('.') {
        Some(0) | None => None,
        Some(pos) if pos + 1 < name.len() => Some(name[pos + 1..].to_ascii_lowercase()),
        Some(_) => None,
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    Synced,
    Syncing,
    Pending,
    Error,
    Offline,
}

/// Simulated sync progress for a record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,

    /// Percentage in `0..=100`.
    pub progress: u8,

    pub last_synced: Option<DateTime<Utc>>,
}

impl SyncStatus {
    pub fn syncing() -> Self {
        Self {
            state: SyncState::Syncing,
            progress: 0,
            last_synced: None,
        }
    }

    pub fn synced(at: DateTime<Utc>) -> Self {
        Self {
            state: SyncState::Synced,
            progress: 100,
            last_synced: Some(at),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum EncryptionType {
    Client,
    #[default]
    Server,
    #[serde(rename = "zero-knowledge")]
    ZeroKnowledge,
}

/// A previous content revision of a file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub version: u32,
    pub size: u64,
    pub hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub comment: Option<String>,
}

/// A single entry of the drive.
///
/// `path` and `parent_id` always agree: the parent is the folder whose path is
/// the prefix of this one, and `None` means the entry sits at `/`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,

    pub name: String,

    #[serde(rename = "type")]
    pub file_type: FileType,

    /// Size in bytes. Always `0` for folders.
    pub size: u64,

    /// Unix-style absolute path, e.g. `/Projects/2024/report.pdf`.
    pub path: String,

    pub parent_id: Option<Uuid>,

    pub tags: BTreeSet<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub starred: bool,
    pub trashed: bool,
    pub shared: bool,
    pub offline_available: bool,
    pub encrypted: bool,
    pub encryption_type: Option<EncryptionType>,

    /// Bumped every time the content changes.
    pub version: u32,

    /// Note attached to the current revision.
    #[serde(default)]
    pub version_comment: Option<String>,

    /// Content fingerprint, used for duplicate detection only.
    pub hash: Option<String>,

    pub sync_status: SyncStatus,

    pub owner: String,

    /// Earlier revisions, oldest first.
    pub versions: Vec<FileVersion>,
}

impl FileRecord {
    pub fn is_folder(&self) -> bool {
        self.file_type == FileType::Folder
    }

    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_type_from_mime_then_extension() {
        assert_eq!(FileType::infer(Some("image/png"), "x.bin"), FileType::Image);
        assert_eq!(FileType::infer(None, "clip.MOV"), FileType::Video);
        assert_eq!(FileType::infer(Some("application/zip"), "a.zip"), FileType::Archive);
        assert_eq!(FileType::infer(None, "notes"), FileType::Document);
    }

    #[test]
    fn parses_type_names() {
        assert_eq!("Image".parse::<FileType>(), Ok(FileType::Image));
        assert!("spreadsheet".parse::<FileType>().is_err());
        assert_eq!(FileType::Archive.to_string(), "archive");
    }

    #[test]
    fn extension_ignores_dotfiles() {
        assert_eq!(extension_of(".env"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of("Report.PDF").as_deref(), Some("pdf"));
    }

    #[test]
    fn encryption_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&EncryptionType::ZeroKnowledge).unwrap(),
            "\"zero-knowledge\""
        );
        assert_eq!(
            serde_json::from_str::<EncryptionType>("\"server\"").unwrap(),
            EncryptionType::Server
        );
        assert_eq!(EncryptionType::default(), EncryptionType::Server);
    }
}
