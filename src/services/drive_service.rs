//! Shared service state for the HTTP layer.
//!
//! `DriveService` owns the in-memory file model (behind one async lock), the
//! saved smart collections, the deferred sync scheduler and the session
//! store. Every call takes the lock once and returns owned copies so
//! handlers never hold it across I/O.

use crate::{
    models::{
        collection::{CollectionRule, SmartCollection},
        file_record::{EncryptionType, FileRecord, FileType},
        tag::{Tag, TagPatch},
    },
    services::{
        analytics::{self, StorageStats},
        collections::{CollectionStore, NewCollection},
        file_tree::{FileTree, NewFile, TreeError},
        query::{self, FileFilter, SortSpec},
        session_store::{SessionError, SessionStore},
        sync_scheduler::SyncScheduler,
    },
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use std::{io, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("upload stream failed: {0}")]
    Io(#[from] io::Error),
}

pub type DriveResult<T> = Result<T, DriveError>;

/// Everything guarded by the service lock.
#[derive(Debug, Default)]
pub struct Drive {
    pub tree: FileTree,
    pub collections: CollectionStore,
}

fn owned(records: Vec<&FileRecord>) -> Vec<FileRecord> {
    records.into_iter().cloned().collect()
}

/// Size and md5 of a streamed body.
async fn digest_stream<S>(stream: S) -> DriveResult<(u64, String)>
where
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    let mut size: u64 = 0;
    let mut digest = Context::new();
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        digest.consume(&chunk);
    }
    Ok((size, format!("{:x}", digest.compute())))
}

#[derive(Clone)]
pub struct DriveService {
    drive: Arc<RwLock<Drive>>,
    sessions: SessionStore,
    scheduler: SyncScheduler,
}

impl DriveService {
    pub fn new(sessions: SessionStore, sync_delay: Duration) -> Self {
        Self {
            drive: Arc::new(RwLock::new(Drive::default())),
            sessions,
            scheduler: SyncScheduler::new(sync_delay),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn pending_syncs(&self) -> usize {
        self.scheduler.pending_count()
    }

    /// Number of records held, trashed included.
    pub async fn record_count(&self) -> usize {
        self.drive.read().await.tree.len()
    }

    fn schedule_sync(&self, id: Uuid) {
        let drive = self.drive.clone();
        self.scheduler.schedule(id, move || async move {
            if drive.write().await.tree.mark_synced(id) {
                debug!("record {} synced", id);
            } else {
                debug!("stale sync timer for {}", id);
            }
        });
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub async fn get(&self, id: Uuid) -> DriveResult<FileRecord> {
        Ok(self.drive.read().await.tree.get(id)?.clone())
    }

    pub async fn list_children(&self, path: &str, sort: SortSpec) -> Vec<FileRecord> {
        owned(self.drive.read().await.tree.list_children(path, sort))
    }

    /// Flat listing, in insertion order unless `sort` is given.
    pub async fn list_flat(&self, filter: &FileFilter, sort: Option<SortSpec>) -> Vec<FileRecord> {
        let drive = self.drive.read().await;
        let mut records = drive.tree.list_flat(filter);
        if let Some(spec) = sort {
            query::sort_flat(&mut records, spec);
        }
        owned(records)
    }

    pub async fn detect_duplicates(&self) -> Vec<Vec<FileRecord>> {
        self.drive
            .read()
            .await
            .tree
            .detect_duplicates()
            .into_iter()
            .map(owned)
            .collect()
    }

    pub async fn storage_stats(&self, now: DateTime<Utc>) -> StorageStats {
        analytics::storage_stats(&self.drive.read().await.tree, now)
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    pub async fn create_folder(&self, parent_path: &str, name: &str) -> DriveResult<FileRecord> {
        let folder = self.drive.write().await.tree.create_folder(parent_path, name)?;
        info!("folder created: {}", folder.path);
        self.schedule_sync(folder.id);
        Ok(folder)
    }

    pub async fn add_file(&self, parent_path: &str, new: NewFile) -> DriveResult<FileRecord> {
        let file = self.drive.write().await.tree.add_file(parent_path, new)?;
        info!("file added: {} ({} bytes)", file.path, file.size);
        self.schedule_sync(file.id);
        Ok(file)
    }

    /// Consume an upload body, then record it under `parent_path`. The body
    /// is only measured and fingerprinted; no bytes are kept. A missing
    /// parent or taken name is reported before the body is read.
    pub async fn upload_file_stream<S>(
        &self,
        parent_path: &str,
        name: &str,
        content_type: Option<&str>,
        stream: S,
    ) -> DriveResult<FileRecord>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        self.drive
            .read()
            .await
            .tree
            .check_upload_target(parent_path, name)?;
        let (size, hash) = digest_stream(stream).await?;
        self.add_file(
            parent_path,
            NewFile {
                name: name.to_string(),
                file_type: FileType::infer(content_type, name),
                size,
                hash: Some(hash),
            },
        )
        .await
    }

    pub async fn replace_content_stream<S>(
        &self,
        id: Uuid,
        comment: Option<String>,
        stream: S,
    ) -> DriveResult<FileRecord>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let (size, hash) = digest_stream(stream).await?;
        let file = self
            .drive
            .write()
            .await
            .tree
            .replace_content(id, size, Some(hash), comment)?;
        info!("content replaced: {} now at version {}", file.path, file.version);
        self.schedule_sync(file.id);
        Ok(file)
    }

    pub async fn restore_version(&self, id: Uuid, version: u32) -> DriveResult<FileRecord> {
        let file = self.drive.write().await.tree.restore_version(id, version)?;
        info!("restored version {} of {}", version, file.path);
        self.schedule_sync(file.id);
        Ok(file)
    }

    pub async fn duplicate(&self, id: Uuid) -> DriveResult<FileRecord> {
        let copy = self.drive.write().await.tree.duplicate(id)?;
        info!("duplicated {} as {}", id, copy.path);
        self.schedule_sync(copy.id);
        Ok(copy)
    }

    pub async fn archive(
        &self,
        ids: &[Uuid],
        parent_path: &str,
        name: &str,
    ) -> DriveResult<FileRecord> {
        let archive = self.drive.write().await.tree.archive(ids, parent_path, name)?;
        info!("archive created: {} ({} bytes)", archive.path, archive.size);
        self.schedule_sync(archive.id);
        Ok(archive)
    }

    // ---------------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------------

    pub async fn rename(&self, id: Uuid, name: &str) -> DriveResult<FileRecord> {
        let record = self.drive.write().await.tree.rename(id, name)?;
        info!("renamed {} to {}", id, record.path);
        Ok(record)
    }

    pub async fn move_to(&self, id: Uuid, parent_path: &str) -> DriveResult<FileRecord> {
        let record = self.drive.write().await.tree.move_to(id, parent_path)?;
        info!("moved {} to {}", id, record.path);
        Ok(record)
    }

    pub async fn set_trashed(&self, ids: &[Uuid], trashed: bool) -> DriveResult<Vec<FileRecord>> {
        let records = self.drive.write().await.tree.set_trashed(ids, trashed)?;
        info!(
            "{} {} record(s)",
            if trashed { "trashed" } else { "restored" },
            records.len()
        );
        Ok(records)
    }

    /// Purge trashed records and drop their pending sync timers.
    pub async fn delete_permanently(&self, ids: &[Uuid]) -> DriveResult<Vec<Uuid>> {
        let removed = self.drive.write().await.tree.delete_permanently(ids)?;
        let cancelled = self.scheduler.cancel_all(&removed);
        info!(
            "permanently deleted {} record(s), {} pending sync(s) cancelled",
            removed.len(),
            cancelled
        );
        Ok(removed)
    }

    pub async fn remove_duplicates(&self) -> Vec<Uuid> {
        let removed = self.drive.write().await.tree.remove_duplicates();
        self.scheduler.cancel_all(&removed);
        info!("removed {} duplicate record(s)", removed.len());
        removed
    }

    // ---------------------------------------------------------------------
    // Facets
    // ---------------------------------------------------------------------

    pub async fn toggle_star(&self, ids: &[Uuid]) -> DriveResult<Vec<FileRecord>> {
        Ok(self.drive.write().await.tree.toggle_star(ids)?)
    }

    pub async fn set_shared(&self, ids: &[Uuid], shared: bool) -> DriveResult<Vec<FileRecord>> {
        Ok(self.drive.write().await.tree.set_shared(ids, shared)?)
    }

    pub async fn set_offline_available(
        &self,
        ids: &[Uuid],
        offline: bool,
    ) -> DriveResult<Vec<FileRecord>> {
        Ok(self
            .drive
            .write()
            .await
            .tree
            .set_offline_available(ids, offline)?)
    }

    pub async fn set_encryption(
        &self,
        id: Uuid,
        encrypted: bool,
        encryption_type: Option<EncryptionType>,
    ) -> DriveResult<FileRecord> {
        let record = self
            .drive
            .write()
            .await
            .tree
            .set_encryption(id, encrypted, encryption_type)?;
        info!("encryption for {} set to {}", record.path, encrypted);
        Ok(record)
    }

    pub async fn add_tag(&self, file_id: Uuid, tag_id: Uuid) -> DriveResult<FileRecord> {
        Ok(self.drive.write().await.tree.add_tag(file_id, tag_id)?)
    }

    pub async fn remove_tag(&self, file_id: Uuid, tag_id: Uuid) -> DriveResult<FileRecord> {
        Ok(self.drive.write().await.tree.remove_tag(file_id, tag_id)?)
    }

    // ---------------------------------------------------------------------
    // Tag registry
    // ---------------------------------------------------------------------

    pub async fn list_tags(&self) -> Vec<Tag> {
        self.drive.read().await.tree.tags().to_vec()
    }

    pub async fn get_tag(&self, id: Uuid) -> DriveResult<Tag> {
        Ok(self.drive.read().await.tree.get_tag(id)?.clone())
    }

    pub async fn create_tag(
        &self,
        name: &str,
        color: &str,
        parent_id: Option<Uuid>,
    ) -> DriveResult<Tag> {
        let tag = self
            .drive
            .write()
            .await
            .tree
            .create_tag(name, color, parent_id)?;
        info!("tag created: {}", tag.name);
        Ok(tag)
    }

    pub async fn update_tag(&self, id: Uuid, patch: TagPatch) -> DriveResult<Tag> {
        Ok(self.drive.write().await.tree.update_tag(id, patch)?)
    }

    pub async fn delete_tag(&self, id: Uuid) -> DriveResult<Tag> {
        let tag = self.drive.write().await.tree.delete_tag(id)?;
        info!("tag deleted: {}", tag.name);
        Ok(tag)
    }

    // ---------------------------------------------------------------------
    // Smart collections
    // ---------------------------------------------------------------------

    pub async fn list_collections(&self) -> Vec<SmartCollection> {
        self.drive.read().await.collections.list().to_vec()
    }

    pub async fn get_collection(&self, id: Uuid) -> DriveResult<SmartCollection> {
        Ok(self.drive.read().await.collections.get(id)?.clone())
    }

    pub async fn create_collection(&self, new: NewCollection) -> DriveResult<SmartCollection> {
        let collection = self.drive.write().await.collections.create(new)?;
        info!(
            "collection created: {} ({} rule(s))",
            collection.name,
            collection.rules.len()
        );
        Ok(collection)
    }

    pub async fn delete_collection(&self, id: Uuid) -> DriveResult<SmartCollection> {
        Ok(self.drive.write().await.collections.delete(id)?)
    }

    /// Current members of a saved collection.
    pub async fn collection_files(&self, id: Uuid) -> DriveResult<Vec<FileRecord>> {
        let drive = self.drive.read().await;
        let collection = drive.collections.get(id)?;
        Ok(owned(drive.tree.evaluate_smart_collection(&collection.rules)))
    }

    pub async fn evaluate_rules(&self, rules: &[CollectionRule]) -> Vec<FileRecord> {
        owned(self.drive.read().await.tree.evaluate_smart_collection(rules))
    }
}
