//! src/services/file_tree.rs
//!
//! FileTree: the authoritative in-memory collection of file and folder
//! records plus the tag registry. Hierarchy is derived from each record's
//! `parent_id`, and every operation keeps `path` in agreement with it.
//!
//! All mutations validate first and commit second, so a failing call leaves
//! the collection exactly as it was.

use crate::{
    models::{
        collection::CollectionRule,
        file_record::{EncryptionType, FileRecord, FileType, FileVersion, SyncState, SyncStatus},
        tag::{Tag, TagPatch},
    },
    services::{
        collections,
        query::{self, FileFilter, SortSpec},
    },
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("`{name}` already exists in `{parent}`")]
    Conflict { parent: String, name: String },
    #[error("cannot move `{0}` into itself or one of its descendants")]
    Cycle(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("name `{name}` invalid: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("invalid rules: {0}")]
    InvalidRule(String),
}

pub type TreeResult<T> = Result<T, TreeError>;

pub const ROOT: &str = "/";
const MAX_NAME_LEN: usize = 255;
const DEFAULT_OWNER: &str = "You";

/// Fields supplied when a file is uploaded.
#[derive(Clone, Debug)]
pub struct NewFile {
    pub name: String,
    pub file_type: FileType,
    pub size: u64,
    pub hash: Option<String>,
}

#[derive(Debug, Default)]
pub struct FileTree {
    /// Insertion order doubles as the tie-breaker for every sort.
    records: Vec<FileRecord>,
    tags: Vec<Tag>,
}

/// Collapse repeated and trailing slashes. Empty input means the root.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.trim().split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

pub fn join_path(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Validate a file, folder or tag name.
///
/// Rules:
/// - not empty, at most 255 bytes
/// - no leading or trailing whitespace
/// - no `/` and no control characters
/// - not `.` or `..`
fn validate_name(name: &str) -> TreeResult<()> {
    let invalid = |reason: &str| {
        Err(TreeError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        })
    };

    if name.is_empty() {
        return invalid("cannot be empty");
    }
    if name.len() > MAX_NAME_LEN {
        return invalid("must be at most 255 bytes");
    }
    if name.trim() != name {
        return invalid("cannot begin or end with whitespace");
    }
    if name == "." || name == ".." {
        return invalid("is reserved");
    }
    if name.contains('/') {
        return invalid("cannot contain `/`");
    }
    if name.chars().any(char::is_control) {
        return invalid("cannot contain control characters");
    }
    Ok(())
}

/// `report.pdf` -> `report (copy).pdf`, then `report (copy 2).pdf`, ...
fn copy_name(name: &str, attempt: usize) -> String {
    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    };
    if attempt <= 1 {
        format!("{} (copy){}", stem, ext)
    } else {
        format!("{} (copy {}){}", stem, attempt, ext)
    }
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, trashed ones included, in insertion order.
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ---------------------------------------------------------------------
    // Lookup helpers
    // ---------------------------------------------------------------------

    fn position(&self, id: Uuid) -> TreeResult<usize> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| TreeError::NotFound(format!("file {}", id)))
    }

    /// Resolve every id up front, dropping repeats. Fails on the first
    /// unknown id so bulk operations never half-apply.
    fn positions(&self, ids: &[Uuid]) -> TreeResult<Vec<usize>> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            if seen.insert(id) {
                out.push(self.position(id)?);
            }
        }
        Ok(out)
    }

    pub fn get(&self, id: Uuid) -> TreeResult<&FileRecord> {
        self.position(id).map(|idx| &self.records[idx])
    }

    /// Child of `parent` called `name`. An active record wins over a trashed
    /// one that used to hold the same name.
    fn child_named(&self, parent: Option<Uuid>, name: &str) -> Option<&FileRecord> {
        let mut trashed = None;
        for record in &self.records {
            if record.parent_id == parent && record.name == name {
                if !record.trashed {
                    return Some(record);
                }
                trashed.get_or_insert(record);
            }
        }
        trashed
    }

    /// Locate a record by walking `path` one segment at a time from the root.
    ///
    /// Returns `None` for `/` itself, which has no record.
    pub fn get_by_path(&self, path: &str) -> Option<&FileRecord> {
        let normalized = normalize_path(path);
        let mut parent = None;
        let mut found = None;
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            let record = self.child_named(parent, segment)?;
            parent = Some(record.id);
            found = Some(record);
        }
        found
    }

    fn path_of(&self, id: Option<Uuid>) -> String {
        id.and_then(|id| self.records.iter().find(|r| r.id == id))
            .map(|r| r.path.clone())
            .unwrap_or_else(|| ROOT.to_string())
    }

    /// Resolve a destination folder. Returns its id (`None` for the root) and
    /// canonical path.
    fn resolve_folder(&self, path: &str) -> TreeResult<(Option<Uuid>, String)> {
        let normalized = normalize_path(path);
        if normalized == ROOT {
            return Ok((None, normalized));
        }

        let record = self
            .get_by_path(&normalized)
            .ok_or_else(|| TreeError::NotFound(format!("folder `{}`", normalized)))?;
        if !record.is_folder() {
            return Err(TreeError::InvalidState(format!(
                "`{}` is not a folder",
                record.path
            )));
        }
        if record.trashed {
            return Err(TreeError::InvalidState(format!(
                "`{}` is in the trash",
                record.path
            )));
        }
        Ok((Some(record.id), record.path.clone()))
    }

    fn ensure_name_free(
        &self,
        parent: Option<Uuid>,
        name: &str,
        except: Option<Uuid>,
    ) -> TreeResult<()> {
        let taken = self.records.iter().any(|r| {
            !r.trashed && r.parent_id == parent && r.name == name && Some(r.id) != except
        });
        if taken {
            return Err(TreeError::Conflict {
                parent: self.path_of(parent),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// True when `candidate` is `ancestor` or sits somewhere beneath it.
    fn is_within(&self, candidate: Option<Uuid>, ancestor: Uuid) -> bool {
        let mut current = candidate;
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.records.len() {
                break;
            }
            current = self
                .records
                .iter()
                .find(|r| r.id == id)
                .and_then(|r| r.parent_id);
        }
        false
    }

    fn children_index(&self) -> HashMap<Uuid, Vec<usize>> {
        let mut index: HashMap<Uuid, Vec<usize>> = HashMap::new();
        for (idx, record) in self.records.iter().enumerate() {
            if let Some(parent) = record.parent_id {
                index.entry(parent).or_default().push(idx);
            }
        }
        index
    }

    fn descendant_ids(&self, root: Uuid) -> Vec<Uuid> {
        let children = self.children_index();
        let mut out = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            for &idx in children.get(&id).into_iter().flatten() {
                let child = self.records[idx].id;
                out.push(child);
                queue.push_back(child);
            }
        }
        out
    }

    /// New paths for every descendant of `root` once `root` lives at
    /// `root_path`. Breadth-first, so parents are planned before children.
    fn plan_subtree_paths(&self, root: Uuid, root_path: String) -> Vec<(usize, String)> {
        let children = self.children_index();
        let mut plan = Vec::new();
        let mut queue = VecDeque::from([(root, root_path)]);
        while let Some((id, path)) = queue.pop_front() {
            for &idx in children.get(&id).into_iter().flatten() {
                let child = &self.records[idx];
                let child_path = join_path(&path, &child.name);
                queue.push_back((child.id, child_path.clone()));
                plan.push((idx, child_path));
            }
        }
        plan
    }

    fn apply_paths(&mut self, plan: Vec<(usize, String)>) {
        for (idx, path) in plan {
            self.records[idx].path = path;
        }
    }

    fn remove_subtrees(&mut self, roots: &[Uuid]) -> Vec<Uuid> {
        let mut doomed: HashSet<Uuid> = HashSet::new();
        for &root in roots {
            doomed.insert(root);
            doomed.extend(self.descendant_ids(root));
        }
        let removed: Vec<Uuid> = self
            .records
            .iter()
            .filter(|r| doomed.contains(&r.id))
            .map(|r| r.id)
            .collect();
        self.records.retain(|r| !doomed.contains(&r.id));
        removed
    }

    #[allow(clippy::too_many_arguments)]
    fn build_record(
        name: &str,
        file_type: FileType,
        size: u64,
        parent_id: Option<Uuid>,
        path: String,
        hash: Option<String>,
        sync_status: SyncStatus,
        now: DateTime<Utc>,
    ) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            file_type,
            size,
            path,
            parent_id,
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            starred: false,
            trashed: false,
            shared: false,
            offline_available: false,
            encrypted: false,
            encryption_type: None,
            version: 1,
            version_comment: None,
            hash,
            sync_status,
            owner: DEFAULT_OWNER.to_string(),
            versions: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Active children of the folder at `path`, folders first, then ordered
    /// by `sort`. An unknown path, or one naming a file, yields nothing.
    pub fn list_children(&self, path: &str, sort: SortSpec) -> Vec<&FileRecord> {
        let normalized = normalize_path(path);
        let parent = if normalized == ROOT {
            None
        } else {
            match self.get_by_path(&normalized) {
                Some(folder) if folder.is_folder() => Some(folder.id),
                _ => return Vec::new(),
            }
        };

        let mut children: Vec<&FileRecord> = self
            .records
            .iter()
            .filter(|r| !r.trashed && r.parent_id == parent)
            .collect();
        query::sort_children(&mut children, sort);
        children
    }

    /// Every record matching `filter`, regardless of where it lives.
    pub fn list_flat(&self, filter: &FileFilter) -> Vec<&FileRecord> {
        self.records.iter().filter(|r| filter.matches(r)).collect()
    }

    /// Groups of two or more active records sharing a content hash, each
    /// group ordered oldest first.
    pub fn detect_duplicates(&self) -> Vec<Vec<&FileRecord>> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&FileRecord>> = HashMap::new();
        for record in self.records.iter().filter(|r| !r.trashed) {
            if let Some(hash) = record.hash.as_deref() {
                let group = groups.entry(hash).or_default();
                if group.is_empty() {
                    order.push(hash);
                }
                group.push(record);
            }
        }

        order
            .into_iter()
            .filter_map(|hash| groups.remove(hash))
            .filter(|group| group.len() > 1)
            .map(|mut group| {
                group.sort_by_key(|r| r.created_at);
                group
            })
            .collect()
    }

    /// Active records matching a smart collection rule chain.
    pub fn evaluate_smart_collection(&self, rules: &[CollectionRule]) -> Vec<&FileRecord> {
        self.records
            .iter()
            .filter(|r| !r.trashed && collections::matches_rules(rules, r))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    pub fn create_folder(&mut self, parent_path: &str, name: &str) -> TreeResult<FileRecord> {
        validate_name(name)?;
        let (parent_id, parent_path) = self.resolve_folder(parent_path)?;
        self.ensure_name_free(parent_id, name, None)?;

        let folder = Self::build_record(
            name,
            FileType::Folder,
            0,
            parent_id,
            join_path(&parent_path, name),
            None,
            SyncStatus::syncing(),
            Utc::now(),
        );
        debug!("created folder {}", folder.path);
        self.records.push(folder.clone());
        Ok(folder)
    }

    /// Check that `name` could be added under `parent_path` right now.
    /// Lets callers reject an upload before reading its body.
    pub fn check_upload_target(&self, parent_path: &str, name: &str) -> TreeResult<()> {
        validate_name(name)?;
        let (parent_id, _) = self.resolve_folder(parent_path)?;
        self.ensure_name_free(parent_id, name, None)
    }

    /// Add an uploaded file. It starts out `syncing`.
    pub fn add_file(&mut self, parent_path: &str, new: NewFile) -> TreeResult<FileRecord> {
        if new.file_type == FileType::Folder {
            return Err(TreeError::InvalidState(
                "folders are created with create_folder".into(),
            ));
        }
        validate_name(&new.name)?;
        let (parent_id, parent_path) = self.resolve_folder(parent_path)?;
        self.ensure_name_free(parent_id, &new.name, None)?;

        let file = Self::build_record(
            &new.name,
            new.file_type,
            new.size,
            parent_id,
            join_path(&parent_path, &new.name),
            new.hash,
            SyncStatus::syncing(),
            Utc::now(),
        );
        debug!("added file {} ({} bytes)", file.path, file.size);
        self.records.push(file.clone());
        Ok(file)
    }

    /// Copy a file next to itself under a free "(copy)" name.
    pub fn duplicate(&mut self, id: Uuid) -> TreeResult<FileRecord> {
        let source = self.get(id)?;
        if source.is_folder() {
            return Err(TreeError::InvalidState("folders cannot be duplicated".into()));
        }
        if source.trashed {
            return Err(TreeError::InvalidState(format!(
                "`{}` is in the trash",
                source.path
            )));
        }

        let mut attempt = 1;
        let name = loop {
            let candidate = copy_name(&source.name, attempt);
            if self.ensure_name_free(source.parent_id, &candidate, None).is_ok() {
                break candidate;
            }
            attempt += 1;
        };
        validate_name(&name)?;

        let mut copy = Self::build_record(
            &name,
            source.file_type,
            source.size,
            source.parent_id,
            join_path(&self.path_of(source.parent_id), &name),
            source.hash.clone(),
            SyncStatus::syncing(),
            Utc::now(),
        );
        copy.tags = source.tags.clone();
        debug!("duplicated {} as {}", source.path, copy.path);
        self.records.push(copy.clone());
        Ok(copy)
    }

    /// Pack `ids` into a new archive record under `parent_path`. The archive's
    /// size is the total of the sources and everything beneath them; the
    /// sources are left in place.
    pub fn archive(&mut self, ids: &[Uuid], parent_path: &str, name: &str) -> TreeResult<FileRecord> {
        if ids.is_empty() {
            return Err(TreeError::InvalidState("nothing to archive".into()));
        }
        validate_name(name)?;
        let indices = self.positions(ids)?;
        if let Some(&idx) = indices.iter().find(|&&i| self.records[i].trashed) {
            return Err(TreeError::InvalidState(format!(
                "`{}` is in the trash",
                self.records[idx].path
            )));
        }
        let (parent_id, parent_path) = self.resolve_folder(parent_path)?;
        self.ensure_name_free(parent_id, name, None)?;

        let mut included: BTreeSet<Uuid> = BTreeSet::new();
        for &idx in &indices {
            let root = self.records[idx].id;
            included.insert(root);
            included.extend(self.descendant_ids(root));
        }
        let mut size = 0u64;
        let mut fingerprint = md5::Context::new();
        for record in self.records.iter().filter(|r| included.contains(&r.id)) {
            size = size.saturating_add(record.size);
            let part = record.hash.clone().unwrap_or_else(|| record.id.to_string());
            fingerprint.consume(part.as_bytes());
        }

        let archive = Self::build_record(
            name,
            FileType::Archive,
            size,
            parent_id,
            join_path(&parent_path, name),
            Some(format!("{:x}", fingerprint.compute())),
            SyncStatus::syncing(),
            Utc::now(),
        );
        debug!(
            "archived {} record(s) into {} ({} bytes)",
            included.len(),
            archive.path,
            size
        );
        self.records.push(archive.clone());
        Ok(archive)
    }

    // ---------------------------------------------------------------------
    // Structural mutations
    // ---------------------------------------------------------------------

    /// Rename a record. Folders carry every descendant path along.
    /// Renaming to the current name is a no-op.
    pub fn rename(&mut self, id: Uuid, new_name: &str) -> TreeResult<FileRecord> {
        validate_name(new_name)?;
        let idx = self.position(id)?;
        if self.records[idx].name == new_name {
            return Ok(self.records[idx].clone());
        }

        let parent_id = self.records[idx].parent_id;
        if !self.records[idx].trashed {
            self.ensure_name_free(parent_id, new_name, Some(id))?;
        }
        let new_path = join_path(&self.path_of(parent_id), new_name);
        let plan = self.plan_subtree_paths(id, new_path.clone());

        let record = &mut self.records[idx];
        debug!("renaming {} -> {}", record.path, new_path);
        record.name = new_name.to_string();
        record.path = new_path;
        record.updated_at = Utc::now();
        self.apply_paths(plan);
        Ok(self.records[idx].clone())
    }

    /// Re-parent a record under the folder at `new_parent_path`.
    pub fn move_to(&mut self, id: Uuid, new_parent_path: &str) -> TreeResult<FileRecord> {
        let idx = self.position(id)?;
        let normalized = normalize_path(new_parent_path);
        if normalized != ROOT {
            if let Some(target) = self.get_by_path(&normalized) {
                if self.is_within(Some(target.id), id) {
                    return Err(TreeError::Cycle(self.records[idx].path.clone()));
                }
            }
        }
        let (target, target_path) = self.resolve_folder(&normalized)?;
        if target == self.records[idx].parent_id {
            return Ok(self.records[idx].clone());
        }

        let name = self.records[idx].name.clone();
        if !self.records[idx].trashed {
            self.ensure_name_free(target, &name, Some(id))?;
        }
        let new_path = join_path(&target_path, &name);
        let plan = self.plan_subtree_paths(id, new_path.clone());

        let record = &mut self.records[idx];
        debug!("moving {} -> {}", record.path, new_path);
        record.parent_id = target;
        record.path = new_path;
        record.updated_at = Utc::now();
        self.apply_paths(plan);
        Ok(self.records[idx].clone())
    }

    /// Move records to or from the trash, together with everything beneath
    /// them. Paths, parents and tags are left alone so restoring is a flag
    /// flip. A trashed folder never has active descendants.
    ///
    /// Restoring fails with `InvalidState` while an ancestor outside the
    /// request is still trashed, and with `Conflict` if the restored subtree
    /// would put two active records under one name.
    pub fn set_trashed(&mut self, ids: &[Uuid], trashed: bool) -> TreeResult<Vec<FileRecord>> {
        let indices = self.positions(ids)?;

        let mut affected: HashSet<Uuid> = HashSet::new();
        for &idx in &indices {
            let root = self.records[idx].id;
            affected.insert(root);
            affected.extend(self.descendant_ids(root));
        }

        if !trashed {
            self.check_restore(&indices, &affected)?;
        }

        let now = Utc::now();
        for record in self
            .records
            .iter_mut()
            .filter(|r| affected.contains(&r.id) && r.trashed != trashed)
        {
            record.trashed = trashed;
            record.updated_at = now;
        }
        debug!(
            "{} {} record(s)",
            if trashed { "trashed" } else { "restored" },
            affected.len()
        );
        Ok(indices.into_iter().map(|idx| self.records[idx].clone()).collect())
    }

    fn check_restore(&self, roots: &[usize], restoring: &HashSet<Uuid>) -> TreeResult<()> {
        let active_after = |r: &FileRecord| !r.trashed || restoring.contains(&r.id);

        for &idx in roots {
            let mut parent = self.records[idx].parent_id;
            while let Some(id) = parent {
                let Some(ancestor) = self.records.iter().find(|r| r.id == id) else {
                    break;
                };
                if !active_after(ancestor) {
                    return Err(TreeError::InvalidState(format!(
                        "`{}` is in the trash",
                        ancestor.path
                    )));
                }
                parent = ancestor.parent_id;
            }
        }

        let mut claimed: HashMap<(Option<Uuid>, &str), usize> = HashMap::new();
        for record in self.records.iter().filter(|r| active_after(*r)) {
            *claimed
                .entry((record.parent_id, record.name.as_str()))
                .or_default() += 1;
        }
        for record in self
            .records
            .iter()
            .filter(|r| r.trashed && restoring.contains(&r.id))
        {
            if claimed[&(record.parent_id, record.name.as_str())] > 1 {
                return Err(TreeError::Conflict {
                    parent: self.path_of(record.parent_id),
                    name: record.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Remove trashed records for good, along with everything beneath them.
    /// Returns the ids that were removed.
    pub fn delete_permanently(&mut self, ids: &[Uuid]) -> TreeResult<Vec<Uuid>> {
        let indices = self.positions(ids)?;
        if let Some(&idx) = indices.iter().find(|&&i| !self.records[i].trashed) {
            return Err(TreeError::InvalidState(format!(
                "`{}` must be in the trash before it can be deleted permanently",
                self.records[idx].path
            )));
        }

        let roots: Vec<Uuid> = indices.iter().map(|&i| self.records[i].id).collect();
        let removed = self.remove_subtrees(&roots);
        debug!("permanently deleted {} record(s)", removed.len());
        Ok(removed)
    }

    /// Keep the oldest record of every duplicate group and delete the rest.
    pub fn remove_duplicates(&mut self) -> Vec<Uuid> {
        let doomed: Vec<Uuid> = self
            .detect_duplicates()
            .iter()
            .flat_map(|group| group.iter().skip(1).map(|r| r.id))
            .collect();
        self.remove_subtrees(&doomed)
    }

    // ---------------------------------------------------------------------
    // Facets
    // ---------------------------------------------------------------------

    /// Flip `starred` on each record independently.
    pub fn toggle_star(&mut self, ids: &[Uuid]) -> TreeResult<Vec<FileRecord>> {
        let indices = self.positions(ids)?;
        let now = Utc::now();
        Ok(indices
            .into_iter()
            .map(|idx| {
                let record = &mut self.records[idx];
                record.starred = !record.starred;
                record.updated_at = now;
                record.clone()
            })
            .collect())
    }

    fn set_flag(
        &mut self,
        ids: &[Uuid],
        value: bool,
        flag: fn(&mut FileRecord) -> &mut bool,
    ) -> TreeResult<Vec<FileRecord>> {
        let indices = self.positions(ids)?;
        let now = Utc::now();
        Ok(indices
            .into_iter()
            .map(|idx| {
                let record = &mut self.records[idx];
                let slot = flag(record);
                if *slot != value {
                    *slot = value;
                    record.updated_at = now;
                }
                record.clone()
            })
            .collect())
    }

    pub fn set_shared(&mut self, ids: &[Uuid], shared: bool) -> TreeResult<Vec<FileRecord>> {
        self.set_flag(ids, shared, |r| &mut r.shared)
    }

    pub fn set_offline_available(
        &mut self,
        ids: &[Uuid],
        offline: bool,
    ) -> TreeResult<Vec<FileRecord>> {
        self.set_flag(ids, offline, |r| &mut r.offline_available)
    }

    /// Turning encryption on without a type keeps the current one, or falls
    /// back to server-side encryption.
    pub fn set_encryption(
        &mut self,
        id: Uuid,
        encrypted: bool,
        encryption_type: Option<EncryptionType>,
    ) -> TreeResult<FileRecord> {
        let idx = self.position(id)?;
        let record = &mut self.records[idx];
        record.encrypted = encrypted;
        record.encryption_type = if encrypted {
            Some(
                encryption_type
                    .or(record.encryption_type)
                    .unwrap_or_default(),
            )
        } else {
            None
        };
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    pub fn add_tag(&mut self, file_id: Uuid, tag_id: Uuid) -> TreeResult<FileRecord> {
        let idx = self.position(file_id)?;
        if !self.tags.iter().any(|t| t.id == tag_id) {
            return Err(TreeError::NotFound(format!("tag {}", tag_id)));
        }
        let record = &mut self.records[idx];
        if record.tags.insert(tag_id) {
            record.updated_at = Utc::now();
        }
        Ok(record.clone())
    }

    pub fn remove_tag(&mut self, file_id: Uuid, tag_id: Uuid) -> TreeResult<FileRecord> {
        let idx = self.position(file_id)?;
        let record = &mut self.records[idx];
        if record.tags.remove(&tag_id) {
            record.updated_at = Utc::now();
        }
        Ok(record.clone())
    }

    // ---------------------------------------------------------------------
    // Content and sync
    // ---------------------------------------------------------------------

    /// Swap in new content. The previous revision goes to the history with
    /// its comment, and the version number moves up by one.
    pub fn replace_content(
        &mut self,
        id: Uuid,
        size: u64,
        hash: Option<String>,
        comment: Option<String>,
    ) -> TreeResult<FileRecord> {
        let idx = self.position(id)?;
        let record = &mut self.records[idx];
        if record.is_folder() {
            return Err(TreeError::InvalidState("folders have no content".into()));
        }

        record.versions.push(FileVersion {
            version: record.version,
            size: record.size,
            hash: record.hash.take(),
            created_at: record.updated_at,
            comment: record.version_comment.take(),
        });
        record.size = size;
        record.hash = hash;
        record.version_comment = comment;
        record.version += 1;
        record.updated_at = Utc::now();
        record.sync_status = SyncStatus::syncing();
        Ok(record.clone())
    }

    /// Bring back an earlier revision as a new version.
    pub fn restore_version(&mut self, id: Uuid, version: u32) -> TreeResult<FileRecord> {
        let idx = self.position(id)?;
        let previous = self.records[idx]
            .versions
            .iter()
            .find(|v| v.version == version)
            .cloned()
            .ok_or_else(|| TreeError::NotFound(format!("version {} of file {}", version, id)))?;
        self.replace_content(
            id,
            previous.size,
            previous.hash,
            Some(format!("Restored from version {}", version)),
        )
    }

    /// Finish a simulated sync. Returns `false` when the record no longer
    /// exists or was not waiting on a sync.
    pub fn mark_synced(&mut self, id: Uuid) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        if !matches!(
            record.sync_status.state,
            SyncState::Syncing | SyncState::Pending
        ) {
            return false;
        }
        record.sync_status = SyncStatus::synced(Utc::now());
        true
    }

    // ---------------------------------------------------------------------
    // Tags
    // ---------------------------------------------------------------------

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn get_tag(&self, id: Uuid) -> TreeResult<&Tag> {
        self.tags
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TreeError::NotFound(format!("tag {}", id)))
    }

    fn tag_path(&self, id: Option<Uuid>) -> String {
        match id.and_then(|id| self.tags.iter().find(|t| t.id == id)) {
            Some(tag) => format!("tag `{}`", tag.name),
            None => "tags".to_string(),
        }
    }

    fn ensure_tag_name_free(
        &self,
        parent: Option<Uuid>,
        name: &str,
        except: Option<Uuid>,
    ) -> TreeResult<()> {
        if self
            .tags
            .iter()
            .any(|t| t.parent_id == parent && t.name == name && Some(t.id) != except)
        {
            return Err(TreeError::Conflict {
                parent: self.tag_path(parent),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn tag_is_within(&self, candidate: Option<Uuid>, ancestor: Uuid) -> bool {
        let mut current = candidate;
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.tags.len() {
                break;
            }
            current = self.tags.iter().find(|t| t.id == id).and_then(|t| t.parent_id);
        }
        false
    }

    pub fn create_tag(
        &mut self,
        name: &str,
        color: &str,
        parent_id: Option<Uuid>,
    ) -> TreeResult<Tag> {
        validate_name(name)?;
        if let Some(parent) = parent_id {
            self.get_tag(parent)?;
        }
        self.ensure_tag_name_free(parent_id, name, None)?;

        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: color.to_string(),
            parent_id,
        };
        self.tags.push(tag.clone());
        Ok(tag)
    }

    pub fn update_tag(&mut self, id: Uuid, patch: TagPatch) -> TreeResult<Tag> {
        let current = self.get_tag(id)?.clone();
        let name = patch.name.unwrap_or(current.name);
        let parent_id = patch.parent_id.unwrap_or(current.parent_id);

        validate_name(&name)?;
        if let Some(parent) = parent_id {
            self.get_tag(parent)?;
            if self.tag_is_within(Some(parent), id) {
                return Err(TreeError::Cycle(format!("tag `{}`", name)));
            }
        }
        self.ensure_tag_name_free(parent_id, &name, Some(id))?;

        let tag = self
            .tags
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TreeError::NotFound(format!("tag {}", id)))?;
        tag.name = name;
        tag.parent_id = parent_id;
        if let Some(color) = patch.color {
            tag.color = color;
        }
        Ok(tag.clone())
    }

    /// Delete a tag, strip it from every file and lift its child tags up to
    /// its own parent.
    pub fn delete_tag(&mut self, id: Uuid) -> TreeResult<Tag> {
        let pos = self
            .tags
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| TreeError::NotFound(format!("tag {}", id)))?;
        let removed = self.tags.remove(pos);

        for child in self.tags.iter_mut().filter(|t| t.parent_id == Some(id)) {
            child.parent_id = removed.parent_id;
        }
        let now = Utc::now();
        for record in &mut self.records {
            if record.tags.remove(&id) {
                record.updated_at = now;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::collection::{Condition, Conjunction, FlagCondition, TypeCondition},
        services::query::{Scope, SortDirection, SortKey},
    };

    fn file(name: &str, file_type: FileType, size: u64, hash: Option<&str>) -> NewFile {
        NewFile {
            name: name.into(),
            file_type,
            size,
            hash: hash.map(str::to_string),
        }
    }

    fn names(records: &[&FileRecord]) -> Vec<String> {
        records.iter().map(|r| r.name.clone()).collect()
    }

    /// Every record's path agrees with its parent chain.
    fn assert_consistent(tree: &FileTree) {
        for record in tree.records() {
            let expected = join_path(&tree.path_of(record.parent_id), &record.name);
            assert_eq!(record.path, expected, "path of {}", record.name);
        }
    }

    #[test]
    fn create_folder_twice_conflicts() {
        let mut tree = FileTree::new();
        let reports = tree.create_folder("/", "Reports").unwrap();
        assert_eq!(reports.path, "/Reports");
        assert_eq!(reports.size, 0);
        assert_eq!(reports.parent_id, None);

        let err = tree.create_folder("/", "Reports").unwrap_err();
        assert!(matches!(err, TreeError::Conflict { .. }));
        assert_eq!(
            tree.records().iter().filter(|r| r.path == "/Reports").count(),
            1
        );
    }

    #[test]
    fn create_folder_validates_parent_and_name() {
        let mut tree = FileTree::new();
        tree.add_file("/", file("a.txt", FileType::Document, 1, None))
            .unwrap();

        assert!(matches!(
            tree.create_folder("/missing", "x"),
            Err(TreeError::NotFound(_))
        ));
        assert!(matches!(
            tree.create_folder("/a.txt", "x"),
            Err(TreeError::InvalidState(_))
        ));
        for bad in ["", " padded", "a/b", "..", "tab\tname"] {
            assert!(
                matches!(tree.create_folder("/", bad), Err(TreeError::InvalidName { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn trashed_sibling_does_not_block_name() {
        let mut tree = FileTree::new();
        let old = tree.create_folder("/", "Reports").unwrap();
        tree.set_trashed(&[old.id], true).unwrap();

        let fresh = tree.create_folder("/", "Reports").unwrap();
        assert_eq!(tree.get_by_path("/Reports").unwrap().id, fresh.id);

        // Now the old one cannot come back under the same name.
        assert!(matches!(
            tree.set_trashed(&[old.id], false),
            Err(TreeError::Conflict { .. })
        ));
        assert!(tree.get(old.id).unwrap().trashed);
    }

    #[test]
    fn rename_cascades_to_descendants() {
        let mut tree = FileTree::new();
        let projects = tree.create_folder("/", "Projects").unwrap();
        let year = tree.create_folder("/Projects", "2024").unwrap();
        let doc = tree
            .add_file("/Projects/2024", file("plan.md", FileType::Document, 5, None))
            .unwrap();

        tree.rename(projects.id, "Work").unwrap();

        assert_eq!(tree.get(year.id).unwrap().path, "/Work/2024");
        assert_eq!(tree.get(doc.id).unwrap().path, "/Work/2024/plan.md");
        let children = tree.list_children("/Work", SortSpec::default());
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, year.id);
        assert!(tree.list_children("/Projects", SortSpec::default()).is_empty());
        assert_consistent(&tree);
    }

    #[test]
    fn rename_to_same_name_is_a_no_op() {
        let mut tree = FileTree::new();
        let folder = tree.create_folder("/", "Photos").unwrap();
        let after = tree.rename(folder.id, "Photos").unwrap();
        assert_eq!(after.updated_at, folder.updated_at);
        assert_eq!(after, folder);
    }

    #[test]
    fn rename_rejects_taken_name_and_unknown_id() {
        let mut tree = FileTree::new();
        let a = tree.create_folder("/", "A").unwrap();
        tree.create_folder("/", "B").unwrap();

        assert!(matches!(tree.rename(a.id, "B"), Err(TreeError::Conflict { .. })));
        assert_eq!(tree.get(a.id).unwrap().path, "/A");
        assert!(matches!(
            tree.rename(Uuid::new_v4(), "C"),
            Err(TreeError::NotFound(_))
        ));
    }

    #[test]
    fn move_recomputes_subtree_paths() {
        let mut tree = FileTree::new();
        let archive = tree.create_folder("/", "Archive").unwrap();
        let music = tree.create_folder("/", "Music").unwrap();
        tree.create_folder("/Music", "Live").unwrap();
        tree.add_file("/Music/Live", file("set.mp3", FileType::Audio, 9, None))
            .unwrap();

        let moved = tree.move_to(music.id, "/Archive").unwrap();
        assert_eq!(moved.parent_id, Some(archive.id));
        assert_eq!(moved.path, "/Archive/Music");

        for record in tree.records() {
            if record.id != archive.id && record.id != music.id {
                assert!(record.path.starts_with("/Archive/Music/"), "{}", record.path);
            }
        }
        assert_eq!(
            tree.get_by_path("/Archive/Music/Live/set.mp3").unwrap().size,
            9
        );
        assert_consistent(&tree);

        tree.move_to(music.id, "/").unwrap();
        assert_eq!(tree.get(music.id).unwrap().path, "/Music");
        assert_consistent(&tree);
    }

    #[test]
    fn move_into_own_subtree_is_a_cycle() {
        let mut tree = FileTree::new();
        let top = tree.create_folder("/", "Top").unwrap();
        tree.create_folder("/Top", "Mid").unwrap();
        tree.create_folder("/Top/Mid", "Low").unwrap();
        let before = tree.records().to_vec();

        assert!(matches!(
            tree.move_to(top.id, "/Top/Mid/Low"),
            Err(TreeError::Cycle(_))
        ));
        assert!(matches!(tree.move_to(top.id, "/Top"), Err(TreeError::Cycle(_))));
        assert_eq!(tree.records(), before.as_slice());
    }

    #[test]
    fn move_rejects_conflicts_and_non_folders() {
        let mut tree = FileTree::new();
        tree.create_folder("/", "Dest").unwrap();
        tree.add_file("/Dest", file("x.txt", FileType::Document, 1, None))
            .unwrap();
        let x = tree
            .add_file("/", file("x.txt", FileType::Document, 1, None))
            .unwrap();

        assert!(matches!(
            tree.move_to(x.id, "/Dest"),
            Err(TreeError::Conflict { .. })
        ));
        assert!(matches!(
            tree.move_to(x.id, "/Dest/x.txt"),
            Err(TreeError::InvalidState(_))
        ));
        assert!(matches!(
            tree.move_to(x.id, "/Nowhere"),
            Err(TreeError::NotFound(_))
        ));
        assert_eq!(tree.get(x.id).unwrap().path, "/x.txt");
    }

    #[test]
    fn list_children_only_returns_direct_active_children() {
        let mut tree = FileTree::new();
        let docs = tree.create_folder("/", "Docs").unwrap();
        tree.create_folder("/Docs", "Nested").unwrap();
        tree.add_file("/Docs", file("b.txt", FileType::Document, 20, None))
            .unwrap();
        let gone = tree
            .add_file("/Docs", file("a.txt", FileType::Document, 10, None))
            .unwrap();
        tree.add_file("/Docs/Nested", file("deep.txt", FileType::Document, 1, None))
            .unwrap();
        tree.set_trashed(&[gone.id], true).unwrap();

        let children = tree.list_children("/Docs", SortSpec::default());
        assert_eq!(names(&children), ["Nested", "b.txt"]);
        assert!(children.iter().all(|r| r.parent_id == Some(docs.id)));

        assert_eq!(names(&tree.list_children("/", SortSpec::default())), ["Docs"]);
        assert!(tree.list_children("/nope", SortSpec::default()).is_empty());
        assert!(tree.list_children("/Docs/b.txt", SortSpec::default()).is_empty());
    }

    #[test]
    fn list_children_sorts_within_kind() {
        let mut tree = FileTree::new();
        tree.add_file("/", file("small", FileType::Document, 1, None))
            .unwrap();
        tree.add_file("/", file("big", FileType::Document, 100, None))
            .unwrap();
        tree.create_folder("/", "folder").unwrap();

        let by_size = tree.list_children("/", SortSpec::new(SortKey::Size, SortDirection::Desc));
        assert_eq!(names(&by_size), ["folder", "big", "small"]);
    }

    #[test]
    fn list_flat_respects_scope() {
        let mut tree = FileTree::new();
        let a = tree
            .add_file("/", file("alpha.txt", FileType::Document, 1, None))
            .unwrap();
        tree.add_file("/", file("beta.txt", FileType::Document, 1, None))
            .unwrap();
        tree.set_trashed(&[a.id], true).unwrap();

        let active = tree.list_flat(&FileFilter::default());
        assert_eq!(names(&active), ["beta.txt"]);

        let trash = tree.list_flat(&FileFilter {
            scope: Scope::Trash,
            ..FileFilter::default()
        });
        assert_eq!(names(&trash), ["alpha.txt"]);
    }

    #[test]
    fn toggle_star_twice_restores() {
        let mut tree = FileTree::new();
        let f = tree
            .add_file("/", file("a.png", FileType::Image, 1, None))
            .unwrap();

        let once = tree.toggle_star(&[f.id]).unwrap();
        assert!(once[0].starred);
        let twice = tree.toggle_star(&[f.id]).unwrap();
        assert!(!twice[0].starred);
    }

    #[test]
    fn bulk_operations_are_all_or_nothing() {
        let mut tree = FileTree::new();
        let f = tree
            .add_file("/", file("a.png", FileType::Image, 1, None))
            .unwrap();

        assert!(matches!(
            tree.toggle_star(&[f.id, Uuid::new_v4()]),
            Err(TreeError::NotFound(_))
        ));
        assert!(matches!(
            tree.set_trashed(&[f.id, Uuid::new_v4()], true),
            Err(TreeError::NotFound(_))
        ));
        let after = tree.get(f.id).unwrap();
        assert!(!after.starred);
        assert!(!after.trashed);
    }

    #[test]
    fn trash_and_restore_keep_location_and_tags() {
        let mut tree = FileTree::new();
        tree.create_folder("/", "Docs").unwrap();
        let tag = tree.create_tag("Work", "#f00", None).unwrap();
        let f = tree
            .add_file("/Docs", file("cv.pdf", FileType::Document, 3, None))
            .unwrap();
        let f = tree.add_tag(f.id, tag.id).unwrap();

        let trashed = tree.set_trashed(&[f.id], true).unwrap();
        assert!(trashed[0].trashed);
        let restored = tree.set_trashed(&[f.id], false).unwrap().remove(0);

        assert!(!restored.trashed);
        assert_eq!(restored.path, f.path);
        assert_eq!(restored.parent_id, f.parent_id);
        assert_eq!(restored.tags, f.tags);
    }

    #[test]
    fn permanent_delete_requires_trash_and_takes_subtree() {
        let mut tree = FileTree::new();
        let folder = tree.create_folder("/", "Old").unwrap();
        let inner = tree
            .add_file("/Old", file("x.txt", FileType::Document, 1, None))
            .unwrap();

        assert!(matches!(
            tree.delete_permanently(&[folder.id]),
            Err(TreeError::InvalidState(_))
        ));

        tree.set_trashed(&[folder.id], true).unwrap();
        let removed = tree.delete_permanently(&[folder.id]).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&inner.id));
        assert!(tree.is_empty());
    }

    #[test]
    fn trashing_a_folder_takes_its_subtree_along() {
        let mut tree = FileTree::new();
        let old = tree.create_folder("/", "Photos").unwrap();
        let cat = tree
            .add_file("/Photos", file("cat.jpg", FileType::Image, 5, Some("c")))
            .unwrap();
        tree.toggle_star(&[cat.id]).unwrap();
        tree.set_trashed(&[old.id], true).unwrap();

        assert!(tree.get(cat.id).unwrap().trashed);
        let starred = FileFilter {
            starred: Some(true),
            ..Default::default()
        };
        assert!(tree.list_flat(&starred).is_empty());
        let search = FileFilter {
            query: Some("cat".into()),
            ..Default::default()
        };
        assert!(tree.list_flat(&search).is_empty());

        tree.create_folder("/", "Photos").unwrap();
        let fresh = tree
            .add_file("/Photos", file("cat.jpg", FileType::Image, 5, Some("c")))
            .unwrap();
        let active: Vec<_> = tree
            .records()
            .iter()
            .filter(|r| !r.trashed && r.path == "/Photos/cat.jpg")
            .collect();
        assert_eq!(active.len(), 1);
        assert!(tree.detect_duplicates().is_empty());

        let removed = tree.delete_permanently(&[old.id]).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&cat.id));
        assert!(tree.get(fresh.id).is_ok());
        assert_eq!(tree.get_by_path("/Photos/cat.jpg").unwrap().id, fresh.id);
        assert_consistent(&tree);
    }

    #[test]
    fn restore_needs_an_active_ancestor() {
        let mut tree = FileTree::new();
        let folder = tree.create_folder("/", "Docs").unwrap();
        let inner = tree
            .add_file("/Docs", file("a.txt", FileType::Document, 1, None))
            .unwrap();
        tree.set_trashed(&[folder.id], true).unwrap();

        assert!(matches!(
            tree.set_trashed(&[inner.id], false),
            Err(TreeError::InvalidState(_))
        ));
        assert!(tree.get(inner.id).unwrap().trashed);

        let restored = tree.set_trashed(&[folder.id], false).unwrap();
        assert_eq!(restored.len(), 1);
        assert!(!tree.get(inner.id).unwrap().trashed);
    }

    #[test]
    fn restoring_a_subtree_cannot_duplicate_a_name() {
        let mut tree = FileTree::new();
        let folder = tree.create_folder("/", "Docs").unwrap();
        let old = tree
            .add_file("/Docs", file("a.txt", FileType::Document, 1, None))
            .unwrap();
        tree.set_trashed(&[old.id], true).unwrap();
        tree.add_file("/Docs", file("a.txt", FileType::Document, 2, None))
            .unwrap();
        tree.set_trashed(&[folder.id], true).unwrap();

        assert!(matches!(
            tree.set_trashed(&[folder.id], false),
            Err(TreeError::Conflict { .. })
        ));
        assert!(tree.get(folder.id).unwrap().trashed);
    }

    #[test]
    fn tags_are_idempotent() {
        let mut tree = FileTree::new();
        let tag = tree.create_tag("Urgent", "#f00", None).unwrap();
        let f = tree
            .add_file("/", file("a.txt", FileType::Document, 1, None))
            .unwrap();

        let first = tree.add_tag(f.id, tag.id).unwrap();
        let second = tree.add_tag(f.id, tag.id).unwrap();
        assert_eq!(first.tags.len(), 1);
        assert_eq!(first.updated_at, second.updated_at);

        tree.remove_tag(f.id, tag.id).unwrap();
        let again = tree.remove_tag(f.id, tag.id).unwrap();
        assert!(again.tags.is_empty());

        assert!(matches!(
            tree.add_tag(f.id, Uuid::new_v4()),
            Err(TreeError::NotFound(_))
        ));
    }

    #[test]
    fn deleting_a_tag_strips_files_and_lifts_children() {
        let mut tree = FileTree::new();
        let root = tree.create_tag("Areas", "#000", None).unwrap();
        let mid = tree.create_tag("Work", "#111", Some(root.id)).unwrap();
        let leaf = tree.create_tag("Clients", "#222", Some(mid.id)).unwrap();
        let f = tree
            .add_file("/", file("a.txt", FileType::Document, 1, None))
            .unwrap();
        tree.add_tag(f.id, mid.id).unwrap();

        tree.delete_tag(mid.id).unwrap();

        assert!(tree.get(f.id).unwrap().tags.is_empty());
        assert_eq!(tree.get_tag(leaf.id).unwrap().parent_id, Some(root.id));
    }

    #[test]
    fn tag_parent_cannot_loop() {
        let mut tree = FileTree::new();
        let a = tree.create_tag("A", "#000", None).unwrap();
        let b = tree.create_tag("B", "#000", Some(a.id)).unwrap();

        let err = tree
            .update_tag(
                a.id,
                TagPatch {
                    parent_id: Some(Some(b.id)),
                    ..TagPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TreeError::Cycle(_)));

        let renamed = tree
            .update_tag(
                b.id,
                TagPatch {
                    name: Some("Bee".into()),
                    parent_id: Some(None),
                    ..TagPatch::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "Bee");
        assert_eq!(renamed.parent_id, None);
    }

    #[test]
    fn duplicates_keep_the_earliest() {
        let mut tree = FileTree::new();
        let first = tree
            .add_file("/", file("one.jpg", FileType::Image, 10, Some("abc")))
            .unwrap();
        let second = tree
            .add_file("/", file("two.jpg", FileType::Image, 10, Some("abc")))
            .unwrap();
        tree.add_file("/", file("other.jpg", FileType::Image, 10, Some("xyz")))
            .unwrap();
        tree.create_folder("/", "Empty").unwrap();

        let groups = tree.detect_duplicates();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].id, first.id);

        let removed = tree.remove_duplicates();
        assert_eq!(removed, vec![second.id]);
        assert!(tree.get(first.id).is_ok());
        assert!(tree.detect_duplicates().is_empty());
    }

    #[test]
    fn trashed_records_are_not_duplicates() {
        let mut tree = FileTree::new();
        tree.add_file("/", file("one.jpg", FileType::Image, 10, Some("abc")))
            .unwrap();
        let two = tree
            .add_file("/", file("two.jpg", FileType::Image, 10, Some("abc")))
            .unwrap();
        tree.set_trashed(&[two.id], true).unwrap();
        assert!(tree.detect_duplicates().is_empty());
    }

    #[test]
    fn smart_collection_chains_left_to_right() {
        let mut tree = FileTree::new();
        let image = tree
            .add_file("/", file("pic.png", FileType::Image, 1, None))
            .unwrap();
        tree.add_file("/", file("plain.pdf", FileType::Document, 1, None))
            .unwrap();
        let starred_doc = tree
            .add_file("/", file("star.pdf", FileType::Document, 1, None))
            .unwrap();
        tree.toggle_star(&[image.id, starred_doc.id]).unwrap();

        let rules = vec![
            CollectionRule {
                condition: Condition::Type(TypeCondition::Equals(FileType::Document)),
                conjunction: Conjunction::And,
            },
            CollectionRule {
                condition: Condition::Starred(FlagCondition::Equals(true)),
                conjunction: Conjunction::Or,
            },
        ];
        let hits = tree.evaluate_smart_collection(&rules);
        assert_eq!(names(&hits), ["pic.png", "plain.pdf", "star.pdf"]);
    }

    #[test]
    fn content_versions_roll_forward() {
        let mut tree = FileTree::new();
        let f = tree
            .add_file("/", file("draft.md", FileType::Document, 10, Some("v1")))
            .unwrap();

        let v2 = tree
            .replace_content(f.id, 20, Some("v2".into()), Some("Peer review".into()))
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.version_comment.as_deref(), Some("Peer review"));
        assert_eq!(v2.versions.len(), 1);
        assert_eq!(v2.versions[0].hash.as_deref(), Some("v1"));
        assert_eq!(v2.versions[0].comment, None);

        let v3 = tree.restore_version(f.id, 1).unwrap();
        assert_eq!(v3.version, 3);
        assert_eq!(v3.size, 10);
        assert_eq!(v3.hash.as_deref(), Some("v1"));
        assert_eq!(v3.versions[1].comment.as_deref(), Some("Peer review"));
        assert_eq!(v3.version_comment.as_deref(), Some("Restored from version 1"));

        assert!(matches!(
            tree.restore_version(f.id, 42),
            Err(TreeError::NotFound(_))
        ));
        let folder = tree.create_folder("/", "Dir").unwrap();
        assert!(matches!(
            tree.replace_content(folder.id, 1, None, None),
            Err(TreeError::InvalidState(_))
        ));
    }

    #[test]
    fn encryption_defaults_to_server_side() {
        let mut tree = FileTree::new();
        let f = tree
            .add_file("/", file("tax.pdf", FileType::Document, 3, None))
            .unwrap();

        let on = tree.set_encryption(f.id, true, None).unwrap();
        assert_eq!(on.encryption_type, Some(EncryptionType::Server));

        let zk = tree
            .set_encryption(f.id, true, Some(EncryptionType::ZeroKnowledge))
            .unwrap();
        assert_eq!(zk.encryption_type, Some(EncryptionType::ZeroKnowledge));
        let kept = tree.set_encryption(f.id, true, None).unwrap();
        assert_eq!(kept.encryption_type, Some(EncryptionType::ZeroKnowledge));

        let off = tree.set_encryption(f.id, false, None).unwrap();
        assert!(!off.encrypted);
        assert_eq!(off.encryption_type, None);
    }

    #[test]
    fn upload_target_is_checked_without_adding() {
        let mut tree = FileTree::new();
        tree.create_folder("/", "Inbox").unwrap();
        tree.add_file("/Inbox", file("a.txt", FileType::Document, 1, None))
            .unwrap();

        assert!(tree.check_upload_target("/Inbox", "b.txt").is_ok());
        assert!(matches!(
            tree.check_upload_target("/Missing", "b.txt"),
            Err(TreeError::NotFound(_))
        ));
        assert!(matches!(
            tree.check_upload_target("/Inbox", "a.txt"),
            Err(TreeError::Conflict { .. })
        ));
        assert!(matches!(
            tree.check_upload_target("/Inbox", ".."),
            Err(TreeError::InvalidName { .. })
        ));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn duplicate_picks_a_free_copy_name() {
        let mut tree = FileTree::new();
        let f = tree
            .add_file("/", file("report.pdf", FileType::Document, 7, Some("h")))
            .unwrap();

        let c1 = tree.duplicate(f.id).unwrap();
        let c2 = tree.duplicate(f.id).unwrap();
        assert_eq!(c1.name, "report (copy).pdf");
        assert_eq!(c2.name, "report (copy 2).pdf");
        assert_eq!(c2.hash.as_deref(), Some("h"));
        assert_eq!(tree.detect_duplicates()[0].len(), 3);
    }

    #[test]
    fn archive_sums_sources_and_descendants() {
        let mut tree = FileTree::new();
        let dir = tree.create_folder("/", "Dir").unwrap();
        let inner = tree
            .add_file("/Dir", file("a.bin", FileType::Document, 100, None))
            .unwrap();
        let loose = tree
            .add_file("/", file("b.bin", FileType::Document, 50, None))
            .unwrap();

        let archive = tree
            .archive(&[dir.id, inner.id, loose.id], "/", "bundle.zip")
            .unwrap();
        assert_eq!(archive.file_type, FileType::Archive);
        assert_eq!(archive.size, 150);
        assert_eq!(archive.path, "/bundle.zip");
        assert!(tree.get(loose.id).is_ok());
    }

    #[test]
    fn mark_synced_tolerates_missing_records() {
        let mut tree = FileTree::new();
        let f = tree
            .add_file("/", file("a.txt", FileType::Document, 1, None))
            .unwrap();
        assert_eq!(f.sync_status.state, SyncState::Syncing);

        assert!(tree.mark_synced(f.id));
        assert_eq!(tree.get(f.id).unwrap().sync_status.state, SyncState::Synced);
        assert!(!tree.mark_synced(f.id));
        assert!(!tree.mark_synced(Uuid::new_v4()));
    }

    #[test]
    fn normalize_and_join() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//a//b/"), "/a/b");
        assert_eq!(join_path("/", "a"), "/a");
        assert_eq!(join_path("/a", "b"), "/a/b");
    }
}
