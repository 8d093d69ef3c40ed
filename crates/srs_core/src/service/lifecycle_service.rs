//! Lifecycle coordinator across the four item stores.
//!
//! # Responsibility
//! - Move ids between the active store, archive, working selection and
//!   completed staging.
//! - Run compensation when a later step of a cross-store move fails.
//!
//! # Invariants
//! - Requests are validated before any store is touched.
//! - At rest an id is in at most one of the active store and the archive.
//! - A staged id is never recalled back into the working selection.
//! - A failed commit leaves staging with the original pending entries.
//! - Compensation that itself fails is reported, never retried.

use crate::model::item::{validate_item_id, Item, ItemId, ItemValidationError, Pool};
use crate::repo::item_repo::{ItemStore, RepoError};
use crate::service::csv_import::{parse_items_csv, CsvImportError};
use crate::service::recall_service::{
    validate_custom_ids, CustomRecallError, RecallParams, RecallService,
};
use crate::service::saga::Saga;
use crate::session::completed_set::{CompletedSet, PendingRecall};
use crate::session::working_set::WorkingSet;
use crate::session::SessionError;
use chrono::{Local, NaiveDate};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors that stop a lifecycle request.
///
/// `Validation`, `Rejected`, `CustomRecall` and `Import` are raised before any
/// store is mutated. `Repo` and `Session` are fatal storage failures, as is an
/// `Import` that could not read its input.
#[derive(Debug)]
pub enum LifecycleError {
    Validation(ItemValidationError),
    Rejected(String),
    CustomRecall(CustomRecallError),
    Import(CsvImportError),
    Repo(RepoError),
    Session(SessionError),
}

impl LifecycleError {
    /// Whether the error came from storage rather than request validation.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Repo(_) | Self::Session(_) => true,
            Self::Import(err) => err.is_io(),
            _ => false,
        }
    }
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Rejected(message) => write!(f, "{message}"),
            Self::CustomRecall(err) => write!(f, "{err}"),
            Self::Import(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "store failure: {err}"),
            Self::Session(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::CustomRecall(err) => Some(err),
            Self::Import(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }
}

impl From<ItemValidationError> for LifecycleError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CustomRecallError> for LifecycleError {
    fn from(value: CustomRecallError) -> Self {
        Self::CustomRecall(value)
    }
}

impl From<CsvImportError> for LifecycleError {
    fn from(value: CsvImportError) -> Self {
        Self::Import(value)
    }
}

impl From<RepoError> for LifecycleError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SessionError> for LifecycleError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Result of a lifecycle request that reached the stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T = ()> {
    pub status: OutcomeStatus,
    /// Human-readable summary for the caller.
    pub message: String,
    /// Non-fatal observations (skipped ids, partial cleanup).
    pub warnings: Vec<String>,
    /// Compensation steps that failed and need manual reconciliation.
    pub rollback_failures: Vec<String>,
    pub detail: T,
}

impl<T> Outcome<T> {
    fn success(message: impl Into<String>, detail: T) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
            warnings: Vec::new(),
            rollback_failures: Vec::new(),
            detail,
        }
    }

    fn failed(message: impl Into<String>, detail: T) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            message: message.into(),
            warnings: Vec::new(),
            rollback_failures: Vec::new(),
            detail,
        }
    }

    fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    fn with_rollback_failures(mut self, rollback_failures: Vec<String>) -> Self {
        self.rollback_failures = rollback_failures;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Where recalled ids come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecallSource {
    /// Highest-scoring `n` items.
    Top(usize),
    /// Caller-chosen ids, validated against the active store.
    Custom(Vec<ItemId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecallRequest {
    pub source: RecallSource,
    /// Allow touching a non-empty working selection.
    pub force: bool,
    /// With `force`, keep existing ids instead of overwriting them.
    pub append: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteRequest {
    pub id: ItemId,
    pub pool_override: Option<Pool>,
    /// Defaults to today.
    pub recall_date: Option<NaiveDate>,
    /// Complete an id that is not in the working selection.
    pub force: bool,
}

/// Input for creating or overwriting an active item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub id: ItemId,
    pub name: String,
    pub link: String,
    pub pool: Pool,
}

/// How an import treats ids that already exist in the active store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Keep stored rows; only new ids are inserted.
    KeepStore,
    /// Overwrite stored rows with the file's values.
    OverwriteStore,
}

/// What an import did with each accepted row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: Vec<ItemId>,
    pub overwritten: Vec<ItemId>,
    /// Ids left alone because the store or the archive already holds them.
    pub skipped: Vec<ItemId>,
    /// Rows rejected while parsing.
    pub rejected_rows: usize,
}

/// Delete modes. A hard reset carries no id, so it cannot be combined with a
/// single-item delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRequest {
    /// Remove from the working selection only.
    Working(ItemId),
    /// Drop a staged completion only.
    Completed(ItemId),
    /// Delete from the active store, then clean both session sets.
    Database(ItemId),
    /// Clear the active store and both session sets; archive untouched.
    HardReset,
}

/// Which stores a delete actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub from_store: bool,
    pub from_working: bool,
    pub from_completed: bool,
}

/// One staged completion with the item it will update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedEntry {
    pub id: ItemId,
    pub pending: PendingRecall,
    /// `None` when the id no longer exists in the active store.
    pub item: Option<Item>,
}

/// Read-only view of session state for listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub today: NaiveDate,
    pub working_created_on: NaiveDate,
    pub working: Vec<Item>,
    /// Working ids whose item is missing from the active store.
    pub working_missing: Vec<ItemId>,
    pub completed_created_on: NaiveDate,
    pub completed: Vec<StagedEntry>,
    pub store_count: usize,
    pub archive_count: usize,
}

/// Coordinates the active store, archive, working selection and staging.
pub struct LifecycleService<A: ItemStore, R: ItemStore> {
    active: A,
    archive: R,
    working: WorkingSet,
    completed: CompletedSet,
    recall_params: RecallParams,
    today: NaiveDate,
}

impl<A: ItemStore, R: ItemStore> LifecycleService<A, R> {
    /// Creates a coordinator dated with the local calendar day.
    pub fn new(active: A, archive: R, working: WorkingSet, completed: CompletedSet) -> Self {
        Self {
            active,
            archive,
            working,
            completed,
            recall_params: RecallParams::default(),
            today: Local::now().date_naive(),
        }
    }

    /// Overrides the reference date used for recall scoring and defaults.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_recall_params(mut self, params: RecallParams) -> Self {
        self.recall_params = params;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn active_store(&self) -> &A {
        &self.active
    }

    pub fn archive_store(&self) -> &R {
        &self.archive
    }

    pub fn working(&self) -> &WorkingSet {
        &self.working
    }

    pub fn completed(&self) -> &CompletedSet {
        &self.completed
    }

    /// Fills the working selection from the scheduler or a custom id list.
    ///
    /// # Contract
    /// - A non-empty working selection is refused unless `force`; with
    ///   `force` it is overwritten unless `append`.
    /// - Ids staged in completed staging are never recalled.
    /// - A recall that finds nothing leaves the working selection untouched.
    pub fn recall(&mut self, request: RecallRequest) -> LifecycleResult<Outcome<Vec<ItemId>>> {
        if let RecallSource::Top(0) = request.source {
            return Err(LifecycleError::Rejected(
                "recall count must be positive".to_string(),
            ));
        }
        if !self.working.is_empty() && !request.force {
            return Err(LifecycleError::Rejected(format!(
                "working set holds {} items; use force (optionally with append) to recall anyway",
                self.working.len()
            )));
        }

        let mut warnings = Vec::new();
        let custom = match &request.source {
            RecallSource::Custom(ids) => {
                let accepted = validate_custom_ids(&self.active, ids)??;
                warnings.extend(accepted.warnings);
                Some(accepted.ids)
            }
            RecallSource::Top(_) => None,
        };

        let overwrite = !self.working.is_empty() && !request.append;
        let staged = &self.completed;
        let queued = &self.working;
        let is_queued = |id: ItemId| request.append && queued.contains(id);
        let picked: Vec<ItemId> = match (custom, &request.source) {
            (Some(ids), _) => {
                let mut picked = Vec::new();
                for id in ids {
                    if staged.contains(id) {
                        warnings.push(format!(
                            "item {id} is already completed and awaiting commit, ignoring"
                        ));
                    } else if !is_queued(id) {
                        picked.push(id);
                    }
                }
                picked
            }
            (None, RecallSource::Top(count)) => {
                let mut scheduler =
                    RecallService::load(&self.active, self.recall_params, self.today)?;
                scheduler.recall_where(*count, |id| !staged.contains(id) && !is_queued(id))
            }
            (None, RecallSource::Custom(_)) => Vec::new(),
        };

        for message in &warnings {
            warn!("event=recall module=lifecycle status=warn message=\"{message}\"");
        }

        // Nothing is cleared until there is something to put in its place.
        if picked.is_empty() && (overwrite || self.working.is_empty()) {
            return Ok(Outcome::failed("no items available to recall", picked)
                .with_warnings(warnings));
        }

        if overwrite {
            info!(
                "event=recall module=lifecycle status=start mode=overwrite previous={}",
                self.working.len()
            );
            self.working.clear()?;
        }
        self.working.fill(picked.iter().copied())?;
        info!(
            "event=recall module=lifecycle status=ok added={} working_size={}",
            picked.len(),
            self.working.len()
        );
        let message = format!(
            "{} items added, {} items in working set",
            picked.len(),
            self.working.len()
        );
        Ok(Outcome::success(message, picked).with_warnings(warnings))
    }

    /// Moves one id from the working selection into completed staging.
    ///
    /// # Contract
    /// - The staging add is undone if removing the id from the working
    ///   selection fails.
    /// - `force` stages an id outside the working selection straight from the
    ///   active store; without an explicit override its current pool is kept.
    pub fn complete(&mut self, request: CompleteRequest) -> LifecycleResult<Outcome> {
        let id = validate_item_id(request.id)?;
        if !self.active.exists(id)? {
            return Err(LifecycleError::Rejected(format!(
                "item {id} does not exist in the store"
            )));
        }
        if self.completed.contains(id) {
            return Err(LifecycleError::Rejected(format!(
                "item {id} is already completed; roll it back first to change it"
            )));
        }

        let recall_date = request.recall_date.unwrap_or(self.today);
        let mut pool_override = request.pool_override;

        if !self.working.contains(id) {
            if !request.force {
                return Err(LifecycleError::Rejected(format!(
                    "item {id} is not in the working set; use force to complete it anyway"
                )));
            }
            let Some(item) = self.active.get_by_id(id)? else {
                return Ok(Outcome::failed(format!("failed to fetch item {id}"), ()));
            };
            pool_override = pool_override.or(Some(item.pool));
            if !self.completed.add(id, pool_override, recall_date)? {
                return Ok(Outcome::failed(format!("failed to stage item {id}"), ()));
            }
        } else {
            let Self {
                working, completed, ..
            } = self;
            if !completed.add(id, pool_override, recall_date)? {
                return Ok(Outcome::failed(format!("failed to stage item {id}"), ()));
            }

            let mut saga: Saga<'_, LifecycleError> = Saga::new("complete");
            saga.completed("stage", || Ok(completed.remove(id)?));
            let unqueued = saga.step("unqueue", || Ok(working.remove(id)?))?;
            let rollback_failures = saga.into_rollback_failures();
            if !unqueued {
                error!("event=complete module=lifecycle status=error item_id={id} step=unqueue");
                return Ok(Outcome::failed(
                    format!("failed to remove item {id} from the working set; completion undone"),
                    (),
                )
                .with_rollback_failures(rollback_failures));
            }
        }

        let mut message = format!("completed item {id}");
        if let Some(pool) = request.pool_override {
            message.push_str(&format!(", moved to pool {pool}"));
        }
        if recall_date != self.today {
            message.push_str(&format!(", recall date {recall_date}"));
        }
        info!(
            "event=complete module=lifecycle status=ok item_id={id} forced={}",
            request.force
        );
        Ok(Outcome::success(message, ()))
    }

    /// Stages every working id with no pool override and today's date.
    ///
    /// Per-id problems are reported as warnings; the sweep never aborts.
    pub fn complete_all(&mut self) -> LifecycleResult<Outcome<Vec<ItemId>>> {
        if self.working.is_empty() {
            return Err(LifecycleError::Rejected(
                "working set is empty; nothing to complete".to_string(),
            ));
        }

        let ids: Vec<ItemId> = self.working.ids().iter().copied().collect();
        let mut staged = Vec::new();
        let mut warnings = Vec::new();
        for id in ids {
            if self.completed.add(id, None, self.today)? {
                staged.push(id);
            } else {
                warnings.push(format!(
                    "item {id} was already completed; kept the existing entry"
                ));
            }
            if !self.working.remove(id)? {
                warnings.push(format!(
                    "item {id} is staged but could not be removed from the working set"
                ));
            }
        }

        for message in &warnings {
            warn!("event=complete_all module=lifecycle status=warn message=\"{message}\"");
        }
        info!(
            "event=complete_all module=lifecycle status=ok staged={}",
            staged.len()
        );
        let message = format!("completed {} items from the working set", staged.len());
        Ok(Outcome::success(message, staged).with_warnings(warnings))
    }

    /// Writes every staged completion back to the active store.
    ///
    /// # Contract
    /// - Refused while the working selection is non-empty unless `force`.
    /// - All updates go through one store batch.
    /// - Staging is drained only after the batch succeeds, so a failed batch
    ///   leaves every entry staged with its original override and date.
    /// - Staged ids missing from the store stay staged with a warning.
    pub fn commit(&mut self, force: bool) -> LifecycleResult<Outcome<Vec<ItemId>>> {
        if self.completed.is_empty() {
            return Err(LifecycleError::Rejected("nothing to commit".to_string()));
        }
        if !self.working.is_empty() && !force {
            return Err(LifecycleError::Rejected(format!(
                "working set still holds {} items; use force to commit anyway",
                self.working.len()
            )));
        }

        let pending: Vec<(ItemId, PendingRecall)> = self
            .completed
            .entries()
            .iter()
            .map(|(id, pending)| (*id, *pending))
            .collect();
        let ids: Vec<ItemId> = pending.iter().map(|(id, _)| *id).collect();
        let mut stored: BTreeMap<ItemId, Item> = self
            .active
            .get_by_ids(&ids)?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let mut warnings = Vec::new();
        let mut updated = Vec::new();
        for (id, pending) in pending {
            let Some(mut item) = stored.remove(&id) else {
                warnings.push(format!(
                    "item {id} is staged but missing from the store; left staged"
                ));
                continue;
            };
            item.record_recall(pending.pool_override, pending.recall_date);
            updated.push(item);
        }

        for message in &warnings {
            warn!("event=commit module=lifecycle status=warn message=\"{message}\"");
        }
        if updated.is_empty() {
            return Ok(Outcome::failed("no staged item exists in the store", Vec::new())
                .with_warnings(warnings));
        }

        let committed: Vec<ItemId> = updated.iter().map(|item| item.id).collect();
        if !self.active.batch_update(&updated)? {
            error!(
                "event=commit module=lifecycle status=error step=batch_update items={}",
                committed.len()
            );
            return Ok(Outcome::failed(
                "commit failed; staged items were kept",
                Vec::new(),
            )
            .with_warnings(warnings));
        }

        // The store already holds the new state; a staging failure from here
        // on is reported on the outcome instead of aborting the request.
        if let Err(err) = self.completed.remove_all(&committed) {
            error!(
                "event=commit module=lifecycle status=error step=drain_staging items={} error=\"{err}\"",
                committed.len()
            );
            return Ok(Outcome::failed(
                format!(
                    "committed {} items but could not clear them from staging: {err}",
                    committed.len()
                ),
                committed,
            )
            .with_warnings(warnings));
        }

        info!(
            "event=commit module=lifecycle status=ok items={}",
            committed.len()
        );
        let message = format!("committed {} items", committed.len());
        Ok(Outcome::success(message, committed).with_warnings(warnings))
    }

    /// Moves one staged id back into the working selection.
    ///
    /// Both steps must succeed; no cleanup beyond what already happened.
    pub fn rollback(&mut self, id: ItemId) -> LifecycleResult<Outcome> {
        let id = validate_item_id(id)?;
        if self.completed.is_empty() {
            return Err(LifecycleError::Rejected("nothing to roll back".to_string()));
        }
        if !self.completed.contains(id) {
            return Err(LifecycleError::Rejected(format!(
                "item {id} is not in completed staging"
            )));
        }

        let requeued = self.working.add(id)? && self.completed.remove(id)?;
        if !requeued {
            error!("event=rollback module=lifecycle status=error item_id={id}");
            return Ok(Outcome::failed(format!("rollback of item {id} failed"), ()));
        }
        info!("event=rollback module=lifecycle status=ok item_id={id}");
        Ok(Outcome::success(format!("item {id} rolled back"), ()))
    }

    /// Moves every staged id back into the working selection.
    pub fn rollback_all(&mut self) -> LifecycleResult<Outcome<Vec<ItemId>>> {
        if self.completed.is_empty() {
            return Err(LifecycleError::Rejected("nothing to roll back".to_string()));
        }

        let ids: Vec<ItemId> = self.completed.entries().keys().copied().collect();
        let requeued = self.working.fill(ids.iter().copied())? && self.completed.clear()?;
        if !requeued {
            error!("event=rollback_all module=lifecycle status=error");
            return Ok(Outcome::failed("full rollback failed", Vec::new()));
        }
        info!(
            "event=rollback_all module=lifecycle status=ok items={}",
            ids.len()
        );
        Ok(Outcome::success(
            format!("rolled back {} items", ids.len()),
            ids,
        ))
    }

    /// Moves one item from the active store to the archive.
    ///
    /// # Contract
    /// - The item must not be queued or staged.
    /// - If removing it from the store fails, the archive insert is undone.
    pub fn archive_add(&self, id: ItemId) -> LifecycleResult<Outcome> {
        let id = validate_item_id(id)?;
        if !self.active.exists(id)? {
            return Err(LifecycleError::Rejected(format!(
                "item {id} does not exist in the store"
            )));
        }
        if self.working.contains(id) || self.completed.contains(id) {
            return Err(LifecycleError::Rejected(format!(
                "item {id} is in the working set or completed staging; cannot archive"
            )));
        }
        let Some(item) = self.active.get_by_id(id)? else {
            return Ok(Outcome::failed(format!("failed to fetch item {id} from the store"), ()));
        };

        let archive = &self.archive;
        let active = &self.active;
        let mut saga: Saga<'_, LifecycleError> = Saga::new("archive_add");
        if !saga.step_with_undo(
            "archive_insert",
            || Ok(archive.insert(&item)?),
            || Ok(archive.delete(id)?),
        )? {
            error!("event=archive_add module=lifecycle status=error item_id={id} step=archive_insert");
            return Ok(Outcome::failed(format!("archiving item {id} failed; aborted"), ()));
        }
        let removed = saga.step("store_delete", || Ok(active.delete(id)?))?;
        let rollback_failures = saga.into_rollback_failures();
        if !removed {
            error!(
                "event=archive_add module=lifecycle status=error item_id={id} step=store_delete rollback_failures={}",
                rollback_failures.len()
            );
            return Ok(Outcome::failed(
                format!("failed to remove item {id} from the store; archive insert undone"),
                (),
            )
            .with_rollback_failures(rollback_failures));
        }

        info!("event=archive_add module=lifecycle status=ok item_id={id}");
        Ok(Outcome::success(format!("archived item {id}"), ()))
    }

    /// Moves one item from the archive back to the active store.
    ///
    /// If removing it from the archive fails, the store insert is undone.
    pub fn archive_restore(&self, id: ItemId) -> LifecycleResult<Outcome> {
        let id = validate_item_id(id)?;
        if !self.archive.exists(id)? {
            return Err(LifecycleError::Rejected(format!(
                "item {id} does not exist in the archive"
            )));
        }
        if self.active.exists(id)? {
            return Err(LifecycleError::Rejected(format!(
                "item {id} already exists in the store"
            )));
        }
        let Some(item) = self.archive.get_by_id(id)? else {
            return Ok(Outcome::failed(format!("failed to fetch item {id} from the archive"), ()));
        };

        let archive = &self.archive;
        let active = &self.active;
        let mut saga: Saga<'_, LifecycleError> = Saga::new("archive_restore");
        if !saga.step_with_undo(
            "store_insert",
            || Ok(active.insert(&item)?),
            || Ok(active.delete(id)?),
        )? {
            error!("event=archive_restore module=lifecycle status=error item_id={id} step=store_insert");
            return Ok(Outcome::failed(format!("failed to restore item {id} to the store"), ()));
        }
        let removed = saga.step("archive_delete", || Ok(archive.delete(id)?))?;
        let rollback_failures = saga.into_rollback_failures();
        if !removed {
            error!(
                "event=archive_restore module=lifecycle status=error item_id={id} step=archive_delete rollback_failures={}",
                rollback_failures.len()
            );
            return Ok(Outcome::failed(
                format!("failed to remove item {id} from the archive; store insert undone"),
                (),
            )
            .with_rollback_failures(rollback_failures));
        }

        info!("event=archive_restore module=lifecycle status=ok item_id={id}");
        Ok(Outcome::success(format!("restored item {id}"), ()))
    }

    /// Permanently removes one archived item.
    pub fn archive_delete(&self, id: ItemId) -> LifecycleResult<Outcome> {
        let id = validate_item_id(id)?;
        if !self.archive.exists(id)? {
            return Err(LifecycleError::Rejected(format!(
                "item {id} does not exist in the archive"
            )));
        }
        if !self.archive.delete(id)? {
            error!("event=archive_delete module=lifecycle status=error item_id={id}");
            return Ok(Outcome::failed(
                format!("failed to delete item {id} from the archive"),
                (),
            ));
        }
        info!("event=archive_delete module=lifecycle status=ok item_id={id}");
        Ok(Outcome::success(format!("deleted item {id} from the archive"), ()))
    }

    /// Archives every eligible active item.
    ///
    /// # Contract
    /// - Queued, staged or already-archived ids are skipped with a warning.
    /// - The archive batch insert is all-or-nothing.
    /// - Store deletes are per item; a failed delete only undoes that item's
    ///   archive row.
    pub fn archive_all(&self) -> LifecycleResult<Outcome<Vec<ItemId>>> {
        let items = self.active.get_all()?;
        if items.is_empty() {
            return Ok(Outcome::failed("no items in the store to archive", Vec::new()));
        }

        let mut warnings = Vec::new();
        let mut eligible = Vec::new();
        for item in items {
            if self.working.contains(item.id) || self.completed.contains(item.id) {
                warnings.push(format!(
                    "skipping item {}: in the working set or completed staging",
                    item.id
                ));
            } else if self.archive.exists(item.id)? {
                warnings.push(format!("skipping item {}: already in the archive", item.id));
            } else {
                eligible.push(item);
            }
        }

        transfer_all("archive_all", &self.active, &self.archive, eligible, warnings)
    }

    /// Restores every archived item that is not already active.
    pub fn restore_all(&self) -> LifecycleResult<Outcome<Vec<ItemId>>> {
        let items = self.archive.get_all()?;
        if items.is_empty() {
            return Ok(Outcome::failed("no items in the archive to restore", Vec::new()));
        }

        let mut warnings = Vec::new();
        let mut eligible = Vec::new();
        for item in items {
            if self.active.exists(item.id)? {
                warnings.push(format!("skipping item {}: already in the store", item.id));
            } else {
                eligible.push(item);
            }
        }

        transfer_all("restore_all", &self.archive, &self.active, eligible, warnings)
    }

    /// Deletes according to `request`.
    ///
    /// # Contract
    /// - `Database` deletes from the store first and, whatever that returns,
    ///   still removes the id from both session sets.
    /// - `HardReset` attempts all three clears even if one fails.
    pub fn delete(&mut self, request: DeleteRequest) -> LifecycleResult<Outcome<DeleteReport>> {
        match request {
            DeleteRequest::Working(id) => {
                let id = validate_item_id(id)?;
                if !self.working.contains(id) {
                    return Err(LifecycleError::Rejected(format!(
                        "item {id} is not in the working set"
                    )));
                }
                let report = DeleteReport {
                    from_working: self.working.remove(id)?,
                    ..DeleteReport::default()
                };
                info!("event=delete module=lifecycle status=ok scope=working item_id={id}");
                Ok(finish_delete(
                    report.from_working,
                    format!("item {id} removed from the working set"),
                    report,
                ))
            }
            DeleteRequest::Completed(id) => {
                let id = validate_item_id(id)?;
                if !self.completed.contains(id) {
                    return Err(LifecycleError::Rejected(format!(
                        "item {id} is not in completed staging"
                    )));
                }
                let report = DeleteReport {
                    from_completed: self.completed.remove(id)?,
                    ..DeleteReport::default()
                };
                info!("event=delete module=lifecycle status=ok scope=completed item_id={id}");
                Ok(finish_delete(
                    report.from_completed,
                    format!("item {id} removed from completed staging"),
                    report,
                ))
            }
            DeleteRequest::Database(id) => {
                let id = validate_item_id(id)?;
                let from_store = self.active.delete(id)?;
                if !from_store {
                    error!("event=delete module=lifecycle status=error scope=database item_id={id}");
                }
                let report = DeleteReport {
                    from_store,
                    from_completed: self.completed.remove(id)?,
                    from_working: self.working.remove(id)?,
                };
                info!(
                    "event=delete module=lifecycle status=done scope=database item_id={id} store={} working={} completed={}",
                    report.from_store, report.from_working, report.from_completed
                );
                let mut message = if from_store {
                    format!("item {id} deleted from the store")
                } else {
                    format!("failed to delete item {id} from the store")
                };
                if report.from_completed {
                    message.push_str(", removed from completed staging");
                }
                if report.from_working {
                    message.push_str(", removed from the working set");
                }
                Ok(finish_delete(from_store, message, report))
            }
            DeleteRequest::HardReset => {
                let report = DeleteReport {
                    from_store: self.active.clear()?,
                    from_working: self.working.clear()?,
                    from_completed: self.completed.clear()?,
                };
                let reset = report.from_store && report.from_working && report.from_completed;
                if reset {
                    warn!("event=hard_reset module=lifecycle status=ok");
                } else {
                    error!(
                        "event=hard_reset module=lifecycle status=error store={} working={} completed={}",
                        report.from_store, report.from_working, report.from_completed
                    );
                }
                let message = if reset {
                    "store, working set and completed staging cleared"
                } else {
                    "hard reset incomplete; inspect state with list"
                };
                Ok(finish_delete(reset, message.to_string(), report))
            }
        }
    }

    /// Inserts a new item dated today, or overwrites an existing one when
    /// `upsert` is set (which resets its recall history).
    pub fn add_item(&self, new_item: NewItem, upsert: bool) -> LifecycleResult<Outcome> {
        let item = Item::new(
            new_item.id,
            new_item.name.trim(),
            new_item.link.trim(),
            new_item.pool,
            self.today,
        )?;
        if self.archive.exists(item.id)? {
            return Err(LifecycleError::Rejected(format!(
                "item {} is archived; restore it instead",
                item.id
            )));
        }

        if self.active.insert(&item)? {
            info!("event=add_item module=lifecycle status=ok item_id={} mode=insert", item.id);
            return Ok(Outcome::success(format!("added item {}", item.id), ()));
        }
        if !upsert {
            return Ok(Outcome::failed(
                format!("item {} already exists; use update to overwrite it", item.id),
                (),
            ));
        }
        if !self.active.update(&item)? {
            error!("event=add_item module=lifecycle status=error item_id={} mode=update", item.id);
            return Ok(Outcome::failed(format!("update of item {} failed", item.id), ()));
        }
        info!("event=add_item module=lifecycle status=ok item_id={} mode=update", item.id);
        Ok(Outcome::success(format!("updated item {}", item.id), ()))
    }

    /// Imports items from CSV into the active store.
    ///
    /// # Contract
    /// - The file is parsed and validated before any store is touched.
    /// - Archived ids are always skipped with a warning.
    /// - `KeepStore` skips ids already stored and batch-inserts the rest;
    ///   `OverwriteStore` batch-upserts every row.
    /// - The store batch is all-or-nothing.
    pub fn import_csv<Rd: Read>(
        &self,
        reader: Rd,
        mode: ImportMode,
    ) -> LifecycleResult<Outcome<ImportReport>> {
        let parsed = parse_items_csv(reader, self.today)?;
        let mut warnings = parsed.rejected;
        let mut report = ImportReport {
            rejected_rows: warnings.len(),
            ..ImportReport::default()
        };

        let mut batch = Vec::new();
        for item in parsed.items {
            if self.archive.exists(item.id)? {
                warnings.push(format!("skipping item {}: it is archived", item.id));
                report.skipped.push(item.id);
            } else if self.active.exists(item.id)? {
                match mode {
                    ImportMode::KeepStore => {
                        warnings.push(format!("skipping duplicate item {}", item.id));
                        report.skipped.push(item.id);
                    }
                    ImportMode::OverwriteStore => {
                        report.overwritten.push(item.id);
                        batch.push(item);
                    }
                }
            } else {
                report.inserted.push(item.id);
                batch.push(item);
            }
        }

        for message in &warnings {
            warn!("event=import module=lifecycle status=warn message=\"{message}\"");
        }
        if batch.is_empty() {
            return Ok(Outcome::failed("no new items to import", report).with_warnings(warnings));
        }

        let written = match mode {
            ImportMode::KeepStore => self.active.batch_insert(&batch)?,
            ImportMode::OverwriteStore => self.active.batch_upsert(&batch)?,
        };
        if !written {
            error!(
                "event=import module=lifecycle status=error mode={mode:?} items={}",
                batch.len()
            );
            let report = ImportReport {
                inserted: Vec::new(),
                overwritten: Vec::new(),
                ..report
            };
            return Ok(Outcome::failed("import failed; nothing was written", report)
                .with_warnings(warnings));
        }

        info!(
            "event=import module=lifecycle status=ok mode={mode:?} inserted={} overwritten={} skipped={}",
            report.inserted.len(),
            report.overwritten.len(),
            report.skipped.len()
        );
        let message = format!(
            "imported {} items ({} new, {} overwritten)",
            batch.len(),
            report.inserted.len(),
            report.overwritten.len()
        );
        Ok(Outcome::success(message, report).with_warnings(warnings))
    }

    pub fn item(&self, id: ItemId) -> LifecycleResult<Option<Item>> {
        let id = validate_item_id(id)?;
        Ok(self.active.get_by_id(id)?)
    }

    /// Case-insensitive name search over the active store.
    pub fn search_items(&self, query: &str) -> LifecycleResult<Vec<Item>> {
        let query = normalize_search_query(query)?;
        Ok(self.active.search_by_name(query)?)
    }

    pub fn archived_item(&self, id: ItemId) -> LifecycleResult<Option<Item>> {
        let id = validate_item_id(id)?;
        Ok(self.archive.get_by_id(id)?)
    }

    pub fn search_archive(&self, query: &str) -> LifecycleResult<Vec<Item>> {
        let query = normalize_search_query(query)?;
        Ok(self.archive.search_by_name(query)?)
    }

    pub fn archived_items(&self) -> LifecycleResult<Vec<Item>> {
        Ok(self.archive.get_all()?)
    }

    pub fn items(&self) -> LifecycleResult<Vec<Item>> {
        Ok(self.active.get_all()?)
    }

    /// Collects working and staged ids together with their stored items.
    pub fn snapshot(&self) -> LifecycleResult<SessionSnapshot> {
        let working_ids: Vec<ItemId> = self.working.ids().iter().copied().collect();
        let working = self.active.get_by_ids(&working_ids)?;
        let found: BTreeSet<ItemId> = working.iter().map(|item| item.id).collect();
        let working_missing = working_ids
            .into_iter()
            .filter(|id| !found.contains(id))
            .collect();

        let staged_ids: Vec<ItemId> = self.completed.entries().keys().copied().collect();
        let mut staged_items: BTreeMap<ItemId, Item> = self
            .active
            .get_by_ids(&staged_ids)?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();
        let completed = self
            .completed
            .entries()
            .iter()
            .map(|(id, pending)| StagedEntry {
                id: *id,
                pending: *pending,
                item: staged_items.remove(id),
            })
            .collect();

        Ok(SessionSnapshot {
            today: self.today,
            working_created_on: self.working.created_on(),
            working,
            working_missing,
            completed_created_on: self.completed.created_on(),
            completed,
            store_count: self.active.count()?,
            archive_count: self.archive.count()?,
        })
    }
}

/// Batch-inserts `eligible` into `destination`, then deletes each item from
/// `source`, undoing the destination row when a delete fails.
fn transfer_all<S: ItemStore, D: ItemStore>(
    operation: &'static str,
    source: &S,
    destination: &D,
    eligible: Vec<Item>,
    mut warnings: Vec<String>,
) -> LifecycleResult<Outcome<Vec<ItemId>>> {
    for message in &warnings {
        warn!("event={operation} module=lifecycle status=warn message=\"{message}\"");
    }
    if eligible.is_empty() {
        return Ok(Outcome::failed("no eligible items", Vec::new()).with_warnings(warnings));
    }
    if !destination.batch_insert(&eligible)? {
        error!(
            "event={operation} module=lifecycle status=error step=batch_insert items={}",
            eligible.len()
        );
        return Ok(Outcome::failed("batch insert failed; nothing was moved", Vec::new())
            .with_warnings(warnings));
    }

    let mut moved = Vec::new();
    let mut rollback_failures = Vec::new();
    for item in &eligible {
        let id = item.id;
        let mut saga: Saga<'_, LifecycleError> = Saga::new(operation);
        saga.completed("destination_insert", || Ok(destination.delete(id)?));
        if saga.step("source_delete", || Ok(source.delete(id)?))? {
            moved.push(id);
        } else {
            warnings.push(format!(
                "item {id} could not be removed from its source; move undone"
            ));
            error!("event={operation} module=lifecycle status=error item_id={id} step=source_delete");
        }
        rollback_failures.extend(saga.into_rollback_failures());
    }

    if moved.is_empty() {
        return Ok(Outcome::failed("no items were moved", moved)
            .with_warnings(warnings)
            .with_rollback_failures(rollback_failures));
    }
    info!(
        "event={operation} module=lifecycle status=ok moved={} skipped_or_failed={}",
        moved.len(),
        warnings.len()
    );
    let message = format!("moved {} items", moved.len());
    Ok(Outcome::success(message, moved)
        .with_warnings(warnings)
        .with_rollback_failures(rollback_failures))
}

fn finish_delete(
    succeeded: bool,
    message: String,
    report: DeleteReport,
) -> Outcome<DeleteReport> {
    if succeeded {
        Outcome::success(message, report)
    } else {
        Outcome::failed(message, report)
    }
}

fn normalize_search_query(query: &str) -> LifecycleResult<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::Rejected(
            "search query must not be blank".to_string(),
        ));
    }
    if trimmed.chars().count() < 2 {
        return Err(LifecycleError::Rejected(
            "search query must be at least two characters".to_string(),
        ));
    }
    Ok(trimmed)
}
