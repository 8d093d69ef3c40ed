//! Recall scheduler.
//!
//! # Responsibility
//! - Rank every active item by recall urgency.
//! - Validate caller-supplied custom recall lists.
//!
//! # Invariants
//! - `recall` yields ids in non-increasing score order.
//! - Equal scores are ordered by ascending item id.
//! - Raising `total_recalls` with pool and date fixed strictly lowers a score.

use crate::model::item::{Item, ItemId};
use crate::repo::item_repo::{ItemStore, RepoResult};
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Tunable parameters of the priority function.
///
/// `score = (weight(pool) * alpha) * days_since^beta / (total_recalls + gamma)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecallParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Default for RecallParams {
    fn default() -> Self {
        Self {
            alpha: 10.0,
            beta: 1.2,
            gamma: 1.0,
        }
    }
}

impl RecallParams {
    /// Scores one item against `reference_date`.
    ///
    /// Days are counted inclusively and floored at 1, so an item recalled
    /// today (or dated in the future) counts as one day old.
    pub fn score(&self, item: &Item, reference_date: NaiveDate) -> f64 {
        let elapsed = (reference_date - item.last_recall).num_days() + 1;
        let days_since = elapsed.max(1) as f64;
        (item.pool.weight() * self.alpha) * days_since.powf(self.beta)
            / (f64::from(item.total_recalls) + self.gamma)
    }
}

#[derive(Debug)]
struct Ranked {
    score: f64,
    id: ItemId,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher score first, then lower id first.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Priority queue over a snapshot of the active store.
pub struct RecallService {
    queue: BinaryHeap<Ranked>,
    params: RecallParams,
    reference_date: NaiveDate,
}

impl RecallService {
    /// Loads every active item once and ranks it.
    pub fn load<S: ItemStore>(
        store: &S,
        params: RecallParams,
        reference_date: NaiveDate,
    ) -> RepoResult<Self> {
        let items = store.get_all()?;
        Ok(Self::from_items(&items, params, reference_date))
    }

    /// Ranks an already-loaded item snapshot.
    pub fn from_items(items: &[Item], params: RecallParams, reference_date: NaiveDate) -> Self {
        let queue = items
            .iter()
            .map(|item| Ranked {
                score: params.score(item, reference_date),
                id: item.id,
            })
            .collect();
        Self {
            queue,
            params,
            reference_date,
        }
    }

    pub fn params(&self) -> RecallParams {
        self.params
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// Number of ranked items not yet popped.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Pops up to `count` ids, highest score first.
    pub fn recall(&mut self, count: usize) -> Vec<ItemId> {
        self.recall_where(count, |_| true)
    }

    /// Pops up to `count` ids accepted by `eligible`; rejected ids are
    /// consumed without counting toward `count`.
    pub fn recall_where(
        &mut self,
        count: usize,
        mut eligible: impl FnMut(ItemId) -> bool,
    ) -> Vec<ItemId> {
        let mut picked = Vec::with_capacity(count.min(self.queue.len()));
        while picked.len() < count {
            let Some(next) = self.queue.pop() else {
                break;
            };
            if eligible(next.id) {
                picked.push(next.id);
            }
        }
        picked
    }
}

/// Rejection of a custom recall list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomRecallError {
    Empty,
    /// A single requested id was non-positive.
    NonPositive(ItemId),
    /// A single requested id is not in the active store.
    NotFound(ItemId),
    /// Every id of a multi-id request was discarded.
    NoValidIds,
}

impl Display for CustomRecallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "no custom item ids given"),
            Self::NonPositive(id) => write!(f, "item id must be positive, got {id}"),
            Self::NotFound(id) => write!(f, "item {id} does not exist in the store"),
            Self::NoValidIds => write!(f, "no valid item ids to recall"),
        }
    }
}

impl Error for CustomRecallError {}

/// Result of validating a custom id list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomRecall {
    /// Valid ids in request order, duplicates removed.
    pub ids: Vec<ItemId>,
    /// One message per discarded id.
    pub warnings: Vec<String>,
}

/// Validates a custom recall request.
///
/// One id must be valid or the whole request fails. Two or more ids are
/// filtered: invalid entries are dropped with a warning and only an empty
/// remainder fails.
pub fn validate_custom_ids<S: ItemStore>(
    store: &S,
    requested: &[ItemId],
) -> RepoResult<Result<CustomRecall, CustomRecallError>> {
    match requested {
        [] => Ok(Err(CustomRecallError::Empty)),
        [id] => {
            let id = *id;
            if id <= 0 {
                return Ok(Err(CustomRecallError::NonPositive(id)));
            }
            if !store.exists(id)? {
                return Ok(Err(CustomRecallError::NotFound(id)));
            }
            Ok(Ok(CustomRecall {
                ids: vec![id],
                warnings: Vec::new(),
            }))
        }
        many => {
            let mut accepted = CustomRecall::default();
            for &id in many {
                if id <= 0 {
                    accepted
                        .warnings
                        .push(format!("item id {id} is not positive, ignoring"));
                } else if !store.exists(id)? {
                    accepted
                        .warnings
                        .push(format!("item {id} does not exist in the store, ignoring"));
                } else if !accepted.ids.contains(&id) {
                    accepted.ids.push(id);
                }
            }
            for message in &accepted.warnings {
                warn!("event=custom_recall module=recall status=warn message=\"{message}\"");
            }
            if accepted.ids.is_empty() {
                return Ok(Err(CustomRecallError::NoValidIds));
            }
            Ok(Ok(accepted))
        }
    }
}
