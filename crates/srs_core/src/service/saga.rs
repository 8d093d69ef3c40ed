//! Compensating-step runner for cross-store operations.
//!
//! # Responsibility
//! - Track the undo of every step that already took effect.
//! - On a failed step, run recorded undos newest-first exactly once.
//!
//! # Invariants
//! - Undo failures are recorded, logged and never retried.
//! - A saga compensates at most once; later steps are refused.

use log::{error, warn};
use std::fmt::Display;

type Undo<'a, E> = Box<dyn FnOnce() -> Result<bool, E> + 'a>;

/// Sequence of store steps sharing one compensation log.
pub struct Saga<'a, E> {
    operation: &'static str,
    undos: Vec<(&'static str, Undo<'a, E>)>,
    failed_step: Option<&'static str>,
    rollback_failures: Vec<String>,
}

impl<'a, E: Display> Saga<'a, E> {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            undos: Vec::new(),
            failed_step: None,
            rollback_failures: Vec::new(),
        }
    }

    /// Records the undo of a step the caller already performed.
    pub fn completed(&mut self, step: &'static str, undo: impl FnOnce() -> Result<bool, E> + 'a) {
        self.undos.push((step, Box::new(undo)));
    }

    /// Runs one step. `Ok(false)` from the action compensates every recorded
    /// step and returns `Ok(false)`; an `Err` compensates and propagates.
    pub fn step(
        &mut self,
        step: &'static str,
        action: impl FnOnce() -> Result<bool, E>,
    ) -> Result<bool, E> {
        if self.failed_step.is_some() {
            return Ok(false);
        }
        match action() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.fail(step);
                Ok(false)
            }
            Err(err) => {
                error!(
                    "event=saga_step module=saga status=error operation={} step={} error={}",
                    self.operation, step, err
                );
                self.fail(step);
                Err(err)
            }
        }
    }

    /// Runs one step that registers `undo` when it succeeds.
    pub fn step_with_undo(
        &mut self,
        step: &'static str,
        action: impl FnOnce() -> Result<bool, E>,
        undo: impl FnOnce() -> Result<bool, E> + 'a,
    ) -> Result<bool, E> {
        let applied = self.step(step, action)?;
        if applied {
            self.completed(step, undo);
        }
        Ok(applied)
    }

    /// Marks the saga failed at `step` and compensates.
    pub fn fail(&mut self, step: &'static str) {
        if self.failed_step.is_some() {
            return;
        }
        self.failed_step = Some(step);
        warn!(
            "event=saga_compensate module=saga status=start operation={} failed_step={} undo_steps={}",
            self.operation,
            step,
            self.undos.len()
        );

        while let Some((undo_step, undo)) = self.undos.pop() {
            match undo() {
                Ok(true) => {}
                Ok(false) => self.record_rollback_failure(undo_step, "undo did not apply".to_string()),
                Err(err) => self.record_rollback_failure(undo_step, err.to_string()),
            }
        }
    }

    pub fn failed_step(&self) -> Option<&'static str> {
        self.failed_step
    }

    pub fn rollback_failures(&self) -> &[String] {
        &self.rollback_failures
    }

    /// Consumes the saga, returning recorded rollback failures.
    pub fn into_rollback_failures(self) -> Vec<String> {
        self.rollback_failures
    }

    fn record_rollback_failure(&mut self, step: &'static str, reason: String) {
        error!(
            "event=saga_compensate module=saga status=error operation={} undo_step={} error={}",
            self.operation, step, reason
        );
        self.rollback_failures
            .push(format!("{}: undo of `{step}` failed: {reason}", self.operation));
    }
}
