//! Core use-case services.
//!
//! # Responsibility
//! - Rank items for recall.
//! - Parse CSV item imports.
//! - Coordinate moves between the item stores and session files.
//! - Keep the CLI decoupled from storage details and compensation.

pub mod csv_import;
pub mod lifecycle_service;
pub mod recall_service;
pub mod saga;
