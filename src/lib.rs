//! # glimpse
//!
//! Tenant-scoped image similarity: content and perceptual hashing, CLIP
//! embeddings behind a vector index, near-duplicate clustering and
//! isolation-based anomaly ranking.

pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod index;
pub mod metrics;
pub mod models;
pub mod processing;
pub mod runtime;
pub mod storage;
pub mod ui;

pub use crate::core::{Error, Result};
