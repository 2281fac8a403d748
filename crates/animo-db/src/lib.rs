//! Order and media job persistence.
//!
//! This crate provides:
//! - [`OrderStore`] and [`JobStore`], the persistence seams used by the API
//!   and the job runner
//! - A PostgREST client for the hosted Postgres tables (`orders`, `media_jobs`)
//! - Conditional claim/complete/fail updates that keep concurrent runs of the
//!   same job from both proceeding
//! - An in-memory store with identical semantics for tests and local runs

pub mod client;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod repos;
pub mod retry;
pub mod store;

pub use client::{PostgrestClient, PostgrestConfig};
pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use repos::{JobRepository, OrderRepository};
pub use store::{JobClaim, JobStore, OrderStore, DEFAULT_HISTORY_LIMIT};
