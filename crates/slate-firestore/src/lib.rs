//! Firestore REST API client.
//!
//! This crate provides:
//! - A Firestore client with token caching, retry and metrics
//! - Repositories for projects, scenes and shooting days
//! - The AI response cache (`ai_cache` collection)
//! - Implementations of the `slate-models` store traits

pub mod ai_cache;
pub mod client;
pub mod error;
pub mod metrics;
pub mod project_repo;
pub mod retry;
pub mod scene_repo;
pub mod schedule_repo;
pub mod token_cache;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use ai_cache::FirestoreResponseCache;
pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use project_repo::ProjectRepository;
pub use retry::RetryConfig;
pub use scene_repo::SceneRepository;
pub use schedule_repo::ScheduleRepository;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
