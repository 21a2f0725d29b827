//! Infrastructure layer - storage, locking, validation and the repository

pub mod cache;
pub mod failure;
pub mod lock;
pub mod logging;
pub mod metrics;
pub mod repository;
pub mod validation;
