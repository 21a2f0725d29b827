//! Repository - read-through access to connector datasets

mod events;
#[allow(clippy::module_inception)]
mod repository;
mod result;

pub use repository::{Repository, RepositoryBuilder};
pub use result::{FetchStatus, RepositoryResult, ResultMetadata};
