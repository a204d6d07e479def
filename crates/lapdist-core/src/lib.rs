//! Laptop distribution core: domain models, repository traits and
//! the collaborator interfaces shared by every crate in the workspace.

pub mod error;
pub mod models;
pub mod notify;
pub mod repository;
pub mod storage;
