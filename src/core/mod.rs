//! Pipeline core: configuration, data model, credential rotation, the
//! provider cascade and batch orchestration.

pub mod batch;
pub mod cascade;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
