//! Database layer: models, initialization and queries

pub mod init;
pub mod models;
pub mod queries;

pub use init::init_database;
