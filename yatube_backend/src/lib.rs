pub mod api;
pub mod authz;
pub mod bootstrap;
pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod files;
pub mod follows;
pub mod forms;
pub mod groups;
pub mod node;
pub mod pagination;
pub mod posts;
pub mod sessions;
pub mod telemetry;
pub mod users;
pub mod utils;
