pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod notifications;
pub mod permissions;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod workers;
pub mod workflow;

pub use workers::{default_handlers, JobHandler, Worker};
