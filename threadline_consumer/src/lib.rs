pub mod actions;
pub mod bootstrap;
pub mod config;
pub mod database;
pub mod error;
pub mod mutations;
pub mod node;
pub mod queue;
pub mod reconcile;
pub mod replay;
pub mod router;
pub mod telemetry;
pub mod utils;
