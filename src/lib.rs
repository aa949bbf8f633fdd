pub mod billing;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod models;
pub mod payments;
