pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod events;
pub mod executions;
