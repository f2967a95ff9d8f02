pub mod client;
pub mod config;
pub mod runner;
pub mod scenario;
pub mod statistics;
pub mod telemetry;
pub mod user;
