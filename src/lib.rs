pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod exec;
pub mod harness;
pub mod output;
pub mod params;
pub mod pool;
pub mod results;
pub mod runner;
pub mod store;
pub mod verify;
