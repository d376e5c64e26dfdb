pub mod autotype;
pub mod cli_runner;
pub mod config;
pub mod contract;
pub mod core_service;
pub mod logging;
pub mod model;
pub mod notify;
pub mod runtime;
pub mod scheduler;
pub mod transport;
pub mod vault;
