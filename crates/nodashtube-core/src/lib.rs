pub mod config;
pub mod logging;

pub mod control;
pub mod done;
pub mod error;
pub mod index;
pub mod process;
pub mod progress;
pub mod registry;
pub mod service;
pub mod session;
pub mod supervisor;
