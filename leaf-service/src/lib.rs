pub mod classifier;
pub mod config;
pub mod handlers;
pub mod knowledge;
pub mod services;
pub mod session;
pub mod startup;

pub use startup::{AppState, Application};
