pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod controllers;
pub mod middleware;

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
}
