pub mod error;
pub mod generator;
pub mod handlers;
pub mod server;
pub mod store;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: store::Store,
}

pub use server::{resolve_data_dir, router, run, ServerConfig};
