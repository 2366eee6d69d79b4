mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;
mod validation;

pub use error::ApiError;
pub use server::{
    build_downloads_state, build_events_state, downloads_router, events_router, run_downloads,
    run_events,
};
