//! Extension-facing HTTP surface.

mod errors;
mod router;
mod state;

pub use errors::HttpError;
pub use router::build_router;
pub use state::AppState;
