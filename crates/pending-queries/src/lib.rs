//! Pending-query registry.
//!
//! Tool handlers open a query and hand its correlation ID back to the assistant; the extension
//! polls for queries of a given type, runs them, and posts the result. Each entry owns a `watch`
//! channel so waiters wake only for their own query.

pub mod config;
pub mod errors;
pub mod model;
pub mod registry;

pub use config::QueriesCfg;
pub use errors::{QueryError, QueryResult};
pub use model::{
    normalize_status, CommandStatus, NewQuery, PendingQuery, QuerySnapshot, QueryState, Transition,
};
pub use registry::{QueryRegistry, SweeperHandle};
