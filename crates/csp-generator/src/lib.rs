//! Origin accumulator and Content-Security-Policy generator.
//!
//! Every resource the page loads is recorded as an `(origin, resource type)` observation with the
//! pages it appeared on. [`OriginAccumulator::generate`] turns that history into a policy,
//! scoring each origin by how often and how widely it was seen and dropping development noise.

pub mod accumulator;
pub mod errors;
pub mod policy;
pub mod resource;

pub use accumulator::{OriginAccumulator, OriginEntry, MAX_PAGES};
pub use errors::{CspError, CspResult};
pub use policy::{
    assemble_header, Confidence, CspMode, CspObservations, CspParams, CspResponse, FilteredOrigin,
    OriginDetail,
};
pub use resource::{
    directive_for, origin_of, resource_type_for_content_type, resource_type_for_initiator,
    DIRECTIVE_ORDER,
};
