//! Online API contract validation.
//!
//! Every captured response is keyed by `METHOD /normalized/path`. The first few 2xx JSON bodies
//! establish a type-only [`Shape`]; later ones are compared against it and drift is recorded as
//! [`Violation`]s. Error responses only feed error-spike detection.

pub mod config;
pub mod endpoint;
pub mod model;
pub mod shape;
pub mod validator;

pub use config::ApiContractCfg;
pub use endpoint::normalize_endpoint;
pub use model::{
    AnalyzeSummary, ContractAnalysis, ContractFilter, ContractReport, EndpointReport,
    EndpointSnapshot, Severity, Violation, ViolationKind,
};
pub use shape::{Scalar, Shape};
pub use validator::ApiContractValidator;
