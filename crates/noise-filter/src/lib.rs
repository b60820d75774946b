//! Noise classification for captured telemetry.
//!
//! A [`NoiseFilter`] holds the built-in rules (framework chatter, analytics beacons, dev-server
//! traffic) plus user, dismissed and auto-detected rules. Observe reads consult it to hide noise
//! unless the caller asks for everything.

pub mod builtin;
pub mod errors;
pub mod filter;
pub mod rule;

pub use builtin::builtin_rules;
pub use errors::{NoiseError, NoiseResult};
pub use filter::{NoiseFilter, NoiseProposal, NoiseStats, AUTO_APPLY_CONFIDENCE};
pub use rule::{
    validate_pattern, Classification, MatchSpec, NewRule, NoiseCategory, NoiseRule,
    MAX_PATTERN_LEN, MAX_RULES,
};
