//! Shared error type (§7), CPU-affinity wrapper (§5 ambient), and the
//! cross-field validation helpers every tool's config runs at startup
//! (§4.13).

mod error;
mod validate;

pub mod affinity;

pub use error::PerfError;
pub use validate::{validate_rates, RateFields, ValidationError};
