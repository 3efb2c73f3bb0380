//! Domain logic for the advanced generation grid.
//!
//! Parses axis value strings, models axes and their catalog, enumerates
//! every combination of axis values in cost order, and turns each
//! combination into a fully-configured generation job. No I/O happens here;
//! the host application is reached through the traits in [`host`].

pub mod axis;
pub mod catalog;
pub mod enumerate;
pub mod error;
pub mod host;
pub mod infotext;
pub mod job;
pub mod manifest;
pub mod naming;
pub mod parse;
pub mod request;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use axis::{Axis, AxisKind, AxisOption, ValidationContext};
pub use enumerate::{apply_axes, PositionCode, Selection};
pub use error::CoreError;
pub use job::{build_jobs, Job, JobOutcome};
pub use request::GenerationRequest;
