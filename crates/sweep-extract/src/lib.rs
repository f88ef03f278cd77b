//! Sweep Extract - turning one item into one result.
//!
//! An [`Extractor`] drives a browser page for a single identifier and
//! classifies what the target site answered. Every extractor runs its
//! attempts through [`attempt_loop`], which absorbs ordinary faults into
//! a terminal [`sweep_core::ResultTag`] and only lets a dead browser
//! escape as [`ExtractError::SessionCrashed`].
//!
//! Reference extractors:
//!
//! - [`MicrochipExtractor`] - pet microchip registry lookup
//! - [`MileageExtractor`] - odometer reading from a car listing
//! - [`RegistrationExtractor`] - lodging registration, two registries combined

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod attempt;
pub mod error;
pub mod extractor;
pub mod microchip;
pub mod mileage;
pub mod registration;

pub use attempt::{attempt_loop, detect_unavailable, FaultKind, Probe};
pub use error::ExtractError;
pub use extractor::{ExtractTiming, Extractor};
pub use microchip::MicrochipExtractor;
pub use mileage::MileageExtractor;
pub use registration::RegistrationExtractor;
