//! Document conversion core.
//!
//! This module contains the parts that make conversion non-trivial:
//!
//! - Staging of input files and output directories with guaranteed cleanup
//! - Supervision of the external converter with deadline enforcement and
//!   graceful-then-forceful kill escalation
//! - A single-concurrency queue that serializes conversion work and
//!   resolves every caller exactly once
//!
//! The HTTP surface, input fetching and callback delivery live outside
//! this module and only interact with it through [`Job`] and [`Outcome`].

pub mod error;
pub mod job;
pub mod queue;
pub mod staging;
pub mod supervisor;

pub use error::{ConvertError, Result};
pub use job::{Job, JobId, Outcome};
pub use queue::ConversionQueue;
pub use staging::{StagedPaths, StagingArea};
pub use supervisor::{ConverterSettings, ConverterSupervisor};
