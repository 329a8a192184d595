//! Core types shared across the Opal compiler: the error taxonomy and the
//! caller-supplied compilation options.

pub mod error;
pub mod options;

pub use error::{Error, Result};
pub use options::{CompileOptions, Hotness, OsrMode, ProfilingMode};
