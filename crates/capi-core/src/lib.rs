//! capi-extract Core
//!
//! Core types shared by the extraction engine, its frontends and the record
//! writer: the normalized type graph, declarations, the output record schema,
//! configuration and errors.

pub mod config;
pub mod error;
pub mod location;
pub mod record;
pub mod spelling;
pub mod types;

pub use config::{Dialect, ExtractConfig};
pub use error::{Error, Result};
pub use location::{Extent, Location};
pub use record::{Record, TypeRecord};
pub use types::*;
