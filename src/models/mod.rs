//! Core data models for the SLA analyzer.

mod cell;
mod ids;
mod period;
mod record;
mod summary;
mod table;

pub use cell::*;
pub use ids::*;
pub use period::*;
pub use record::*;
pub use summary::*;
pub use table::*;
