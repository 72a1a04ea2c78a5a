//! Per-user calendar of daily metrics. Every user has a set of data sources, each one a series of
//! daily values going back from some date. The selected series is projected onto the current month
//! and the month before, together with a label for today and the colors of the source.
//!

pub mod calendar;
pub mod cli;
pub mod projector;
pub mod snapshot;
pub mod sources;
pub mod store;
pub mod theme;
pub mod utils;
