pub mod calendar;
pub mod indicators;
pub mod merge;
pub mod types;

pub use calendar::*;
pub use merge::*;
pub use types::*;
