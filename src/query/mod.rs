//! Read path: relative-time translation and two-tier query coordination

pub mod coordinator;
pub mod relative;

pub use coordinator::{QueryCoordinator, RangeQuery};
pub use relative::RelativeTime;
