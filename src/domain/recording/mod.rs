//! Recording domain module

mod boundary;
mod duration;

pub use boundary::boundary_delay;
pub use duration::Duration;
