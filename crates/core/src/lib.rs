//! Domain model and pure learning-state logic: retention scoring, review
//! scheduling and abandonment risk classification.

pub mod error;
pub mod model;
pub mod retention;
pub mod risk;
pub mod scheduler;
pub mod time;

pub use error::Error;
pub use time::Clock;
