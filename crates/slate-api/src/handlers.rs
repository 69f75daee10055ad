//! Request handlers.

pub mod health;
pub mod scenes;
pub mod schedule;

pub use health::*;
pub use scenes::*;
pub use schedule::*;
