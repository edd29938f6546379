//! HTTP request handlers.

pub mod common;
pub mod delta;
pub mod force;
pub mod health;
pub mod parts;

pub use common::*;
pub use delta::*;
pub use force::*;
pub use health::*;
pub use parts::*;
