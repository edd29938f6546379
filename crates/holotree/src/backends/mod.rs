//! Holotree backends.

pub mod hololib;
