//! Protocol module - Yepkit wire definitions and packet framing.

pub mod constants;
pub mod framing;

pub use constants::*;
pub use framing::{Framing, exchange};
