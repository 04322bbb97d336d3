//! Type definitions for retry configuration

mod policy;

pub use policy::*;
