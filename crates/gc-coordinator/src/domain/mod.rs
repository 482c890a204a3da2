//! # Domain Module
//!
//! Core types for the glucose check coordinator: snapshots, handles, phases,
//! engine state, the result store and the invariants tying them together.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod result_store;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use result_store::*;
pub use value_objects::*;
