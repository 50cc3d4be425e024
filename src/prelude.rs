//! Commonly used imports
//!
//! Use `use flowlet::prelude::*;` for quick access to the most common types and functions.

// Core types
pub use crate::{Body, Cancel, Cx, FlowError, FlowResult, Flowlet, Params, Runtime, Saturation, Step};

// Stepwise driving
pub use crate::Sans;
pub use crate::handler::{drive, handle};

// Stock bodies
pub use crate::build::{barrier, collect, filter, for_m, forever, from_iter, pipe, sink, take};

// Assembly
pub use crate::pipeline::Pipeline;
