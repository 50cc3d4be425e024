//! Stock flowlet bodies.
//!
//! Sources produce values without awaiting; stages await from their upstream
//! and send downstream. Every builder returns a [`Body`](crate::Body) ready for
//! [`Runtime::flowlet`](crate::Runtime::flowlet).

mod source;
mod stage;

pub use source::{for_m, forever, from_iter};
pub use stage::{barrier, collect, filter, pipe, sink, take};
