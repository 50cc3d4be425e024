//! # Flowlet: chained cooperative coroutines
//!
//! A flowlet is a resumable body that can be linked into a chain: it awaits
//! values from its upstream and sends values to its downstream. Only one body
//! runs at a time, and control moves between them by explicit transfers.
//!
//! ## Core Types
//!
//! - **[`Runtime`]**: owns the contexts and creates flowlets
//! - **[`Flowlet`]**: consumer handle with `send`/`recv`, `bind`, `finalize`
//! - **[`Cx`]**: the body's own view with `recv`/`send`, `suspend`, `close`
//!
//! ## Example
//!
//! ```
//! use flowlet::prelude::*;
//!
//! let rt = Runtime::new();
//! let numbers = rt.flowlet(from_iter(1..=5), Params::new());
//! let squares = rt.flowlet(pipe(|x: u32| x * x), Params::new());
//! squares.bind(&numbers).unwrap();
//!
//! let out: Vec<u32> = squares.iter().collect::<FlowResult<_>>().unwrap();
//! assert_eq!(out, vec![1, 4, 9, 16, 25]);
//! ```
//!
//! ## Teardown
//!
//! [`Flowlet::finalize`] and [`Cx::close`] tear down the active run of a
//! chain upstream first, by raising [`Cancel::Unwind`] at each suspended
//! body. Bodies see it as an error from `recv`/`send` and should propagate it
//! with `?`. Iterating a flowlet finalizes it once it runs dry, and dropping
//! the [`Runtime`] cancels whatever is still alive.
//!
//! ## Common Functions
//!
//! **Stock bodies:**
//! - [`from_iter`] - send every item
//! - [`pipe`] - map each awaited value
//! - [`take`] - forward `n` values, then close the upstream
//!
//! **Execution:**
//! - [`handle`] - answer every value a body hands out
//! - [`Pipeline::run`] - bind stages left to right and collect the output

mod build;
mod chain;
mod config;
mod context;
mod cx;
mod error;
mod flowlet;
mod handler;
mod iter;
mod params;
mod pipeline;
mod runtime;
mod sans;
mod step;
mod switch;
mod terminate;

pub mod prelude;

pub use build::*;
pub use config::RuntimeConfig;
pub use context::{Body, current};
pub use cx::Cx;
pub use error::{Cancel, FlowError, FlowResult};
pub use flowlet::{Flowlet, Saturation};
pub use handler::*;
pub use iter::FlowletIter;
pub use params::Params;
pub use pipeline::Pipeline;
pub use runtime::Runtime;
pub use sans::*;
pub use step::*;

/// Route `tracing` output through the test harness. Filter with `RUST_LOG`.
#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
