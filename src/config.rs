//! Runtime configuration.
//!
//! Every activated flowlet runs on its own OS thread, so the only knobs are
//! how those threads are named and how large their stacks are.

use serde::Deserialize;

use crate::error::FlowResult;

const ENV_THREAD_NAME: &str = "FLOWLET_THREAD_NAME";
const ENV_STACK_SIZE: &str = "FLOWLET_STACK_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Prefix for context thread names, suffixed with the context handle.
    pub thread_name: String,
    /// Stack size in bytes for context threads. `None` keeps the platform default.
    pub stack_size: Option<usize>,
    /// Emit a `trace!` event for every context switch.
    pub trace_switches: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thread_name: "flowlet".to_string(),
            stack_size: None,
            trace_switches: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(src: &str) -> FlowResult<Self> {
        Ok(toml::from_str(src)?)
    }

    /// Defaults overlaid with `FLOWLET_THREAD_NAME` and `FLOWLET_STACK_SIZE`.
    ///
    /// An unparsable stack size is ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(ENV_THREAD_NAME) {
            if !name.is_empty() {
                config.thread_name = name;
            }
        }
        if let Ok(raw) = std::env::var(ENV_STACK_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) => config.stack_size = Some(size),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {}", ENV_STACK_SIZE),
            }
        }
        config
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}
