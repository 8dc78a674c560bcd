//! Bootstrap configuration.

use crate::runtime::BootstrapError;
use serde::{Deserialize, Serialize};

/// Environment variable holding the control-plane `host:port`.
pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";
/// Environment variable holding the initialization type.
pub const INITIALIZATION_TYPE_ENV: &str = "AWS_LAMBDA_INITIALIZATION_TYPE";
/// Environment variable the trace id is exported to.
pub const TRACE_ID_ENV: &str = "_X_AMZN_TRACE_ID";

/// How the execution environment was started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitializationType {
    /// Started for an incoming invocation.
    #[default]
    OnDemand,
    /// Started ahead of traffic.
    ProvisionedConcurrency,
    /// Started to be snapshotted; restore hooks run before the first fetch.
    SnapStart,
}

impl InitializationType {
    /// Parse the value of `AWS_LAMBDA_INITIALIZATION_TYPE`.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "snap-start" => InitializationType::SnapStart,
            "provisioned-concurrency" => InitializationType::ProvisionedConcurrency,
            _ => InitializationType::OnDemand,
        }
    }
}

/// Configuration for the bootstrap loop and its control-plane client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Control-plane address as `host:port`.
    pub runtime_api: String,
    /// Protocol version path segment.
    pub api_version: String,
    /// User agent sent on every request.
    pub user_agent: String,
    /// How this environment was started.
    pub initialization_type: InitializationType,
    /// Export each invocation's trace id to the process environment, or
    /// clear it when the invocation has none.
    ///
    /// The variable is written with `std::env::set_var` from the loop task.
    /// Handler code must not read the environment from other threads while
    /// the next invocation starts; prefer `InvocationMetadata::trace_id`.
    pub propagate_trace_id: bool,
    /// Function name, if known.
    pub function_name: Option<String>,
    /// Function version, if known.
    pub function_version: Option<String>,
    /// Configured memory in MB, if known.
    pub memory_size_mb: Option<u32>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            runtime_api: "127.0.0.1:9001".to_string(),
            api_version: "2018-06-01".to_string(),
            user_agent: format!("lambda-bootstrap/{}", env!("CARGO_PKG_VERSION")),
            initialization_type: InitializationType::OnDemand,
            propagate_trace_id: true,
            function_name: None,
            function_version: None,
            memory_size_mb: None,
        }
    }
}

impl BootstrapConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from the process environment.
    ///
    /// `AWS_LAMBDA_RUNTIME_API` is required.
    pub fn from_env() -> Result<Self, BootstrapError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BootstrapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let runtime_api = lookup(RUNTIME_API_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| BootstrapError::Config(format!("{} is not set", RUNTIME_API_ENV)))?;

        let mut config = Self::default().runtime_api(runtime_api.trim());

        if let Some(init) = lookup(INITIALIZATION_TYPE_ENV) {
            config.initialization_type = InitializationType::parse(&init);
        }
        config.function_name = lookup("AWS_LAMBDA_FUNCTION_NAME");
        config.function_version = lookup("AWS_LAMBDA_FUNCTION_VERSION");
        if let Some(memory) = lookup("AWS_LAMBDA_FUNCTION_MEMORY_SIZE") {
            let memory = memory.trim().parse().map_err(|e| {
                BootstrapError::Config(format!(
                    "invalid AWS_LAMBDA_FUNCTION_MEMORY_SIZE '{}': {}",
                    memory, e
                ))
            })?;
            config.memory_size_mb = Some(memory);
        }

        Ok(config)
    }

    /// Set the control-plane address.
    pub fn runtime_api(mut self, runtime_api: impl Into<String>) -> Self {
        self.runtime_api = runtime_api.into();
        self
    }

    /// Set the initialization type.
    pub fn initialization_type(mut self, initialization_type: InitializationType) -> Self {
        self.initialization_type = initialization_type;
        self
    }

    /// Enable or disable trace id export.
    pub fn propagate_trace_id(mut self, enabled: bool) -> Self {
        self.propagate_trace_id = enabled;
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Get the base URL, e.g. `http://127.0.0.1:9001/2018-06-01`.
    pub fn base_url(&self) -> String {
        let host = self
            .runtime_api
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!("http://{}/{}", host, self.api_version)
    }

    /// Whether the loop has to drive a snapshot/restore checkpoint at startup.
    pub fn is_snap_start(&self) -> bool {
        self.initialization_type == InitializationType::SnapStart
    }
}
