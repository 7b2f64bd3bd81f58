use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// User id the synthetic root identity carries when none is configured.
pub const DEFAULT_USER_ID: &str = "root";

/// Log directives used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_LOG_DIRECTIVES: &str = "mcp_sandbox_gateway=info,rmcp=warn";

/// Log filter for the binary: `rust_log` when it parses, the defaults otherwise.
pub fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}

/// Process-wide gateway settings.
///
/// Read once at startup and handed to the validator, the auth gate and the
/// router at construction time. Nothing consults ambient process state after
/// that, so two gateways with different settings can live side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the HTTP listener binds to, e.g. `0.0.0.0:8000`.
    pub bind: String,
    /// Whether requests must carry a valid `api_key`.
    pub require_auth: bool,
    /// Id of the synthetic root user used when authentication is disabled.
    pub default_user_id: String,
    /// Directory served under `/static/`.
    pub static_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            require_auth: true,
            default_user_id: DEFAULT_USER_ID.to_string(),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl GatewayConfig {
    /// Config with authentication turned off (single-user local mode).
    pub fn without_auth() -> Self {
        Self {
            require_auth: false,
            ..Default::default()
        }
    }

    pub fn auth_status(&self) -> &'static str {
        if self.require_auth {
            "enabled"
        } else {
            "disabled"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_requires_auth() {
        let config = GatewayConfig::default();
        assert!(config.require_auth);
        assert_eq!(config.default_user_id, DEFAULT_USER_ID);
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert_eq!(config.auth_status(), "enabled");
    }

    fn debug_enabled_for(filter: EnvFilter, target_is_gate: bool) -> bool {
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        tracing::subscriber::with_default(subscriber, || {
            if target_is_gate {
                tracing::enabled!(target: "mcp_sandbox_gateway::auth::middleware", tracing::Level::DEBUG)
            } else {
                tracing::enabled!(target: "rmcp::service", tracing::Level::DEBUG)
            }
        })
    }

    #[test]
    fn test_rust_log_can_enable_gate_debug() {
        assert!(debug_enabled_for(log_filter(Some("mcp_sandbox_gateway=debug")), true));
        assert!(debug_enabled_for(log_filter(Some("debug")), true));
    }

    #[test]
    fn test_default_log_filter() {
        assert!(!debug_enabled_for(log_filter(None), true));
        assert!(!debug_enabled_for(log_filter(Some("")), true));
        assert!(!debug_enabled_for(log_filter(None), false));

        let subscriber = tracing_subscriber::fmt().with_env_filter(log_filter(None)).finish();
        let info_enabled = tracing::subscriber::with_default(subscriber, || {
            tracing::enabled!(target: "mcp_sandbox_gateway::server", tracing::Level::INFO)
        });
        assert!(info_enabled);
    }

    #[test]
    fn test_without_auth() {
        let config = GatewayConfig::without_auth();
        assert!(!config.require_auth);
        assert_eq!(config.auth_status(), "disabled");
    }
}
