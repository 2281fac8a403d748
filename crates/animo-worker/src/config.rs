//! Worker configuration.

/// Job runner configuration.
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    /// Accept provider output URLs on loopback/private hosts (local testing only)
    pub allow_private_output_hosts: bool,
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            allow_private_output_hosts: std::env::var("WORKER_ALLOW_PRIVATE_OUTPUT_HOSTS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::remove_var("WORKER_ALLOW_PRIVATE_OUTPUT_HOSTS");
        assert!(!WorkerConfig::from_env().allow_private_output_hosts);

        std::env::set_var("WORKER_ALLOW_PRIVATE_OUTPUT_HOSTS", "true");
        assert!(WorkerConfig::from_env().allow_private_output_hosts);
        std::env::remove_var("WORKER_ALLOW_PRIVATE_OUTPUT_HOSTS");
    }
}
