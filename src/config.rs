//! Driver configuration and builder.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

/// The group name this driver joins, per §6: the 8-byte literal `"sheepdog"`.
pub const DEFAULT_GROUP_NAME: [u8; 8] = *b"sheepdog";

/// `CPG_INIT_RETRY_CNT` from §4.1: GCS init is retried this many times
/// before giving up fatally.
pub const DEFAULT_INIT_RETRY_COUNT: u32 = 10;

/// Backoff between GCS init retries.
pub const DEFAULT_INIT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Backoff between `TRY_AGAIN` retries on a multicast send.
pub const DEFAULT_SEND_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// `MAX_NODES` from §3/§4.2: the bounded length of the roster and the wire
/// envelope's node array.
pub const DEFAULT_MAX_NODES: usize = 256;

/// Configuration for a single driver instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Group name registered with the GCS (§6). Fixed at 8 bytes on the wire.
    pub group_name: [u8; 8],

    /// Maximum number of roster entries / wire-envelope node slots.
    pub max_nodes: usize,

    /// Number of GCS init retries before giving up fatally (§4.1).
    pub init_retry_count: u32,

    /// Backoff between GCS init retries.
    pub init_retry_backoff: Duration,

    /// Backoff between `TRY_AGAIN` retries on a multicast send.
    pub send_retry_backoff: Duration,

    /// Opaque option string passed to `init`, reserved for transport
    /// variants and otherwise ignored by this driver (§6).
    pub option: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            group_name: DEFAULT_GROUP_NAME,
            max_nodes: DEFAULT_MAX_NODES,
            init_retry_count: DEFAULT_INIT_RETRY_COUNT,
            init_retry_backoff: DEFAULT_INIT_RETRY_BACKOFF,
            send_retry_backoff: DEFAULT_SEND_RETRY_BACKOFF,
            option: None,
        }
    }
}

impl DriverConfig {
    /// Create a new builder for driver configuration.
    #[must_use]
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DriverResult<()> {
        if self.max_nodes == 0 {
            return Err(DriverError::ConfigError(
                "max_nodes must be greater than 0".into(),
            ));
        }

        if self.group_name.iter().all(|&b| b == 0) {
            return Err(DriverError::ConfigError(
                "group_name must not be all-zero".into(),
            ));
        }

        if self.init_retry_count == 0 {
            return Err(DriverError::ConfigError(
                "init_retry_count must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

/// Builder for driver configuration.
#[derive(Debug, Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// Set the group name. Truncated/zero-padded to 8 bytes.
    #[must_use]
    pub fn group_name(mut self, name: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        let n = name.len().min(8);
        buf[..n].copy_from_slice(&name[..n]);
        self.config.group_name = buf;
        self
    }

    /// Set the maximum roster size.
    #[must_use]
    pub fn max_nodes(mut self, max_nodes: usize) -> Self {
        self.config.max_nodes = max_nodes;
        self
    }

    /// Set the GCS init retry count.
    #[must_use]
    pub fn init_retry_count(mut self, count: u32) -> Self {
        self.config.init_retry_count = count;
        self
    }

    /// Set the GCS init retry backoff.
    #[must_use]
    pub fn init_retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.init_retry_backoff = backoff;
        self
    }

    /// Set the send retry backoff.
    #[must_use]
    pub fn send_retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.send_retry_backoff = backoff;
        self
    }

    /// Set the opaque, ignored option string.
    #[must_use]
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.config.option = Some(option.into());
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> DriverResult<DriverConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
