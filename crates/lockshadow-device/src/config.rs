//! Device configuration.

use std::time::Duration;

use lockshadow_core::{ActuatorConfig, NetworkInterface, NetworkMask, ReportConfig};

use crate::error::DeviceError;

/// Default bound on a single receive-loop iteration.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default pause before retrying a session that could not be established.
pub const DEFAULT_SESSION_RETRY: Duration = Duration::from_secs(1);

/// Runtime configuration for one device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Thing name the shadow topics are derived from.
    pub thing_name: String,
    /// Network types the connectivity manager may use.
    pub networks: NetworkMask,
    /// Interfaces handed to the network backend.
    pub interfaces: Vec<NetworkInterface>,
    /// Report cycle timing.
    pub report: ReportConfig,
    /// Actuator timing.
    pub actuator: ActuatorConfig,
    /// Upper bound on one receive-loop call.
    pub receive_timeout: Duration,
    /// Wait before retrying a failed session setup on the same link.
    pub session_retry: Duration,
    /// Run one report pass once the first session is established.
    pub report_on_startup: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            thing_name: "lockshadow-device".to_string(),
            networks: NetworkMask::WIFI,
            interfaces: Vec::new(),
            report: ReportConfig::default(),
            actuator: ActuatorConfig::default(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            session_retry: DEFAULT_SESSION_RETRY,
            report_on_startup: true,
        }
    }
}

impl DeviceConfig {
    /// Check the configuration before any task is spawned.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Config` if:
    /// - the thing name is empty or contains topic separators or wildcards
    /// - no network type is configured
    /// - an interface belongs to an unconfigured network type
    /// - a timeout is zero
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.thing_name.is_empty() {
            return Err(DeviceError::Config("thing name is empty".to_string()));
        }
        if self.thing_name.contains(['/', '+', '#']) {
            return Err(DeviceError::Config(format!(
                "thing name {:?} contains a topic separator or wildcard",
                self.thing_name
            )));
        }
        if self.networks.is_empty() {
            return Err(DeviceError::Config("no network type configured".to_string()));
        }
        if let Some(stray) =
            self.interfaces.iter().find(|i| !self.networks.contains(i.network.mask()))
        {
            return Err(DeviceError::Config(format!(
                "interface {} uses unconfigured network {}",
                stray.name, stray.network
            )));
        }
        if self.receive_timeout.is_zero()
            || self.report.ack_timeout.is_zero()
            || self.session_retry.is_zero()
        {
            return Err(DeviceError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use lockshadow_core::{ConnectionParams, Credentials, NetworkType};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn default_is_valid() {
        DeviceConfig::default().validate().expect("default config");
    }

    #[test]
    fn default_timings() {
        let config = DeviceConfig::default();
        assert_eq!(config.receive_timeout, Duration::from_millis(500));
        assert_eq!(config.report.ack_timeout, Duration::from_millis(5000));
        assert_eq!(config.report.open_dwell, Duration::from_millis(5000));
        assert_eq!(config.actuator.dwell, Duration::from_millis(5000));
        assert!(config.report_on_startup);
    }

    #[test]
    fn rejects_empty_network_mask() {
        let config = DeviceConfig { networks: NetworkMask::empty(), ..DeviceConfig::default() };
        assert!(matches!(config.validate(), Err(DeviceError::Config(_))));
    }

    #[test]
    fn rejects_interface_outside_mask() {
        let config = DeviceConfig {
            interfaces: vec![NetworkInterface {
                network: NetworkType::Cellular,
                name: "wwan0".to_string(),
                connection: ConnectionParams { endpoint: "broker".to_string(), port: 8883 },
                credentials: Credentials::default(),
            }],
            ..DeviceConfig::default()
        };
        assert!(matches!(config.validate(), Err(DeviceError::Config(_))));
    }

    #[test]
    fn rejects_zero_ack_timeout() {
        let mut config = DeviceConfig::default();
        config.report.ack_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_session_retry() {
        let config = DeviceConfig { session_retry: Duration::ZERO, ..DeviceConfig::default() };
        assert!(matches!(config.validate(), Err(DeviceError::Config(_))));
    }

    proptest! {
        #[test]
        fn thing_names_with_separators_are_rejected(
            prefix in "[a-z0-9-]{0,8}",
            separator in prop::sample::select(vec!['/', '+', '#']),
            suffix in "[a-z0-9-]{0,8}",
        ) {
            let config = DeviceConfig {
                thing_name: format!("{prefix}{separator}{suffix}"),
                ..DeviceConfig::default()
            };
            prop_assert!(config.validate().is_err());
        }

        #[test]
        fn plain_thing_names_are_accepted(name in "[A-Za-z0-9_-]{1,32}") {
            let config = DeviceConfig { thing_name: name, ..DeviceConfig::default() };
            prop_assert!(config.validate().is_ok());
        }
    }
}
