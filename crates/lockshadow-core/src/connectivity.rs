//! Connectivity manager.
//!
//! Arbitrates which of the configured network types is "the" link the
//! shadow session runs over, and turns raw interface state changes into
//! [`LinkEvent`]s for dependents.
//!
//! ## State machine
//!
//! ```text
//!            Enabled(n)               Disabled/Unknown(active)
//! NoNetwork ───────────► Connected(n) ─────────────────────────► NoNetwork
//!     ▲                        │                                     │
//!     │                        └── another configured network up ───►│ Connected(m)
//!     └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no terminal state. While a link is selected the other configured
//! network types are disabled to reclaim their resources; they are
//! re-enabled as soon as the active link drops so any of them may take over.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Set of network types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NetworkMask: u32 {
        /// 802.11 station interface.
        const WIFI = 0x01;
        /// Bluetooth Low Energy.
        const BLE = 0x02;
        /// Wired Ethernet.
        const ETHERNET = 0x04;
        /// Cellular modem.
        const CELLULAR = 0x08;
    }
}

/// A single network type.
///
/// Declaration order is selection priority when several are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NetworkType {
    /// 802.11 station interface.
    Wifi,
    /// Bluetooth Low Energy.
    Ble,
    /// Wired Ethernet.
    Ethernet,
    /// Cellular modem.
    Cellular,
}

impl NetworkType {
    /// Every type in priority order.
    pub const ALL: [Self; 4] = [Self::Wifi, Self::Ble, Self::Ethernet, Self::Cellular];

    /// Single-bit mask for this type.
    pub fn mask(self) -> NetworkMask {
        match self {
            Self::Wifi => NetworkMask::WIFI,
            Self::Ble => NetworkMask::BLE,
            Self::Ethernet => NetworkMask::ETHERNET,
            Self::Cellular => NetworkMask::CELLULAR,
        }
    }

    /// Highest-priority type contained in `mask`.
    pub fn first_in(mask: NetworkMask) -> Option<Self> {
        Self::ALL.into_iter().find(|network| mask.contains(network.mask()))
    }

    /// Parse a lowercase name as used on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "wifi" => Some(Self::Wifi),
            "ble" => Some(Self::Ble),
            "ethernet" | "eth" => Some(Self::Ethernet),
            "cellular" => Some(Self::Cellular),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wifi => "wifi",
            Self::Ble => "ble",
            Self::Ethernet => "ethernet",
            Self::Cellular => "cellular",
        };
        f.write_str(name)
    }
}

/// Raw interface state reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// Interface is up and routable.
    Enabled,
    /// Interface went down.
    Disabled,
    /// Backend lost track of the interface.
    Unknown,
}

/// State change notification from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkChange {
    /// Network that changed.
    pub network: NetworkType,
    /// Its new state.
    pub state: NetworkState,
}

/// Broker endpoint reachable over an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Broker host name.
    pub endpoint: String,
    /// Broker port.
    pub port: u16,
}

/// TLS material for the session.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl redacts `private_key` so interface
///   handles can be logged freely.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    /// Client certificate (PEM path or label).
    pub client_cert: Option<String>,
    /// Client private key (PEM path or label).
    pub private_key: Option<String>,
    /// Root CA bundle (PEM path or label).
    pub root_ca: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_cert", &self.client_cert)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("root_ca", &self.root_ca)
            .finish()
    }
}

/// Handle for one network interface plus what the session needs to use it.
///
/// Owned by the backend; the manager and the session only hold clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    /// Which network type this interface serves.
    pub network: NetworkType,
    /// Interface name as known to the backend.
    pub name: String,
    /// Broker endpoint.
    pub connection: ConnectionParams,
    /// Session credentials.
    pub credentials: Credentials,
}

/// Notification for link subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A link was selected; the session should be (re)established on it.
    Connected {
        /// Selected interface.
        interface: NetworkInterface,
    },
    /// The selected link dropped.
    Disconnected {
        /// Interface that went away.
        interface: NetworkInterface,
    },
}

impl LinkEvent {
    /// Network the event concerns.
    pub fn network(&self) -> NetworkType {
        match self {
            Self::Connected { interface } | Self::Disconnected { interface } => interface.network,
        }
    }
}

/// Manager state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link selected.
    NoNetwork,
    /// A link is selected.
    Connected(NetworkType),
}

/// Identifier of a state-change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u32);

/// The platform network stack (external collaborator).
pub trait NetworkBackend: Send {
    /// Bring the given network types up. Returns the types now enabled.
    fn enable(&mut self, networks: NetworkMask) -> NetworkMask;

    /// Take the given network types down.
    fn disable(&mut self, networks: NetworkMask);

    /// Types currently connected.
    fn connected_networks(&self) -> NetworkMask;

    /// Interface handle for a type, if the backend knows it.
    fn interface(&self, network: NetworkType) -> Option<NetworkInterface>;
}

/// Selects and tracks the active link.
pub struct ConnectivityManager<B: NetworkBackend> {
    backend: B,
    configured: NetworkMask,
    state: LinkState,
    subscriptions: Vec<(SubscriptionId, NetworkMask)>,
    next_subscription: u32,
}

impl<B: NetworkBackend> ConnectivityManager<B> {
    /// Take ownership of the backend and enable every configured type.
    pub fn new(mut backend: B, configured: NetworkMask) -> Self {
        let enabled = backend.enable(configured);
        if enabled != configured {
            tracing::warn!(?configured, ?enabled, "not every configured network could be enabled");
        }
        Self {
            backend,
            configured,
            state: LinkState::NoNetwork,
            subscriptions: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Currently selected network, if any.
    pub fn active_network(&self) -> Option<NetworkType> {
        match self.state {
            LinkState::NoNetwork => None,
            LinkState::Connected(network) => Some(network),
        }
    }

    /// Configured network types.
    pub fn configured(&self) -> NetworkMask {
        self.configured
    }

    /// The backend, for inspection.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Enable network types, restricted to the configured set.
    pub fn enable(&mut self, networks: NetworkMask) -> NetworkMask {
        self.backend.enable(networks & self.configured)
    }

    /// Disable network types, restricted to the configured set.
    pub fn disable(&mut self, networks: NetworkMask) {
        self.backend.disable(networks & self.configured);
    }

    /// Configured types that are currently connected.
    pub fn connected_networks(&self) -> NetworkMask {
        self.backend.connected_networks() & self.configured
    }

    /// Interface handle for a network type.
    pub fn interface(&self, network: NetworkType) -> Option<NetworkInterface> {
        self.backend.interface(network)
    }

    /// Interface of the selected link.
    pub fn active_interface(&self) -> Option<NetworkInterface> {
        self.active_network().and_then(|network| self.interface(network))
    }

    /// Register interest in link events for the given types.
    pub fn subscribe(&mut self, networks: NetworkMask) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.push((id, networks));
        id
    }

    /// Drop a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|(registered, _)| *registered != id);
        self.subscriptions.len() != before
    }

    /// Subscriptions interested in an event.
    pub fn subscribers_for(&self, event: &LinkEvent) -> Vec<SubscriptionId> {
        let mask = event.network().mask();
        self.subscriptions
            .iter()
            .filter(|(_, interest)| interest.intersects(mask))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Adopt a link that was already connected before any event arrived.
    ///
    /// Returns the selected interface. No event is produced; the caller is
    /// the one waiting for a link and uses the return value directly.
    pub fn select_initial(&mut self) -> Option<NetworkInterface> {
        if let LinkState::Connected(network) = self.state {
            return self.interface(network);
        }
        let network = NetworkType::first_in(self.connected_networks())?;
        let interface = self.interface(network)?;
        self.select(network);
        Some(interface)
    }

    /// Feed a raw state change from the backend.
    pub fn handle_state_change(
        &mut self,
        network: NetworkType,
        state: NetworkState,
    ) -> Vec<LinkEvent> {
        if !self.configured.contains(network.mask()) {
            tracing::debug!(%network, ?state, "ignoring state change for unconfigured network");
            return Vec::new();
        }

        match (state, self.state) {
            (NetworkState::Enabled, LinkState::NoNetwork) => self.on_first_connect(network),
            (NetworkState::Disabled | NetworkState::Unknown, LinkState::Connected(active))
                if active == network =>
            {
                self.on_active_lost(network)
            },
            _ => {
                tracing::debug!(%network, ?state, link = ?self.state, "state change ignored");
                Vec::new()
            },
        }
    }

    fn on_first_connect(&mut self, network: NetworkType) -> Vec<LinkEvent> {
        let Some(interface) = self.interface(network) else {
            tracing::error!(%network, "connected network has no interface");
            return Vec::new();
        };
        self.select(network);
        vec![LinkEvent::Connected { interface }]
    }

    fn on_active_lost(&mut self, network: NetworkType) -> Vec<LinkEvent> {
        tracing::info!(%network, "active network lost");
        let mut events = Vec::new();
        if let Some(interface) = self.interface(network) {
            events.push(LinkEvent::Disconnected { interface });
        }

        let others = self.configured - network.mask();
        if !others.is_empty() {
            self.backend.enable(others);
        }
        self.state = LinkState::NoNetwork;

        if let Some(next) = NetworkType::first_in(self.connected_networks()) {
            if let Some(interface) = self.interface(next) {
                self.select(next);
                events.push(LinkEvent::Connected { interface });
            }
        }
        events
    }

    fn select(&mut self, network: NetworkType) {
        tracing::info!(%network, "network selected");
        self.state = LinkState::Connected(network);

        let unused = self.configured - network.mask();
        if !unused.is_empty() {
            self.backend.disable(unused);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct MockBackend {
        enabled: NetworkMask,
        connected: NetworkMask,
        interfaces: HashMap<NetworkType, NetworkInterface>,
        calls: Vec<String>,
    }

    impl MockBackend {
        fn with(networks: &[NetworkType]) -> Self {
            let interfaces = networks.iter().map(|&n| (n, interface_for(n))).collect();
            Self { interfaces, ..Self::default() }
        }
    }

    impl NetworkBackend for MockBackend {
        fn enable(&mut self, networks: NetworkMask) -> NetworkMask {
            self.calls.push(format!("enable {networks:?}"));
            self.enabled |= networks;
            self.enabled
        }

        fn disable(&mut self, networks: NetworkMask) {
            self.calls.push(format!("disable {networks:?}"));
            self.enabled -= networks;
            self.connected -= networks;
        }

        fn connected_networks(&self) -> NetworkMask {
            self.connected
        }

        fn interface(&self, network: NetworkType) -> Option<NetworkInterface> {
            self.interfaces.get(&network).cloned()
        }
    }

    fn interface_for(network: NetworkType) -> NetworkInterface {
        NetworkInterface {
            network,
            name: format!("{network}0"),
            connection: ConnectionParams { endpoint: format!("{network}.broker"), port: 8883 },
            credentials: Credentials::default(),
        }
    }

    fn manager() -> ConnectivityManager<MockBackend> {
        let backend = MockBackend::with(&[NetworkType::Wifi, NetworkType::Ethernet]);
        ConnectivityManager::new(backend, NetworkMask::WIFI | NetworkMask::ETHERNET)
    }

    #[test]
    fn construction_enables_configured_networks() {
        let manager = manager();
        assert_eq!(manager.backend().enabled, NetworkMask::WIFI | NetworkMask::ETHERNET);
        assert_eq!(manager.state(), LinkState::NoNetwork);
    }

    #[test]
    fn first_connection_disables_the_rest() {
        let mut manager = manager();
        manager.backend_mut().connected = NetworkMask::WIFI;

        let events = manager.handle_state_change(NetworkType::Wifi, NetworkState::Enabled);

        assert_eq!(events, vec![LinkEvent::Connected { interface: interface_for(NetworkType::Wifi) }]);
        assert_eq!(manager.state(), LinkState::Connected(NetworkType::Wifi));
        assert!(!manager.backend().enabled.contains(NetworkMask::ETHERNET));
    }

    #[test]
    fn second_connection_is_ignored() {
        let mut manager = manager();
        manager.handle_state_change(NetworkType::Wifi, NetworkState::Enabled);

        let events = manager.handle_state_change(NetworkType::Ethernet, NetworkState::Enabled);
        assert!(events.is_empty());
        assert_eq!(manager.active_network(), Some(NetworkType::Wifi));
    }

    #[test]
    fn disconnect_of_inactive_network_is_ignored() {
        let mut manager = manager();
        manager.handle_state_change(NetworkType::Wifi, NetworkState::Enabled);

        let events = manager.handle_state_change(NetworkType::Ethernet, NetworkState::Disabled);
        assert!(events.is_empty());
        assert_eq!(manager.active_network(), Some(NetworkType::Wifi));
    }

    #[test]
    fn failover_to_other_network() {
        let mut manager = manager();
        manager.backend_mut().connected = NetworkMask::WIFI;
        manager.handle_state_change(NetworkType::Wifi, NetworkState::Enabled);
        assert!(!manager.backend().enabled.contains(NetworkMask::ETHERNET));

        manager.backend_mut().connected = NetworkMask::empty();
        let events = manager.handle_state_change(NetworkType::Wifi, NetworkState::Disabled);

        assert_eq!(
            events,
            vec![LinkEvent::Disconnected { interface: interface_for(NetworkType::Wifi) }]
        );
        assert!(manager.backend().enabled.contains(NetworkMask::ETHERNET));
        assert_eq!(manager.state(), LinkState::NoNetwork);

        manager.backend_mut().connected = NetworkMask::ETHERNET;
        let events = manager.handle_state_change(NetworkType::Ethernet, NetworkState::Enabled);

        assert_eq!(
            events,
            vec![LinkEvent::Connected { interface: interface_for(NetworkType::Ethernet) }]
        );
        assert_eq!(manager.active_network(), Some(NetworkType::Ethernet));
    }

    #[test]
    fn failover_picks_up_already_connected_network() {
        let mut manager = manager();
        manager.handle_state_change(NetworkType::Wifi, NetworkState::Enabled);

        manager.backend_mut().connected = NetworkMask::ETHERNET;
        let events = manager.handle_state_change(NetworkType::Wifi, NetworkState::Unknown);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LinkEvent::Disconnected { .. }));
        assert_eq!(
            events[1],
            LinkEvent::Connected { interface: interface_for(NetworkType::Ethernet) }
        );
        assert_eq!(manager.active_network(), Some(NetworkType::Ethernet));
    }

    #[test]
    fn unconfigured_network_is_ignored() {
        let mut manager = manager();
        let events = manager.handle_state_change(NetworkType::Cellular, NetworkState::Enabled);
        assert!(events.is_empty());
        assert_eq!(manager.state(), LinkState::NoNetwork);
    }

    #[test]
    fn select_initial_adopts_connected_network_by_priority() {
        let mut manager = manager();
        manager.backend_mut().connected = NetworkMask::WIFI | NetworkMask::ETHERNET;

        let interface = manager.select_initial();
        assert_eq!(interface, Some(interface_for(NetworkType::Wifi)));
        assert_eq!(manager.active_network(), Some(NetworkType::Wifi));
    }

    #[test]
    fn select_initial_without_connection() {
        let mut manager = manager();
        assert_eq!(manager.select_initial(), None);
        assert_eq!(manager.state(), LinkState::NoNetwork);
    }

    #[test]
    fn subscribers_filtered_by_mask() {
        let mut manager = manager();
        let wifi_only = manager.subscribe(NetworkMask::WIFI);
        let all = manager.subscribe(NetworkMask::all());

        let event = LinkEvent::Connected { interface: interface_for(NetworkType::Ethernet) };
        assert_eq!(manager.subscribers_for(&event), vec![all]);

        let event = LinkEvent::Connected { interface: interface_for(NetworkType::Wifi) };
        assert_eq!(manager.subscribers_for(&event), vec![wifi_only, all]);
    }

    #[test]
    fn unsubscribed_ids_get_no_events() {
        let mut manager = manager();
        let wifi = manager.subscribe(NetworkMask::WIFI);
        let all = manager.subscribe(NetworkMask::all());

        assert!(manager.unsubscribe(wifi));
        assert!(!manager.unsubscribe(wifi));

        let event = LinkEvent::Connected { interface: interface_for(NetworkType::Wifi) };
        assert_eq!(manager.subscribers_for(&event), vec![all]);
    }

    #[test]
    fn credentials_debug_redacts_key() {
        let credentials = Credentials {
            client_cert: Some("cert.pem".to_string()),
            private_key: Some("secret-key.pem".to_string()),
            root_ca: None,
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret-key"));
    }
}
