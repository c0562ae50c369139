//! In-process network backend.
//!
//! Stands in for the platform network stack. An interface is *connected*
//! when it is both enabled (by the connectivity manager) and reachable (by
//! whoever drives the simulation through [`NetworkControl`]). Every
//! transition of that product is reported on the change channel, the way a
//! platform stack invokes its state-change callback.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use lockshadow_core::{
    NetworkBackend, NetworkChange, NetworkInterface, NetworkMask, NetworkState, NetworkType,
};
use tokio::sync::mpsc;

struct NetworkTable {
    interfaces: HashMap<NetworkType, NetworkInterface>,
    enabled: NetworkMask,
    reachable: NetworkMask,
    changes: Option<mpsc::UnboundedSender<NetworkChange>>,
}

impl NetworkTable {
    fn known(&self) -> NetworkMask {
        self.interfaces.keys().fold(NetworkMask::empty(), |mask, n| mask | n.mask())
    }

    fn emit(&self, networks: NetworkMask, state: NetworkState) {
        let Some(changes) = &self.changes else {
            return;
        };
        for network in NetworkType::ALL.into_iter().filter(|n| networks.contains(n.mask())) {
            tracing::debug!(%network, ?state, "network state change");
            let _ = changes.send(NetworkChange { network, state });
        }
    }
}

fn lock(table: &Mutex<NetworkTable>) -> MutexGuard<'_, NetworkTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated network stack handed to the connectivity manager.
pub struct SimulatedNetworks {
    table: Arc<Mutex<NetworkTable>>,
}

/// Drives reachability of the simulated networks.
#[derive(Clone)]
pub struct NetworkControl {
    table: Arc<Mutex<NetworkTable>>,
}

impl SimulatedNetworks {
    /// Backend serving `interfaces`, none of them reachable yet.
    pub fn new(
        interfaces: Vec<NetworkInterface>,
    ) -> (Self, NetworkControl, mpsc::UnboundedReceiver<NetworkChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let table = Arc::new(Mutex::new(NetworkTable {
            interfaces: interfaces.into_iter().map(|i| (i.network, i)).collect(),
            enabled: NetworkMask::empty(),
            reachable: NetworkMask::empty(),
            changes: Some(tx),
        }));
        (Self { table: Arc::clone(&table) }, NetworkControl { table }, rx)
    }
}

impl NetworkBackend for SimulatedNetworks {
    fn enable(&mut self, networks: NetworkMask) -> NetworkMask {
        let mut table = lock(&self.table);
        let requested = networks & table.known();
        let rising = requested - table.enabled;
        table.enabled |= requested;
        table.emit(rising & table.reachable, NetworkState::Enabled);
        table.enabled
    }

    fn disable(&mut self, networks: NetworkMask) {
        let mut table = lock(&self.table);
        let falling = table.enabled & networks;
        table.enabled -= networks;
        table.emit(falling & table.reachable, NetworkState::Disabled);
    }

    fn connected_networks(&self) -> NetworkMask {
        let table = lock(&self.table);
        table.enabled & table.reachable
    }

    fn interface(&self, network: NetworkType) -> Option<NetworkInterface> {
        lock(&self.table).interfaces.get(&network).cloned()
    }
}

impl NetworkControl {
    /// The network becomes reachable.
    pub fn bring_up(&self, network: NetworkType) {
        let mut table = lock(&self.table);
        if table.reachable.contains(network.mask()) {
            return;
        }
        table.reachable |= network.mask();
        if table.enabled.contains(network.mask()) {
            table.emit(network.mask(), NetworkState::Enabled);
        }
    }

    /// The network stops being reachable.
    pub fn take_down(&self, network: NetworkType) {
        let mut table = lock(&self.table);
        if !table.reachable.contains(network.mask()) {
            return;
        }
        table.reachable -= network.mask();
        if table.enabled.contains(network.mask()) {
            table.emit(network.mask(), NetworkState::Disabled);
        }
    }

    /// The stack stops reporting; the change channel closes.
    pub fn shut_down(&self) {
        lock(&self.table).changes = None;
    }

    /// Networks currently enabled.
    pub fn enabled(&self) -> NetworkMask {
        lock(&self.table).enabled
    }

    /// Networks currently connected.
    pub fn connected(&self) -> NetworkMask {
        let table = lock(&self.table);
        table.enabled & table.reachable
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use lockshadow_core::{ConnectionParams, Credentials};

    use super::*;

    pub(crate) fn interface_for(network: NetworkType) -> NetworkInterface {
        NetworkInterface {
            network,
            name: format!("{network}0"),
            connection: ConnectionParams { endpoint: format!("{network}.broker"), port: 8883 },
            credentials: Credentials::default(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<NetworkChange>) -> Vec<NetworkChange> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn connected_requires_enabled_and_reachable() {
        let (mut backend, control, mut rx) =
            SimulatedNetworks::new(vec![interface_for(NetworkType::Wifi)]);

        control.bring_up(NetworkType::Wifi);
        assert_eq!(backend.connected_networks(), NetworkMask::empty());
        assert!(drain(&mut rx).is_empty());

        backend.enable(NetworkMask::WIFI);
        assert_eq!(backend.connected_networks(), NetworkMask::WIFI);
        assert_eq!(drain(&mut rx), vec![NetworkChange {
            network: NetworkType::Wifi,
            state: NetworkState::Enabled,
        }]);
    }

    #[test]
    fn unknown_networks_cannot_be_enabled() {
        let (mut backend, _control, _rx) =
            SimulatedNetworks::new(vec![interface_for(NetworkType::Wifi)]);

        let enabled = backend.enable(NetworkMask::WIFI | NetworkMask::CELLULAR);
        assert_eq!(enabled, NetworkMask::WIFI);
        assert_eq!(backend.interface(NetworkType::Cellular), None);
    }

    #[test]
    fn take_down_reports_only_enabled_networks() {
        let (mut backend, control, mut rx) = SimulatedNetworks::new(vec![
            interface_for(NetworkType::Wifi),
            interface_for(NetworkType::Ethernet),
        ]);
        backend.enable(NetworkMask::WIFI);
        control.bring_up(NetworkType::Wifi);
        control.bring_up(NetworkType::Ethernet);
        drain(&mut rx);

        control.take_down(NetworkType::Ethernet);
        assert!(drain(&mut rx).is_empty());

        control.take_down(NetworkType::Wifi);
        assert_eq!(drain(&mut rx), vec![NetworkChange {
            network: NetworkType::Wifi,
            state: NetworkState::Disabled,
        }]);
    }
}
