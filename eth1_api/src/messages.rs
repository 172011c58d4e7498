/// Execution connection summary reported alongside other node statistics.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct BeaconNodeStats {
    pub sync_eth1_fallback_configured: bool,
    pub sync_eth1_fallback_connected: bool,
    pub sync_eth1_connected: bool,
}
