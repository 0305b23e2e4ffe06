//! Network interface address lookup.

use crate::error::{PitempError, Result};
use sysinfo::Networks;

/// First address of interface `name` in CIDR notation, e.g. `192.168.1.20/24`.
///
/// IPv4 addresses are preferred. The interface list is refreshed on every
/// call so that DHCP renewals and reconnects show up on the next frame.
pub fn interface_ip(name: &str) -> Result<String> {
    let networks = Networks::new_with_refreshed_list();
    let data = networks
        .list()
        .get(name)
        .ok_or_else(|| PitempError::network_error(format!("interface {:?} not found", name)))?;

    let mut addresses: Vec<_> = data.ip_networks().iter().collect();
    addresses.sort_by_key(|net| !net.addr.is_ipv4());

    addresses
        .first()
        .map(|net| format!("{}/{}", net.addr, net.prefix))
        .ok_or_else(|| PitempError::network_error(format!("no addresses on {:?}", name)))
}

/// Address to display for `iface`: the address, or the lookup error text.
/// An empty interface name disables the lookup.
pub fn display_ip(iface: &str) -> Option<String> {
    if iface.is_empty() {
        return None;
    }
    Some(interface_ip(iface).unwrap_or_else(|e| e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_interface() {
        let result = interface_ip("no-such-iface0");
        assert!(matches!(result, Err(PitempError::Network(_))));
    }

    #[test]
    fn test_display_ip_disabled_for_empty_name() {
        assert_eq!(display_ip(""), None);
    }

    #[test]
    fn test_display_ip_reports_errors_as_text() {
        let shown = display_ip("no-such-iface0").unwrap();
        assert!(shown.contains("no-such-iface0"));
    }
}
