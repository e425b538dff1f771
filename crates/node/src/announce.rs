// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer discovery through `EventPeer` announcements
//!
//! A node that starts listening appends `{id, addresses}` to the log. Every
//! other node that sees it connects to the first address, which is how a
//! mesh forms from a single seed connection.

use crate::identity::StoreIdentity;
use crate::peer::PeerManager;
use hb_core::store::{self, SELF_ANNOUNCEMENT_KEY};
use hb_core::{
    AnnouncedAddress, Announcement, AppendLog, Handler, KvStore, PeerAddress, StoreError,
};
use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use std::net::{IpAddr, SocketAddrV4};
use tracing::{debug, info, warn};

/// IPv4 addresses of every non-loopback interface
pub fn local_addresses() -> Vec<String> {
    let interfaces = match getifaddrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!(error = %e, "failed to list network interfaces");
            return Vec::new();
        }
    };

    let mut addresses: Vec<String> = interfaces
        .filter(|iface| !iface.flags.contains(InterfaceFlags::IFF_LOOPBACK))
        .filter_map(|iface| {
            let sin = iface.address.as_ref()?.as_sockaddr_in()?;
            Some(SocketAddrV4::from(*sin).ip().to_string())
        })
        .collect();
    addresses.dedup();
    addresses
}

/// Addresses to announce for a socket bound on `host`
pub fn reachable_addresses(host: &str, port: u16) -> Vec<AnnouncedAddress> {
    let unspecified = host
        .parse::<IpAddr>()
        .map(|ip| ip.is_unspecified())
        .unwrap_or(false);
    let ips = if unspecified {
        local_addresses()
    } else {
        vec![host.to_string()]
    };
    ips.into_iter()
        .map(|ip| AnnouncedAddress { ip, port })
        .collect()
}

/// True if `announcement` differs from the last one this store broadcast
pub async fn is_new<S: KvStore>(store: &S, announcement: &Announcement) -> Result<bool, StoreError> {
    let previous: Option<Announcement> = store::get_json(store, SELF_ANNOUNCEMENT_KEY).await?;
    Ok(previous.as_ref() != Some(announcement))
}

pub async fn remember<S: KvStore>(store: &S, announcement: &Announcement) -> Result<(), StoreError> {
    store::put_json(store, SELF_ANNOUNCEMENT_KEY, announcement).await
}

/// Listener connecting to every announced node other than this one
pub fn handler<S: KvStore, L: AppendLog>(
    identity: StoreIdentity<S>,
    peers: PeerManager<S, L>,
) -> Handler {
    Handler::immediate(move |payload| {
        let Some(announcement) = payload.parse::<Announcement>() else {
            debug!("ignoring malformed peer announcement");
            return;
        };
        let identity = identity.clone();
        let peers = peers.clone();
        tokio::spawn(async move {
            match identity.get().await {
                Ok(id) if id == announcement.id => return,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "cannot check announcement against identity");
                    return;
                }
            }
            let Some(first) = announcement.addresses.first() else {
                return;
            };
            let peer = PeerAddress::new(first.ip.clone(), first.port);
            debug!(id = %announcement.id, peer = %peer, "peer announced");
            if let Err(e) = peers.connect_background(peer).await {
                debug!(error = %e, "announced peer not connected");
            }
        });
    })
}

/// Start reconnecting to every peer of the persisted address book
pub async fn restore<S: KvStore, L: AppendLog>(peers: &PeerManager<S, L>) {
    let saved = match peers.saved_peers().await {
        Ok(saved) => saved,
        Err(e) => {
            warn!(error = %e, "failed to read address book");
            return;
        }
    };
    if !saved.is_empty() {
        info!(count = saved.len(), "reconnecting to saved peers");
    }
    for peer in saved {
        if let Err(e) = peers.connect_background(peer).await {
            debug!(error = %e, "saved peer not restored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_storage::MemoryStore;

    fn announcement(port: u16) -> Announcement {
        Announcement {
            id: "node-1".to_string(),
            addresses: vec![AnnouncedAddress {
                ip: "10.0.0.1".to_string(),
                port,
            }],
        }
    }

    #[tokio::test]
    async fn unchanged_announcement_is_not_new() {
        let store = MemoryStore::new();
        assert!(is_new(&store, &announcement(7400)).await.unwrap());

        remember(&store, &announcement(7400)).await.unwrap();
        assert!(!is_new(&store, &announcement(7400)).await.unwrap());
        assert!(is_new(&store, &announcement(7401)).await.unwrap());
    }

    #[test]
    fn explicit_host_is_announced_as_given() {
        assert_eq!(
            reachable_addresses("192.168.1.5", 9000),
            vec![AnnouncedAddress {
                ip: "192.168.1.5".to_string(),
                port: 9000
            }]
        );
    }

    #[test]
    fn unspecified_host_skips_loopback() {
        for address in reachable_addresses("0.0.0.0", 9000) {
            assert_ne!(address.ip, "127.0.0.1");
            assert_eq!(address.port, 9000);
        }
    }
}
