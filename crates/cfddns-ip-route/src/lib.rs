// # Local-Route IP Source
//
// This crate provides an IP source that asks the host's routing table which
// local address it would use to reach a public probe address.
//
// ## How it works
//
// A UDP socket is bound to the unspecified address of the requested family
// and connected to `probe:53`. Connecting a datagram socket sends no packets;
// it only makes the kernel pick a route and a source address, which
// `local_addr()` then reports.
//
// ## Caveat
//
// Behind NAT this yields the private address of the outgoing interface, not
// the public one. It is the usual choice for IPv6, where hosts normally hold
// globally routable addresses.

use cfddns_core::traits::{AddressFamily, IpSource, ObservedAddress};
use cfddns_core::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Port used for the route lookup; nothing is ever sent to it
const PROBE_PORT: u16 = 53;

/// Route-table based IP source
#[derive(Debug, Clone)]
pub struct RouteIpSource {
    ipv4_probe: IpAddr,
    ipv6_probe: IpAddr,
}

impl RouteIpSource {
    /// Create a source with per-family probe addresses
    pub fn with_probes(ipv4_probe: IpAddr, ipv6_probe: IpAddr) -> Self {
        Self {
            ipv4_probe,
            ipv6_probe,
        }
    }

    fn probe(&self, family: AddressFamily) -> IpAddr {
        match family {
            AddressFamily::V4 => self.ipv4_probe,
            AddressFamily::V6 => self.ipv6_probe,
        }
    }

    /// Local address the kernel would use to reach `probe`
    async fn route_source(family: AddressFamily, probe: IpAddr) -> Result<IpAddr> {
        if AddressFamily::of(&probe) != family {
            return Err(Error::lookup(format!(
                "probe {} cannot be used to detect {}",
                probe, family
            )));
        }

        let unspecified: SocketAddr = match family {
            AddressFamily::V4 => (Ipv4Addr::UNSPECIFIED, 0).into(),
            AddressFamily::V6 => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(unspecified)
            .await
            .map_err(|e| Error::lookup(format!("failed to open {} socket: {}", family, e)))?;

        socket
            .connect((probe, PROBE_PORT))
            .await
            .map_err(|e| Error::lookup(format!("no {} route to {}: {}", family, probe, e)))?;

        let local = socket
            .local_addr()
            .map_err(|e| Error::lookup(format!("failed to read local {} address: {}", family, e)))?;

        if local.ip().is_unspecified() {
            return Err(Error::lookup(format!("no {} source address for {}", family, probe)));
        }

        Ok(local.ip())
    }
}

#[async_trait::async_trait]
impl IpSource for RouteIpSource {
    async fn current(&self, family: AddressFamily) -> Result<ObservedAddress> {
        let probe = self.probe(family);
        tracing::debug!("Looking up {} route source towards {}", family, probe);

        let ip = Self::route_source(family, probe).await?;
        Ok(ObservedAddress::new(ip))
    }

    fn source_name(&self) -> &'static str {
        "route"
    }
}
