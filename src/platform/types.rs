//! Network model records exchanged with the controller platform

use crate::protocol::{Ipv4Prefix, MacAddr};
use crate::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Identifier of a switching device, e.g. `of:0000000000000001`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortNumber(pub u64);

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device + port where a host, peer or the router attaches to the fabric
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectPoint {
    pub device: DeviceId,
    pub port: PortNumber,
}

impl ConnectPoint {
    pub fn new(device: impl Into<String>, port: u64) -> Self {
        Self {
            device: DeviceId::new(device),
            port: PortNumber(port),
        }
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.port)
    }
}

impl FromStr for ConnectPoint {
    type Err = Error;

    /// Parses `<device-id>/<port>`; the device id may itself contain `/`
    fn from_str(s: &str) -> Result<Self> {
        let (device, port) = s
            .rsplit_once('/')
            .ok_or_else(|| Error::Parse(format!("connect point '{s}' missing port")))?;
        if device.is_empty() {
            return Err(Error::Parse(format!("connect point '{s}' missing device")));
        }
        let port: u64 = port
            .parse()
            .map_err(|_| Error::Parse(format!("connect point '{s}' has invalid port")))?;
        Ok(ConnectPoint::new(device, port))
    }
}

/// Host known to the host-tracking service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub location: ConnectPoint,
}

/// Best route for a destination as resolved by the route service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub prefix: Ipv4Prefix,
    pub next_hop: Ipv4Addr,
}

/// Address configured on an interface, with the subnet it implies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub ip: Ipv4Addr,
    pub subnet: Ipv4Prefix,
}

impl FromStr for InterfaceAddress {
    type Err = Error;

    /// Parses `10.0.0.1/24` into ip `10.0.0.1`, subnet `10.0.0.0/24`
    fn from_str(s: &str) -> Result<Self> {
        let subnet: Ipv4Prefix = s.parse()?;
        let ip = s
            .split_once('/')
            .and_then(|(ip, _)| ip.parse().ok())
            .ok_or_else(|| Error::Parse(format!("invalid interface address '{s}'")))?;
        Ok(Self { ip, subnet })
    }
}

/// Logical L3 interface bound to a connect point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub connect_point: ConnectPoint,
    pub addresses: Vec<InterfaceAddress>,
    pub mac: Option<MacAddr>,
}

impl Interface {
    pub fn covers(&self, ip: Ipv4Addr) -> bool {
        self.addresses.iter().any(|a| a.subnet.contains(ip))
    }
}

/// Opaque handle of a submitted steering rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntentKey(pub u64);

impl fmt::Display for IntentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Frame punted to the controller and where it came in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    pub received_from: ConnectPoint,
    pub data: Vec<u8>,
}

/// Per-packet processing context shared by the packet processors
#[derive(Debug)]
pub struct PacketContext {
    inbound: InboundPacket,
    handled: bool,
}

impl PacketContext {
    pub fn new(inbound: InboundPacket) -> Self {
        Self {
            inbound,
            handled: false,
        }
    }

    pub fn inbound(&self) -> &InboundPacket {
        &self.inbound
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Mark handled so no later processor touches the packet
    pub fn block(&mut self) {
        self.handled = true;
    }
}

/// Frame the application asks the platform to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    pub output: ConnectPoint,
    pub data: Vec<u8>,
}
