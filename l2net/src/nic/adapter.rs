use std::sync::Arc;

use crate::layer::{arp, eth, tcp, Result};
use super::{Identity, Link};

/// One link together with the protocol state bound to its addresses.
///
/// Owns the address resolver and the TCP endpoint of the link and routes received frames to
/// them.
pub struct Adapter {
    name: String,
    link: Arc<dyn Link>,
    resolver: Arc<arp::Resolver>,
    endpoint: Arc<tcp::Endpoint>,
}

impl Adapter {
    /// Create an adapter on a link, with an empty address cache and no connections.
    pub fn new(name: impl Into<String>, link: Arc<dyn Link>) -> Self {
        let resolver = Arc::new(arp::Resolver::new(Arc::clone(&link)));
        let endpoint = Arc::new(tcp::Endpoint::new());
        Adapter {
            name: name.into(),
            link,
            resolver,
            endpoint,
        }
    }

    /// The name under which the adapter is registered.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The addresses of the underlying link.
    pub fn identity(&self) -> Identity {
        self.link.identity()
    }

    /// The underlying link.
    pub fn link(&self) -> &Arc<dyn Link> {
        &self.link
    }

    /// The address resolver of this adapter.
    pub fn resolver(&self) -> &Arc<arp::Resolver> {
        &self.resolver
    }

    /// The TCP endpoint owning the connections of this adapter.
    pub fn endpoint(&self) -> &Arc<tcp::Endpoint> {
        &self.endpoint
    }

    /// Broadcast our own binding with a gratuitous ARP.
    pub fn announce(&self) -> Result<()> {
        self.resolver.send_gratuitous()
    }

    /// Handle one received frame.
    ///
    /// Called by the transport from its dispatch thread. Frames that fail to parse are dropped.
    pub fn dispatch(&self, frame: &[u8]) {
        match eth::classify(frame) {
            Ok(eth::Inbound::Arp(arp)) => self.resolver.process_inbound(&arp),
            Ok(eth::Inbound::Tcp(segment)) => self.endpoint.dispatch(&segment),
            Ok(eth::Inbound::Other) => (),
            Err(err) => net_trace!("{}: dropping frame: {}", self.name, err),
        }
    }
}
