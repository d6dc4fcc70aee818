use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::layer::{eth, Result};
use crate::nic::Link;
use crate::wire::{ArpOperation, ArpRepr, EthernetAddress};

/// The address cache and resolver of one adapter.
///
/// Bindings are learned from every ARP packet observed and never expire. At most one resolution
/// is in flight at any time, concurrent callers of [`resolve`] wait for their turn.
///
/// [`resolve`]: #method.resolve
pub struct Resolver {
    link: Arc<dyn Link>,
    table: Mutex<HashMap<Ipv4Addr, EthernetAddress>>,
    /// Serializes callers of `resolve`.
    resolving: Mutex<()>,
    pending: Mutex<Pending>,
    answered: Condvar,
}

#[derive(Default)]
struct Pending {
    target: Option<Ipv4Addr>,
    answer: Option<EthernetAddress>,
}

impl Resolver {
    /// How long `resolve` waits for a reply to its probe.
    pub const TIMEOUT: Duration = Duration::from_millis(1000);

    /// Create a resolver with an empty cache, sending through `link`.
    pub fn new(link: Arc<dyn Link>) -> Self {
        Resolver {
            link,
            table: Mutex::new(HashMap::new()),
            resolving: Mutex::new(()),
            pending: Mutex::new(Pending::default()),
            answered: Condvar::new(),
        }
    }

    /// Insert or overwrite a binding.
    pub fn add(&self, ip: Ipv4Addr, mac: EthernetAddress) {
        let updated = match self.table.lock().entry(ip) {
            Entry::Occupied(mut entry) => {
                entry.insert(mac);
                true
            },
            Entry::Vacant(entry) => {
                entry.insert(mac);
                false
            },
        };

        if updated {
            self.link.trace(format_args!("ARP table item update: {} = {}", ip, mac));
        } else {
            self.link.trace(format_args!("ARP table item add: {} = {}", ip, mac));
        }
    }

    /// Remove the binding of `ip`.
    ///
    /// The unspecified address `0.0.0.0` removes all bindings.
    pub fn remove(&self, ip: Ipv4Addr) {
        if ip.is_unspecified() {
            return self.clear();
        }

        if self.table.lock().remove(&ip).is_some() {
            self.link.trace(format_args!("ARP table item remove: {}", ip));
        }
    }

    /// Remove all bindings.
    pub fn clear(&self) {
        self.table.lock().clear();
        self.link.trace(format_args!("ARP table clear"));
    }

    /// Query the cache, without sending anything.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<EthernetAddress> {
        self.table.lock().get(&ip).copied()
    }

    /// Resolve the hardware address of `target`.
    ///
    /// Answers from the cache when possible. Otherwise broadcasts a probe and blocks up to
    /// [`TIMEOUT`] for the reply, returning `None` if none arrived.
    ///
    /// [`TIMEOUT`]: #associatedconstant.TIMEOUT
    pub fn resolve(&self, target: Ipv4Addr) -> Option<EthernetAddress> {
        if let Some(mac) = self.lookup(target) {
            return Some(mac);
        }

        let _turn = self.resolving.lock();
        // A resolution we queued behind may have filled the cache.
        if let Some(mac) = self.lookup(target) {
            return Some(mac);
        }

        {
            let mut pending = self.pending.lock();
            pending.target = Some(target);
            pending.answer = None;
        }

        if let Err(err) = self.send_probe(target) {
            net_debug!("arp probe for {} not sent: {}", target, err);
        }

        let answer = {
            let mut pending = self.pending.lock();
            self.answered.wait_while_for(
                &mut pending,
                |pending| pending.answer.is_none(),
                Self::TIMEOUT);
            pending.target = None;
            pending.answer.take()
        };

        match answer {
            Some(mac) => self.link.trace(format_args!(
                "ARP Resolve: {} - SUCCESSFUL: {}", target, mac)),
            None => self.link.trace(format_args!(
                "ARP Resolve: {} - FAILED", target)),
        }

        answer
    }

    /// Broadcast our own binding.
    pub fn send_gratuitous(&self) -> Result<()> {
        let identity = self.link.identity();
        self.send(EthernetAddress::BROADCAST, &ArpRepr {
            operation: ArpOperation::Request,
            source_hardware_addr: identity.mac,
            source_protocol_addr: identity.ip,
            target_hardware_addr: EthernetAddress::UNSPECIFIED,
            target_protocol_addr: identity.ip,
        })?;
        self.link.trace(format_args!("ARP Gratuitus: {} {}", identity.ip, identity.mac));
        Ok(())
    }

    /// Broadcast a request for the hardware address of `target`.
    pub fn send_probe(&self, target: Ipv4Addr) -> Result<()> {
        let identity = self.link.identity();
        self.send(EthernetAddress::BROADCAST, &ArpRepr {
            operation: ArpOperation::Request,
            source_hardware_addr: identity.mac,
            source_protocol_addr: identity.ip,
            target_hardware_addr: EthernetAddress::BROADCAST,
            target_protocol_addr: target,
        })?;
        self.link.trace(format_args!("ARP Probe: {}", target));
        Ok(())
    }

    /// Send our binding to the given host.
    ///
    /// The Ethernet destination is the broadcast address regardless.
    pub fn send_reply(&self, dst_ip: Ipv4Addr, dst_mac: EthernetAddress) -> Result<()> {
        let identity = self.link.identity();
        self.send(EthernetAddress::BROADCAST, &ArpRepr {
            operation: ArpOperation::Reply,
            source_hardware_addr: identity.mac,
            source_protocol_addr: identity.ip,
            target_hardware_addr: dst_mac,
            target_protocol_addr: dst_ip,
        })?;
        self.link.trace(format_args!("ARP Reply: {} - {}", dst_mac, dst_ip));
        Ok(())
    }

    /// Handle a received ARP packet, from the dispatch thread.
    ///
    /// Learns the sender binding, completes a pending resolution and answers requests for our
    /// own address. Never blocks on a resolution.
    pub fn process_inbound(&self, arp: &ArpRepr) {
        let own_ip = self.link.identity().ip;
        self.link.trace(format_args!("ARP {:?}: {} looking for {}",
            arp.operation, arp.source_protocol_addr, arp.target_protocol_addr));

        self.add(arp.source_protocol_addr, arp.source_hardware_addr);

        match arp.operation {
            ArpOperation::Reply if arp.target_protocol_addr == own_ip => {
                let mut pending = self.pending.lock();
                if pending.target == Some(arp.source_protocol_addr) {
                    pending.answer = Some(arp.source_hardware_addr);
                    self.answered.notify_all();
                }
            },
            ArpOperation::Request if arp.target_protocol_addr == own_ip => {
                if let Err(err) = self.send_reply(arp.source_protocol_addr, arp.source_hardware_addr) {
                    net_debug!("arp reply to {} not sent: {}", arp.source_protocol_addr, err);
                }
            },
            _ => (),
        }
    }

    fn send(&self, dst_addr: EthernetAddress, arp: &ArpRepr) -> Result<()> {
        let frame = eth::arp_frame(&self.link.identity(), dst_addr, arp);
        self.link.send_frame(&frame)
    }
}
