//! Implementation of a software link that keeps what was sent.
use core::fmt;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::layer::{Error, Result};
use super::{Identity, Link};

/// A software link.
///
/// Every transmitted frame is queued until taken out with [`pop_sent`] or [`wait_sent`], every
/// trace message is stored as a line. The link can be taken offline, after which transmissions
/// fail as a real interface would when it goes down.
///
/// [`pop_sent`]: #method.pop_sent
/// [`wait_sent`]: #method.wait_sent
pub struct Loopback {
    identity: Identity,
    state: Mutex<State>,
    sent_cond: Condvar,
}

#[derive(Default)]
struct State {
    sent: VecDeque<Vec<u8>>,
    sent_total: usize,
    traces: Vec<String>,
    offline: bool,
}

impl Loopback {
    /// Create an online link with the given addresses.
    pub fn new(identity: Identity) -> Self {
        Loopback {
            identity,
            state: Mutex::new(State::default()),
            sent_cond: Condvar::new(),
        }
    }

    /// Make all following transmissions fail, or succeed again.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Take the oldest frame that was sent and not yet taken.
    pub fn pop_sent(&self) -> Option<Vec<u8>> {
        self.state.lock().sent.pop_front()
    }

    /// Take the oldest sent frame, waiting up to `timeout` for one to arrive.
    pub fn wait_sent(&self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(frame) = state.sent.pop_front() {
                return Some(frame);
            }
            if self.sent_cond.wait_until(&mut state, deadline).timed_out() {
                return state.sent.pop_front();
            }
        }
    }

    /// Drop all frames not yet taken.
    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    /// The number of frames successfully transmitted since creation.
    pub fn sent_count(&self) -> usize {
        self.state.lock().sent_total
    }

    /// A copy of all trace lines so far.
    pub fn traces(&self) -> Vec<String> {
        self.state.lock().traces.clone()
    }
}

impl Link for Loopback {
    fn send_frame(&self, frame: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(Error::Transmit);
        }
        state.sent.push_back(frame.to_vec());
        state.sent_total += 1;
        self.sent_cond.notify_all();
        Ok(())
    }

    fn identity(&self) -> Identity {
        self.identity
    }

    fn trace(&self, message: fmt::Arguments) {
        let line = message.to_string();
        net_debug!("{}", line);
        self.state.lock().traces.push(line);
    }
}
