//! Memory controller.
//!
//! Arbitrates every thread's load/store unit onto a small number of
//! channels feeding the data-memory port. Each channel runs its own FSM;
//! the shared served bitmap is the mutual-exclusion record that stops two
//! channels from grabbing the same consumer. Arbitration is a deterministic
//! priority scan: lower consumer indices win a free channel, and channels
//! evaluate in ascending index order, so the whole simulation is
//! reproducible cycle for cycle.
//!
//! A channel's service walk for one request:
//! claim (Idle) → port access + raise consumer ready (Processing) →
//! wait for the consumer to drop its valids (Waiting) → release the ready
//! and the bitmap bit (Completion).

use crate::memory::DataMemory;
use tracing::trace;

/// Default number of channels between the LSUs and the memory port.
pub const DEFAULT_CHANNELS: usize = 2;

/// A consumer's registered request lines. At most one valid is high.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemRequest {
    pub read_valid: bool,
    pub write_valid: bool,
    pub addr: u8,
    pub data: u8,
}

impl MemRequest {
    pub fn pending(&self) -> bool {
        self.read_valid || self.write_valid
    }
}

/// The controller's registered answer lines back to one consumer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemReply {
    pub ready: bool,
    pub data: u8,
}

/// Channel FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Processing,
    Waiting,
    Completion,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Idle => write!(f, "IDLE"),
            ChannelState::Processing => write!(f, "PROCESSING"),
            ChannelState::Waiting => write!(f, "WAITING"),
            ChannelState::Completion => write!(f, "COMPLETION"),
        }
    }
}

#[derive(Debug, Clone)]
struct Channel {
    state: ChannelState,
    /// Claim record: which consumer this channel is servicing.
    consumer: Option<usize>,
    /// The request latched at claim time and forwarded to the memory port.
    request: MemRequest,
}

impl Channel {
    fn new() -> Channel {
        Channel { state: ChannelState::Idle, consumer: None, request: MemRequest::default() }
    }
}

pub struct MemoryController {
    channels: Vec<Channel>,
    served: Vec<bool>,
    replies: Vec<MemReply>,
    reads_served: u64,
    writes_served: u64,
}

impl MemoryController {
    pub fn new(num_consumers: usize, num_channels: usize) -> MemoryController {
        MemoryController {
            channels: (0..num_channels).map(|_| Channel::new()).collect(),
            served: vec![false; num_consumers],
            replies: vec![MemReply::default(); num_consumers],
            reads_served: 0,
            writes_served: 0,
        }
    }

    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            *ch = Channel::new();
        }
        self.served.fill(false);
        self.replies.fill(MemReply::default());
        self.reads_served = 0;
        self.writes_served = 0;
    }

    /// Registered answer lines for consumer `j`.
    pub fn reply(&self, j: usize) -> MemReply {
        self.replies[j]
    }

    pub fn reads_served(&self) -> u64 {
        self.reads_served
    }

    pub fn writes_served(&self) -> u64 {
        self.writes_served
    }

    /// The served bitmap, one bit per consumer.
    pub fn served_bitmap(&self) -> &[bool] {
        &self.served
    }

    /// Per-channel (state, claimed consumer) view for metrics and tests.
    pub fn channel_claims(&self) -> Vec<(ChannelState, Option<usize>)> {
        self.channels.iter().map(|ch| (ch.state, ch.consumer)).collect()
    }

    /// One clock edge over all channels, ascending index order. `requests`
    /// is the pre-tick snapshot of every consumer's request lines; the
    /// memory port itself is always ready.
    pub fn tick(&mut self, requests: &[MemRequest], mem: &mut DataMemory) {
        for ci in 0..self.channels.len() {
            let state = self.channels[ci].state;
            match state {
                ChannelState::Idle => {
                    // Priority scan for the first unserved requester.
                    let hit = (0..requests.len())
                        .find(|&j| !self.served[j] && requests[j].pending());
                    if let Some(j) = hit {
                        self.served[j] = true;
                        self.channels[ci].consumer = Some(j);
                        self.channels[ci].request = requests[j];
                        self.channels[ci].state = ChannelState::Processing;
                        trace!(channel = ci, consumer = j, addr = requests[j].addr, "claim");
                    }
                }
                ChannelState::Processing => {
                    let req = self.channels[ci].request;
                    if let Some(j) = self.channels[ci].consumer {
                        if req.read_valid {
                            self.replies[j].data = mem.read(req.addr);
                            self.reads_served += 1;
                        } else if req.write_valid {
                            mem.write(req.addr, req.data);
                            self.writes_served += 1;
                        }
                        self.replies[j].ready = true;
                        self.channels[ci].state = ChannelState::Waiting;
                        trace!(channel = ci, consumer = j, addr = req.addr, "served");
                    }
                }
                ChannelState::Waiting => {
                    if let Some(j) = self.channels[ci].consumer {
                        if !requests[j].pending() {
                            self.channels[ci].state = ChannelState::Completion;
                        }
                    }
                }
                ChannelState::Completion => {
                    if let Some(j) = self.channels[ci].consumer.take() {
                        self.replies[j].ready = false;
                        self.served[j] = false;
                    }
                    self.channels[ci].state = ChannelState::Idle;
                }
            }
        }
    }
}
