//! Link adapter: flow control between the dispatcher and the link service.
//!
//! The link service (SPI slave to the command master) is an external
//! collaborator.  It talks to the control loop through two bounded
//! `embassy-sync` channels, so neither side ever blocks:
//!
//! ```text
//! ┌──────────────┐  command byte  ┌──────────────┐
//! │ Link service │───────────────▶│ Control loop │
//! │              │◀───────────────│              │
//! └──────────────┘  RequestNext   └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::ports::LinkPort;

/// Depth of the inbound command byte channel.
const CMD_DEPTH: usize = 4;

/// Depth of the outbound flow-control channel.
const REQ_DEPTH: usize = 4;

/// Control loop → link service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSignal {
    /// Ready for the next command byte.
    RequestNext,
}

/// Both directions of the link boundary.
pub struct LinkChannels {
    commands: Channel<CriticalSectionRawMutex, u8, CMD_DEPTH>,
    requests: Channel<CriticalSectionRawMutex, LinkSignal, REQ_DEPTH>,
}

impl Default for LinkChannels {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkChannels {
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            requests: Channel::new(),
        }
    }

    // ── Link-service side ─────────────────────────────────────

    /// Hand a received command byte to the control loop.
    /// Returns `false` if the loop is that far behind.
    pub fn deliver_command(&self, byte: u8) -> bool {
        self.commands.try_send(byte).is_ok()
    }

    pub fn take_request(&self) -> Option<LinkSignal> {
        self.requests.try_receive().ok()
    }

    // ── Control-loop side ─────────────────────────────────────

    pub fn next_command(&self) -> Option<u8> {
        self.commands.try_receive().ok()
    }
}

/// [`LinkPort`] that posts flow-control requests to the link service.
pub struct ChannelLink<'a> {
    channels: &'a LinkChannels,
    sent: u32,
    dropped: u32,
}

impl<'a> ChannelLink<'a> {
    pub fn new(channels: &'a LinkChannels) -> Self {
        Self {
            channels,
            sent: 0,
            dropped: 0,
        }
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// Requests lost because the link service was not draining.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl LinkPort for ChannelLink<'_> {
    fn request_next(&mut self) {
        if self.channels.requests.try_send(LinkSignal::RequestNext).is_ok() {
            self.sent = self.sent.wrapping_add(1);
        } else {
            self.dropped = self.dropped.wrapping_add(1);
            warn!("link: request channel full, request dropped ({} total)", self.dropped);
        }
    }
}
