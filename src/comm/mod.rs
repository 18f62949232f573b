// src/comm/mod.rs

//! Point-to-point messaging and collectives between partitions.
//!
//! - [`Communicator`] is the seam the scheduler talks through: non-blocking
//!   tagged sends and receives plus the handful of collectives the plan
//!   construction and buffer negotiation need.
//! - [`mailbox`] layers retryable send queues and a tag-keyed inbox on top.
//! - [`channel`] is an in-process communicator over bounded tokio channels,
//!   one endpoint per partition.

pub mod channel;
pub mod mailbox;

pub use channel::{ChannelComm, channel_cluster};
pub use mailbox::{InboxKey, Mailbox};

use crate::errors::Result;
use crate::types::{CellIndex, LocationId};

/// Identifies one message part of one angle set's traffic.
///
/// `round` is the sweep counter, so data for the next sweep never aliases
/// data that is still owed for the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageTag {
    pub source: LocationId,
    pub destination: LocationId,
    pub round: u64,
    pub angle_set: usize,
    pub part: usize,
    /// Carries data for a cycle-broken (lagged) dependency.
    pub delayed: bool,
}

/// Downwind values on one face for one angle, keyed from the producer's side.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRecord {
    pub cell_local_id: CellIndex,
    pub face_index: usize,
    pub angle_index: usize,
    /// One value per energy group.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FluxMessage {
    pub tag: MessageTag,
    pub records: Vec<FaceRecord>,
}

/// Result of a non-blocking send attempt.
#[derive(Debug)]
pub enum SendOutcome {
    Sent,
    /// The transport is full; the message is handed back for a later retry.
    Pending(FluxMessage),
}

/// Message-passing endpoint owned by exactly one partition.
///
/// Point-to-point calls never block. Collectives must be entered by every
/// location in the same order.
pub trait Communicator: Send {
    fn location_id(&self) -> LocationId;
    fn num_locations(&self) -> usize;

    fn try_send(&mut self, message: FluxMessage) -> Result<SendOutcome>;
    fn try_recv(&mut self) -> Result<Option<FluxMessage>>;

    /// Every location contributes a list; all receive all lists by location.
    fn all_gather_ids(&mut self, values: Vec<usize>) -> Result<Vec<Vec<usize>>>;
    fn all_reduce_max_f64(&mut self, value: f64) -> Result<f64>;
    fn barrier(&mut self) -> Result<()>;

    fn all_reduce_max(&mut self, value: usize) -> Result<usize> {
        let all = self.all_gather_ids(vec![value])?;
        Ok(all.into_iter().flatten().max().unwrap_or(value))
    }

    /// Mark a clean shutdown. Endpoints dropped without it may abort peers.
    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}
