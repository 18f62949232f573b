// src/comm/mailbox.rs

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::trace;

use crate::comm::{Communicator, FluxMessage, SendOutcome};
use crate::errors::Result;
use crate::types::LocationId;

/// Inbox slot: all parts one source sent for one angle set in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InboxKey {
    pub angle_set: usize,
    pub round: u64,
    pub source: LocationId,
    pub delayed: bool,
}

impl InboxKey {
    fn of(message: &FluxMessage) -> Self {
        let tag = &message.tag;
        Self {
            angle_set: tag.angle_set,
            round: tag.round,
            source: tag.source,
            delayed: tag.delayed,
        }
    }
}

/// Non-blocking message layer owned by the scheduler.
///
/// Sends that the transport refuses are queued per `(angle set, delayed)`
/// and retried in order by [`Mailbox::flush`]. Received messages are filed
/// by [`InboxKey`] until the owning angle set takes them.
#[derive(Debug)]
pub struct Mailbox<C> {
    comm: C,
    outbox: HashMap<(usize, bool), VecDeque<FluxMessage>>,
    inbox: HashMap<InboxKey, Vec<FluxMessage>>,
    activity: u64,
}

impl<C: Communicator> Mailbox<C> {
    pub fn new(comm: C) -> Self {
        Self {
            comm,
            outbox: HashMap::new(),
            inbox: HashMap::new(),
            activity: 0,
        }
    }

    pub fn location_id(&self) -> LocationId {
        self.comm.location_id()
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn comm_mut(&mut self) -> &mut C {
        &mut self.comm
    }

    pub fn into_comm(self) -> C {
        self.comm
    }

    /// Monotonic count of messages moved in either direction.
    pub fn activity(&self) -> u64 {
        self.activity
    }

    /// Drain everything the transport has delivered into the inbox.
    pub fn poll(&mut self) -> Result<usize> {
        let mut received = 0;
        while let Some(message) = self.comm.try_recv()? {
            trace!(tag = ?message.tag, records = message.records.len(), "received");
            self.inbox
                .entry(InboxKey::of(&message))
                .or_default()
                .push(message);
            received += 1;
        }
        self.activity += received as u64;
        Ok(received)
    }

    pub fn take(&mut self, key: &InboxKey) -> Vec<FluxMessage> {
        self.inbox.remove(key).unwrap_or_default()
    }

    /// Send now if possible, otherwise queue behind earlier pending sends.
    pub fn post(&mut self, message: FluxMessage) -> Result<()> {
        let key = (message.tag.angle_set, message.tag.delayed);
        let queued = self.outbox.get(&key).is_some_and(|q| !q.is_empty());
        if queued {
            self.outbox.entry(key).or_default().push_back(message);
            return Ok(());
        }
        match self.comm.try_send(message)? {
            SendOutcome::Sent => self.activity += 1,
            SendOutcome::Pending(message) => {
                self.outbox.entry(key).or_default().push_back(message);
            }
        }
        Ok(())
    }

    /// Retry queued sends for one angle set; returns how many remain.
    pub fn flush(&mut self, angle_set: usize, delayed: bool) -> Result<usize> {
        let Some(queue) = self.outbox.get_mut(&(angle_set, delayed)) else {
            return Ok(0);
        };
        while let Some(message) = queue.pop_front() {
            match self.comm.try_send(message)? {
                SendOutcome::Sent => self.activity += 1,
                SendOutcome::Pending(message) => {
                    queue.push_front(message);
                    break;
                }
            }
        }
        Ok(queue.len())
    }

    pub fn pending_sends(&self, angle_set: usize, delayed: bool) -> usize {
        self.outbox
            .get(&(angle_set, delayed))
            .map_or(0, VecDeque::len)
    }

    /// Destinations with queued sends for `angle_set`, ascending.
    pub fn pending_destinations(&self, angle_set: usize) -> Vec<LocationId> {
        let mut out = BTreeSet::new();
        for delayed in [false, true] {
            if let Some(q) = self.outbox.get(&(angle_set, delayed)) {
                out.extend(q.iter().map(|m| m.tag.destination));
            }
        }
        out.into_iter().collect()
    }
}
