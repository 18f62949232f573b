// src/comm/channel.rs

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::warn;

use crate::comm::{Communicator, FluxMessage, SendOutcome};
use crate::errors::{Result, SweepError};
use crate::types::LocationId;

/// Build one connected endpoint per location.
///
/// Every location gets a bounded inbound channel of `capacity` messages;
/// a full channel surfaces as [`SendOutcome::Pending`].
pub fn channel_cluster(num_locations: usize, capacity: usize) -> Result<Vec<ChannelComm>> {
    if num_locations == 0 {
        return Err(SweepError::CommError(
            "a cluster needs at least one location".to_string(),
        ));
    }
    if capacity == 0 {
        return Err(SweepError::CommError(
            "channel capacity must be >= 1".to_string(),
        ));
    }

    let shared = Arc::new(Collectives::new(num_locations));
    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..num_locations).map(|_| mpsc::channel(capacity)).unzip();

    Ok(receivers
        .into_iter()
        .enumerate()
        .map(|(location, receiver)| ChannelComm {
            location,
            senders: senders.clone(),
            receiver,
            shared: Arc::clone(&shared),
            finalized: false,
        })
        .collect())
}

#[derive(Debug, Clone)]
enum Contribution {
    Ids(Vec<usize>),
    Real(f64),
}

#[derive(Debug)]
struct RendezvousState {
    generation: u64,
    arrived: usize,
    aborted: bool,
}

/// Shared state for collectives: a reusable barrier and one slot per location.
#[derive(Debug)]
struct Collectives {
    size: usize,
    state: Mutex<RendezvousState>,
    cv: Condvar,
    slots: Mutex<Vec<Option<Contribution>>>,
}

impl Collectives {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(RendezvousState {
                generation: 0,
                arrived: 0,
                aborted: false,
            }),
            cv: Condvar::new(),
            slots: Mutex::new(vec![None; size]),
        }
    }

    fn wait(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(poisoned)?;
        if state.aborted {
            return Err(aborted());
        }
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.cv.notify_all();
            return Ok(());
        }
        let generation = state.generation;
        while state.generation == generation && !state.aborted {
            state = self.cv.wait(state).map_err(poisoned)?;
        }
        if state.generation != generation {
            Ok(())
        } else {
            Err(aborted())
        }
    }

    fn abort(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.aborted = true;
        }
        self.cv.notify_all();
    }

    fn is_aborted(&self) -> bool {
        self.state.lock().map(|s| s.aborted).unwrap_or(true)
    }

    fn exchange(&self, location: LocationId, value: Contribution) -> Result<Vec<Contribution>> {
        self.slots.lock().map_err(poisoned)?[location] = Some(value);
        self.wait()?;
        let all = self
            .slots
            .lock()
            .map_err(poisoned)?
            .iter()
            .map(|s| {
                s.clone()
                    .ok_or_else(|| SweepError::CommError("collective slot left empty".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        // Nobody may overwrite a slot before everyone has read it.
        self.wait()?;
        Ok(all)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> SweepError {
    SweepError::CommError("collective state poisoned by a panicking location".to_string())
}

fn aborted() -> SweepError {
    SweepError::CommError("cluster aborted by a failing location".to_string())
}

/// In-process endpoint for one location.
pub struct ChannelComm {
    location: LocationId,
    senders: Vec<mpsc::Sender<FluxMessage>>,
    receiver: mpsc::Receiver<FluxMessage>,
    shared: Arc<Collectives>,
    finalized: bool,
}

impl fmt::Debug for ChannelComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelComm")
            .field("location", &self.location)
            .field("num_locations", &self.senders.len())
            .finish_non_exhaustive()
    }
}

impl Communicator for ChannelComm {
    fn location_id(&self) -> LocationId {
        self.location
    }

    fn num_locations(&self) -> usize {
        self.senders.len()
    }

    fn try_send(&mut self, message: FluxMessage) -> Result<SendOutcome> {
        let dest = message.tag.destination;
        let Some(sender) = self.senders.get(dest) else {
            return Err(SweepError::CommError(format!(
                "destination {dest} out of range for {} locations",
                self.senders.len()
            )));
        };
        match sender.try_send(message) {
            Ok(()) => Ok(SendOutcome::Sent),
            Err(TrySendError::Full(message)) => Ok(SendOutcome::Pending(message)),
            Err(TrySendError::Closed(_)) => Err(SweepError::CommError(format!(
                "location {dest} has shut down"
            ))),
        }
    }

    fn try_recv(&mut self) -> Result<Option<FluxMessage>> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                if self.shared.is_aborted() {
                    Err(aborted())
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn all_gather_ids(&mut self, values: Vec<usize>) -> Result<Vec<Vec<usize>>> {
        self.shared
            .exchange(self.location, Contribution::Ids(values))?
            .into_iter()
            .map(|c| match c {
                Contribution::Ids(v) => Ok(v),
                Contribution::Real(_) => Err(mismatched()),
            })
            .collect()
    }

    fn all_reduce_max_f64(&mut self, value: f64) -> Result<f64> {
        self.shared
            .exchange(self.location, Contribution::Real(value))?
            .into_iter()
            .try_fold(f64::NEG_INFINITY, |acc, c| match c {
                Contribution::Real(v) => Ok(acc.max(v)),
                Contribution::Ids(_) => Err(mismatched()),
            })
    }

    fn barrier(&mut self) -> Result<()> {
        self.shared.wait()
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized = true;
        Ok(())
    }
}

fn mismatched() -> SweepError {
    SweepError::CommError("locations entered different collectives".to_string())
}

impl Drop for ChannelComm {
    fn drop(&mut self) {
        if !self.finalized {
            warn!(location = self.location, "endpoint dropped without finalize; aborting cluster");
            self.shared.abort();
        }
    }
}
