//! Client table.
//!
//! Clients live in an arena indexed by their handle. Released slots go onto a
//! min-heap so the next registration reuses the lowest free handle before the
//! arena grows.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use canmux_frame::{CanFrame, Filter};
use tracing::trace;

use crate::error::{DispatchError, Result};
use crate::queue::RxQueue;

/// Number of distinct handles (the handle space is 16-bit).
pub const MAX_CLIENTS: usize = u16::MAX as usize + 1;

/// Opaque identifier of a registered dispatch client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientHandle(u16);

impl ClientHandle {
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Client {
    filter: Filter,
    queue: RxQueue,
}

/// Handle-indexed table of (filter, queue) pairs.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    slots: Vec<Option<Client>>,
    free: BinaryHeap<Reverse<u16>>,
    active: usize,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client and return the lowest unused handle.
    pub fn register(&mut self, filter: Filter, buffer_size: usize) -> Result<ClientHandle> {
        let client = Client {
            filter,
            queue: RxQueue::new(buffer_size),
        };

        let handle = if let Some(Reverse(raw)) = self.free.pop() {
            let handle = ClientHandle(raw);
            self.slots[handle.index()] = Some(client);
            handle
        } else {
            if self.slots.len() >= MAX_CLIENTS {
                return Err(DispatchError::Overflow);
            }
            let raw = u16::try_from(self.slots.len()).map_err(|_| DispatchError::Overflow)?;
            self.slots.push(Some(client));
            ClientHandle(raw)
        };

        self.active += 1;
        Ok(handle)
    }

    /// Deregister a client. Its queued frames are dropped.
    pub fn remove(&mut self, handle: ClientHandle) -> Result<()> {
        let slot = self
            .slots
            .get_mut(handle.index())
            .ok_or(DispatchError::NotFound(handle))?;
        if slot.take().is_none() {
            return Err(DispatchError::NotFound(handle));
        }

        self.free.push(Reverse(handle.raw()));
        self.active -= 1;
        Ok(())
    }

    pub fn contains(&self, handle: ClientHandle) -> bool {
        matches!(self.slots.get(handle.index()), Some(Some(_)))
    }

    pub fn set_filter(&mut self, handle: ClientHandle, filter: Filter) -> Result<()> {
        self.client_mut(handle)?.filter = filter;
        Ok(())
    }

    pub fn filter(&self, handle: ClientHandle) -> Result<Filter> {
        match self.slots.get(handle.index()) {
            Some(Some(client)) => Ok(client.filter),
            _ => Err(DispatchError::NotFound(handle)),
        }
    }

    pub fn queue_mut(&mut self, handle: ClientHandle) -> Result<&mut RxQueue> {
        Ok(&mut self.client_mut(handle)?.queue)
    }

    /// Copy `frame` into the queue of every client whose filter accepts it.
    ///
    /// Push failures only latch in the affected queue's status. Returns the
    /// number of queues the frame was stored in.
    pub fn fan_out(&mut self, frame: &CanFrame) -> usize {
        let mut delivered = 0usize;
        for (index, client) in self.slots.iter_mut().enumerate() {
            let Some(client) = client else {
                continue;
            };
            if !client.filter.does_pass(frame) {
                continue;
            }
            match client.queue.push(*frame) {
                Ok(()) => delivered += 1,
                Err(err) => trace!(client = index, %frame, %err, "frame dropped"),
            }
        }
        delivered
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    fn client_mut(&mut self, handle: ClientHandle) -> Result<&mut Client> {
        self.slots
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(DispatchError::NotFound(handle))
    }
}
