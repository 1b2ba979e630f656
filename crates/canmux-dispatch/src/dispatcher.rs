use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canmux_frame::{CanFrame, Filter};
use canmux_transport::CanTransport;
use tracing::{debug, trace, warn};

use crate::error::{DispatchError, Result};
use crate::queue::QueueStatus;
use crate::registry::{ClientHandle, ClientRegistry};

/// Fans frames from one transport out to many filtered client queues.
///
/// The dispatcher is shared by reference (`Arc<Dispatcher>`) between every
/// consumer of the transport. All methods take `&self`.
pub struct Dispatcher {
    transport: Arc<dyn CanTransport>,
    clients: Mutex<ClientRegistry>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn CanTransport>) -> Self {
        Self {
            transport,
            clients: Mutex::new(ClientRegistry::new()),
        }
    }

    /// The transport this dispatcher reads from.
    pub fn transport(&self) -> &Arc<dyn CanTransport> {
        &self.transport
    }

    /// Register a client with its own bounded queue.
    ///
    /// Without a filter the client receives every frame.
    pub fn register_client(&self, filter: Option<Filter>, buffer_size: usize) -> Result<ClientHandle> {
        let handle = self
            .lock()
            .register(filter.unwrap_or_default(), buffer_size)?;
        debug!(transport = self.transport.name(), client = %handle, buffer_size, "client registered");
        Ok(handle)
    }

    /// Deregister a client. The handle is invalid from now on.
    pub fn remove_client(&self, handle: ClientHandle) -> Result<()> {
        self.lock().remove(handle)?;
        debug!(transport = self.transport.name(), client = %handle, "client removed");
        Ok(())
    }

    /// Replace a client's filter. Takes effect on the next dispatch.
    pub fn set_filter(&self, handle: ClientHandle, filter: Filter) -> Result<()> {
        self.lock().set_filter(handle, filter)
    }

    /// Drain the transport and distribute every frame to the matching queues.
    ///
    /// Reading and fanning out happen under one lock, so frames reach every
    /// queue in transport order even with several threads dispatching. The
    /// returned count is informational only: another thread may already have
    /// drained the frames this call was meant for.
    pub fn dispatch_incoming(&self) -> usize {
        let mut clients = self.lock();
        let mut count = 0usize;

        loop {
            match self.transport.read_one_frame() {
                Ok(Some(frame)) => {
                    let delivered = clients.fan_out(&frame);
                    trace!(%frame, delivered, "dispatched");
                    count += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(transport = self.transport.name(), %err, "transport read failed");
                    break;
                }
            }
        }

        count
    }

    /// Pop the oldest frame from a client's queue.
    pub fn read_from_queue(&self, handle: ClientHandle) -> Result<CanFrame> {
        self.lock().queue_mut(handle)?.pop()
    }

    /// Dispatch, then pop from the client's queue.
    ///
    /// An empty queue is reported as `NoNewMessage`.
    pub fn read_one(&self, handle: ClientHandle) -> Result<CanFrame> {
        self.dispatch_incoming();
        match self.read_from_queue(handle) {
            Err(DispatchError::WouldBlock) => Err(DispatchError::NoNewMessage),
            other => other,
        }
    }

    /// Read exactly one frame straight from the transport.
    ///
    /// The frame is still fanned out to every matching client before it is
    /// returned, so registered consumers do not miss it.
    pub fn read_one_no_handle(&self) -> Result<CanFrame> {
        let mut clients = self.lock();
        match self.transport.read_one_frame()? {
            Some(frame) => {
                clients.fan_out(&frame);
                Ok(frame)
            }
            None => Err(DispatchError::NoNewMessage),
        }
    }

    /// Drop every frame queued for a client.
    pub fn clear_queue(&self, handle: ClientHandle) -> Result<()> {
        self.lock().queue_mut(handle)?.clear();
        Ok(())
    }

    pub fn queue_len(&self, handle: ClientHandle) -> Result<usize> {
        Ok(self.lock().queue_mut(handle)?.len())
    }

    /// Latched push status of a client's queue; reading resets it.
    pub fn queue_status(&self, handle: ClientHandle) -> Result<QueueStatus> {
        Ok(self.lock().queue_mut(handle)?.take_status())
    }

    /// Change a client's queue bound, truncating if needed.
    pub fn set_queue_size(&self, handle: ClientHandle, max_size: usize) -> Result<()> {
        self.lock().queue_mut(handle)?.set_max_size(max_size);
        Ok(())
    }

    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    /// Transmit through the underlying transport.
    pub fn send(&self, frame: &CanFrame) -> Result<()> {
        self.transport.send_one_frame(frame)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ClientRegistry> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.transport.name())
            .field("clients", &self.client_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use canmux_transport::{TransportError, VirtualChannel};

    use super::*;

    fn frame(id: u32) -> CanFrame {
        CanFrame::new(id, false, &[]).unwrap()
    }

    fn setup() -> (Arc<VirtualChannel>, Dispatcher) {
        let channel = Arc::new(VirtualChannel::new("vcan-test"));
        let dispatcher = Dispatcher::new(channel.clone());
        (channel, dispatcher)
    }

    fn drain(dispatcher: &Dispatcher, handle: ClientHandle) -> Vec<u32> {
        let mut ids = Vec::new();
        while let Ok(frame) = dispatcher.read_from_queue(handle) {
            ids.push(frame.id());
        }
        ids
    }

    #[test]
    fn fan_out_end_to_end() {
        let (channel, dispatcher) = setup();
        let a = dispatcher
            .register_client(Some(Filter::pass_one_id(0x100, false, false)), 16)
            .unwrap();
        let b = dispatcher.register_client(Some(Filter::pass_all()), 16).unwrap();

        channel.inject_all([frame(0x100), frame(0x200), frame(0x100)]);
        assert_eq!(dispatcher.dispatch_incoming(), 3);

        assert_eq!(drain(&dispatcher, a), vec![0x100, 0x100]);
        assert_eq!(drain(&dispatcher, b), vec![0x100, 0x200, 0x100]);
    }

    #[test]
    fn default_filter_passes_everything() {
        let (channel, dispatcher) = setup();
        let handle = dispatcher.register_client(None, 4).unwrap();
        channel.inject(CanFrame::new_remote(0x1FFF_FFFF, true, 0).unwrap());
        dispatcher.dispatch_incoming();

        assert_eq!(dispatcher.queue_len(handle).unwrap(), 1);
    }

    #[test]
    fn removed_client_yields_not_found() {
        let (_channel, dispatcher) = setup();
        let handle = dispatcher.register_client(None, 4).unwrap();
        dispatcher.remove_client(handle).unwrap();

        assert!(matches!(
            dispatcher.read_from_queue(handle),
            Err(DispatchError::NotFound(_))
        ));
        assert!(matches!(
            dispatcher.read_one(handle),
            Err(DispatchError::NotFound(_))
        ));
        assert!(matches!(
            dispatcher.remove_client(handle),
            Err(DispatchError::NotFound(_))
        ));
        assert!(matches!(
            dispatcher.set_filter(handle, Filter::pass_all()),
            Err(DispatchError::NotFound(_))
        ));
        assert!(matches!(
            dispatcher.clear_queue(handle),
            Err(DispatchError::NotFound(_))
        ));
        assert_eq!(dispatcher.client_count(), 0);
    }

    #[test]
    fn read_one_distinguishes_no_new_message() {
        let (channel, dispatcher) = setup();
        let handle = dispatcher.register_client(None, 4).unwrap();

        assert!(matches!(
            dispatcher.read_one(handle),
            Err(DispatchError::NoNewMessage)
        ));
        assert!(matches!(
            dispatcher.read_from_queue(handle),
            Err(DispatchError::WouldBlock)
        ));

        channel.inject(frame(0x55));
        assert_eq!(dispatcher.read_one(handle).unwrap().id(), 0x55);
    }

    #[test]
    fn read_one_no_handle_returns_and_fans_out() {
        let (channel, dispatcher) = setup();
        let watcher = dispatcher.register_client(None, 4).unwrap();
        channel.inject_all([frame(1), frame(2)]);

        assert_eq!(dispatcher.read_one_no_handle().unwrap().id(), 1);
        assert_eq!(channel.pending_rx(), 1);
        assert_eq!(drain(&dispatcher, watcher), vec![1]);

        assert_eq!(dispatcher.read_one_no_handle().unwrap().id(), 2);
        assert!(matches!(
            dispatcher.read_one_no_handle(),
            Err(DispatchError::NoNewMessage)
        ));
    }

    #[test]
    fn read_one_no_handle_surfaces_transport_errors() {
        let (channel, dispatcher) = setup();
        channel.close();
        assert!(matches!(
            dispatcher.read_one_no_handle(),
            Err(DispatchError::Transport(TransportError::Closed))
        ));
        assert_eq!(dispatcher.dispatch_incoming(), 0);
    }

    #[test]
    fn overflow_is_recorded_not_surfaced() {
        let (channel, dispatcher) = setup();
        let small = dispatcher.register_client(None, 2).unwrap();
        channel.inject_all((0..5).map(frame));

        assert_eq!(dispatcher.dispatch_incoming(), 5);
        assert_eq!(dispatcher.queue_status(small).unwrap(), QueueStatus::Overflow);
        assert_eq!(dispatcher.queue_status(small).unwrap(), QueueStatus::Ok);
        assert_eq!(drain(&dispatcher, small), vec![0, 1]);
    }

    #[test]
    fn filter_change_applies_on_next_dispatch() {
        let (channel, dispatcher) = setup();
        let handle = dispatcher.register_client(None, 8).unwrap();

        channel.inject(frame(0x10));
        dispatcher.dispatch_incoming();
        dispatcher
            .set_filter(handle, Filter::pass_one_id(0x20, false, false))
            .unwrap();
        channel.inject_all([frame(0x10), frame(0x20)]);
        dispatcher.dispatch_incoming();

        assert_eq!(drain(&dispatcher, handle), vec![0x10, 0x20]);
    }

    #[test]
    fn clear_and_resize_queue() {
        let (channel, dispatcher) = setup();
        let handle = dispatcher.register_client(None, 8).unwrap();
        channel.inject_all((0..6).map(frame));
        dispatcher.dispatch_incoming();

        dispatcher.set_queue_size(handle, 3).unwrap();
        assert_eq!(dispatcher.queue_len(handle).unwrap(), 3);
        dispatcher.clear_queue(handle).unwrap();
        assert_eq!(dispatcher.queue_len(handle).unwrap(), 0);
    }

    #[test]
    fn send_goes_through_transport() {
        let (channel, dispatcher) = setup();
        dispatcher.send(&frame(0x42)).unwrap();
        assert_eq!(channel.sent_frames(), vec![frame(0x42)]);

        channel.set_fail_sends(true);
        assert!(matches!(
            dispatcher.send(&frame(0x42)),
            Err(DispatchError::Transport(_))
        ));
    }
}
