//! Concurrent dispatch must never reorder frames inside a client queue.

use std::sync::{Arc, Mutex};
use std::thread;

use canmux_dispatch::{ClientHandle, DispatchError, Dispatcher};
use canmux_frame::{CanFrame, Filter};
use canmux_transport::{CanTransport, Result as TransportResult};

const TOTAL_FRAMES: u32 = 20_000;
const DISPATCH_THREADS: usize = 4;
const BURST: u32 = 8;

#[derive(Default)]
struct Sequence {
    next: u32,
    calls: u32,
}

/// Yields frames numbered 0, 1, 2, ... in generation order. Every few calls
/// it reports "no data" so that each dispatch pass only drains a short burst
/// and the dispatching threads keep racing each other.
#[derive(Default)]
struct SequenceTransport {
    state: Mutex<Sequence>,
}

impl SequenceTransport {
    fn exhausted(&self) -> bool {
        self.state.lock().unwrap().next >= TOTAL_FRAMES
    }
}

impl CanTransport for SequenceTransport {
    fn read_one_frame(&self) -> TransportResult<Option<CanFrame>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.next >= TOTAL_FRAMES || state.calls % BURST == 0 {
            return Ok(None);
        }
        let seq = state.next;
        state.next += 1;
        // Spread identifiers so that filtered clients see a subset.
        Ok(Some(CanFrame::new(seq % 4, false, &seq.to_le_bytes()).unwrap()))
    }

    fn send_one_frame(&self, _frame: &CanFrame) -> TransportResult<()> {
        Ok(())
    }
}

fn sequence_of(frame: &CanFrame) -> u32 {
    let payload = frame.payload();
    u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
}

fn drain(dispatcher: &Dispatcher, handle: ClientHandle) -> Vec<u32> {
    let mut out = Vec::new();
    loop {
        match dispatcher.read_from_queue(handle) {
            Ok(frame) => out.push(sequence_of(&frame)),
            Err(DispatchError::WouldBlock) => return out,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
}

#[test]
fn concurrent_dispatchers_preserve_generation_order() {
    let transport = Arc::new(SequenceTransport::default());
    let dispatcher = Arc::new(Dispatcher::new(transport.clone()));
    let all = dispatcher
        .register_client(None, TOTAL_FRAMES as usize)
        .unwrap();
    let even_ids = dispatcher
        .register_client(Some(Filter::id_mask(0, 0x1)), TOTAL_FRAMES as usize)
        .unwrap();
    let id_three = dispatcher
        .register_client(
            Some(Filter::pass_one_id(3, false, false)),
            TOTAL_FRAMES as usize,
        )
        .unwrap();

    let workers: Vec<_> = (0..DISPATCH_THREADS)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                let mut total = 0usize;
                while !transport.exhausted() {
                    total += dispatcher.dispatch_incoming();
                    thread::yield_now();
                }
                total
            })
        })
        .collect();

    let read: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(read, TOTAL_FRAMES as usize);

    let all_seq = drain(&dispatcher, all);
    assert_eq!(all_seq, (0..TOTAL_FRAMES).collect::<Vec<_>>());

    let even_seq = drain(&dispatcher, even_ids);
    assert!(even_seq.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(even_seq.len(), (TOTAL_FRAMES / 2) as usize);

    let three_seq = drain(&dispatcher, id_three);
    assert!(three_seq.windows(2).all(|w| w[0] < w[1]));
    assert!(three_seq.iter().all(|seq| seq % 4 == 3));
    assert_eq!(three_seq.len(), (TOTAL_FRAMES / 4) as usize);
}

#[test]
fn readers_and_dispatchers_interleave_safely() {
    let transport = Arc::new(SequenceTransport::default());
    let dispatcher = Arc::new(Dispatcher::new(transport.clone()));
    let handle = dispatcher
        .register_client(None, TOTAL_FRAMES as usize)
        .unwrap();

    let dispatch_thread = {
        let dispatcher = Arc::clone(&dispatcher);
        let transport = Arc::clone(&transport);
        thread::spawn(move || {
            while !transport.exhausted() {
                dispatcher.dispatch_incoming();
            }
        })
    };

    let mut seen = Vec::with_capacity(TOTAL_FRAMES as usize);
    while seen.len() < TOTAL_FRAMES as usize {
        match dispatcher.read_from_queue(handle) {
            Ok(frame) => seen.push(sequence_of(&frame)),
            Err(DispatchError::WouldBlock) => thread::yield_now(),
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    dispatch_thread.join().unwrap();

    assert_eq!(seen, (0..TOTAL_FRAMES).collect::<Vec<_>>());
}
