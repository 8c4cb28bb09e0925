//! Thread-safe packet hand-off between the demux thread and one render loop.
//!
//! A [`PacketQueue`] owns the packets of one stream, a single decoded-frame
//! cache and the stream's [`Clock`]. All bookkeeping lives behind one mutex
//! with two condition variables: `consumer` wakes a render loop waiting for
//! packets, `producer` wakes the demux thread waiting in
//! [`PacketQueue::wait_for_empty`]. The decoder sits behind its own mutex so
//! the bookkeeping lock is never held across a decode call.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use log::{debug, warn};

use crate::media::{Decoder, Frame, Packet};

use super::clock::{Clock, MonotonicTime, Pacing, TimeSource, DEFAULT_FRAME_INTERVAL};

/// Bookkeeping bytes charged per queued packet on top of its payload.
pub const PACKET_OVERHEAD: usize = 64;
/// Packet count a queue must exceed before it is considered full enough.
pub const MIN_QUEUED_PACKETS: usize = 15;
/// Queued duration (seconds) a queue must exceed before it is full enough.
pub const MIN_QUEUED_SECONDS: f64 = 1.0;

struct QueueState {
    packets: VecDeque<Packet>,
    bytes: usize,
    duration: f64,
    aborted: bool,
    woken: bool,
    cached: Option<Frame>,
    decoding: bool,
    presenting: bool,
    serial: u64,
    flush_decoder: bool,
    last_pts: Option<f64>,
    clock: Clock,
    min_packets: usize,
    min_seconds: f64,
}

impl QueueState {
    fn take_packet(&mut self) -> Option<Packet> {
        let packet = self.packets.pop_front()?;
        self.bytes = self.bytes.saturating_sub(packet.size() + PACKET_OVERHEAD);
        self.duration = (self.duration - packet_seconds(&packet)).max(0.0);
        if self.packets.is_empty() {
            self.bytes = 0;
            self.duration = 0.0;
        }
        Some(packet)
    }

    fn is_drained(&self) -> bool {
        self.packets.is_empty() && self.cached.is_none() && !self.decoding && !self.presenting
    }
}

/// Packet FIFO for one stream with an embedded decode cache and clock.
pub struct PacketQueue {
    name: String,
    state: Mutex<QueueState>,
    consumer: Condvar,
    producer: Condvar,
    decoder: Mutex<Option<Box<dyn Decoder>>>,
    time: Arc<dyn TimeSource>,
}

impl PacketQueue {
    pub fn new(name: &str) -> Self {
        Self::with_time_source(name, Arc::new(MonotonicTime::new()))
    }

    pub fn with_time_source(name: &str, time: Arc<dyn TimeSource>) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(QueueState {
                packets: VecDeque::new(),
                bytes: 0,
                duration: 0.0,
                aborted: false,
                woken: false,
                cached: None,
                decoding: false,
                presenting: false,
                serial: 0,
                flush_decoder: false,
                last_pts: None,
                clock: Clock::new(DEFAULT_FRAME_INTERVAL),
                min_packets: MIN_QUEUED_PACKETS,
                min_seconds: MIN_QUEUED_SECONDS,
            }),
            consumer: Condvar::new(),
            producer: Condvar::new(),
            decoder: Mutex::new(None),
            time,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap()
    }

    /// Thresholds used by [`PacketQueue::enough`].
    pub fn set_limits(&self, min_packets: usize, min_seconds: f64) {
        let mut state = self.lock();
        state.min_packets = min_packets;
        state.min_seconds = min_seconds.max(0.0);
    }

    /// Install the decoder for the stream this queue carries.
    pub fn set_decoder(&self, decoder: Option<Box<dyn Decoder>>) {
        *self.decoder.lock().unwrap() = decoder;
        self.lock().flush_decoder = false;
    }

    pub fn set_frame_rate(&self, frame_rate: f64) {
        self.lock().clock.set_frame_rate(frame_rate);
    }

    pub fn frame_rate(&self) -> f64 {
        self.lock().clock.frame_rate()
    }

    /// Append a packet and wake one waiting consumer. Enqueueing also lifts a
    /// previous [`PacketQueue::abort`].
    pub fn enqueue(&self, packet: Packet) {
        let mut state = self.lock();
        state.bytes += packet.size() + PACKET_OVERHEAD;
        state.duration += packet_seconds(&packet);
        state.packets.push_back(packet);
        state.aborted = false;
        self.consumer.notify_one();
    }

    /// Block until a packet is available. Returns `None` once aborted.
    pub fn dequeue(&self) -> Option<Packet> {
        let mut state = self.lock();
        loop {
            if state.aborted {
                return None;
            }
            if let Some(packet) = state.take_packet() {
                if state.is_drained() {
                    self.producer.notify_all();
                }
                return Some(packet);
            }
            state = self.consumer.wait(state).unwrap();
        }
    }

    /// Produce the next frame if its presentation time has come.
    ///
    /// Reuses the cached frame or dequeues and decodes a new one, then runs
    /// it through the clock. A returned frame stays cached until
    /// [`PacketQueue::pop`]; a `None` leaves the cache untouched and the
    /// caller retries on its next tick. Returns `None` without waiting after
    /// [`PacketQueue::abort`] or [`PacketQueue::wake`].
    pub fn sync(&self, speed: f64, master_pts: Option<f64>) -> Option<Frame> {
        let mut state = self.lock();
        loop {
            if state.aborted {
                return None;
            }
            if state.woken {
                state.woken = false;
                return None;
            }

            if let Some(pts) = state.cached.as_ref().map(|frame| frame.pts) {
                let now = self.time.now();
                return match state.clock.poll(pts, speed, master_pts, now) {
                    Pacing::Present => {
                        if pts.is_finite() {
                            state.last_pts = Some(pts);
                        }
                        state.presenting = true;
                        state.cached.clone()
                    }
                    Pacing::Wait(wait) => {
                        drop(state);
                        self.time.sleep(wait);
                        None
                    }
                };
            }

            let packet = match state.take_packet() {
                Some(packet) => packet,
                None => {
                    state = self.consumer.wait(state).unwrap();
                    continue;
                }
            };

            state.decoding = true;
            let serial = state.serial;
            let flush = std::mem::take(&mut state.flush_decoder);
            drop(state);

            let decoded = {
                let mut decoder = self.decoder.lock().unwrap();
                match decoder.as_mut() {
                    Some(decoder) => {
                        if flush {
                            decoder.flush();
                        }
                        decoder.decode(&packet)
                    }
                    None => Ok(None),
                }
            };

            state = self.lock();
            state.decoding = false;
            if state.serial != serial {
                // Cleared while decoding; the frame belongs to the old position.
                self.producer.notify_all();
                continue;
            }
            match decoded {
                Ok(Some(frame)) => state.cached = Some(frame),
                Ok(None) => {}
                Err(err) => warn!(
                    "{} queue: skipping packet at {:.3}s: {}",
                    self.name,
                    packet.pts(),
                    err
                ),
            }
            if state.is_drained() {
                self.producer.notify_all();
            }
        }
    }

    /// Release the frame returned by the last successful [`PacketQueue::sync`].
    pub fn pop(&self) {
        let mut state = self.lock();
        if state.presenting {
            state.cached = None;
            state.presenting = false;
        }
        if state.is_drained() {
            self.producer.notify_all();
        }
    }

    /// Wake every waiter with an empty result until the next enqueue.
    pub fn abort(&self) {
        let mut state = self.lock();
        state.aborted = true;
        self.consumer.notify_all();
        self.producer.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    /// Make one blocked or upcoming [`PacketQueue::sync`] return `None`.
    pub fn wake(&self) {
        let mut state = self.lock();
        state.woken = true;
        self.consumer.notify_all();
    }

    /// Drop queued packets and the cached frame and reset the clock.
    ///
    /// A decode running concurrently is discarded when it completes and the
    /// decoder is flushed before its next packet.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.packets.clear();
        state.bytes = 0;
        state.duration = 0.0;
        state.cached = None;
        state.last_pts = None;
        state.clock.reset();
        state.serial = state.serial.wrapping_add(1);
        state.flush_decoder = true;
        debug!("{} queue cleared (serial {})", self.name, state.serial);
        self.producer.notify_all();
    }

    /// [`PacketQueue::clear`] and lift any abort, ready for a new source.
    pub fn reset(&self) {
        self.clear();
        let mut state = self.lock();
        state.aborted = false;
        state.woken = false;
        state.presenting = false;
    }

    /// True once enough data is buffered for the producer to back off.
    pub fn enough(&self) -> bool {
        let state = self.lock();
        state.packets.len() > state.min_packets
            && (state.duration == 0.0 || state.duration > state.min_seconds)
    }

    /// Block until the consumer holds nothing from before the last clear:
    /// no queued packets, no decode in flight and no frame awaiting `pop`.
    /// Returns early when the queue is aborted.
    pub fn wait_for_empty(&self) {
        let mut state = self.lock();
        while !state.aborted && !state.is_drained() {
            state = self.producer.wait(state).unwrap();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().packets.is_empty()
    }

    /// Queued payload bytes plus per-packet overhead.
    pub fn bytes(&self) -> usize {
        self.lock().bytes
    }

    /// Queued duration in seconds.
    pub fn duration(&self) -> f64 {
        self.lock().duration
    }

    /// Pts of the last presented frame since the last clear.
    pub fn pts(&self) -> Option<f64> {
        self.lock().last_pts
    }

    pub fn has_cached(&self) -> bool {
        self.lock().cached.is_some()
    }

    /// No packets, no decode in flight and nothing cached or presenting.
    pub fn is_idle(&self) -> bool {
        self.lock().is_drained()
    }
}

fn packet_seconds(packet: &Packet) -> f64 {
    let seconds = packet.duration();
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}
