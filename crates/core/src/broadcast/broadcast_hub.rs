use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::broadcast::domain::output_channel::{OutputChannel, TransportError};

/// Handle identifying a connected channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fan-out to every connected output channel.
///
/// Each broadcast works on a snapshot of the connected set taken under the
/// lock; sends happen outside it. Channels whose send failed are removed
/// once the pass is over, so a failing channel never blocks the others and
/// never receives a second attempt.
#[derive(Default)]
pub struct BroadcastHub {
    channels: Mutex<HashMap<ChannelId, Arc<dyn OutputChannel>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, channel: Arc<dyn OutputChannel>) -> ChannelId {
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let count = {
            let mut channels = self.lock();
            channels.insert(id, channel);
            channels.len()
        };
        log::info!("Client {id} connected ({count} total)");
        id
    }

    /// Remove a channel. Absent ids are ignored.
    pub fn disconnect(&self, id: ChannelId) {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            log::info!("Client {id} disconnected");
        }
    }

    /// Drop every channel, e.g. on shutdown so transports can close.
    pub fn disconnect_all(&self) {
        let dropped = std::mem::take(&mut *self.lock()).len();
        if dropped > 0 {
            log::info!("Disconnected {dropped} clients");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many channels accepted the payload.
    pub fn broadcast_binary(&self, payload: Arc<[u8]>) -> usize {
        self.broadcast(|channel| channel.send_binary(Arc::clone(&payload)))
    }

    /// Returns how many channels accepted the message.
    pub fn broadcast_text(&self, message: &str) -> usize {
        self.broadcast(|channel| channel.send_text(message))
    }

    fn broadcast<F>(&self, send: F) -> usize
    where
        F: Fn(&dyn OutputChannel) -> Result<(), TransportError>,
    {
        let snapshot: Vec<(ChannelId, Arc<dyn OutputChannel>)> = self
            .lock()
            .iter()
            .map(|(id, channel)| (*id, Arc::clone(channel)))
            .collect();

        let mut failed = Vec::new();
        for (id, channel) in &snapshot {
            if let Err(e) = send(channel.as_ref()) {
                log::warn!("Dropping client {id}: {e}");
                failed.push(*id);
            }
        }

        if !failed.is_empty() {
            let mut channels = self.lock();
            for id in &failed {
                channels.remove(id);
            }
        }
        snapshot.len() - failed.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChannelId, Arc<dyn OutputChannel>>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::domain::output_channel::OutboundMessage;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingChannel {
        received: Mutex<Vec<OutboundMessage>>,
    }

    impl RecordingChannel {
        fn received(&self) -> Vec<OutboundMessage> {
            self.received.lock().unwrap().clone()
        }
    }

    impl OutputChannel for RecordingChannel {
        fn send_binary(&self, payload: Arc<[u8]>) -> Result<(), TransportError> {
            self.received
                .lock()
                .unwrap()
                .push(OutboundMessage::Binary(payload));
            Ok(())
        }

        fn send_text(&self, message: &str) -> Result<(), TransportError> {
            self.received
                .lock()
                .unwrap()
                .push(OutboundMessage::Text(message.into()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingChannel {
        attempts: AtomicUsize,
    }

    impl OutputChannel for FailingChannel {
        fn send_binary(&self, _payload: Arc<[u8]>) -> Result<(), TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Closed)
        }

        fn send_text(&self, _message: &str) -> Result<(), TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::QueueFull)
        }
    }

    #[test]
    fn test_broadcast_reaches_every_channel() {
        let hub = BroadcastHub::new();
        let a = Arc::new(RecordingChannel::default());
        let b = Arc::new(RecordingChannel::default());
        hub.connect(a.clone());
        hub.connect(b.clone());

        assert_eq!(hub.broadcast_text("beep"), 2);
        let payload: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);
        assert_eq!(hub.broadcast_binary(payload.clone()), 2);

        let expected = vec![
            OutboundMessage::Text("beep".into()),
            OutboundMessage::Binary(payload),
        ];
        assert_eq!(a.received(), expected);
        assert_eq!(b.received(), expected);
    }

    #[test]
    fn test_failed_channel_is_pruned_after_pass() {
        let hub = BroadcastHub::new();
        let good_before = Arc::new(RecordingChannel::default());
        let bad = Arc::new(FailingChannel::default());
        let good_after = Arc::new(RecordingChannel::default());
        hub.connect(good_before.clone());
        hub.connect(bad.clone());
        hub.connect(good_after.clone());

        assert_eq!(hub.broadcast_text("HIGH_RISK_MODE"), 2);
        assert_eq!(hub.len(), 2);
        assert_eq!(good_before.received().len(), 1);
        assert_eq!(good_after.received().len(), 1);

        // Never retried once dropped
        hub.broadcast_binary(Arc::from(vec![0u8]));
        assert_eq!(bad.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(good_after.received().len(), 2);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let hub = BroadcastHub::new();
        let id = hub.connect(Arc::new(RecordingChannel::default()));
        hub.disconnect(id);
        hub.disconnect(id);
        assert!(hub.is_empty());
        assert_eq!(hub.broadcast_text("NORMAL_MODE"), 0);
    }

    #[test]
    fn test_disconnect_after_prune_is_safe() {
        let hub = BroadcastHub::new();
        let id = hub.connect(Arc::new(FailingChannel::default()));
        hub.broadcast_text("beep");
        hub.disconnect(id);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_disconnect_all_empties_hub() {
        let hub = BroadcastHub::new();
        hub.connect(Arc::new(RecordingChannel::default()));
        hub.connect(Arc::new(RecordingChannel::default()));
        hub.disconnect_all();
        assert!(hub.is_empty());
    }

    #[test]
    fn test_ids_are_distinct() {
        let hub = BroadcastHub::new();
        let channel = Arc::new(RecordingChannel::default());
        let first = hub.connect(channel.clone());
        let second = hub.connect(channel);
        assert_ne!(first, second);
        assert_eq!(hub.len(), 2);
    }

    #[test]
    fn test_concurrent_broadcasts() {
        let hub = Arc::new(BroadcastHub::new());
        let channel = Arc::new(RecordingChannel::default());
        hub.connect(channel.clone());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let hub = Arc::clone(&hub);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        hub.broadcast_text("beep");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(channel.received().len(), 100);
    }
}
