//! Queueing relay for messages sent to a context that may not be listening yet.
//!
//! Messages sent before the receiver signals readiness are queued and
//! drained FIFO by [`Relay::on_ready`]. [`Relay::send_with_fallback`] also
//! hands back a [`FallbackCheck`] which the caller runs after
//! `relay_fallback_ms`; if the message is still queued it is pulled out and
//! delivered directly. The two paths are not ordered with respect to each
//! other.

use crate::error::RelayError;
use crate::messages::{MessageKey, RuntimeMessage};
use std::collections::VecDeque;

/// Point-to-point, best-effort delivery.
pub trait Transport {
    fn deliver(&mut self, message: &RuntimeMessage) -> Result<(), RelayError>;
}

/// Deferred direct-delivery attempt for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackCheck {
    key: MessageKey,
}

impl FallbackCheck {
    pub fn key(&self) -> &MessageKey {
        &self.key
    }
}

/// Outcome of a fallback check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// Already delivered by a drain (or never queued).
    NotPending,
    Delivered,
    /// Direct delivery failed; the message is back in the queue.
    Requeued,
}

pub struct Relay<T> {
    transport: T,
    ready: bool,
    queue: VecDeque<RuntimeMessage>,
}

impl<T: Transport> Relay<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            ready: false,
            queue: VecDeque::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn pending(&self) -> impl Iterator<Item = &RuntimeMessage> {
        self.queue.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The receiver went away (e.g. the panel was closed).
    pub fn mark_not_ready(&mut self) {
        self.ready = false;
    }

    /// Deliver now if the receiver is ready, otherwise queue.
    pub fn send(&mut self, message: RuntimeMessage) {
        if !self.ready {
            tracing::debug!(action = message.action(), "receiver not ready; queued");
            self.queue.push_back(message);
            return;
        }
        if let Err(e) = self.transport.deliver(&message) {
            tracing::debug!(action = message.action(), error = %e, "delivery failed; queued");
            self.ready = false;
            self.queue.push_back(message);
        }
    }

    /// A delivery accepted by the transport was rejected later (async transports).
    pub fn requeue(&mut self, message: RuntimeMessage) {
        tracing::debug!(action = message.action(), "delivery rejected; queued");
        self.ready = false;
        self.queue.push_back(message);
    }

    /// [`send`](Self::send), returning a check to run after the fallback delay.
    pub fn send_with_fallback(&mut self, message: RuntimeMessage) -> FallbackCheck {
        let key = message.dedup_key();
        self.send(message);
        FallbackCheck { key }
    }

    /// Deliver the matching queued message directly, if it is still waiting.
    pub fn run_fallback(&mut self, check: &FallbackCheck) -> FallbackOutcome {
        let Some(pos) = self.queue.iter().position(|m| m.dedup_key() == check.key) else {
            return FallbackOutcome::NotPending;
        };
        let Some(message) = self.queue.remove(pos) else {
            return FallbackOutcome::NotPending;
        };

        match self.transport.deliver(&message) {
            Ok(()) => {
                tracing::debug!(action = message.action(), "delivered by fallback");
                FallbackOutcome::Delivered
            }
            Err(e) => {
                tracing::debug!(action = message.action(), error = %e, "fallback delivery failed");
                self.queue.push_back(message);
                FallbackOutcome::Requeued
            }
        }
    }

    /// Receiver is listening: mark ready and drain the whole queue in order.
    ///
    /// A failed delivery flips readiness off and re-queues that message; the
    /// rest of this pass is still attempted. Returns the number delivered.
    pub fn on_ready(&mut self) -> usize {
        self.ready = true;
        let drained: Vec<RuntimeMessage> = self.queue.drain(..).collect();
        let mut delivered = 0;
        for message in drained {
            match self.transport.deliver(&message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(action = message.action(), error = %e, "drain delivery failed");
                    self.ready = false;
                    self.queue.push_back(message);
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records deliveries; can be told to reject.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub delivered: Vec<RuntimeMessage>,
        pub reject: bool,
        /// Reject only these actions (checked when `reject` is false).
        pub reject_actions: Vec<&'static str>,
    }

    impl Transport for RecordingTransport {
        fn deliver(&mut self, message: &RuntimeMessage) -> Result<(), RelayError> {
            if self.reject || self.reject_actions.contains(&message.action()) {
                return Err(RelayError::PeerAbsent);
            }
            self.delivered.push(message.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;
    use pretty_assertions::assert_eq;

    fn note_msg(content: &str) -> RuntimeMessage {
        RuntimeMessage::AddNote {
            content: Some(content.to_string()),
        }
    }

    fn url_msg(url: &str) -> RuntimeMessage {
        RuntimeMessage::AddUrlNote {
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn test_queue_until_ready_then_drain_in_order() {
        let mut r = Relay::new(RecordingTransport::default());
        r.send(note_msg("m1"));
        r.send(note_msg("m2"));
        assert_eq!(
            r.pending().cloned().collect::<Vec<_>>(),
            vec![note_msg("m1"), note_msg("m2")]
        );
        assert!(r.transport().delivered.is_empty());

        assert_eq!(r.on_ready(), 2);
        assert_eq!(r.transport().delivered, vec![note_msg("m1"), note_msg("m2")]);
        assert_eq!(r.pending_len(), 0);
        assert!(r.is_ready());
    }

    #[test]
    fn test_ready_receiver_gets_immediate_delivery() {
        let mut r = Relay::new(RecordingTransport::default());
        r.on_ready();
        r.send(note_msg("now"));
        assert_eq!(r.transport().delivered, vec![note_msg("now")]);
        assert_eq!(r.pending_len(), 0);
    }

    #[test]
    fn test_failed_delivery_resets_readiness_and_queues() {
        let mut r = Relay::new(RecordingTransport::default());
        r.on_ready();
        r.transport_mut().reject = true;
        r.send(note_msg("lost?"));
        assert!(!r.is_ready());
        assert_eq!(r.pending_len(), 1);

        // Later messages queue behind it without a delivery attempt.
        r.transport_mut().reject = false;
        r.send(note_msg("next"));
        assert!(r.transport().delivered.is_empty());
        r.on_ready();
        assert_eq!(
            r.transport().delivered,
            vec![note_msg("lost?"), note_msg("next")]
        );
    }

    #[test]
    fn test_drain_failure_requeues_but_continues_pass() {
        let mut r = Relay::new(RecordingTransport {
            reject_actions: vec!["addUrlNote"],
            ..Default::default()
        });
        r.send(note_msg("a"));
        r.send(url_msg("https://x"));
        r.send(note_msg("b"));

        assert_eq!(r.on_ready(), 2);
        assert!(!r.is_ready());
        assert_eq!(r.transport().delivered, vec![note_msg("a"), note_msg("b")]);
        assert_eq!(
            r.pending().cloned().collect::<Vec<_>>(),
            vec![url_msg("https://x")]
        );
    }

    #[test]
    fn test_fallback_delivers_still_queued_message() {
        let mut r = Relay::new(RecordingTransport::default());
        let check = r.send_with_fallback(url_msg("https://x"));
        r.send(note_msg("other"));

        assert_eq!(r.run_fallback(&check), FallbackOutcome::Delivered);
        assert_eq!(r.transport().delivered, vec![url_msg("https://x")]);
        assert_eq!(
            r.pending().cloned().collect::<Vec<_>>(),
            vec![note_msg("other")]
        );
    }

    #[test]
    fn test_fallback_after_drain_is_noop() {
        let mut r = Relay::new(RecordingTransport::default());
        let check = r.send_with_fallback(url_msg("https://x"));
        r.on_ready();
        assert_eq!(r.run_fallback(&check), FallbackOutcome::NotPending);
        assert_eq!(r.transport().delivered.len(), 1);
    }

    #[test]
    fn test_fallback_failure_requeues() {
        let mut r = Relay::new(RecordingTransport {
            reject: true,
            ..Default::default()
        });
        let check = r.send_with_fallback(url_msg("https://x"));
        assert_eq!(r.run_fallback(&check), FallbackOutcome::Requeued);
        assert_eq!(r.pending_len(), 1);
    }

    #[test]
    fn test_late_rejection_requeues_and_resets_readiness() {
        let mut r = Relay::new(RecordingTransport::default());
        r.on_ready();
        r.send(note_msg("sent"));
        r.requeue(note_msg("sent"));
        assert!(!r.is_ready());
        assert_eq!(r.pending().cloned().collect::<Vec<_>>(), vec![note_msg("sent")]);
    }
}
