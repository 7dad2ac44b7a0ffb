//! One-at-a-time register operation queue.
//!
//! The transport accepts a single outstanding read or write. The queue holds
//! everything else in FIFO order and starts the next operation when the
//! in-flight one completes, whether it succeeded or not.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use badgelink_transport::{EventSender, GattTransport, Operation, OperationKind, RegisterHandle};
use tracing::{debug, warn};

struct InFlight {
    seq: u64,
    op: Operation,
    dispatched_at: Instant,
}

/// An expired operation whose completion may still arrive.
struct Abandoned {
    seq: u64,
    handle: RegisterHandle,
    kind: OperationKind,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Operation>,
    in_flight: Option<InFlight>,
    /// Expired operations, oldest first. The transport completes in dispatch
    /// order, so their late completions arrive before the in-flight one.
    abandoned: VecDeque<Abandoned>,
    next_seq: u64,
}

/// FIFO queue in front of a single-operation transport.
///
/// The lock covers only the in-memory bookkeeping. The transport is always
/// called after the lock is released.
pub struct OperationQueue {
    state: Mutex<QueueState>,
    transport: Arc<dyn GattTransport>,
    events: EventSender,
}

impl OperationQueue {
    /// Create an idle queue. Refused dispatches are reported as failed
    /// completions on `events`.
    pub fn new(transport: Arc<dyn GattTransport>, events: EventSender) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            transport,
            events,
        }
    }

    /// Queue `op`. Dispatches immediately when nothing is in flight.
    pub fn enqueue(&self, op: Operation) {
        let dispatch_now = {
            let mut state = self.lock();
            if state.in_flight.is_none() {
                state.start(op.clone());
                true
            } else {
                debug!(handle = %op.handle(), pending = state.pending.len() + 1, "operation queued");
                state.pending.push_back(op.clone());
                false
            }
        };

        if dispatch_now {
            self.dispatch(&op);
        }
    }

    /// Finish the in-flight operation and start the next one.
    ///
    /// Returns the finished operation, or `None` when the completion does not
    /// match what is in flight. Unmatched completions leave the queue as is.
    /// A completion matching an expired operation is credited to that
    /// operation and dropped, even when the in-flight one has the same
    /// register and kind.
    pub fn complete(&self, handle: &RegisterHandle, kind: OperationKind) -> Option<Operation> {
        let (finished, next) = {
            let mut state = self.lock();
            if let Some(seq) = state.take_abandoned(handle, kind) {
                debug!(%handle, ?kind, seq, "late completion for expired operation dropped");
                return None;
            }
            let matches = state
                .in_flight
                .as_ref()
                .is_some_and(|current| current.op.handle() == handle && current.op.kind() == kind);
            if !matches {
                warn!(%handle, ?kind, "completion does not match in-flight operation, ignoring");
                return None;
            }
            // Anything expired before this operation will not complete now.
            state.abandoned.clear();
            state.advance()
        };

        if let Some(op) = &next {
            self.dispatch(op);
        }
        finished
    }

    /// Give up on the in-flight operation if it has been outstanding for at
    /// least `timeout`, and start the next one.
    ///
    /// Returns the abandoned operation. A completion that arrives for it later
    /// is dropped rather than credited to a newer operation.
    pub fn expire_overdue(&self, timeout: Duration) -> Option<Operation> {
        let (expired, next) = {
            let mut state = self.lock();
            let Some(current) = state
                .in_flight
                .as_ref()
                .filter(|current| current.dispatched_at.elapsed() >= timeout)
            else {
                return None;
            };
            let abandoned = Abandoned {
                seq: current.seq,
                handle: *current.op.handle(),
                kind: current.op.kind(),
            };
            state.abandoned.push_back(abandoned);
            state.advance()
        };

        if let Some(op) = &next {
            self.dispatch(op);
        }
        expired
    }

    /// Drop every pending operation and forget the in-flight one.
    /// Returns how many operations were discarded.
    ///
    /// Used on link loss, where nothing dispatched before the reset will
    /// complete, so expired operations are forgotten too.
    pub fn reset(&self) -> usize {
        let mut state = self.lock();
        let discarded = state.pending.len() + usize::from(state.in_flight.is_some());
        state.pending.clear();
        state.in_flight = None;
        state.abandoned.clear();
        if discarded > 0 {
            debug!(discarded, "operation queue reset");
        }
        discarded
    }

    /// Operation currently held by the transport.
    pub fn in_flight(&self) -> Option<Operation> {
        self.lock()
            .in_flight
            .as_ref()
            .map(|current| current.op.clone())
    }

    /// Operations waiting behind the in-flight one.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.lock().in_flight.is_none()
    }

    fn dispatch(&self, op: &Operation) {
        debug!(handle = %op.handle(), kind = ?op.kind(), "dispatching operation");
        if let Err(err) = self.transport.dispatch(op) {
            warn!(handle = %op.handle(), error = %err, "transport refused operation");
            // Route the refusal through normal completion handling so the
            // queue advances and the caller sees a failed completion.
            if self.events.send(op.failed(err)).is_err() {
                debug!("event receiver dropped, refusal not reported");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueState {
    fn start(&mut self, op: Operation) {
        self.next_seq += 1;
        self.in_flight = Some(InFlight {
            seq: self.next_seq,
            op,
            dispatched_at: Instant::now(),
        });
    }

    /// Pop the in-flight operation and promote the next pending one.
    /// Returns (finished, next to dispatch).
    fn advance(&mut self) -> (Option<Operation>, Option<Operation>) {
        let finished = self.in_flight.take().map(|current| current.op);
        let next = self.pending.pop_front();
        if let Some(op) = &next {
            self.start(op.clone());
        }
        (finished, next)
    }

    /// Claim the oldest expired operation matching a completion. Expired
    /// operations older than the match will never complete and are dropped.
    fn take_abandoned(&mut self, handle: &RegisterHandle, kind: OperationKind) -> Option<u64> {
        let position = self
            .abandoned
            .iter()
            .position(|entry| entry.handle == *handle && entry.kind == kind)?;
        let claimed = self.abandoned.drain(..=position).last()?;
        Some(claimed.seq)
    }
}

#[cfg(test)]
mod tests {
    use badgelink_transport::{
        event_channel, EventReceiver, Register, SimulatedBadge, TransportError, TransportEvent,
    };
    use bytes::Bytes;

    use super::*;

    fn setup() -> (Arc<SimulatedBadge>, OperationQueue, EventReceiver) {
        let (tx, rx) = event_channel();
        let badge = Arc::new(SimulatedBadge::new("AA:BB", tx.clone()).with_link_up());
        let queue = OperationQueue::new(badge.clone(), tx);
        (badge, queue, rx)
    }

    fn ops(badge: &SimulatedBadge) -> [Operation; 3] {
        [
            Operation::Read(badge.handle(Register::DisplayEnabled).unwrap()),
            Operation::Write(
                badge.handle(Register::Brightness).unwrap(),
                Bytes::from_static(&[3]),
            ),
            Operation::Read(badge.handle(Register::Brightness).unwrap()),
        ]
    }

    fn complete_from_event(queue: &OperationQueue, event: TransportEvent) -> Option<Operation> {
        match event {
            TransportEvent::ReadComplete { handle, .. } => queue.complete(&handle, OperationKind::Read),
            TransportEvent::WriteComplete { handle, .. } => {
                queue.complete(&handle, OperationKind::Write)
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn dispatches_one_at_a_time_in_order() {
        let (badge, queue, mut rx) = setup();
        let [a, b, c] = ops(&badge);

        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        queue.enqueue(c.clone());
        assert_eq!(badge.dispatched(), vec![a.clone()]);
        assert_eq!(queue.pending(), 2);

        badge.complete_next();
        assert_eq!(complete_from_event(&queue, rx.try_recv().unwrap()), Some(a.clone()));
        assert_eq!(badge.dispatched(), vec![a.clone(), b.clone()]);

        badge.complete_next();
        assert_eq!(complete_from_event(&queue, rx.try_recv().unwrap()), Some(b.clone()));
        assert_eq!(badge.dispatched(), vec![a, b, c.clone()]);

        badge.complete_next();
        assert_eq!(complete_from_event(&queue, rx.try_recv().unwrap()), Some(c));
        assert!(queue.is_idle());
    }

    #[test]
    fn write_then_read_observes_new_value() {
        let (badge, queue, mut rx) = setup();
        let [_, write, read] = ops(&badge);

        queue.enqueue(write);
        queue.enqueue(read);
        badge.complete_next();
        complete_from_event(&queue, rx.try_recv().unwrap());
        badge.complete_next();

        match rx.try_recv().unwrap() {
            TransportEvent::ReadComplete { result, .. } => {
                assert_eq!(result.unwrap().as_ref(), &[3]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn failed_completion_does_not_stall() {
        let (badge, queue, mut rx) = setup();
        let [a, b, c] = ops(&badge);
        queue.enqueue(a);
        queue.enqueue(b.clone());
        queue.enqueue(c.clone());

        badge.complete_next();
        complete_from_event(&queue, rx.try_recv().unwrap());
        badge.fail_next(0x85);
        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event,
            TransportEvent::WriteComplete {
                result: Err(TransportError::Gatt { status: 0x85 }),
                ..
            }
        ));
        assert_eq!(complete_from_event(&queue, event), Some(b));
        assert_eq!(queue.in_flight(), Some(c));
    }

    #[test]
    fn refused_dispatch_becomes_failed_completion() {
        let (badge, queue, mut rx) = setup();
        let [a, b, _] = ops(&badge);
        badge.refuse_next_dispatches(1);

        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        assert!(badge.dispatched().is_empty());

        let event = rx.try_recv().unwrap();
        assert_eq!(event, a.failed(TransportError::DispatchFailed(format!("stack refused {}", a.handle()))));
        assert_eq!(complete_from_event(&queue, event), Some(a));
        assert_eq!(badge.dispatched(), vec![b]);
    }

    #[test]
    fn unmatched_completion_is_ignored() {
        let (badge, queue, _rx) = setup();
        let [a, b, _] = ops(&badge);
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());

        assert_eq!(queue.complete(b.handle(), OperationKind::Write), None);
        assert_eq!(queue.complete(a.handle(), OperationKind::Write), None);
        assert_eq!(queue.in_flight(), Some(a));
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn expire_overdue_advances() {
        let (badge, queue, _rx) = setup();
        let [a, b, _] = ops(&badge);
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());

        assert_eq!(queue.expire_overdue(Duration::from_secs(60)), None);
        assert_eq!(queue.expire_overdue(Duration::ZERO), Some(a.clone()));
        assert_eq!(queue.in_flight(), Some(b.clone()));
        assert_eq!(badge.dispatched(), vec![a.clone(), b]);

        // The late completion for the abandoned read no longer matches.
        assert_eq!(queue.complete(a.handle(), OperationKind::Read), None);
    }

    #[test]
    fn late_completion_is_not_credited_to_newer_operation() {
        let (badge, queue, _rx) = setup();
        let [read, _, _] = ops(&badge);
        queue.enqueue(read.clone());
        queue.enqueue(read.clone());

        assert_eq!(queue.expire_overdue(Duration::ZERO), Some(read.clone()));
        assert_eq!(queue.in_flight(), Some(read.clone()));

        // First completion belongs to the expired read.
        assert_eq!(queue.complete(read.handle(), OperationKind::Read), None);
        assert_eq!(queue.in_flight(), Some(read.clone()));

        assert_eq!(queue.complete(read.handle(), OperationKind::Read), Some(read));
        assert!(queue.is_idle());
    }

    #[test]
    fn expired_operation_is_forgotten_once_a_later_one_completes() {
        let (badge, queue, _rx) = setup();
        let [read, write, _] = ops(&badge);
        queue.enqueue(read.clone());
        queue.enqueue(write.clone());

        queue.expire_overdue(Duration::ZERO);
        assert_eq!(queue.complete(write.handle(), OperationKind::Write), Some(write));

        queue.enqueue(read.clone());
        assert_eq!(queue.complete(read.handle(), OperationKind::Read), Some(read));
    }

    #[test]
    fn reset_discards_everything() {
        let (badge, queue, _rx) = setup();
        let [a, b, c] = ops(&badge);
        queue.enqueue(a);
        queue.enqueue(b);
        queue.enqueue(c);

        assert_eq!(queue.reset(), 3);
        assert!(queue.is_idle());
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.reset(), 0);
    }
}
