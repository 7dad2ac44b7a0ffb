use std::sync::Arc;

use badgelink_device::{BadgeLink, EventPump, LinkConfig, LinkError, LinkNotice, LinkState, Snapshot};
use badgelink_frame::{
    encode_message, CodecConfig, Message, MessageMode, MessageSpeed, ValidationError,
};
use badgelink_transport::{
    event_channel, GattTransport, Operation, Register, SimulatedBadge, TransportEvent,
    BADGE_SERVICE,
};
use bytes::Bytes;

struct Session {
    badge: Arc<SimulatedBadge>,
    link: Arc<BadgeLink>,
    pump: EventPump,
}

impl Session {
    fn with_badge(build: impl FnOnce(SimulatedBadge) -> SimulatedBadge) -> Self {
        let (tx, rx) = event_channel();
        let badge = Arc::new(build(SimulatedBadge::new("C0:FF:EE:00:00:01", tx.clone())));
        let link = Arc::new(BadgeLink::new(badge.clone(), tx, LinkConfig::default()));
        let pump = EventPump::new(link.clone(), rx);
        Self { badge, link, pump }
    }

    fn new() -> Self {
        Self::with_badge(|badge| badge)
    }

    /// Connected, refreshed and idle.
    fn ready() -> Self {
        let mut session = Self::new();
        session.link.connect();
        session.settle();
        assert_eq!(session.link.state(), LinkState::Ready);
        assert!(session.link.snapshot().is_synced());
        session
    }

    /// Complete operations until the badge has nothing outstanding.
    fn settle(&mut self) {
        self.pump.drain();
        while self.badge.complete_next().is_some() {
            self.pump.drain();
        }
    }

    fn step(&mut self) {
        self.badge.complete_next().expect("an operation should be outstanding");
        self.pump.drain();
    }

    fn writes_since(&self, mark: usize) -> Vec<Operation> {
        self.badge.dispatched()[mark..]
            .iter()
            .filter(|op| matches!(op, Operation::Write(..)))
            .cloned()
            .collect()
    }
}

#[test]
fn queue_dispatches_in_enqueue_order() {
    let mut s = Session::ready();
    let mark = s.badge.dispatched().len();

    s.link.set_brightness(1).unwrap();
    s.link.set_display_enabled(false).unwrap();
    s.link.set_active_message(2).unwrap();
    assert_eq!(s.badge.dispatched().len(), mark + 1);
    assert_eq!(s.link.queued_operations(), 2);

    s.step();
    assert_eq!(s.badge.dispatched().len(), mark + 2);
    s.step();
    assert_eq!(s.badge.dispatched().len(), mark + 3);
    s.step();

    let order: Vec<_> = s.badge.dispatched()[mark..]
        .iter()
        .map(|op| op.handle().register())
        .collect();
    assert_eq!(
        order,
        [
            Some(Register::Brightness),
            Some(Register::DisplayEnabled),
            Some(Register::ActiveIndex)
        ]
    );
}

#[test]
fn failed_operation_does_not_stall_queue() {
    let mut s = Session::ready();
    s.link.set_brightness(1).unwrap();
    s.link.set_brightness(2).unwrap();
    s.link.set_brightness(3).unwrap();

    s.step();
    s.badge.fail_next(0x85);
    s.pump.drain();
    assert_eq!(s.badge.outstanding(), 1);
    s.step();

    assert_eq!(s.link.snapshot().brightness, 3);
    assert_eq!(s.link.queued_operations(), 0);
}

#[test]
fn refused_dispatch_advances_queue() {
    let mut s = Session::ready();
    let mut notices = s.link.notices();
    s.badge.refuse_next_dispatches(1);

    s.link.set_brightness(4).unwrap();
    s.link.set_brightness(5).unwrap();
    s.settle();

    assert_eq!(s.link.snapshot().brightness, 5);
    assert!(matches!(notices.try_recv(), Ok(LinkNotice::Error(_))));
}

#[test]
fn snapshot_is_published_only_when_every_read_is_in() {
    // Five registers: on/off, index, brightness and two message slots.
    let mut s = Session::with_badge(|badge| badge.with_message_slots(2));
    let mut snapshots = s.link.subscribe();
    s.link.connect();
    s.pump.drain();

    for _ in 0..3 {
        s.step();
    }
    assert!(!snapshots.has_changed().unwrap());
    assert_eq!(s.link.snapshot().generation, 0);

    // Device-side values change between the early and late reads.
    let slot = s.badge.message_handle(1).unwrap();
    let late = Message::new(MessageMode::Replace, MessageSpeed::Slow, "LATE");
    s.badge
        .set_value(slot, encode_message(&late, &CodecConfig::default()).unwrap());

    s.step();
    assert!(!snapshots.has_changed().unwrap());
    s.step();
    assert!(snapshots.has_changed().unwrap());

    let snapshot: Arc<Snapshot> = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.generation, 1);
    assert!(snapshot.display_enabled);
    assert_eq!(snapshot.brightness, 8);
    assert_eq!(snapshot.active_message_index, 0);
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].text(), "MESSAGE 0");
    assert_eq!(snapshot.messages[1], late);
}

#[test]
fn save_only_writes_dirty_messages_and_clears_on_success() {
    let mut s = Session::ready();
    let mark = s.badge.dispatched().len();

    assert!(s.link.set_message_text(2, "HELLO").unwrap());
    assert!(s.link.messages()[2].is_dirty());
    assert_eq!(s.link.save_dirty_messages().unwrap(), 1);
    s.settle();

    let writes = s.writes_since(mark);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].handle(), &s.badge.message_handle(2).unwrap());
    assert!(!s.link.messages()[2].is_dirty());
    assert_eq!(s.link.save_dirty_messages().unwrap(), 0);

    let stored = s.badge.value(&s.badge.message_handle(2).unwrap()).unwrap();
    assert_eq!(stored.as_ref(), b"\x01\x10\x00HELLO\x00");
}

#[test]
fn failed_message_write_keeps_dirty_for_retry() {
    let mut s = Session::ready();
    let mut notices = s.link.notices();

    s.link.set_message_speed(0, MessageSpeed::Fastest).unwrap();
    s.link.save_dirty_messages().unwrap();
    s.badge.fail_next(0x13);
    s.pump.drain();

    assert!(s.link.messages()[0].is_dirty());
    assert_eq!(
        notices.try_recv().unwrap(),
        LinkNotice::Error("failed to write changes to device".to_string())
    );

    assert_eq!(s.link.save_dirty_messages().unwrap(), 1);
    s.settle();
    assert!(!s.link.messages()[0].is_dirty());
}

#[test]
fn brightness_range_is_checked_before_enqueue() {
    let mut s = Session::ready();
    let mark = s.badge.dispatched().len();

    let err = s.link.set_brightness(17).unwrap_err();
    assert!(matches!(
        err,
        LinkError::Validation(ValidationError::OutOfRange { .. })
    ));
    assert_eq!(s.badge.dispatched().len(), mark);

    s.link.set_brightness(16).unwrap();
    s.settle();
    assert_eq!(s.writes_since(mark).len(), 1);
    assert_eq!(s.link.snapshot().brightness, 16);
}

#[test]
fn link_loss_reconnects_and_refreshes() {
    let mut s = Session::ready();
    let mut notices = s.link.notices();

    s.link.set_message_text(1, "KEEP ME").unwrap();
    s.link.set_brightness(3).unwrap();
    s.link.set_brightness(4).unwrap();
    s.badge.drop_link();
    s.pump.drain();

    let mut transitions = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        if let LinkNotice::StateChanged { from, to } = notice {
            transitions.push((from, to));
        }
    }
    assert_eq!(
        transitions,
        [
            (LinkState::Ready, LinkState::Reconnecting),
            (LinkState::Reconnecting, LinkState::LinkEstablishing),
            (LinkState::LinkEstablishing, LinkState::ServiceDiscovery),
            (LinkState::ServiceDiscovery, LinkState::Ready),
        ]
    );

    s.settle();
    let snapshot = s.link.snapshot();
    assert_eq!(snapshot.generation, 2);
    assert_eq!(snapshot.brightness, 8);
    assert_eq!(snapshot.messages[1].text(), "KEEP ME");
    assert!(s.link.messages()[1].is_dirty());
}

#[test]
fn refused_relink_is_retried_without_error() {
    let mut s = Session::ready();
    let mut notices = s.link.notices();
    s.badge.refuse_next_links(2);

    s.badge.drop_link();
    s.pump.drain();
    assert_eq!(s.link.state(), LinkState::Ready);
    assert!(s.badge.is_link_up());

    let notices: Vec<LinkNotice> = std::iter::from_fn(|| notices.try_recv().ok()).collect();
    assert!(
        !notices.iter().any(|notice| matches!(notice, LinkNotice::Error(_))),
        "unexpected error notice: {notices:?}"
    );
    let relinks = notices
        .iter()
        .filter(|notice| {
            **notice
                == LinkNotice::StateChanged {
                    from: LinkState::Reconnecting,
                    to: LinkState::LinkEstablishing,
                }
        })
        .count();
    assert_eq!(relinks, 3);

    s.settle();
    assert_eq!(s.link.snapshot().generation, 2);
}

#[test]
fn second_refresh_extends_the_first() {
    let mut s = Session::ready();
    s.link.refresh();
    s.step();
    s.step();

    s.link.refresh();
    for _ in 0..5 {
        s.step();
    }
    assert_eq!(s.link.snapshot().generation, 1);

    let brightness = s.badge.handle(Register::Brightness).unwrap();
    s.badge.set_value(brightness, vec![11]);
    s.settle();

    let snapshot = s.link.snapshot();
    assert_eq!(snapshot.generation, 2);
    assert_eq!(snapshot.brightness, 11);
}

#[test]
fn write_landing_mid_refresh_is_published_with_it() {
    let mut s = Session::ready();
    let mut snapshots = s.link.subscribe();

    s.link.set_brightness(12).unwrap();
    s.link.refresh();
    s.step();
    assert!(!snapshots.has_changed().unwrap());

    for _ in 0..6 {
        s.step();
        assert!(!snapshots.has_changed().unwrap());
    }
    s.step();

    assert!(snapshots.has_changed().unwrap());
    let snapshot = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.generation, 2);
    assert_eq!(snapshot.brightness, 12);
}

#[test]
fn writes_while_disconnected_are_skipped() {
    let mut s = Session::new();
    s.link.set_brightness(3).unwrap();
    s.link.set_display_enabled(true).unwrap();
    assert_eq!(s.link.save_dirty_messages().unwrap(), 0);
    s.settle();
    assert!(s.badge.dispatched().is_empty());
}

#[test]
fn unbonded_badge_bonds_first() {
    let mut s = Session::with_badge(|badge| badge.unbonded(false));
    s.link.connect();
    s.pump.drain();
    assert_eq!(s.link.state(), LinkState::Bonding);

    s.badge.finish_bonding();
    s.settle();
    assert_eq!(s.link.state(), LinkState::Ready);
    assert!(s.link.snapshot().is_synced());
}

#[test]
fn rejected_bond_returns_to_disconnected() {
    let mut s = Session::with_badge(|badge| badge.unbonded(false));
    let mut notices = s.link.notices();
    s.link.connect();
    s.badge.reject_bonding();
    s.pump.drain();

    assert_eq!(s.link.state(), LinkState::Disconnected);
    let errors = std::iter::from_fn(|| notices.try_recv().ok())
        .filter(|notice| matches!(notice, LinkNotice::Error(_)))
        .count();
    assert_eq!(errors, 1);
}

#[test]
fn live_link_skips_to_discovery() {
    let mut s = Session::with_badge(|badge| badge.with_link_up());
    let mut notices = s.link.notices();
    s.link.connect();
    assert_eq!(s.link.state(), LinkState::ServiceDiscovery);
    s.settle();
    assert_eq!(s.link.state(), LinkState::Ready);
    assert_eq!(
        notices.try_recv().unwrap(),
        LinkNotice::StateChanged {
            from: LinkState::Disconnected,
            to: LinkState::ServiceDiscovery
        }
    );
}

#[test]
fn stale_completion_after_close_is_ignored() {
    let (tx, rx) = event_channel();
    let badge = Arc::new(SimulatedBadge::new("C0:FF:EE:00:00:02", tx.clone()));
    let link = Arc::new(BadgeLink::new(badge.clone(), tx.clone(), LinkConfig::default()));
    let mut pump = EventPump::new(link.clone(), rx);
    link.connect();
    pump.drain();

    let brightness = badge.handle(Register::Brightness).unwrap();
    link.close();
    tx.send(TransportEvent::ReadComplete {
        handle: brightness,
        result: Ok(Bytes::from_static(&[1])),
    })
    .unwrap();
    pump.drain();

    assert_eq!(link.state(), LinkState::Disconnected);
    assert!(!link.snapshot().is_synced());
    assert!(!badge.is_link_up());
}

#[test]
fn discovery_without_badge_service_is_terminal() {
    let mut s = Session::with_badge(|badge| badge.without_badge_service());
    let mut notices = s.link.notices();
    s.link.connect();
    s.settle();

    assert_eq!(s.link.state(), LinkState::ServiceDiscovery);
    assert!(!s.link.snapshot().is_synced());
    assert!(s.badge.dispatched().is_empty());

    let errors: Vec<String> = std::iter::from_fn(|| notices.try_recv().ok())
        .filter_map(|notice| match notice {
            LinkNotice::Error(message) => Some(message),
            LinkNotice::StateChanged { .. } => None,
        })
        .collect();
    assert_eq!(
        errors,
        [format!("service {BADGE_SERVICE} not offered by device")]
    );
}
