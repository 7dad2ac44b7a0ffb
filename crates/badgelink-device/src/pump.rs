use std::sync::Arc;

use badgelink_transport::EventReceiver;

use crate::link::BadgeLink;

/// Feeds transport events into a [`BadgeLink`].
///
/// Events are handled one at a time, in arrival order. Handling an event may
/// queue more events (a refused dispatch, an automatic completion); those are
/// handled by the same pump.
pub struct EventPump {
    link: Arc<BadgeLink>,
    events: EventReceiver,
}

impl EventPump {
    pub fn new(link: Arc<BadgeLink>, events: EventReceiver) -> Self {
        Self { link, events }
    }

    pub fn link(&self) -> &Arc<BadgeLink> {
        &self.link
    }

    /// Handle every event already queued, including ones queued while
    /// handling. Returns how many were handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.link.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Handle events until every sender is gone.
    ///
    /// With an operation timeout configured, the pump also wakes at that
    /// interval to expire stalled operations.
    #[cfg(feature = "async")]
    pub async fn run(mut self) {
        let tick = self.link.config().operation_timeout();
        loop {
            let next = match tick {
                Some(period) => match tokio::time::timeout(period, self.events.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.link.expire_stalled();
                        continue;
                    }
                },
                None => self.events.recv().await,
            };

            let Some(event) = next else {
                tracing::debug!(address = %self.link.address(), "event channel closed, pump stopping");
                return;
            };
            self.link.handle_event(event);
            self.link.expire_stalled();
        }
    }
}
