//! Background refresh of the viewer's event list.

use std::{sync::Arc, time::Duration};

use flow::EventFeed;
use shared::{
    domain::UserId,
    event::{EventRecord, NotifStatus},
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, warn};

pub type EventWatcher = watch::Receiver<Vec<EventRecord>>;

pub fn unread_count(events: &[EventRecord]) -> usize {
    events
        .iter()
        .filter(|event| event.notif_status == NotifStatus::Unread)
        .count()
}

/// Polls `feed` every `period` and publishes the viewer's events, newest
/// first. Subscribers only wake when the list changed. The task ends once
/// every receiver is dropped.
pub fn spawn_event_poller<F>(
    feed: Arc<F>,
    viewer: UserId,
    period: Duration,
) -> (EventWatcher, JoinHandle<()>)
where
    F: EventFeed + ?Sized + 'static,
{
    let (tx, rx) = watch::channel(Vec::new());

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => break,
            }

            match feed.events_for_viewer(&viewer).await {
                Ok(events) => {
                    let changed = tx.send_if_modified(|current| {
                        if *current == events {
                            return false;
                        }
                        *current = events;
                        true
                    });
                    if changed {
                        debug!(%viewer, unread = unread_count(&tx.borrow()), "event list refreshed");
                    }
                }
                Err(error) => warn!(%viewer, error = %error, "event refresh failed"),
            }
        }
        debug!(%viewer, "event poller stopped");
    });

    (rx, task)
}

#[cfg(test)]
#[path = "tests/events_tests.rs"]
mod tests;
