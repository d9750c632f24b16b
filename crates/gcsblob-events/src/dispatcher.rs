use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use gcsblob_core::EventSettings;

use crate::cloud_event::{CloudEvent, CloudEventFactory};
use crate::error::EventResult;
use crate::kinds::{ContentEvent, ContentEventKind};
use crate::publisher::Publisher;
use crate::source::ContentEvents;

/// Turns content events into CloudEvents and queues them for the worker.
///
/// `notify` never waits: when the queue is full the event is dropped and a
/// warning is logged.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: mpsc::Sender<CloudEvent>,
    factory: CloudEventFactory,
    kinds: BTreeSet<ContentEventKind>,
}

/// Drains the queue into a [`Publisher`]. Spawn [`DispatchWorker::run`].
pub struct DispatchWorker {
    receiver: mpsc::Receiver<CloudEvent>,
    publisher: Arc<dyn Publisher>,
}

impl EventDispatcher {
    pub fn new(
        settings: &EventSettings,
        publisher: Arc<dyn Publisher>,
    ) -> EventResult<(Self, DispatchWorker)> {
        let kinds = if !settings.enabled {
            BTreeSet::new()
        } else {
            match &settings.kinds {
                Some(names) => names
                    .iter()
                    .map(|n| n.parse::<ContentEventKind>())
                    .collect::<EventResult<BTreeSet<_>>>()?,
                None => ContentEventKind::ALL.into_iter().collect(),
            }
        };

        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let dispatcher = EventDispatcher {
            sender,
            factory: CloudEventFactory::new(settings.source_url.clone()),
            kinds,
        };
        Ok((dispatcher, DispatchWorker { receiver, publisher }))
    }

    pub fn is_enabled(&self, kind: ContentEventKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn enabled_kinds(&self) -> impl Iterator<Item = ContentEventKind> + '_ {
        self.kinds.iter().copied()
    }

    /// Queue an event. Returns whether it was accepted.
    pub fn notify(&self, kind: ContentEventKind, event: &ContentEvent) -> bool {
        if !self.is_enabled(kind) {
            return false;
        }
        let cloud_event = self.factory.build(kind, event);
        match self.sender.try_send(cloud_event) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    event_type = %dropped.event_type,
                    subject = %dropped.subject,
                    "event queue full, dropping content event"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(%kind, "event worker stopped, dropping content event");
                false
            }
        }
    }

    /// Subscribe one handler per enabled kind. Returns the number registered.
    pub fn register(&self, events: &ContentEvents) -> usize {
        if self.kinds.is_empty() {
            tracing::info!("content event publishing is disabled");
            return 0;
        }
        for kind in self.enabled_kinds() {
            let dispatcher = self.clone();
            events.subscribe(
                kind,
                Arc::new(move |event: &ContentEvent| {
                    dispatcher.notify(kind, event);
                }),
            );
        }
        tracing::info!(kinds = self.kinds.len(), "content event publishing ready");
        self.kinds.len()
    }
}

impl DispatchWorker {
    /// Runs until every dispatcher handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            if let Err(e) = self.publisher.publish(&event).await {
                tracing::error!(
                    event_type = %event.event_type,
                    subject = %event.subject,
                    "failed to publish content event: {e}"
                );
            }
        }
        tracing::debug!("event worker finished");
    }
}
