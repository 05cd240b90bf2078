//! Background consumer turning driver events into progress lines.
//!
//! The driver (producer) and the listener (consumer) are connected by a
//! bounded channel. The producer never waits: when the queue is full the
//! newest event is dropped and counted. The listener task ends once every
//! [`EventSink`] has been dropped and the queue is drained.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::debug;

use super::report::Reporter;
use crate::domain::Event;

/// Default capacity of the event queue
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Producer side of the event queue
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Queue an event without blocking; drops it if the queue is full
    pub fn emit(&self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %event.kind, "Event queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Number of events dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Counters returned when the listener stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Events consumed
    pub received: u64,

    /// Service instances reported as available
    pub services_up: usize,

    /// Events dropped on overflow
    pub dropped: u64,
}

/// Formats events into progress lines for one project
pub struct EventListener {
    project_name: String,
    total_services: usize,
    up_count: usize,
    reporter: Arc<dyn Reporter>,
}

impl EventListener {
    pub fn new(
        project_name: impl Into<String>,
        total_services: usize,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            total_services,
            up_count: 0,
            reporter,
        }
    }

    /// Spawn the listener task and return the producer side of its queue
    pub fn spawn(self, capacity: usize) -> (EventSink, JoinHandle<ListenerStats>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let sink = EventSink {
            tx,
            dropped: Arc::clone(&dropped),
        };

        let handle = tokio::spawn(self.run(rx, dropped));
        (sink, handle)
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Event>,
        dropped: Arc<AtomicU64>,
    ) -> ListenerStats {
        let mut received = 0u64;
        while let Some(event) = rx.recv().await {
            received += 1;
            let line = self.progress_line(&event);
            self.reporter.debug(&line);
        }

        let stats = ListenerStats {
            received,
            services_up: self.up_count,
            dropped: dropped.load(Ordering::Relaxed),
        };

        if stats.dropped > 0 {
            self.reporter.warn(&format!(
                "Project [{}]: {} progress events were dropped",
                self.project_name, stats.dropped
            ));
        }

        stats
    }

    /// Update the running count and format the line for `event`
    pub fn progress_line(&mut self, event: &Event) -> String {
        if event.kind.is_service_up() {
            self.up_count += 1;
        }

        let data = event.data_pairs();
        let line = match &event.service {
            None => format!("Project [{}]: {} {}", self.project_name, event.kind, data),
            Some(service) => format!(
                "[{}/{}] [{}]: {} {}",
                self.up_count, self.total_services, service, event.kind, data
            ),
        };

        line.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::{Level, MemoryReporter};
    use crate::domain::EventKind;

    fn listener(reporter: Arc<MemoryReporter>) -> EventListener {
        EventListener::new("demo", 2, reporter)
    }

    #[test]
    fn test_progress_line_formats() {
        let mut l = listener(Arc::new(MemoryReporter::new()));

        let line = l.progress_line(&Event::project(EventKind::ProjectUpStart));
        assert_eq!(line, "Project [demo]: Starting project");

        let line = l.progress_line(
            &Event::service(EventKind::ServiceCreated, "web").with_data("container", "demo-web-1"),
        );
        assert_eq!(line, "[0/2] [web]: Created container=demo-web-1");

        let line = l.progress_line(&Event::service(EventKind::ServiceUp, "web"));
        assert_eq!(line, "[1/2] [web]: Started");

        let line = l.progress_line(&Event::service(EventKind::ServiceUp, "db"));
        assert_eq!(line, "[2/2] [db]: Started");
    }

    #[tokio::test]
    async fn test_listener_drains_and_stops_when_sink_dropped() {
        let reporter = Arc::new(MemoryReporter::new());
        let (sink, handle) = listener(Arc::clone(&reporter)).spawn(8);

        sink.emit(Event::project(EventKind::ProjectUpStart));
        sink.emit(Event::service(EventKind::ServiceUp, "web"));
        sink.emit(Event::project(EventKind::ProjectUpDone));
        drop(sink);

        let stats = handle.await.unwrap();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.services_up, 1);
        assert_eq!(stats.dropped, 0);

        let lines = reporter.messages(Level::Debug);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "[1/2] [web]: Started");
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest_without_blocking() {
        let reporter = Arc::new(MemoryReporter::new());
        let (tx, rx) = mpsc::channel(1);
        let dropped = Arc::new(AtomicU64::new(0));
        let sink = EventSink {
            tx,
            dropped: Arc::clone(&dropped),
        };

        // Nothing consumes yet, so only the first event fits
        sink.emit(Event::service(EventKind::ServiceUp, "web"));
        sink.emit(Event::service(EventKind::ServiceUp, "db"));
        sink.emit(Event::service(EventKind::ServiceUp, "cache"));
        assert_eq!(sink.dropped(), 2);
        drop(sink);

        let stats = listener(Arc::clone(&reporter)).run(rx, dropped).await;
        assert_eq!(stats.received, 1);
        assert_eq!(stats.dropped, 2);
        assert_eq!(reporter.messages(Level::Warn).len(), 1);
    }
}
