/*!
# Runtime

Owns the shared state (flow table, event bus, clock, metrics) and wires it
to the outside world: one capture thread per attached direction feeding a
[`Pipeline`], a task draining the event bus into an [`EventProcessor`], and
the flow maintenance task.
*/

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, instrument, warn};

use flowvakt_capture::{CaptureError, LiveCapture};
use flowvakt_config::FlowvaktConfig;
use flowvakt_core::events::EventBus;
use flowvakt_core::flow::FlowMetricsStore;
use flowvakt_core::packet::Direction;
use flowvakt_core::time::{Clock, MonotonicClock};
use flowvakt_telemetry::MetricsRecorder;

use crate::error::RuntimeError;
use crate::maintenance::{FlowMaintenance, FlowReport};
use crate::pipeline::Pipeline;
use crate::processor::EventProcessor;

type AttachedSet = Arc<Mutex<HashSet<Direction>>>;

/// Totals for one `Runtime::run`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Frames delivered by each capture, per direction.
    pub frames: Vec<(Direction, u64)>,
    pub events_processed: u64,
    pub events_published: u64,
    pub events_dropped: u64,
    pub active_flows: usize,
}

pub struct Runtime {
    config: Arc<FlowvaktConfig>,
    store: Arc<FlowMetricsStore>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    metrics: MetricsRecorder,
    attached: AttachedSet,
}

impl Runtime {
    pub fn new(config: FlowvaktConfig) -> Result<Self, RuntimeError> {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: FlowvaktConfig, clock: Arc<dyn Clock>) -> Result<Self, RuntimeError> {
        debug!(core = ?config.core, "Initializing runtime");

        let bus = EventBus::with_capacity(config.core.event_bus.capacity)?;
        let store = Arc::new(FlowMetricsStore::with_max_entries(
            config.core.flow_table.max_entries,
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            bus,
            clock,
            metrics: MetricsRecorder::new()?,
            attached: Arc::default(),
        })
    }

    pub fn store(&self) -> &Arc<FlowMetricsStore> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// A pipeline for `direction` sharing this runtime's state.
    pub fn pipeline(&self, direction: Direction) -> Pipeline {
        Pipeline::new(
            direction,
            Arc::clone(&self.store),
            self.bus.share(),
            Arc::clone(&self.clock),
            &self.metrics,
        )
    }

    pub fn maintenance(&self) -> FlowMaintenance {
        FlowMaintenance::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.metrics.clone(),
            &self.config,
        )
    }

    pub fn report(&self) -> FlowReport {
        FlowReport::capture(&self.store, self.clock.now_ns())
    }

    /// Directions enabled in the capture configuration.
    pub fn directions(&self) -> Vec<Direction> {
        let capture = &self.config.capture;
        [
            (capture.ingress, Direction::Inbound),
            (capture.egress, Direction::Outbound),
        ]
        .into_iter()
        .filter_map(|(enabled, direction)| enabled.then_some(direction))
        .collect()
    }

    /// Starts capturing `direction` on the configured interface.
    ///
    /// Each direction can be attached at most once at a time; dropping or
    /// detaching the returned handle frees it.
    #[instrument(skip(self), fields(interface = %self.config.capture.interface))]
    pub fn attach(&self, direction: Direction) -> Result<Attachment, RuntimeError> {
        if !self.attached.lock().insert(direction) {
            return Err(RuntimeError::AlreadyAttached(direction));
        }

        let spawned = LiveCapture::open(&self.config.capture, direction)
            .map_err(RuntimeError::from)
            .and_then(|capture| self.spawn_capture(capture));

        match spawned {
            Ok(attachment) => Ok(attachment),
            Err(err) => {
                self.attached.lock().remove(&direction);
                Err(err)
            }
        }
    }

    fn spawn_capture(&self, mut capture: LiveCapture) -> Result<Attachment, RuntimeError> {
        let direction = capture.direction();
        let pipeline = self.pipeline(direction);
        let terminate = Arc::new(AtomicBool::new(false));

        let thread = thread::Builder::new()
            .name(format!("capture-{direction}"))
            .spawn({
                let terminate = Arc::clone(&terminate);
                move || {
                    capture.run(&terminate, |frame| {
                        pipeline.process(frame);
                    })
                }
            })?;

        Ok(Attachment {
            direction,
            terminate,
            thread: Some(thread),
            attached: Arc::clone(&self.attached),
        })
    }

    /// Attaches every configured direction and observes until `shutdown`
    /// resolves or a capture stops on its own.
    #[instrument(skip_all, fields(interface = %self.config.capture.interface))]
    pub async fn run<F>(
        &self,
        processor: Arc<dyn EventProcessor>,
        shutdown: F,
    ) -> Result<RunSummary, RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let mut attachments = Vec::new();
        for direction in self.directions() {
            match self.attach(direction) {
                Ok(attachment) => attachments.push(attachment),
                Err(err) => {
                    for (direction, result) in detach_all(attachments).await? {
                        if let Err(err) = result {
                            warn!(%direction, error = %err, "Capture ended with error");
                        }
                    }
                    return Err(err);
                }
            }
        }

        let consumer = tokio::spawn(consume(self.bus.share(), processor));
        let (stop_tx, stop_rx) = watch::channel(false);
        let maintenance = tokio::spawn(self.maintenance().run(stop_rx));

        info!(directions = attachments.len(), "Observing traffic");
        tokio::pin!(shutdown);
        let mut health = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = health.tick() => {
                    if attachments.iter().any(Attachment::is_finished) {
                        warn!("Capture stopped unexpectedly");
                        break;
                    }
                }
            }
        }

        let mut summary = RunSummary::default();
        let mut capture_error = None;
        for (direction, result) in detach_all(attachments).await? {
            match result {
                Ok(frames) => summary.frames.push((direction, frames)),
                Err(err) => {
                    error!(%direction, error = %err, "Capture failed");
                    capture_error.get_or_insert(err);
                }
            }
        }

        self.bus.close();
        let _ = stop_tx.send(true);
        maintenance.await?;
        summary.events_processed = consumer.await??;
        summary.events_published = self.bus.published();
        summary.events_dropped = self.bus.dropped();
        summary.active_flows = self.store.len();

        match capture_error {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}

/// Detaches every attachment off the async workers; joining a capture
/// thread blocks for up to one read timeout.
async fn detach_all(
    attachments: Vec<Attachment>,
) -> Result<Vec<(Direction, Result<u64, RuntimeError>)>, RuntimeError> {
    let mut results = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let direction = attachment.direction();
        let result = tokio::task::spawn_blocking(move || attachment.detach()).await?;
        results.push((direction, result));
    }
    Ok(results)
}

/// Feeds records from `bus` to `processor` until the bus is closed and
/// drained. Returns the number of records processed.
pub async fn consume(
    bus: EventBus,
    processor: Arc<dyn EventProcessor>,
) -> Result<u64, RuntimeError> {
    let mut processed = 0u64;
    loop {
        match bus.recv() {
            Some(record) => {
                processed += 1;
                if let Err(err) = processor.process(&record).await {
                    warn!(error = %err, "Event processor failed");
                }
            }
            None if bus.is_drained() => break,
            // Queue empty, avoid busy-spin
            None => sleep(Duration::from_millis(10)).await,
        }
    }
    processor.finish().await?;
    debug!(processed, "Event consumer stopped");
    Ok(processed)
}

/// A running capture for one direction.
///
/// Dropping the handle stops the capture; [`Attachment::detach`] does the
/// same and reports how it ended.
pub struct Attachment {
    direction: Direction,
    terminate: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<u64, CaptureError>>>,
    attached: AttachedSet,
}

impl Attachment {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The capture thread has exited, normally only after a capture error.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stops the capture and waits for its thread. Returns the number of
    /// frames it delivered.
    ///
    /// Blocks for up to one capture read timeout.
    pub fn detach(mut self) -> Result<u64, RuntimeError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<u64, RuntimeError> {
        self.terminate.store(true, Ordering::Relaxed);
        let joined = match self.thread.take() {
            Some(thread) => thread.join(),
            None => return Ok(0),
        };
        self.attached.lock().remove(&self.direction);
        info!(direction = %self.direction, "Capture detached");

        match joined {
            Ok(result) => Ok(result?),
            Err(_) => Err(RuntimeError::Processing(format!(
                "{} capture thread panicked",
                self.direction
            ))),
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(direction = %self.direction, error = %err, "Capture ended with error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowvakt_capture::Frame;
    use flowvakt_core::packet::PacketRecord;
    use flowvakt_core::time::VirtualClock;
    use flowvakt_protocols::testing::FrameBuilder;

    #[derive(Default)]
    struct Collect(Mutex<Vec<PacketRecord>>);

    #[async_trait]
    impl EventProcessor for Collect {
        async fn process(&self, record: &PacketRecord) -> Result<(), RuntimeError> {
            self.0.lock().push(*record);
            Ok(())
        }
    }

    fn runtime(config: FlowvaktConfig) -> Runtime {
        Runtime::with_clock(config, Arc::new(VirtualClock::new(0))).unwrap()
    }

    #[test]
    fn directions_follow_configuration() {
        let mut config = FlowvaktConfig::default();
        assert_eq!(
            runtime(config.clone()).directions(),
            vec![Direction::Inbound, Direction::Outbound]
        );

        config.capture.ingress = false;
        assert_eq!(runtime(config).directions(), vec![Direction::Outbound]);
    }

    #[test]
    fn invalid_bus_capacity_is_rejected() {
        let mut config = FlowvaktConfig::default();
        config.core.event_bus.capacity = 1000;
        assert!(matches!(
            Runtime::new(config),
            Err(RuntimeError::EventBus(_))
        ));
    }

    #[test]
    fn failed_attach_releases_the_direction() {
        let mut config = FlowvaktConfig::default();
        config.capture.interface = "fv-missing0".into();
        let runtime = runtime(config);

        for _ in 0..2 {
            assert!(matches!(
                runtime.attach(Direction::Inbound),
                Err(RuntimeError::Capture(_))
            ));
        }
        assert!(runtime.attached.lock().is_empty());
    }

    fn idle_attachment(runtime: &Runtime, direction: Direction, frames: u64) -> Attachment {
        runtime.attached.lock().insert(direction);
        let terminate = Arc::new(AtomicBool::new(false));
        let thread = thread::spawn({
            let terminate = Arc::clone(&terminate);
            move || {
                while !terminate.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(5));
                }
                Ok(frames)
            }
        });
        Attachment {
            direction,
            terminate,
            thread: Some(thread),
            attached: Arc::clone(&runtime.attached),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn detach_all_stops_captures_and_frees_directions() {
        let runtime = runtime(FlowvaktConfig::default());
        let attachments = vec![
            idle_attachment(&runtime, Direction::Inbound, 3),
            idle_attachment(&runtime, Direction::Outbound, 7),
        ];

        let results = detach_all(attachments).await.unwrap();

        let frames: Vec<(Direction, u64)> = results
            .into_iter()
            .map(|(direction, result)| (direction, result.unwrap()))
            .collect();
        assert_eq!(
            frames,
            vec![(Direction::Inbound, 3), (Direction::Outbound, 7)]
        );
        assert!(runtime.attached.lock().is_empty());
    }

    #[tokio::test]
    async fn run_reports_attach_failure_and_holds_nothing() {
        let mut config = FlowvaktConfig::default();
        config.capture.interface = "fv-missing0".into();
        let runtime = runtime(config);

        let result = runtime
            .run(Arc::new(Collect::default()), std::future::pending())
            .await;

        assert!(matches!(result, Err(RuntimeError::Capture(_))));
        assert!(runtime.attached.lock().is_empty());
        assert!(!runtime.bus().is_closed());
    }

    #[tokio::test]
    async fn consumer_drains_until_closed() {
        let runtime = runtime(FlowvaktConfig::default());
        let egress = runtime.pipeline(Direction::Outbound);
        for port in 1000..1003 {
            let frame = FrameBuilder::udp_v4([10, 0, 0, 2], port, [10, 0, 0, 1], 53).build();
            egress.process(Frame::whole(&frame));
        }

        let collect = Arc::new(Collect::default());
        let consumer = tokio::spawn(consume(runtime.bus().share(), collect.clone()));
        runtime.bus().close();

        assert_eq!(consumer.await.unwrap().unwrap(), 3);
        let ports: Vec<u16> = collect.0.lock().iter().map(|r| r.src_port).collect();
        assert_eq!(ports, vec![1000, 1001, 1002]);
        assert_eq!(runtime.report().active_flows, 3);
    }
}
