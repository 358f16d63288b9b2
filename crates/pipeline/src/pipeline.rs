//! Pipeline lifecycle controller.
//!
//! A [`MediaPipeline`] owns exactly one GStreamer pipeline built from a
//! launch description. State transitions are synchronous state-set requests
//! whose failure is returned to the caller; completion of the transition is
//! not awaited. Asynchronous bus messages are handled by a watch attached
//! to an [`EngineContext`] (see [`crate::bus`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use gst::glib;
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use tokio::sync::mpsc;

use mixcast_common::config::{AppConfig, FailurePolicy, MissingMixerPolicy};
use mixcast_common::error::{MixcastError, MixcastResult};

use crate::attach::AttachedTrack;
use crate::bus::{self, EngineFault, WatchState};
use crate::context::{init_gstreamer, EngineContext};
use crate::layout::Canvas;

/// Observable lifecycle state, read back from the engine on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Paused,
    Playing,
}

impl From<gst::State> for PipelineState {
    fn from(state: gst::State) -> Self {
        match state {
            gst::State::Playing => PipelineState::Playing,
            gst::State::Paused => PipelineState::Paused,
            _ => PipelineState::Stopped,
        }
    }
}

/// Notifications emitted by the bus watch.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// End-of-stream was reached and playback restarted from zero.
    Looped,
    /// An unrecoverable engine fault; the failure policy has been applied.
    Fatal(EngineFault),
}

/// Result of a caller-issued seek. Failures never stop the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    Accepted,
    Rejected,
}

/// Compositor and mixer settings used by input attachment.
#[derive(Debug, Clone)]
pub struct CompositorOptions {
    pub canvas: Canvas,
    pub compositor_name: String,
    pub mixer_name: String,
    pub max_inputs: usize,
    pub missing_mixer_policy: MissingMixerPolicy,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CompositorOptions {
    fn from(config: &AppConfig) -> Self {
        let compositor = &config.compositor;
        Self {
            canvas: Canvas::new(compositor.canvas_width, compositor.canvas_height),
            compositor_name: compositor.compositor_name.clone(),
            mixer_name: compositor.mixer_name.clone(),
            max_inputs: compositor.max_inputs,
            missing_mixer_policy: compositor.missing_mixer_policy,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub failure_policy: FailurePolicy,
    pub compositor: CompositorOptions,
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            failure_policy: config.pipeline.failure_policy,
            compositor: CompositorOptions::from(config),
        }
    }
}

/// Runtime statistics of the buffer bridge and bus watch.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Samples copied out of bound sinks.
    pub samples_delivered: u64,

    /// Payload bytes copied out of bound sinks.
    pub bytes_delivered: u64,

    /// Buffers accepted by push sources.
    pub buffers_pushed: u64,

    /// Pushes addressed to a source that does not exist (yet).
    pub pushes_to_missing_source: u64,

    /// Pushes refused by the source (flushing, EOS).
    pub pushes_rejected: u64,

    /// End-of-stream restarts from position zero.
    pub loop_restarts: u64,
}

impl PipelineStats {
    /// Share of push attempts that did not reach a source, as a percentage.
    pub fn push_miss_rate(&self) -> f64 {
        let missed = self.pushes_to_missing_source + self.pushes_rejected;
        let total = self.buffers_pushed + missed;
        if total == 0 {
            return 0.0;
        }
        missed as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub samples_delivered: AtomicU64,
    pub bytes_delivered: AtomicU64,
    pub buffers_pushed: AtomicU64,
    pub pushes_to_missing_source: AtomicU64,
    pub pushes_rejected: AtomicU64,
    pub loop_restarts: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            samples_delivered: self.samples_delivered.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            buffers_pushed: self.buffers_pushed.load(Ordering::Relaxed),
            pushes_to_missing_source: self.pushes_to_missing_source.load(Ordering::Relaxed),
            pushes_rejected: self.pushes_rejected.load(Ordering::Relaxed),
            loop_restarts: self.loop_restarts.load(Ordering::Relaxed),
        }
    }
}

pub struct MediaPipeline {
    pub(crate) name: String,
    pub(crate) pipeline: gst::Pipeline,
    pub(crate) options: PipelineOptions,
    pub(crate) counters: Arc<Counters>,
    pub(crate) tracks: Mutex<HashMap<crate::TrackId, AttachedTrack>>,
    pub(crate) bound_sinks: Mutex<Vec<gst_app::AppSink>>,
    watch: Mutex<Option<glib::Source>>,
    events_tx: mpsc::UnboundedSender<PipelineEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<PipelineEvent>>>,
}

impl MediaPipeline {
    /// Build a pipeline from a launch description. The graph is constructed
    /// but not running.
    pub fn create(
        name: impl Into<String>,
        description: &str,
        options: PipelineOptions,
    ) -> MixcastResult<Self> {
        init_gstreamer()?;
        let name = name.into();

        // FATAL_ERRORS makes the parser return nothing rather than a
        // partially built graph when any element is missing.
        let element = gst::parse::launch_full(description, None, gst::ParseFlags::FATAL_ERRORS)
            .map_err(|e| {
                MixcastError::graph_construction(format!("Failed to build pipeline {name}: {e}"))
            })?;

        let pipeline = element.dynamic_cast::<gst::Pipeline>().map_err(|_| {
            MixcastError::graph_construction(format!(
                "Description for {name} did not produce a pipeline"
            ))
        })?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::debug!(pipeline = %name, "Pipeline constructed");

        Ok(Self {
            name,
            pipeline,
            options,
            counters: Arc::new(Counters::default()),
            tracks: Mutex::new(HashMap::new()),
            bound_sinks: Mutex::new(Vec::new()),
            watch: Mutex::new(None),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying GStreamer pipeline.
    pub fn element(&self) -> &gst::Pipeline {
        &self.pipeline
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Attach the bus watch to `context`, then start playing.
    ///
    /// May be called once per pipeline; later calls fail with
    /// `AlreadyStarted` and leave the running watch untouched. A stopped
    /// context would never dispatch the watch and is rejected.
    pub fn start(&self, context: &EngineContext) -> MixcastResult<()> {
        if !context.is_running() {
            return Err(MixcastError::engine(format!(
                "Cannot start {}: engine context is stopped",
                self.name
            )));
        }
        {
            let mut watch = lock(&self.watch);
            if watch.is_some() {
                return Err(MixcastError::AlreadyStarted {
                    pipeline: self.name.clone(),
                });
            }

            let bus = self.pipeline.bus().ok_or_else(|| {
                MixcastError::engine(format!("Pipeline {} has no bus", self.name))
            })?;

            let state = WatchState {
                name: self.name.clone(),
                pipeline: self.pipeline.downgrade(),
                policy: self.options.failure_policy,
                events: self.events_tx.clone(),
                counters: self.counters.clone(),
            };
            let source = bus.create_watch(
                Some("mixcast-bus-watch"),
                glib::Priority::DEFAULT,
                move |_bus, msg| bus::handle_message(&state, msg),
            );
            source.attach(Some(context.main_context()));
            *watch = Some(source);
        }

        tracing::info!(pipeline = %self.name, "Bus watch attached; starting pipeline");
        self.request_state(gst::State::Playing)
    }

    pub fn play(&self) -> MixcastResult<()> {
        self.request_state(gst::State::Playing)
    }

    pub fn pause(&self) -> MixcastResult<()> {
        self.request_state(gst::State::Paused)
    }

    /// Set the graph to `Null`. The graph itself is kept for reuse.
    pub fn stop(&self) -> MixcastResult<()> {
        self.request_state(gst::State::Null)
    }

    /// Flushing, key-unit aligned seek to an absolute position.
    pub fn seek(&self, position: Duration) -> SeekOutcome {
        let Some(target) = clock_time(position) else {
            tracing::warn!(pipeline = %self.name, ?position, "Seek position out of range; playback continues");
            return SeekOutcome::Rejected;
        };
        match flush_seek(&self.pipeline, target) {
            Ok(()) => {
                tracing::debug!(pipeline = %self.name, position = %target, "Seek issued");
                SeekOutcome::Accepted
            }
            Err(e) => {
                let err = MixcastError::seek(format!("{target}: {e}"));
                tracing::warn!(pipeline = %self.name, error = %err, "Seek rejected; playback continues");
                SeekOutcome::Rejected
            }
        }
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from(self.pipeline.current_state())
    }

    pub fn is_started(&self) -> bool {
        lock(&self.watch).is_some()
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Take the receiver of bus watch events. Returns `None` after the
    /// first call.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<PipelineEvent>> {
        lock(&self.events_rx).take()
    }

    fn request_state(&self, target: gst::State) -> MixcastResult<()> {
        self.pipeline
            .set_state(target)
            .map_err(|e| MixcastError::StateChange {
                pipeline: self.name.clone(),
                target: format!("{target:?}"),
                message: format!("{e:?}"),
            })?;
        tracing::debug!(pipeline = %self.name, ?target, "State change requested");
        Ok(())
    }
}

impl Drop for MediaPipeline {
    fn drop(&mut self) {
        if let Some(source) = lock(&self.watch).take() {
            source.destroy();
        }
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(pipeline = %self.name, error = ?e, "Failed to tear down pipeline");
        }
    }
}

/// Flushing seek used both by callers and by the end-of-stream restart.
pub(crate) fn flush_seek(
    pipeline: &gst::Pipeline,
    target: gst::ClockTime,
) -> Result<(), glib::BoolError> {
    pipeline.seek_simple(
        gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT | gst::SeekFlags::SKIP,
        target,
    )
}

/// Engine clock time for `position`, if the engine can represent it.
pub(crate) fn clock_time(position: Duration) -> Option<gst::ClockTime> {
    u64::try_from(position.as_nanos())
        .ok()
        .filter(|nanos| *nanos <= gst::ClockTime::MAX.nseconds())
        .map(gst::ClockTime::from_nseconds)
}

/// Lock a bookkeeping mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_states_collapse_to_three() {
        assert_eq!(PipelineState::from(gst::State::Null), PipelineState::Stopped);
        assert_eq!(PipelineState::from(gst::State::Ready), PipelineState::Stopped);
        assert_eq!(PipelineState::from(gst::State::Paused), PipelineState::Paused);
        assert_eq!(PipelineState::from(gst::State::Playing), PipelineState::Playing);
    }

    #[test]
    fn push_miss_rate_counts_missing_and_rejected() {
        let stats = PipelineStats {
            buffers_pushed: 6,
            pushes_to_missing_source: 3,
            pushes_rejected: 1,
            ..Default::default()
        };
        assert!((stats.push_miss_rate() - 40.0).abs() < 1e-9);
        assert_eq!(PipelineStats::default().push_miss_rate(), 0.0);
    }

    #[test]
    fn seek_positions_beyond_engine_range_are_refused() {
        assert_eq!(
            clock_time(Duration::from_millis(1500)),
            Some(gst::ClockTime::from_mseconds(1500))
        );
        assert_eq!(clock_time(Duration::ZERO), Some(gst::ClockTime::ZERO));
        assert!(clock_time(Duration::MAX).is_none());
        assert!(clock_time(Duration::from_nanos(u64::MAX)).is_none());
    }

    #[test]
    fn options_follow_config() {
        let mut config = AppConfig::default();
        config.compositor.canvas_width = 1280;
        config.compositor.canvas_height = 720;
        config.pipeline.failure_policy = FailurePolicy::StopPipeline;
        let options = PipelineOptions::from(&config);
        assert_eq!(options.compositor.canvas, Canvas::new(1280, 720));
        assert_eq!(options.failure_policy, FailurePolicy::StopPipeline);
        assert_eq!(options.compositor.compositor_name, "vmix");
    }
}
