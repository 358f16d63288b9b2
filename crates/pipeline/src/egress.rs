//! Egress adapter: copy samples out of named pull sinks.
//!
//! Every delivered [`EgressSample`] owns a deep copy of the sample's bytes.
//! The engine's sample is released before the consumer sees the copy, so
//! the graph's buffer pool never waits on caller-side processing.

use std::sync::atomic::Ordering;
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use tokio::sync::mpsc;

use mixcast_common::error::{MixcastError, MixcastResult};

use crate::pipeline::{lock, MediaPipeline};
use crate::track::TrackId;

/// One produced sample, detached from engine memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressSample {
    /// Identifier bound to the sink at registration time.
    pub track_id: TrackId,
    pub data: Vec<u8>,
    pub duration: Option<Duration>,
    pub pts: Option<Duration>,
}

impl EgressSample {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Unbounded sequence of samples from one bound sink.
///
/// Samples are queued from the engine's streaming thread without blocking;
/// dropping the stream discards further samples.
#[derive(Debug)]
pub struct SampleStream {
    track_id: TrackId,
    rx: mpsc::UnboundedReceiver<EgressSample>,
}

impl SampleStream {
    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    /// Wait for the next sample. `None` once the pipeline is gone.
    pub async fn recv(&mut self) -> Option<EgressSample> {
        self.rx.recv().await
    }

    /// Blocking variant for consumers outside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<EgressSample> {
        self.rx.blocking_recv()
    }

    /// Take a sample if one is queued.
    pub fn try_recv(&mut self) -> Option<EgressSample> {
        self.rx.try_recv().ok()
    }
}

impl MediaPipeline {
    /// Bind the `appsink` named `sink_name` to `track_id` and return the
    /// stream of its samples.
    pub fn bind_sink(
        &self,
        sink_name: &str,
        track_id: impl Into<TrackId>,
    ) -> MixcastResult<SampleStream> {
        let track_id = track_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = self.name.clone();
        let sink = sink_name.to_string();

        self.bind_sink_with(sink_name, track_id.clone(), move |sample| {
            if tx.send(sample).is_err() {
                tracing::trace!(%pipeline, %sink, "Sample stream dropped; discarding sample");
            }
        })?;

        Ok(SampleStream { track_id, rx })
    }

    /// Bind the `appsink` named `sink_name` to `track_id`, invoking
    /// `on_sample` once per produced sample.
    ///
    /// The callback runs on an engine streaming thread and must hand long
    /// work off elsewhere. Each sink element can be bound once; removing
    /// the input track that contains it releases the binding.
    pub fn bind_sink_with<F>(
        &self,
        sink_name: &str,
        track_id: impl Into<TrackId>,
        on_sample: F,
    ) -> MixcastResult<()>
    where
        F: FnMut(EgressSample) + Send + 'static,
    {
        let track_id = track_id.into();
        let appsink = self
            .pipeline
            .by_name(sink_name)
            .ok_or_else(|| MixcastError::missing_element("pull sink", sink_name))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| MixcastError::missing_element("pull sink", sink_name))?;

        // Bindings are per element; a re-attached input brings a new sink.
        let mut bound = lock(&self.bound_sinks);
        if bound.contains(&appsink) {
            return Err(MixcastError::AlreadyBound {
                sink: sink_name.to_string(),
            });
        }

        let counters = self.counters.clone();
        let mut on_sample = on_sample;
        let callback_track = track_id.clone();
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    if let Some(sample) = copy_sample(sink, &callback_track) {
                        counters.samples_delivered.fetch_add(1, Ordering::Relaxed);
                        counters
                            .bytes_delivered
                            .fetch_add(sample.len() as u64, Ordering::Relaxed);
                        on_sample(sample);
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        bound.push(appsink);
        tracing::debug!(pipeline = %self.name, sink = sink_name, track = %track_id, "Sink bound to track");
        Ok(())
    }
}

/// Pull one sample and duplicate its bytes. The engine's sample is dropped
/// when this returns, before the copy reaches the consumer.
fn copy_sample(sink: &gst_app::AppSink, track_id: &TrackId) -> Option<EgressSample> {
    // Spurious wake (flushing, EOS): nothing to deliver.
    let sample = sink.pull_sample().ok()?;
    let buffer = sample.buffer()?;

    let map = match buffer.map_readable() {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(track = %track_id, error = %e, "Failed to map sample buffer");
            return None;
        }
    };

    Some(EgressSample {
        track_id: track_id.clone(),
        data: map.as_slice().to_vec(),
        duration: buffer.duration().map(|d| Duration::from_nanos(d.nseconds())),
        pts: buffer.pts().map(|t| Duration::from_nanos(t.nseconds())),
    })
}
