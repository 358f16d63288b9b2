//! Ingest adapter: copy caller bytes into named push sources.

use std::sync::atomic::Ordering;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;

use mixcast_common::error::{MixcastError, MixcastResult};

use crate::pipeline::MediaPipeline;

/// What happened to a pushed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Enqueued on the source; the graph consumes it at its own pace.
    Queued,
    /// No element with that name exists (yet). Nothing was pushed.
    MissingSource,
    /// The source refused the buffer, e.g. while flushing or after EOS.
    Rejected(gst::FlowError),
}

impl MediaPipeline {
    /// Copy `bytes` into a new buffer and push it on the `appsrc` named
    /// `element_name`.
    ///
    /// The slice is not referenced after this returns. Pushing to a source
    /// that is not attached yet is not an error; it reports
    /// [`PushOutcome::MissingSource`].
    pub fn push(&self, element_name: &str, bytes: &[u8]) -> MixcastResult<PushOutcome> {
        let Some(src) = self.app_src(element_name)? else {
            self.counters
                .pushes_to_missing_source
                .fetch_add(1, Ordering::Relaxed);
            tracing::trace!(pipeline = %self.name, element = element_name, "Push to missing source dropped");
            return Ok(PushOutcome::MissingSource);
        };

        let buffer = gst::Buffer::from_slice(bytes.to_vec());
        match src.push_buffer(buffer) {
            Ok(_) => {
                self.counters.buffers_pushed.fetch_add(1, Ordering::Relaxed);
                Ok(PushOutcome::Queued)
            }
            Err(flow) => {
                self.counters.pushes_rejected.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(pipeline = %self.name, element = element_name, ?flow, "Source refused buffer");
                Ok(PushOutcome::Rejected(flow))
            }
        }
    }

    /// Signal end-of-stream on a named `appsrc`, e.g. when the remote track
    /// feeding it has ended.
    pub fn end_of_stream(&self, element_name: &str) -> MixcastResult<()> {
        let src = self
            .app_src(element_name)?
            .ok_or_else(|| MixcastError::missing_element("push source", element_name))?;
        src.end_of_stream().map_err(|flow| {
            MixcastError::engine(format!(
                "{element_name} refused end-of-stream: {flow:?}"
            ))
        })?;
        Ok(())
    }

    /// Resolve a push source by name at call time. Dynamic attachment can
    /// add sources at any moment, so the handle is never cached.
    fn app_src(&self, element_name: &str) -> MixcastResult<Option<gst_app::AppSrc>> {
        let Some(element) = self.pipeline.by_name(element_name) else {
            return Ok(None);
        };
        element
            .dynamic_cast::<gst_app::AppSrc>()
            .map(Some)
            .map_err(|_| MixcastError::missing_element("push source", element_name))
    }
}
