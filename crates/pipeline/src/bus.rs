//! Bus watch: end-of-stream looping and engine fault escalation.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use gst::glib;
use gst::prelude::*;
use gstreamer as gst;
use tokio::sync::mpsc;

use mixcast_common::config::FailurePolicy;
use mixcast_common::error::MixcastError;

use crate::pipeline::{flush_seek, Counters, PipelineEvent};

/// A fault reported by the engine, or a failed end-of-stream restart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineFault {
    /// Path of the element that posted the error, if known.
    pub element: Option<String>,
    /// Human-readable error text.
    pub message: String,
    /// Engine debug details.
    pub debug: Option<String>,
}

impl From<EngineFault> for MixcastError {
    fn from(fault: EngineFault) -> Self {
        match fault.element {
            Some(element) => MixcastError::unrecoverable(format!("{element}: {}", fault.message)),
            None => MixcastError::unrecoverable(fault.message),
        }
    }
}

/// Everything the watch needs, owned by the watch closure.
pub(crate) struct WatchState {
    pub name: String,
    pub pipeline: glib::WeakRef<gst::Pipeline>,
    pub policy: FailurePolicy,
    pub events: mpsc::UnboundedSender<PipelineEvent>,
    pub counters: Arc<Counters>,
}

pub(crate) fn handle_message(state: &WatchState, msg: &gst::Message) -> glib::ControlFlow {
    let Some(pipeline) = state.pipeline.upgrade() else {
        return glib::ControlFlow::Break;
    };

    match msg.view() {
        gst::MessageView::Eos(_) => {
            tracing::debug!(pipeline = %state.name, "End of stream; restarting from zero");
            match flush_seek(&pipeline, gst::ClockTime::ZERO) {
                Ok(()) => {
                    state.counters.loop_restarts.fetch_add(1, Ordering::Relaxed);
                    let _ = state.events.send(PipelineEvent::Looped);
                }
                Err(e) => escalate(
                    state,
                    &pipeline,
                    EngineFault {
                        element: None,
                        message: format!("End-of-stream restart failed: {e}"),
                        debug: None,
                    },
                ),
            }
        }
        gst::MessageView::Error(err) => escalate(
            state,
            &pipeline,
            EngineFault {
                element: err.src().map(|s| s.path_string().to_string()),
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            },
        ),
        gst::MessageView::Warning(warning) => {
            tracing::warn!(
                pipeline = %state.name,
                element = ?warning.src().map(|s| s.path_string()),
                "{}",
                warning.error()
            );
        }
        _ => {}
    }

    glib::ControlFlow::Continue
}

fn escalate(state: &WatchState, pipeline: &gst::Pipeline, fault: EngineFault) {
    tracing::error!(
        pipeline = %state.name,
        element = ?fault.element,
        debug = ?fault.debug,
        policy = ?state.policy,
        "Unrecoverable engine error: {}",
        fault.message
    );
    let _ = state.events.send(PipelineEvent::Fatal(fault.clone()));

    match state.policy {
        FailurePolicy::ExitProcess => {
            eprintln!("{}: unrecoverable engine error: {}", state.name, fault);
            std::process::exit(1);
        }
        FailurePolicy::StopPipeline => {
            if let Err(e) = pipeline.set_state(gst::State::Null) {
                tracing::warn!(pipeline = %state.name, error = ?e, "Failed to stop faulted pipeline");
            }
        }
    }
}
