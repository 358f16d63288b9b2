//! Mixcast Pipeline
//!
//! Runs GStreamer pipelines built from launch descriptions and bridges
//! media buffers between them and application code. Input tracks can be
//! attached to a running compositing pipeline, which is relaid out on a
//! grid every time its set of video inputs changes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    MediaPipeline                      │
//! │                                                       │
//! │  push(name, bytes)         bind_sink(name, track)     │
//! │        │                          ▲                   │
//! │        ▼                          │                   │
//! │  ┌──────────┐   ┌────────────┐  ┌─┴────────┐          │
//! │  │ appsrc   │──▶│ vmix/amix  │─▶│ appsink  │          │
//! │  │ (input)  │   │ (relayout) │  │ (egress) │          │
//! │  └──────────┘   └────────────┘  └──────────┘          │
//! │                        │                              │
//! │                        ▼ bus                          │
//! │  ┌─────────────────────────────────────────────────┐  │
//! │  │ EngineContext: EOS → seek(0), Error → policy    │  │
//! │  └─────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod attach;
pub mod bus;
pub mod compositor;
pub mod context;
pub mod description;
pub mod egress;
pub mod ingest;
pub mod layout;
pub mod pipeline;
pub mod track;

pub use attach::{InputTrackHandle, InputTrackSpec};
pub use bus::EngineFault;
pub use compositor::LayoutReport;
pub use context::EngineContext;
pub use egress::{EgressSample, SampleStream};
pub use ingest::PushOutcome;
pub use layout::{compute_layout, Canvas, Grid, LayoutSlot};
pub use pipeline::{
    CompositorOptions, MediaPipeline, PipelineEvent, PipelineOptions, PipelineState,
    PipelineStats, SeekOutcome,
};
pub use track::{MediaKind, TrackId};
