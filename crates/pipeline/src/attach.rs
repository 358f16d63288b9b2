//! Dynamic input attachment.
//!
//! Each input track is a sub-graph parsed from a description, added to the
//! live pipeline and linked to the compositor (video) or mixer (audio).
//! The track registry is shared between caller threads, so every mutation
//! happens under its lock, including the relayout that follows it.

use gst::prelude::*;
use gstreamer as gst;

use mixcast_common::config::MissingMixerPolicy;
use mixcast_common::error::{MixcastError, MixcastResult};

use crate::compositor::{relayout, LayoutReport};
use crate::pipeline::{lock, MediaPipeline};
use crate::track::{MediaKind, TrackId};

/// Description of one input to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTrackSpec {
    pub track_id: TrackId,
    /// Launch description of the sub-graph. Its single unlinked source pad
    /// becomes the sub-graph's output.
    pub description: String,
    pub kind: MediaKind,
}

impl InputTrackSpec {
    pub fn video(track_id: impl Into<TrackId>, description: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            description: description.into(),
            kind: MediaKind::Video,
        }
    }

    pub fn audio(track_id: impl Into<TrackId>, description: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            description: description.into(),
            kind: MediaKind::Audio,
        }
    }
}

/// An attached input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTrackHandle {
    pub track_id: TrackId,
    pub kind: MediaKind,
    /// Name of the sub-graph bin inside the pipeline.
    pub bin_name: String,
    /// Whether the sub-graph is linked to the compositor or mixer.
    pub linked: bool,
}

pub(crate) struct AttachedTrack {
    handle: InputTrackHandle,
    bin: gst::Bin,
    mixer_pad: Option<gst::Pad>,
}

impl MediaPipeline {
    /// Attach an input sub-graph to the running pipeline.
    ///
    /// The sub-graph is linked before its state is synced with the parent,
    /// so it never pushes into an unlinked pad, and the compositor is
    /// relaid out only once the new pad is connected.
    pub fn add_input_track(&self, spec: &InputTrackSpec) -> MixcastResult<InputTrackHandle> {
        let mut tracks = lock(&self.tracks);
        if tracks.contains_key(&spec.track_id) {
            return Err(MixcastError::attach(format!(
                "input track {} is already attached",
                spec.track_id
            )));
        }
        if spec.kind.is_video() {
            self.check_compositor_capacity()?;
        }

        let bin = gst::parse::bin_from_description_full(
            &spec.description,
            true,
            None,
            gst::ParseFlags::FATAL_ERRORS,
        )
        .map_err(|e| {
            MixcastError::graph_construction(format!(
                "Failed to build input track {}: {e}",
                spec.track_id
            ))
        })?
        .dynamic_cast::<gst::Bin>()
        .map_err(|_| {
            MixcastError::graph_construction(format!(
                "Description for input track {} did not produce a bin",
                spec.track_id
            ))
        })?;

        let bin_name = format!("input-{}", spec.track_id);
        bin.set_property("name", bin_name.as_str());

        self.pipeline.add(&bin).map_err(|e| {
            MixcastError::attach(format!("Failed to add input track {}: {e}", spec.track_id))
        })?;

        let mixer_pad = match self.link_input(&bin, spec.kind) {
            Ok(pad) => Some(pad),
            Err(err) => match self.options.compositor.missing_mixer_policy {
                MissingMixerPolicy::BestEffort => {
                    tracing::warn!(
                        pipeline = %self.name,
                        track = %spec.track_id,
                        error = %err,
                        "Input attached without a mixer link"
                    );
                    None
                }
                MissingMixerPolicy::Fail => {
                    self.discard_bin(&bin);
                    return Err(err);
                }
            },
        };

        if let Err(e) = bin.sync_state_with_parent() {
            if let Some(pad) = &mixer_pad {
                release_mixer_pad(pad);
            }
            self.discard_bin(&bin);
            return Err(MixcastError::attach(format!(
                "Input track {} could not follow the pipeline state: {e}",
                spec.track_id
            )));
        }

        let handle = InputTrackHandle {
            track_id: spec.track_id.clone(),
            kind: spec.kind,
            bin_name,
            linked: mixer_pad.is_some(),
        };

        if spec.kind.is_video() && handle.linked {
            if let Err(e) = self.relayout_compositor() {
                tracing::warn!(pipeline = %self.name, error = %e, "Relayout after attach failed");
            }
        }

        tracing::info!(
            pipeline = %self.name,
            track = %handle.track_id,
            kind = ?handle.kind,
            linked = handle.linked,
            "Input track attached"
        );

        tracks.insert(
            spec.track_id.clone(),
            AttachedTrack {
                handle: handle.clone(),
                bin,
                mixer_pad,
            },
        );
        Ok(handle)
    }

    /// Detach an input: stop its sub-graph, remove it, release the mixer
    /// pad it occupied, and relayout the remaining video inputs.
    ///
    /// The track stays registered until its bin is out of the pipeline, so
    /// a failed removal can be retried.
    pub fn remove_input_track(&self, track_id: &TrackId) -> MixcastResult<()> {
        let mut tracks = lock(&self.tracks);
        let track = tracks
            .get(track_id)
            .ok_or_else(|| MixcastError::attach(format!("no input track {track_id}")))?;

        track
            .bin
            .set_state(gst::State::Null)
            .map_err(|e| MixcastError::StateChange {
                pipeline: track.handle.bin_name.clone(),
                target: "Null".to_string(),
                message: format!("{e:?}"),
            })?;
        self.pipeline.remove(&track.bin).map_err(|e| {
            MixcastError::attach(format!("Failed to remove input track {track_id}: {e}"))
        })?;

        let Some(track) = tracks.remove(track_id) else {
            return Ok(());
        };
        if let Some(pad) = &track.mixer_pad {
            release_mixer_pad(pad);
        }
        lock(&self.bound_sinks).retain(|sink| !sink.has_as_ancestor(&track.bin));

        if track.handle.kind.is_video() && track.handle.linked {
            if let Err(e) = self.relayout_compositor() {
                tracing::warn!(pipeline = %self.name, error = %e, "Relayout after removal failed");
            }
        }

        tracing::info!(pipeline = %self.name, track = %track_id, "Input track removed");
        Ok(())
    }

    /// Attached inputs, ordered by track id.
    pub fn input_tracks(&self) -> Vec<InputTrackHandle> {
        let mut handles: Vec<_> = lock(&self.tracks)
            .values()
            .map(|t| t.handle.clone())
            .collect();
        handles.sort_by(|a, b| a.track_id.cmp(&b.track_id));
        handles
    }

    /// The sub-graph bin of an attached input.
    pub fn input_bin(&self, track_id: &TrackId) -> Option<gst::Bin> {
        lock(&self.tracks).get(track_id).map(|t| t.bin.clone())
    }

    /// Recompute the compositor layout from its current pads.
    pub fn relayout_compositor(&self) -> MixcastResult<LayoutReport> {
        let options = &self.options.compositor;
        let compositor = self
            .pipeline
            .by_name(&options.compositor_name)
            .ok_or_else(|| MixcastError::missing_element("compositor", &options.compositor_name))?;
        relayout(&compositor, options.canvas, options.max_inputs)
    }

    fn link_input(&self, bin: &gst::Bin, kind: MediaKind) -> MixcastResult<gst::Pad> {
        let options = &self.options.compositor;
        let (role, name) = match kind {
            MediaKind::Video => ("compositor", options.compositor_name.as_str()),
            MediaKind::Audio => ("mixer", options.mixer_name.as_str()),
        };

        let mixer = self
            .pipeline
            .by_name(name)
            .ok_or_else(|| MixcastError::missing_element(role, name))?;
        let src = bin.static_pad("src").ok_or_else(|| {
            MixcastError::attach(format!("{} has no unlinked source pad", bin.name()))
        })?;

        bin.link(&mixer).map_err(|e| {
            MixcastError::attach(format!("Failed to link {} to {role} '{name}': {e}", bin.name()))
        })?;

        src.peer()
            .ok_or_else(|| MixcastError::attach(format!("{} link has no peer pad", bin.name())))
    }

    fn check_compositor_capacity(&self) -> MixcastResult<()> {
        let options = &self.options.compositor;
        let Some(compositor) = self.pipeline.by_name(&options.compositor_name) else {
            return Ok(());
        };
        let inputs = compositor.sink_pads().len().saturating_sub(1);
        if inputs >= options.max_inputs {
            return Err(MixcastError::layout(format!(
                "compositor '{}' already holds {inputs} of {} inputs",
                options.compositor_name, options.max_inputs
            )));
        }
        Ok(())
    }

    fn discard_bin(&self, bin: &gst::Bin) {
        if let Err(e) = bin.set_state(gst::State::Null) {
            tracing::warn!(pipeline = %self.name, bin = %bin.name(), error = ?e, "Failed to stop input bin");
        }
        if let Err(e) = self.pipeline.remove(bin) {
            tracing::warn!(pipeline = %self.name, bin = %bin.name(), error = %e, "Failed to discard input bin");
        }
    }
}

fn release_mixer_pad(pad: &gst::Pad) {
    if let Some(mixer) = pad.parent_element() {
        mixer.release_request_pad(pad);
    }
}
