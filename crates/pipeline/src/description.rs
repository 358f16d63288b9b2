//! Launch descriptions for the pipelines and input sub-graphs Mixcast runs.

use std::path::Path;

use mixcast_common::error::{MixcastError, MixcastResult};

use crate::layout::Canvas;
use crate::track::{MediaKind, TrackId};

/// H.264 baseline encoder with in-band parameter sets.
pub fn encoder_fragment() -> &'static str {
    if cfg!(target_os = "macos") {
        "vtenc_h264 realtime=true allow-frame-reordering=false max-keyframe-interval=60 ! video/x-h264,profile=baseline ! h264parse config-interval=1"
    } else {
        "x264enc bframes=0 speed-preset=ultrafast key-int-max=60 ! video/x-h264,profile=baseline ! h264parse config-interval=1"
    }
}

pub fn decoder_fragment() -> &'static str {
    if cfg!(target_os = "macos") {
        "vtdec"
    } else {
        "avdec_h264"
    }
}

/// Codecs an RTP input track can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCodec {
    Opus,
    G722,
    Vp8,
    Vp9,
    H264,
}

impl InputCodec {
    /// Parse a MIME type such as `video/H264` (case-insensitive).
    pub fn from_mime(mime: &str) -> MixcastResult<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "audio/opus" => Ok(InputCodec::Opus),
            "audio/g722" => Ok(InputCodec::G722),
            "video/vp8" => Ok(InputCodec::Vp8),
            "video/vp9" => Ok(InputCodec::Vp9),
            "video/h264" => Ok(InputCodec::H264),
            _ => Err(MixcastError::unsupported(format!(
                "no input pipeline for codec {mime}"
            ))),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            InputCodec::Opus | InputCodec::G722 => MediaKind::Audio,
            InputCodec::Vp8 | InputCodec::Vp9 | InputCodec::H264 => MediaKind::Video,
        }
    }

    /// RTP caps, depayloader and decoder for this codec.
    fn depay_decode(&self, payload_type: u8) -> String {
        match self {
            InputCodec::Opus => format!(
                "application/x-rtp,media=audio,encoding-name=OPUS,clock-rate=48000,payload={payload_type} ! rtpopusdepay ! opusdec"
            ),
            InputCodec::G722 => format!(
                "application/x-rtp,media=audio,encoding-name=G722,clock-rate=8000,payload={payload_type} ! rtpg722depay ! avdec_g722"
            ),
            InputCodec::Vp8 => format!(
                "application/x-rtp,media=video,encoding-name=VP8,clock-rate=90000,payload={payload_type} ! rtpvp8depay ! vp8dec"
            ),
            InputCodec::Vp9 => format!(
                "application/x-rtp,media=video,encoding-name=VP9,clock-rate=90000,payload={payload_type} ! rtpvp9depay ! vp9dec"
            ),
            InputCodec::H264 => format!(
                "application/x-rtp,media=video,encoding-name=H264,clock-rate=90000,payload={payload_type} ! rtph264depay ! h264parse config-interval=1 ! queue ! {}",
                decoder_fragment()
            ),
        }
    }
}

/// Sub-graph for one RTP input track: a push source named after the track,
/// depayload, decode, and convert to raw media ready for the compositor or
/// mixer.
pub fn input_track(track_id: &TrackId, codec: InputCodec, payload_type: u8) -> String {
    let convert = match codec.kind() {
        MediaKind::Video => "videoconvert ! queue",
        MediaKind::Audio => "audioconvert ! audioresample ! queue",
    };
    format!(
        "appsrc format=time is-live=true do-timestamp=true name={} ! {} ! {convert}",
        quote(track_id.as_str()),
        codec.depay_decode(payload_type)
    )
}

/// Decode a media file and re-encode it to H.264 and Opus into two
/// pull sinks.
pub fn file_producer(path: &Path, video_sink: &str, audio_sink: &str) -> String {
    format!(
        "filesrc location={} ! decodebin name=demux \
         demux. ! queue ! videoconvert ! {} ! video/x-h264,stream-format=byte-stream,profile=baseline ! appsink name={} \
         demux. ! queue ! {}",
        quote(&path.to_string_lossy()),
        encoder_fragment(),
        quote(video_sink),
        opus_branch(audio_sink)
    )
}

/// Test pattern and tone encoded to H.264 and Opus into two pull sinks.
pub fn test_producer(video_sink: &str, audio_sink: &str) -> String {
    format!(
        "videotestsrc is-live=true ! video/x-raw,width=1280,height=720 ! queue ! {} ! video/x-h264,stream-format=byte-stream,profile=baseline ! appsink name={} \
         audiotestsrc is-live=true wave=ticks ! queue ! {}",
        encoder_fragment(),
        quote(video_sink),
        opus_branch(audio_sink)
    )
}

fn opus_branch(audio_sink: &str) -> String {
    format!(
        "audioconvert ! audioresample ! audio/x-raw,rate=48000,channels=2 ! opusenc ! appsink name={}",
        quote(audio_sink)
    )
}

/// A received remote track to play back locally.
#[derive(Debug, Clone)]
pub struct PlaybackTrack {
    pub track_id: TrackId,
    pub codec: InputCodec,
    pub payload_type: u8,
}

/// Receive-side pipeline: each track is pushed into its own source and
/// rendered to the default audio/video output.
pub fn playback(
    audio: Option<&PlaybackTrack>,
    video: Option<&PlaybackTrack>,
) -> MixcastResult<String> {
    let mut branches = Vec::new();
    for (track, expected) in [(audio, MediaKind::Audio), (video, MediaKind::Video)] {
        let Some(track) = track else {
            continue;
        };
        if track.codec.kind() != expected {
            return Err(MixcastError::unsupported(format!(
                "{:?} cannot be played as {expected:?}",
                track.codec
            )));
        }
        let sink = match expected {
            MediaKind::Audio => "autoaudiosink",
            MediaKind::Video => "autovideosink sync=false",
        };
        branches.push(format!(
            "{} ! {sink}",
            input_track(&track.track_id, track.codec, track.payload_type)
        ));
    }

    if branches.is_empty() {
        return Err(MixcastError::graph_construction(
            "playback needs at least one track",
        ));
    }
    Ok(branches.join(" "))
}

/// Where the composited output goes in addition to local preview.
#[derive(Debug, Clone, Default)]
pub struct CompositeOutputs {
    /// Record to an MP4 file.
    pub save_path: Option<String>,
    /// Publish to an RTMP endpoint.
    pub stream_url: Option<String>,
    /// Render a local preview window and speaker output.
    pub preview: bool,
}

/// Compositing pipeline.
///
/// `compositor_name` gets a background test pattern as its reserved base
/// input and `mixer_name` a silent base input; attached tracks are linked
/// to both. Raw output is split by the `vtee`/`atee` tees into the
/// configured outputs.
pub fn compositor(
    canvas: Canvas,
    compositor_name: &str,
    mixer_name: &str,
    outputs: &CompositeOutputs,
) -> String {
    let width = canvas.width;
    let height = canvas.height;
    let mut parts = vec![
        format!(
            "compositor name={compositor_name} background=black ! video/x-raw,width={width},height={height} ! tee name=vtee allow-not-linked=true"
        ),
        format!(
            "videotestsrc is-live=true pattern=black ! video/x-raw,width={width},height={height},framerate=30/1 ! {compositor_name}."
        ),
        format!("audiomixer name={mixer_name} ! tee name=atee allow-not-linked=true"),
        format!("audiotestsrc is-live=true wave=silence ! {mixer_name}."),
    ];

    if outputs.preview {
        parts.push("vtee. ! queue ! videoconvert ! autovideosink sync=false".to_string());
        parts.push("atee. ! queue ! audioconvert ! autoaudiosink".to_string());
    }

    if outputs.save_path.is_some() || outputs.stream_url.is_some() {
        parts.push(format!(
            "vtee. ! queue ! videoconvert ! {} ! tee name=venctee",
            encoder_fragment()
        ));
        parts.push(
            "atee. ! queue ! audioconvert ! audioresample ! avenc_aac ! aacparse ! tee name=aenctee"
                .to_string(),
        );
    }

    if let Some(path) = &outputs.save_path {
        parts.push(format!(
            "qtmux name=savemux ! queue ! filesink location={} async=false sync=false",
            quote(path)
        ));
        parts.push("venctee. ! queue ! savemux.".to_string());
        parts.push("aenctee. ! queue ! savemux.".to_string());
    }

    if let Some(url) = &outputs.stream_url {
        parts.push(format!(
            "flvmux name=streammux streamable=true ! queue ! rtmpsink location={} async=false sync=false",
            quote(url)
        ));
        parts.push("venctee. ! queue ! streammux.".to_string());
        parts.push("aenctee. ! queue ! streammux.".to_string());
    }

    parts.join(" ")
}

/// Video test input sub-graph for the compositor.
pub fn test_video_input(pattern: &str, canvas: Canvas) -> String {
    format!(
        "videotestsrc is-live=true pattern={pattern} ! video/x-raw,width={},height={},framerate=30/1 ! videoconvert ! queue",
        canvas.width / 2,
        canvas.height / 2
    )
}

/// Audio test input sub-graph for the mixer.
pub fn test_audio_input(frequency_hz: u32) -> String {
    format!(
        "audiotestsrc is-live=true freq={frequency_hz} volume=0.2 ! audioconvert ! audioresample ! queue"
    )
}

/// Quote a launch property value.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_from_mime_is_case_insensitive() {
        assert_eq!(InputCodec::from_mime("video/H264").unwrap(), InputCodec::H264);
        assert_eq!(InputCodec::from_mime("AUDIO/OPUS").unwrap(), InputCodec::Opus);
        assert_eq!(InputCodec::G722.kind(), MediaKind::Audio);
        assert_eq!(InputCodec::Vp9.kind(), MediaKind::Video);
    }

    #[test]
    fn unknown_codec_is_unsupported() {
        let err = InputCodec::from_mime("video/av1").unwrap_err();
        assert!(err.to_string().contains("video/av1"));
    }

    #[test]
    fn input_track_names_source_after_track() {
        let desc = input_track(&TrackId::new("cam-1"), InputCodec::Vp8, 96);
        assert!(desc.starts_with("appsrc format=time is-live=true do-timestamp=true name=\"cam-1\""));
        assert!(desc.contains("payload=96 ! rtpvp8depay ! vp8dec"));
        assert!(desc.ends_with("videoconvert ! queue"));
    }

    #[test]
    fn audio_input_track_ends_in_raw_audio() {
        let desc = input_track(&TrackId::new("mic"), InputCodec::Opus, 111);
        assert!(desc.contains("rtpopusdepay ! opusdec"));
        assert!(desc.ends_with("audioconvert ! audioresample ! queue"));
    }

    #[test]
    fn compositor_reserves_base_inputs() {
        let desc = compositor(Canvas::FULL_HD, "vmix", "amix", &CompositeOutputs::default());
        assert!(desc.contains("compositor name=vmix"));
        assert!(desc.contains("width=1920,height=1080,framerate=30/1 ! vmix."));
        assert!(desc.contains("audiotestsrc is-live=true wave=silence ! amix."));
        assert!(!desc.contains("savemux"));
        assert!(!desc.contains("autovideosink"));
    }

    #[test]
    fn compositor_outputs_share_one_encoder() {
        let outputs = CompositeOutputs {
            save_path: Some("/tmp/out.mp4".to_string()),
            stream_url: Some("rtmp://live.example/app/key".to_string()),
            preview: true,
        };
        let desc = compositor(Canvas::FULL_HD, "vmix", "amix", &outputs);
        assert_eq!(desc.matches("tee name=venctee").count(), 1);
        assert!(desc.contains("filesink location=\"/tmp/out.mp4\""));
        assert!(desc.contains("rtmpsink location=\"rtmp://live.example/app/key\""));
        assert!(desc.contains("autovideosink"));
    }

    #[test]
    fn playback_rejects_mismatched_kind() {
        let track = PlaybackTrack {
            track_id: TrackId::new("a"),
            codec: InputCodec::H264,
            payload_type: 102,
        };
        assert!(playback(Some(&track), None).is_err());
        assert!(playback(None, None).is_err());
        let desc = playback(None, Some(&track)).unwrap();
        assert!(desc.ends_with("autovideosink sync=false"));
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        let desc = file_producer(Path::new("/media/a \"b\".mkv"), "v", "a");
        assert!(desc.contains(r#"location="/media/a \"b\".mkv""#));
    }
}
