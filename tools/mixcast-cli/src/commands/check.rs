//! Check GStreamer and the element factories Mixcast relies on.

use gstreamer as gst;

use mixcast_pipeline::context::init_gstreamer;

const REQUIRED: &[(&str, &str)] = &[
    ("appsrc", "ingest"),
    ("appsink", "egress"),
    ("compositor", "video compositing"),
    ("audiomixer", "audio mixing"),
    ("videotestsrc", "compositor background"),
    ("audiotestsrc", "mixer base input"),
    ("videoconvert", "input conversion"),
    ("audioconvert", "input conversion"),
    ("audioresample", "input conversion"),
];

const OPTIONAL: &[(&str, &str)] = &[
    ("x264enc", "H.264 encoding"),
    ("vtenc_h264", "H.264 encoding (macOS)"),
    ("avdec_h264", "H.264 decoding"),
    ("opusenc", "Opus encoding"),
    ("opusdec", "Opus decoding"),
    ("vp8dec", "VP8 decoding"),
    ("vp9dec", "VP9 decoding"),
    ("qtmux", "saving to file"),
    ("flvmux", "RTMP publishing"),
    ("rtmpsink", "RTMP publishing"),
];

pub fn run() -> anyhow::Result<()> {
    println!("Mixcast System Check");
    println!("{}", "=".repeat(50));

    init_gstreamer()?;
    let (major, minor, micro, _) = gst::version();
    println!("[OK] GStreamer {major}.{minor}.{micro}");

    println!();
    let mut missing_required = 0;
    for (factory, purpose) in REQUIRED {
        if gst::ElementFactory::find(factory).is_some() {
            println!("[OK]   {factory:<14} {purpose}");
        } else {
            missing_required += 1;
            println!("[FAIL] {factory:<14} {purpose}");
        }
    }
    for (factory, purpose) in OPTIONAL {
        let status = if gst::ElementFactory::find(factory).is_some() {
            "[OK]  "
        } else {
            "[WARN]"
        };
        println!("{status} {factory:<14} {purpose}");
    }

    println!();
    if missing_required == 0 {
        println!("All required elements are available. Mixcast is ready.");
    } else {
        println!("{missing_required} required element(s) missing. Install the GStreamer base/good plugin sets.");
    }

    Ok(())
}
