//! Run the compositor and attach test inputs to it.

use std::path::PathBuf;
use std::time::Duration;

use mixcast_common::config::AppConfig;
use mixcast_common::error::MixcastError;
use mixcast_pipeline::description::{self, CompositeOutputs};
use mixcast_pipeline::{
    EngineContext, EngineFault, InputTrackSpec, MediaPipeline, PipelineEvent, PipelineOptions,
};

const PATTERNS: &[&str] = &[
    "smpte", "ball", "snow", "pinwheel", "spokes", "gradient", "circular", "checkers-8",
];

pub async fn run(
    config: &AppConfig,
    inputs: usize,
    save: Option<PathBuf>,
    stream: Option<String>,
    preview: bool,
) -> anyhow::Result<()> {
    let options = PipelineOptions::from(config);
    let canvas = options.compositor.canvas;
    let outputs = CompositeOutputs {
        save_path: save.map(|p| p.to_string_lossy().into_owned()),
        stream_url: stream,
        preview,
    };
    let desc = description::compositor(
        canvas,
        &options.compositor.compositor_name,
        &options.compositor.mixer_name,
        &outputs,
    );

    let mut context = EngineContext::start()?;
    let pipeline = MediaPipeline::create("composite", &desc, options)?;
    let mut events = pipeline
        .events()
        .ok_or_else(|| anyhow::anyhow!("event receiver already taken"))?;
    pipeline.start(&context)?;

    for index in 0..inputs {
        let pattern = PATTERNS[index % PATTERNS.len()];
        let spec = InputTrackSpec::video(
            format!("test-video-{index}"),
            description::test_video_input(pattern, canvas),
        );
        let handle = pipeline.add_input_track(&spec)?;
        println!("Attached {} ({pattern})", handle.track_id);
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let audio = InputTrackSpec::audio("test-audio", description::test_audio_input(440));
    pipeline.add_input_track(&audio)?;

    if let Ok(report) = pipeline.relayout_compositor() {
        println!(
            "Compositing {} input(s) on a {}x{} grid",
            report.inputs(),
            report.grid.rows,
            report.grid.cols
        );
    }

    println!("Press Ctrl+C to stop...");

    let result: anyhow::Result<()> = tokio::select! {
        _ = tokio::signal::ctrl_c() => Ok(()),
        Some(fault) = wait_for_fatal(&mut events) => Err(MixcastError::from(fault).into()),
    };

    pipeline.stop()?;
    context.stop();
    result
}

async fn wait_for_fatal(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>,
) -> Option<EngineFault> {
    while let Some(event) = events.recv().await {
        match event {
            PipelineEvent::Looped => tracing::debug!("Compositor looped"),
            PipelineEvent::Fatal(fault) => return Some(fault),
        }
    }
    None
}
