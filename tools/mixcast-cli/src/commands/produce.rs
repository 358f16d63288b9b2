//! Run a producer pipeline and count the samples each track delivers.

use std::path::PathBuf;
use std::time::Duration;

use mixcast_common::config::AppConfig;
use mixcast_common::error::MixcastError;
use mixcast_pipeline::description;
use mixcast_pipeline::{EngineContext, MediaPipeline, PipelineEvent, PipelineOptions, SeekOutcome};

const VIDEO_SINK: &str = "video";
const AUDIO_SINK: &str = "audio";

pub async fn run(
    config: &AppConfig,
    path: Option<PathBuf>,
    seek: Option<f64>,
) -> anyhow::Result<()> {
    let desc = match &path {
        Some(path) => {
            println!("Producing from: {}", path.display());
            description::file_producer(path, VIDEO_SINK, AUDIO_SINK)
        }
        None => {
            println!("Producing test pattern");
            description::test_producer(VIDEO_SINK, AUDIO_SINK)
        }
    };

    let mut context = EngineContext::start()?;
    let pipeline = MediaPipeline::create("producer", &desc, PipelineOptions::from(config))?;
    let mut video = pipeline.bind_sink(VIDEO_SINK, "video-track")?;
    let mut audio = pipeline.bind_sink(AUDIO_SINK, "audio-track")?;
    let mut events = pipeline
        .events()
        .ok_or_else(|| anyhow::anyhow!("event receiver already taken"))?;

    pipeline.start(&context)?;

    if let Some(secs) = seek {
        let position = Duration::try_from_secs_f64(secs)?;
        // Seeking needs prerolled data; give the graph a moment to get there.
        tokio::time::sleep(Duration::from_millis(500)).await;
        match pipeline.seek(position) {
            SeekOutcome::Accepted => println!("Seeked to {secs:.1}s"),
            SeekOutcome::Rejected => println!("Seek to {secs:.1}s was rejected"),
        }
    }

    println!("Press Ctrl+C to stop...");
    println!();

    let mut video_samples = 0u64;
    let mut audio_samples = 0u64;
    let mut report = tokio::time::interval(Duration::from_secs(2));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(_) = video.recv() => video_samples += 1,
            Some(_) = audio.recv() => audio_samples += 1,
            Some(event) = events.recv() => match event {
                PipelineEvent::Looped => println!("End of stream; looping"),
                PipelineEvent::Fatal(fault) => {
                    pipeline.stop()?;
                    context.stop();
                    return Err(MixcastError::from(fault).into());
                }
            },
            _ = report.tick() => {
                println!("video: {video_samples} samples, audio: {audio_samples} samples");
            }
        }
    }

    pipeline.stop()?;
    context.stop();

    let stats = pipeline.stats();
    println!();
    println!("Samples delivered: {}", stats.samples_delivered);
    println!("Bytes delivered:   {}", stats.bytes_delivered);
    println!("Loop restarts:     {}", stats.loop_restarts);
    Ok(())
}
