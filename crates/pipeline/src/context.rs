//! Engine context: GStreamer initialisation and the event-dispatch loop.
//!
//! Bus watches need a running GLib main loop to be dispatched. Instead of a
//! process-wide loop, each [`EngineContext`] owns a private main context and
//! runs it on its own thread between [`EngineContext::start`] and
//! [`EngineContext::stop`].

use std::sync::OnceLock;
use std::thread::JoinHandle;
use std::time::Duration;

use gst::glib;
use gstreamer as gst;

use mixcast_common::error::{MixcastError, MixcastResult};

pub struct EngineContext {
    main_context: glib::MainContext,
    main_loop: glib::MainLoop,
    thread: Option<JoinHandle<()>>,
}

impl EngineContext {
    /// Initialise GStreamer and start dispatching on a dedicated thread.
    pub fn start() -> MixcastResult<Self> {
        init_gstreamer()?;

        let main_context = glib::MainContext::new();
        let main_loop = glib::MainLoop::new(Some(&main_context), false);

        let loop_handle = main_loop.clone();
        let thread = std::thread::Builder::new()
            .name("mixcast-engine".to_string())
            .spawn(move || {
                tracing::debug!("Engine dispatch loop running");
                loop_handle.run();
                tracing::debug!("Engine dispatch loop exited");
            })?;

        // A quit issued before `run` has started would be lost.
        while !main_loop.is_running() && !thread.is_finished() {
            std::thread::sleep(Duration::from_millis(1));
        }

        Ok(Self {
            main_context,
            main_loop,
            thread: Some(thread),
        })
    }

    /// The context bus watches are attached to.
    pub fn main_context(&self) -> &glib::MainContext {
        &self.main_context
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some() && self.main_loop.is_running()
    }

    /// Quit the dispatch loop and wait for its thread.
    ///
    /// Watches attached to this context stop being dispatched; pipelines
    /// keep processing media on their own streaming threads.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.main_loop.quit();
        if thread.join().is_err() {
            tracing::warn!("Engine dispatch thread panicked");
        }
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Initialise GStreamer once per process.
pub fn init_gstreamer() -> MixcastResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(MixcastError::engine(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}
