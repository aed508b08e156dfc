//! Background control-loop thread.
//!
//! `ControlLoopHandle` owns exactly one thread running [`ControlLoop::run`].
//! Dropping the handle requests shutdown and joins the thread, so the link is
//! always torn down before the handle goes away.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crate::control_loop::ControlLoop;
use crate::state::DeskHandle;

pub struct ControlLoopHandle {
    desk: DeskHandle,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl ControlLoopHandle {
    pub fn spawn(mut control_loop: ControlLoop) -> std::io::Result<Self> {
        let desk = control_loop.handle();
        let shutdown = control_loop.shutdown_flag();
        let join_handle = std::thread::Builder::new()
            .name("desk-control".into())
            .spawn(move || {
                control_loop.run();
                tracing::trace!("control thread exiting cleanly");
            })?;
        Ok(Self {
            desk,
            shutdown,
            join_handle: Some(join_handle),
        })
    }

    pub fn desk(&self) -> &DeskHandle {
        &self.desk
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Request shutdown and wait for the thread to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits after its current tick; a reconnect backoff is the
        // longest it can be blocked.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("control thread joined"),
                Err(e) => tracing::warn!(?e, "control thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for ControlLoopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
