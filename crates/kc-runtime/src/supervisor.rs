//! One thread per control loop.

use crate::driver::{ControlLoop, LoopSummary};
use crate::error::{RuntimeError, RuntimeResult};
use crate::stop::{StopHandle, stop_channel};
use std::thread::{self, JoinHandle};

/// A loop running on its own thread.
///
/// Dropping the handle stops the loop and waits for it.
#[derive(Debug)]
pub struct LoopHandle {
    id: String,
    stop: StopHandle,
    thread: Option<JoinHandle<RuntimeResult<LoopSummary>>>,
}

/// Move `control_loop` to a new thread and start it.
pub fn spawn_loop(mut control_loop: ControlLoop) -> RuntimeResult<LoopHandle> {
    let id = control_loop.id().to_string();
    let (stop, signal) = stop_channel();
    let thread = thread::Builder::new()
        .name(format!("loop-{id}"))
        .spawn(move || control_loop.run(&signal))
        .map_err(|e| RuntimeError::Thread {
            loop_id: id.clone(),
            message: e.to_string(),
        })?;
    tracing::debug!(loop_id = %id, "Spawned loop thread");
    Ok(LoopHandle {
        id,
        stop,
        thread: Some(thread),
    })
}

impl LoopHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Request a stop. An in-progress sleep is interrupted.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the loop to end and return how it ended.
    pub fn join(mut self) -> RuntimeResult<LoopSummary> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> RuntimeResult<LoopSummary> {
        let Some(thread) = self.thread.take() else {
            return Err(RuntimeError::Thread {
                loop_id: self.id.clone(),
                message: "already joined".to_string(),
            });
        };
        thread.join().unwrap_or_else(|_| {
            Err(RuntimeError::Thread {
                loop_id: self.id.clone(),
                message: "loop thread panicked".to_string(),
            })
        })
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
            if let Err(e) = self.join_inner() {
                tracing::warn!(loop_id = %self.id, error = %e, "Loop ended with error");
            }
        }
    }
}

/// Owns every running loop of a plant.
#[derive(Debug, Default)]
pub struct Supervisor {
    handles: Vec<LoopHandle>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `control_loop` on its own thread.
    ///
    /// # Errors
    ///
    /// Returns error if a loop with the same id is already supervised or the
    /// thread cannot be spawned.
    pub fn spawn(&mut self, control_loop: ControlLoop) -> RuntimeResult<()> {
        if self.handles.iter().any(|h| h.id() == control_loop.id()) {
            return Err(RuntimeError::config(format!(
                "loop {} is already running",
                control_loop.id()
            )));
        }
        let handle = spawn_loop(control_loop)?;
        self.handles.push(handle);
        Ok(())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().map(LoopHandle::id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Request a stop of one loop.
    pub fn stop(&self, id: &str) -> RuntimeResult<()> {
        let handle = self
            .handles
            .iter()
            .find(|h| h.id() == id)
            .ok_or_else(|| RuntimeError::config(format!("unknown loop: {id}")))?;
        handle.stop();
        Ok(())
    }

    pub fn stop_all(&self) {
        for handle in &self.handles {
            handle.stop();
        }
    }

    /// Wait for every loop, in spawn order.
    pub fn join_all(self) -> Vec<(String, RuntimeResult<LoopSummary>)> {
        self.handles
            .into_iter()
            .map(|h| (h.id().to_string(), h.join()))
            .collect()
    }

    /// Stop every loop and wait for all of them.
    pub fn shutdown(self) -> Vec<(String, RuntimeResult<LoopSummary>)> {
        self.stop_all();
        self.join_all()
    }
}
