//! Progress status register.
//!
//! One register is shared by every in-flight request. It holds exactly one
//! [`ProgressStage`] at a time and writes are last-writer-wins, so with
//! concurrent requests the value reflects whichever phase started most
//! recently, not any particular request. Callers that poll for progress
//! must accept that.
//!
//! Besides polling via [`StatusRegister::get`], callers can
//! [`subscribe`](StatusRegister::subscribe) to receive every transition.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// The fixed vocabulary of progress stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    #[default]
    Idle,
    Processing,
    SearchingWeb,
    AnalyzingWebData,
    RetrievingHealthData,
    AnalyzingHealthData,
    SummarizingHealthData,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Idle => "idle",
            ProgressStage::Processing => "processing",
            ProgressStage::SearchingWeb => "searching_web",
            ProgressStage::AnalyzingWebData => "analyzing_web_data",
            ProgressStage::RetrievingHealthData => "retrieving_health_data",
            ProgressStage::AnalyzingHealthData => "analyzing_health_data",
            ProgressStage::SummarizingHealthData => "summarizing_health_data",
        }
    }

    /// Short human-readable description for progress display.
    pub fn describe(&self) -> &'static str {
        match self {
            ProgressStage::Idle => "Ready",
            ProgressStage::Processing => "Processing your question",
            ProgressStage::SearchingWeb => "Searching the web",
            ProgressStage::AnalyzingWebData => "Analyzing web results",
            ProgressStage::RetrievingHealthData => "Retrieving your health data",
            ProgressStage::AnalyzingHealthData => "Analyzing your health data",
            ProgressStage::SummarizingHealthData => "Summarizing your health data",
        }
    }
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutex-guarded current stage plus a broadcast of every transition.
pub struct StatusRegister {
    current: Mutex<ProgressStage>,
    sender: broadcast::Sender<ProgressStage>,
}

impl StatusRegister {
    /// Create a register whose subscribers buffer up to `capacity` transitions.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            current: Mutex::new(ProgressStage::Idle),
            sender,
        }
    }

    /// Overwrite the current stage.
    pub fn set(&self, stage: ProgressStage) {
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            *current = stage;
        }
        tracing::debug!(stage = %stage, "Status changed");
        // No subscribers is fine
        let _ = self.sender.send(stage);
    }

    pub fn get(&self) -> ProgressStage {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Receive every subsequent transition.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressStage> {
        self.sender.subscribe()
    }

    /// Set `processing` and return a guard that resets to `idle` when dropped.
    ///
    /// The reset happens on every exit path, including early returns,
    /// `?` propagation and panics unwinding through the holder.
    pub fn enter(&self) -> StatusGuard<'_> {
        self.set(ProgressStage::Processing);
        StatusGuard { register: self }
    }
}

impl Default for StatusRegister {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for StatusRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusRegister")
            .field("current", &self.get())
            .finish()
    }
}

/// Scoped processing phase. Resets the register to `idle` on drop.
#[must_use = "dropping the guard immediately resets the status to idle"]
pub struct StatusGuard<'a> {
    register: &'a StatusRegister,
}

impl StatusGuard<'_> {
    pub fn set(&self, stage: ProgressStage) {
        self.register.set(stage);
    }
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        self.register.set(ProgressStage::Idle);
    }
}
