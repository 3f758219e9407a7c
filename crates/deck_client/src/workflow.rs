//! Upload workflow controller: drag state, single-flight uploads with live progress,
//! and deck list reconciliation after each attempt.

use std::sync::Arc;

use futures::StreamExt;
use shared::{domain::is_package_file_name, protocol::DeckSummary};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    error::WorkflowError,
    format::format_size,
    gateway::{ImportGateway, PackageFile, UploadEvent, UploadEventStream},
};

pub const INVALID_PACKAGE_MESSAGE: &str = "Please select a valid Anki deck file (.apkg)";
pub const IMPORT_SUCCEEDED_MESSAGE: &str = "Deck imported successfully!";
pub const IMPORT_FAILED_MESSAGE: &str = "Failed to import deck. Please try again.";
pub const DECK_LOAD_FAILED_MESSAGE: &str = "Failed to load decks. Please try again.";

/// User-facing state owned by one controller.
///
/// `error_message` and `success_message` are never both set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowState {
    pub decks: Vec<DeckSummary>,
    pub is_drag_over: bool,
    pub is_loading: bool,
    pub upload_progress: u8,
    pub error_message: Option<String>,
    pub success_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadPhase {
    #[default]
    Idle,
    Uploading {
        attempt: u64,
    },
    Succeeded {
        attempt: u64,
    },
    Failed {
        attempt: u64,
    },
}

/// What applying one gateway event did to the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Progress(u8),
    /// Progress without a usable total; state is unchanged.
    Ignored,
    Succeeded,
    Failed,
}

impl Transition {
    pub fn is_terminal(self) -> bool {
        matches!(self, Transition::Succeeded | Transition::Failed)
    }
}

struct ActiveUpload {
    attempt: u64,
    file_name: String,
    events: UploadEventStream,
}

pub struct UploadWorkflowController {
    gateway: Arc<dyn ImportGateway>,
    state: WorkflowState,
    phase: UploadPhase,
    active: Option<ActiveUpload>,
    attempts: u64,
    snapshots: watch::Sender<WorkflowState>,
}

impl UploadWorkflowController {
    pub fn new(gateway: Arc<dyn ImportGateway>) -> Self {
        let (snapshots, _) = watch::channel(WorkflowState::default());
        Self {
            gateway,
            state: WorkflowState::default(),
            phase: UploadPhase::Idle,
            active: None,
            attempts: 0,
            snapshots,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn is_uploading(&self) -> bool {
        self.active.is_some()
    }

    /// Live snapshots of [`WorkflowState`], one per state change.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.snapshots.subscribe()
    }

    /// One-shot startup load of the deck list. Not retried on failure.
    pub async fn initialize(&mut self) {
        self.refresh_decks().await;
    }

    pub async fn refresh_decks(&mut self) {
        match self.gateway.list_decks().await {
            Ok(decks) => {
                debug!(count = decks.len(), "deck list refreshed");
                self.state.decks = decks;
            }
            Err(err) => {
                error!("error loading decks: {err}");
                self.set_error(DECK_LOAD_FAILED_MESSAGE);
            }
        }
        self.publish();
    }

    pub fn begin_drag_over(&mut self) {
        self.state.is_drag_over = true;
        self.publish();
    }

    pub fn end_drag_over(&mut self) {
        self.state.is_drag_over = false;
        self.publish();
    }

    pub fn handle_drop(&mut self, files: Vec<PackageFile>) -> Result<(), WorkflowError> {
        self.end_drag_over();
        self.start_first(files)
    }

    pub fn handle_file_selection(&mut self, files: Vec<PackageFile>) -> Result<(), WorkflowError> {
        self.end_drag_over();
        self.start_first(files)
    }

    fn start_first(&mut self, files: Vec<PackageFile>) -> Result<(), WorkflowError> {
        let Some(file) = files.into_iter().next() else {
            return Ok(());
        };
        self.start_upload(file)
    }

    /// Validates `file` and hands it to the gateway.
    ///
    /// Returns once the attempt is in flight; drive it with [`Self::next_transition`]
    /// or [`Self::settle`]. A second start while an attempt is in flight is rejected
    /// without touching state or the gateway.
    pub fn start_upload(&mut self, file: PackageFile) -> Result<(), WorkflowError> {
        if let Some(active) = &self.active {
            warn!(
                attempt = active.attempt,
                in_flight = %active.file_name,
                rejected = %file.name(),
                "upload already in flight; rejecting new upload"
            );
            return Err(WorkflowError::UploadInFlight {
                attempt: active.attempt,
            });
        }

        if !is_package_file_name(file.name()) {
            debug!(file = %file.name(), "rejecting non-package file");
            self.set_error(INVALID_PACKAGE_MESSAGE);
            self.publish();
            return Err(WorkflowError::InvalidPackage {
                file_name: file.name().to_string(),
            });
        }

        self.attempts += 1;
        let attempt = self.attempts;
        self.state.error_message = None;
        self.state.success_message = None;
        self.state.upload_progress = 0;
        self.state.is_loading = true;
        self.phase = UploadPhase::Uploading { attempt };
        info!(
            attempt,
            file = %file.name(),
            size = %format_size(file.size()),
            "starting deck import"
        );

        let file_name = file.name().to_string();
        match self.gateway.submit_import(file) {
            Ok(events) => {
                self.active = Some(ActiveUpload {
                    attempt,
                    file_name,
                    events,
                });
                self.publish();
                Ok(())
            }
            Err(err) => {
                error!(attempt, file = %file_name, "error importing deck: {err}");
                self.finish_failed(attempt);
                Err(err.into())
            }
        }
    }

    /// Applies the next gateway event of the in-flight upload.
    ///
    /// Returns `None` when nothing is in flight. Dropping the returned future while it
    /// waits for an event loses nothing; the event stream stays with the controller.
    pub async fn next_transition(&mut self) -> Option<Transition> {
        let (attempt, event) = {
            let active = self.active.as_mut()?;
            (active.attempt, active.events.next().await)
        };

        let transition = match event {
            Some(UploadEvent::Progress {
                bytes_sent,
                bytes_total: Some(total),
            }) if total > 0 => {
                let percent = progress_percent(bytes_sent, total);
                self.state.upload_progress = percent;
                self.publish();
                Transition::Progress(percent)
            }
            Some(UploadEvent::Progress { .. }) => Transition::Ignored,
            Some(UploadEvent::Completed) => {
                self.active = None;
                self.set_success(IMPORT_SUCCEEDED_MESSAGE);
                self.state.is_loading = false;
                self.phase = UploadPhase::Succeeded { attempt };
                info!(attempt, "deck import completed");
                self.publish();
                self.refresh_decks().await;
                Transition::Succeeded
            }
            Some(UploadEvent::Failed(reason)) => {
                warn!(attempt, "deck import failed: {reason}");
                self.finish_failed(attempt);
                Transition::Failed
            }
            None => {
                warn!(attempt, "upload event stream ended without a terminal event");
                self.finish_failed(attempt);
                Transition::Failed
            }
        };
        Some(transition)
    }

    /// Drives the in-flight upload to its terminal transition.
    pub async fn settle(&mut self) -> Option<Transition> {
        loop {
            let transition = self.next_transition().await?;
            if transition.is_terminal() {
                return Some(transition);
            }
        }
    }

    fn finish_failed(&mut self, attempt: u64) {
        self.active = None;
        self.set_error(IMPORT_FAILED_MESSAGE);
        self.state.is_loading = false;
        self.phase = UploadPhase::Failed { attempt };
        self.publish();
    }

    fn set_error(&mut self, message: &str) {
        self.state.success_message = None;
        self.state.error_message = Some(message.to_string());
    }

    fn set_success(&mut self, message: &str) {
        self.state.error_message = None;
        self.state.success_message = Some(message.to_string());
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.state.clone());
    }
}

fn progress_percent(bytes_sent: u64, bytes_total: u64) -> u8 {
    let percent = (100.0 * bytes_sent as f64 / bytes_total as f64).round();
    percent.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
