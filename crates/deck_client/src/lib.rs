//! Client side of the deck import workflow.
//!
//! [`gateway`] translates the import, deck listing and health endpoints into values the
//! [`workflow`] controller consumes; the controller owns all user-facing state.

pub mod error;
pub mod format;
pub mod gateway;
pub mod workflow;

pub use error::{GatewayError, WorkflowError};
pub use format::format_size;
pub use gateway::{
    fallback_decks, until_terminal, HttpImportGateway, ImportGateway, PackageFile, UploadEvent,
    UploadEventStream, DEFAULT_UPLOAD_CHUNK_BYTES,
};
pub use workflow::{Transition, UploadPhase, UploadWorkflowController, WorkflowState};
