//! Outbound calls to the deck import backend.
//!
//! Every backend failure is normalized here: uploads end in [`UploadEvent::Failed`],
//! deck listing falls back to an empty list, and health checks report `false`.
//! Only failures to establish a call at all surface as [`GatewayError`].

use std::{fmt, io, path::Path, sync::Arc};

use async_trait::async_trait;
use futures::{future, stream, stream::BoxStream, Stream, StreamExt};
use reqwest::{multipart, Body, Client};
use shared::{
    error::ApiErrorBody,
    protocol::{DeckListResponse, DeckSummary, HealthResponse},
};
use tokio::{runtime::Handle, sync::mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::GatewayError;

pub const IMPORT_PATH: &str = "api/import/anki";
pub const DECKS_PATH: &str = "api/decks";
pub const HEALTH_PATH: &str = "api/health";
pub const DEFAULT_UPLOAD_CHUNK_BYTES: usize = 64 * 1024;
const PACKAGE_FIELD: &str = "file";
const PACKAGE_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Progress {
        bytes_sent: u64,
        bytes_total: Option<u64>,
    },
    Completed,
    Failed(String),
}

impl UploadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadEvent::Progress { .. })
    }
}

/// Finite, non-restartable sequence of events for one upload attempt.
pub type UploadEventStream = BoxStream<'static, UploadEvent>;

/// Cuts an event source off right after its first terminal event.
pub fn until_terminal<S>(events: S) -> UploadEventStream
where
    S: Stream<Item = UploadEvent> + Send + 'static,
{
    events
        .scan(false, |finished, event| {
            if *finished {
                return future::ready(None);
            }
            *finished = event.is_terminal();
            future::ready(Some(event))
        })
        .boxed()
}

/// A package file handed over by a drop or a file pick.
#[derive(Clone)]
pub struct PackageFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl PackageFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} does not name a file", path.display()),
                )
            })?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for PackageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageFile")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

#[async_trait]
pub trait ImportGateway: Send + Sync {
    fn submit_import(&self, file: PackageFile) -> Result<UploadEventStream, GatewayError>;
    async fn list_decks(&self) -> Result<Vec<DeckSummary>, GatewayError>;
    async fn check_health(&self) -> bool;
}

pub struct HttpImportGateway {
    http: Client,
    base_url: String,
    chunk_size: usize,
}

impl HttpImportGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_chunk_size(base_url, DEFAULT_UPLOAD_CHUNK_BYTES)
    }

    pub fn with_chunk_size(base_url: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &'static str) -> Result<Url, GatewayError> {
        let invalid = |source: url::ParseError| GatewayError::InvalidEndpoint {
            base_url: self.base_url.clone(),
            path,
            source,
        };
        let mut base = Url::parse(&self.base_url).map_err(invalid)?;
        // Url::join replaces the last path segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path).map_err(invalid)
    }

    async fn fetch_decks(&self, url: Url) -> reqwest::Result<Vec<DeckSummary>> {
        let response: DeckListResponse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.decks)
    }

    async fn fetch_health(&self, url: Url) -> reqwest::Result<bool> {
        let response: HealthResponse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.status)
    }
}

#[async_trait]
impl ImportGateway for HttpImportGateway {
    fn submit_import(&self, file: PackageFile) -> Result<UploadEventStream, GatewayError> {
        let url = self.endpoint(IMPORT_PATH)?;
        let runtime = Handle::try_current()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let part = multipart::Part::stream_with_length(
            progress_body(file.clone(), self.chunk_size, events_tx.clone()),
            file.size(),
        )
        .file_name(file.name().to_string())
        .mime_str(PACKAGE_MIME_TYPE)?;
        let request = self
            .http
            .post(url)
            .multipart(multipart::Form::new().part(PACKAGE_FIELD, part));

        let file_name = file.name().to_string();
        debug!(file = %file_name, size = file.size(), "submitting deck package");
        runtime.spawn(async move {
            let terminal = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(file = %file_name, "deck package accepted by importer");
                    UploadEvent::Completed
                }
                Ok(response) => {
                    let status = response.status();
                    let raw = response.text().await.unwrap_or_default();
                    let reason = match ApiErrorBody::parse(&raw) {
                        Some(body) => format!("import rejected with status {status}: {}", body.detail),
                        None => format!("import rejected with status {status}"),
                    };
                    warn!(file = %file_name, "{reason}");
                    UploadEvent::Failed(reason)
                }
                Err(err) => {
                    error!(file = %file_name, "error importing deck: {err}");
                    UploadEvent::Failed(format!("upload transport failure: {err}"))
                }
            };
            let _ = events_tx.send(terminal);
        });

        Ok(until_terminal(UnboundedReceiverStream::new(events_rx)))
    }

    async fn list_decks(&self) -> Result<Vec<DeckSummary>, GatewayError> {
        let url = self.endpoint(DECKS_PATH)?;
        match self.fetch_decks(url).await {
            Ok(decks) => Ok(decks),
            Err(err) => Ok(fallback_decks(&err)),
        }
    }

    async fn check_health(&self) -> bool {
        let url = match self.endpoint(HEALTH_PATH) {
            Ok(url) => url,
            Err(err) => {
                error!("error checking backend health: {err}");
                return false;
            }
        };
        match self.fetch_health(url).await {
            Ok(status) => status,
            Err(err) => {
                warn!("error checking backend health: {err}");
                false
            }
        }
    }
}

/// Deck listing failures are non-fatal: log and report an empty library.
pub fn fallback_decks(err: &dyn std::error::Error) -> Vec<DeckSummary> {
    warn!("error fetching decks, falling back to an empty list: {err}");
    Vec::new()
}

/// Streams the package in chunks, reporting each chunk as it is pulled by the transport.
fn progress_body(
    file: PackageFile,
    chunk_size: usize,
    events: mpsc::UnboundedSender<UploadEvent>,
) -> Body {
    let total = file.size();
    let len = file.bytes().len();
    let ranges: Vec<(usize, usize)> = (0..len)
        .step_by(chunk_size)
        .map(|start| (start, (start + chunk_size).min(len)))
        .collect();

    let chunks = stream::iter(ranges).map(move |(start, end)| {
        let _ = events.send(UploadEvent::Progress {
            bytes_sent: end as u64,
            bytes_total: Some(total),
        });
        Ok::<Vec<u8>, io::Error>(file.bytes()[start..end].to_vec())
    });
    Body::wrap_stream(chunks)
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
