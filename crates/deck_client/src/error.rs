use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid endpoint {path} for base url {base_url}: {source}")]
    InvalidEndpoint {
        base_url: String,
        path: &'static str,
        source: url::ParseError,
    },
    #[error("failed to build import request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("no async runtime available to drive the upload: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{file_name} is not an Anki deck package (.apkg)")]
    InvalidPackage { file_name: String },
    #[error("an upload is already in flight (attempt {attempt})")]
    UploadInFlight { attempt: u64 },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
