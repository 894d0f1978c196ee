use thiserror::Error;

#[derive(Error, Debug)]
pub enum GptError {
    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// Represents all other cases of `serde_json::Error`.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
    /// Represents failures of the underlying HTTP transport
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
    /// Represents failures of the model hub API
    #[error(transparent)]
    HubApiError(#[from] hf_hub::api::sync::ApiError),
    #[error("generation server returned status {status}: {body}")]
    ServerStatus { status: u16, body: String },
    #[error("generation server returned no choices")]
    EmptyChoices,
    #[error("failed to decode stream event: {0}")]
    StreamEvent(String),
    #[error("batch item {index} failed: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<GptError>,
    },
    #[error("batch task could not be joined: {0}")]
    BatchJoin(#[from] tokio::task::JoinError),
    #[error("input file {0} does not contain any batch inputs")]
    EmptyBatch(String),
}
