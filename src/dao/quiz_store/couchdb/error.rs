use reqwest::StatusCode;
use thiserror::Error;

pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures raised by the CouchDB backend.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// The HTTP client could not be built.
    #[error("failed to build CouchDB client")]
    Client(#[source] reqwest::Error),
    /// The request never got a response.
    #[error("CouchDB {operation} request failed")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with a non-success status.
    #[error("CouchDB {operation} returned status {status}")]
    Status {
        operation: &'static str,
        status: StatusCode,
    },
    /// The response body was not the expected JSON.
    #[error("CouchDB {operation} returned an unreadable body")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// A stored document does not match its model.
    #[error("malformed CouchDB document `{doc_id}`")]
    Document {
        doc_id: String,
        #[source]
        source: serde_json::Error,
    },
    /// A document identifier does not follow the expected layout.
    #[error("invalid document ID `{doc_id}`: {kind}")]
    InvalidDocId { doc_id: String, kind: &'static str },
}
