//! Error types shared by the connectors and the aggregation pipeline.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure raised by one of the pipeline's collaborators (broker, CKAN, CSV store).
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("can't encode or decode JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("can't parse timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("local store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("local store CSV failure: {0}")]
    Csv(#[from] csv::Error),
}

/// A fatal pipeline failure, tagged with the operation that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("can't get last update")]
    LastUpdate(#[source] ConnectorError),

    #[error("can't fetch data at offset {offset}")]
    Fetch {
        offset: usize,
        #[source]
        source: ConnectorError,
    },

    #[error("can't write {records} aggregate records")]
    Write {
        records: usize,
        #[source]
        source: ConnectorError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_names_failed_operation() {
        let err = PipelineError::Fetch {
            offset: 2000,
            source: ConnectorError::Rejected("boom".into()),
        };
        assert_eq!(err.to_string(), "can't fetch data at offset 2000");

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "request rejected: boom");
    }

    #[test]
    fn test_status_error_carries_body() {
        let err = ConnectorError::Status {
            status: StatusCode::FORBIDDEN,
            body: "nope".into(),
        };
        assert_eq!(err.to_string(), "unexpected status 403 Forbidden: nope");
    }
}
