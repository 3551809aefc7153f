use thiserror::Error;

/// Errors surfaced by the aggregation layer and the dashboard client.
///
/// An empty filtered record set is not an error: every aggregate has a
/// well-defined zero/empty value for it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    /// A predicate key that is not one of the eight recognized filter fields.
    #[error("Invalid filter field: '{0}'")]
    InvalidFilterField(String),
    /// The request never produced a response (connect, timeout, abort).
    #[error("Network failure: {0}")]
    NetworkFailure(String),
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
    /// The response body did not have the expected JSON shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// The record store failed to answer a query.
    #[error("Record store error: {0}")]
    Store(String),
}

impl DashboardError {
    /// HTTP status the API answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            DashboardError::InvalidFilterField(_) => 400,
            DashboardError::HttpStatus { status, .. } => *status,
            DashboardError::NetworkFailure(_) => 502,
            DashboardError::MalformedResponse(_) | DashboardError::Store(_) => 500,
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> DashboardError {
        if err.is_decode() {
            DashboardError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            DashboardError::HttpStatus {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            DashboardError::NetworkFailure(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> DashboardError {
        DashboardError::MalformedResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_field_maps_to_bad_request() {
        let err = DashboardError::InvalidFilterField("colour".to_string());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Invalid filter field: 'colour'");
    }

    #[test]
    fn json_errors_become_malformed_responses() {
        let err: DashboardError = serde_json::from_str::<Vec<u32>>("{\"nope\":1}").unwrap_err().into();
        assert!(matches!(err, DashboardError::MalformedResponse(_)));
    }

    #[test]
    fn display_and_debug_carry_the_details() {
        let err = DashboardError::HttpStatus {
            status: 503,
            message: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: busy");
        assert_eq!(format!("{:?}", err), r#"HttpStatus { status: 503, message: "busy" }"#);
        assert_eq!(err.status_code(), 503);
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(DashboardError::Store("down".to_string()));
        assert_eq!(boxed.to_string(), "Record store error: down");
    }
}
