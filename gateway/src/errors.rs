use http::StatusCode;
use thiserror::Error;

/// Errors that can occur while handling an ingress request.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("missing or unreadable Content-Type header")]
    MissingContentType,

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("invalid table name: {0}")]
    InvalidTableName(String),

    #[error("missing Authorization header")]
    MissingAuthorization,

    #[error("token rejected by the identity provider")]
    InvalidToken,

    #[error("identity is not permitted to write to table {0}")]
    TableForbidden(String),

    #[error("identity provider unavailable: {0}")]
    AuthUpstream(String),

    #[error("failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("durable write failed: {0}")]
    DurableWriteFailure(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// HTTP status the error surfaces with.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingContentType
            | GatewayError::UnknownTable(_)
            | GatewayError::InvalidTableName(_)
            | GatewayError::RequestBodyError(_) => StatusCode::BAD_REQUEST,
            GatewayError::MissingAuthorization | GatewayError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::TableForbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::AuthUpstream(_) | GatewayError::DurableWriteFailure(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::InternalError(_) | GatewayError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_the_interface_contract() {
        assert_eq!(GatewayError::MissingContentType.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::UnknownTable("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::MissingAuthorization.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(GatewayError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GatewayError::TableForbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::DurableWriteFailure("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
