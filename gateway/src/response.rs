//! The ingress response envelope: `{"success": true, "data": …}` or
//! `{"success": false, "error": …}`.

use crate::errors::GatewayError;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::Response;
use hyper::body::Bytes;
use serde::Serialize;
use store::RecordId;

pub type GatewayBody = BoxBody<Bytes, GatewayError>;

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Payload of a successful ingest response.
#[derive(Serialize)]
pub struct IngestAccepted {
    pub id: RecordId,
}

/// Payload of the health endpoint.
#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

pub fn success<T: Serialize>(data: T) -> Response<GatewayBody> {
    json_response(
        StatusCode::OK,
        &Envelope {
            success: true,
            data: Some(data),
            error: None,
        },
    )
}

pub fn failure(err: &GatewayError) -> Response<GatewayBody> {
    json_response(
        err.status(),
        &Envelope::<()> {
            success: false,
            data: None,
            error: Some(err.to_string()),
        },
    )
}

pub fn not_found() -> Response<GatewayBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &Envelope::<()> {
            success: false,
            data: None,
            error: Some("no route matched".to_string()),
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<GatewayBody> {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| {
        br#"{"success":false,"error":"response serialization failed"}"#.to_vec()
    });

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(bytes)).map_err(|e| match e {}).boxed())
        .unwrap_or_else(|_| {
            // Static parts only; builder failure would be a programming
            // error, answered with a bare 500 rather than a panic.
            let mut response =
                Response::new(Full::new(Bytes::new()).map_err(|e| match e {}).boxed());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response<GatewayBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_envelope_carries_the_id() {
        let id = RecordId::generate();
        let response = success(IngestAccepted { id: id.clone() });

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], id.to_string());
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn failure_envelope_carries_status_and_reason() {
        let response = failure(&GatewayError::MissingContentType);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "missing or unreadable Content-Type header");
        assert!(json.get("data").is_none());
    }
}
