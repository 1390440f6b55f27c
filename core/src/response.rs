use crate::{error::HttpError, request::Json};
use anyhow::Context;
use bytes::Bytes;
use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    Body, StatusCode,
};
use log::error;
use serde::Serialize;

pub type Response = hyper::Response<Body>;

/// Types that can be returned from handlers.
pub trait Responder {
    fn into_response(self) -> anyhow::Result<Response>;
}

/// Responder implementation for '()', returns empty 200 response.
///
/// ```rust
/// fn handler() {}
/// ```
impl Responder for () {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(Response::default())
    }
}

/// Response by default should implement Responder.
impl Responder for Response {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(self)
    }
}

/// Returns 200 response with self as a plain text body.
///
/// ```rust
/// fn handler() -> &'static str {
///     "hello"
/// }
/// ```
impl Responder for &'static str {
    fn into_response(self) -> anyhow::Result<Response> {
        text_response(StatusCode::OK, self.to_string())
    }
}

/// Returns 200 response with self as a plain text body.
impl Responder for String {
    fn into_response(self) -> anyhow::Result<Response> {
        text_response(StatusCode::OK, self)
    }
}

/// Serializes inner value as a JSON body.
///
/// ```rust
/// use serde_json::{json, Value};
/// use tour_core::request::Json;
///
/// fn handler() -> Json<Value> {
///     Json(json!({"Message": "Hello World!"}))
/// }
/// ```
impl<T> Responder for Json<T>
where
    T: Serialize,
{
    fn into_response(self) -> anyhow::Result<Response> {
        let body = serde_json::to_vec(&self.0).context("could not serialize response body")?;
        json_response(StatusCode::OK, body)
    }
}

/// Overrides status of inner responder.
impl<R> Responder for (StatusCode, R)
where
    R: Responder,
{
    fn into_response(self) -> anyhow::Result<Response> {
        let mut response = self.1.into_response()?;
        *response.status_mut() = self.0;
        Ok(response)
    }
}

/// Error responses carry `{"detail": "..."}` body.
impl Responder for HttpError {
    fn into_response(self) -> anyhow::Result<Response> {
        let body = serde_json::to_vec(&serde_json::json!({ "detail": self.detail() }))?;
        json_response(self.status(), body)
    }
}

/// Errors are turned into responses too. `HttpError` keeps its status,
/// every other error becomes 500.
impl<T> Responder for anyhow::Result<T>
where
    T: Responder,
{
    fn into_response(self) -> anyhow::Result<Response> {
        match self {
            Ok(r) => r.into_response(),
            Err(e) => {
                let http_error = HttpError::from_anyhow(&e, StatusCode::INTERNAL_SERVER_ERROR);
                if http_error.status().is_server_error() {
                    error!("handler failed: {:#}", e);
                }
                http_error.into_response()
            }
        }
    }
}

/// Calls `Responder::into_response` and makes sure there is always a response to send.
pub fn respond<R: Responder>(responder: R) -> Response {
    match responder.into_response() {
        Ok(response) => response,
        Err(e) => {
            error!("could not build response: {:#}", e);
            fallback_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Turns `anyhow::Error` into a response, `fallback` status is used
/// when error does not carry an `HttpError`.
pub fn error_response(err: &anyhow::Error, fallback: StatusCode) -> Response {
    respond(HttpError::from_anyhow(err, fallback))
}

/// Response with status only, used when even building an error body failed.
pub fn fallback_response(status: StatusCode) -> Response {
    let mut response = Response::default();
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, body: String) -> anyhow::Result<Response> {
    Ok(hyper::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
        .body(Body::from(body))?)
}

fn json_response(status: StatusCode, body: Vec<u8>) -> anyhow::Result<Response> {
    Ok(hyper::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(Body::from(body))?)
}

/// Reads whole body into memory.
pub fn body_to_bytes(body: Body) -> anyhow::Result<Bytes> {
    Ok(futures_executor::block_on(hyper::body::to_bytes(body))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn body_json(response: Response) -> Value {
        let bytes = body_to_bytes(response.into_body()).expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn test_json_responder() {
        let response = Json(json!({"a": [1, 2]})).into_response().expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_json(response), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_status_override() {
        let response = (StatusCode::CREATED, "made").into_response().expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_result_responder() {
        let err: anyhow::Result<String> = Err(HttpError::bad_request("nope").into());
        let response = respond(err);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response), json!({"detail": "nope"}));

        let err: anyhow::Result<String> = Err(anyhow::anyhow!("boom"));
        assert_eq!(respond(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
