use hyper::StatusCode;
use std::fmt::Display;

/// Error that knows which HTTP status it should be answered with.
///
/// Handlers and extractors work with `anyhow::Result`, an `HttpError`
/// wrapped in `anyhow::Error` keeps its status all the way to the response:
///
/// ```rust
/// use tour_core::error::HttpError;
///
/// fn handler() -> anyhow::Result<String> {
///     Err(HttpError::not_found("no such item"))?
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    detail: String,
}

impl HttpError {
    pub fn new(status: StatusCode, detail: impl Display) -> Self {
        Self {
            status,
            detail: detail.to_string(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(detail: impl Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    /// 404 Not Found.
    pub fn not_found(detail: impl Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    /// 422 Unprocessable Entity, used when a request part is present
    /// but cannot be converted into the type a handler asked for.
    pub fn unprocessable(detail: impl Display) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    /// 502 Bad Gateway.
    pub fn bad_gateway(detail: impl Display) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, detail)
    }

    /// 500 Internal Server Error.
    pub fn internal(detail: impl Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Finds `HttpError` inside of `anyhow::Error`, falls back to `fallback`
    /// status with error's message otherwise.
    pub fn from_anyhow(err: &anyhow::Error, fallback: StatusCode) -> Self {
        match err.downcast_ref::<HttpError>() {
            Some(http_error) => http_error.clone(),
            None => Self::new(fallback, format!("{:#}", err)),
        }
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}

impl std::error::Error for HttpError {}
