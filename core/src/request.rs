use crate::{error::HttpError, response::body_to_bytes};
use hyper::{
    header::{HeaderName, CONTENT_TYPE, HOST},
    http::{request::Parts, HeaderValue},
    Body, HeaderMap, Request,
};
use serde::de::DeserializeOwned;
use std::{fmt::Display, str::FromStr};

/// Marker for extractors that need the whole request, body included.
pub struct ViaRequest;

/// Marker for extractors built only from request's parts.
pub struct ViaParts;

/// Allows various types to be created from Request. Only the last
/// argument of a handler can consume request's body.
pub trait FromRequest<M = ViaRequest>: Sized {
    fn from_request(req: Request<Body>) -> anyhow::Result<Self>;
}

/// Allows types to be created from request's head. Any number of those
/// can be used as handler's arguments.
pub trait FromRequestParts: Sized {
    fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self>;
}

/// Every parts extractor can be used on the last position too.
impl<T> FromRequest<ViaParts> for T
where
    T: FromRequestParts,
{
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        let (mut parts, _) = req.into_parts();
        T::from_request_parts(&mut parts)
    }
}

impl FromRequest for Request<Body> {
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        Ok(req)
    }
}

/// Body as UTF-8 string.
///
/// ```rust
/// fn handler(body: String) -> String {
///     body
/// }
/// ```
impl FromRequest for String {
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        let bytes = body_to_bytes(req.into_body())?;
        let string = std::str::from_utf8(&bytes)
            .map_err(|e| HttpError::bad_request(format!("body is not valid UTF-8: {}", e)))?
            .to_owned();

        Ok(string)
    }
}

/// Placeholder for value that can be deserialized from JSON.
/// As an extractor it reads request's body, as a responder it
/// serializes the value.
///
/// ```rust
/// use serde::Deserialize;
/// use tour_core::request::Json;
///
/// #[derive(Deserialize)]
/// struct Item {
///     name: String,
///     price: f64,
/// }
///
/// fn handler(Json(item): Json<Item>) -> String {
///     item.name
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> FromRequest for Json<T>
where
    T: DeserializeOwned,
{
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        let bytes = body_to_bytes(req.into_body())?;
        let deserializer = &mut serde_json::Deserializer::from_slice(&bytes);

        let value = T::deserialize(deserializer)
            .map_err(|e| HttpError::unprocessable(format!("invalid JSON body: {}", e)))?;
        Ok(Json(value))
    }
}

/// Query string deserialized into `T`.
///
/// ```rust
/// use serde::Deserialize;
/// use tour_core::request::Query;
///
/// #[derive(Deserialize)]
/// struct Params {
///     q: Option<String>,
/// }
///
/// fn handler(Query(params): Query<Params>) -> String {
///     params.q.unwrap_or_default()
/// }
/// ```
pub struct Query<T>(pub T);

impl<T> FromRequestParts for Query<T>
where
    T: DeserializeOwned,
{
    fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self> {
        let query = parts.uri.query().unwrap_or_default();
        let value = serde_urlencoded::from_str(query)
            .map_err(|e| HttpError::unprocessable(format!("invalid query string: {}", e)))?;
        Ok(Query(value))
    }
}

/// Every decoded key/value pair of the query string in arrival order.
/// Repeated keys are kept, which `Query` can't express.
///
/// ```rust
/// use tour_core::request::QueryPairs;
///
/// fn handler(pairs: QueryPairs) -> String {
///     pairs.get_all("tag").collect::<Vec<_>>().join(",")
/// }
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryPairs(pub Vec<(String, String)>);

impl QueryPairs {
    pub fn parse(query: &str) -> anyhow::Result<Self> {
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .map_err(|e| HttpError::bad_request(format!("invalid query string: {}", e)))?;
        Ok(Self(pairs))
    }

    /// Values of every occurrence of `key`, in order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromRequestParts for QueryPairs {
    fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self> {
        Self::parse(parts.uri.query().unwrap_or_default())
    }
}

/// Types that can be converted from a single path segment.
pub trait FromParam: Sized {
    fn from_param(param: &str) -> anyhow::Result<Self>;
}

impl<S> FromParam for S
where
    S: FromStr,
    <S as FromStr>::Err: Display,
{
    fn from_param(param: &str) -> anyhow::Result<Self> {
        S::from_str(param).map_err(|e| anyhow::anyhow!("could not convert `{}`: {}", param, e))
    }
}

/// Values of route's `<param>` segments for current request, inserted into
/// request's extensions by the router. `PathParam` extractors take them in order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
    next: usize,
}

impl PathParams {
    pub fn new(params: Vec<(String, String)>) -> Self {
        Self { params, next: 0 }
    }

    fn take_next(&mut self) -> Option<&(String, String)> {
        let param = self.params.get(self.next)?;
        self.next += 1;
        Some(param)
    }
}

/// Path parameter. The first `PathParam` of a handler gets the first `<param>`
/// of the route, the second gets the second and so on.
///
/// ```rust
/// use tour_core::request::PathParam;
///
/// // registered as "/users/<name>/<id>"
/// fn handler(PathParam(name): PathParam<String>, PathParam(id): PathParam<i64>) -> String {
///     format!("{}:{}", name, id)
/// }
/// ```
pub struct PathParam<T>(pub T);

impl<T> FromRequestParts for PathParam<T>
where
    T: FromParam,
{
    fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self> {
        let (name, value) = parts
            .extensions
            .get_mut::<PathParams>()
            .and_then(PathParams::take_next)
            .ok_or_else(|| HttpError::internal("route has no path param left for extractor"))?;

        let value = T::from_param(value)
            .map_err(|e| HttpError::unprocessable(format!("path param `{}`: {}", name, e)))?;
        Ok(PathParam(value))
    }
}

/// Shared state registered with `Router::with_state`.
///
/// ```rust
/// use tour_core::request::State;
///
/// #[derive(Clone)]
/// struct Config {
///     greeting: String,
/// }
///
/// fn handler(State(config): State<Config>) -> String {
///     config.greeting
/// }
/// ```
pub struct State<T>(pub T);

impl<T> FromRequestParts for State<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self> {
        let state = parts.extensions.get::<T>().ok_or_else(|| {
            HttpError::internal(format!(
                "state of type {} was not registered",
                std::any::type_name::<T>()
            ))
        })?;
        Ok(State(state.clone()))
    }
}

/// Trait is implemented for types that can be turned from HeaderMap by specific key.
///
/// ```rust
/// use tour_core::request::ContentType;
///
/// fn handler(ContentType(content_type): ContentType) -> String {
///     content_type
/// }
/// ```
pub trait TypedHeader: Sized {
    /// Returns header's key.
    fn key() -> HeaderName;

    /// Tries to create Self from HeaderValue.
    fn try_from_header_value(header_value: &HeaderValue) -> anyhow::Result<Self>;

    /// Default implementation that uses `key` and `try_from_header_value` functions
    /// to turn `map: HeaderMap<HeaderValue>` into `anyhow::Result<Self>`.
    fn try_from_header_map(map: &HeaderMap<HeaderValue>) -> anyhow::Result<Self> {
        let value = map
            .get(Self::key())
            .ok_or_else(|| HttpError::bad_request(format!("header {} not found", Self::key())))?;
        Self::try_from_header_value(value)
    }
}

/// Macro for faster TypedHeader implementations.
macro_rules! derive_header {
    ($type:ident(_), name: $name:ident) => {
        impl TypedHeader for $type {
            fn key() -> HeaderName {
                $name
            }

            fn try_from_header_value(header_value: &HeaderValue) -> anyhow::Result<Self> {
                let value = header_value
                    .to_str()
                    .map_err(|e| HttpError::bad_request(format!("header {}: {}", $name, e)))?;
                Ok($type(value.to_string()))
            }
        }

        impl FromRequestParts for $type {
            fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self> {
                $type::try_from_header_map(&parts.headers)
            }
        }
    };
}

pub struct ContentType(pub String);
derive_header!(ContentType(_), name: CONTENT_TYPE);

pub struct Host(pub String);
derive_header!(Host(_), name: HOST);
