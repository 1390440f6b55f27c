use crate::{
    docs::{self, ApiInfo},
    error::HttpError,
    handler::{BoxCloneService, HandlerTrait, Service},
    middleware::Middleware,
    request::{Json, PathParams},
    response::{error_response, Responder, Response},
};
use anyhow::bail;
use hyper::{http::Extensions, Body, Method, Request, StatusCode};
use std::{collections::HashMap, sync::Arc};

type StateInjector = Arc<dyn Fn(&mut Extensions) + Send + Sync>;

/// Route table of an application. Implements `Service` so it can be handed
/// straight to `Server::with_service`.
///
/// ```
/// use tour_core::route::Router;
///
/// fn hello() -> &'static str {
///     "hello"
/// }
///
/// let app = Router::default().get("/", hello).get("/items/<item_id>", hello);
/// assert_eq!(app.routes().count(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Router {
    /// Registered routes, first registered route that matches wins.
    routes: HashMap<Method, Vec<Route>>,

    /// Registered middlewares that will be run during request handling.
    /// These are global middlewares, note that each route can have
    /// its own middleware so we can have different behaviors based on route.
    middlewares: Vec<Box<dyn Middleware>>,

    /// Inserts shared state into every request's extensions.
    state: Option<StateInjector>,

    /// Path and metadata of generated API document, if enabled.
    docs: Option<(String, ApiInfo)>,
}

impl Router {
    /// Creates router whose handlers can extract `State<S>`.
    pub fn with_state<S>(state: S) -> Self
    where
        S: Clone + Send + Sync + 'static,
    {
        Self {
            state: Some(Arc::new(move |extensions: &mut Extensions| {
                extensions.insert(state.clone());
            })),
            ..Default::default()
        }
    }

    /// Registers route for given method.
    pub fn route<P, H, Q>(mut self, method: Method, path: P, handler: H) -> Self
    where
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        let route = Route::from_handler(path.into(), handler);
        self.routes.entry(method).or_default().push(route);
        self
    }

    /// Registers GET route.
    pub fn get<P, H, Q>(self, path: P, handler: H) -> Self
    where
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::GET, path, handler)
    }

    /// Registers POST route.
    pub fn post<P, H, Q>(self, path: P, handler: H) -> Self
    where
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::POST, path, handler)
    }

    /// Registers PUT route.
    pub fn put<P, H, Q>(self, path: P, handler: H) -> Self
    where
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::PUT, path, handler)
    }

    /// Registers DELETE route.
    pub fn delete<P, H, Q>(self, path: P, handler: H) -> Self
    where
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::DELETE, path, handler)
    }

    /// Registers new middleware.
    pub fn middleware<M>(mut self, m: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Box::new(m));
        self
    }

    /// Takes vector of `RouteGroup` and adds them to already registered routes.
    ///
    /// ```
    /// use tour_core::route::{RouteGroup, Router};
    ///
    /// let v1 = RouteGroup::new("/v1").get("/user", || "v1");
    /// let v2 = RouteGroup::new("/v2").get("/user", || "v2");
    ///
    /// let app = Router::default().groups(vec![v1, v2]);
    /// assert_eq!(app.routes().count(), 2);
    /// ```
    pub fn groups(mut self, groups: Vec<RouteGroup>) -> Self {
        for rg in groups {
            for (method, rs) in rg.routes() {
                self.routes.entry(method).or_default().extend(rs);
            }
        }
        self
    }

    /// Serves a document describing every registered route under `path`.
    /// See `docs::document`.
    pub fn docs<P: Into<String>>(mut self, path: P, info: ApiInfo) -> Self {
        self.docs = Some((path.into(), info));
        self
    }

    /// Every registered route with its method.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &Route)> {
        self.routes
            .iter()
            .flat_map(|(method, rs)| rs.iter().map(move |r| (method, r)))
    }

    /// Finds route for request's method and path. Answers 405 when only other
    /// methods are registered for the path, 404 when nothing matches.
    pub fn find(&self, method: &Method, path: &str) -> anyhow::Result<(&Route, PathParams)> {
        let found = self.routes.get(method).and_then(|rs| {
            rs.iter()
                .find_map(|r| r.metadata.match_path(path).map(|params| (r, params)))
        });

        if let Some((route, params)) = found {
            return Ok((route, PathParams::new(params)));
        }

        let other_method = self
            .routes
            .iter()
            .filter(|(m, _)| *m != method)
            .any(|(_, rs)| rs.iter().any(|r| r.should_fire_on_path(path)));

        if other_method {
            bail!(HttpError::new(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed"
            ))
        }
        bail!(HttpError::not_found("Not Found"))
    }

    fn dispatch(&self, mut request: Request<Body>) -> anyhow::Result<Response> {
        for m in &self.middlewares {
            m.on_request(&mut request)?;
        }

        let mut response = self.route_request(request)?;

        for m in &self.middlewares {
            m.on_response(&mut response)?;
        }
        Ok(response)
    }

    fn route_request(&self, mut request: Request<Body>) -> anyhow::Result<Response> {
        let path = request.uri().path().to_owned();

        if let Some((docs_path, info)) = &self.docs {
            if *docs_path == path {
                if request.method() != Method::GET {
                    bail!(HttpError::new(
                        StatusCode::METHOD_NOT_ALLOWED,
                        "Method Not Allowed"
                    ))
                }
                return Json(docs::document(self, info)).into_response();
            }
        }

        let (route, params) = self.find(request.method(), &path)?;

        if let Some(inject) = &self.state {
            inject(request.extensions_mut());
        }
        request.extensions_mut().insert(params);

        route.fire(request)
    }
}

impl Service<Request<Body>> for Router {
    type Response = Response;

    fn call(&self, request: Request<Body>) -> Self::Response {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => error_response(&e, StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

/// RouteGroup enables grouping endpoints with common prefix path.
///
/// ```
/// use tour_core::middleware::LogMiddleware;
/// use tour_core::route::RouteGroup;
///
/// let items = RouteGroup::new("/items")
///     .middleware(LogMiddleware)
///     .get("/<item_id>", || "item");
/// ```
#[derive(Clone)]
pub struct RouteGroup {
    prefix: String,
    routes: HashMap<Method, Vec<Route>>,

    /// Registered middlewares on specific RouteGroup. These will
    /// be passed to each route.
    middlewares: Vec<Box<dyn Middleware>>,
}

impl RouteGroup {
    pub fn new<P>(prefix: P) -> Self
    where
        P: ToString,
    {
        Self {
            prefix: prefix.to_string(),
            routes: HashMap::new(),
            middlewares: vec![],
        }
    }

    /// Injects middlewares for registered routes and returns them.
    pub fn routes(&self) -> HashMap<Method, Vec<Route>> {
        let mut routes = self.routes.clone();

        for rs in routes.values_mut() {
            for r in rs {
                r.middlewares.extend(self.middlewares.iter().cloned());
            }
        }
        routes
    }

    fn construct_path<P: ToString>(&self, path: P) -> String {
        format!("{}{}", self.prefix, path.to_string())
    }

    /// Registers route for given method under group's prefix.
    pub fn route<P, H, Q>(mut self, method: Method, path: P, handler: H) -> Self
    where
        P: ToString,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        let route = Route::from_handler(self.construct_path(path), handler);
        self.routes.entry(method).or_default().push(route);
        self
    }

    /// Registers GET route.
    pub fn get<P, H, Q>(self, path: P, handler: H) -> Self
    where
        P: ToString,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::GET, path, handler)
    }

    /// Registers POST route.
    pub fn post<P, H, Q>(self, path: P, handler: H) -> Self
    where
        P: ToString,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::POST, path, handler)
    }

    /// Registers PUT route.
    pub fn put<P, H, Q>(self, path: P, handler: H) -> Self
    where
        P: ToString,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::PUT, path, handler)
    }

    /// Registers DELETE route.
    pub fn delete<P, H, Q>(self, path: P, handler: H) -> Self
    where
        P: ToString,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::DELETE, path, handler)
    }

    /// Registers new middleware.
    /// When calling `RouteGroup::routes` every registered middleware
    /// will be copied into route.
    pub fn middleware<M>(mut self, m: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Box::new(m));
        self
    }
}

/// Smallest unit of routing logic. Should not be constructed directly.
/// Either use methods on `Router` directly or create those
/// routes using `RouteGroup` and `Router::groups` method.
#[derive(Clone)]
pub struct Route {
    pub service: Arc<BoxCloneService<Request<Body>, Response>>,

    /// Contains metadata about registered route.
    pub metadata: RouteMetadata,

    /// Middlewares for single route.
    pub middlewares: Vec<Box<dyn Middleware>>,
}

impl Route {
    /// Creates new Route, tries to parse path into RouteMetadata.
    pub fn new<P>(path: P, handler: BoxCloneService<Request<Body>, Response>) -> anyhow::Result<Self>
    where
        P: Into<String>,
    {
        let path: String = path.into();
        Ok(Self {
            service: Arc::new(handler),
            metadata: RouteMetadata::try_from(path)?,
            middlewares: vec![],
        })
    }

    /// Registration helper, path is written by the programmer so invalid
    /// one is a bug in the application.
    fn from_handler<H, Q>(path: String, handler: H) -> Self
    where
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        let mut route = Route::new(path.as_str(), handler.into_service().into())
            .unwrap_or_else(|e| panic!("tried to register invalid route {}: {}", path, e));
        route.metadata.handler_name = Some(std::any::type_name::<H>());
        route
    }

    /// Indicates if request's path match with router's path.
    ///
    /// '/test/john/doe'  & '/test/<name>/<surn>' => true,
    /// '/test/test/'     & '/test/test'          => true,
    /// '/test/test/test' & '/test/test'          => false,
    pub fn should_fire_on_path<P: AsRef<str>>(&self, path: P) -> bool {
        self.metadata.match_path(path.as_ref()).is_some()
    }

    pub fn fire(&self, mut request: Request<Body>) -> anyhow::Result<Response> {
        for m in &self.middlewares {
            m.on_request(&mut request)?;
        }

        let mut response = self.service.0.call(request);

        for m in &self.middlewares {
            m.on_response(&mut response)?;
        }
        Ok(response)
    }
}

/// One segment of registered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
}

#[derive(Debug, Default, Clone)]
pub struct RouteMetadata {
    /// Original, registered path.
    origin: String,

    /// Parsed segments of the path, without the leading empty one.
    ///
    /// `/test/<param1>` - [Static("test"), Param("param1")].
    segments: Vec<Segment>,

    /// Type name of the handler, used for documentation.
    handler_name: Option<&'static str>,
}

impl RouteMetadata {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn handler_name(&self) -> Option<&'static str> {
        self.handler_name
    }

    /// Names of `<param>` segments in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Static(_) => None,
        })
    }

    /// Matches request path against registered one, returns values of
    /// `<param>` segments when it matches.
    pub fn match_path(&self, path: &str) -> Option<Vec<(String, String)>> {
        let split_path: Vec<&str> = split_path(path).collect();
        if split_path.len() != self.segments.len() {
            return None;
        }

        let mut params = vec![];
        for (p, r) in split_path.into_iter().zip(&self.segments) {
            match r {
                Segment::Static(s) if s == p => {}
                Segment::Param(name) if !p.is_empty() => {
                    params.push((name.clone(), p.to_string()));
                }
                _ => return None,
            }
        }
        Some(params)
    }
}

impl TryFrom<String> for RouteMetadata {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self {
            segments: parse_segments(&value)?,
            origin: value,
            handler_name: None,
        })
    }
}

/// Splits path into segments skipping the leading '/', a single trailing
/// '/' is ignored.
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };
    path.split('/')
}

fn parse_segments(value: &str) -> anyhow::Result<Vec<Segment>> {
    if !value.starts_with('/') {
        bail!("Invalid url - path has to start with '/': {}", value)
    }

    let mut segments = vec![];
    for segment in split_path(value) {
        match (segment.strip_prefix('<'), segment.strip_suffix('>')) {
            (Some(_), Some(_)) if segment.len() > 2 => {
                let name = &segment[1..segment.len() - 1];
                if name.contains(['<', '>']) {
                    bail!("Invalid url - param segment malformed: {}", segment)
                }
                segments.push(Segment::Param(name.to_string()));
            }
            (Some(_), _) | (_, Some(_)) => {
                bail!("Invalid url - param segment not closed: {}", segment)
            }
            _ if segment.contains(['<', '>']) => {
                bail!("Invalid url - param has to be a whole segment: {}", segment)
            }
            _ => segments.push(Segment::Static(segment.to_string())),
        }
    }

    Ok(segments)
}
