use crate::{
    error::HttpError,
    handler::Service,
    response::{body_to_bytes, respond, Response},
};
use anyhow::{bail, Context};
use hyper::{
    header::{CONNECTION, CONTENT_LENGTH},
    Body, Request, StatusCode,
};
use log::{debug, error, info, warn};
use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpListener, TcpStream},
    sync::Arc,
    thread,
    time::Duration,
};

const MESSAGE_SIZE: usize = 1024;
const MAX_HEADERS: usize = 64;

pub const DEFAULT_MAX_HEAD_SIZE: usize = 256 * 1024;
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on draining input of a rejected request.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection level limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Requests with bigger head (request line and headers) are rejected.
    pub max_head_size: usize,

    /// Requests with bigger body are rejected.
    pub max_body_size: usize,

    /// Time a connection may stay silent while request is read.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_head_size: DEFAULT_MAX_HEAD_SIZE,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            read_timeout: Some(DEFAULT_TIMEOUT),
            write_timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

pub struct Server<V> {
    host: String,
    port: u16,
    config: ServerConfig,

    /// Service that handles every request, usually a `Router`.
    service: V,
}

impl Server<()> {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            config: ServerConfig::default(),
            service: (),
        }
    }
}

impl<V> Server<V> {
    /// Sets service that will handle requests.
    pub fn with_service<S>(self, service: S) -> Server<S>
    where
        S: Service<Request<Body>, Response = Response> + Send + Sync + 'static,
    {
        Server {
            host: self.host,
            port: self.port,
            config: self.config,
            service,
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }
}

impl<V> Server<V>
where
    V: Service<Request<Body>, Response = Response> + Send + Sync + 'static,
{
    /// Binds configured address and starts server, blocks forever.
    pub fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .with_context(|| format!("could not bind {}:{}", self.host, self.port))?;
        self.serve(listener)
    }

    /// Serves connections accepted by already bound listener, each
    /// connection is handled by its own thread.
    pub fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        info!("listening on {}", listener.local_addr()?);

        let server = Arc::new(self);

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("could not accept connection: {}", e);
                    continue;
                }
            };
            let s = server.clone();
            thread::spawn(move || {
                if let Err(e) = s.handle(stream) {
                    error!("got error during handling connection: {:#}", e);
                }
            });
        }
        Ok(())
    }

    /// Calls service and pass response to function that writes to opened stream.
    fn handle(&self, mut stream: TcpStream) -> anyhow::Result<()> {
        stream.set_read_timeout(self.config.read_timeout)?;
        stream.set_write_timeout(self.config.write_timeout)?;

        let (response, rejected) = match parse_request(&mut stream, &self.config) {
            Ok(request) => (self.fire(request), false),
            Err(e) if is_timeout(&e) => {
                debug!("connection timed out: {:#}", e);
                let response = respond(HttpError::new(
                    StatusCode::REQUEST_TIMEOUT,
                    "request was not received in time",
                ));
                (response, false)
            }
            Err(e) => {
                warn!("could not parse request: {:#}", e);
                let response = respond(HttpError::bad_request(format!("malformed request: {}", e)));
                (response, true)
            }
        };

        let response_bytes: Vec<u8> = response_to_bytes(response)?;
        stream.write_all(&response_bytes)?;
        stream.flush()?;

        if rejected {
            // Unread input would turn close into a reset and the client could
            // lose the response.
            stream.shutdown(Shutdown::Write)?;
            stream.set_read_timeout(Some(DRAIN_TIMEOUT))?;
            let limit = (self.config.max_head_size + self.config.max_body_size) as u64;
            let _ = io::copy(&mut (&stream).take(limit), &mut io::sink());
        }

        Ok(())
    }

    /// Method that runs whole server's logic without touching the network.
    pub fn fire(&self, request: Request<Body>) -> Response {
        self.service.call(request)
    }
}

fn is_timeout(err: &anyhow::Error) -> bool {
    err.downcast_ref::<io::Error>()
        .map(|e| matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut))
        .unwrap_or(false)
}

/// Reads request head and `Content-Length` bytes of body from `stream`
/// and parses them into a http request.
pub fn parse_request<R: Read>(
    stream: &mut R,
    config: &ServerConfig,
) -> anyhow::Result<Request<Body>> {
    // Store all the bytes for our received request.
    let mut received: Vec<u8> = vec![];
    let mut rx_bytes = [0u8; MESSAGE_SIZE];

    let (builder, head_len, content_length) = loop {
        let bytes_read = stream.read(&mut rx_bytes)?;
        if bytes_read == 0 {
            bail!("connection closed before request head was complete");
        }
        received.extend_from_slice(&rx_bytes[..bytes_read]);

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        match req.parse(&received)? {
            httparse::Status::Complete(head_len) => {
                let content_length = parse_content_length(req.headers)?;
                break (request_builder(&req)?, head_len, content_length);
            }
            httparse::Status::Partial if received.len() > config.max_head_size => {
                bail!("request head exceeds {} bytes", config.max_head_size)
            }
            httparse::Status::Partial => {}
        }
    };

    if content_length > config.max_body_size {
        bail!("request body exceeds {} bytes", config.max_body_size)
    }

    let total = head_len + content_length;
    while received.len() < total {
        let bytes_read = stream.read(&mut rx_bytes)?;
        if bytes_read == 0 {
            bail!("connection closed before request body was complete");
        }
        received.extend_from_slice(&rx_bytes[..bytes_read]);
    }

    Ok(builder.body(Body::from(received[head_len..total].to_vec()))?)
}

fn request_builder(req: &httparse::Request) -> anyhow::Result<hyper::http::request::Builder> {
    let mut builder = hyper::Request::builder()
        .method(req.method.context("request has no method")?)
        .uri(req.path.context("request has no path")?);

    for header in req.headers.iter() {
        builder = builder.header(header.name, header.value);
    }

    Ok(builder)
}

fn parse_content_length(headers: &[httparse::Header]) -> anyhow::Result<usize> {
    match headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()))
    {
        Some(header) => std::str::from_utf8(header.value)?
            .trim()
            .parse()
            .context("invalid content-length header"),
        None => Ok(0),
    }
}

/// Serializes response into HTTP/1.1 wire format. Connection is always
/// closed after the response so `connection: close` is set.
pub fn response_to_bytes(response: Response) -> anyhow::Result<Vec<u8>> {
    use std::fmt::Write as _; // import without risk of name clashing

    let (parts, body) = response.into_parts();
    let body = body_to_bytes(body)?;

    let mut head = String::new();
    write!(
        &mut head,
        "HTTP/1.1 {} {}\r\n",
        parts.status.as_str(),
        parts.status.canonical_reason().unwrap_or_default()
    )?;

    for (k, v) in parts.headers.iter() {
        if *k == CONTENT_LENGTH || *k == CONNECTION {
            continue;
        }
        write!(&mut head, "{}: {}\r\n", k, v.to_str()?)?;
    }
    write!(&mut head, "{}: {}\r\n", CONTENT_LENGTH, body.len())?;
    write!(&mut head, "{}: close\r\n\r\n", CONNECTION)?;

    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(&body);
    Ok(bytes)
}
