//! Tutorial endpoints served by `tour-core`.
//!
//! ```no_run
//! use tour::{app, config::AppConfig};
//! use tour_core::server::Server;
//!
//! let config = AppConfig::default();
//! Server::new(config.host.clone(), config.port)
//!     .with_config(config.server_config())
//!     .with_service(app(&config))
//!     .run()
//!     .unwrap();
//! ```

pub mod config;
pub mod decode;
pub mod routes;
pub mod upstream;

use config::AppConfig;
use routes::AppState;
use tour_core::{middleware::LogMiddleware, route::Router};

/// Path of the generated API document.
pub const DOCS_PATH: &str = "/openapi.json";

/// Builds the routing table.
pub fn app(config: &AppConfig) -> Router {
    Router::with_state(AppState::new(config))
        .middleware(LogMiddleware)
        .get("/", routes::read_root)
        .get("/items/<item_id>", routes::read_item)
        .put("/items/<item_id>", routes::update_item)
        .get("/uuid", routes::read_uuid)
        .get("/query", routes::read_query)
        .get("/test", routes::decode_query)
        .docs(DOCS_PATH, config.info.clone())
}
