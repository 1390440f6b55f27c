//! Small synchronous HTTP framework: a thread-per-connection server, a
//! route table with `<param>` segments, typed extractors and responders.

pub mod docs;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod request;
pub mod response;
pub mod route;
pub mod server;

pub use tour_macros::FromParam;
