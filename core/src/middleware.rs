use crate::response::Response;
use hyper::{Body, Request};
use log::debug;

/// Splitting MiddlewareClone into its own trait allows us to provide a blanket
/// implementation for all compatible types, without having to implement the
/// rest of Middleware. In this case, we implement it for all types that have
/// 'static lifetime (*i.e.* they don't contain non-'static pointers), and
/// implement both Middleware and Clone.
///
/// This is hack because `Middleware: Clone` would make it not object safe.
/// More info here: https://doc.rust-lang.org/reference/items/traits.html#object-safety.
pub trait MiddlewareClone {
    fn clone_box(&self) -> Box<dyn Middleware>;
}

impl<T> MiddlewareClone for T
where
    T: 'static + Middleware + Clone,
{
    fn clone_box(&self) -> Box<dyn Middleware> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Middleware> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

pub trait Middleware: MiddlewareClone + Send + Sync {
    /// Functionality that is being run on every request that goes into the server.
    /// Returning an error stops the request, the error is turned into a response.
    fn on_request(&self, _req: &mut Request<Body>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Functionality that is being run every response that goes out of a server.
    fn on_response(&self, _res: &mut Response) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogMiddleware;

impl Middleware for LogMiddleware {
    fn on_request(&self, req: &mut Request<Body>) -> anyhow::Result<()> {
        debug!(
            "LogMiddleware::on_request - {} {} headers: {:?}",
            req.method(),
            req.uri(),
            req.headers()
        );
        Ok(())
    }

    fn on_response(&self, res: &mut Response) -> anyhow::Result<()> {
        debug!(
            "LogMiddleware::on_response - status: {} headers: {:?}",
            res.status(),
            res.headers()
        );
        Ok(())
    }
}
