use crate::{
    request::{FromRequest, FromRequestParts},
    response::{error_response, respond, Responder, Response},
};
use hyper::{Body, Request, StatusCode};
use std::marker::PhantomData;

/// Trait implemented by transition handler's state.
/// Introduced to have handlers that are generic only over R type.
pub trait Service<R> {
    type Response;

    /// Calls service's logic.
    fn call(&self, req: R) -> Self::Response;
}

/// Transition state for handler, it helps 'hide' Q type that is specific
/// for various types of functions(with different amount of parameters).
///
/// IntoService implements Service trait and this way it's responsible for
/// calling handler effectively calling wanted handler's logic.
pub struct IntoService<H, Q> {
    handler: H,
    _marker: PhantomData<fn() -> Q>,
}

impl<H, Q> Service<Request<Body>> for IntoService<H, Q>
where
    H: HandlerTrait<Q>,
{
    type Response = Response;

    fn call(&self, req: Request<Body>) -> Self::Response {
        self.handler.handle(req)
    }
}

/// Main 'entrypoint' for crate handlers. Functions taking up to five
/// extractors and returning a `Responder` implement this trait and can be
/// passed to `Router` as handlers.
///
/// Extraction failures never reach the handler, they are answered with
/// the status carried by the error (400 when there's none).
pub trait HandlerTrait<Q>: Sized + Send + Sync + 'static {
    /// User defined logic.
    fn handle(&self, request: Request<Body>) -> Response;

    /// Turns Self into `IntoService`.
    fn into_service(self) -> IntoService<Self, Q> {
        IntoService {
            handler: self,
            _marker: PhantomData,
        }
    }
}

macro_rules! implement_handler_trait {
    ([$($ty:ident),*], $last:ident) => {
        #[allow(non_snake_case, unused_mut)]
        impl<F, R, M, $($ty,)* $last> HandlerTrait<(M, $($ty,)* $last)> for F
        where
            R: Responder,
            $($ty: FromRequestParts,)*
            $last: FromRequest<M>,
            F: Fn($($ty,)* $last) -> R + Send + Sync + 'static,
        {
            fn handle(&self, request: Request<Body>) -> Response {
                let (mut parts, body) = request.into_parts();

                $(
                    let $ty = match $ty::from_request_parts(&mut parts) {
                        Ok(value) => value,
                        Err(e) => return error_response(&e, StatusCode::BAD_REQUEST),
                    };
                )*

                let $last = match $last::from_request(Request::from_parts(parts, body)) {
                    Ok(value) => value,
                    Err(e) => return error_response(&e, StatusCode::BAD_REQUEST),
                };

                respond(self($($ty,)* $last))
            }
        }
    };
}

implement_handler_trait!([], T1);
implement_handler_trait!([T1], T2);
implement_handler_trait!([T1, T2], T3);
implement_handler_trait!([T1, T2, T3], T4);
implement_handler_trait!([T1, T2, T3, T4], T5);

impl<F, R> HandlerTrait<((),)> for F
where
    R: Responder,
    F: Fn() -> R + Send + Sync + 'static,
{
    fn handle(&self, _request: Request<Body>) -> Response {
        respond(self())
    }
}

/// Type-erased service stored by routes.
pub struct BoxCloneService<T, U>(pub Box<dyn Service<T, Response = U> + Send + Sync>);

impl<T, U> BoxCloneService<T, U> {
    pub fn new<S>(service: S) -> Self
    where
        S: Service<T, Response = U> + Send + Sync + 'static,
    {
        Self(Box::new(service))
    }
}

impl<H, Q> From<IntoService<H, Q>> for BoxCloneService<Request<Body>, Response>
where
    Q: 'static,
    H: HandlerTrait<Q>,
{
    fn from(val: IntoService<H, Q>) -> Self {
        BoxCloneService::new(val)
    }
}
