pub mod http;
pub mod request;
pub mod response;

pub use self::http::HttpTransport;
pub use request::Request;
pub use response::Response;

use crate::configuration::options::ExecutionOptions;
use crate::error::TransportError;
use futures::future::BoxFuture;
use std::future::Future;

/// Performs a request and produces the response assertions run against.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: Request,
        options: &ExecutionOptions,
    ) -> BoxFuture<'static, Result<Response, TransportError>>;
}

impl<F, Fut> Transport for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
{
    fn send(
        &self,
        request: Request,
        _options: &ExecutionOptions,
    ) -> BoxFuture<'static, Result<Response, TransportError>> {
        Box::pin(self(request))
    }
}
