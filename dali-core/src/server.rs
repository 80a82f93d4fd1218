//! HTTP/1 server hosting the payload handler.
//!
//! Accepts connections on a tokio [`TcpListener`], serves each with hyper's
//! HTTP/1 connection driver and shuts down gracefully when the shutdown
//! future resolves (ctrl-c for [`DaliServer::listen`]).

use crate::body::ChainBody;
use crate::handler::{PayloadHandler, PayloadRequest};
use crate::lifecycle::RequestState;
use crate::transport::{HeaderOutcome, ResponseHead, Transport, TransportError};
use crate::{Error, Result};
use async_trait::async_trait;
use http::{Method, StatusCode, header};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// How long in-flight connections get to finish after shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// [`Transport`] over one hyper request/response exchange.
///
/// hyper writes the response once the service future returns, so the head
/// and body are collected here and turned into a [`Response`] by
/// [`into_response`](Self::into_response).
#[derive(Debug)]
pub struct HyperTransport<B = Incoming> {
    body: Option<B>,
    header_only: bool,
    head: Option<ResponseHead>,
    chain: Option<ChainBody>,
}

impl<B> HyperTransport<B> {
    pub fn new(body: B, method: &Method) -> Self {
        Self {
            body: Some(body),
            header_only: *method == Method::HEAD,
            head: None,
            chain: None,
        }
    }

    /// Build the response for a finished request.
    ///
    /// Errors raised before headers were sent become an empty-bodied
    /// response with the error's status.
    pub fn into_response(self, result: Result<RequestState>) -> Response<ChainBody> {
        match (self.head, result) {
            (Some(head), _) => build(&head, self.chain.unwrap_or_else(ChainBody::empty)),
            (None, Err(Error::RangeNotSatisfiable { length })) => {
                build(&ResponseHead::unsatisfiable(length), ChainBody::empty())
            }
            (None, Err(err)) => build(&ResponseHead::error(err.status_code()), ChainBody::empty()),
            (None, Ok(state)) => {
                tracing::error!(%state, "Request finished without sending headers");
                build(
                    &ResponseHead::error(StatusCode::INTERNAL_SERVER_ERROR),
                    ChainBody::empty(),
                )
            }
        }
    }
}

fn build(head: &ResponseHead, body: ChainBody) -> Response<ChainBody> {
    match head.to_builder().body(body) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Invalid response head");
            let mut response = Response::new(ChainBody::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

#[async_trait]
impl<B> Transport for HyperTransport<B>
where
    B: Body + Send + Unpin,
{
    type Body = B;

    fn take_body(&mut self) -> Option<B> {
        self.body.take()
    }

    async fn send_header(&mut self, head: ResponseHead) -> std::result::Result<HeaderOutcome, TransportError> {
        if self.head.is_some() {
            return Err("response head already sent".into());
        }
        self.head = Some(head);
        Ok(if self.header_only {
            HeaderOutcome::HeaderOnly
        } else {
            HeaderOutcome::Continue
        })
    }

    async fn send_chain(&mut self, body: ChainBody) -> std::result::Result<(), TransportError> {
        if self.head.is_none() {
            return Err("body sent before response head".into());
        }
        self.chain = Some(body);
        Ok(())
    }
}

/// Serve one hyper request with `handler`.
pub async fn handle_request(req: Request<Incoming>, handler: Arc<PayloadHandler>) -> Response<ChainBody> {
    let (parts, body) = req.into_parts();

    let request = PayloadRequest {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        range: parts
            .headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let mut transport = HyperTransport::new(body, &parts.method);
    let result = handler.handle(&request, &mut transport).await;
    transport.into_response(result)
}

/// The payload HTTP server.
#[derive(Debug, Clone)]
pub struct DaliServer {
    handler: Arc<PayloadHandler>,
}

impl DaliServer {
    pub fn new(handler: PayloadHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn handler(&self) -> &PayloadHandler {
        &self.handler
    }

    /// Bind `addr` and serve until ctrl-c.
    pub async fn listen(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves, then
    /// give in-flight connections [`SHUTDOWN_GRACE`] to finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, routes = self.handler.routes().len(), "Dali listening");

        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let handler = Arc::clone(&self.handler);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let handler = Arc::clone(&handler);
                        async move { Ok::<_, Infallible>(handle_request(req, handler).await) }
                    });

                    let connection = graceful.watch(http1::Builder::new().serve_connection(io, service));
                    tokio::spawn(async move {
                        if let Err(e) = connection.await {
                            tracing::debug!(%peer, error = %e, "Connection closed with error");
                        }
                    });
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received, draining connections");
                    break;
                }
            }
        }

        drop(listener);
        tokio::select! {
            _ = graceful.shutdown() => {
                tracing::info!("All connections closed");
            }
            _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
                tracing::warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Grace period elapsed with open connections");
            }
        }

        Ok(())
    }
}

/// Resolves on ctrl-c.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Empty};

    fn transport(method: Method) -> HyperTransport<Empty<Bytes>> {
        HyperTransport::new(Empty::new(), &method)
    }

    #[tokio::test]
    async fn test_head_request_is_header_only() {
        let mut transport = transport(Method::HEAD);
        let outcome = transport.send_header(ResponseHead::ok(500)).await.unwrap();
        assert_eq!(outcome, HeaderOutcome::HeaderOnly);

        let response = transport.into_response(Ok(RequestState::HeadersSent));
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "500");
        assert!(response.into_body().is_end_stream());
    }

    #[tokio::test]
    async fn test_second_head_is_rejected() {
        let mut transport = transport(Method::GET);
        transport.send_header(ResponseHead::ok(1)).await.unwrap();
        assert!(transport.send_header(ResponseHead::ok(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_chain_before_head_is_rejected() {
        let mut transport = transport(Method::GET);
        assert!(transport.send_chain(ChainBody::empty()).await.is_err());
    }

    #[test]
    fn test_error_before_headers() {
        let response = transport(Method::GET).into_response(Err(Error::ConfigurationUnavailable(
            "no size".to_string(),
        )));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
    }

    #[tokio::test]
    async fn test_unsatisfiable_response() {
        let response = transport(Method::GET)
            .into_response(Err(Error::RangeNotSatisfiable { length: 500 }));
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */500");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_body_failure_after_headers_is_reported() {
        use crate::body::BodyFailure;
        use crate::device::DevZero;
        use crate::plan::Strategy;
        use crate::scope::{ScopeSettings, ScopeTree};
        use std::sync::Mutex;

        // A regular empty file runs out of bytes where /dev/zero never does
        let empty = tempfile::NamedTempFile::new().unwrap();
        let failures: Arc<Mutex<Vec<BodyFailure>>> = Arc::default();
        let sink = Arc::clone(&failures);

        let handler = PayloadHandler::new(
            ScopeTree::new(ScopeSettings::new(500, Some(Strategy::Zero))).finalize(),
        )
        .with_zero_source(Arc::new(DevZero::with_path(empty.path())))
        .on_body_failure(Arc::new(move |failure: &BodyFailure| sink.lock().unwrap().push(failure.clone())));

        let mut transport = transport(Method::GET);
        let state = handler
            .handle(&PayloadRequest::get("/zero"), &mut transport)
            .await
            .unwrap();
        assert_eq!(state, RequestState::BodySent);

        let response = transport.into_response(Ok(state));
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "500");
        let err = response.into_body().collect().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        let context = failures[0].context.as_ref().unwrap();
        assert_eq!(context.path, "/zero");
        assert_eq!(context.length, 500);
        assert_eq!(context.strategy, Strategy::Zero);
    }

    #[test]
    fn test_take_body_once() {
        let mut transport = transport(Method::GET);
        assert!(transport.take_body().is_some());
        assert!(transport.take_body().is_none());
    }
}
