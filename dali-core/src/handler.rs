//! Request flow.
//!
//! [`PayloadHandler`] runs one request through the [`RequestLifecycle`]:
//! resolve the scope, plan, assemble (opening the zero device when needed),
//! drain and time the request body, then send headers and the chain through
//! the [`Transport`].
//!
//! Per-request resources live in a [`RequestContext`] created before the only
//! suspension point (the body drain). The zero device handle in it moves into
//! the response body once headers are sent, so it has one owner at a time and
//! is closed exactly once whether the request completes, fails, ends after
//! headers, or is abandoned by dropping the future.
//!
//! The body is streamed by the transport after [`PayloadHandler::handle`]
//! returns; failures from that point on are reported by the body through the
//! handler's [`FailureHook`].

use crate::assembler::ResponseAssembler;
use crate::body::{ChainBody, FailureHook, SendContext};
use crate::chain::ResponseChain;
use crate::device::{DevZero, DeviceHandle, ZeroSource};
use crate::lifecycle::{RequestLifecycle, RequestState};
use crate::pattern::StaticPatternBuffer;
use crate::plan::{PayloadPlan, PayloadPlanner, Strategy};
use crate::range::RangeRequest;
use crate::scope::RouteTable;
use crate::timing::BodyDrainTimer;
use crate::transport::{HeaderOutcome, ResponseHead, Transport};
use crate::{Error, ErrorKind, Result};
use http::Method;
use hyper::body::Body;
use std::fmt;
use std::sync::Arc;

/// The parts of a request the payload engine looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadRequest {
    pub method: Method,
    pub path: String,
    /// Raw `Range` header value
    pub range: Option<String>,
}

impl PayloadRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            range: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

/// Everything one request owns between dispatch and completion.
#[derive(Debug, Default)]
pub struct RequestContext {
    pub lifecycle: RequestLifecycle,
    pub length: Option<u64>,
    pub strategy: Option<Strategy>,
    pub plan: Option<PayloadPlan>,
    pub chain: Option<ResponseChain>,
    pub device: Option<DeviceHandle>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&mut self, next: RequestState) {
        self.lifecycle.advance(next);
    }
}

/// Serves synthetic payloads for a fixed route table.
#[derive(Clone)]
pub struct PayloadHandler {
    routes: Arc<RouteTable>,
    planner: PayloadPlanner,
    assembler: ResponseAssembler,
    zero_source: Arc<dyn ZeroSource>,
    timer: BodyDrainTimer,
    on_body_failure: Option<FailureHook>,
}

impl PayloadHandler {
    pub fn new(routes: RouteTable) -> Self {
        Self {
            routes: Arc::new(routes),
            planner: PayloadPlanner::new(),
            assembler: ResponseAssembler::default(),
            zero_source: Arc::new(DevZero::new()),
            timer: BodyDrainTimer::new(),
            on_body_failure: None,
        }
    }

    pub fn with_planner(mut self, planner: PayloadPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_pattern(mut self, pattern: StaticPatternBuffer) -> Self {
        self.assembler = ResponseAssembler::new(pattern);
        self
    }

    pub fn with_zero_source(mut self, source: Arc<dyn ZeroSource>) -> Self {
        self.zero_source = source;
        self
    }

    /// Run `hook` when a response body fails after its headers were sent.
    pub fn on_body_failure(mut self, hook: FailureHook) -> Self {
        self.on_body_failure = Some(hook);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn planner(&self) -> &PayloadPlanner {
        &self.planner
    }

    /// Handle one request end to end.
    ///
    /// Returns the terminal state reached. Every error is logged here once,
    /// with the configured length, strategy and stage, and then returned so
    /// the host can answer with [`Error::status_code`] if headers have not
    /// gone out yet.
    pub async fn handle<T>(&self, request: &PayloadRequest, transport: &mut T) -> Result<RequestState>
    where
        T: Transport,
        <T::Body as Body>::Error: fmt::Display,
    {
        let mut ctx = RequestContext::new();

        match self.run(request, transport, &mut ctx).await {
            Ok(()) => {
                tracing::debug!(
                    path = %request.path,
                    state = %ctx.lifecycle.state(),
                    elapsed_us = ctx.lifecycle.age().as_micros() as u64,
                    "Dali request finished"
                );
                Ok(ctx.lifecycle.state())
            }
            Err(err) => {
                let stage = ctx.lifecycle.stage();
                ctx.lifecycle.fail(err.kind());
                self.report(request, &ctx, stage, &err);
                Err(err)
            }
        }
    }

    async fn run<T>(
        &self,
        request: &PayloadRequest,
        transport: &mut T,
        ctx: &mut RequestContext,
    ) -> Result<()>
    where
        T: Transport,
        <T::Body as Body>::Error: fmt::Display,
    {
        tracing::debug!(path = %request.path, method = %request.method, "Dali responding");

        let scope = self.routes.lookup(&request.path).ok_or_else(|| {
            Error::ConfigurationUnavailable(format!("no scope matches {}", request.path))
        })?;
        ctx.strategy = Some(scope.strategy);
        let length = scope.length().ok_or_else(|| {
            Error::ConfigurationUnavailable(format!("no size configured for {}", scope.prefix))
        })?;
        ctx.length = Some(length);
        ctx.advance(RequestState::ConfigResolved);

        let plan = self.planner.plan(length, scope.strategy)?;
        let strategy = plan.strategy;
        ctx.advance(RequestState::PlanBuilt);

        if strategy == Strategy::Zero {
            ctx.device = Some(self.zero_source.open()?);
        }
        ctx.chain = Some(self.assembler.assemble(&plan)?);
        ctx.plan = Some(plan);
        ctx.advance(RequestState::ChainAssembled);

        let body = transport.take_body();
        let pending = body.as_ref().is_some_and(|b| !b.is_end_stream());
        if pending {
            ctx.advance(RequestState::AwaitingBody);
        }
        let report = self.timer.drain(body).await?;
        if pending {
            ctx.advance(RequestState::BodyDrained);
        }

        let mut chain = ctx.chain.take().ok_or_else(|| {
            Error::AllocationFailure("response chain missing after assembly".to_string())
        })?;

        if strategy == Strategy::Instrumented {
            self.assembler.prefix_report(&mut chain, &report)?;
        }

        let total = chain.total_length();
        // No source here is a regular file, so passthrough stays off
        let mut head = ResponseHead::ok(total).with_accept_ranges(strategy.supports_ranges());

        if strategy.supports_ranges() {
            match RangeRequest::resolve(request.range.as_deref(), total) {
                RangeRequest::Full => {}
                RangeRequest::Partial(range) => {
                    tracing::debug!(%range, total, "Serving byte range");
                    chain = chain.window(range.start, range.end);
                    head = ResponseHead::partial(range, total);
                }
                RangeRequest::Unsatisfiable => {
                    return Err(Error::RangeNotSatisfiable { length: total });
                }
            }
        }

        tracing::debug!("Dali sending a {} byte response", head.content_length);

        let outcome = transport
            .send_header(head)
            .await
            .map_err(|e| Error::HeaderSendFailure(e.to_string()))?;
        ctx.advance(RequestState::HeadersSent);

        if outcome == HeaderOutcome::HeaderOnly {
            return Ok(());
        }

        let mut body = ChainBody::new(chain, self.assembler.pattern().clone(), ctx.device.take())
            .with_context(SendContext {
                path: request.path.clone(),
                length,
                strategy,
            });
        if let Some(hook) = &self.on_body_failure {
            body = body.on_failure(Arc::clone(hook));
        }
        transport
            .send_chain(body)
            .await
            .map_err(|e| Error::BodySendFailure(e.to_string()))?;
        ctx.advance(RequestState::BodySent);

        Ok(())
    }

    fn report(&self, request: &PayloadRequest, ctx: &RequestContext, stage: RequestState, err: &Error) {
        let length = ctx.length.map(|l| l as i64).unwrap_or(-1);
        let strategy = ctx.strategy.map(|s| s.as_str()).unwrap_or("unresolved");
        let elapsed_us = ctx.lifecycle.age().as_micros() as u64;

        if err.kind() == ErrorKind::RangeNotSatisfiable {
            tracing::warn!(
                path = %request.path,
                length,
                strategy,
                stage = %stage,
                elapsed_us,
                error = %err,
                "Dali range not satisfiable"
            );
        } else {
            tracing::error!(
                severity = "critical",
                path = %request.path,
                length,
                strategy,
                stage = %stage,
                elapsed_us,
                error = %err,
                "Dali request failed"
            );
        }
    }
}

impl fmt::Debug for PayloadHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadHandler")
            .field("routes", &self.routes.len())
            .field("planner", &self.planner)
            .finish()
    }
}
