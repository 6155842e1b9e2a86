//! Request pipeline.
//!
//! A [`Pipeline`] is an ordered list of [`Policy`] stages. Each stage receives
//! the request together with a [`Next`] continuation for the rest of the chain;
//! the last stage is a transport that performs the HTTP exchange.
//!
//! Requests can be sent asynchronously with [`Pipeline::send`] or from
//! synchronous code with [`Pipeline::send_blocking`]. Both run the same
//! policies in the same order.

use crate::error::{ServiceError, ServiceResult};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

pub use crate::http::{Request, Response};

/// Per-call state shared by every policy handling one request.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancellation: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `token` to cancel the call.
    ///
    /// Pass a child token (`token.child_token()`) to cancel a group of calls
    /// without touching unrelated ones.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// A stage of the request pipeline.
///
/// Implementations inspect or mutate the request and then hand it to `next`.
/// A terminal stage (a transport) produces the response instead.
#[async_trait::async_trait]
pub trait Policy: Send + Sync + std::fmt::Debug {
    async fn send(
        &self,
        ctx: &Context,
        request: &mut Request,
        next: Next<'_>,
    ) -> ServiceResult<Response>;
}

/// The remainder of the pipeline after the current policy.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    policies: &'a [Arc<dyn Policy>],
}

impl<'a> Next<'a> {
    fn new(policies: &'a [Arc<dyn Policy>]) -> Self {
        Self { policies }
    }

    /// Run the remaining policies.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Runtime`] if the chain has no transport left.
    pub async fn run(self, ctx: &Context, request: &mut Request) -> ServiceResult<Response> {
        match self.policies.split_first() {
            Some((policy, rest)) => policy.send(ctx, request, Next::new(rest)).await,
            None => Err(ServiceError::Runtime(
                "pipeline ended without a transport policy".into(),
            )),
        }
    }

    /// Number of policies still to run.
    pub fn remaining(&self) -> usize {
        self.policies.len()
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.policies.len())
            .finish()
    }
}

/// Current-thread runtime backing the blocking path.
///
/// Dropping a tokio runtime blocks, which panics inside async code, so the
/// runtime is shut down in the background instead.
#[derive(Debug)]
struct BlockingRuntime(Option<tokio::runtime::Runtime>);

impl Drop for BlockingRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// An immutable, cheaply cloneable chain of policies.
///
/// The blocking path lazily creates a current-thread tokio runtime owned by
/// the pipeline. The pipeline can be dropped from any context, including
/// from inside an async task.
#[derive(Debug, Clone)]
pub struct Pipeline {
    policies: Arc<[Arc<dyn Policy>]>,
    blocking_runtime: Arc<OnceLock<BlockingRuntime>>,
}

impl Pipeline {
    /// Create a pipeline. The last policy is expected to be a transport.
    pub fn new(policies: Vec<Arc<dyn Policy>>) -> Self {
        Self {
            policies: policies.into(),
            blocking_runtime: Arc::new(OnceLock::new()),
        }
    }

    pub fn policies(&self) -> &[Arc<dyn Policy>] {
        &self.policies
    }

    /// Send a request through every policy.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Cancelled`] if the context's token fires before
    /// the transport completes, or whatever error a policy produces.
    pub async fn send(&self, ctx: &Context, mut request: Request) -> ServiceResult<Response> {
        let token = ctx.cancellation();
        if token.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        tracing::trace!(
            method = %request.method(),
            url = %request.url(),
            policies = self.policies.len(),
            "sending request through pipeline",
        );

        let response = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!("request cancelled before transport completed");
                return Err(ServiceError::Cancelled);
            }
            result = Next::new(&self.policies).run(ctx, &mut request) => result?,
        };
        Ok(response.with_url(request.url().clone()))
    }

    /// Blocking counterpart of [`send`](Self::send).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Runtime`] when called from inside an async
    /// runtime, plus everything [`send`](Self::send) can return.
    pub fn send_blocking(&self, ctx: &Context, request: Request) -> ServiceResult<Response> {
        self.block_on(self.send(ctx, request))
    }

    /// Drive `future` to completion on the pipeline's blocking runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Runtime`] when called from inside an async
    /// runtime or if the runtime cannot be created.
    pub fn block_on<T, F>(&self, future: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ServiceError::Runtime(
                "blocking call made from within an async runtime; use the async API instead"
                    .into(),
            ));
        }

        self.blocking_runtime()?.block_on(future)
    }

    fn blocking_runtime(&self) -> ServiceResult<&tokio::runtime::Runtime> {
        if let Some(BlockingRuntime(Some(runtime))) = self.blocking_runtime.get() {
            return Ok(runtime);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ServiceError::Runtime(format!("failed to create tokio runtime: {e}")))?;

        // Another thread may have won the race; its runtime is kept.
        let _ = self.blocking_runtime.set(BlockingRuntime(Some(runtime)));
        match self.blocking_runtime.get() {
            Some(BlockingRuntime(Some(runtime))) => Ok(runtime),
            _ => Err(ServiceError::Runtime("blocking runtime unavailable".into())),
        }
    }
}
