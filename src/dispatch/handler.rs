//! # Handler abstractions and function-backed implementations.
//!
//! A handler is either asynchronous ([`AsyncHandler`], scheduled as its own
//! task) or blocking ([`BlockingHandler`], executed on the blocking pool). The
//! [`Handler`] enum is what the dispatch table stores; it holds the
//! implementation behind an `Arc`, so registering never copies it.
//!
//! Closures are the common case:
//!
//! ```rust
//! use heartbus::{Emission, Handler, HandlerError};
//!
//! let greet = Handler::from_async("greet", |em: Emission| async move {
//!     let _ = em.signal;
//!     Ok::<_, HandlerError>(())
//! });
//! let audit = Handler::from_blocking("audit", |_em: Emission| Ok(()));
//!
//! assert_eq!(greet.name(), "greet");
//! assert!(audit.is_blocking());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dispatch::{Payload, Signal};
use crate::error::HandlerError;

/// Future returned by an asynchronous handler.
pub type BoxHandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'static>>;

/// What one handler invocation receives.
#[derive(Clone, Debug)]
pub struct Emission {
    /// Signal that triggered the invocation.
    pub signal: Signal,
    /// Shared payload of the emission.
    pub payload: Payload,
}

/// Handler that suspends cooperatively; every call produces a fresh future.
pub trait AsyncHandler: Send + Sync + 'static {
    /// Stable, human-readable name (logs and events).
    fn name(&self) -> &str;

    /// Creates the future for one invocation.
    fn call(&self, emission: Emission) -> BoxHandlerFuture;
}

/// Handler that blocks its thread; it is run on the blocking pool.
pub trait BlockingHandler: Send + Sync + 'static {
    /// Stable, human-readable name (logs and events).
    fn name(&self) -> &str;

    /// Runs one invocation to completion.
    fn call(&self, emission: Emission) -> Result<(), HandlerError>;
}

/// A registered handler of either execution kind.
#[derive(Clone)]
pub enum Handler {
    /// Scheduled as an independent task.
    Async(Arc<dyn AsyncHandler>),
    /// Off-loaded to the blocking worker pool.
    Blocking(Arc<dyn BlockingHandler>),
}

impl Handler {
    /// Wraps an async closure `Fn(Emission) -> Future`.
    pub fn from_async<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Emission) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Handler::Async(Arc::new(HandlerFn::new(name, f)))
    }

    /// Wraps a blocking closure `Fn(Emission) -> Result`.
    pub fn from_blocking<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Emission) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Handler::Blocking(Arc::new(BlockingFn::new(name, f)))
    }

    /// Handler name.
    pub fn name(&self) -> &str {
        match self {
            Handler::Async(h) => h.name(),
            Handler::Blocking(h) => h.name(),
        }
    }

    /// True for [`Handler::Blocking`].
    pub fn is_blocking(&self) -> bool {
        matches!(self, Handler::Blocking(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_blocking() { "blocking" } else { "async" };
        f.debug_struct("Handler")
            .field("name", &self.name())
            .field("kind", &kind)
            .finish()
    }
}

/// Function-backed asynchronous handler.
///
/// Wraps a closure that *creates* a new future per call; shared state, if any,
/// goes into the closure explicitly (`Arc<...>`).
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F, Fut> AsyncHandler for HandlerFn<F>
where
    F: Fn(Emission) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, emission: Emission) -> BoxHandlerFuture {
        Box::pin((self.f)(emission))
    }
}

/// Function-backed blocking handler.
pub struct BlockingFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> BlockingFn<F> {
    /// Creates a new function-backed blocking handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> BlockingHandler for BlockingFn<F>
where
    F: Fn(Emission) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, emission: Emission) -> Result<(), HandlerError> {
        (self.f)(emission)
    }
}
