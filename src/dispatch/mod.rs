//! Signal dispatch: names, payloads, handlers, the dispatch table and the dispatcher.
//!
//! - [`Signal`]: immutable signal name
//! - [`Payload`]: opaque shared arguments of one emission
//! - [`Handler`]: async or blocking callable bound to one signal
//! - [`DispatchTable`]: signal → ordered handlers (copy-on-write)
//! - [`Dispatcher`]: `register` / `emit`, owns in-flight handler tasks

mod alive;
mod dispatcher;
mod handler;
mod payload;
mod signal;
mod table;

pub use dispatcher::Dispatcher;
pub use handler::{
    AsyncHandler, BlockingFn, BlockingHandler, BoxHandlerFuture, Emission, Handler, HandlerFn,
};
pub use payload::Payload;
pub use signal::Signal;
pub use table::DispatchTable;
