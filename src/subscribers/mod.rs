//! # Runtime event subscribers.
//!
//! ```text
//! handler tasks / loopers ── publish(Event) ──► Bus ──► Runtime listener ──► SubscriberSet
//!                                                                               │
//!                                                                    ┌──────────┼─────────┐
//!                                                                    ▼          ▼         ▼
//!                                                                LogWriter   Metrics   Custom
//! ```
//!
//! - [`Subscribe`]: the extension trait.
//! - [`SubscriberSet`]: per-subscriber queues and workers.
//! - [`LogWriter`]: built-in subscriber that renders events through `tracing`.

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
