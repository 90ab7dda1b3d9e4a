//! Supervised background loopers keyed by label.
//!
//! - [`LooperManager`]: label → looper registry (`add` / `remove` / `get` / `list`)
//! - [`LooperHandle`]: cloneable view of one looper (state, wait)
//! - [`Admission`]: what happens when a label is re-added

mod admission;
mod handle;
mod manager;

pub use admission::Admission;
pub use handle::{LooperHandle, LooperState};
pub use manager::LooperManager;
