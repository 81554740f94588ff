//! Model system: the per-instance record state and the model trait family
//!
//! - `record`: the dynamic attribute bag plus persistence bookkeeping
//! - `traits`: the `Model` / `ModelHooks` traits and hook routing

pub mod record;
pub mod traits;

pub use record::{Operation, Record};
pub use traits::{Model, ModelHooks};

pub(crate) use traits::{invoke_cancellable, invoke_notification};
