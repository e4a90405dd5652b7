//! Framework layer - event dispatch and execution.
//!
//! - [`handler`]: the [`EventHandler`] trait and closure adapters
//! - [`bus`]: the per-instance [`EventBus`] implementing `on` / `emit`
//! - [`scheduler`]: the cooperative [`Scheduler`] every instance runs on
//! - [`hub`]: the [`BroadcastHub`] carrying broadcasts between instances

pub mod bus;
pub mod handler;
pub mod hub;
pub mod scheduler;

pub use bus::{DispatchReport, EventBus};
pub use handler::{BoxedHandler, EventHandler, HandlerOutput};
pub use hub::{BroadcastHub, Envelope};
pub use scheduler::{Scheduler, SchedulerHandle};
