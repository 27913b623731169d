//! Shared global state.
//!
//! - [`StateStore`] JSON object with a version counter and change notification
//! - [`StateChange`] what a channel receives in `on_state_change`

mod change;
mod store;

pub use change::StateChange;
pub use store::StateStore;
