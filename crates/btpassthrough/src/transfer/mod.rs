//! Guest request handling
//!
//! This module decides, for every guest request, whether the physical
//! adapter sees it, and turns adapter completions back into guest replies.

pub mod fake_reply;
pub mod manager;
pub mod retry;
pub mod routing;
pub mod state;


pub use fake_reply::FakeReply;
pub use manager::{Dispatch, TransferManager};
pub use retry::{wait_for_command_complete, RetryPolicy};
pub use routing::{route_control, ControlRoute};
pub use state::SessionState;
