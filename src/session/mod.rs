//! Interactive session controller.
//!
//! [`SessionState`] holds everything the user sees and everything queued up
//! for the agent. [`update`] is the single reducer over it; the runtime host
//! feeds it messages one at a time and executes the [`Action`]s it returns.

pub mod commands;
pub mod compact;
pub mod editor;
pub mod keys;
pub mod msg;
pub mod overlay;
pub mod queue;
pub mod retry;
pub mod state;
mod update;

pub use keys::Key;
pub use msg::{Action, RunUpdate, SessionMsg};
pub use overlay::{Overlay, OverlayKind};
pub use state::{
    AssistantBlock, AssistantTurn, ContentEntry, Mode, SessionState, StatusSnapshot,
    ToolCallBlock, ToolStatus,
};
pub use update::update;

/// Presents session state to the user. Called after every reducer step.
pub trait SessionRenderer: Send {
    fn render(&mut self, state: &SessionState);

    /// Final flush before the host exits.
    fn finish(&mut self, _state: &SessionState) {}
}
