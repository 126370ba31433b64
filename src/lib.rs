//! Pilot: the interactive session controller of a terminal coding agent.
//!
//! The crate owns conversation state and mediates between the person at the
//! keyboard, a streaming agent, and a pool of background tasks. All state
//! changes go through one reducer ([`session::update`]) driven by the
//! [`runtime::SessionHost`] actor loop.
//!
//! # Quick start
//!
//! ```no_run
//! use pilot::agent::scripted::ScriptedRunner;
//! use pilot::config::Config;
//! use pilot::render::PlainRenderer;
//! use pilot::runtime::SessionHost;
//! use pilot::session::{SessionMsg, SessionState};
//! use pilot::tasks::BackgroundRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let registry = Arc::new(BackgroundRegistry::new());
//! let state = SessionState::new(&Config::default(), Arc::clone(&registry));
//! let host = SessionHost::new(Arc::new(ScriptedRunner::new()), registry).exit_when_idle(true);
//! host.handle().send(SessionMsg::Submit("hello".into())).unwrap();
//! let mut renderer = PlainRenderer::new(std::io::stdout(), false);
//! host.run(state, &mut renderer).await;
//! # }
//! ```

pub mod agent;
pub mod build_info;
pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod permission;
pub mod render;
pub mod runtime;
pub mod session;
pub mod tasks;
pub mod terminal;
pub mod tokens;
pub mod types;
