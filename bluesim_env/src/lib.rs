//! BlueSim Environment Abstraction Layer
//!
//! This crate defines the boundary between the observation engine and the
//! collaborators it drives but does not own:
//! - **Environment**: per-fish kinematic storage and neighbour distances
//! - **Fish**: agent inboxes and the readable algorithm state
//! - **Channel**: positional/probabilistic delivery and its delivered-event log
//! - **Time**: `now()` / `sleep()` for the periodic driver
//!
//! Production code paces ticks with [`TokioContext`]; the simulation harness
//! swaps in a virtual clock so the same driver runs deterministically.
//!
//! # Example
//!
//! ```ignore
//! use bluesim_env::{ClockContext, Environment, Fish, Channel};
//!
//! async fn drive<Ctx: ClockContext>(ctx: &Ctx, period: Duration) {
//!     loop {
//!         let start = ctx.now();
//!         tick();
//!         let elapsed = ctx.now() - start;
//!         if let Some(rest) = period.checked_sub(elapsed) {
//!             ctx.sleep(rest).await;
//!         }
//!     }
//! }
//! ```

mod context;
mod environment;
mod error;
mod event;
mod network;
mod tokio_impl;
mod types;

pub use context::ClockContext;
pub use environment::{Environment, Fish};
pub use error::EnvError;
pub use event::{Event, Opcode, Payload};
pub use network::{Channel, Source};
pub use tokio_impl::TokioContext;
pub use types::{FishId, FishSnapshot, Kinematics};
