//! BlueSim observation harness
//!
//! This crate runs the swarm observer against a simulated fish swarm: it
//! ticks a fixed population, delivers scheduled instructions, intercepts
//! every message the channel delivers and records what the swarm did.
//!
//! # Core Principle: The Observer Sees Everything
//!
//! The observer never takes part in the algorithms it scores:
//! - **Instructions**: scheduled through a handle, delivered on their due tick
//! - **Traffic**: read from the channel's delivered log after the fact
//! - **State**: sampled from the environment and the fish once per tick
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ Observer (instruction queue + trackers + recorder)   │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │ deliver                ▲ intercept                  │
//! │  ┌────▼────┐              ┌────┴─────┐                      │
//! │  │  Fish   │─────────────►│ Channel  │────► Fish ...        │
//! │  │   #0    │   transmit   │ (range,  │                      │
//! │  └─────────┘              │  loss)   │                      │
//! │       │                   └──────────┘                      │
//! │  ┌────▼──────────────────────────────┐                      │
//! │  │   Environment + Dynamics          │                      │
//! │  │   (ground-truth kinematics)       │                      │
//! │  └───────────────────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use bluesim_sim::{SimConfig, SimWorld};
//! use bluesim_sim::scenarios::ScenarioId;
//!
//! let mut world = SimWorld::new(SimConfig::default())?;
//! ScenarioId::InfoSpread.schedule(&world.handle(), 7, 60)?;
//! world.run(60)?;
//! println!("{}", world.finish().study());
//! ```

mod agent;
mod clock;
mod context;
mod environment;
mod exporter;
mod network;
mod observer;
mod runner;
pub mod scenarios;
mod world;

pub use agent::{FishConfig, SimFish};
pub use clock::{ClockConfig, ClockLoop};
pub use context::VirtualContext;
pub use environment::SimEnvironment;
pub use exporter::SimExport;
pub use network::{ChannelConfig, ChannelStats, SimChannel};
pub use observer::{Observer, ObserverConfig, ObserverHandle};
pub use runner::{RunMode, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimFishChannel, SimObserver, SimWorld, Swarm};
