//! # overseer
//!
//! **Overseer** is a dynamic supervisor for fleets of remote compute
//! workers. It spawns workers on provisioned hosts (local processes or
//! freshly provisioned cloud instances), monitors liveness, ships a release
//! artifact to each worker, pairs with the worker's control endpoint,
//! relays telemetry to embedding code, and recycles workers that fail to
//! connect or crash within configured deadlines.
//!
//! It is a control-plane library: your code embeds an [`Overseer`]
//! instance, implements the [`Handler`] callbacks, and plugs in an
//! [`Adapter`] for its infrastructure.
//!
//! ## Features
//!
//! | Area             | Description                                                      | Key types / traits                  |
//! |------------------|------------------------------------------------------------------|-------------------------------------|
//! | **Supervision**  | Bounded pool of workers with connect/pair deadlines & recycling. | [`Overseer`], [`Config`]            |
//! | **Callbacks**    | React to worker lifecycle and telemetry, thread user state.      | [`Handler`], [`Flow`]               |
//! | **Adapters**     | Pluggable provisioning: local processes, EC2 instances.          | [`Adapter`], [`LocalAdapter`]       |
//! | **Releases**     | Ship `file://` / `https://` / `s3://` artifacts to workers.      | [`Release`], [`ReleaseSource`]      |
//! | **Observability**| Typed lifecycle events with non-blocking fan-out.                | [`Event`], [`Subscribe`]            |
//! | **Errors**       | Typed errors with stable labels for logs and metrics.            | [`OverseerError`], [`AdapterError`] |
//!
//! ## Optional features
//! - `logging` *(default)*: built-in [`LogWriter`] subscriber.
//! - `ec2`: EC2 provisioning adapter (AWS SDK + SSH control channel).
//! - `s3`: `s3://` release sources.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use overseer::{
//!     Config, Event, Flow, Handler, LocalAdapter, LocalOptions, Overseer, Release,
//!     ReleaseSource, Telemetry,
//! };
//!
//! struct Fleet;
//!
//! #[async_trait]
//! impl Handler for Fleet {
//!     async fn handle_connected(&mut self, name: &str) -> Flow {
//!         println!("worker {name} connected");
//!         Flow::Noreply
//!     }
//!     async fn handle_disconnected(&mut self, name: &str) -> Flow {
//!         println!("worker {name} disconnected");
//!         Flow::Noreply
//!     }
//!     async fn handle_telemetry(&mut self, t: &Telemetry) -> Flow {
//!         println!("{}: {}", t.name, t.payload);
//!         Flow::Noreply
//!     }
//!     async fn handle_terminated(&mut self, name: &str) -> Flow {
//!         println!("worker {name} gone");
//!         Flow::Noreply
//!     }
//!     async fn handle_event(&mut self, _event: &Event) -> Flow {
//!         Flow::Noreply
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = Arc::new(LocalAdapter::new(LocalOptions::new(
//!         "w",
//!         vec!["./fleet-worker".to_string()],
//!     )));
//!     let release = Release::new(ReleaseSource::parse("file:///opt/fleet/release.tar.gz")?)
//!         .with_entry_point("fleet_worker", "start");
//!
//!     let overseer = Overseer::start(Fleet, adapter, release, Config::default())?;
//!     let labor = overseer.start_child().await?;
//!     println!("spawned: {:?}", labor.map(|l| l.name));
//!
//!     overseer.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod adapters;
mod config;
mod core;
mod error;
mod events;
mod handler;
mod labor;
mod pair;
mod policies;
mod release;
mod strategy;
mod subscribers;
mod telemetry;
mod timer;

// ---- Public re-exports ----

pub use adapters::{Adapter, LocalAdapter, LocalOptions};
pub use config::Config;
pub use core::{Overseer, OverseerBuilder, Snapshot};
pub use error::{AdapterError, LoadError, OverseerError};
pub use events::{Bus, Event, EventKind};
pub use handler::{CallFlow, Flow, Handler};
pub use labor::{Labor, PairPid, Phase};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use release::{EntryPoint, Release, ReleaseSource};
pub use strategy::Strategy;
pub use subscribers::{Subscribe, SubscriberSet};
pub use telemetry::Telemetry;

// Optional: EC2 provisioning adapter.
// Enable with: `--features ec2`
#[cfg(feature = "ec2")]
pub use adapters::{Ec2Adapter, Ec2Options};

// Optional: built-in tracing-backed event logger.
// Enabled by default via the `logging` feature.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
