//! A runtime for trees of composable, stateful workflows.
//!
//! Each [`Workflow`] turns props and private state into a rendering. Parents
//! render children, workflows run [`Worker`]s for asynchronous work, and every
//! event (a sink delivery, a worker output, a child output) becomes exactly one
//! [`Action`] applied to exactly one node before the tree renders again.
//!
//! The [`WorkflowRunner`] drives a root workflow: it waits for props, renders,
//! snapshots, publishes the (rendering, snapshot) pair, and then waits for the
//! next change.

mod action;
mod active_staging;
mod behavior;
mod config;
mod context;
mod error;
mod id;
mod node;
mod observer;
mod recording;
mod runner;
mod sink;
mod subtree;
pub mod worker;
mod workers;
mod workflow;

pub use action::Action;
pub use config::RuntimeConfig;
pub use context::RenderContext;
pub use error::{BoxError, RuntimeError, SinkError};
pub use id::{WorkflowId, WorkflowIdentifier};
pub use observer::{
  ChainedObserver, ChannelObserver, NoopObserver, TracingObserver, WorkflowEvent, WorkflowObserver,
};
pub use recording::RenderRecorder;
pub use runner::{RenderingAndSnapshot, WorkflowHandle, WorkflowRunner, launch_workflow};
pub use sink::{EventHandler, Sink};
pub use worker::{Worker, WorkerEvent, WorkerStream};
pub use workflow::Workflow;

pub use canopy_snapshot::{Snapshot, SnapshotError, SnapshotReader, SnapshotWriter};
