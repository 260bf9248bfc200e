//! Test harnesses for canopy workflows.
//!
//! - [`WorkflowTester`] runs a workflow through the real runner.
//! - [`RenderTester`] runs one render pass with stubbed children and workers.
//! - [`WorkerTester`] runs a single worker and inspects its stream.
//!
//! ```ignore
//! let mut tester = WorkflowTester::start(Counter, 0);
//! let rendering = tester.await_next_rendering().await?;
//! rendering.sink.send(increment(1))?;
//! assert_eq!(tester.await_next_rendering().await?.count, 1);
//! tester.cancel().await?;
//! ```

use std::time::Duration;

mod error;
mod render;
mod worker;
mod workflow;

pub use error::TesterError;
pub use render::{RenderTestResult, RenderTester};
pub use worker::WorkerTester;
pub use workflow::WorkflowTester;

/// How long a tester waits for anything before failing.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
