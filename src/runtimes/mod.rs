//! Runtime layer: turn execution, checkpoints, and persistence.
//!
//! This module turns a compiled workflow into a running conversation. Each
//! request/response cycle is one *turn*: the runner restores the thread's
//! checkpoint, merges the incoming message, walks the graph, and persists
//! exactly one new checkpoint at the end. The persistence backend is
//! pluggable behind the [`Checkpointer`] trait.
//!
//! # Architecture
//!
//! - **[`TurnRunner`]** - Executes turns, serializing them per thread
//! - **[`Checkpointer`]** - Trait for pluggable checkpoint storage
//! - **[`TurnReport`]** - What one finished turn produced
//! - **Persistence models** - Serde-friendly types for stored state
//!
//! # Persistence backends
//!
//! - **[`InMemoryCheckpointer`]** - Volatile storage for testing and development
//! - **[`SQLiteCheckpointer`]** - Durable SQLite-backed persistence
//!
//! # Usage example
//!
//! ```rust,no_run
//! use tutorgraph::runtimes::{CheckpointerType, TurnRequest, TurnRunner};
//! # use tutorgraph::app::App;
//! # use tutorgraph::clients::Resources;
//! # async fn example(app: App, resources: Resources) -> Result<(), Box<dyn std::error::Error>> {
//!
//! let runner = TurnRunner::with_checkpointer_type(app, resources, CheckpointerType::SQLite).await?;
//!
//! let report = runner
//!     .run_to_completion(TurnRequest::new("thread-1", "user-1", "Explain recursion"))
//!     .await?;
//! println!("turn finished at step {}", report.step);
//! # Ok(())
//! # }
//! ```

pub mod checkpointer;
#[cfg(feature = "sqlite")]
pub mod checkpointer_sqlite;
pub mod execution;
pub mod persistence;
pub mod runner;
pub mod runtime_config;

pub use checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, InMemoryCheckpointer,
};
#[cfg(feature = "sqlite")]
pub use checkpointer_sqlite::SQLiteCheckpointer;
pub use execution::TurnReport;
pub use persistence::{PersistedCheckpoint, PersistedFields, PersistedMessages, PersistedState};
pub use runner::{RunnerError, TurnHandle, TurnRequest, TurnRunner};
pub use runtime_config::RunConfig;
