//! The tutoring domain: nodes, prompts, and the two workflow shapes.
//!
//! Everything engine-agnostic about *tutoring* lives here. The engine
//! modules know nothing about goals or mastery; this module assembles
//! their primitives into the learning pipeline and the Feynman workflow.
//!
//! # Usage example
//!
//! ```rust,no_run
//! use tutorgraph::runtimes::{TurnRequest, TurnRunner};
//! use tutorgraph::tutor::learning_graph;
//! # use tutorgraph::clients::Resources;
//! # async fn example(resources: Resources) -> Result<(), Box<dyn std::error::Error>> {
//! let app = learning_graph()?;
//! let runner = TurnRunner::new(app, resources);
//! let report = runner
//!     .run_to_completion(TurnRequest::new("thread-1", "user-1", "Explain recursion"))
//!     .await?;
//! println!("{:?}", report.outcome);
//! # Ok(())
//! # }
//! ```

pub mod nodes;
pub mod outputs;
pub mod prompts;
pub mod workflows;

pub use outputs::{ContextAssessment, Evaluation, GoalList, QueryList, TutorReply};
pub use workflows::{
    feynman_builder, feynman_graph, learning_builder, learning_graph, tutor_schema,
};
