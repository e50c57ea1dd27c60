#![allow(dead_code)]

pub mod clients;
pub mod nodes;

pub use clients::*;
pub use nodes::*;

use tutorgraph::app::App;
use tutorgraph::graphs::GraphBuilder;
use tutorgraph::types::NodeKind;

/// Shorthand for a custom node kind.
pub fn kind(name: &str) -> NodeKind {
    NodeKind::Custom(name.into())
}

/// Minimal app: Start -> say -> End, reserved fields only.
pub fn say_app(msg: &'static str) -> App {
    GraphBuilder::new()
        .add_node(kind("say"), SayNode { msg })
        .add_edge(NodeKind::Start, kind("say"))
        .add_edge(kind("say"), NodeKind::End)
        .compile()
        .expect("valid graph")
}
