//! nodegraph-rs demo runner
//!
//! Builds a small sample graph, compiles it and drives it through the full
//! engine lifecycle. Pass a path to an `engine.toml` to override the default
//! configuration location.

use anyhow::Context as _;
use nodegraph_rs::config::{self, EngineConfig};
use nodegraph_rs::graph::{GraphModel, NodeId, PortRef, Position};
use nodegraph_rs::runtime::nodes::{
    self, Branch, ConstantInt, Counter, GreaterThan, IntToText, PrintText, Sequence, StartEvent,
};
use nodegraph_rs::runtime::{Behavior, GraphCompiler, RuntimeEngine, TracingHost};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(config::default_path);
    let config = match &config_path {
        Some(path) => EngineConfig::load_or_default(path),
        None => EngineConfig::default(),
    };

    let _log_guard = nodegraph_rs::logging::init(&config.logging);
    tracing::info!("Starting nodegraph-rs demo (config: {:?})", config_path);

    let (graph, counter) = build_sample_graph().context("Failed to build sample graph")?;
    let program = GraphCompiler::compile(&graph, &config.pools);
    tracing::info!(
        "Program: {} node(s), {} pool(s), {} link(s)",
        program.order().len(),
        program.pools.pool_count(),
        program.stats.links
    );

    let mut engine = RuntimeEngine::new(program, Box::new(TracingHost), config.runtime.clone());
    engine.initialize()?;
    engine.enable()?;
    engine.start()?;

    if let Some(address) = engine.address_of(counter) {
        let count = engine
            .pools()
            .with_data(address, |c: &Counter| c.count.get())
            .unwrap_or_default();
        tracing::info!("Counter finished at {}", count);
    }

    let table = engine.program().links.to_json()?;
    tracing::debug!("Compiled link table:\n{}", table);

    engine.deinitialize()?;
    tracing::info!("Done");
    Ok(())
}

/// start → sequence
///   then 0 → counter.increment → counter.then → print("count: " + text(counter))
///   then 1 → branch(counter > 0) → print("positive") / print("not positive")
fn build_sample_graph() -> anyhow::Result<(GraphModel, NodeId)> {
    let registry = nodes::builtin_registry();
    let mut names: Vec<_> = registry.ids().map(|id| id.to_string()).collect();
    names.sort();
    tracing::debug!("Registered behaviors: {}", names.join(", "));

    let mut g = GraphModel::new(Arc::new(registry));
    let at = |x: f32, y: f32| Position::new(x, y);

    let start = g.add_node(StartEvent::TYPE_ID, at(0.0, 0.0));
    let sequence = g.add_node_with_data(Sequence::TYPE_ID, at(150.0, 0.0), json!({ "arity": 2 }));
    let counter = g.add_node_with_data(Counter::TYPE_ID, at(300.0, -100.0), json!({ "step": 3 }));
    let to_text = g.add_node(IntToText::TYPE_ID, at(450.0, -50.0));
    let print_count = g.add_node_with_data(PrintText::TYPE_ID, at(600.0, -100.0), json!({ "prefix": "count: " }));
    let zero = g.add_node(ConstantInt::TYPE_ID, at(300.0, 150.0));
    let compare = g.add_node(GreaterThan::TYPE_ID, at(450.0, 100.0));
    let branch = g.add_node(Branch::TYPE_ID, at(600.0, 50.0));
    let positive = g.add_node_with_data(PrintText::TYPE_ID, at(750.0, 0.0), json!({ "prefix": "positive" }));
    let negative = g.add_node_with_data(PrintText::TYPE_ID, at(750.0, 100.0), json!({ "prefix": "not positive" }));

    let links: [(NodeId, u32, NodeId, u32); 11] = [
        (start, 0, sequence, 0),
        (sequence, 1, counter, 0),
        (counter, 1, print_count, 0),
        (counter, 2, to_text, 0),
        (to_text, 1, print_count, 1),
        (sequence, 2, branch, 0),
        (counter, 2, compare, 0),
        (zero, 0, compare, 1),
        (compare, 2, branch, 1),
        (branch, 2, positive, 0),
        (branch, 3, negative, 0),
    ];
    for (from, from_port, to, to_port) in links {
        g.connect(PortRef::new(from, from_port), PortRef::new(to, to_port))
            .with_context(|| format!("Connecting {}:{} -> {}:{}", from, from_port, to, to_port))?;
    }

    Ok((g, counter))
}
