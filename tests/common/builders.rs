//! Test data builders for creating test graphs

use nodegraph_rs::graph::{GraphModel, NodeId, PortRef, Position};
use nodegraph_rs::runtime::nodes;
use nodegraph_rs::runtime::{Behavior, BehaviorRegistry};
use std::sync::Arc;

/// Builder for graphs, laying nodes out left to right
pub struct GraphBuilder {
    graph: GraphModel,
    next_x: f32,
}

impl GraphBuilder {
    /// Builder over the built-in behaviors
    pub fn new() -> Self {
        Self::with_registry(nodes::builtin_registry())
    }

    pub fn with_registry(registry: BehaviorRegistry) -> Self {
        Self {
            graph: GraphModel::new(Arc::new(registry)),
            next_x: 0.0,
        }
    }

    /// Add a node of behavior `B` with default data
    pub fn node<B: Behavior>(&mut self) -> NodeId {
        self.node_with::<B>(serde_json::Value::Null)
    }

    /// Add a node of behavior `B` with the given instance data
    pub fn node_with<B: Behavior>(&mut self, data: serde_json::Value) -> NodeId {
        let position = Position::new(self.next_x, 0.0);
        self.next_x += 100.0;
        self.graph.add_node_with_data(B::TYPE_ID, position, data)
    }

    /// Connect two ports, panicking if the graph rejects it
    pub fn connect(&mut self, from: NodeId, from_port: u32, to: NodeId, to_port: u32) -> &mut Self {
        if let Err(e) = self
            .graph
            .connect(PortRef::new(from, from_port), PortRef::new(to, to_port))
        {
            panic!("connect {:?}:{} -> {:?}:{} failed: {}", from, from_port, to, to_port, e);
        }
        self
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut GraphModel {
        &mut self.graph
    }

    pub fn build(self) -> GraphModel {
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodegraph_rs::runtime::nodes::{PrintText, StartEvent};

    #[test]
    fn test_graph_builder() {
        let mut builder = GraphBuilder::new();
        let start = builder.node::<StartEvent>();
        let print = builder.node::<PrintText>();
        builder.connect(start, 0, print, 0);

        let graph = builder.build();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.connections().len(), 1);
        assert_ne!(
            graph.node(start).unwrap().position,
            graph.node(print).unwrap().position
        );
    }
}
