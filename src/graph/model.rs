//! Editable authoring graph.
//!
//! The graph model is what an editor mutates: nodes with derived ports and the
//! connections between them. Every mutation tolerates invalid input (missing
//! ids, out-of-range ports) as a no-op, since an interactive editor routinely
//! passes through transient invalid states. Execution never reads this model;
//! it is consumed once by the compiler.

use crate::graph::id::{ConnectionId, NodeId, PortIndex, PortRef};
use crate::graph::port::{Port, PortKind, TypeTag};
use crate::runtime::behavior::{BehaviorRegistry, BehaviorTypeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Editor-space position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A node as seen at authoring time.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub behavior: BehaviorTypeId,
    pub position: Position,
    /// Derived from `behavior` and `data`; recomputed by `invalidate_node`.
    pub ports: Vec<Port>,
    /// Opaque instance data, materialized into the behavior's data type on compile.
    pub data: serde_json::Value,
}

impl NodeDescriptor {
    pub fn port(&self, port: PortIndex) -> Option<&Port> {
        self.ports.get(port.index())
    }
}

/// A directed link, always stored source-like end first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    /// Exit (control) or Output (data) end.
    pub from: PortRef,
    /// Enter (control) or Input (data) end.
    pub to: PortRef,
}

/// Why a connection attempt was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectError {
    #[error("cannot connect a node to itself")]
    SameNode,

    #[error("node {0} does not exist")]
    MissingNode(NodeId),

    #[error("node {node} has no port {port}")]
    PortOutOfRange { node: NodeId, port: PortIndex },

    #[error("{a:?} cannot be connected to {b:?}")]
    KindMismatch { a: PortKind, b: PortKind },

    #[error("declared types differ: {from:?} -> {to:?}")]
    TypeMismatch { from: TypeTag, to: TypeTag },

    #[error("connection already exists")]
    Duplicate,
}

/// Mutable collection of nodes and connections.
pub struct GraphModel {
    behaviors: Arc<BehaviorRegistry>,
    nodes: BTreeMap<NodeId, NodeDescriptor>,
    connections: Vec<Connection>,
    next_node_id: u32,
    next_connection_id: u32,
}

impl GraphModel {
    pub fn new(behaviors: Arc<BehaviorRegistry>) -> Self {
        Self {
            behaviors,
            nodes: BTreeMap::new(),
            connections: Vec::new(),
            next_node_id: 1,
            next_connection_id: 1,
        }
    }

    pub fn behaviors(&self) -> &Arc<BehaviorRegistry> {
        &self.behaviors
    }

    // ── Nodes ──

    /// Add a node with default instance data.
    pub fn add_node(&mut self, behavior: BehaviorTypeId, position: Position) -> NodeId {
        self.add_node_with_data(behavior, position, serde_json::Value::Null)
    }

    /// Add a node with the given instance data blob.
    pub fn add_node_with_data(
        &mut self,
        behavior: BehaviorTypeId,
        position: Position,
        data: serde_json::Value,
    ) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let ports = self.derive_ports(behavior, &data);
        self.nodes.insert(
            id,
            NodeDescriptor {
                id,
                behavior,
                position,
                ports,
                data,
            },
        );

        tracing::debug!("Added node {} ({})", id, behavior);
        id
    }

    /// Remove a node and every connection touching it. Returns `false` if absent.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if self.nodes.remove(&id).is_none() {
            return false;
        }
        let before = self.connections.len();
        self.connections
            .retain(|c| c.from.node != id && c.to.node != id);
        tracing::debug!(
            "Removed node {} and {} connection(s)",
            id,
            before - self.connections.len()
        );
        true
    }

    pub fn set_position(&mut self, id: NodeId, position: Position) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Replace a node's instance data and re-derive its ports.
    ///
    /// Returns the number of connections dropped because they no longer fit.
    pub fn set_instance_data(&mut self, id: NodeId, data: serde_json::Value) -> Option<usize> {
        self.nodes.get_mut(&id)?.data = data;
        self.invalidate_node(id)
    }

    /// Recompute a node's ports after its behavior or shape changed.
    ///
    /// Connections touching the node that no longer validate against the new
    /// port list are dropped. Returns how many were dropped, or `None` if the
    /// node does not exist.
    pub fn invalidate_node(&mut self, id: NodeId) -> Option<usize> {
        let node = self.nodes.get(&id)?;
        let ports = self.derive_ports(node.behavior, &node.data);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.ports = ports;
        }

        let stale: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|c| c.from.node == id || c.to.node == id)
            .filter(|c| self.check(c.from, c.to).is_err())
            .map(|c| c.id)
            .collect();

        for conn_id in &stale {
            self.remove_connection(*conn_id);
        }
        if !stale.is_empty() {
            tracing::debug!(
                "Invalidated node {}: dropped {} stale connection(s)",
                id,
                stale.len()
            );
        }
        Some(stale.len())
    }

    fn derive_ports(&self, behavior: BehaviorTypeId, data: &serde_json::Value) -> Vec<Port> {
        self.behaviors.ports_for(behavior, data).unwrap_or_else(|| {
            tracing::warn!("Unknown behavior type '{}', node has no ports", behavior);
            Vec::new()
        })
    }

    // ── Connections ──

    /// Connect two ports, in either order. Returns `false` if rejected.
    pub fn try_connect(
        &mut self,
        a_node: NodeId,
        a_port: impl Into<PortIndex>,
        b_node: NodeId,
        b_port: impl Into<PortIndex>,
    ) -> bool {
        self.connect(PortRef::new(a_node, a_port), PortRef::new(b_node, b_port))
            .is_ok()
    }

    /// Connect two ports, reporting why a rejected attempt failed.
    ///
    /// The ends are normalized so `from` is the Exit/Output side. When the sink
    /// is an Input, any existing producer for it is replaced.
    pub fn connect(&mut self, a: PortRef, b: PortRef) -> Result<ConnectionId, ConnectError> {
        let a_kind = self.port_kind(a)?;
        let (from, to) = if a_kind.is_source() { (a, b) } else { (b, a) };
        self.check(from, to)?;

        let duplicate = self
            .connections
            .iter()
            .filter(|c| c.from == from)
            .any(|c| c.to == to);
        if duplicate {
            return Err(ConnectError::Duplicate);
        }

        if self.port_kind(to)? == PortKind::Input {
            let before = self.connections.len();
            self.connections.retain(|c| c.to != to);
            if self.connections.len() != before {
                tracing::debug!("Replaced producer of {:?}", to);
            }
        }

        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;
        self.connections.push(Connection { id, from, to });
        tracing::debug!("Connected {:?} -> {:?} as {:?}", from, to, id);
        Ok(id)
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> bool {
        match self.connections.iter().position(|c| c.id == id) {
            Some(idx) => {
                self.connections.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Validate a normalized `from -> to` pair against the current ports.
    fn check(&self, from: PortRef, to: PortRef) -> Result<(), ConnectError> {
        if from.node == to.node {
            return Err(ConnectError::SameNode);
        }
        let from_port = self.port_ref(from)?;
        let to_port = self.port_ref(to)?;

        if !from_port.kind.is_source() || from_port.kind.counterpart() != to_port.kind {
            return Err(ConnectError::KindMismatch {
                a: from_port.kind,
                b: to_port.kind,
            });
        }
        if !from_port.type_compatible(to_port) {
            return Err(ConnectError::TypeMismatch {
                from: from_port.declared_type.clone().unwrap_or_else(|| TypeTag::named("?")),
                to: to_port.declared_type.clone().unwrap_or_else(|| TypeTag::named("?")),
            });
        }
        Ok(())
    }

    fn port_ref(&self, at: PortRef) -> Result<&Port, ConnectError> {
        let node = self
            .nodes
            .get(&at.node)
            .ok_or(ConnectError::MissingNode(at.node))?;
        node.port(at.port).ok_or(ConnectError::PortOutOfRange {
            node: at.node,
            port: at.port,
        })
    }

    fn port_kind(&self, at: PortRef) -> Result<PortKind, ConnectError> {
        self.port_ref(at).map(|p| p.kind)
    }

    // ── Queries ──

    pub fn node(&self, id: NodeId) -> Option<&NodeDescriptor> {
        self.nodes.get(&id)
    }

    /// Nodes in id order, which is also insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn ports(&self, id: NodeId) -> &[Port] {
        self.nodes.get(&id).map(|n| n.ports.as_slice()).unwrap_or(&[])
    }

    pub fn port(&self, at: PortRef) -> Option<&Port> {
        self.port_ref(at).ok()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Connections leaving an Exit/Output port.
    pub fn connections_from(&self, at: PortRef) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.from == at)
    }

    /// Connections arriving at an Enter/Input port.
    pub fn connections_to(&self, at: PortRef) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.to == at)
    }

    /// Number of connections touching a port, from either end.
    pub fn connection_count(&self, at: PortRef) -> usize {
        self.connections
            .iter()
            .filter(|c| c.from == at || c.to == at)
            .count()
    }

    /// Every port flagged as part of the graph boundary.
    pub fn external_ports(&self) -> Vec<(PortRef, &Port)> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.ports
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.is_external)
                    .map(move |(i, p)| (PortRef::new(node.id, i as u32), p))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::behavior::Behavior;
    use crate::runtime::nodes::{self, ConstantInt, PrintText, Sequence, StartEvent};
    use proptest::prelude::*;
    use serde_json::json;

    fn model() -> GraphModel {
        GraphModel::new(Arc::new(nodes::builtin_registry()))
    }

    fn add(model: &mut GraphModel, behavior: BehaviorTypeId) -> NodeId {
        model.add_node(behavior, Position::default())
    }

    #[test]
    fn test_add_node_derives_ports() {
        let mut g = model();
        let seq = g.add_node_with_data(
            Sequence::TYPE_ID,
            Position::new(10.0, 20.0),
            json!({ "arity": 3 }),
        );
        let node = g.node(seq).unwrap();
        assert_eq!(node.ports.len(), 4);
        assert_eq!(node.ports[0].kind, PortKind::Enter);
        assert_eq!(node.position, Position::new(10.0, 20.0));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut g = model();
        let a = add(&mut g, ConstantInt::TYPE_ID);
        assert!(g.remove_node(a));
        let b = add(&mut g, ConstantInt::TYPE_ID);
        assert_ne!(a, b);
    }

    #[test]
    fn test_connect_normalizes_direction() {
        let mut g = model();
        let start = add(&mut g, StartEvent::TYPE_ID);
        let print = add(&mut g, PrintText::TYPE_ID);

        // Caller passes the sink end first.
        let id = g.connect(PortRef::new(print, 0), PortRef::new(start, 0)).unwrap();
        let conn = g.connection(id).unwrap();
        assert_eq!(conn.from, PortRef::new(start, 0));
        assert_eq!(conn.to, PortRef::new(print, 0));
    }

    #[test]
    fn test_connect_rejections() {
        let mut g = model();
        let start = add(&mut g, StartEvent::TYPE_ID);
        let print = add(&mut g, PrintText::TYPE_ID);
        let constant = add(&mut g, ConstantInt::TYPE_ID);

        assert_eq!(
            g.connect(PortRef::new(start, 0), PortRef::new(start, 0)),
            Err(ConnectError::SameNode)
        );
        assert_eq!(
            g.connect(PortRef::new(start, 9), PortRef::new(print, 0)),
            Err(ConnectError::PortOutOfRange {
                node: start,
                port: PortIndex(9)
            })
        );
        assert_eq!(
            g.connect(PortRef::new(NodeId(999), 0), PortRef::new(print, 0)),
            Err(ConnectError::MissingNode(NodeId(999)))
        );
        // Exit -> Input is a kind mismatch.
        assert!(matches!(
            g.connect(PortRef::new(start, 0), PortRef::new(print, 1)),
            Err(ConnectError::KindMismatch { .. })
        ));
        // i64 output into a String input.
        assert!(matches!(
            g.connect(PortRef::new(constant, 0), PortRef::new(print, 1)),
            Err(ConnectError::TypeMismatch { .. })
        ));
        assert!(g.connections().is_empty());
    }

    #[test]
    fn test_duplicate_connection_rejected() {
        let mut g = model();
        let start = add(&mut g, StartEvent::TYPE_ID);
        let print = add(&mut g, PrintText::TYPE_ID);

        assert!(g.try_connect(start, 0, print, 0));
        assert!(!g.try_connect(start, 0, print, 0));
        assert_eq!(g.connections().len(), 1);
    }

    #[test]
    fn test_enter_allows_fan_in() {
        let mut g = model();
        let a = add(&mut g, StartEvent::TYPE_ID);
        let b = add(&mut g, StartEvent::TYPE_ID);
        let print = add(&mut g, PrintText::TYPE_ID);

        assert!(g.try_connect(a, 0, print, 0));
        assert!(g.try_connect(b, 0, print, 0));
        assert_eq!(g.connection_count(PortRef::new(print, 0)), 2);
    }

    #[test]
    fn test_second_producer_replaces_first() {
        let mut g = model();
        let a = add(&mut g, ConstantInt::TYPE_ID);
        let b = add(&mut g, ConstantInt::TYPE_ID);
        let sum = add(&mut g, nodes::AddInt::TYPE_ID);

        assert!(g.try_connect(a, 0, sum, 0));
        assert!(g.try_connect(b, 0, sum, 0));

        let producers: Vec<_> = g.connections_to(PortRef::new(sum, 0)).collect();
        assert_eq!(producers.len(), 1);
        assert_eq!(producers[0].from.node, b);
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut g = model();
        let start = add(&mut g, StartEvent::TYPE_ID);
        let print = add(&mut g, PrintText::TYPE_ID);
        let other = add(&mut g, PrintText::TYPE_ID);
        assert!(g.try_connect(start, 0, print, 0));
        assert!(g.try_connect(print, 2, other, 0));

        assert!(g.remove_node(print));
        assert!(g.connections().is_empty());
        assert!(!g.remove_node(print));
    }

    #[test]
    fn test_invalidate_drops_out_of_range_connections() {
        let mut g = model();
        let seq = g.add_node_with_data(Sequence::TYPE_ID, Position::default(), json!({ "arity": 3 }));
        let p1 = add(&mut g, PrintText::TYPE_ID);
        let p2 = add(&mut g, PrintText::TYPE_ID);
        assert!(g.try_connect(seq, 1, p1, 0));
        assert!(g.try_connect(seq, 3, p2, 0));

        let dropped = g.set_instance_data(seq, json!({ "arity": 1 })).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(g.ports(seq).len(), 2);
        assert_eq!(g.connections().len(), 1);
        assert_eq!(g.connections()[0].to.node, p1);
    }

    /// Port 0 changes shape with `mode`: 0 = Enter, 1 = Input<i64>, 2 = Input<String>.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    struct Shape {
        mode: u8,
    }

    impl Behavior for Shape {
        const TYPE_ID: BehaviorTypeId = BehaviorTypeId("test.shape");

        fn ports(&self) -> Vec<Port> {
            match self.mode {
                0 => vec![Port::enter("in")],
                1 => vec![Port::input::<i64>("value")],
                _ => vec![Port::input::<String>("value")],
            }
        }
    }

    fn model_with_shape() -> GraphModel {
        let mut registry = nodes::builtin_registry();
        registry.register::<Shape>();
        GraphModel::new(Arc::new(registry))
    }

    #[test]
    fn test_invalidate_drops_kind_and_type_changes() {
        let mut g = model_with_shape();
        let start = add(&mut g, StartEvent::TYPE_ID);
        let constant = add(&mut g, ConstantInt::TYPE_ID);
        let shape = add(&mut g, Shape::TYPE_ID);
        assert!(g.try_connect(start, 0, shape, 0));

        // Enter becomes Input: the Exit link no longer pairs.
        assert_eq!(g.set_instance_data(shape, json!({ "mode": 1 })), Some(1));
        assert_eq!(g.ports(shape)[0].kind, PortKind::Input);
        assert!(g.connections().is_empty());

        assert!(g.try_connect(constant, 0, shape, 0));
        assert_eq!(g.connections().len(), 1);

        // Same kind, declared type changes from i64 to String.
        assert_eq!(g.set_instance_data(shape, json!({ "mode": 2 })), Some(1));
        assert!(g.connections().is_empty());
        assert_eq!(g.connection_count(PortRef::new(shape, 0)), 0);
    }

    #[test]
    fn test_invalidate_keeps_valid_connections() {
        let mut g = model_with_shape();
        let constant = add(&mut g, ConstantInt::TYPE_ID);
        let shape = g.add_node_with_data(Shape::TYPE_ID, Position::default(), json!({ "mode": 1 }));
        assert!(g.try_connect(constant, 0, shape, 0));

        assert_eq!(g.invalidate_node(shape), Some(0));
        assert_eq!(g.connections().len(), 1);
    }

    #[test]
    fn test_invalid_input_is_noop() {
        let mut g = model();
        assert!(!g.remove_connection(ConnectionId(42)));
        assert!(g.invalidate_node(NodeId(42)).is_none());
        assert!(!g.set_position(NodeId(42), Position::default()));
        assert!(g.ports(NodeId(42)).is_empty());
    }

    #[test]
    fn test_external_ports_enumerated() {
        let mut g = model();
        let start = add(&mut g, StartEvent::TYPE_ID);
        add(&mut g, PrintText::TYPE_ID);
        let external = g.external_ports();
        assert_eq!(external.len(), 1);
        assert_eq!(external[0].0, PortRef::new(start, 0));
    }

    proptest! {
        #[test]
        fn prop_inputs_have_at_most_one_producer(
            ops in prop::collection::vec((0usize..4, 0usize..4), 1..40)
        ) {
            let mut g = model();
            let constants: Vec<_> = (0..4).map(|_| add(&mut g, ConstantInt::TYPE_ID)).collect();
            let adders: Vec<_> = (0..4).map(|_| add(&mut g, nodes::AddInt::TYPE_ID)).collect();

            for (producer, consumer) in ops {
                let input = (producer + consumer) as u32 % 2;
                g.try_connect(constants[producer], 0, adders[consumer], input);

                // Property: every Input has at most one incoming connection
                for &sum in &adders {
                    for port in 0..2u32 {
                        let count = g.connections_to(PortRef::new(sum, port)).count();
                        prop_assert!(count <= 1, "Input {:?}:{} has {} producers", sum, port, count);
                    }
                }
            }
        }
    }
}
