use crate::error::{EngineError, Result};
use crate::graph::{GraphModel, NodeDescriptor, NodeId, PortIndex, PortKind, PortRef};
use crate::storage::{
    LinkEntry, LinkTable, LinkTableBuilder, LinkTableError, PackedAddress, PoolConfig, PoolRegistry,
};
use std::collections::HashMap;
use std::convert::Infallible;

/// Runtime topology produced by one compile.
///
/// Independent of the `GraphModel` it came from: the link table, the node
/// instances and the compiled node order are all it needs to run.
pub struct RuntimeProgram {
    pub links: LinkTable,
    pub pools: PoolRegistry,
    /// Authoring id → runtime address, for hosts that drive nodes by id.
    pub addresses: HashMap<NodeId, PackedAddress>,
    pub stats: CompileStats,
}

impl RuntimeProgram {
    /// Node addresses in compiled order.
    pub fn order(&self) -> &[PackedAddress] {
        self.links.nodes()
    }

    pub fn address_of(&self, node: NodeId) -> Option<PackedAddress> {
        self.addresses.get(&node).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.order().is_empty()
    }
}

/// Statistics about one compile
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    /// Nodes in the graph
    pub total_nodes: usize,

    /// Nodes that received a runtime instance
    pub materialized_nodes: usize,

    /// Nodes skipped because their behavior is unknown
    pub skipped_nodes: usize,

    /// Port headers written to the link table
    pub link_headers: usize,

    /// Link entries written to the link table
    pub links: usize,

    /// Connections omitted because an endpoint could not be resolved
    pub dropped_connections: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

/// Links of one port, ready to be written.
struct PortLinks {
    port: PortIndex,
    kind: PortKind,
    targets: Vec<LinkEntry>,
}

/// Compiles a graph model into a runtime program
pub struct GraphCompiler;

impl GraphCompiler {
    /// Compile a graph model into a runtime program.
    ///
    /// Every connected port gets a header listing the far ends of its
    /// connections, in ascending port order. The runtime only dispatches from
    /// Exit ports (to Enter targets) and Input ports (to Output producers).
    ///
    /// Never fails. Nodes with unknown behaviors and connections with dangling
    /// endpoints are skipped with a warning. A link table that cannot be built
    /// asserts in debug builds and degrades to a table with no links.
    pub fn compile(graph: &GraphModel, config: &PoolConfig) -> RuntimeProgram {
        let result = Self::build(graph, config, |e, order| {
            Self::report(&e);
            Ok::<_, Infallible>(Self::nodes_only(order))
        });
        match result {
            Ok(program) => program,
            Err(never) => match never {},
        }
    }

    /// Like [`compile`](Self::compile), but a link table that cannot be built
    /// is returned as an error instead of degrading.
    pub fn try_compile(graph: &GraphModel, config: &PoolConfig) -> Result<RuntimeProgram> {
        Self::build(graph, config, |e, _| Err(EngineError::from(e)))
    }

    fn build<E>(
        graph: &GraphModel,
        config: &PoolConfig,
        recover: impl FnOnce(LinkTableError, &[(NodeId, PackedAddress)]) -> std::result::Result<LinkTable, E>,
    ) -> std::result::Result<RuntimeProgram, E> {
        let start_time = std::time::Instant::now();

        let mut stats = CompileStats {
            total_nodes: graph.node_count(),
            ..CompileStats::default()
        };
        let mut pools = PoolRegistry::new(graph.behaviors().clone(), config.clone());

        // Materialize every node, fixing the runtime order
        let mut addresses: HashMap<NodeId, PackedAddress> = HashMap::new();
        let mut order: Vec<(NodeId, PackedAddress)> = Vec::with_capacity(graph.node_count());
        for node in graph.nodes() {
            match Self::materialize(&mut pools, &mut addresses, node) {
                Some(address) => order.push((node.id, address)),
                None => stats.skipped_nodes += 1,
            }
        }
        stats.materialized_nodes = order.len();

        // Collect links per node, ports ascending
        let mut plan: Vec<(PackedAddress, Vec<PortLinks>)> = Vec::with_capacity(order.len());
        for &(id, address) in &order {
            let ports = Self::collect_links(graph, &addresses, id, &mut stats);
            if !ports.is_empty() {
                plan.push((address, ports));
            }
        }

        let links = match Self::build_table(&order, &plan, &mut stats) {
            Ok(table) => table,
            Err(e) => recover(e, &order)?,
        };

        stats.compile_time_us = start_time.elapsed().as_micros() as u64;
        tracing::info!(
            "Compiled graph: {} node(s), {} skipped, {} link(s) in {} header(s), {} dropped, {}us",
            stats.materialized_nodes,
            stats.skipped_nodes,
            stats.links,
            stats.link_headers,
            stats.dropped_connections,
            stats.compile_time_us
        );

        Ok(RuntimeProgram {
            links,
            pools,
            addresses,
            stats,
        })
    }

    /// Runtime address for `node`, allocating it on first visit.
    fn materialize(
        pools: &mut PoolRegistry,
        addresses: &mut HashMap<NodeId, PackedAddress>,
        node: &NodeDescriptor,
    ) -> Option<PackedAddress> {
        if let Some(&address) = addresses.get(&node.id) {
            return Some(address);
        }
        let Some(pool) = pools.register(node.behavior) else {
            tracing::warn!("Skipping node {}: unknown behavior '{}'", node.id, node.behavior);
            return None;
        };
        let address = pools.materialize(pool, &node.data)?;
        addresses.insert(node.id, address);
        Some(address)
    }

    fn collect_links(
        graph: &GraphModel,
        addresses: &HashMap<NodeId, PackedAddress>,
        id: NodeId,
        stats: &mut CompileStats,
    ) -> Vec<PortLinks> {
        let mut ports = Vec::new();

        for (index, port) in graph.ports(id).iter().enumerate() {
            let at = PortRef::new(id, index as u32);
            let far_ends: Vec<PortRef> = if port.kind.is_source() {
                graph.connections_from(at).map(|c| c.to).collect()
            } else {
                graph.connections_to(at).map(|c| c.from).collect()
            };
            if far_ends.is_empty() {
                continue;
            }

            let mut targets = Vec::with_capacity(far_ends.len());
            for end in far_ends {
                match Self::resolve_endpoint(graph, addresses, end, port.kind.counterpart()) {
                    Some(entry) => targets.push(entry),
                    None => {
                        tracing::warn!("Dropping link {:?} -> {:?}: endpoint unresolved", at, end);
                        stats.dropped_connections += 1;
                    }
                }
            }

            if !targets.is_empty() {
                ports.push(PortLinks {
                    port: at.port,
                    kind: port.kind,
                    targets,
                });
            }
        }
        ports
    }

    fn resolve_endpoint(
        graph: &GraphModel,
        addresses: &HashMap<NodeId, PackedAddress>,
        end: PortRef,
        expected: PortKind,
    ) -> Option<LinkEntry> {
        let address = *addresses.get(&end.node)?;
        let port = graph.port(end)?;
        (port.kind == expected).then_some(LinkEntry {
            address,
            port: end.port,
            kind: expected,
        })
    }

    fn build_table(
        order: &[(NodeId, PackedAddress)],
        plan: &[(PackedAddress, Vec<PortLinks>)],
        stats: &mut CompileStats,
    ) -> std::result::Result<LinkTable, LinkTableError> {
        let headers: usize = plan.iter().map(|(_, ports)| ports.len()).sum();
        let links: usize = plan
            .iter()
            .flat_map(|(_, ports)| ports.iter())
            .map(|p| p.targets.len())
            .sum();

        let mut builder = LinkTableBuilder::with_capacity(order.len(), headers + links);
        for &(_, address) in order {
            builder.push_node(address)?;
        }

        for (address, ports) in plan {
            for port_links in ports {
                let first = builder.reserve(
                    *address,
                    port_links.port,
                    port_links.kind,
                    port_links.targets.len() as u32,
                )?;
                for (k, target) in port_links.targets.iter().enumerate() {
                    builder.write(first + k, *target)?;
                }
            }
        }

        stats.link_headers = headers;
        stats.links = links;
        builder.finish()
    }

    /// Fallback table with the node order but no links.
    fn nodes_only(order: &[(NodeId, PackedAddress)]) -> LinkTable {
        let mut builder = LinkTableBuilder::with_capacity(order.len(), 0);
        for &(_, address) in order {
            if let Err(e) = builder.push_node(address) {
                Self::report(&e);
            }
        }
        builder.finish().unwrap_or_default()
    }

    /// Builder errors are compiler bugs: fatal in debug, logged in release.
    fn report(error: &LinkTableError) {
        tracing::error!("Link table invariant violated: {}", error);
        debug_assert!(false, "link table invariant violated: {error}");
    }
}

/// Compile with default pool settings.
pub fn compile(graph: &GraphModel) -> RuntimeProgram {
    GraphCompiler::compile(graph, &PoolConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Position;
    use crate::runtime::behavior::{Behavior, BehaviorRegistry, BehaviorTypeId};
    use crate::runtime::nodes::{self, AddInt, ConstantInt, PrintText, Sequence, StartEvent};
    use serde_json::json;
    use std::sync::Arc;

    fn model() -> GraphModel {
        GraphModel::new(Arc::new(nodes::builtin_registry()))
    }

    #[test]
    fn test_compile_empty_graph() {
        let program = compile(&model());
        assert!(program.is_empty());
        assert_eq!(program.stats.total_nodes, 0);
        assert_eq!(program.links.records().len(), 0);
    }

    #[test]
    fn test_order_follows_graph_iteration() {
        let mut g = model();
        let ids: Vec<_> = (0..4)
            .map(|i| g.add_node(ConstantInt::TYPE_ID, Position::new(i as f32, 0.0)))
            .collect();
        let program = compile(&g);

        let expected: Vec<_> = ids.iter().map(|id| program.address_of(*id).unwrap()).collect();
        assert_eq!(program.order(), expected.as_slice());
        // One behavior, one pool.
        assert_eq!(program.pools.pool_count(), 1);
    }

    #[test]
    fn test_both_ends_of_a_control_link_get_headers() {
        let mut g = model();
        let start = g.add_node(StartEvent::TYPE_ID, Position::default());
        let print = g.add_node(PrintText::TYPE_ID, Position::default());
        assert!(g.try_connect(start, 0, print, 0));

        let program = compile(&g);
        let start_addr = program.address_of(start).unwrap();
        let print_addr = program.address_of(print).unwrap();

        let range = program.links.get_links(start_addr, PortIndex(0));
        assert_eq!(range.count, 1);
        assert_eq!(
            program.links.get_link(range.first),
            Some(LinkEntry {
                address: print_addr,
                port: PortIndex(0),
                kind: PortKind::Enter,
            })
        );

        let sources: Vec<_> = program.links.links(print_addr, PortIndex(0)).collect();
        assert_eq!(
            sources,
            vec![LinkEntry {
                address: start_addr,
                port: PortIndex(0),
                kind: PortKind::Exit,
            }]
        );
        assert_eq!(program.links.records().len(), 4);
        assert_eq!(program.stats.link_headers, 2);
        assert_eq!(program.stats.links, 2);
    }

    #[test]
    fn test_output_header_lists_consumers() {
        let mut g = model();
        let c = g.add_node(ConstantInt::TYPE_ID, Position::default());
        let a = g.add_node(AddInt::TYPE_ID, Position::default());
        let b = g.add_node(AddInt::TYPE_ID, Position::default());
        assert!(g.try_connect(c, 0, a, 0));
        assert!(g.try_connect(c, 0, b, 1));

        let program = compile(&g);
        let consumers: Vec<_> = program
            .links
            .links(program.address_of(c).unwrap(), PortIndex(0))
            .map(|e| (e.address, e.port, e.kind))
            .collect();
        assert_eq!(
            consumers,
            vec![
                (program.address_of(a).unwrap(), PortIndex(0), PortKind::Input),
                (program.address_of(b).unwrap(), PortIndex(1), PortKind::Input),
            ]
        );
    }

    #[test]
    fn test_multiple_ports_written_in_ascending_order() {
        let mut g = model();
        let seq = g.add_node_with_data(Sequence::TYPE_ID, Position::default(), json!({ "arity": 3 }));
        let targets: Vec<_> = (0..3)
            .map(|_| g.add_node(PrintText::TYPE_ID, Position::default()))
            .collect();
        // Connect in reverse to make sure the compile order does not depend on it.
        for (i, t) in targets.iter().enumerate().rev() {
            assert!(g.try_connect(seq, i as u32 + 1, *t, 0));
        }

        let program = compile(&g);
        let seq_addr = program.address_of(seq).unwrap();
        for (i, t) in targets.iter().enumerate() {
            let entries: Vec<_> = program.links.links(seq_addr, PortIndex(i as u32 + 1)).collect();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].address, program.address_of(*t).unwrap());
        }
    }

    #[test]
    fn test_input_links_point_at_producer() {
        let mut g = model();
        let a = g.add_node_with_data(ConstantInt::TYPE_ID, Position::default(), json!({ "value": 1 }));
        let sum = g.add_node(AddInt::TYPE_ID, Position::default());
        assert!(g.try_connect(sum, 1, a, 0));

        let program = compile(&g);
        let sum_addr = program.address_of(sum).unwrap();
        let entries: Vec<_> = program.links.links(sum_addr, PortIndex(1)).collect();
        assert_eq!(
            entries,
            vec![LinkEntry {
                address: program.address_of(a).unwrap(),
                port: PortIndex(0),
                kind: PortKind::Output,
            }]
        );
        assert!(program.links.get_links(sum_addr, PortIndex(0)).is_empty());
    }

    #[test]
    fn test_try_compile_matches_compile() {
        let mut g = model();
        let start = g.add_node(StartEvent::TYPE_ID, Position::default());
        let print = g.add_node(PrintText::TYPE_ID, Position::default());
        assert!(g.try_connect(start, 0, print, 0));

        let strict = GraphCompiler::try_compile(&g, &PoolConfig::default()).unwrap();
        let lenient = compile(&g);
        assert_eq!(strict.order().len(), lenient.order().len());
        assert_eq!(strict.links.records(), lenient.links.records());
    }

    #[test]
    fn test_unknown_behavior_is_skipped() {
        let mut authoring = BehaviorRegistry::new();
        authoring.register::<ConstantInt>();
        let mut g = GraphModel::new(Arc::new(authoring));
        let known = g.add_node(ConstantInt::TYPE_ID, Position::default());
        let unknown = g.add_node(BehaviorTypeId("ghost"), Position::default());

        let program = compile(&g);
        assert_eq!(program.stats.total_nodes, 2);
        assert_eq!(program.stats.skipped_nodes, 1);
        assert!(program.address_of(known).is_some());
        assert!(program.address_of(unknown).is_none());
    }

    #[test]
    fn test_instance_data_is_materialized() {
        let mut g = model();
        let c = g.add_node_with_data(ConstantInt::TYPE_ID, Position::default(), json!({ "value": 42 }));
        let program = compile(&g);
        let addr = program.address_of(c).unwrap();
        assert_eq!(program.pools.with_data(addr, |c: &ConstantInt| c.value), Some(42));
    }
}
