//! Call graph aggregation and the final network artifact
//!
//! Per-transaction call records are folded into one multigraph keyed by
//! `(source, target)`. Each edge keeps a count per call type and the
//! shallowest depth it was seen at. The fold is commutative, so records can
//! be merged in whatever order traces complete.

use crate::block::BlockBound;
use crate::trace::CallRecord;
use crate::types::{format_address, serialize_address};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Aggregated calls from one contract to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    #[serde(serialize_with = "serialize_address")]
    pub source: Address,
    #[serde(serialize_with = "serialize_address")]
    pub target: Address,
    /// Occurrences per call type. Never empty.
    pub types: BTreeMap<String, u64>,
    /// Shallowest depth below the analysed contract, at least 1.
    pub min_depth: u32,
}

impl Edge {
    fn from_record(record: &CallRecord) -> Self {
        Self {
            source: record.caller,
            target: record.callee,
            types: BTreeMap::from([(record.call_type.clone(), 1)]),
            min_depth: record.depth,
        }
    }

    /// Total number of calls across all types.
    pub fn total_calls(&self) -> u64 {
        self.types.values().sum()
    }

    fn absorb(&mut self, other: &Edge) {
        for (call_type, count) in &other.types {
            *self.types.entry(call_type.clone()).or_insert(0) += count;
        }
        self.min_depth = self.min_depth.min(other.min_depth);
    }
}

/// Deduplicated multigraph under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    edges: BTreeMap<(Address, Address), Edge>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one call into the graph.
    pub fn add_record(&mut self, record: &CallRecord) {
        self.edges
            .entry((record.caller, record.callee))
            .and_modify(|edge| {
                *edge.types.entry(record.call_type.clone()).or_insert(0) += 1;
                edge.min_depth = edge.min_depth.min(record.depth);
            })
            .or_insert_with(|| Edge::from_record(record));
    }

    pub fn add_records<'a>(&mut self, records: impl IntoIterator<Item = &'a CallRecord>) {
        for record in records {
            self.add_record(record);
        }
    }

    /// Merge a partial graph built elsewhere into this one.
    pub fn merge(&mut self, other: CallGraph) {
        for (key, edge) in other.edges {
            match self.edges.get_mut(&key) {
                Some(existing) => existing.absorb(&edge),
                None => {
                    self.edges.insert(key, edge);
                }
            }
        }
    }

    pub fn get(&self, source: Address, target: Address) -> Option<&Edge> {
        self.edges.get(&(source, target))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Every distinct edge target.
    pub fn targets(&self) -> BTreeSet<Address> {
        self.edges.keys().map(|(_, target)| *target).collect()
    }

    /// Drop every edge whose target fails `keep`.
    pub fn retain_targets<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Address) -> bool,
    {
        self.edges.retain(|(_, target), _| keep(target));
    }

    /// Edges ordered by `(source, target)`.
    pub fn into_edges(self) -> Vec<Edge> {
        self.edges.into_values().collect()
    }
}

impl<'a> FromIterator<&'a CallRecord> for CallGraph {
    fn from_iter<I: IntoIterator<Item = &'a CallRecord>>(iter: I) -> Self {
        let mut graph = CallGraph::new();
        graph.add_records(iter);
        graph
    }
}

fn serialize_addresses<S>(nodes: &BTreeSet<Address>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(nodes.iter().map(format_address))
}

/// Dependency network of a contract over a block range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractNetwork {
    #[serde(serialize_with = "serialize_address")]
    pub contract_address: Address,
    pub from_block: u64,
    pub to_block: u64,
    pub n_nodes: usize,
    #[serde(serialize_with = "serialize_addresses")]
    pub nodes: BTreeSet<Address>,
    pub edges: Vec<Edge>,
    /// Transactions found by discovery, before any filtering.
    pub n_matching_transactions: usize,
}

impl ContractNetwork {
    /// Build the final artifact from a filtered graph.
    ///
    /// The node set is recomputed from the surviving edges.
    pub fn assemble(
        contract_address: Address,
        from_block: BlockBound,
        to_block: BlockBound,
        graph: CallGraph,
        n_matching_transactions: usize,
    ) -> Self {
        let edges = graph.into_edges();
        let nodes: BTreeSet<Address> = edges
            .iter()
            .flat_map(|edge| [edge.source, edge.target])
            .collect();

        Self {
            contract_address,
            from_block: from_block.number(),
            to_block: to_block.number(),
            n_nodes: nodes.len(),
            nodes,
            edges,
            n_matching_transactions,
        }
    }

    /// Addresses `address` calls directly.
    pub fn callees(&self, address: Address) -> BTreeSet<Address> {
        self.edges
            .iter()
            .filter(|edge| edge.source == address)
            .map(|edge| edge.target)
            .collect()
    }

    /// Addresses that call `address` directly.
    pub fn callers(&self, address: Address) -> BTreeSet<Address> {
        self.edges
            .iter()
            .filter(|edge| edge.target == address)
            .map(|edge| edge.source)
            .collect()
    }

    /// Direct dependencies of the analysed contract.
    pub fn dependencies(&self) -> BTreeSet<Address> {
        self.callees(self.contract_address)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize network")
    }

    /// Render as a Graphviz digraph, one labelled edge per aggregated edge.
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", format_address(&self.contract_address));
        for node in &self.nodes {
            let _ = writeln!(dot, "    \"{}\";", format_address(node));
        }
        for edge in &self.edges {
            let label = edge
                .types
                .iter()
                .map(|(call_type, count)| format!("{}:{}", call_type, count))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                dot,
                "    \"{}\" -> \"{}\" [label=\"{}\"];",
                format_address(&edge.source),
                format_address(&edge.target),
                label
            );
        }
        dot.push_str("}\n");
        dot
    }

    pub fn export_json(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)
            .with_context(|| format!("Failed to write JSON export: {:?}", path))
    }

    pub fn export_dot(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_dot())
            .with_context(|| format!("Failed to write DOT export: {:?}", path))
    }
}
