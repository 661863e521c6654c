use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableUnGraph;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{GexifyError, Result};

/// A network participant, identified by its public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub pub_key: String,
    /// `None` when the node was only ever seen as a channel endpoint.
    pub last_update: Option<i64>,
}

/// Routing terms announced by one endpoint of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub time_lock_delta: i64,
    pub min_htlc: i64,
    pub fee_base_msat: i64,
    pub fee_rate_milli_msat: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub node1_pub: String,
    pub node2_pub: String,
    /// Never negative.
    pub capacity: i64,
    pub last_update: i64,
    pub channel_id: String,
    pub chan_point: String,
    pub node1_policy: RoutingPolicy,
    pub node2_policy: RoutingPolicy,
}

/// How the builder treats channels whose endpoints were never declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Create a bare node for every undeclared endpoint.
    #[default]
    Permissive,
    /// Reject the input with `DanglingEndpoint`.
    Strict,
}

/// Undirected channel graph keyed by node public key.
///
/// At most one node per public key and at most one channel per unordered
/// pair of nodes. Node indices stay valid across removals.
#[derive(Debug, Clone, Default)]
pub struct ChannelGraph {
    graph: StableUnGraph<Node, Channel>,
    index: HashMap<String, NodeIndex>,
}

impl ChannelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, pub_key: &str) -> bool {
        self.index.contains_key(pub_key)
    }

    pub fn node_at(&self, ix: NodeIndex) -> Option<&Node> {
        self.graph.node_weight(ix)
    }

    /// Number of incident channels, counted on the current edge set.
    pub(crate) fn degree_at(&self, ix: NodeIndex) -> usize {
        self.graph.edges(ix).count()
    }

    /// Nodes in index order. This is insertion order until a removal is
    /// followed by an insertion, which may reuse a freed slot.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_indices().map(move |ix| &self.graph[ix])
    }

    /// Channels in index order, with the same caveat as `nodes`.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.graph.edge_indices().map(move |ix| &self.graph[ix])
    }

    pub(crate) fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub(crate) fn inner(&self) -> &StableUnGraph<Node, Channel> {
        &self.graph
    }

    /// Inserts a node, overwriting the attributes of an existing node with the
    /// same public key.
    pub fn upsert_node(&mut self, node: Node) -> NodeIndex {
        match self.index.get(&node.pub_key).copied() {
            Some(ix) => {
                self.graph[ix] = node;
                ix
            }
            None => {
                let pub_key = node.pub_key.clone();
                let ix = self.graph.add_node(node);
                self.index.insert(pub_key, ix);
                ix
            }
        }
    }

    /// Inserts a channel, replacing every attribute of an existing channel
    /// between the same pair. Undeclared endpoints become bare nodes.
    pub fn upsert_channel(&mut self, channel: Channel) -> EdgeIndex {
        let a = self.ensure_node(&channel.node1_pub);
        let b = self.ensure_node(&channel.node2_pub);

        match self.graph.find_edge(a, b) {
            Some(edge) => {
                debug!(
                    "Replacing channel {} between {} and {}",
                    self.graph[edge].channel_id, channel.node1_pub, channel.node2_pub
                );
                self.graph[edge] = channel;
                edge
            }
            None => self.graph.add_edge(a, b, channel),
        }
    }

    pub(crate) fn remove_node_at(&mut self, ix: NodeIndex) -> Option<Node> {
        let node = self.graph.remove_node(ix)?;
        self.index.remove(&node.pub_key);
        Some(node)
    }

    fn ensure_node(&mut self, pub_key: &str) -> NodeIndex {
        if let Some(&ix) = self.index.get(pub_key) {
            return ix;
        }
        self.upsert_node(Node {
            pub_key: pub_key.to_string(),
            last_update: None,
        })
    }
}

/// Assembles a graph from parsed records: all nodes first, then all
/// channels, both in input order, last write wins.
pub fn build(nodes: Vec<Node>, channels: Vec<Channel>, mode: BuildMode) -> Result<ChannelGraph> {
    let mut graph = ChannelGraph::new();

    for node in nodes {
        graph.upsert_node(node);
    }
    let declared = graph.node_count();

    let mut implicit = 0;
    for channel in channels {
        for pub_key in [&channel.node1_pub, &channel.node2_pub] {
            if graph.contains_node(pub_key) {
                continue;
            }
            match mode {
                BuildMode::Strict => {
                    return Err(GexifyError::DanglingEndpoint {
                        channel_id: channel.channel_id.clone(),
                        pub_key: pub_key.clone(),
                    });
                }
                BuildMode::Permissive => {
                    warn!(
                        "Channel {} references undeclared node {}, creating it",
                        channel.channel_id, pub_key
                    );
                    graph.upsert_node(Node {
                        pub_key: pub_key.clone(),
                        last_update: None,
                    });
                    implicit += 1;
                }
            }
        }
        graph.upsert_channel(channel);
    }

    info!(
        "Built graph with {} nodes ({} declared, {} implicit) and {} channels",
        graph.node_count(),
        declared,
        implicit,
        graph.edge_count()
    );

    Ok(graph)
}
