use petgraph::algo::kosaraju_scc;
use petgraph::graph::NodeIndex;
use tracing::info;

use crate::network_graph::ChannelGraph;

/// Which reduction passes to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reductions {
    pub remove_isolated: bool,
    pub largest_component: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReductionReport {
    pub isolated_removed: usize,
    pub component_removed: usize,
}

/// Runs the requested passes. Isolated nodes are always removed before the
/// largest component is selected.
pub fn reduce(graph: &mut ChannelGraph, reductions: Reductions) -> ReductionReport {
    let mut report = ReductionReport::default();

    if reductions.remove_isolated {
        report.isolated_removed = remove_isolated(graph);
        info!("Removed {} isolated nodes", report.isolated_removed);
    }
    if reductions.largest_component {
        report.component_removed = keep_largest_component(graph);
        info!(
            "Removed {} nodes outside the largest connected component",
            report.component_removed
        );
    }

    report
}

/// Removes every node without incident channels. Returns the number removed.
pub fn remove_isolated(graph: &mut ChannelGraph) -> usize {
    let isolated: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|&ix| graph.degree_at(ix) == 0)
        .collect();

    for &ix in &isolated {
        graph.remove_node_at(ix);
    }

    isolated.len()
}

/// Maximal sets of nodes pairwise reachable through channels.
pub fn connected_components(graph: &ChannelGraph) -> Vec<Vec<NodeIndex>> {
    // On an undirected graph every strongly connected component is a
    // connected component. Kosaraju walks iteratively, so deep channel
    // chains do not grow the call stack.
    kosaraju_scc(graph.inner())
}

/// Keeps only the connected component with the most nodes and returns the
/// number of nodes removed.
///
/// Among components of equal size the one holding the lexicographically
/// smallest public key wins, so the result does not depend on iteration
/// order.
pub fn keep_largest_component(graph: &mut ChannelGraph) -> usize {
    let components = connected_components(graph);
    if components.len() <= 1 {
        return 0;
    }

    let sizes: Vec<usize> = components.iter().map(|c| c.len()).collect();
    info!(
        "Number of connected components: {}, largest: {}, smallest: {}",
        components.len(),
        sizes.iter().max().copied().unwrap_or(0),
        sizes.iter().min().copied().unwrap_or(0)
    );

    let smallest_key = |component: &[NodeIndex]| -> String {
        component
            .iter()
            .filter_map(|&ix| graph.node_at(ix))
            .map(|node| node.pub_key.as_str())
            .min()
            .unwrap_or_default()
            .to_string()
    };

    let mut keep = 0;
    let mut keep_key = smallest_key(&components[0]);
    for (i, component) in components.iter().enumerate().skip(1) {
        if component.len() < components[keep].len() {
            continue;
        }
        let key = smallest_key(component);
        if component.len() > components[keep].len() || key < keep_key {
            keep = i;
            keep_key = key;
        }
    }

    let mut removed = 0;
    for (i, component) in components.iter().enumerate() {
        if i == keep {
            continue;
        }
        for &ix in component {
            graph.remove_node_at(ix);
            removed += 1;
        }
    }

    removed
}
