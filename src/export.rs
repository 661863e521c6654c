use petgraph::dot::{Config, Dot};
use std::path::Path;
use tracing::info;

use crate::error::{GexifyError, Result};
use crate::network_graph::{Channel, ChannelGraph, RoutingPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// GEXF 1.2, readable by Gephi
    Gexf,
    /// Graphviz DOT
    Dot,
}

impl ExportFormat {
    /// `.dot` and `.gv` select DOT, everything else GEXF.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("dot") || ext.eq_ignore_ascii_case("gv") => {
                ExportFormat::Dot
            }
            _ => ExportFormat::Gexf,
        }
    }
}

const EDGE_ATTRIBUTES: [(&str, &str); 12] = [
    ("capacity", "long"),
    ("last_update", "long"),
    ("channel_id", "string"),
    ("chan_point", "string"),
    ("node1_timelock_delta", "long"),
    ("node1_min_htlc", "long"),
    ("node1_fee_base_msat", "long"),
    ("node1_fee_rate_milli_msat", "long"),
    ("node2_timelock_delta", "long"),
    ("node2_min_htlc", "long"),
    ("node2_fee_base_msat", "long"),
    ("node2_fee_rate_milli_msat", "long"),
];

/// Renders the graph and writes it in one step, so nothing is written unless
/// rendering succeeded.
pub fn write(graph: &ChannelGraph, path: &Path, format: ExportFormat) -> Result<()> {
    let document = match format {
        ExportFormat::Gexf => render_gexf(graph),
        ExportFormat::Dot => render_dot(graph),
    };

    std::fs::write(path, document).map_err(|source| GexifyError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Wrote {} nodes and {} channels to {} as {:?}",
        graph.node_count(),
        graph.edge_count(),
        path.display(),
        format
    );
    Ok(())
}

pub fn render_gexf(graph: &ChannelGraph) -> String {
    let mut out = String::new();
    out.push_str("<?xml version='1.0' encoding='utf-8'?>\n");
    out.push_str("<gexf xmlns=\"http://www.gexf.net/1.2draft\" version=\"1.2\">\n");
    out.push_str("  <meta>\n    <creator>gexify</creator>\n  </meta>\n");
    out.push_str("  <graph defaultedgetype=\"undirected\" mode=\"static\" name=\"\">\n");

    out.push_str("    <attributes class=\"node\" mode=\"static\">\n");
    out.push_str("      <attribute id=\"0\" title=\"last_update\" type=\"long\" />\n");
    out.push_str("    </attributes>\n");

    out.push_str("    <attributes class=\"edge\" mode=\"static\">\n");
    for (id, (title, kind)) in EDGE_ATTRIBUTES.iter().enumerate() {
        out.push_str(&format!(
            "      <attribute id=\"{}\" title=\"{}\" type=\"{}\" />\n",
            id, title, kind
        ));
    }
    out.push_str("    </attributes>\n");

    out.push_str("    <nodes>\n");
    for node in graph.nodes() {
        let key = escape(&node.pub_key);
        match node.last_update {
            Some(last_update) => {
                out.push_str(&format!("      <node id=\"{}\" label=\"{}\">\n", key, key));
                out.push_str("        <attvalues>\n");
                out.push_str(&format!(
                    "          <attvalue for=\"0\" value=\"{}\" />\n",
                    last_update
                ));
                out.push_str("        </attvalues>\n");
                out.push_str("      </node>\n");
            }
            None => {
                out.push_str(&format!("      <node id=\"{}\" label=\"{}\" />\n", key, key));
            }
        }
    }
    out.push_str("    </nodes>\n");

    out.push_str("    <edges>\n");
    for (id, channel) in graph.channels().enumerate() {
        out.push_str(&format!(
            "      <edge source=\"{}\" target=\"{}\" id=\"{}\">\n",
            escape(&channel.node1_pub),
            escape(&channel.node2_pub),
            id
        ));
        out.push_str("        <attvalues>\n");
        for (attr, value) in edge_values(channel).iter().enumerate() {
            out.push_str(&format!(
                "          <attvalue for=\"{}\" value=\"{}\" />\n",
                attr,
                escape(value)
            ));
        }
        out.push_str("        </attvalues>\n");
        out.push_str("      </edge>\n");
    }
    out.push_str("    </edges>\n");

    out.push_str("  </graph>\n</gexf>\n");
    out
}

// Same order as EDGE_ATTRIBUTES.
fn edge_values(channel: &Channel) -> Vec<String> {
    let policy = |p: &RoutingPolicy| {
        [
            p.time_lock_delta.to_string(),
            p.min_htlc.to_string(),
            p.fee_base_msat.to_string(),
            p.fee_rate_milli_msat.to_string(),
        ]
    };

    let mut values = vec![
        channel.capacity.to_string(),
        channel.last_update.to_string(),
        channel.channel_id.clone(),
        channel.chan_point.clone(),
    ];
    values.extend(policy(&channel.node1_policy));
    values.extend(policy(&channel.node2_policy));
    values
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn render_dot(graph: &ChannelGraph) -> String {
    let viz = Dot::with_attr_getters(
        graph.inner(),
        &[Config::NodeNoLabel, Config::EdgeNoLabel],
        &|_, edge| {
            let channel = edge.weight();
            format!(
                "label=\"{}\" channel_id=\"{}\"",
                channel.capacity,
                channel.channel_id.escape_default()
            )
        },
        &|_, (_, node)| format!("label=\"{}\"", node.pub_key.escape_default()),
    );

    format!("{:?}", viz)
}
