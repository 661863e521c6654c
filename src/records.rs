use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use tracing::{debug, info};

use crate::error::{GexifyError, Result};
use crate::network_graph::{Channel, Node, RoutingPolicy};

/// Top level of an LND `describegraph` dump.
#[derive(Debug, Deserialize)]
pub struct RawGraph {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Deserialize)]
pub struct RawNode {
    pub pub_key: Option<String>,
    pub last_update: Option<Value>,
}

// Fields stay optional so that edges without both policies can be skipped
// without looking at anything else.
#[derive(Debug, Deserialize)]
pub struct RawEdge {
    pub node1_pub: Option<String>,
    pub node2_pub: Option<String>,
    pub capacity: Option<Value>,
    pub last_update: Option<Value>,
    pub channel_id: Option<Value>,
    pub chan_point: Option<String>,
    pub node1_policy: Option<RawPolicy>,
    pub node2_policy: Option<RawPolicy>,
}

#[derive(Debug, Deserialize)]
pub struct RawPolicy {
    pub time_lock_delta: Option<Value>,
    pub min_htlc: Option<Value>,
    pub fee_base_msat: Option<Value>,
    pub fee_rate_milli_msat: Option<Value>,
}

/// Validated records ready for the graph builder.
#[derive(Debug, Default)]
pub struct Records {
    pub nodes: Vec<Node>,
    pub channels: Vec<Channel>,
    /// Edges dropped because a directional policy was missing.
    pub skipped_edges: usize,
}

pub fn from_reader<R: Read>(reader: R) -> Result<RawGraph> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn parse(raw: &RawGraph) -> Result<Records> {
    let nodes = parse_nodes(&raw.nodes)?;
    let channels = parse_edges(&raw.edges)?;
    let skipped_edges = raw.edges.len() - channels.len();

    info!(
        "Parsed {} nodes and {} channels, skipped {} edges with incomplete policies",
        nodes.len(),
        channels.len(),
        skipped_edges
    );

    Ok(Records {
        nodes,
        channels,
        skipped_edges,
    })
}

pub fn parse_nodes(raw: &[RawNode]) -> Result<Vec<Node>> {
    raw.iter()
        .enumerate()
        .map(|(i, node)| -> Result<Node> {
            let context = format!("nodes[{}]", i);
            Ok(Node {
                pub_key: required(&node.pub_key, &context, "pub_key")?.clone(),
                last_update: Some(integer(&node.last_update, &context, "last_update")?),
            })
        })
        .collect()
}

pub fn parse_edges(raw: &[RawEdge]) -> Result<Vec<Channel>> {
    let mut channels = Vec::with_capacity(raw.len());

    for (i, edge) in raw.iter().enumerate() {
        let (policy1, policy2) = match (&edge.node1_policy, &edge.node2_policy) {
            (Some(policy1), Some(policy2)) => (policy1, policy2),
            _ => {
                debug!("Skipping edges[{}]: missing routing policy", i);
                continue;
            }
        };

        let context = format!("edges[{}]", i);
        channels.push(Channel {
            node1_pub: required(&edge.node1_pub, &context, "node1_pub")?.clone(),
            node2_pub: required(&edge.node2_pub, &context, "node2_pub")?.clone(),
            capacity: non_negative(&edge.capacity, &context, "capacity")?,
            last_update: integer(&edge.last_update, &context, "last_update")?,
            channel_id: channel_id(&edge.channel_id, &context)?,
            chan_point: required(&edge.chan_point, &context, "chan_point")?.clone(),
            node1_policy: policy(policy1, &format!("{}.node1_policy", context))?,
            node2_policy: policy(policy2, &format!("{}.node2_policy", context))?,
        });
    }

    Ok(channels)
}

fn policy(raw: &RawPolicy, context: &str) -> Result<RoutingPolicy> {
    Ok(RoutingPolicy {
        time_lock_delta: integer(&raw.time_lock_delta, context, "time_lock_delta")?,
        min_htlc: integer(&raw.min_htlc, context, "min_htlc")?,
        fee_base_msat: integer(&raw.fee_base_msat, context, "fee_base_msat")?,
        fee_rate_milli_msat: integer(&raw.fee_rate_milli_msat, context, "fee_rate_milli_msat")?,
    })
}

fn required<'a, T>(value: &'a Option<T>, context: &str, field: &str) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| GexifyError::malformed(format!("{}.{}", context, field), "missing field"))
}

/// Accepts JSON numbers and decimal strings; LND encodes 64-bit values as
/// strings. Fractional numbers are truncated toward zero.
fn integer(value: &Option<Value>, context: &str, field: &str) -> Result<i64> {
    let value = required(value, context, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .map(f64::trunc)
                .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| {
        GexifyError::malformed(
            format!("{}.{}", context, field),
            format!("expected a 64-bit integer, got {}", value),
        )
    })
}

fn non_negative(value: &Option<Value>, context: &str, field: &str) -> Result<i64> {
    let parsed = integer(value, context, field)?;
    if parsed < 0 {
        return Err(GexifyError::malformed(
            format!("{}.{}", context, field),
            format!("expected a non-negative integer, got {}", parsed),
        ));
    }
    Ok(parsed)
}

fn channel_id(value: &Option<Value>, context: &str) -> Result<String> {
    match required(value, context, "channel_id")? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        other => Err(GexifyError::malformed(
            format!("{}.channel_id", context),
            format!("expected a string or an integer, got {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_graph::{build, BuildMode};
    use proptest::prelude::*;
    use serde_json::json;
    use std::io;

    fn policy_json() -> Value {
        json!({
            "time_lock_delta": 144,
            "min_htlc": "1000",
            "fee_base_msat": "1000",
            "fee_rate_milli_msat": "1",
            "disabled": false
        })
    }

    fn edge_json(a: &str, b: &str, id: u64) -> Value {
        json!({
            "channel_id": id.to_string(),
            "chan_point": format!("{:064x}:0", id),
            "last_update": 1_550_000_000u64,
            "node1_pub": a,
            "node2_pub": b,
            "capacity": "500000",
            "node1_policy": policy_json(),
            "node2_policy": policy_json()
        })
    }

    fn raw(document: Value) -> RawGraph {
        serde_json::from_value(document).unwrap()
    }

    #[test]
    fn test_parse_lnd_edge() {
        let records = parse(&raw(json!({
            "nodes": [{"pub_key": "A", "last_update": 10, "alias": "alice"}],
            "edges": [edge_json("A", "B", 42)]
        })))
        .unwrap();

        assert_eq!(records.nodes[0].last_update, Some(10));
        let channel = &records.channels[0];
        assert_eq!(channel.capacity, 500_000);
        assert_eq!(channel.channel_id, "42");
        assert_eq!(channel.node1_policy.time_lock_delta, 144);
        assert_eq!(channel.node2_policy.min_htlc, 1000);
        assert_eq!(records.skipped_edges, 0);
    }

    #[test]
    fn test_one_missing_policy_among_ten_edges() {
        let mut edges: Vec<Value> = (0..10).map(|i| edge_json("A", &format!("N{}", i), i)).collect();
        edges[4]["node1_policy"] = Value::Null;

        let records = parse(&raw(json!({ "nodes": [], "edges": edges }))).unwrap();
        assert_eq!(records.channels.len(), 9);
        assert_eq!(records.skipped_edges, 1);

        let graph = build(records.nodes, records.channels, BuildMode::Permissive).unwrap();
        assert_eq!(graph.edge_count(), 9);
        assert!(graph.channel("A", "N4").is_none());
    }

    #[test]
    fn test_absent_policy_key_skips_edge_without_validation() {
        let records = parse(&raw(json!({
            "nodes": [],
            "edges": [{"node1_pub": "A", "capacity": "not a number", "node1_policy": policy_json()}]
        })))
        .unwrap();

        assert!(records.channels.is_empty());
        assert_eq!(records.skipped_edges, 1);
    }

    #[test]
    fn test_integer_channel_id() {
        let mut edge = edge_json("A", "B", 1);
        edge["channel_id"] = json!(624_314_784_227_655_680u64);

        let channels = parse_edges(&raw(json!({"nodes": [], "edges": [edge]})).edges).unwrap();
        assert_eq!(channels[0].channel_id, "624314784227655680");
    }

    #[test]
    fn test_non_numeric_capacity_is_malformed() {
        let mut edge = edge_json("A", "B", 1);
        edge["capacity"] = json!("lots");

        let err = parse_edges(&raw(json!({"nodes": [], "edges": [edge]})).edges).unwrap_err();
        match err {
            GexifyError::MalformedInput { context, .. } => assert_eq!(context, "edges[0].capacity"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_policy_field_is_malformed() {
        let mut edge = edge_json("A", "B", 1);
        edge["node2_policy"]["fee_rate_milli_msat"] = json!("1.5%");

        let err = parse_edges(&raw(json!({"nodes": [], "edges": [edge]})).edges).unwrap_err();
        assert!(err.is_malformed_input());
        assert!(err.to_string().contains("edges[0].node2_policy.fee_rate_milli_msat"));
    }

    #[test]
    fn test_signed_and_float_values_are_coerced() {
        let mut edge = edge_json("A", "B", 1);
        edge["last_update"] = json!(-1);
        edge["capacity"] = json!(100.0);
        edge["node1_policy"]["fee_base_msat"] = json!(-5);
        edge["node1_policy"]["time_lock_delta"] = json!(1.5);
        edge["node2_policy"]["min_htlc"] = json!("-7");

        let channels = parse_edges(&raw(json!({"nodes": [], "edges": [edge]})).edges).unwrap();
        let channel = &channels[0];
        assert_eq!(channel.last_update, -1);
        assert_eq!(channel.capacity, 100);
        assert_eq!(channel.node1_policy.fee_base_msat, -5);
        assert_eq!(channel.node1_policy.time_lock_delta, 1);
        assert_eq!(channel.node2_policy.min_htlc, -7);

        let nodes = parse_nodes(&raw(json!({"nodes": [{"pub_key": "A", "last_update": 2.0}], "edges": []})).nodes)
            .unwrap();
        assert_eq!(nodes[0].last_update, Some(2));
    }

    #[test]
    fn test_negative_capacity_is_malformed() {
        let mut edge = edge_json("A", "B", 1);
        edge["capacity"] = json!("-100");

        let err = parse_edges(&raw(json!({"nodes": [], "edges": [edge]})).edges).unwrap_err();
        assert!(err.to_string().contains("edges[0].capacity"));
    }

    #[test]
    fn test_values_outside_signed_range_are_malformed() {
        for bad in [json!(u64::MAX), json!("18446744073709551615"), json!(1e300)] {
            let mut edge = edge_json("A", "B", 1);
            edge["node2_policy"]["min_htlc"] = bad;
            assert!(parse_edges(&raw(json!({"nodes": [], "edges": [edge]})).edges).is_err());
        }
    }

    #[test]
    fn test_non_integer_kinds_are_malformed() {
        for bad in [json!(true), json!({"value": 1}), json!("1.5")] {
            let mut edge = edge_json("A", "B", 1);
            edge["last_update"] = bad;
            assert!(parse_edges(&raw(json!({"nodes": [], "edges": [edge]})).edges).is_err());
        }
    }

    #[test]
    fn test_missing_pub_key_is_malformed() {
        let err = parse_nodes(&raw(json!({"nodes": [{"last_update": 1}], "edges": []})).nodes)
            .unwrap_err();
        assert!(err.to_string().contains("nodes[0].pub_key"));
    }

    #[test]
    fn test_missing_top_level_collection() {
        let err = from_reader(&br#"{"nodes": []}"#[..]).unwrap_err();
        assert!(matches!(err, GexifyError::Document(_)));
    }

    struct BrokenReader;

    impl io::Read for BrokenReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn test_failed_stream_is_distinguishable() {
        let err = from_reader(BrokenReader).unwrap_err();
        assert!(matches!(err, GexifyError::InputStream(_)));
        assert!(!err.is_malformed_input());
    }

    proptest! {
        #[test]
        fn prop_edges_without_both_policies_never_appear(
            presence in prop::collection::vec((any::<bool>(), any::<bool>()), 0..30)
        ) {
            let edges: Vec<Value> = presence
                .iter()
                .enumerate()
                .map(|(i, (has1, has2))| {
                    let mut edge = edge_json(&format!("a{}", i), &format!("b{}", i), i as u64);
                    if !has1 {
                        edge["node1_policy"] = Value::Null;
                    }
                    if !has2 {
                        edge.as_object_mut().unwrap().remove("node2_policy");
                    }
                    edge
                })
                .collect();

            let records = parse(&raw(json!({ "nodes": [], "edges": edges }))).unwrap();
            let graph = build(records.nodes, records.channels, BuildMode::Permissive).unwrap();

            for (i, (has1, has2)) in presence.iter().enumerate() {
                let present = graph.channel(&format!("a{}", i), &format!("b{}", i)).is_some();
                prop_assert_eq!(present, *has1 && *has2);
            }
        }
    }
}
