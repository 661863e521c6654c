use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use tracing::info;

use crate::error::{GexifyError, Result};
use crate::export::{self, ExportFormat};
use crate::network_graph::{self, BuildMode, ChannelGraph};
use crate::records;
use crate::reduce::{self, ReductionReport, Reductions};

pub const DEFAULT_OUTPUT: &str = "full_graph.gexf";

/// Runtime configuration for one conversion.
#[derive(Debug, Clone)]
pub struct Options {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Inferred from the output extension when `None`.
    pub format: Option<ExportFormat>,
    pub reductions: Reductions,
    pub build_mode: BuildMode,
}

impl Options {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Options {
            input: input.into(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            format: None,
            reductions: Reductions::default(),
            build_mode: BuildMode::default(),
        }
    }

    pub fn export_format(&self) -> ExportFormat {
        self.format
            .unwrap_or_else(|| ExportFormat::from_path(&self.output))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub parsed_nodes: usize,
    pub parsed_channels: usize,
    pub skipped_edges: usize,
    pub built_nodes: usize,
    pub built_edges: usize,
    pub reduction: ReductionReport,
    pub nodes: usize,
    pub edges: usize,
}

/// Reads the input file, converts it and writes the result.
pub fn run(options: &Options) -> Result<Summary> {
    let file = File::open(&options.input).map_err(|source| GexifyError::Read {
        path: options.input.clone(),
        source,
    })?;
    info!("Reading {}", options.input.display());

    let (graph, summary) = convert(BufReader::new(file), options)?;
    export::write(&graph, &options.output, options.export_format())?;

    Ok(summary)
}

/// Parse, build and reduce without touching the filesystem.
pub fn convert<R: Read>(reader: R, options: &Options) -> Result<(ChannelGraph, Summary)> {
    let raw = records::from_reader(reader)?;
    let parsed = records::parse(&raw)?;

    let mut summary = Summary {
        parsed_nodes: parsed.nodes.len(),
        parsed_channels: parsed.channels.len(),
        skipped_edges: parsed.skipped_edges,
        ..Summary::default()
    };

    let mut graph = network_graph::build(parsed.nodes, parsed.channels, options.build_mode)?;
    summary.built_nodes = graph.node_count();
    summary.built_edges = graph.edge_count();

    summary.reduction = reduce::reduce(&mut graph, options.reductions);
    summary.nodes = graph.node_count();
    summary.edges = graph.edge_count();

    Ok((graph, summary))
}
