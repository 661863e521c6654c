mod error;
mod export;
mod network_graph;
mod pipeline;
mod records;
mod reduce;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, FmtSubscriber};

use crate::export::ExportFormat;
use crate::network_graph::BuildMode;
use crate::pipeline::Options;
use crate::reduce::Reductions;

#[derive(Parser, Debug)]
#[command(
    name = "gexify",
    version,
    about = "Convert an LND .json graph dump to a .gexf file for Gephi visualization"
)]
struct Cli {
    /// Removes nodes without edges
    #[arg(short = 'i', long)]
    isolated: bool,

    /// Keeps only the largest connected component
    #[arg(short = 'C', long)]
    connected: bool,

    /// Output file location
    #[arg(short, long, default_value = pipeline::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Output format, inferred from the output extension by default
    #[arg(long, value_enum)]
    format: Option<ExportFormat>,

    /// Reject channels whose endpoints are not listed as nodes
    #[arg(long)]
    strict: bool,

    /// Filepath to JSON file
    #[arg(value_name = "PATH", value_parser = existing_file)]
    filepath: PathBuf,
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("The file {} does not exist!", value))
    }
}

impl Cli {
    fn into_options(self) -> Options {
        let mut options = Options::new(self.filepath);
        options.output = self.output;
        options.format = self.format;
        options.reductions = Reductions {
            remove_isolated: self.isolated,
            largest_component: self.connected,
        };
        if self.strict {
            options.build_mode = BuildMode::Strict;
        }
        options
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gexify=info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let options = Cli::parse().into_options();
    info!("{:?}", options);

    let summary = match pipeline::run(&options) {
        Ok(summary) => summary,
        Err(err) => {
            if err.is_malformed_input() {
                warn!("Input rejected, nothing written to {}", options.output.display());
            }
            return Err(anyhow::Error::new(err)
                .context(format!("failed to convert {}", options.input.display())));
        }
    };

    info!(
        "Parsed {} nodes and {} channels ({} edges skipped), built {} nodes and {} channels, \
         removed {} isolated and {} out-of-component nodes, exported {} nodes and {} channels",
        summary.parsed_nodes,
        summary.parsed_channels,
        summary.skipped_edges,
        summary.built_nodes,
        summary.built_edges,
        summary.reduction.isolated_removed,
        summary.reduction.component_removed,
        summary.nodes,
        summary.edges
    );

    Ok(())
}
