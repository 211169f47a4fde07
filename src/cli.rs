//! Command-line interface for gvrender.

use crate::engine::{EngineCoordinator, Layout, build_engines};
use crate::format::OutputKind;
use crate::graphviz::Graphviz;
use anyhow::{Context, Result};
use clap::Parser;
use gvrender_config::{Config, EngineKind};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// gvrender - render Graphviz DOT files with automatic engine fallback
#[derive(Parser, Debug)]
#[command(name = "gvrender")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// DOT file to render (reads stdin when omitted or `-`)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Output kind (png, svg, svg-document, dot, xdot, plain, plain-ext, ps, ps2, json, json0)
    #[arg(short = 'f', long = "format", value_name = "KIND", default_value = "svg")]
    pub kind: OutputKind,

    /// Output file (writes stdout when omitted; the kind's extension is added if missing)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Output width in pixels
    #[arg(long, value_name = "PX")]
    pub width: Option<u32>,

    /// Output height in pixels
    #[arg(long, value_name = "PX")]
    pub height: Option<u32>,

    /// Scale factor applied after width/height
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// Multiply every font size by this factor
    #[arg(long, value_name = "FACTOR", default_value_t = 1.0)]
    pub font_adjust: f64,

    /// Layout algorithm
    #[arg(long, default_value = "dot")]
    pub layout: Layout,

    /// Engines to try, in order (comma separated: cmdline, server, native)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub engine: Vec<EngineKind>,

    /// Invert the y coordinate in output
    #[arg(long)]
    pub y_invert: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL", value_parser = parse_log_level)]
    pub log_level: Option<log::LevelFilter>,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

fn parse_log_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse::<log::LevelFilter>()
        .map_err(|_| format!("invalid log level '{s}'"))
}

impl Cli {
    /// Load the config selected by `--config`, or the default one.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("failed to load config {}", path.display())),
            None => Config::load().context("failed to load config"),
        }
    }

    /// Coordinator honoring `--engine` over the configured order.
    pub fn coordinator(&self, config: &Config) -> Arc<EngineCoordinator> {
        let coordinator = Arc::new(EngineCoordinator::from_config(config));
        if !self.engine.is_empty() {
            coordinator.configure(build_engines(&self.engine, config));
        }
        coordinator
    }

    /// Build the render request from the input and flags.
    pub fn request(&self, coordinator: Arc<EngineCoordinator>) -> Result<Graphviz> {
        let request = match self.input.as_deref() {
            Some(path) if path.as_os_str() != "-" => Graphviz::from_file(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            _ => {
                let mut src = String::new();
                io::stdin()
                    .read_to_string(&mut src)
                    .context("failed to read DOT source from stdin")?;
                Graphviz::from_string(src)
            }
        };

        let mut request = request
            .with_coordinator(coordinator)
            .scale(self.scale)
            .font_adjust(self.font_adjust)
            .layout(self.layout)
            .y_invert(self.y_invert);
        if let Some(width) = self.width {
            request = request.width(width);
        }
        if let Some(height) = self.height {
            request = request.height(height);
        }
        Ok(request)
    }
}

/// Run the CLI with parsed arguments.
pub fn run(cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;
    crate::debug::apply_config_log_level(config.log_level.to_level_filter());
    let coordinator = cli.coordinator(&config);
    let renderer = cli.request(Arc::clone(&coordinator))?.render(cli.kind);

    match &cli.output {
        Some(path) => {
            let written = renderer.to_file(path)?;
            log::info!("Wrote {}", written.display());
        }
        None => {
            let bytes = renderer.to_bytes()?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }

    if let Err(e) = coordinator.reset() {
        log::warn!("{e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "gvrender",
            "graph.dot",
            "-f",
            "png",
            "-o",
            "out/graph",
            "--width",
            "300",
            "--scale",
            "2",
            "--layout",
            "neato",
            "--engine",
            "native,cmdline",
            "--y-invert",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("graph.dot")));
        assert_eq!(cli.kind, OutputKind::Png);
        assert_eq!(cli.width, Some(300));
        assert_eq!(cli.height, None);
        assert_eq!(cli.scale, 2.0);
        assert_eq!(cli.layout, Layout::Neato);
        assert_eq!(cli.engine, vec![EngineKind::Native, EngineKind::CommandLine]);
        assert!(cli.y_invert);
        assert_eq!(cli.log_level, Some(log::LevelFilter::Debug));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["gvrender"]).unwrap();
        assert_eq!(cli.kind, OutputKind::Svg);
        assert_eq!(cli.layout, Layout::Dot);
        assert!(cli.engine.is_empty());
        assert_eq!(cli.font_adjust, 1.0);
    }

    #[test]
    fn test_rejects_bad_log_level() {
        assert!(Cli::try_parse_from(["gvrender", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["gvrender", "-f", "gif"]).is_err());
    }
}
