//! protoc-gen-optgen - Aggregate custom message options into template data
//!
//! Run by protoc as a plugin, it reads a `CodeGeneratorRequest` from stdin
//! and writes a `CodeGeneratorResponse` to stdout. Given `--descriptor-set`
//! it runs standalone on a `FileDescriptorSet` read from disk.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use optgen_core::{generate, plugin, GeneratedFile, Globals, OptionPath, Params, PoolRegistry};
use prost::Message;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// Aggregate custom message options into template data
#[derive(Parser, Debug)]
#[command(name = "protoc-gen-optgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serialized FileDescriptorSet to run on instead of a plugin request on stdin
    #[arg(short = 'd', long, requires_all = ["msgopt", "out"])]
    descriptor_set: Option<PathBuf>,

    #[command(flatten)]
    standalone: Standalone,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
struct Standalone {
    /// Message option path, e.g. `(my.pkg.config).tables`
    #[arg(long, requires = "descriptor_set")]
    msgopt: Option<String>,

    /// Name of the generated file
    #[arg(long, requires = "descriptor_set")]
    out: Option<String>,

    /// JSON file whose top-level object is added to the template data
    #[arg(long, requires = "descriptor_set")]
    extra: Option<PathBuf>,

    /// Built-in renderer
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Output directory for the generated file
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Print the generated file instead of writing it
    #[arg(long)]
    dry_run: bool,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

/// Built-in renderer for standalone mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Debug text form of the data tree
    Text,
}

impl From<OutputFormat> for optgen_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Self::Json,
            OutputFormat::Text => Self::Text,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout carries the plugin response
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.descriptor_set {
        Some(ref path) => run_standalone(&cli.standalone, path),
        None => run_plugin(),
    }
}

/// Plugin mode: request on stdin, response on stdout
fn run_plugin() -> Result<()> {
    let mut request = Vec::new();
    io::stdin()
        .read_to_end(&mut request)
        .context("read CodeGeneratorRequest")?;
    debug!("Read {} byte request", request.len());

    let response = plugin::run(&request, &Globals::new());

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&response.encode_to_vec())
        .context("write CodeGeneratorResponse")?;
    stdout.flush().context("write CodeGeneratorResponse")?;
    Ok(())
}

/// Standalone mode: descriptor set from disk, output to a file
fn run_standalone(args: &Standalone, descriptor_set: &Path) -> Result<()> {
    let file = generate_standalone(args, descriptor_set)?;
    if args.dry_run {
        println!("Would write: {}", args.output.join(&file.name).display());
        print!("{}", file.content);
        return Ok(());
    }

    let path = args.output.join(&file.name);
    write_output_file(&path, &file.content, args.force)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn generate_standalone(args: &Standalone, descriptor_set: &Path) -> Result<GeneratedFile> {
    let (Some(msgopt), Some(out)) = (&args.msgopt, &args.out) else {
        bail!("--msgopt and --out are required with --descriptor-set");
    };

    let bytes = fs::read(descriptor_set)
        .with_context(|| format!("Failed to read descriptor set: {}", descriptor_set.display()))?;
    let registry = PoolRegistry::decode(&bytes)
        .with_context(|| format!("Failed to load descriptor set: {}", descriptor_set.display()))?;

    let option_path = OptionPath::parse(msgopt)?;
    let mut params = Params::new(option_path, out.as_str()).with_format(args.format.into());
    if let Some(ref extra) = args.extra {
        params = params.with_extra(optgen_core::params::load_extra(extra)?);
    }

    Ok(generate(&registry, &params, &Globals::new())?)
}

/// Write the generated file, creating parent directories
fn write_output_file(output_path: &Path, content: &str, force: bool) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    fs::write(output_path, content)
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}
