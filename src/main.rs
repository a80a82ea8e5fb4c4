//! Arbor markup compiler - CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use walkdir::WalkDir;

use arbor::compiler::config::MarkupConfig;
use arbor::compiler::loader::FsMarkupLoader;
use arbor::compiler::MarkupCompiler;
use arbor::metadata::{ControlRegistry, RegistryBuilder};
use arbor::util::logger;
use arbor::{MARKUP_EXTENSION, NAME, VERSION};

/// Compiles data-binding-aware markup into typed control trees
#[derive(Parser, Debug)]
#[command(name = "arbor")]
#[command(author = "Arbor Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Control set configuration (JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check markup files for errors without emitting anything
    Check {
        /// Markup file or directory to check
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Compile a markup file and print its builder routines
    Compile {
        /// Markup file to compile
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Write generated source to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        logger::init_with_level(logger::LogLevel::Debug);
    } else {
        logger::init();
    }

    let registry = Arc::new(load_registry(args.config.as_deref())?);

    match args.command {
        Commands::Check { path } => check(&path, registry)?,
        Commands::Compile { file, output } => compile(&file, output.as_deref(), registry)?,
        Commands::Version => println!("{} {}", NAME, VERSION),
    }

    Ok(())
}

fn load_registry(config: Option<&Path>) -> Result<ControlRegistry> {
    match config {
        Some(path) => {
            let config = MarkupConfig::from_file(path)
                .with_context(|| format!("failed to load config: {}", path.display()))?;
            Ok(config.build_registry())
        }
        None => Ok(RegistryBuilder::new().build()),
    }
}

fn check(path: &Path, registry: Arc<ControlRegistry>) -> Result<()> {
    let (root, files) = collect_markup_files(path)?;
    if files.is_empty() {
        bail!("no .{} files under {}", MARKUP_EXTENSION, path.display());
    }

    let compiler = MarkupCompiler::new(registry, Arc::new(FsMarkupLoader::new(&root)));
    let failures: Vec<String> = files
        .par_iter()
        .filter_map(|file| {
            compiler.compile_file(file).err().map(|error| {
                match error.diagnostics() {
                    Some(diagnostics) if !diagnostics.is_empty() => diagnostics.to_string(),
                    _ => format!("{}\n", error),
                }
            })
        })
        .collect();

    for failure in &failures {
        eprint!("{}", failure);
    }
    if failures.is_empty() {
        println!("All checks passed ({} files)", files.len());
        Ok(())
    } else {
        bail!("{} of {} files failed", failures.len(), files.len());
    }
}

fn compile(file: &Path, output: Option<&Path>, registry: Arc<ControlRegistry>) -> Result<()> {
    let root = file.parent().unwrap_or_else(|| Path::new("."));
    let name = file
        .file_name()
        .with_context(|| format!("not a file: {}", file.display()))?
        .to_string_lossy()
        .into_owned();

    let compiler = MarkupCompiler::new(registry, Arc::new(FsMarkupLoader::new(root)));
    let page = match compiler.compile_file(&name) {
        Ok(page) => page,
        Err(error) => {
            if let Some(diagnostics) = error.diagnostics() {
                eprint!("{}", diagnostics);
            }
            bail!("failed to compile {}", file.display());
        }
    };

    let source = page.artifact.generate_source();
    match output {
        Some(path) => std::fs::write(path, source)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => print!("{}", source),
    }
    Ok(())
}

/// Markup files under a path: a single file, or a directory walked
/// recursively. Returns the loader root and the virtual paths below it.
fn collect_markup_files(path: &Path) -> Result<(PathBuf, Vec<String>)> {
    if path.is_file() {
        let root = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let name = path
            .file_name()
            .with_context(|| format!("not a file: {}", path.display()))?
            .to_string_lossy()
            .into_owned();
        return Ok((root, vec![name]));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry.with_context(|| format!("cannot walk {}", path.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some(MARKUP_EXTENSION) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        files.push(relative);
    }
    files.sort();
    Ok((path.to_path_buf(), files))
}
