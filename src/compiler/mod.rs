//! The markup compiler
//!
//! Ties the phases together: load markup through a [`MarkupLoader`], run
//! tokenizer, parser, resolver and the compiled emitter, chase master-page
//! references, and cache the result per file identity. One compiler
//! instance is shared by every request thread of a host.

pub mod cache;
pub mod config;
pub mod loader;

use std::sync::Arc;

use tracing::{debug, info};

use crate::emit::compiled::{CompiledArtifact, CompiledEmitter};
use crate::emit::interpreted::{ControlInstance, InterpretedEmitter};
use crate::emit::{EmitError, ViewEmitter};
use crate::metadata::ControlRegistry;
use crate::resolver::tree::ResolvedTree;
use crate::resolver::{ResolveError, Resolver};
use crate::util::diag::FileDiagnostics;
use crate::{parser, tokenizer};

use cache::ViewCache;
use loader::{FileIdentity, LoadError, LoadedMarkup, MarkupLoader};

/// Why a file failed to compile
#[derive(Debug, thiserror::Error)]
pub enum CompileErrorKind {
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Lexical or structural defects; the diagnostics list every one
    #[error("markup is malformed ({} errors)", .0.error_count())]
    Markup(FileDiagnostics),
    #[error("{source}")]
    Resolve {
        source: ResolveError,
        diagnostics: FileDiagnostics,
    },
    #[error(transparent)]
    Emit(#[from] EmitError),
    /// Master pages or markup-control references form a loop
    #[error("markup files form a cycle: {}", .chain.join(" -> "))]
    CyclicMasterPage { chain: Vec<String> },
}

/// A compile failure, tied to the file it happened in
#[derive(Debug, thiserror::Error)]
#[error("{file}: {kind}")]
pub struct CompileError {
    pub file: String,
    pub kind: CompileErrorKind,
}

impl CompileError {
    fn new(file: impl Into<String>, kind: impl Into<CompileErrorKind>) -> Self {
        Self {
            file: file.into(),
            kind: kind.into(),
        }
    }

    /// All diagnostics attached to this failure
    pub fn diagnostics(&self) -> Option<&FileDiagnostics> {
        match &self.kind {
            CompileErrorKind::Markup(diagnostics)
            | CompileErrorKind::Resolve { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

/// A successfully compiled markup file
#[derive(Debug)]
pub struct CompiledPage {
    /// Identity the compile was keyed on
    pub identity: FileIdentity,
    /// The resolved semantic tree
    pub tree: ResolvedTree,
    /// Builder routines lowered from the tree
    pub artifact: CompiledArtifact,
    /// Compiled master page, when the file declares one
    pub master: Option<Arc<CompiledPage>>,
    /// Compiled markup controls this page uses, one entry per distinct file
    pub dependencies: Vec<Arc<CompiledPage>>,
    /// Non-fatal findings
    pub warnings: FileDiagnostics,
}

impl CompiledPage {
    /// Materialize the instance graph from the builder routines
    pub fn instantiate(&self) -> Result<ControlInstance, EmitError> {
        self.artifact.instantiate()
    }
}

/// The compiler facade hosts hold on to
pub struct MarkupCompiler {
    registry: Arc<ControlRegistry>,
    loader: Arc<dyn MarkupLoader>,
    cache: ViewCache<CompiledPage>,
}

impl MarkupCompiler {
    pub fn new(registry: Arc<ControlRegistry>, loader: Arc<dyn MarkupLoader>) -> Self {
        Self {
            registry,
            loader,
            cache: ViewCache::new(),
        }
    }

    #[inline]
    pub fn registry(&self) -> &ControlRegistry {
        &self.registry
    }

    /// Compile a markup file, or return the cached artifact if the file has
    /// not changed since it was last compiled
    pub fn compile_file(&self, virtual_path: &str) -> Result<Arc<CompiledPage>, CompileError> {
        let mut chain = Vec::new();
        self.compile_inner(virtual_path, &mut chain)
    }

    /// Compile and immediately materialize the instance graph
    pub fn instantiate_file(&self, virtual_path: &str) -> Result<ControlInstance, CompileError> {
        let page = self.compile_file(virtual_path)?;
        page.instantiate()
            .map_err(|e| CompileError::new(virtual_path, e))
    }

    /// Drop all cached pages
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    fn compile_inner(
        &self,
        virtual_path: &str,
        chain: &mut Vec<String>,
    ) -> Result<Arc<CompiledPage>, CompileError> {
        if chain.iter().any(|p| p == virtual_path) {
            let mut cycle = chain.clone();
            cycle.push(virtual_path.to_string());
            return Err(CompileError::new(
                virtual_path,
                CompileErrorKind::CyclicMasterPage { chain: cycle },
            ));
        }

        let loaded = self
            .loader
            .load(virtual_path)
            .map_err(|e| CompileError::new(virtual_path, e))?;

        let slot = self.cache.slot(virtual_path, loaded.identity.modified);
        if let Some(page) = slot.get() {
            debug!(path = virtual_path, "serving compiled view from cache");
            return Ok(page.clone());
        }

        let LoadedMarkup { identity, source } = loaded;
        let path = identity.virtual_path.clone();
        info!(path = %path, "compiling markup file");

        let (resolved, warnings) = resolve_source(&source, &self.registry, &path)?;

        // master and markup-control references compile before this file's
        // cell is populated: a thread waiting on another file's cell while
        // holding its own open would deadlock two threads entering a cycle
        // from opposite ends
        chain.push(path.clone());
        let master = match &resolved.master_page {
            Some(master_path) => Some(self.compile_inner(master_path, chain)?),
            None => None,
        };

        // markup controls used by this page compile once through the same
        // cache instead of being re-parsed per use
        let mut dependency_paths: Vec<String> = Vec::new();
        resolved.root.walk(&mut |node| {
            if let Some(markup) = &node.metadata.markup_builder {
                if !dependency_paths.contains(markup) {
                    dependency_paths.push(markup.clone());
                }
            }
        });
        let mut dependencies = Vec::with_capacity(dependency_paths.len());
        for dependency in &dependency_paths {
            dependencies.push(self.compile_inner(dependency, chain)?);
        }
        chain.pop();

        // only the winning thread's page is installed; a thread that lost
        // the race gets the installed page and drops its own work
        slot.get_or_try_init(move || {
            let artifact = CompiledEmitter::new()
                .emit(&resolved)
                .map_err(|e| CompileError::new(&path, e))?;
            Ok(Arc::new(CompiledPage {
                identity,
                tree: resolved,
                artifact,
                master,
                dependencies,
                warnings,
            }))
        })
        .cloned()
    }
}

/// Parse and resolve one markup source, collecting non-fatal findings
fn resolve_source(
    source: &str,
    registry: &ControlRegistry,
    origin: &str,
) -> Result<(ResolvedTree, FileDiagnostics), CompileError> {
    let tokens = tokenizer::tokenize(source);
    let tree = parser::parse(&tokens);
    if tree.has_errors() {
        let mut diagnostics = FileDiagnostics::new(origin);
        diagnostics.extend(tree.all_diagnostics());
        return Err(CompileError::new(origin, CompileErrorKind::Markup(diagnostics)));
    }
    let mut resolver = Resolver::new(registry, origin);
    let resolved = resolver.resolve(&tree).map_err(|source| {
        let mut diagnostics = FileDiagnostics::new(origin);
        diagnostics.extend(resolver.take_diagnostics());
        CompileError::new(
            origin,
            CompileErrorKind::Resolve {
                source,
                diagnostics,
            },
        )
    })?;
    let mut warnings = FileDiagnostics::new(origin);
    warnings.extend(tree.all_diagnostics());
    warnings.extend(resolver.take_diagnostics());
    Ok((resolved, warnings))
}

/// Interpreted one-shot compilation without a compiler instance: parse,
/// resolve, and materialize in one call. Used by tools and tests that do
/// not need caching or master pages.
pub fn instantiate_source(
    source: &str,
    registry: &ControlRegistry,
    origin: &str,
) -> Result<ControlInstance, CompileError> {
    let (resolved, _) = resolve_source(source, registry, origin)?;
    InterpretedEmitter::new()
        .emit(&resolved)
        .map_err(|e| CompileError::new(origin, e))
}

#[cfg(test)]
mod tests;
