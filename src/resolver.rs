//! The query API and the database lifecycle.
//!
//! [`StubResolver`] runs the load phase (parallel parse and lowering,
//! ordered join, cross-symbol passes) and answers queries against the
//! resulting immutable database.  It is cheap to clone: clones share the
//! database.
//!
//! [`ResolverHandle`] is the one piece of process-wide state.  Workers take
//! a snapshot and query it without locking; a bundle change builds a new
//! database off to the side and swaps it in atomically.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;

use crate::bundle::StubBundle;
use crate::config::ResolverConfig;
use crate::database::{DatabaseBuilder, SymbolDatabase, cache};
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, Diagnostics};
use crate::docblock::DocblockOptions;
use crate::effects;
use crate::error::Result;
use crate::evaluator::{self, CallSite, EvalError};
use crate::lower::{LoweredFile, lower_file};
use crate::parser::{ParseOptions, parse_stub_file};
use crate::type_expr::TypeExpr;
use crate::types::{EffectSet, Symbol, SymbolKind, member_key};

#[derive(Debug, Clone)]
pub struct StubResolver {
    db: Arc<SymbolDatabase>,
}

impl StubResolver {
    /// Read the configured bundle from `base_dir` and build (or load from
    /// cache) its database.
    pub fn build(config: &ResolverConfig, base_dir: &Path) -> Result<Self> {
        let bundle = StubBundle::from_config(&config.bundle, base_dir)?;
        Ok(Self::from_bundle(&bundle, config))
    }

    /// Build from an in-memory bundle.  Cache problems are logged and
    /// otherwise ignored.
    pub fn from_bundle(bundle: &StubBundle, config: &ResolverConfig) -> Self {
        let content_hash = bundle.content_hash(&config.cache_salt());
        let cache_dir = config.cache.resolved_dir();

        if let Some(dir) = &cache_dir {
            match cache::load(dir, &content_hash) {
                Ok(Some(db)) => return Self::from_database(db),
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "ignoring unusable cache entry"),
            }
        }

        let db = build_database(bundle, config, content_hash);
        if let Some(dir) = &cache_dir
            && let Err(err) = cache::store(dir, &db)
        {
            tracing::warn!(error = %err, "could not write database cache");
        }
        Self::from_database(db)
    }

    pub fn from_database(db: SymbolDatabase) -> Self {
        StubResolver { db: Arc::new(db) }
    }

    /// Build from a single PHP source, without caching.
    #[cfg(test)]
    pub(crate) fn from_php(src: &str) -> Self {
        let bundle = StubBundle::new("test", "0", crate::PhpVersion::default()).with_source("stub.php", src);
        let mut config = ResolverConfig::default();
        config.cache.enabled = false;
        Self::from_bundle(&bundle, &config)
    }

    pub fn database(&self) -> &Arc<SymbolDatabase> {
        &self.db
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.db.diagnostics()
    }

    // ─── Queries ────────────────────────────────────────────────────────

    pub fn lookup_symbol(&self, name: &str) -> Option<&Symbol> {
        self.db.lookup(name)
    }

    /// The callee a call reaches.  With a receiver, a bare method name is a
    /// method of the receiver's class; a global function of the same name
    /// is only reached when the class has no such method.  Otherwise `name`
    /// itself, choosing among redeclarations by argument count.
    fn callee(&self, name: &str, site: &CallSite) -> Result<&Symbol, EvalError> {
        if !name.contains("::")
            && let Some(class) = site.receiver.as_ref().and_then(receiver_class)
            && let Some(found) = self.db.member_by_key(class, &member_key(SymbolKind::Method, name))
        {
            return Ok(found);
        }
        self.db
            .lookup_overload(name, site.args.len())
            .ok_or_else(|| EvalError::UnknownSymbol(name.to_string()))
    }

    /// The concrete return type of calling `name` at `site`.
    pub fn resolve_call(&self, name: &str, site: &CallSite) -> Result<TypeExpr, EvalError> {
        let callee = self.callee(name, site)?;
        evaluator::evaluate(&self.db, callee, site)
    }

    /// The type parameter `index` holds after the call.
    pub fn resolve_param_out(
        &self,
        name: &str,
        site: &CallSite,
        index: usize,
    ) -> Result<Option<TypeExpr>, EvalError> {
        let callee = self.callee(name, site)?;
        evaluator::evaluate_param_out(&self.db, callee, site, index)
    }

    /// The type of `class::$property` read through `receiver`.
    pub fn resolve_property(
        &self,
        class: &str,
        property: &str,
        receiver: Option<&TypeExpr>,
    ) -> Result<TypeExpr, EvalError> {
        let found = self
            .db
            .member_by_key(class, &member_key(SymbolKind::Property, property))
            .ok_or_else(|| EvalError::UnknownSymbol(format!("{class}::${}", property.trim_start_matches('$'))))?;
        evaluator::evaluate_property(&self.db, found, receiver)
    }

    pub fn effects(&self, name: &str) -> Option<EffectSet> {
        effects::effects_by_name(&self.db, name)
    }

    pub fn members(&self, class: &str) -> Vec<&Symbol> {
        self.db.members_of(class)
    }

    pub fn ancestors(&self, class: &str) -> Vec<String> {
        self.db.ancestors_of(class).to_vec()
    }
}

fn receiver_class(receiver: &TypeExpr) -> Option<&str> {
    receiver.members().iter().find_map(|member| match member {
        TypeExpr::Named(named) | TypeExpr::Generic(named, _) if !named.is_keyword() => Some(named.name.as_str()),
        _ => None,
    })
}

/// Parse and lower every file in parallel, then join in bundle order.
fn build_database(bundle: &StubBundle, config: &ResolverConfig, content_hash: String) -> SymbolDatabase {
    let parse_options = ParseOptions {
        php_version: bundle.php_version,
    };
    let docblock_options = DocblockOptions {
        prefer_prefixed: config.resolver.prefer_prefixed_tags,
    };
    tracing::info!(
        bundle = %bundle.name,
        version = %bundle.version,
        files = bundle.sources.len(),
        "building symbol database"
    );

    let lowered: Vec<LoweredFile> = bundle
        .sources
        .par_iter()
        .map(|source| {
            let parsed = parse_stub_file(&source.path, &source.content, &parse_options);
            let mut file = lower_file(parsed, &docblock_options);
            if source.lossy {
                file.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::ParseError,
                        "file is not valid UTF-8; invalid bytes were replaced",
                    )
                    .at(&source.path, 0),
                );
            }
            for d in &file.diagnostics {
                diagnostics::emit(d);
            }
            file
        })
        .collect();

    let mut builder = DatabaseBuilder::new(bundle.info(content_hash), config.resolver.redeclaration);
    for file in lowered {
        builder.add_file(file);
    }
    builder.finish()
}

/// Shared, swappable access to the current database.
#[derive(Debug, Clone)]
pub struct ResolverHandle {
    current: Arc<RwLock<Arc<SymbolDatabase>>>,
}

impl ResolverHandle {
    pub fn new(resolver: &StubResolver) -> Self {
        ResolverHandle {
            current: Arc::new(RwLock::new(Arc::clone(&resolver.db))),
        }
    }

    /// A resolver over the current database.  It stays valid, and
    /// unchanged, across later swaps.
    pub fn snapshot(&self) -> StubResolver {
        StubResolver {
            db: Arc::clone(&self.current.read()),
        }
    }

    /// Replace the database; returns the previous one.
    pub fn swap(&self, next: StubResolver) -> Arc<SymbolDatabase> {
        let previous = std::mem::replace(&mut *self.current.write(), next.db);
        tracing::info!(
            from = %previous.bundle().content_hash,
            to = %self.current.read().bundle().content_hash,
            "symbol database swapped"
        );
        previous
    }

    /// Build a database for `bundle` and swap it in.
    pub fn reload(&self, bundle: &StubBundle, config: &ResolverConfig) -> Arc<SymbolDatabase> {
        self.swap(StubResolver::from_bundle(bundle, config))
    }
}
