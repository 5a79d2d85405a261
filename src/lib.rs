//! PHP stub signature resolver.
//!
//! Parses phpstorm-style PHP stub files (declarations with empty bodies,
//! annotated with PHPDoc, PHPStan and Psalm tags) into an immutable symbol
//! database, and evaluates the generic and conditional return types they
//! declare against concrete call sites.
//!
//! The load phase runs once per bundle:
//!
//! - [`parser`]: stub source → declaration trees (bodies discarded).
//! - [`docblock`]: docblock text → recognized tag values.
//! - [`type_expr`]: type text → [`TypeExpr`] with positional templates.
//! - [`database`]: lowered symbols joined in bundle order, ancestors
//!   linearized and members merged.
//!
//! Queries run against the built database from any number of threads:
//!
//! - [`evaluator`]: call-site instantiation of signature types.
//! - [`effects`]: declared purity and related facts.
//! - [`resolver`]: the query API and the swappable handle.
//!
//! Nothing in the load phase is fatal.  Bad input degrades the affected
//! symbol and leaves a [`Diagnostic`] on the database.

pub mod bundle;
pub mod config;
pub mod database;
pub mod declarations;
pub mod diagnostics;
pub mod docblock;
pub mod effects;
pub mod error;
pub mod evaluator;
pub mod logging;
mod lower;
pub mod parser;
pub mod php_version;
pub mod resolver;
pub mod type_expr;
pub mod types;

pub use bundle::{BundleInfo, StubBundle, StubSource};
pub use config::ResolverConfig;
pub use database::{RedeclarationPolicy, SymbolDatabase};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{Error, Result};
pub use evaluator::{ArgValue, CallArgument, CallSite, EvalError};
pub use php_version::PhpVersion;
pub use resolver::{ResolverHandle, StubResolver};
pub use type_expr::{LiteralValue, TypeExpr};
pub use types::{EffectSet, Signature, Symbol, SymbolKind};
