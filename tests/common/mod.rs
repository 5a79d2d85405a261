#![allow(dead_code)]

use phpantom_stubs::parser::names::NameContext;
use phpantom_stubs::type_expr::{CompileContext, compile};
use phpantom_stubs::{
    CallSite, PhpVersion, RedeclarationPolicy, ResolverConfig, StubBundle, StubResolver, TypeExpr,
};

/// Defaults with the on-disk cache turned off.
pub fn uncached_config() -> ResolverConfig {
    let mut config = ResolverConfig::default();
    config.cache.enabled = false;
    config
}

pub fn bundle(files: &[(&str, &str)]) -> StubBundle {
    files
        .iter()
        .fold(StubBundle::new("test", "1", PhpVersion::default()), |bundle, (path, src)| {
            bundle.with_source(*path, *src)
        })
}

/// A resolver over one stub file, without caching.
pub fn resolver(src: &str) -> StubResolver {
    resolver_from_files(&[("stub.php", src)])
}

pub fn resolver_from_files(files: &[(&str, &str)]) -> StubResolver {
    StubResolver::from_bundle(&bundle(files), &uncached_config())
}

pub fn resolver_with_policy(files: &[(&str, &str)], policy: RedeclarationPolicy) -> StubResolver {
    let mut config = uncached_config();
    config.resolver.redeclaration = policy;
    StubResolver::from_bundle(&bundle(files), &config)
}

pub fn resolver_for_version(src: &str, version: PhpVersion) -> StubResolver {
    let bundle = StubBundle::new("test", "1", version).with_source("stub.php", src);
    StubResolver::from_bundle(&bundle, &uncached_config())
}

/// Compile type text in the global namespace.
pub fn ty(text: &str) -> TypeExpr {
    let names = NameContext::default();
    compile(text, &CompileContext::bare(&names)).expect("test type should compile")
}

/// The printed return type of calling `name` at `site`.
pub fn call(resolver: &StubResolver, name: &str, site: &CallSite) -> String {
    resolver
        .resolve_call(name, site)
        .unwrap_or_else(|err| panic!("resolving {name}: {err}"))
        .to_string()
}

/// The printed declared return type of `name`, before any call-site
/// instantiation.
pub fn declared_return(resolver: &StubResolver, name: &str) -> String {
    resolver
        .lookup_symbol(name)
        .and_then(|s| s.signature.as_ref())
        .map(|sig| sig.return_type.to_string())
        .unwrap_or_else(|| panic!("{name} should be a callable"))
}
