//! Namespace and `use` import tracking.
//!
//! Every declaration carries the [`NameContext`] that was active where it
//! was written, so docblock type names (which are plain text, not AST
//! nodes) can be resolved to fully-qualified names later.

use std::collections::BTreeMap;

use mago_syntax::ast::*;
use serde::{Deserialize, Serialize};

/// The namespace and class imports in effect at a point in a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameContext {
    /// Current namespace without leading or trailing `\`.  `None` for the
    /// global namespace.
    pub namespace: Option<String>,
    /// Lowercased alias → fully-qualified class name.
    pub uses: BTreeMap<String, String>,
}

impl NameContext {
    pub fn new(namespace: Option<String>) -> Self {
        NameContext {
            namespace: namespace.filter(|ns| !ns.is_empty()),
            uses: BTreeMap::new(),
        }
    }

    /// Resolve a class reference written in this context.
    ///
    /// - `\Foo\Bar` is already fully qualified.
    /// - `Alias\Rest` expands the imported `Alias`.
    /// - Anything else is relative to the current namespace.
    pub fn resolve_class(&self, name: &str) -> String {
        if let Some(fq) = name.strip_prefix('\\') {
            return fq.to_string();
        }
        if let Some(rest) = name.strip_prefix("namespace\\") {
            return self.qualify(rest);
        }
        let (first, tail) = match name.split_once('\\') {
            Some((first, tail)) => (first, Some(tail)),
            None => (name, None),
        };
        if let Some(imported) = self.uses.get(&first.to_ascii_lowercase()) {
            return match tail {
                Some(tail) => format!("{imported}\\{tail}"),
                None => imported.clone(),
            };
        }
        self.qualify(name)
    }

    /// Prefix a declared short name with the current namespace.
    pub fn qualify(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}\\{name}"),
            None => name.to_string(),
        }
    }

    /// Record the class imports of a `use` statement.  Function and
    /// constant imports do not affect type names and are skipped.
    pub(crate) fn add_use_items(&mut self, items: &UseItems) {
        match items {
            UseItems::Sequence(seq) => {
                for item in seq.items.iter() {
                    self.register(item, None);
                }
            }
            UseItems::TypedSequence(seq) => {
                if seq.r#type.is_function() || seq.r#type.is_const() {
                    return;
                }
                for item in seq.items.iter() {
                    self.register(item, None);
                }
            }
            UseItems::TypedList(list) => {
                if list.r#type.is_function() || list.r#type.is_const() {
                    return;
                }
                let prefix = list.namespace.value();
                for item in list.items.iter() {
                    self.register(item, Some(prefix));
                }
            }
            UseItems::MixedList(list) => {
                let prefix = list.namespace.value();
                for maybe_typed in list.items.iter() {
                    if let Some(ref t) = maybe_typed.r#type
                        && (t.is_function() || t.is_const())
                    {
                        continue;
                    }
                    self.register(&maybe_typed.item, Some(prefix));
                }
            }
        }
    }

    fn register(&mut self, item: &UseItem, group_prefix: Option<&str>) {
        let item_name = item.name.value();
        let fqn = match group_prefix {
            Some(prefix) => format!("{}\\{}", prefix.trim_matches('\\'), item_name),
            None => item_name.trim_start_matches('\\').to_string(),
        };
        let alias = match item.alias {
            Some(ref alias) => alias.identifier.value.to_string(),
            None => short_name(&fqn).to_string(),
        };
        self.uses.insert(alias.to_ascii_lowercase(), fqn);
    }
}

/// The last `\`-separated segment of a name.
pub fn short_name(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_to_namespace() {
        let ctx = NameContext::new(Some("Dom".into()));
        assert_eq!(ctx.resolve_class("Node"), "Dom\\Node");
        assert_eq!(ctx.resolve_class("\\DOMNode"), "DOMNode");
    }

    #[test]
    fn resolves_through_imports_case_insensitively() {
        let mut ctx = NameContext::new(Some("App".into()));
        ctx.uses
            .insert("jetbrains".into(), "JetBrains\\PhpStorm".into());
        assert_eq!(
            ctx.resolve_class("JETBRAINS\\Internal\\TentativeType"),
            "JetBrains\\PhpStorm\\Internal\\TentativeType"
        );
    }

    #[test]
    fn short_name_takes_last_segment() {
        assert_eq!(short_name("A\\B\\C"), "C");
        assert_eq!(short_name("C"), "C");
    }
}
