//! The symbol database.
//!
//! Built once from a bundle and immutable afterwards.  It indexes every
//! top-level symbol by fully-qualified name, keeps all redeclarations of a
//! name (one of them preferred according to the [`RedeclarationPolicy`]),
//! and stores the linearized ancestor list and the inheritance-merged
//! member view of every class-like.
//!
//! Only ordered containers are serialized.  The name index is rebuilt
//! from the symbol table after deserialization.
//!
//! # Submodules
//!
//! - [`builder`]: the single-threaded join phase and post-join passes.
//! - [`inheritance`]: ancestor linearization and member merging.
//! - [`cache`]: the on-disk serialized form.

pub(crate) mod builder;
pub mod cache;
mod inheritance;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use ustr::{Ustr, ustr};

use crate::bundle::BundleInfo;
use crate::diagnostics::Diagnostics;
use crate::type_expr::TypeExpr;
use crate::types::{MemberKey, Symbol, SymbolId, SymbolKind, member_key};

pub(crate) use builder::DatabaseBuilder;

/// Which declaration wins when a name is declared more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedeclarationPolicy {
    /// The declaration from the latest file (then the latest offset).
    #[default]
    LastWins,
    /// The declaration carrying the most type information; ties go to the
    /// latest one.
    MostSpecific,
}

impl RedeclarationPolicy {
    /// Index of the preferred candidate.  `candidates` are in join order.
    pub(crate) fn choose(self, candidates: &[&Symbol]) -> usize {
        match self {
            RedeclarationPolicy::LastWins => candidates.len().saturating_sub(1),
            RedeclarationPolicy::MostSpecific => candidates
                .iter()
                .enumerate()
                .max_by_key(|(_, s)| specificity(s))
                .map_or(0, |(i, _)| i),
        }
    }
}

/// How much a declaration says: typed slots, then `#[TentativeType]`.
fn specificity(symbol: &Symbol) -> (usize, bool) {
    let typed = |t: &TypeExpr| !t.is_mixed();
    let slots = match (&symbol.signature, &symbol.class) {
        (Some(sig), _) => {
            sig.params.iter().filter(|p| typed(&p.ty)).count()
                + usize::from(typed(&sig.return_type))
                + sig.templates.len()
        }
        (None, Some(shape)) => shape.members.len() + shape.templates.len(),
        (None, None) => {
            usize::from(symbol.ty.as_ref().is_some_and(typed)) + usize::from(symbol.value.is_some())
        }
    };
    (slots, symbol.modifiers.tentative_type)
}

/// A member in the merged view: the declaring class-like's symbol and
/// the member's position among its own members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberSlot {
    pub owner: SymbolId,
    pub member: u32,
}

/// All declarations of one name, in join order.
#[derive(Debug, Clone)]
struct NameEntry {
    all: Vec<SymbolId>,
    preferred: SymbolId,
}

#[derive(Debug, Clone, Default)]
struct NameIndex {
    /// Lowercased names.
    classes: HashMap<Ustr, NameEntry>,
    /// Lowercased names.
    functions: HashMap<Ustr, NameEntry>,
    /// Exact names.
    constants: HashMap<Ustr, NameEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolDatabase {
    bundle: BundleInfo,
    policy: RedeclarationPolicy,
    /// Every top-level symbol, redeclarations included, in join order.
    symbols: Vec<Symbol>,
    /// Lowercased class name → linearized ancestors.
    ancestors: BTreeMap<String, Vec<String>>,
    /// Lowercased class name → merged members, one per member key.
    members: BTreeMap<String, Vec<MemberSlot>>,
    diagnostics: Diagnostics,
    #[serde(skip)]
    index: NameIndex,
}

fn strip(name: &str) -> &str {
    name.trim().trim_start_matches('\\')
}

pub(crate) fn class_key(name: &str) -> String {
    strip(name).to_ascii_lowercase()
}

impl SymbolDatabase {
    pub(crate) fn new(
        bundle: BundleInfo,
        policy: RedeclarationPolicy,
        symbols: Vec<Symbol>,
        diagnostics: Diagnostics,
    ) -> Self {
        let mut db = SymbolDatabase {
            bundle,
            policy,
            symbols,
            ancestors: BTreeMap::new(),
            members: BTreeMap::new(),
            diagnostics,
            index: NameIndex::default(),
        };
        db.rebuild_index();
        db
    }

    /// Recompute the name index from the symbol table.
    pub(crate) fn rebuild_index(&mut self) {
        let mut groups: [HashMap<Ustr, Vec<SymbolId>>; 3] = Default::default();
        for (i, symbol) in self.symbols.iter().enumerate() {
            let id = SymbolId(u32::try_from(i).unwrap_or(u32::MAX));
            let (slot, key) = match symbol.kind {
                k if k.is_class_like() => (0, class_key(&symbol.name)),
                SymbolKind::Function => (1, class_key(&symbol.name)),
                _ => (2, strip(&symbol.name).to_string()),
            };
            groups[slot].entry(ustr(&key)).or_default().push(id);
        }

        let policy = self.policy;
        let symbols = &self.symbols;
        let finish = |group: HashMap<Ustr, Vec<SymbolId>>| {
            group
                .into_iter()
                .map(|(key, all)| {
                    let candidates: Vec<&Symbol> = all.iter().map(|id| &symbols[id.index()]).collect();
                    let preferred = all[policy.choose(&candidates)];
                    (key, NameEntry { all, preferred })
                })
                .collect::<HashMap<_, _>>()
        };
        let [classes, functions, constants] = groups;
        self.index = NameIndex {
            classes: finish(classes),
            functions: finish(functions),
            constants: finish(constants),
        };
    }

    pub fn bundle(&self) -> &BundleInfo {
        &self.bundle
    }

    pub fn policy(&self) -> RedeclarationPolicy {
        self.policy
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Every top-level declaration, redeclarations included.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn is_preferred(&self, id: SymbolId) -> bool {
        let Some(symbol) = self.symbol(id) else {
            return false;
        };
        self.entry_for(symbol).is_some_and(|e| e.preferred == id)
    }

    fn entry_for(&self, symbol: &Symbol) -> Option<&NameEntry> {
        match symbol.kind {
            k if k.is_class_like() => self.index.classes.get(&ustr(&class_key(&symbol.name))),
            SymbolKind::Function => self.index.functions.get(&ustr(&class_key(&symbol.name))),
            _ => self.index.constants.get(&ustr(strip(&symbol.name))),
        }
    }

    fn preferred_of(&self, ids: &[SymbolId]) -> impl Iterator<Item = &Symbol> {
        ids.iter()
            .filter(|id| self.is_preferred(**id))
            .filter_map(|id| self.symbol(*id))
    }

    fn ids_of_kind(&self, pred: impl Fn(SymbolKind) -> bool) -> Vec<SymbolId> {
        self.symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| pred(s.kind))
            .map(|(i, _)| SymbolId(i as u32))
            .collect()
    }

    /// Preferred free functions, in join order.
    pub fn functions(&self) -> Vec<&Symbol> {
        let ids = self.ids_of_kind(|k| k == SymbolKind::Function);
        self.preferred_of(&ids).collect()
    }

    /// Preferred class-likes, in join order.
    pub fn classes(&self) -> Vec<&Symbol> {
        let ids = self.ids_of_kind(SymbolKind::is_class_like);
        self.preferred_of(&ids).collect()
    }

    /// Preferred global constants, in join order.
    pub fn constants(&self) -> Vec<&Symbol> {
        let ids = self.ids_of_kind(|k| k == SymbolKind::GlobalConstant);
        self.preferred_of(&ids).collect()
    }

    // ─── Lookup ─────────────────────────────────────────────────────────

    pub fn lookup_class(&self, name: &str) -> Option<&Symbol> {
        let entry = self.index.classes.get(&ustr(&class_key(name)))?;
        self.symbol(entry.preferred)
    }

    pub fn lookup_function(&self, name: &str) -> Option<&Symbol> {
        let entry = self.index.functions.get(&ustr(&class_key(name)))?;
        self.symbol(entry.preferred)
    }

    pub fn lookup_constant(&self, name: &str) -> Option<&Symbol> {
        let entry = self.index.constants.get(&ustr(strip(name)))?;
        self.symbol(entry.preferred)
    }

    /// Look a fully-qualified name up.  `Class::member` finds a member in
    /// the merged view; other names are tried as a class-like, a function
    /// and a constant, in that order.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        if let Some((class, member)) = strip(name).split_once("::") {
            return self.member(class, member);
        }
        self.lookup_class(name)
            .or_else(|| self.lookup_function(name))
            .or_else(|| self.lookup_constant(name))
    }

    /// Resolve a name as written inside `namespace`.  Unqualified function
    /// and constant names fall back to the global namespace, as PHP does;
    /// class names do not.
    pub fn lookup_in_namespace(&self, name: &str, namespace: Option<&str>) -> Option<&Symbol> {
        let namespace = namespace.map(strip).filter(|ns| !ns.is_empty());
        let (Some(ns), false) = (namespace, name.starts_with('\\')) else {
            return self.lookup(name);
        };
        let qualified = format!("{ns}\\{name}");
        if let Some(found) = self.lookup(&qualified) {
            return Some(found);
        }
        if name.contains('\\') || name.contains("::") {
            return None;
        }
        self.lookup_function(name)
            .or_else(|| self.lookup_constant(name))
    }

    /// Every declaration of `name`, in join order.
    pub fn overloads(&self, name: &str) -> Vec<&Symbol> {
        if let Some((class, member)) = strip(name).split_once("::") {
            return self.member_overloads(class, member);
        }
        let key = ustr(&class_key(name));
        let entry = self
            .index
            .classes
            .get(&key)
            .or_else(|| self.index.functions.get(&key))
            .or_else(|| self.index.constants.get(&ustr(strip(name))));
        entry
            .map(|e| e.all.iter().filter_map(|id| self.symbol(*id)).collect())
            .unwrap_or_default()
    }

    /// The declaration of `name` to use for a call with `arity` arguments:
    /// the preferred one if it accepts that many, else the latest one that
    /// does, else the preferred one.
    pub fn lookup_overload(&self, name: &str, arity: usize) -> Option<&Symbol> {
        let preferred = self.lookup(name)?;
        if !preferred.kind.is_callable() || preferred.accepts_arity(arity) {
            return Some(preferred);
        }
        self.overloads(name)
            .into_iter()
            .rev()
            .find(|s| s.accepts_arity(arity))
            .or(Some(preferred))
    }

    // ─── Class hierarchy ────────────────────────────────────────────────

    /// Ancestors in lookup order: for every class-like, its interfaces
    /// (recursively, depth-first) before its parent class chain.
    pub fn ancestors_of(&self, class: &str) -> &[String] {
        self.ancestors
            .get(&class_key(class))
            .map_or(&[], Vec::as_slice)
    }

    /// Whether `class` is `ancestor` or has it among its ancestors.
    pub fn is_subtype_of(&self, class: &str, ancestor: &str) -> bool {
        let target = class_key(ancestor);
        class_key(class) == target
            || self
                .ancestors_of(class)
                .iter()
                .any(|a| class_key(a) == target)
    }

    pub(crate) fn slot(&self, slot: MemberSlot) -> Option<&Symbol> {
        self.symbol(slot.owner)?
            .class
            .as_ref()?
            .members
            .get(slot.member as usize)
    }

    /// Effective members of a class-like: own and trait members first,
    /// then inherited ones, nearer declarations shadowing farther ones.
    pub fn members_of(&self, class: &str) -> Vec<&Symbol> {
        self.members
            .get(&class_key(class))
            .map(|slots| slots.iter().filter_map(|s| self.slot(*s)).collect())
            .unwrap_or_default()
    }

    pub fn member_by_key(&self, class: &str, key: &MemberKey) -> Option<&Symbol> {
        self.members
            .get(&class_key(class))?
            .iter()
            .filter_map(|s| self.slot(*s))
            .find(|m| m.member_key() == *key)
    }

    /// A member by name: a method, else a constant or enum case, else a
    /// property (`$name` or `name`).
    pub fn member(&self, class: &str, name: &str) -> Option<&Symbol> {
        if let Some(property) = name.strip_prefix('$') {
            return self.member_by_key(class, &member_key(SymbolKind::Property, property));
        }
        self.member_by_key(class, &member_key(SymbolKind::Method, name))
            .or_else(|| self.member_by_key(class, &member_key(SymbolKind::ClassConstant, name)))
            .or_else(|| self.member_by_key(class, &member_key(SymbolKind::Property, name)))
    }

    /// All own declarations of the member that `class::name` resolves to.
    fn member_overloads(&self, class: &str, name: &str) -> Vec<&Symbol> {
        let Some(found) = self.member(class, name) else {
            return Vec::new();
        };
        let key = found.member_key();
        let Some(owner) = found
            .declaring_class
            .as_deref()
            .and_then(|c| self.lookup_class(c))
            .and_then(|s| s.class.as_ref())
        else {
            return vec![found];
        };
        owner
            .members
            .iter()
            .filter(|m| m.member_key() == key)
            .collect()
    }

    /// Constants (and enum cases) of `class` whose name matches `pattern`,
    /// where `*` matches any run of characters.
    pub fn constants_matching(&self, class: &str, pattern: &str) -> Vec<&Symbol> {
        self.members_of(class)
            .into_iter()
            .filter(|m| matches!(m.kind, SymbolKind::ClassConstant | SymbolKind::EnumCase))
            .filter(|m| wildcard_match(pattern, &m.name))
            .collect()
    }
}

/// Glob match with `*` as the only metacharacter.
pub(crate) fn wildcard_match(pattern: &str, name: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return pattern == name;
    };
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards() {
        assert!(wildcard_match("FIELD_*", "FIELD_ERA"));
        assert!(!wildcard_match("FIELD_*", "DOW_SUNDAY"));
        assert!(wildcard_match("FIELD", "FIELD"));
        assert!(wildcard_match("*_MODE", "FETCH_MODE"));
        assert!(wildcard_match("A*B*C", "AxxBxxC"));
        assert!(!wildcard_match("A*B*C", "AxxCxxB"));
    }
}
