/// Class hierarchy linking.
///
/// This module computes, for every class-like in the database, two things
/// the queries need: the linearized ancestor list and the merged member
/// view.  Both are computed once after the join and stored.
///
/// Ancestor order follows the declarations: a class-like's interfaces
/// (each expanded depth-first) come before its parent class chain.
///
/// Member precedence is PHP's:
///
///   class own > traits > parent chain > interfaces
///
/// A member already present is never replaced by a farther one.  When two
/// unrelated interfaces supply incompatible declarations of the same member
/// the first one in lookup order is kept and an `AmbiguousMember` warning is
/// recorded.
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::types::{ClassKind, MemberKey, Symbol, SymbolId, Visibility};

use super::{MemberSlot, SymbolDatabase, class_key};

/// Longest `extends`/`implements`/`use` chain followed.
const MAX_DEPTH: usize = 20;

pub(super) fn link(db: &mut SymbolDatabase) {
    let classes: Vec<SymbolId> = db
        .classes()
        .into_iter()
        .filter_map(|class| db.index.classes.get(&ustr::ustr(&class_key(&class.name))))
        .map(|entry| entry.preferred)
        .collect();

    let mut diagnostics = Vec::new();
    let mut reported_cycles = BTreeSet::new();
    let mut ancestors = BTreeMap::new();
    for id in &classes {
        let Some(class) = db.symbol(*id) else {
            continue;
        };
        let list = linearize(db, class, &mut reported_cycles, &mut diagnostics);
        ancestors.insert(class_key(&class.name), list);
    }
    db.ancestors = ancestors;

    let mut members = BTreeMap::new();
    for id in &classes {
        let Some(class) = db.symbol(*id) else {
            continue;
        };
        let merged = MemberMerge::new(db, &mut diagnostics).run(*id, class);
        members.insert(class_key(&class.name), merged);
    }
    db.members = members;

    for d in diagnostics {
        db.diagnostics.push(d);
    }
}

// ─── Ancestors ──────────────────────────────────────────────────────────

/// Depth-first preorder over capability edges, interfaces before the
/// parent.  Edges that close a cycle are dropped and reported once.
fn linearize(
    db: &SymbolDatabase,
    class: &Symbol,
    reported: &mut BTreeSet<(String, String)>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    seen.insert(class_key(&class.name));
    let mut stack = vec![class_key(&class.name)];
    visit(db, class, 0, &mut stack, &mut seen, &mut out, reported, diagnostics);
    out
}

#[allow(clippy::too_many_arguments)]
fn visit(
    db: &SymbolDatabase,
    class: &Symbol,
    depth: usize,
    stack: &mut Vec<String>,
    seen: &mut HashSet<String>,
    out: &mut Vec<String>,
    reported: &mut BTreeSet<(String, String)>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if depth >= MAX_DEPTH {
        return;
    }
    let Some(shape) = &class.class else {
        return;
    };
    for edge in shape.edges() {
        let key = class_key(edge);
        if stack.contains(&key) {
            if reported.insert((class_key(&class.name), key)) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::InheritanceCycle,
                        format!("`{}` -> `{edge}` closes an inheritance cycle; edge ignored", class.name),
                    )
                    .at(&class.location.file, class.location.offset)
                    .for_symbol(&class.name),
                );
            }
            continue;
        }
        if !seen.insert(key.clone()) {
            continue;
        }
        let target = db.lookup_class(edge);
        // Named even when missing, so subtype checks still see the edge.
        out.push(target.map_or_else(|| edge.to_string(), |t| t.name.clone()));
        match target {
            Some(target) => {
                stack.push(key);
                visit(db, target, depth + 1, stack, seen, out, reported, diagnostics);
                stack.pop();
            }
            None if depth == 0 => diagnostics.push(unknown_ancestor(class, edge)),
            None => {}
        }
    }
}

fn unknown_ancestor(class: &Symbol, target: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::UnknownAncestor,
        format!("`{}` refers to `{target}`, which is not in the bundle", class.name),
    )
    .at(&class.location.file, class.location.offset)
    .for_symbol(&class.name)
}

// ─── Members ────────────────────────────────────────────────────────────

struct MemberMerge<'a> {
    db: &'a SymbolDatabase,
    diagnostics: &'a mut Vec<Diagnostic>,
    slots: Vec<MemberSlot>,
    taken: BTreeMap<MemberKey, usize>,
}

impl<'a> MemberMerge<'a> {
    fn new(db: &'a SymbolDatabase, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        MemberMerge {
            db,
            diagnostics,
            slots: Vec::new(),
            taken: BTreeMap::new(),
        }
    }

    fn run(mut self, id: SymbolId, class: &Symbol) -> Vec<MemberSlot> {
        // 1. Own members, redeclarations resolved by policy.
        self.add_own(id, class, true, true);

        // 2. Trait members count as the class's own, private included.
        let mut trait_seen = HashSet::new();
        self.add_traits(class, 0, true, &mut trait_seen);

        // 3. Ancestors, nearest first.  The parent is queued before the
        //    interfaces so the class chain shadows interface declarations.
        let mut queue: VecDeque<(&Symbol, usize)> = VecDeque::new();
        let mut seen = HashSet::new();
        seen.insert(class_key(&class.name));
        self.enqueue(class, 1, &mut queue, &mut seen);
        while let Some((ancestor, depth)) = queue.pop_front() {
            let Some(ancestor_id) = self.id_of(ancestor) else {
                continue;
            };
            self.add_own(ancestor_id, ancestor, false, false);
            self.add_traits(ancestor, 0, false, &mut trait_seen);
            if depth < MAX_DEPTH {
                self.enqueue(ancestor, depth + 1, &mut queue, &mut seen);
            }
        }
        self.slots
    }

    fn id_of(&self, class: &Symbol) -> Option<SymbolId> {
        self.db
            .index
            .classes
            .get(&ustr::ustr(&class_key(&class.name)))
            .map(|e| e.preferred)
    }

    fn enqueue(
        &self,
        class: &Symbol,
        depth: usize,
        queue: &mut VecDeque<(&'a Symbol, usize)>,
        seen: &mut HashSet<String>,
    ) {
        let Some(shape) = &class.class else {
            return;
        };
        let edges = shape.parent.iter().chain(&shape.interfaces);
        for edge in edges {
            if !seen.insert(class_key(edge)) {
                continue;
            }
            if let Some(target) = self.db.lookup_class(edge) {
                queue.push_back((target, depth));
            }
        }
    }

    /// Members declared directly in `owner`.  `report` records shadowed
    /// redeclarations; they are reported once, for the declaring class.
    fn add_own(&mut self, owner_id: SymbolId, owner: &Symbol, include_private: bool, report: bool) {
        let Some(shape) = &owner.class else {
            return;
        };
        let mut done: HashSet<MemberKey> = HashSet::new();
        for member in &shape.members {
            let key = member.member_key();
            if !done.insert(key.clone()) {
                continue;
            }
            let positions: Vec<usize> = shape
                .members
                .iter()
                .enumerate()
                .filter(|(_, m)| m.member_key() == key)
                .map(|(i, _)| i)
                .collect();
            let candidates: Vec<&Symbol> = positions.iter().map(|i| &shape.members[*i]).collect();
            let chosen = positions[self.db.policy.choose(&candidates)];
            let chosen_member = &shape.members[chosen];

            if report && positions.len() > 1 {
                for &i in positions.iter().filter(|i| **i != chosen) {
                    let shadowed = &shape.members[i];
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::Redeclaration,
                            format!(
                                "{} `{}` is declared {} times; using the one at offset {}",
                                shadowed.kind,
                                shadowed.qualified_name(),
                                positions.len(),
                                chosen_member.location.offset
                            ),
                        )
                        .at(&shadowed.location.file, shadowed.location.offset)
                        .for_symbol(shadowed.qualified_name()),
                    );
                }
            }

            if !include_private && chosen_member.visibility == Visibility::Private {
                continue;
            }
            let slot = MemberSlot {
                owner: owner_id,
                member: chosen as u32,
            };
            self.offer(key, slot, owner);
        }
    }

    fn add_traits(
        &mut self,
        class: &Symbol,
        depth: usize,
        include_private: bool,
        seen: &mut HashSet<String>,
    ) {
        if depth >= MAX_DEPTH {
            return;
        }
        let Some(shape) = &class.class else {
            return;
        };
        for name in &shape.traits {
            let Some(used) = self.db.lookup_class(name) else {
                if include_private && depth == 0 {
                    self.diagnostics.push(unknown_ancestor(class, name));
                }
                continue;
            };
            // A trait used by several classes of one chain contributes once.
            if !seen.insert(class_key(&used.name)) {
                continue;
            }
            if let Some(id) = self.id_of(used) {
                self.add_own(id, used, include_private, false);
            }
            self.add_traits(used, depth + 1, include_private, seen);
        }
    }

    /// Add `slot` unless `key` is already taken, checking interface
    /// diamonds on the way.
    fn offer(&mut self, key: MemberKey, slot: MemberSlot, owner: &Symbol) {
        let Some(existing) = self.taken.get(&key).copied() else {
            self.taken.insert(key, self.slots.len());
            self.slots.push(slot);
            return;
        };
        let existing = self.slots[existing];
        let (Some(kept_owner), Some(kept), Some(offered)) = (
            self.db.symbol(existing.owner),
            self.db.slot(existing),
            self.db.slot(slot),
        ) else {
            return;
        };
        let from_interfaces = is_interface(kept_owner) && is_interface(owner);
        let related = self.db.is_subtype_of(&kept_owner.name, &owner.name)
            || self.db.is_subtype_of(&owner.name, &kept_owner.name);
        if from_interfaces && !related && incompatible(kept, offered) {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::AmbiguousMember,
                    format!(
                        "{} `{}` is inherited from both `{}` and `{}` with incompatible declarations; using `{}`",
                        kept.kind, kept.name, kept_owner.name, owner.name, kept_owner.name
                    ),
                )
                .at(&offered.location.file, offered.location.offset)
                .for_symbol(offered.qualified_name()),
            );
        }
    }
}

fn is_interface(class: &Symbol) -> bool {
    class.class.as_ref().is_some_and(|s| s.kind == ClassKind::Interface)
}

fn incompatible(a: &Symbol, b: &Symbol) -> bool {
    if a.kind != b.kind {
        return true;
    }
    match (&a.signature, &b.signature) {
        (Some(x), Some(y)) => {
            x.params.len() != y.params.len()
                || x.return_type != y.return_type
                || x.by_ref_return != y.by_ref_return
                || x.params.iter().zip(&y.params).any(|(p, q)| p.by_ref != q.by_ref)
        }
        (None, None) => a.value != b.value || a.ty != b.ty,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use crate::DiagnosticKind;
    use crate::resolver::StubResolver;

    #[test]
    fn interfaces_come_before_the_parent_chain() {
        let resolver = StubResolver::from_php(concat!(
            "<?php\n",
            "interface J {}\n",
            "interface I extends J {}\n",
            "interface K {}\n",
            "class B implements K {}\n",
            "class A extends B implements I {}\n",
        ));
        assert_eq!(resolver.ancestors("A"), vec!["I", "J", "B", "K"]);
    }

    #[test]
    fn cycles_are_cut_and_reported_once() {
        let resolver = StubResolver::from_php(concat!(
            "<?php\n",
            "class A extends B {}\n",
            "class B extends A {}\n",
        ));
        assert_eq!(resolver.ancestors("A"), vec!["B"]);
        assert_eq!(resolver.ancestors("B"), vec!["A"]);
        let cycles = resolver
            .diagnostics()
            .of_kind(DiagnosticKind::InheritanceCycle)
            .count();
        assert_eq!(cycles, 2);
    }

    #[test]
    fn private_members_are_not_inherited_but_trait_privates_are() {
        let resolver = StubResolver::from_php(concat!(
            "<?php\n",
            "trait T { private function fromTrait() {} }\n",
            "class P { private function hidden() {} protected function shown() {} }\n",
            "class C extends P { use T; }\n",
        ));
        let names: Vec<String> = resolver.members("C").iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["fromTrait", "shown"]);
    }
}
