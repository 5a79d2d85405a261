//! Effect resolution.
//!
//! Effects are only ever what the stubs declare.  A method's effects are
//! those of the declaration that a call actually reaches: an inherited
//! method that is not overridden carries its ancestor's facts, while an
//! override carries only its own, even when the method it overrides is
//! `@pure`.

use crate::database::SymbolDatabase;
use crate::types::{EffectSet, Symbol};

/// The effects declared for `symbol`.  `pure` always implies
/// `mutation_free`.
pub fn effects_of(symbol: &Symbol) -> EffectSet {
    let mut effects = symbol.effects.clone();
    effects.mutation_free |= effects.pure;
    effects
}

/// Effects of the symbol `name` resolves to, `Class::method` included.
pub fn effects_by_name(db: &SymbolDatabase, name: &str) -> Option<EffectSet> {
    db.lookup(name).map(effects_of)
}

/// Whether a call may be made with named arguments.
pub fn accepts_named_arguments(symbol: &Symbol) -> bool {
    !symbol.effects.no_named_arguments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StubResolver;

    const STUB: &str = concat!(
        "<?php\n",
        "class Base {\n",
        "    /** @pure */\n",
        "    public function a(): int {}\n",
        "    /** @pure */\n",
        "    public function b(): int {}\n",
        "}\n",
        "class Child extends Base {\n",
        "    public function b(): int {}\n",
        "}\n",
    );

    #[test]
    fn overrides_do_not_inherit_purity() {
        let resolver = StubResolver::from_php(STUB);
        let db = resolver.database();
        let inherited = effects_by_name(db, "Child::a").unwrap();
        assert!(inherited.pure);
        assert!(inherited.mutation_free);
        let overridden = effects_by_name(db, "Child::b").unwrap();
        assert!(!overridden.pure);
    }

    #[test]
    fn unknown_names_have_no_effects() {
        let resolver = StubResolver::from_php(STUB);
        assert!(effects_by_name(resolver.database(), "Child::nope").is_none());
    }
}
