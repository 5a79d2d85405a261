/// Class, interface, trait, and enum extraction.
///
/// Each class-like statement becomes one [`ClassDecl`] carrying its
/// resolved capability edges (`extends` / `implements`), its attributes and
/// docblock text, and its members in declaration order.
use mago_span::HasSpan;
use mago_syntax::ast::*;

use crate::declarations::{
    ClassDecl, ClassKind, ConstantDecl, Declaration, MemberDecl, PropertyDecl, Visibility,
};

use super::{Walker, value_after_equals, visibility_of};

impl Walker<'_> {
    pub(crate) fn extract_class(&mut self, class: &Class<'_>) {
        let name = class.name.value;
        let parent = class
            .extends
            .as_ref()
            .and_then(|ext| ext.types.first().map(|ident| ident.value().to_string()));
        let interfaces: Vec<String> = class
            .implements
            .as_ref()
            .map(|imp| imp.types.iter().map(|ident| ident.value().to_string()).collect())
            .unwrap_or_default();
        let is_readonly = class.modifiers.iter().any(|m| m.is_readonly());

        self.push_class_like(
            class,
            name,
            ClassKind::Class,
            parent,
            interfaces,
            (class.modifiers.contains_abstract(), class.modifiers.contains_final(), is_readonly),
            None,
            class.members.iter(),
        );
    }

    pub(crate) fn extract_interface(&mut self, iface: &Interface<'_>) {
        // Interfaces may extend several interfaces; all of them are
        // capability edges, so they go to `interfaces`.
        let interfaces: Vec<String> = iface
            .extends
            .as_ref()
            .map(|ext| ext.types.iter().map(|ident| ident.value().to_string()).collect())
            .unwrap_or_default();

        self.push_class_like(
            iface,
            iface.name.value,
            ClassKind::Interface,
            None,
            interfaces,
            (false, false, false),
            None,
            iface.members.iter(),
        );
    }

    pub(crate) fn extract_trait(&mut self, trait_def: &Trait<'_>) {
        self.push_class_like(
            trait_def,
            trait_def.name.value,
            ClassKind::Trait,
            None,
            Vec::new(),
            (false, false, false),
            None,
            trait_def.members.iter(),
        );
    }

    pub(crate) fn extract_enum(&mut self, enum_def: &Enum<'_>) {
        let interfaces: Vec<String> = enum_def
            .implements
            .as_ref()
            .map(|imp| imp.types.iter().map(|ident| ident.value().to_string()).collect())
            .unwrap_or_default();
        let backing = enum_def.backing_type_hint.as_ref().map(|b| {
            self.text_of(b)
                .trim_start_matches(':')
                .trim()
                .to_ascii_lowercase()
        });

        self.push_class_like(
            enum_def,
            enum_def.name.value,
            ClassKind::Enum,
            None,
            interfaces,
            (false, true, false),
            backing,
            enum_def.members.iter(),
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn push_class_like<'m>(
        &mut self,
        node: &impl HasSpan,
        short_name: &str,
        kind: ClassKind,
        parent: Option<String>,
        interfaces: Vec<String>,
        (is_abstract, is_final, is_readonly): (bool, bool, bool),
        enum_backing: Option<String>,
        members: impl Iterator<Item = &'m ClassLikeMember<'m>>,
    ) {
        let located = self.locate(node);
        if !self.check_name(short_name, "class-like", located.offset) {
            return;
        }
        if !self.available(&located.attributes) {
            tracing::debug!(name = short_name, "class-like not available for target version");
            return;
        }

        let names = self.scope.shared();
        let fq_name = names.qualify(short_name);
        let parent = parent.map(|p| names.resolve_class(&p));
        let interfaces = interfaces
            .iter()
            .map(|i| names.resolve_class(i))
            .collect::<Vec<_>>();

        let members = self.extract_members(members, &fq_name, kind);

        self.declarations.push(Declaration::ClassLike(ClassDecl {
            name: fq_name,
            kind,
            offset: located.offset,
            names,
            docblock: located.docblock,
            attributes: located.attributes,
            parent,
            interfaces,
            is_abstract,
            is_final,
            is_readonly,
            enum_backing,
            members,
        }));
    }

    fn extract_members<'m>(
        &mut self,
        members: impl Iterator<Item = &'m ClassLikeMember<'m>>,
        class_name: &str,
        kind: ClassKind,
    ) -> Vec<MemberDecl> {
        let mut out = Vec::new();
        for member in members {
            match member {
                ClassLikeMember::Method(method) => {
                    if let Some(decl) = self.extract_method(method, class_name, kind) {
                        out.push(MemberDecl::Method(decl));
                    }
                }
                ClassLikeMember::Property(property) => {
                    out.extend(self.extract_property(property, member));
                }
                ClassLikeMember::Constant(constant) => {
                    let located = self.locate(member);
                    if !self.available(&located.attributes) {
                        continue;
                    }
                    let visibility = visibility_of(constant.modifiers.iter());
                    let hint = constant.hint.as_ref().map(|h| hint_text(h));
                    for item in constant.items.iter() {
                        let name = item.name.value;
                        let offset = self.file_offset(item.span().start.offset as usize);
                        if !self.check_name(name, "class constant", offset) {
                            continue;
                        }
                        out.push(MemberDecl::Constant(ConstantDecl {
                            name: name.to_string(),
                            offset,
                            names: self.scope.shared(),
                            docblock: located.docblock.clone(),
                            attributes: located.attributes.clone(),
                            hint: hint.clone(),
                            value: value_after_equals(self.text_of(item)),
                            visibility,
                        }));
                    }
                }
                ClassLikeMember::EnumCase(enum_case) => {
                    let located = self.locate(member);
                    let name = enum_case.item.name().value;
                    if !self.check_name(name, "enum case", located.offset) {
                        continue;
                    }
                    out.push(MemberDecl::EnumCase(ConstantDecl {
                        name: name.to_string(),
                        offset: located.offset,
                        names: self.scope.shared(),
                        docblock: located.docblock,
                        attributes: located.attributes,
                        hint: None,
                        value: value_after_equals(self.text_of(member)),
                        visibility: Visibility::Public,
                    }));
                }
                ClassLikeMember::TraitUse(trait_use) => {
                    let names = self.scope.shared();
                    let traits = trait_use
                        .trait_names
                        .iter()
                        .map(|ident| names.resolve_class(ident.value()))
                        .collect();
                    out.push(MemberDecl::TraitUse(traits));
                }
            }
        }
        out
    }

    fn extract_property(
        &mut self,
        property: &Property<'_>,
        member: &ClassLikeMember<'_>,
    ) -> Vec<MemberDecl> {
        let located = self.locate(member);
        if !self.available(&located.attributes) {
            return Vec::new();
        }
        let is_static = property.modifiers().iter().any(|m| m.is_static());
        let is_readonly = property.modifiers().iter().any(|m| m.is_readonly());
        let visibility = visibility_of(property.modifiers().iter());
        let hint = super::attributes::language_level_type(&located.attributes, self.php_version())
            .map(|t| (!t.is_empty()).then_some(t))
            .unwrap_or_else(|| property.hint().map(|h| hint_text(h)));

        // A single declaration may introduce several properties
        // (`public $a, $b = 1;`); defaults are only recoverable when
        // there is one.
        let variables = property.variables();
        let default = if variables.len() == 1 {
            value_after_equals(self.text_of(member))
        } else {
            None
        };

        let mut out = Vec::new();
        for var in variables.iter() {
            let raw_name = var.name;
            let name = raw_name.strip_prefix('$').unwrap_or(raw_name);
            if !self.check_name(name, "property", located.offset) {
                continue;
            }
            out.push(MemberDecl::Property(PropertyDecl {
                name: name.to_string(),
                offset: located.offset,
                names: self.scope.shared(),
                docblock: located.docblock.clone(),
                attributes: located.attributes.clone(),
                hint: hint.clone(),
                default: default.clone(),
                visibility,
                is_static,
                is_readonly,
            }));
        }
        out
    }
}

/// A type hint as written in source.
pub(crate) fn hint_text(hint: &Hint<'_>) -> String {
    match hint {
        Hint::Identifier(ident) => ident.value().to_string(),
        Hint::Nullable(nullable) => format!("?{}", hint_text(nullable.hint)),
        Hint::Union(union) => format!("{}|{}", hint_text(union.left), hint_text(union.right)),
        Hint::Intersection(intersection) => format!(
            "{}&{}",
            hint_text(intersection.left),
            hint_text(intersection.right)
        ),
        Hint::Void(ident)
        | Hint::Never(ident)
        | Hint::Float(ident)
        | Hint::Bool(ident)
        | Hint::Integer(ident)
        | Hint::String(ident)
        | Hint::Object(ident)
        | Hint::Mixed(ident)
        | Hint::Iterable(ident) => ident.value.to_string(),
        Hint::Null(keyword)
        | Hint::True(keyword)
        | Hint::False(keyword)
        | Hint::Array(keyword)
        | Hint::Callable(keyword)
        | Hint::Static(keyword)
        | Hint::Self_(keyword)
        | Hint::Parent(keyword) => keyword.value.to_string(),
        Hint::Parenthesized(paren) => format!("({})", hint_text(paren.hint)),
    }
}
