// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Name index over every type visible to one compilation.
//!
//! **DDD Context:** Symbol Model
//!
//! Local types shadow referenced types of the same name. Referenced
//! assemblies are indexed whether or not they carry the module marker, since
//! supertype chains of local messages routinely cross into them; only the
//! builders decide which assemblies are scanned for handlers.

use super::{AssemblySymbols, Compilation, TypeKind, TypeRef, TypeSymbol};
use ecow::EcoString;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Where a symbol was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    /// Declared in the assembly being compiled.
    Local,
    /// Declared in a referenced assembly.
    Referenced { assembly: EcoString },
}

impl Origin {
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }
}

/// A type and the assembly it came from.
#[derive(Debug, Clone, Copy)]
pub struct TypeEntry<'a> {
    pub symbol: &'a TypeSymbol,
    pub assembly: &'a AssemblySymbols,
    pub is_local: bool,
}

impl TypeEntry<'_> {
    #[must_use]
    pub fn origin(&self) -> Origin {
        if self.is_local {
            Origin::Local
        } else {
            Origin::Referenced {
                assembly: self.assembly.name.clone(),
            }
        }
    }
}

/// Lookup of type declarations by canonical definition name.
#[derive(Debug)]
pub struct SymbolTable<'a> {
    compilation: &'a Compilation,
    types: HashMap<EcoString, TypeEntry<'a>>,
}

impl<'a> SymbolTable<'a> {
    /// Indexes the compilation and all of its references.
    #[must_use]
    pub fn build(compilation: &'a Compilation) -> Self {
        let mut types = HashMap::new();
        for assembly in &compilation.references {
            index_assembly(&mut types, assembly, false);
        }
        index_assembly(&mut types, &compilation.assembly, true);
        Self { compilation, types }
    }

    #[must_use]
    pub fn compilation(&self) -> &'a Compilation {
        self.compilation
    }

    /// Looks up a type by (possibly non-canonical) name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a TypeSymbol> {
        self.entry(name).map(|entry| entry.symbol)
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<TypeEntry<'a>> {
        if let Some(entry) = self.types.get(name) {
            return Some(*entry);
        }
        let canonical = definition_key(name);
        self.types.get(canonical.as_str()).copied()
    }

    /// Looks up the declaration behind a type reference.
    #[must_use]
    pub fn resolve(&self, ty: &TypeRef) -> Option<&'a TypeSymbol> {
        ty.definition_name().and_then(|name| self.get(&name))
    }

    #[must_use]
    pub fn is_interface(&self, ty: &TypeRef) -> bool {
        self.resolve(ty)
            .is_some_and(|symbol| symbol.kind == TypeKind::Interface)
    }

    /// True for interfaces and abstract classes: types no message instance
    /// can have as its runtime type.
    #[must_use]
    pub fn is_abstraction(&self, ty: &TypeRef) -> bool {
        self.resolve(ty).is_some_and(|symbol| {
            symbol.kind == TypeKind::Interface || symbol.is_abstract
        })
    }

    /// True when the type is public, or is not declared in any visible
    /// assembly (framework types).
    #[must_use]
    pub fn is_public(&self, ty: &TypeRef) -> bool {
        match ty.canonical() {
            TypeRef::Named { name, args, .. } => {
                let declared_public = self.get(&name).is_none_or(|symbol| {
                    symbol.accessibility.is_public()
                        && symbol
                            .containing_type
                            .as_ref()
                            .is_none_or(|outer| self.is_public(&TypeRef::named(outer)))
                });
                declared_public && args.iter().all(|arg| self.is_public(arg))
            }
            TypeRef::Nullable { inner } => self.is_public(&inner),
            TypeRef::Array { element } => self.is_public(&element),
            TypeRef::Tuple { elements } => elements.iter().all(|e| self.is_public(&e.ty)),
            TypeRef::TypeParameter { .. } => true,
            TypeRef::Error => false,
        }
    }

    /// Fingerprint of the inheritance-relevant shape of every indexed type.
    ///
    /// Anything derived from supertype chains can be reused while this
    /// value is unchanged.
    #[must_use]
    pub fn hierarchy_fingerprint(&self) -> u64 {
        let mut names: Vec<&EcoString> = self.types.keys().collect();
        names.sort();
        let mut hasher = DefaultHasher::new();
        for name in names {
            let entry = &self.types[name];
            name.hash(&mut hasher);
            entry.symbol.kind.hash(&mut hasher);
            entry.symbol.accessibility.hash(&mut hasher);
            entry.symbol.is_abstract.hash(&mut hasher);
            entry.symbol.type_parameters.hash(&mut hasher);
            entry.symbol.base_type.hash(&mut hasher);
            entry.symbol.interfaces.hash(&mut hasher);
        }
        hasher.finish()
    }
}

fn index_assembly<'a>(
    types: &mut HashMap<EcoString, TypeEntry<'a>>,
    assembly: &'a AssemblySymbols,
    is_local: bool,
) {
    for symbol in &assembly.types {
        let entry = TypeEntry {
            symbol,
            assembly,
            is_local,
        };
        let key = definition_key(&symbol.name);
        // First declaration wins within one assembly; local replaces referenced.
        match types.get(&key) {
            Some(existing) if existing.is_local || !is_local => {}
            _ => {
                types.insert(key, entry);
            }
        }
    }
}

/// Canonical definition name of a declared type (`Demo.Envelope`1` -> `Demo.Envelope`).
fn definition_key(name: &str) -> EcoString {
    TypeRef::named(name)
        .definition_name()
        .unwrap_or_else(|| name.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Accessibility;
    use crate::test_helpers::{assembly, class, compilation_with, interface};

    #[test]
    fn lookup_accepts_any_spelling() {
        let compilation = compilation_with(vec![class("Demo.Outer+Inner")]);
        let table = SymbolTable::build(&compilation);
        assert!(table.get("Demo.Outer.Inner").is_some());
        assert!(table.get("global::Demo.Outer+Inner").is_some());
        assert!(table.get("Demo.Missing").is_none());
    }

    #[test]
    fn local_types_shadow_referenced_types() {
        let mut compilation = compilation_with(vec![class("Demo.Ping")]);
        let mut shared = class("Demo.Ping");
        shared.accessibility = Accessibility::Public;
        compilation.references.push(assembly("Shared", vec![shared]));

        let table = SymbolTable::build(&compilation);
        let entry = table.entry("Demo.Ping").unwrap();
        assert!(entry.is_local);
        assert_eq!(entry.origin(), Origin::Local);
    }

    #[test]
    fn abstractions_and_visibility() {
        let mut command = interface("Demo.ICommand");
        command.accessibility = Accessibility::Public;
        let compilation = compilation_with(vec![command, class("Demo.Secret")]);
        let table = SymbolTable::build(&compilation);

        assert!(table.is_interface(&TypeRef::named("Demo.ICommand")));
        assert!(table.is_abstraction(&TypeRef::named("Demo.ICommand")));
        assert!(table.is_public(&TypeRef::named("Demo.ICommand")));
        assert!(!table.is_public(&TypeRef::named("Demo.Secret")));
        assert!(table.is_public(&TypeRef::named("System.String")));
        assert!(!table.is_public(&TypeRef::generic(
            "System.Collections.Generic.List",
            vec![TypeRef::named("Demo.Secret")]
        )));
    }

    #[test]
    fn hierarchy_fingerprint_ignores_methods() {
        let compilation = compilation_with(vec![class("Demo.PingHandler")]);
        let mut edited = compilation.clone();
        edited.assembly.types[0].methods.clear();
        edited.assembly.types[0]
            .methods
            .push(crate::test_helpers::method("Handle", vec![], TypeRef::void()));

        let before = SymbolTable::build(&compilation).hierarchy_fingerprint();
        let after = SymbolTable::build(&edited).hierarchy_fingerprint();
        assert_eq!(before, after);

        let mut rebased = compilation.clone();
        rebased.assembly.types[0].base_type = Some(TypeRef::named("Demo.Base"));
        assert_ne!(before, SymbolTable::build(&rebased).hierarchy_fingerprint());
    }
}
