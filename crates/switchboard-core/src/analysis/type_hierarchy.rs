// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Supertype chains and assignability over the symbol table.
//!
//! **DDD Context:** Analysis / Domain Service
//!
//! Walks are depth-first in declared order and tolerate cycles and missing
//! declarations (mid-edit code), returning whatever prefix is known.

use crate::symbols::{SymbolTable, TypeRef, TypeSymbol};
use ecow::EcoString;
use std::collections::{HashMap, HashSet};

/// Read-only hierarchy queries.
#[derive(Debug, Clone, Copy)]
pub struct TypeHierarchy<'a> {
    table: &'a SymbolTable<'a>,
}

impl<'a> TypeHierarchy<'a> {
    #[must_use]
    pub fn new(table: &'a SymbolTable<'a>) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn table(&self) -> &'a SymbolTable<'a> {
        self.table
    }

    /// Ordered base-class chain, excluding `ty` itself and `System.Object`.
    ///
    /// Generic arguments are substituted at each step, so the chain of
    /// `Created : Envelope<Order>` contains `Envelope<Order>`.
    #[must_use]
    pub fn base_chain(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(ty.key());
        let mut current = ty.canonical();

        loop {
            let Some(symbol) = self.table.resolve(&current) else {
                break;
            };
            let Some(base) = &symbol.base_type else {
                break;
            };
            let base = substitute_declared(symbol, &current, base);
            if base.is_object() || !visited.insert(base.key()) {
                break; // Object root or cycle
            }
            chain.push(base.clone());
            current = base;
        }

        chain
    }

    /// Every interface `ty` implements: its own declared interfaces in
    /// order, their base interfaces, then those inherited from each base
    /// class. Each interface appears once, at its first position.
    #[must_use]
    pub fn interfaces(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut owners = vec![ty.canonical()];
        owners.extend(self.base_chain(ty));
        for owner in owners {
            self.collect_interfaces(&owner, &mut result, &mut seen);
        }
        result
    }

    fn collect_interfaces(
        &self,
        owner: &TypeRef,
        into: &mut Vec<TypeRef>,
        seen: &mut HashSet<EcoString>,
    ) {
        let Some(symbol) = self.table.resolve(owner) else {
            return;
        };
        for declared in &symbol.interfaces {
            let interface = substitute_declared(symbol, owner, declared);
            if seen.insert(interface.key()) {
                into.push(interface.clone());
                self.collect_interfaces(&interface, into, seen);
            }
        }
    }

    /// Base classes then interfaces: the lookup order for subtype matching.
    #[must_use]
    pub fn message_chain(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let mut chain = self.base_chain(ty);
        chain.extend(self.interfaces(ty));
        chain
    }

    /// True when a value of type `from` can be passed where `to` is expected.
    #[must_use]
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        if to.is_object() {
            return true;
        }
        let to_key = to.key();
        if from.key() == to_key {
            return true;
        }
        if let TypeRef::TypeParameter { constraints, .. } = from.canonical().non_nullable() {
            return constraints.iter().any(|c| self.is_assignable(c, to));
        }
        self.message_chain(from).iter().any(|t| t.key() == to_key)
    }

    /// True when `ty` satisfies every constraint type.
    #[must_use]
    pub fn satisfies(&self, ty: &TypeRef, constraints: &[TypeRef]) -> bool {
        constraints.iter().all(|c| self.is_assignable(ty, c))
    }

    #[must_use]
    pub fn is_interface(&self, ty: &TypeRef) -> bool {
        self.table.is_interface(ty)
    }
}

/// Rewrites a supertype written in `symbol`'s declaration in terms of the
/// constructed type `constructed`.
fn substitute_declared(symbol: &TypeSymbol, constructed: &TypeRef, declared: &TypeRef) -> TypeRef {
    let args = constructed.canonical();
    let args = args.type_args();
    if symbol.type_parameters.is_empty() || args.is_empty() {
        return declared.canonical();
    }
    let bindings: HashMap<EcoString, TypeRef> = symbol
        .type_parameters
        .iter()
        .cloned()
        .zip(args.iter().cloned())
        .collect();
    declared.substitute(&bindings).canonical()
}
