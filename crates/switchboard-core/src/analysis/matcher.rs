// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Handler matcher.
//!
//! **DDD Context:** Analysis / Domain Service
//!
//! Candidates for a message are grouped into specificity tiers, most
//! specific first:
//!
//! 1. handlers declared for exactly the message type;
//! 2. one tier per supertype, base classes first, then interfaces in
//!    declared order;
//! 3. open generic handlers (`Handle<T>(Envelope<T>)`) whose parameter
//!    unifies with the message or one of its supertypes;
//! 4. type-parameter handlers (`Handle<T>(T) where T : ICommand`) whose
//!    constraints the message satisfies.
//!
//! Single-target dispatch takes the first non-empty tier and requires it to
//! hold exactly one handler. Broadcast takes every tier.

use super::handlers::{HandlerRecord, MessageKind};
use super::type_hierarchy::TypeHierarchy;
use crate::symbols::TypeRef;
use ecow::EcoString;
use std::collections::{HashMap, HashSet};

/// Why single-target matching failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError<'h> {
    #[error("no handler matches the message type")]
    NotFound,
    #[error("{} handlers match the message type equally well", .0.len())]
    Ambiguous(Vec<&'h HandlerRecord>),
}

/// Matches message types against discovered handlers.
#[derive(Debug, Clone, Copy)]
pub struct HandlerMatcher<'h, 'a> {
    handlers: &'h [HandlerRecord],
    hierarchy: TypeHierarchy<'a>,
}

impl<'h, 'a> HandlerMatcher<'h, 'a> {
    #[must_use]
    pub fn new(handlers: &'h [HandlerRecord], hierarchy: TypeHierarchy<'a>) -> Self {
        Self { handlers, hierarchy }
    }

    /// Every handler the matcher chooses from, in discovery order.
    #[must_use]
    pub fn handlers(&self) -> &'h [HandlerRecord] {
        self.handlers
    }

    /// The unique most-specific handler for `message`.
    ///
    /// # Errors
    ///
    /// [`MatchError::NotFound`] when no tier matches;
    /// [`MatchError::Ambiguous`] when the most specific tier holds more than
    /// one handler.
    pub fn match_single(&self, message: &TypeRef) -> Result<&'h HandlerRecord, MatchError<'h>> {
        let mut tiers = self.tiers(message).into_iter();
        match tiers.next() {
            None => Err(MatchError::NotFound),
            Some(tier) if tier.len() == 1 => Ok(tier[0]),
            Some(tier) => Err(MatchError::Ambiguous(tier)),
        }
    }

    /// Every matching handler: most-derived tier first, declaration order
    /// within a tier, each handler once.
    #[must_use]
    pub fn match_all(&self, message: &TypeRef) -> Vec<&'h HandlerRecord> {
        let mut seen = HashSet::new();
        self.tiers(message)
            .into_iter()
            .flatten()
            .filter(|h| seen.insert(h.id()))
            .collect()
    }

    /// Non-empty specificity tiers, most specific first.
    #[must_use]
    pub fn tiers(&self, message: &TypeRef) -> Vec<Vec<&'h HandlerRecord>> {
        let message = message.canonical().non_nullable().clone();
        let chain = self.hierarchy.message_chain(&message);
        let mut tiers = Vec::new();

        let mut push = |tier: Vec<&'h HandlerRecord>| {
            if !tier.is_empty() {
                tiers.push(tier);
            }
        };

        for candidate in std::iter::once(&message).chain(chain.iter()) {
            let key = candidate.key();
            push(self.select(|h| h.message.kind == MessageKind::Exact && h.message.key == key));
        }
        push(self.select(|h| {
            matches!(h.message.kind, MessageKind::OpenGeneric { .. })
                && self.bind_generic(h, &message).is_some()
        }));
        push(self.select(|h| {
            matches!(h.message.kind, MessageKind::TypeParameter { .. })
                && self.bind_generic(h, &message).is_some()
        }));
        tiers
    }

    fn select(&self, predicate: impl Fn(&HandlerRecord) -> bool) -> Vec<&'h HandlerRecord> {
        self.handlers.iter().filter(|h| predicate(h)).collect()
    }

    /// Binds a handler's method type parameters for `message`.
    ///
    /// Exact handlers bind nothing and succeed when the message is their
    /// type or a subtype of it.
    #[must_use]
    pub fn bind_generic(
        &self,
        handler: &HandlerRecord,
        message: &TypeRef,
    ) -> Option<HashMap<EcoString, TypeRef>> {
        let message = message.canonical().non_nullable().clone();
        let bindings = match &handler.message.kind {
            MessageKind::Exact => {
                return self
                    .hierarchy
                    .is_assignable(&message, &handler.message.type_ref)
                    .then(HashMap::new);
            }
            MessageKind::TypeParameter { constraints } => {
                let TypeRef::TypeParameter { name, .. } = &handler.message.type_ref else {
                    return None;
                };
                if !self.hierarchy.satisfies(&message, constraints) {
                    return None;
                }
                HashMap::from([(name.clone(), message)])
            }
            MessageKind::OpenGeneric { .. } => std::iter::once(message.clone())
                .chain(self.hierarchy.message_chain(&message))
                .find_map(|candidate| {
                    let mut bindings = HashMap::new();
                    unify(&handler.message.type_ref, &candidate, &mut bindings).then_some(bindings)
                })?,
        };

        let satisfied = handler.generic_parameters.iter().all(|parameter| {
            bindings.get(&parameter.name).is_some_and(|bound| {
                let constraints: Vec<TypeRef> = parameter
                    .constraints
                    .iter()
                    .map(|c| c.substitute(&bindings))
                    .collect();
                self.hierarchy.satisfies(bound, &constraints)
            })
        });
        satisfied.then_some(bindings)
    }
}

/// Structural match of `pattern` (which may mention type parameters)
/// against the closed type `actual`, recording consistent bindings.
fn unify(pattern: &TypeRef, actual: &TypeRef, bindings: &mut HashMap<EcoString, TypeRef>) -> bool {
    match (pattern, actual) {
        (TypeRef::TypeParameter { name, .. }, _) => match bindings.get(name) {
            Some(bound) => bound.key() == actual.key() && bound.is_nullable() == actual.is_nullable(),
            None => {
                bindings.insert(name.clone(), actual.clone());
                true
            }
        },
        (
            TypeRef::Named { name: p_name, args: p_args, .. },
            TypeRef::Named { name: a_name, args: a_args, .. },
        ) => {
            p_name == a_name
                && p_args.len() == a_args.len()
                && p_args.iter().zip(a_args).all(|(p, a)| unify(p, a, bindings))
        }
        (TypeRef::Nullable { inner: p }, TypeRef::Nullable { inner: a }) => unify(p, a, bindings),
        (TypeRef::Array { element: p }, TypeRef::Array { element: a }) => unify(p, a, bindings),
        (TypeRef::Tuple { elements: p }, TypeRef::Tuple { elements: a }) => {
            p.len() == a.len() && p.iter().zip(a).all(|(p, a)| unify(&p.ty, &a.ty, bindings))
        }
        _ => false,
    }
}
