// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Pure predicates over symbols.
//!
//! **DDD Context:** Analysis
//!
//! Nothing here fails: a symbol that mentions an unresolved type is simply
//! "not a candidate", since the host may hand over a snapshot of code that
//! is in the middle of being edited.

use super::{shape_of, type_shape::TypeShape};
use crate::cache::MemoTable;
use crate::config::GeneratorConfig;
use crate::symbols::{
    AttributeData, MethodSymbol, ParameterSymbol, TypeKind, TypeRef, TypeSymbol, has_attribute,
    well_known,
};

/// True when the attribute list carries the ignore marker.
#[must_use]
pub fn is_ignored(attributes: &[AttributeData], config: &GeneratorConfig) -> bool {
    has_attribute(attributes, &config.markers.ignore_attribute)
}

/// True when `method` of `ty` should be treated as a handler.
///
/// The method name rule applies to convention-named types and to types
/// marked as handlers; a handler marker on the method itself accepts any
/// method name.
#[must_use]
pub fn is_handler_candidate(ty: &TypeSymbol, method: &MethodSymbol, config: &GeneratorConfig) -> bool {
    if !is_discoverable_type(ty, config) || is_ignored(&method.attributes, config) {
        return false;
    }
    if !method.accessibility.is_assembly_visible() || mentions_error(method) {
        return false;
    }
    if !method.is_static && (ty.is_abstract || ty.is_static) {
        return false;
    }
    if has_attribute(&method.attributes, &config.markers.handler_attribute) {
        return true;
    }
    let method_name_matches = config
        .conventions
        .handler_methods
        .iter()
        .any(|name| *name == method.name);
    method_name_matches
        && (has_suffix(ty.simple_name(), &config.conventions.handler_suffixes)
            || has_attribute(&ty.attributes, &config.markers.handler_attribute)
            || implements_handler_interface(ty, config))
}

/// True when `ty` should be treated as middleware by convention or marker.
#[must_use]
pub fn is_middleware_candidate(ty: &TypeSymbol, config: &GeneratorConfig) -> bool {
    is_discoverable_type(ty, config)
        && !ty.is_abstract
        && (has_suffix(ty.simple_name(), &config.conventions.middleware_suffixes)
            || has_attribute(&ty.attributes, &config.markers.middleware_attribute))
}

/// Return-type classification, delegated to the memoized shape resolver.
pub fn classify_return(
    method: &MethodSymbol,
    shapes: &mut MemoTable<TypeRef, TypeShape>,
    config: &GeneratorConfig,
) -> TypeShape {
    shape_of(shapes, &method.return_type, config)
}

#[must_use]
pub fn is_cancellation_token(ty: &TypeRef) -> bool {
    ty.non_nullable().is_named(well_known::CANCELLATION_TOKEN)
}

/// True for dependency-source plumbing that is resolved, never dispatched on.
#[must_use]
pub fn is_infrastructure(ty: &TypeRef, config: &GeneratorConfig) -> bool {
    ty.definition_name().is_some_and(|name| {
        config
            .conventions
            .infrastructure_types
            .iter()
            .any(|infra| TypeRef::named(infra).definition_name().is_some_and(|i| i == name))
    })
}

/// True for the dependency source type itself.
#[must_use]
pub fn is_service_provider(ty: &TypeRef, config: &GeneratorConfig) -> bool {
    ty.non_nullable().is_named(&config.facade.service_provider_type)
}

/// True when `parameter` can carry the message.
#[must_use]
pub fn is_message_parameter(parameter: &ParameterSymbol, config: &GeneratorConfig) -> bool {
    !parameter.ty.contains_error()
        && !is_cancellation_token(&parameter.ty)
        && !is_infrastructure(&parameter.ty, config)
}

/// True when the type declares the handler marker interface.
#[must_use]
pub fn implements_handler_interface(ty: &TypeSymbol, config: &GeneratorConfig) -> bool {
    ty.interfaces.iter().any(|interface| {
        interface
            .definition_name()
            .is_some_and(|name| name == config.markers.handler_interface)
    })
}

fn is_discoverable_type(ty: &TypeSymbol, config: &GeneratorConfig) -> bool {
    !matches!(
        ty.kind,
        TypeKind::Error | TypeKind::Interface | TypeKind::Enum | TypeKind::Delegate
    ) && ty.type_parameters.is_empty()
        && !is_ignored(&ty.attributes, config)
}

fn mentions_error(method: &MethodSymbol) -> bool {
    method.return_type.contains_error() || method.parameters.iter().any(|p| p.ty.contains_error())
}

fn has_suffix(name: &str, suffixes: &[ecow::EcoString]) -> bool {
    suffixes
        .iter()
        .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix.as_str()))
}
