// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Static analysis of the symbol snapshot.
//!
//! **DDD Context:** Analysis
//!
//! Leaf-first: the [`classifier`] and [`type_shape`] resolver feed the
//! [`handlers`] and [`middleware`] model builders; [`call_sites`] resolves
//! façade invocations; the [`matcher`] and [`pipeline`] composer combine
//! them into what the emitters render.

pub mod call_sites;
pub mod classifier;
pub mod handlers;
pub mod matcher;
pub mod middleware;
pub mod pipeline;
pub mod type_hierarchy;
pub mod type_shape;

pub use call_sites::{CallSiteRecord, DispatchKind, ResponseKind};
pub use handlers::{HandlerRecord, MessageBinding, MessageKind};
pub use matcher::{HandlerMatcher, MatchError};
pub use middleware::{Applicability, HookKind, MiddlewareRecord};
pub use pipeline::{InvocationStrategy, PipelineComposer, PipelineModel};
pub use type_hierarchy::TypeHierarchy;
pub use type_shape::TypeShape;

use crate::cache::MemoTable;
use crate::config::GeneratorConfig;
use crate::symbols::{AssemblySymbols, Origin, SymbolTable, TypeRef};

/// Everything an analysis pass reads.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub config: &'a GeneratorConfig,
    pub table: &'a SymbolTable<'a>,
    pub hierarchy: TypeHierarchy<'a>,
}

impl<'a> AnalysisContext<'a> {
    #[must_use]
    pub fn new(config: &'a GeneratorConfig, table: &'a SymbolTable<'a>) -> Self {
        Self {
            config,
            table,
            hierarchy: TypeHierarchy::new(table),
        }
    }

    /// Assemblies scanned for handlers and middleware, in discovery order:
    /// referenced assemblies carrying the module marker, then the local one.
    #[must_use]
    pub fn scanned_assemblies(&self) -> Vec<(&'a AssemblySymbols, Origin)> {
        let compilation = self.table.compilation();
        let mut scanned: Vec<(&'a AssemblySymbols, Origin)> = compilation
            .references
            .iter()
            .filter(|assembly| assembly.has_attribute(&self.config.markers.module_attribute))
            .map(|assembly| {
                (
                    assembly,
                    Origin::Referenced {
                        assembly: assembly.name.clone(),
                    },
                )
            })
            .collect();
        scanned.push((&compilation.assembly, Origin::Local));
        scanned
    }

    /// True when the local assembly exposes its wrappers to other assemblies.
    #[must_use]
    pub fn is_module(&self) -> bool {
        self.table
            .compilation()
            .assembly
            .has_attribute(&self.config.markers.module_attribute)
    }
}

/// Memoized shape resolution.
pub(crate) fn shape_of(
    shapes: &mut MemoTable<TypeRef, TypeShape>,
    ty: &TypeRef,
    config: &GeneratorConfig,
) -> TypeShape {
    shapes.get_or_insert_with(ty.canonical(), |canonical| {
        TypeShape::resolve(canonical, &config.runtime)
    })
}
