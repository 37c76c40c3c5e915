// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Pipeline composer.
//!
//! **DDD Context:** Analysis / Domain Service
//!
//! For one (handler, message type) pair, selects the applicable middleware,
//! keeps it in rank order, and picks the invocation strategy:
//!
//! - **static fast path**: static handler, nothing injected, no middleware;
//!   the wrapper is a direct call;
//! - **wrapped**: handler and middleware resolved from the dependency
//!   source, hooks woven around the call;
//! - **cascading**: the handler returns a tuple; element 0 is the response
//!   and every other non-null element is published afterwards.
//!
//! Hook nesting is an onion. Before hooks run outer to inner; After and
//! Finally hooks run inner to outer, and every Finally hook runs even when
//! the handler throws or a Before hook short-circuits. An Around hook
//! receives the rest of the pipeline as `next`, so middleware ranked after
//! it runs inside that delegate.

use super::handlers::HandlerRecord;
use super::middleware::{HookKind, MiddlewareRecord};
use super::type_hierarchy::TypeHierarchy;
use crate::diagnostics::{Diagnostic, DiagnosticId};
use crate::symbols::TypeRef;
use ecow::eco_format;

/// How the wrapper calls the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationStrategy {
    StaticFastPath,
    Wrapped,
    Cascading,
}

/// The composed pipeline for one handler and one concrete message type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineModel {
    pub handler: HandlerRecord,
    pub message_type: TypeRef,
    /// Selected middleware, outermost first.
    pub middleware: Vec<MiddlewareRecord>,
    pub strategy: InvocationStrategy,
    pub is_async: bool,
}

/// A run of consecutive middleware: hook-style members, then optionally an
/// Around member whose `next` continues with the following segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'p> {
    pub hooks: &'p [MiddlewareRecord],
    pub around: Option<&'p MiddlewareRecord>,
}

impl Segment<'_> {
    pub fn before_order(&self) -> impl Iterator<Item = &MiddlewareRecord> {
        self.hooks.iter().filter(|m| m.hook(HookKind::Before).is_some())
    }

    pub fn after_order(&self) -> impl Iterator<Item = &MiddlewareRecord> {
        self.hooks.iter().rev().filter(|m| m.hook(HookKind::After).is_some())
    }

    pub fn finally_order(&self) -> impl Iterator<Item = &MiddlewareRecord> {
        self.hooks.iter().rev().filter(|m| m.hook(HookKind::Finally).is_some())
    }
}

impl PipelineModel {
    /// Middleware with a Before hook, in invocation order.
    #[must_use]
    pub fn before_order(&self) -> Vec<&MiddlewareRecord> {
        self.middleware
            .iter()
            .filter(|m| m.hook(HookKind::Before).is_some())
            .collect()
    }

    /// Middleware with an After hook, in invocation order.
    #[must_use]
    pub fn after_order(&self) -> Vec<&MiddlewareRecord> {
        self.middleware
            .iter()
            .rev()
            .filter(|m| m.hook(HookKind::After).is_some())
            .collect()
    }

    /// Middleware with a Finally hook, in invocation order.
    #[must_use]
    pub fn finally_order(&self) -> Vec<&MiddlewareRecord> {
        self.middleware
            .iter()
            .rev()
            .filter(|m| m.hook(HookKind::Finally).is_some())
            .collect()
    }

    /// Middleware split at each Around member, outermost segment first.
    #[must_use]
    pub fn segments(&self) -> Vec<Segment<'_>> {
        let mut segments = Vec::new();
        let mut start = 0;
        for (index, middleware) in self.middleware.iter().enumerate() {
            if middleware.is_around() {
                segments.push(Segment {
                    hooks: &self.middleware[start..index],
                    around: Some(middleware),
                });
                start = index + 1;
            }
        }
        segments.push(Segment {
            hooks: &self.middleware[start..],
            around: None,
        });
        segments
    }
}

/// A composed pipeline plus the diagnostics its explicit middleware raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub pipeline: PipelineModel,
    pub diagnostics: Vec<Diagnostic>,
}

/// Selects and orders middleware for handlers.
#[derive(Debug, Clone, Copy)]
pub struct PipelineComposer<'m, 'a> {
    middleware: &'m [MiddlewareRecord],
    hierarchy: TypeHierarchy<'a>,
}

impl<'m, 'a> PipelineComposer<'m, 'a> {
    /// `middleware` must already be in rank order.
    #[must_use]
    pub fn new(middleware: &'m [MiddlewareRecord], hierarchy: TypeHierarchy<'a>) -> Self {
        Self { middleware, hierarchy }
    }

    /// Composes the pipeline for `handler` invoked with `message`.
    #[must_use]
    pub fn compose(&self, handler: &HandlerRecord, message: &TypeRef) -> Composition {
        let message = message.canonical().non_nullable().clone();
        let mut diagnostics = Vec::new();

        for requested in &handler.explicit_middleware {
            let key = requested.key();
            match self.middleware.iter().find(|m| m.middleware_type == key) {
                None => diagnostics.push(Diagnostic::new(
                    DiagnosticId::UnknownMiddleware,
                    eco_format!(
                        "Handler '{}' requires middleware '{}', which was not found",
                        handler.display_name(),
                        key
                    ),
                    handler.location.clone(),
                ).with_hint("middleware types need at least one Before, After, Finally or Execute method")),
                Some(found) if !found.applies_to(&message, &self.hierarchy) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticId::InapplicableMiddleware,
                        eco_format!(
                            "Middleware '{}' required by handler '{}' does not apply to message '{}'",
                            key,
                            handler.display_name(),
                            message
                        ),
                        handler.location.clone(),
                    ));
                }
                Some(_) => {}
            }
        }

        let middleware: Vec<MiddlewareRecord> = self
            .middleware
            .iter()
            .filter(|m| {
                let requested = handler
                    .explicit_middleware
                    .iter()
                    .any(|r| r.key() == m.middleware_type);
                (requested || !m.explicit_only) && m.applies_to(&message, &self.hierarchy)
            })
            .cloned()
            .collect();

        let strategy = if handler.is_cascading() {
            InvocationStrategy::Cascading
        } else if handler.is_static && handler.has_no_injected_dependencies && middleware.is_empty() {
            InvocationStrategy::StaticFastPath
        } else {
            InvocationStrategy::Wrapped
        };
        let is_async = handler.is_async
            || strategy == InvocationStrategy::Cascading
            || middleware.iter().any(|m| m.is_async() || m.is_around());

        Composition {
            pipeline: PipelineModel {
                handler: handler.clone(),
                message_type: message,
                middleware,
                strategy,
                is_async,
            },
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisContext;
    use crate::analysis::handlers::discover_handlers;
    use crate::analysis::middleware::discover_middleware;
    use crate::cache::IncrementalCache;
    use crate::cancellation::CancellationToken;
    use crate::config::GeneratorConfig;
    use crate::symbols::{AttributeData, AttributeValue, Compilation, MethodSymbol, NamedArgument, ParameterSymbol, SymbolTable, TupleElementRef, TypeSymbol};
    use crate::test_helpers::{class, compilation_with, handler_type, interface, message_param, method, middleware_type, task_of};

    fn compose(compilation: &Compilation, message: &str) -> Composition {
        let config = GeneratorConfig::default();
        let table = SymbolTable::build(compilation);
        let ctx = AnalysisContext::new(&config, &table);
        let mut cache = IncrementalCache::new();
        let token = CancellationToken::new();
        let handlers = discover_handlers(&ctx, &mut cache, &token).unwrap();
        let explicit: Vec<TypeRef> = handlers
            .handlers
            .iter()
            .flat_map(|h| h.explicit_middleware.iter().cloned())
            .collect();
        let middleware = discover_middleware(&ctx, &mut cache, &explicit, &token).unwrap();
        let composer = PipelineComposer::new(&middleware.middleware, ctx.hierarchy);
        let handler = handlers
            .handlers
            .iter()
            .find(|h| h.message.key == message)
            .unwrap();
        composer.compose(handler, &TypeRef::named(message))
    }

    fn ranked(name: &str, rank: i64, hooks: Vec<MethodSymbol>) -> TypeSymbol {
        let mut ty = middleware_type(name, hooks);
        ty.attributes.push(AttributeData {
            name: "Switchboard.OrderAttribute".into(),
            arguments: vec![AttributeValue::Int(rank)],
            named_arguments: vec![],
        });
        ty
    }

    fn hook(name: &str, returns: TypeRef) -> MethodSymbol {
        method(name, vec![ParameterSymbol::new("message", TypeRef::object())], returns)
    }

    fn ping_handler() -> TypeSymbol {
        handler_type(
            "Demo.PingHandler",
            vec![method("Handle", vec![message_param("Demo.Ping")], TypeRef::void())],
        )
    }

    #[test]
    fn ranks_order_before_and_finally() {
        let compilation = compilation_with(vec![
            class("Demo.Ping"),
            ping_handler(),
            ranked("Demo.M2Middleware", 5, vec![hook("Before", TypeRef::void()), hook("Finally", TypeRef::void())]),
            ranked("Demo.M1Middleware", 1, vec![hook("Before", TypeRef::void()), hook("Finally", TypeRef::void())]),
        ]);
        let pipeline = compose(&compilation, "Demo.Ping").pipeline;
        let names = |list: Vec<&MiddlewareRecord>| -> Vec<String> {
            list.iter().map(|m| m.middleware_type.to_string()).collect()
        };
        assert_eq!(names(pipeline.before_order()), vec!["Demo.M1Middleware", "Demo.M2Middleware"]);
        assert_eq!(names(pipeline.finally_order()), vec!["Demo.M2Middleware", "Demo.M1Middleware"]);
        assert_eq!(pipeline.strategy, InvocationStrategy::Wrapped);
        assert!(!pipeline.is_async);
    }

    #[test]
    fn around_splits_the_pipeline_into_segments() {
        let execute = method(
            "ExecuteAsync",
            vec![
                ParameterSymbol::new("message", TypeRef::object()),
                ParameterSymbol::new("next", TypeRef::named("Switchboard.HandlerExecutionDelegate")),
            ],
            TypeRef::generic_value("System.Threading.Tasks.ValueTask", vec![TypeRef::object().nullable()]),
        );
        let compilation = compilation_with(vec![
            class("Demo.Ping"),
            ping_handler(),
            ranked("Demo.OuterMiddleware", 1, vec![hook("Before", TypeRef::void())]),
            ranked("Demo.RetryMiddleware", 2, vec![execute]),
            ranked("Demo.InnerMiddleware", 3, vec![hook("Finally", TypeRef::void())]),
        ]);
        let pipeline = compose(&compilation, "Demo.Ping").pipeline;
        assert!(pipeline.is_async);

        let segments = pipeline.segments();
        assert_eq!(segments.len(), 2);
        let outer: Vec<&str> = segments[0].before_order().map(|m| m.middleware_type.as_str()).collect();
        assert_eq!(outer, vec!["Demo.OuterMiddleware"]);
        assert_eq!(segments[0].around.map(|m| m.middleware_type.as_str()), Some("Demo.RetryMiddleware"));
        let inner: Vec<&str> = segments[1].finally_order().map(|m| m.middleware_type.as_str()).collect();
        assert_eq!(inner, vec!["Demo.InnerMiddleware"]);
        assert!(segments[1].around.is_none());
    }

    #[test]
    fn static_handler_without_dependencies_takes_fast_path() {
        let mut handle = method("Handle", vec![message_param("Demo.Ping")], TypeRef::named("Demo.Pong"));
        handle.is_static = true;
        let compilation = compilation_with(vec![class("Demo.Ping"), handler_type("Demo.PingHandler", vec![handle])]);
        let pipeline = compose(&compilation, "Demo.Ping").pipeline;
        assert_eq!(pipeline.strategy, InvocationStrategy::StaticFastPath);
        assert!(!pipeline.is_async);
    }

    #[test]
    fn tuple_returns_cascade_asynchronously() {
        let handle = method(
            "Handle",
            vec![message_param("Demo.PlaceOrder")],
            TypeRef::tuple(vec![
                TupleElementRef::new(None, TypeRef::named("Demo.Order")),
                TupleElementRef::new(None, TypeRef::named("Demo.OrderCreated").nullable()),
            ]),
        );
        let compilation = compilation_with(vec![class("Demo.PlaceOrder"), handler_type("Demo.PlaceOrderHandler", vec![handle])]);
        let pipeline = compose(&compilation, "Demo.PlaceOrder").pipeline;
        assert_eq!(pipeline.strategy, InvocationStrategy::Cascading);
        assert!(pipeline.is_async);
    }

    #[test]
    fn applicability_filters_middleware() {
        let mut place = class("Demo.PlaceOrder");
        place.interfaces.push(TypeRef::named("Demo.ICommand"));
        let compilation = compilation_with(vec![
            interface("Demo.ICommand"),
            interface("Demo.IQuery"),
            place,
            handler_type(
                "Demo.PlaceOrderHandler",
                vec![method("HandleAsync", vec![message_param("Demo.PlaceOrder")], task_of(TypeRef::named("Demo.Order")))],
            ),
            middleware_type(
                "Demo.CommandMiddleware",
                vec![method("Before", vec![message_param("Demo.ICommand")], TypeRef::void())],
            ),
            middleware_type(
                "Demo.QueryMiddleware",
                vec![method("Before", vec![message_param("Demo.IQuery")], TypeRef::void())],
            ),
        ]);
        let pipeline = compose(&compilation, "Demo.PlaceOrder").pipeline;
        let names: Vec<&str> = pipeline.middleware.iter().map(|m| m.middleware_type.as_str()).collect();
        assert_eq!(names, vec!["Demo.CommandMiddleware"]);
        assert!(pipeline.is_async);
    }

    #[test]
    fn explicit_middleware_is_validated() {
        let mut handle = method("Handle", vec![message_param("Demo.Ping")], TypeRef::void());
        handle.attributes.push(AttributeData {
            name: "Switchboard.UseMiddlewareAttribute".into(),
            arguments: vec![AttributeValue::Array(vec![
                AttributeValue::Type(TypeRef::named("Demo.TransactionMiddleware")),
                AttributeValue::Type(TypeRef::named("Demo.QueryMiddleware")),
                AttributeValue::Type(TypeRef::named("Demo.MissingMiddleware")),
            ])],
            named_arguments: vec![],
        });
        let mut transaction = middleware_type("Demo.TransactionMiddleware", vec![hook("Before", TypeRef::void())]);
        transaction.attributes.push(AttributeData {
            name: "Switchboard.MiddlewareAttribute".into(),
            arguments: vec![],
            named_arguments: vec![NamedArgument {
                name: "ExplicitOnly".into(),
                value: AttributeValue::Bool(true),
            }],
        });
        let compilation = compilation_with(vec![
            class("Demo.Ping"),
            interface("Demo.IQuery"),
            handler_type("Demo.PingHandler", vec![handle]),
            transaction,
            middleware_type(
                "Demo.QueryMiddleware",
                vec![method("Before", vec![message_param("Demo.IQuery")], TypeRef::void())],
            ),
        ]);
        let composition = compose(&compilation, "Demo.Ping");

        let names: Vec<&str> = composition
            .pipeline
            .middleware
            .iter()
            .map(|m| m.middleware_type.as_str())
            .collect();
        assert_eq!(names, vec!["Demo.TransactionMiddleware"]);
        let ids: Vec<DiagnosticId> = composition.diagnostics.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![DiagnosticId::InapplicableMiddleware, DiagnosticId::UnknownMiddleware]);
    }
}
