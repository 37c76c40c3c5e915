// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Shared symbol builders for unit tests.
//!
//! Every builder produces the smallest declaration the analysis accepts;
//! tests adjust fields directly for anything else.

use crate::analysis::AnalysisContext;
use crate::analysis::handlers::discover_handlers;
use crate::analysis::middleware::discover_middleware;
use crate::analysis::pipeline::{PipelineComposer, PipelineModel};
use crate::cache::IncrementalCache;
use crate::cancellation::CancellationToken;
use crate::config::GeneratorConfig;
use crate::symbols::{
    Accessibility, ArgumentSyntax, AssemblySymbols, AttributeData, Compilation, InvocationSyntax,
    InvokedMethod, MethodSymbol, ParameterSymbol, SourceLocation, Span, SymbolTable, TypeKind,
    TypeRef, TypeSymbol, well_known,
};

/// Name of the assembly [`compilation_with`] compiles.
pub const LOCAL_ASSEMBLY: &str = "Demo.App";

pub fn assembly(name: &str, types: Vec<TypeSymbol>) -> AssemblySymbols {
    AssemblySymbols {
        name: name.into(),
        attributes: Vec::new(),
        types,
    }
}

/// A compilation of `types` with no references and no invocations.
pub fn compilation_with(types: Vec<TypeSymbol>) -> Compilation {
    Compilation {
        assembly: assembly(LOCAL_ASSEMBLY, types),
        references: Vec::new(),
        invocations: Vec::new(),
    }
}

/// An internal, non-generic class.
pub fn class(name: &str) -> TypeSymbol {
    TypeSymbol {
        name: name.into(),
        kind: TypeKind::Class,
        accessibility: Accessibility::Internal,
        is_static: false,
        is_abstract: false,
        is_sealed: false,
        type_parameters: Vec::new(),
        base_type: None,
        interfaces: Vec::new(),
        containing_type: None,
        attributes: Vec::new(),
        methods: Vec::new(),
        location: None,
    }
}

pub fn interface(name: &str) -> TypeSymbol {
    TypeSymbol {
        kind: TypeKind::Interface,
        ..class(name)
    }
}

/// A class deriving from `base`.
pub fn derived(name: &str, base: &str) -> TypeSymbol {
    TypeSymbol {
        base_type: Some(TypeRef::named(base)),
        ..class(name)
    }
}

/// A generic class definition over `parameters`.
pub fn generic_class(name: &str, parameters: &[&str]) -> TypeSymbol {
    TypeSymbol {
        type_parameters: parameters.iter().map(|p| (*p).into()).collect(),
        ..class(name)
    }
}

/// A public instance method.
pub fn method(name: &str, parameters: Vec<ParameterSymbol>, return_type: TypeRef) -> MethodSymbol {
    MethodSymbol {
        name: name.into(),
        accessibility: Accessibility::Public,
        is_static: false,
        type_parameters: Vec::new(),
        parameters,
        return_type,
        attributes: Vec::new(),
        location: None,
    }
}

/// A class discovered as a handler by its name suffix.
pub fn handler_type(name: &str, methods: Vec<MethodSymbol>) -> TypeSymbol {
    TypeSymbol {
        methods,
        ..class(name)
    }
}

/// A class discovered as middleware by its name suffix.
pub fn middleware_type(name: &str, methods: Vec<MethodSymbol>) -> TypeSymbol {
    TypeSymbol {
        methods,
        ..class(name)
    }
}

pub fn message_param(message: &str) -> ParameterSymbol {
    ParameterSymbol::new("message", TypeRef::named(message))
}

pub fn task_of(ty: TypeRef) -> TypeRef {
    TypeRef::generic(well_known::TASK, vec![ty])
}

pub fn value_task() -> TypeRef {
    TypeRef::value(well_known::VALUE_TASK)
}

/// Assembly-level marker making a referenced assembly a scanned module.
pub fn module_marker() -> AttributeData {
    AttributeData::new("Switchboard.SwitchboardModuleAttribute")
}

fn facade_call(name: &str, message: &str, return_type: TypeRef, span_start: u32) -> InvocationSyntax {
    let mut token = ParameterSymbol::new("cancellationToken", TypeRef::value(well_known::CANCELLATION_TOKEN));
    token.default_value = Some("default".into());
    InvocationSyntax {
        location: SourceLocation::new("src/Program.cs", Span::new(span_start, span_start + 20), 3, span_start + 1),
        receiver_type: TypeRef::named("Switchboard.IMediator"),
        method: InvokedMethod {
            containing_type: "Switchboard.IMediator".into(),
            name: name.into(),
            type_arguments: Vec::new(),
            parameters: vec![ParameterSymbol::new("message", TypeRef::object()), token],
            return_type,
            is_extension: false,
        },
        arguments: vec![ArgumentSyntax {
            parameter: "message".into(),
            static_type: Some(TypeRef::named(message)),
        }],
        is_awaited: true,
        result_used: true,
        interceptable: None,
    }
}

/// `await mediator.InvokeAsync(message)` expecting `response`, starting at
/// byte `span_start` of `src/Program.cs`.
pub fn invoke_async(message: &str, response: Option<TypeRef>, span_start: u32) -> InvocationSyntax {
    let return_type = match response {
        Some(response) => TypeRef::generic_value(well_known::VALUE_TASK, vec![response]),
        None => value_task(),
    };
    let mut call = facade_call("InvokeAsync", message, return_type, span_start);
    call.method.type_arguments = call.method.return_type.type_args().to_vec();
    call
}

/// `await mediator.PublishAsync(message)`.
pub fn publish_async(message: &str, span_start: u32) -> InvocationSyntax {
    facade_call("PublishAsync", message, value_task(), span_start)
}

/// Discovers everything in `compilation` and composes the pipeline of the
/// first handler whose message key is `message`.
///
/// # Panics
///
/// Panics if no handler handles `message`.
pub fn pipeline_for(compilation: &Compilation, message: &str) -> PipelineModel {
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
    let handler = handlers
        .handlers
        .iter()
        .find(|h| h.message.key == message)
        .unwrap_or_else(|| panic!("no handler for {message}"));
    PipelineComposer::new(&middleware.middleware, ctx.hierarchy)
        .compose(handler, &TypeRef::named(message))
        .pipeline
}
