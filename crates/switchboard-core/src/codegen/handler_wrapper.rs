// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Handler wrapper emission.
//!
//! **DDD Context:** Code Generation
//!
//! A wrapper is a static class that runs one composed pipeline. It exposes
//! two entry points:
//!
//! - the typed entry, `Handle` or `HandleAsync`, taking the concrete message
//!   type and returning the concrete response type; interceptors and
//!   publishers call it directly;
//! - the untyped entry, `UntypedHandleAsync`, taking `object` and returning
//!   a boxed response; the registry hands it to the façade for messages
//!   only known at run time.
//!
//! Hook-style middleware becomes straight-line code around the handler
//! call, wrapped in `try`/`finally` when a Finally hook exists. Each Around
//! middleware gets the remainder of the pipeline as a `next` lambda, and
//! the code after it is emitted inside that lambda.

use super::csharp::{
    awaited, file_prologue, generated_code_attribute, optional_service, render_name, render_type,
    required_service, string_literal, sync_result, typeof_expr, value_task_of,
};
use super::document::{Document, INDENT, block, line, lines, nest, text};
use super::names::hint_name;
use super::{EmitNames, EntryPoint, GeneratedSource, members};
use crate::analysis::handlers::{HandlerRecord, ParameterRole};
use crate::analysis::middleware::{HookKind, HookMethod, HookParameter, HookParameterRole, MiddlewareRecord};
use crate::analysis::pipeline::{InvocationStrategy, PipelineModel, Segment};
use crate::docvec;
use crate::symbols::{TypeRef, well_known};
use ecow::{EcoString, eco_format};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// One non-primary tuple element published after a cascading handler runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CascadeTarget {
    /// `Item2`, `Item3`, ...
    pub field_name: EcoString,
    pub element_type: TypeRef,
    /// `global::`-rooted publisher class.
    pub publisher: EcoString,
}

/// Everything one wrapper file depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WrapperPlan {
    pub namespace: EcoString,
    pub class_name: EcoString,
    /// Module assemblies expose wrappers of public handlers to referencing
    /// assemblies.
    pub is_public: bool,
    pub pipeline: PipelineModel,
    /// Arguments for the handler method's type parameters, in order.
    pub type_arguments: Vec<TypeRef>,
    pub cascades: Vec<CascadeTarget>,
    pub names: EmitNames,
}

/// How other generated code reaches a wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WrapperRef {
    /// `global::`-rooted wrapper class.
    pub class_path: EcoString,
    pub message_type: TypeRef,
    /// The typed entry is `HandleAsync`.
    pub is_async: bool,
    /// What the typed entry returns, if anything.
    pub response: Option<TypeRef>,
    /// For cascading handlers, the full tuple `HandleTupleAsync` returns.
    pub tuple: Option<TypeRef>,
    pub handler_display: EcoString,
}

impl WrapperRef {
    #[must_use]
    pub fn method_name(&self, entry: EntryPoint) -> &'static str {
        match entry {
            EntryPoint::Typed if self.is_async => "HandleAsync",
            EntryPoint::Typed => "Handle",
            EntryPoint::Untyped => "UntypedHandleAsync",
        }
    }

    /// `Class.Method` for `entry`.
    #[must_use]
    pub fn method_path(&self, entry: EntryPoint) -> EcoString {
        eco_format!("{}.{}", self.class_path, self.method_name(entry))
    }
}

impl WrapperPlan {
    /// Generic parameter bindings for the handler method.
    #[must_use]
    pub fn bindings(&self) -> HashMap<EcoString, TypeRef> {
        self.pipeline
            .handler
            .generic_parameters
            .iter()
            .map(|p| p.name.clone())
            .zip(self.type_arguments.iter().cloned())
            .collect()
    }

    /// The value the pipeline body produces: the full tuple for cascading
    /// handlers, the awaited return value otherwise.
    #[must_use]
    pub fn produced_type(&self) -> Option<TypeRef> {
        let shape = &self.pipeline.handler.return_shape;
        let bindings = self.bindings();
        if shape.is_tuple_return {
            return Some(shape.unwrapped_type.substitute(&bindings));
        }
        shape.value_type().map(|ty| ty.substitute(&bindings))
    }

    /// The cascading tuple type, if the handler cascades.
    #[must_use]
    pub fn tuple_type(&self) -> Option<TypeRef> {
        if self.pipeline.strategy == InvocationStrategy::Cascading {
            self.produced_type()
        } else {
            None
        }
    }

    /// What the typed entry returns: tuple element 0 for cascading handlers.
    #[must_use]
    pub fn response_type(&self) -> Option<TypeRef> {
        match self.tuple_type() {
            Some(TypeRef::Tuple { elements }) => elements.first().map(|e| e.ty.clone()),
            Some(_) => None,
            None => self.produced_type(),
        }
    }

    /// The typed entry is `HandleAsync`. Public wrappers always offer it so
    /// referencing assemblies need not know whether the pipeline is async.
    #[must_use]
    pub fn exposes_async(&self) -> bool {
        self.pipeline.is_async || self.is_public
    }

    #[must_use]
    pub fn wrapper_ref(&self) -> WrapperRef {
        WrapperRef {
            class_path: eco_format!("global::{}.{}", self.namespace, self.class_name),
            message_type: self.pipeline.message_type.clone(),
            is_async: self.pipeline.is_async,
            response: self.response_type(),
            tuple: self.tuple_type(),
            handler_display: self.pipeline.handler.display_name(),
        }
    }
}

/// Renders the wrapper class for `plan`.
#[instrument(skip_all, fields(class = %plan.class_name))]
#[must_use]
pub fn render(plan: &WrapperPlan) -> GeneratedSource {
    let emitter = WrapperEmitter::new(plan);
    let mut body = vec![docvec![
        "public const string MessageTypeKey = ",
        string_literal(&plan.pipeline.message_type.key()),
        ";"
    ]];
    body.extend(emitter.typed_entries());
    body.push(emitter.untyped_entry());
    if plan.pipeline.strategy == InvocationStrategy::Cascading {
        body.push(emitter.cascade_method());
    }
    debug!(strategy = ?plan.pipeline.strategy, middleware = plan.pipeline.middleware.len(), "Rendering wrapper");

    let visibility = if plan.is_public { "public" } else { "internal" };
    let class = block(
        eco_format!("{visibility} static class {}", plan.class_name),
        members(body),
    );
    let doc = docvec![
        file_prologue(),
        line(),
        block(
            eco_format!("namespace {}", plan.namespace),
            lines(vec![text(generated_code_attribute()), class]),
        ),
        line(),
    ];
    GeneratedSource::new(hint_name(&plan.class_name), doc.to_pretty_string())
}

/// What a pipeline stage does when it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnMode {
    /// Return the produced value from the typed entry.
    Typed,
    /// Return a boxed value from a `next` delegate.
    Boxed,
}

struct WrapperEmitter<'p> {
    plan: &'p WrapperPlan,
    pipeline: &'p PipelineModel,
    handler: &'p HandlerRecord,
    bindings: HashMap<EcoString, TypeRef>,
    produced: Option<TypeRef>,
    /// Middleware split at Around members, outermost first.
    segments: Vec<Segment<'p>>,
}

impl<'p> WrapperEmitter<'p> {
    fn new(plan: &'p WrapperPlan) -> Self {
        let pipeline = &plan.pipeline;
        Self {
            plan,
            pipeline,
            handler: &pipeline.handler,
            bindings: plan.bindings(),
            produced: plan.produced_type(),
            segments: pipeline.segments(),
        }
    }

    /// Position of `record` in the pipeline; names its local variables.
    fn index_of(&self, record: &MiddlewareRecord) -> usize {
        self.pipeline
            .middleware
            .iter()
            .position(|m| std::ptr::eq(m, record))
            .unwrap_or_default()
    }

    fn middleware(&self, index: usize) -> &'p MiddlewareRecord {
        &self.pipeline.middleware[index]
    }

    fn parameters(&self) -> EcoString {
        eco_format!(
            "{} serviceProvider, {} message, global::System.Threading.CancellationToken cancellationToken = default",
            render_name(&self.plan.names.service_provider_type),
            render_type(&self.pipeline.message_type)
        )
    }

    fn forward_arguments() -> &'static str {
        "serviceProvider, message, cancellationToken"
    }

    // ---- entry points -------------------------------------------------

    fn typed_entries(&self) -> Vec<Document<'static>> {
        let mut entries = Vec::new();
        match self.pipeline.strategy {
            InvocationStrategy::StaticFastPath => entries.push(self.fast_path_entry()),
            InvocationStrategy::Wrapped => entries.push(self.wrapped_entry()),
            InvocationStrategy::Cascading => {
                entries.push(self.cascading_entry());
                entries.push(self.tuple_entry());
            }
        }
        if self.plan.exposes_async() && !self.pipeline.is_async {
            entries.push(self.async_adapter());
        }
        entries
    }

    /// Direct call of a static handler with nothing to resolve.
    fn fast_path_entry(&self) -> Document<'static> {
        let call = self.handler_invocation();
        let response = self.plan.response_type();
        if self.handler.is_async {
            let returns = value_task_of(response.as_ref());
            let body = if self.handler.return_shape.is_value_task {
                eco_format!("return {call};")
            } else {
                eco_format!("return new {}({call});", render_type(&returns))
            };
            return block(
                eco_format!("public static {} HandleAsync({})", render_type(&returns), self.parameters()),
                lines(vec![text(body)]),
            );
        }
        let statement = match response {
            Some(_) => eco_format!("return {call};"),
            None => eco_format!("{call};"),
        };
        block(
            eco_format!(
                "public static {} Handle({})",
                render_type(&sync_result(response.as_ref())),
                self.parameters()
            ),
            lines(vec![text(statement)]),
        )
    }

    fn wrapped_entry(&self) -> Document<'static> {
        let response = self.plan.response_type();
        let header = if self.pipeline.is_async {
            eco_format!(
                "public static async {} HandleAsync({})",
                render_type(&value_task_of(response.as_ref())),
                self.parameters()
            )
        } else {
            eco_format!(
                "public static {} Handle({})",
                render_type(&sync_result(response.as_ref())),
                self.parameters()
            )
        };
        let mut body = self.resolutions();
        body.extend(self.stage_body(0, ReturnMode::Typed));
        block(header, lines(body))
    }

    /// Runs the pipeline, cascades, and returns element 0.
    fn cascading_entry(&self) -> Document<'static> {
        let response = self.plan.response_type();
        block(
            eco_format!(
                "public static async {} HandleAsync({})",
                render_type(&value_task_of(response.as_ref())),
                self.parameters()
            ),
            lines(vec![
                text(eco_format!("var tuple = {};", awaited(&eco_format!("HandleTupleAsync({})", Self::forward_arguments())))),
                text(eco_format!("{};", awaited("CascadeAsync(serviceProvider, tuple, cancellationToken)"))),
                Document::Str("return tuple.Item1;"),
            ]),
        )
    }

    /// Runs the pipeline and returns the whole tuple without cascading.
    fn tuple_entry(&self) -> Document<'static> {
        let mut body = self.resolutions();
        body.extend(self.stage_body(0, ReturnMode::Typed));
        block(
            eco_format!(
                "public static async {} HandleTupleAsync({})",
                render_type(&value_task_of(self.produced.as_ref())),
                self.parameters()
            ),
            lines(body),
        )
    }

    /// `HandleAsync` over a synchronous pipeline.
    fn async_adapter(&self) -> Document<'static> {
        let response = self.plan.response_type();
        let returns = value_task_of(response.as_ref());
        let call = eco_format!("Handle({})", Self::forward_arguments());
        let body = match response {
            Some(_) => vec![text(eco_format!("return new {}({call});", render_type(&returns)))],
            None => vec![
                text(eco_format!("{call};")),
                Document::Str("return default;"),
            ],
        };
        block(
            eco_format!("public static {} HandleAsync({})", render_type(&returns), self.parameters()),
            lines(body),
        )
    }

    fn untyped_entry(&self) -> Document<'static> {
        let message = render_type(&self.pipeline.message_type);
        let unit = eco_format!("{}.Value", render_name(&self.plan.names.runtime.unit));
        let header = |is_async: bool| {
            eco_format!(
                "public static {}global::System.Threading.Tasks.ValueTask<object?> UntypedHandleAsync(object message, {} serviceProvider, global::System.Threading.CancellationToken cancellationToken, global::System.Type? responseType)",
                if is_async { "async " } else { "" },
                render_name(&self.plan.names.service_provider_type)
            )
        };
        let arguments = eco_format!("serviceProvider, ({message})message, cancellationToken");

        if self.pipeline.strategy == InvocationStrategy::Cascading {
            let mut body = vec![
                text(eco_format!("var tuple = {};", awaited(&eco_format!("HandleTupleAsync({arguments})")))),
                text(eco_format!("{};", awaited("CascadeAsync(serviceProvider, tuple, cancellationToken)"))),
            ];
            let elements = match &self.produced {
                Some(TypeRef::Tuple { elements }) => elements.clone(),
                _ => Vec::new(),
            };
            for (index, element) in elements.iter().enumerate() {
                let condition = if index == 0 {
                    eco_format!(
                        "if (responseType is null || responseType == typeof(object) || responseType == {})",
                        typeof_expr(&element.ty)
                    )
                } else {
                    eco_format!("if (responseType == {})", typeof_expr(&element.ty))
                };
                body.push(block(
                    condition,
                    lines(vec![text(eco_format!("return tuple.Item{};", index + 1))]),
                ));
            }
            body.push(text(eco_format!(
                    "throw new global::{}({} + responseType + {});",
                    well_known::INVALID_OPERATION_EXCEPTION,
                    string_literal(&eco_format!(
                        "Handler '{}' cannot produce a response of type '",
                        self.handler.display_name()
                    )),
                    string_literal("'.")
                )));
            return block(header(true), lines(body));
        }

        let is_async = self.pipeline.is_async;
        let typed = if is_async {
            eco_format!("HandleAsync({arguments})")
        } else {
            eco_format!("Handle({arguments})")
        };
        let body = match (&self.produced, is_async) {
            (Some(_), true) => vec![text(eco_format!("return {};", awaited(&typed)))],
            (None, true) => vec![
                text(eco_format!("{};", awaited(&typed))),
                text(eco_format!("return {unit};")),
            ],
            (Some(_), false) => vec![text(eco_format!("return new global::System.Threading.Tasks.ValueTask<object?>({typed});"))],
            (None, false) => vec![
                text(eco_format!("{typed};")),
                text(eco_format!("return new global::System.Threading.Tasks.ValueTask<object?>({unit});")),
            ],
        };
        block(header(is_async), lines(body))
    }

    /// Publishes every non-null cascaded element, collecting failures.
    fn cascade_method(&self) -> Document<'static> {
        let tuple = self.produced.as_ref().map(render_type).unwrap_or_else(|| "object".into());
        let header = |is_async: bool| {
            eco_format!(
                "public static {}global::System.Threading.Tasks.ValueTask CascadeAsync({} serviceProvider, {tuple} tuple, global::System.Threading.CancellationToken cancellationToken)",
                if is_async { "async " } else { "" },
                render_name(&self.plan.names.service_provider_type)
            )
        };
        if self.plan.cascades.is_empty() {
            return block(header(false), lines(vec![Document::Str("return default;")]));
        }

        let list = eco_format!("global::{}<global::{}>", well_known::LIST, well_known::EXCEPTION);
        let mut body = vec![text(eco_format!("{list}? exceptions = null;"))];
        for target in &self.plan.cascades {
            let item = target.field_name.to_lowercase();
            let publish = awaited(&eco_format!(
                "{}.PublishAsync(serviceProvider, {item}, cancellationToken)",
                target.publisher
            ));
            body.push(block(
                eco_format!("if (tuple.{} is {{ }} {item})", target.field_name),
                lines(vec![
                    block("try", lines(vec![text(eco_format!("{publish};"))])),
                    block(
                        eco_format!("catch (global::{} ex)", well_known::EXCEPTION),
                        lines(vec![text(eco_format!("(exceptions ??= new {list}()).Add(ex);"))]),
                    ),
                ]),
            ));
        }
        body.push(block(
            "if (exceptions is not null)",
            lines(vec![text(eco_format!("throw new global::{}(exceptions);", well_known::AGGREGATE_EXCEPTION))]),
        ));
        block(header(true), lines(body))
    }

    // ---- pipeline body ------------------------------------------------

    /// Handler and middleware instances, resolved once per invocation.
    fn resolutions(&self) -> Vec<Document<'static>> {
        let names = &self.plan.names;
        let mut out = Vec::new();
        if !self.handler.is_static {
            out.push(text(eco_format!(
                    "var handler = {};",
                    required_service(names, &self.handler.handler_type_ref(), "serviceProvider")
                )));
        }
        for (index, middleware) in self.pipeline.middleware.iter().enumerate() {
            if middleware.needs_instance() {
                out.push(text(eco_format!(
                        "var middleware{index} = {};",
                        required_service(names, &middleware.type_ref(), "serviceProvider")
                    )));
            }
        }
        out
    }

    /// Statements for stage `s` and everything inside it.
    fn stage_body(&self, s: usize, mode: ReturnMode) -> Vec<Document<'static>> {
        let Some(segment) = self.segments.get(s) else {
            return Vec::new();
        };
        let hooks: Vec<usize> = segment.hooks.iter().map(|m| self.index_of(m)).collect();
        let around = segment.around.map(|m| self.index_of(m));
        let befores: Vec<usize> = segment.before_order().map(|m| self.index_of(m)).collect();
        let afters: Vec<usize> = segment.after_order().map(|m| self.index_of(m)).collect();
        let finallys: Vec<usize> = segment.finally_order().map(|m| self.index_of(m)).collect();

        if befores.is_empty() && afters.is_empty() && finallys.is_empty() && around.is_none() {
            let call = self.handler_invocation();
            return match (&self.produced, mode) {
                (Some(_), _) => vec![text(eco_format!("return {call};"))],
                (None, ReturnMode::Typed) => vec![text(eco_format!("{call};"))],
                (None, ReturnMode::Boxed) => vec![
                    text(eco_format!("{call};")),
                    self.unit_return(),
                ],
            };
        }

        let captures_exception = finallys.iter().any(|i| {
            self.middleware(*i)
                .hook(HookKind::Finally)
                .is_some_and(|h| h.parameter(HookParameterRole::Exception).is_some())
        });

        let mut out = Vec::new();
        for index in &hooks {
            if let Some(state) = self.state_type(*index) {
                out.push(text(eco_format!("{} state{index} = default!;", render_type(&state))));
            }
        }
        if captures_exception {
            out.push(text(eco_format!("global::{}? exception{s} = null;", well_known::EXCEPTION)));
        }
        if let Some(produced) = &self.produced {
            out.push(text(eco_format!("{} result{s} = default!;", render_type(produced))));
        }

        let mut core = Vec::new();
        for index in befores {
            let middleware = self.middleware(index);
            let Some(hook) = middleware.hook(HookKind::Before) else {
                continue;
            };
            let call = self.hook_invocation(s, index, hook, captures_exception);
            if hook.can_short_circuit() {
                core.push(text(eco_format!("var shortCircuit{index} = {call};")));
                core.push(block(
                    eco_format!("if (shortCircuit{index}.IsShortCircuited)"),
                    lines(self.short_circuit_return(s, index, mode)),
                ));
            } else if self.state_type(index).is_some() {
                core.push(text(eco_format!("state{index} = {call};")));
            } else {
                core.push(text(eco_format!("{call};")));
            }
        }
        match around {
            None => {
                let call = self.handler_invocation();
                core.push(text(match self.produced {
                    Some(_) => eco_format!("result{s} = {call};"),
                    None => eco_format!("{call};"),
                }));
            }
            Some(index) => core.extend(self.around_invocation(s, index, captures_exception)),
        }
        for index in afters {
            if let Some(hook) = self.middleware(index).hook(HookKind::After) {
                let call = self.hook_invocation(s, index, hook, captures_exception);
                core.push(text(eco_format!("{call};")));
            }
        }
        match (&self.produced, mode) {
            (Some(_), _) => core.push(text(eco_format!("return result{s};"))),
            (None, ReturnMode::Typed) => {}
            (None, ReturnMode::Boxed) => core.push(self.unit_return()),
        }

        if finallys.is_empty() {
            out.extend(core);
            return out;
        }
        out.push(block("try", lines(core)));
        if captures_exception {
            out.push(block(
                eco_format!("catch (global::{} ex{s})", well_known::EXCEPTION),
                lines(vec![
                    text(eco_format!("exception{s} = ex{s};")),
                    Document::Str("throw;"),
                ]),
            ));
        }
        let finally_calls = finallys
            .iter()
            .filter_map(|index| {
                self.middleware(*index).hook(HookKind::Finally).map(|hook| {
                    text(eco_format!("{};", self.hook_invocation(s, *index, hook, captures_exception)))
                })
            })
            .collect::<Vec<_>>();
        out.push(block("finally", lines(finally_calls)));
        out
    }

    /// The Around call, with the rest of the pipeline as its `next` lambda.
    fn around_invocation(&self, s: usize, index: usize, captures_exception: bool) -> Vec<Document<'static>> {
        let middleware = self.middleware(index);
        let Some(hook) = middleware.hook(HookKind::Around) else {
            return Vec::new();
        };
        let inner = self.stage_body(s + 1, ReturnMode::Boxed);
        let lambda = docvec![
            eco_format!("{} next{index} = async () =>", render_name(&self.plan.names.runtime.execution_delegate)),
            line(),
            "{",
            nest(INDENT, lines(inner)),
            line(),
            "};",
        ];
        let call = self.hook_invocation(s, index, hook, captures_exception);
        let mut out = vec![lambda];
        match &self.produced {
            Some(produced) => {
                out.push(text(eco_format!("var boxed{s} = {call};")));
                out.push(text(eco_format!("result{s} = ({})boxed{s}!;", render_type(produced))));
            }
            None => out.push(text(eco_format!("{call};"))),
        }
        out
    }

    fn short_circuit_return(&self, s: usize, index: usize, mode: ReturnMode) -> Vec<Document<'static>> {
        match (&self.produced, mode) {
            (Some(produced), _) => vec![
                text(eco_format!("result{s} = ({})shortCircuit{index}.Value!;", render_type(produced))),
                text(eco_format!("return result{s};")),
            ],
            (None, ReturnMode::Typed) => vec![Document::Str("return;")],
            (None, ReturnMode::Boxed) => vec![self.unit_return()],
        }
    }

    fn unit_return(&self) -> Document<'static> {
        text(eco_format!("return {}.Value;", render_name(&self.plan.names.runtime.unit)))
    }

    /// Type of the value a Before hook hands to its own After/Finally hooks,
    /// when any of them reads it.
    fn state_type(&self, index: usize) -> Option<TypeRef> {
        let middleware = self.middleware(index);
        let state = middleware.hook(HookKind::Before)?.state_type()?;
        let read = [HookKind::After, HookKind::Finally].into_iter().any(|kind| {
            middleware
                .hook(kind)
                .is_some_and(|h| h.parameter(HookParameterRole::BeforeState).is_some())
        });
        read.then_some(state)
    }

    fn handler_invocation(&self) -> EcoString {
        let names = &self.plan.names;
        let handler = self.handler;
        let target = if handler.is_static {
            render_name(&handler.handler_type)
        } else {
            "handler".into()
        };
        let generics = if self.plan.type_arguments.is_empty() {
            EcoString::new()
        } else {
            let args: Vec<EcoString> = self.plan.type_arguments.iter().map(render_type).collect();
            eco_format!("<{}>", args.join(", "))
        };
        let arguments: Vec<EcoString> = handler
            .parameters
            .iter()
            .map(|p| match p.role {
                ParameterRole::Message => "message".into(),
                ParameterRole::CancellationToken => "cancellationToken".into(),
                ParameterRole::ServiceProvider => "serviceProvider".into(),
                ParameterRole::Dependency { optional: true } => {
                    optional_service(&p.ty.substitute(&self.bindings), "serviceProvider")
                }
                ParameterRole::Dependency { optional: false } => {
                    required_service(names, &p.ty.substitute(&self.bindings), "serviceProvider")
                }
            })
            .collect();
        let call = eco_format!("{target}.{}{generics}({})", handler.method_name, arguments.join(", "));
        if handler.is_async && self.pipeline.strategy != InvocationStrategy::StaticFastPath {
            awaited(&call)
        } else {
            call
        }
    }

    fn hook_invocation(&self, s: usize, index: usize, hook: &HookMethod, captures_exception: bool) -> EcoString {
        let middleware = self.middleware(index);
        let target = if hook.is_static {
            render_name(&middleware.middleware_type)
        } else {
            eco_format!("middleware{index}")
        };
        let arguments: Vec<EcoString> = hook
            .parameters
            .iter()
            .map(|p| self.hook_argument(s, index, hook, p, captures_exception))
            .collect();
        let call = eco_format!("{target}.{}({})", hook.method_name, arguments.join(", "));
        if hook.is_async { awaited(&call) } else { call }
    }

    fn hook_argument(
        &self,
        s: usize,
        index: usize,
        hook: &HookMethod,
        parameter: &HookParameter,
        captures_exception: bool,
    ) -> EcoString {
        match parameter.role {
            HookParameterRole::Message => "message".into(),
            HookParameterRole::CancellationToken => "cancellationToken".into(),
            HookParameterRole::Result => self.result_argument(s, &parameter.ty),
            HookParameterRole::Exception if hook.kind == HookKind::Finally && captures_exception => {
                eco_format!("exception{s}")
            }
            HookParameterRole::Exception => "null".into(),
            HookParameterRole::BeforeState
                if hook.kind != HookKind::Before && self.state_type(index).is_some() =>
            {
                eco_format!("state{index}")
            }
            HookParameterRole::BeforeState => "default!".into(),
            HookParameterRole::Next => eco_format!("next{index}"),
            HookParameterRole::Dependency { optional: true } => {
                optional_service(&parameter.ty, "serviceProvider")
            }
            HookParameterRole::Dependency { optional: false } => {
                required_service(&self.plan.names, &parameter.ty, "serviceProvider")
            }
        }
    }

    fn result_argument(&self, s: usize, ty: &TypeRef) -> EcoString {
        let Some(produced) = &self.produced else {
            return "default!".into();
        };
        if ty.is_object() || ty.contains_type_parameter() || ty.key() == produced.key() {
            eco_format!("result{s}")
        } else {
            eco_format!("({})((object?)result{s})!", render_type(ty))
        }
    }
}
