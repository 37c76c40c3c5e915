// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Generation driver.
//!
//! **DDD Context:** Generation
//!
//! One pass runs every analysis over a [`Compilation`] snapshot, plans the
//! files to emit, and renders them:
//!
//! ```text
//! discover handlers ─┐
//! discover middleware┼─► match + compose ─► plan wrappers, publishers,
//! resolve call sites ┘                      interceptors, registry ─► render
//! ```
//!
//! The pass is a pure function of the snapshot and the configuration. The
//! [`Generator`] only keeps memo tables between passes, so rerunning on an
//! unchanged snapshot reuses every rendered file, and output is sorted so
//! reruns are byte-identical.

use crate::analysis::call_sites::{CallSiteRecord, DispatchKind, resolve_call_sites};
use crate::analysis::handlers::{HandlerId, HandlerRecord, MessageKind, discover_handlers};
use crate::analysis::matcher::{HandlerMatcher, MatchError};
use crate::analysis::middleware::{dead_middleware, discover_middleware};
use crate::analysis::pipeline::{InvocationStrategy, PipelineComposer};
use crate::analysis::AnalysisContext;
use crate::cache::{CacheStats, IncrementalCache, SourceKey};
use crate::cancellation::{CancellationToken, Cancelled};
use crate::codegen::handler_wrapper::{self, CascadeTarget, WrapperPlan, WrapperRef};
use crate::codegen::interceptor::{self, InterceptorFilePlan, InterceptorPlan};
use crate::codegen::names::{
    disambiguate, generated_namespace, interceptor_class_name, publisher_class_name, wrapper_class_name,
};
use crate::codegen::publisher::{self, PublisherPlan};
use crate::codegen::registry::{self, RegistryPlan};
use crate::codegen::{EmitNames, GeneratedSource};
use crate::config::GeneratorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticId};
use crate::symbols::{Compilation, Origin, SymbolTable, TypeRef};
use camino::Utf8PathBuf;
use ecow::{EcoString, eco_format};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::{debug, info, instrument, warn};

/// Why a pass produced no output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("generation pass was cancelled")]
    Cancelled,
}

impl From<Cancelled> for GenerateError {
    fn from(_: Cancelled) -> Self {
        GenerateError::Cancelled
    }
}

/// Files and diagnostics produced by one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorOutput {
    /// Sorted by hint name.
    pub sources: Vec<GeneratedSource>,
    /// Sorted by location, then id.
    pub diagnostics: Vec<Diagnostic>,
}

impl GeneratorOutput {
    /// The source added under `hint_name`, if any.
    #[must_use]
    pub fn source(&self, hint_name: &str) -> Option<&GeneratedSource> {
        self.sources.iter().find(|s| s.hint_name == hint_name)
    }

    /// True when any diagnostic fails the build.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// A generator holding configuration and the memo tables reused across
/// passes.
#[derive(Debug, Default)]
pub struct Generator {
    config: GeneratorConfig,
    cache: IncrementalCache,
}

impl Generator {
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            cache: IncrementalCache::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Hit/miss counters of the most recent pass.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Runs one generation pass over `compilation`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Cancelled`] if `cancel` fires; the memo
    /// tables keep their previous contents.
    #[instrument(skip_all, fields(assembly = %compilation.assembly.name))]
    pub fn run(
        &mut self,
        compilation: &Compilation,
        cancel: &CancellationToken,
    ) -> Result<GeneratorOutput, GenerateError> {
        self.cache.begin_pass();
        let output = run_pass(&self.config, &mut self.cache, compilation, cancel)?;
        self.cache.end_pass();
        info!(
            sources = output.sources.len(),
            diagnostics = output.diagnostics.len(),
            hits = self.cache.stats().total_hits(),
            "Generation pass complete"
        );
        Ok(output)
    }
}

/// One-shot generation without reuse between passes.
///
/// # Errors
///
/// Returns [`GenerateError::Cancelled`] if `cancel` fires.
pub fn generate(
    compilation: &Compilation,
    config: &GeneratorConfig,
    cancel: &CancellationToken,
) -> Result<GeneratorOutput, GenerateError> {
    Generator::new(config.clone()).run(compilation, cancel)
}

fn run_pass(
    config: &GeneratorConfig,
    cache: &mut IncrementalCache,
    compilation: &Compilation,
    cancel: &CancellationToken,
) -> Result<GeneratorOutput, GenerateError> {
    let table = SymbolTable::build(compilation);
    let ctx = AnalysisContext::new(config, &table);
    let mut diagnostics = Vec::new();

    let handlers = discover_handlers(&ctx, cache, cancel)?;
    diagnostics.extend(handlers.diagnostics);
    let explicit: Vec<TypeRef> = handlers
        .handlers
        .iter()
        .flat_map(|h| h.explicit_middleware.iter().cloned())
        .collect();
    let middleware = discover_middleware(&ctx, cache, &explicit, cancel)?;
    let sites = resolve_call_sites(&ctx, &mut cache.shapes, cancel)?;
    diagnostics.extend(dead_middleware(&middleware.middleware, &handlers.handlers, &ctx.hierarchy));

    let mut planner = Planner {
        ctx,
        matcher: HandlerMatcher::new(&handlers.handlers, ctx.hierarchy),
        composer: PipelineComposer::new(&middleware.middleware, ctx.hierarchy),
        names: EmitNames::from_config(config),
        namespace: generated_namespace(&config.generated_namespace, &compilation.assembly.name),
        wrappers: BTreeMap::new(),
        class_names: HashMap::new(),
        publishers: BTreeMap::new(),
        pending: VecDeque::new(),
        diagnostics,
    };
    let plans = planner.plan(&sites, cancel)?;
    let mut diagnostics = planner.diagnostics;

    let mut sources = Vec::new();
    for key in plans {
        cancel.check()?;
        sources.push(render_cached(cache, key));
    }
    sources.sort_by(|a, b| a.hint_name.cmp(&b.hint_name));

    for diagnostic in &mut diagnostics {
        diagnostic.severity = config.severity_for(diagnostic.id);
    }
    diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    diagnostics.dedup();

    Ok(GeneratorOutput { sources, diagnostics })
}

fn render_cached(cache: &mut IncrementalCache, key: SourceKey) -> GeneratedSource {
    cache.sources.get_or_insert_with(key, |key| match key {
        SourceKey::Wrapper(plan) => handler_wrapper::render(plan),
        SourceKey::Publisher(plan) => publisher::render(plan),
        SourceKey::Interceptors(plan) => interceptor::render(plan),
        SourceKey::Registry(plan) => registry::render(plan),
        SourceKey::Polyfill => registry::render_polyfill(),
    })
}

/// A wrapper this compilation emits, or one it reaches in a referenced
/// module.
#[derive(Debug, Clone)]
struct WrapperEntry {
    /// `None` for wrappers emitted by a referenced assembly.
    plan: Option<WrapperPlan>,
    reference: WrapperRef,
}

#[derive(Debug, Clone)]
struct PublisherEntry {
    message_type: TypeRef,
    class_name: EcoString,
    targets: Vec<WrapperRef>,
}

struct Planner<'h, 'a> {
    ctx: AnalysisContext<'a>,
    matcher: HandlerMatcher<'h, 'a>,
    composer: PipelineComposer<'h, 'a>,
    names: EmitNames,
    namespace: EcoString,
    /// Keyed by handler identity and message key.
    wrappers: BTreeMap<(HandlerId, EcoString), Option<WrapperEntry>>,
    /// Class name to the identity that claimed it.
    class_names: HashMap<EcoString, EcoString>,
    publishers: BTreeMap<EcoString, PublisherEntry>,
    /// Publishers whose targets are not yet planned.
    pending: VecDeque<EcoString>,
    diagnostics: Vec<Diagnostic>,
}

impl<'h> Planner<'h, '_> {
    /// Plans every file of the pass, returning their render keys.
    fn plan(&mut self, sites: &[CallSiteRecord], cancel: &CancellationToken) -> Result<Vec<SourceKey>, Cancelled> {
        let excluded = self.report_ambiguities(sites);

        // Every local handler of a concrete message gets a wrapper, so the
        // registry covers messages no call site names.
        let handlers: Vec<&'h HandlerRecord> = self
            .matcher
            .handlers()
            .iter()
            .filter(|h| h.origin.is_local() && h.message.kind == MessageKind::Exact)
            .collect();
        for handler in handlers {
            cancel.check()?;
            if excluded.contains(&(handler.id(), handler.message.key.clone())) {
                debug!(handler = %handler.display_name(), "Ambiguous handler; wrapper omitted");
                continue;
            }
            let message = handler.message.type_ref.clone();
            self.wrapper_for(handler, &message);
        }

        let mut files: BTreeMap<Utf8PathBuf, Vec<InterceptorPlan>> = BTreeMap::new();
        for site in sites {
            cancel.check()?;
            let planned = match site.kind {
                DispatchKind::Invoke => self.plan_invoke_site(site),
                DispatchKind::Publish => self.plan_publish_site(site, cancel)?,
            };
            if let Some(plan) = planned {
                files.entry(site.location.path.clone()).or_default().push(plan);
            }
        }
        self.drain_publishers(cancel)?;

        let mut keys = Vec::new();
        let mut registry_wrappers = Vec::new();
        for entry in self.wrappers.values().flatten() {
            if let Some(plan) = &entry.plan {
                registry_wrappers.push(entry.reference.clone());
                keys.push(SourceKey::Wrapper(plan.clone()));
            }
        }
        for entry in self.publishers.values() {
            keys.push(SourceKey::Publisher(PublisherPlan {
                namespace: self.namespace.clone(),
                class_name: entry.class_name.clone(),
                message_type: entry.message_type.clone(),
                targets: entry.targets.clone(),
                names: self.names.clone(),
            }));
        }

        let config = self.ctx.config;
        if config.interceptors && !files.is_empty() {
            for (path, interceptors) in files {
                keys.push(SourceKey::Interceptors(InterceptorFilePlan {
                    namespace: self.namespace.clone(),
                    class_name: interceptor_class_name(&path),
                    interceptors,
                    names: self.names.clone(),
                }));
            }
            if config.intercepts_location_polyfill {
                keys.push(SourceKey::Polyfill);
            }
        }
        if config.registry && !registry_wrappers.is_empty() {
            keys.push(SourceKey::Registry(RegistryPlan {
                namespace: self.namespace.clone(),
                wrappers: registry_wrappers,
                runtime: config.runtime.clone(),
            }));
        }
        info!(files = keys.len(), "Planning complete");
        Ok(keys)
    }

    /// Reports each message that single-target call sites name but more
    /// than one handler matches equally well, and returns the (handler,
    /// message) pairs whose default wrapper is withheld.
    fn report_ambiguities(&mut self, sites: &[CallSiteRecord]) -> HashSet<(HandlerId, EcoString)> {
        let broadcast: HashSet<&EcoString> = sites
            .iter()
            .filter(|s| s.kind == DispatchKind::Publish)
            .map(|s| &s.message_key)
            .collect();
        let mut reported = HashSet::new();
        let mut excluded = HashSet::new();
        for site in sites.iter().filter(|s| s.kind == DispatchKind::Invoke) {
            if !reported.insert(site.message_key.clone()) {
                continue;
            }
            let Err(MatchError::Ambiguous(candidates)) = self.matcher.match_single(&site.message_type) else {
                continue;
            };
            let names: Vec<EcoString> = candidates.iter().map(|h| h.display_name()).collect();
            for candidate in &candidates {
                let others = candidates
                    .iter()
                    .filter(|other| other.id() != candidate.id())
                    .filter_map(|other| other.location.clone());
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticId::AmbiguousHandler,
                        eco_format!(
                            "Handler '{}' is one of several equally specific handlers for message '{}': {}",
                            candidate.display_name(),
                            site.message_key,
                            names.join(", ")
                        ),
                        candidate.location.clone(),
                    )
                    .with_related(others)
                    .with_hint("remove all but one handler, or publish the message instead"),
                );
                if !broadcast.contains(&site.message_key) {
                    excluded.insert((candidate.id(), candidate.message.key.clone()));
                }
            }
        }
        excluded
    }

    fn plan_invoke_site(&mut self, site: &CallSiteRecord) -> Option<InterceptorPlan> {
        let handler = match self.matcher.match_single(&site.message_type) {
            Ok(handler) => handler,
            Err(MatchError::NotFound) if site.is_open => {
                debug!(site = %site.location, message = %site.message_key, "Open call site has no handler");
                return None;
            }
            Err(MatchError::NotFound) => {
                warn!(site = %site.location, message = %site.message_key, "No handler; call falls back to runtime dispatch");
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticId::UnmatchedCallSite,
                        eco_format!("No handler found for message '{}'", site.message_key),
                        Some(site.location.clone()),
                    )
                    .with_hint("the call falls back to runtime dispatch"),
                );
                return None;
            }
            // Reported once per message at the handler declarations.
            Err(MatchError::Ambiguous(_)) => return None,
        };

        if !self.check_visibility(handler, Some(site)) {
            return None;
        }
        let wrapper = self.wrapper_for(handler, &site.message_type)?;
        match interceptor::plan_invoke(site, &wrapper, &self.ctx.hierarchy) {
            Ok(target) => {
                if let interceptor::InterceptTarget::Invoke {
                    conversion: interceptor::ResponseConversion::TupleElement { .. },
                    ..
                } = &target
                {
                    debug!(site = %site.location, "Call site selects a cascaded tuple element");
                }
                Some(InterceptorPlan {
                    site: site.clone(),
                    target,
                })
            }
            Err(diagnostic) => {
                warn!(site = %site.location, id = %diagnostic.id, "Interceptor skipped");
                self.diagnostics.push(diagnostic);
                None
            }
        }
    }

    fn plan_publish_site(
        &mut self,
        site: &CallSiteRecord,
        cancel: &CancellationToken,
    ) -> Result<Option<InterceptorPlan>, Cancelled> {
        if site.is_open {
            debug!(site = %site.location, "Open publish site left to runtime dispatch");
            return Ok(None);
        }
        if self.matcher.match_all(&site.message_type).is_empty() {
            debug!(site = %site.location, message = %site.message_key, "Publish site has no compile-time handler");
            return Ok(None);
        }
        let key = self.publisher_for(&site.message_type);
        self.drain_publishers(cancel)?;
        let Some(entry) = self.publishers.get(&key) else {
            return Ok(None);
        };
        let class_path = eco_format!("global::{}.{}", self.namespace, entry.class_name);
        let has_sync_entry = !entry.targets.is_empty() && entry.targets.iter().all(|t| !t.is_async);
        match interceptor::plan_publish(site, class_path, has_sync_entry) {
            Ok(target) => Ok(Some(InterceptorPlan {
                site: site.clone(),
                target,
            })),
            Err(diagnostic) => {
                warn!(site = %site.location, id = %diagnostic.id, "Interceptor skipped");
                self.diagnostics.push(diagnostic);
                Ok(None)
            }
        }
    }

    /// Registers the publisher for `message` and returns its key.
    fn publisher_for(&mut self, message: &TypeRef) -> EcoString {
        let message = message.canonical().non_nullable().clone();
        let key = message.key();
        if !self.publishers.contains_key(&key) {
            let class_name = self.claim_class_name(publisher_class_name(&message), &key);
            self.publishers.insert(
                key.clone(),
                PublisherEntry {
                    message_type: message,
                    class_name,
                    targets: Vec::new(),
                },
            );
            self.pending.push_back(key.clone());
        }
        key
    }

    /// Plans the targets of every pending publisher. Cascading targets may
    /// queue further publishers.
    fn drain_publishers(&mut self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        while let Some(key) = self.pending.pop_front() {
            cancel.check()?;
            let Some(message) = self.publishers.get(&key).map(|p| p.message_type.clone()) else {
                continue;
            };
            let mut targets = Vec::new();
            for handler in self.matcher.match_all(&message) {
                if !self.check_visibility(handler, None) {
                    continue;
                }
                if let Some(wrapper) = self.wrapper_for(handler, &message) {
                    targets.push(wrapper);
                }
            }
            debug!(message = %key, targets = targets.len(), "Planned publisher");
            if let Some(entry) = self.publishers.get_mut(&key) {
                entry.targets = targets;
            }
        }
        Ok(())
    }

    /// Referenced handlers are reachable only when public.
    fn check_visibility(&mut self, handler: &HandlerRecord, site: Option<&CallSiteRecord>) -> bool {
        if handler.origin.is_local() || handler.is_public {
            return true;
        }
        let location = site.map(|s| s.location.clone()).or_else(|| handler.location.clone());
        warn!(handler = %handler.display_name(), "Referenced handler is not public; skipped");
        self.diagnostics.push(
            Diagnostic::new(
                DiagnosticId::NonPublicCrossAssembly,
                eco_format!(
                    "Handler '{}' is declared in another assembly and is not public with all of its signature types",
                    handler.display_name()
                ),
                location,
            )
            .with_hint("the call falls back to runtime dispatch"),
        );
        false
    }

    /// The wrapper running `handler` for `message`, planning it on first use.
    fn wrapper_for(&mut self, handler: &HandlerRecord, message: &TypeRef) -> Option<WrapperRef> {
        let message = message.canonical().non_nullable().clone();
        let key = (handler.id(), message.key());
        if let Some(existing) = self.wrappers.get(&key) {
            return existing.as_ref().map(|e| e.reference.clone());
        }
        // Claimed before planning so cascade cycles terminate.
        self.wrappers.insert(key.clone(), None);

        let entry = match &handler.origin {
            Origin::Referenced { assembly } if handler.message.kind == MessageKind::Exact => {
                Some(self.referenced_wrapper(handler, assembly))
            }
            _ => self.local_wrapper(handler, &message),
        };
        let reference = entry.as_ref().map(|e| e.reference.clone());
        self.wrappers.insert(key, entry);
        reference
    }

    /// A referenced module emits a public wrapper for each of its handlers;
    /// calls forward to its typed async entry.
    fn referenced_wrapper(&self, handler: &HandlerRecord, assembly: &str) -> WrapperEntry {
        let namespace = generated_namespace(&self.ctx.config.generated_namespace, assembly);
        let class_name = wrapper_class_name(&handler.handler_type, &handler.message.type_ref);
        debug!(handler = %handler.display_name(), assembly, "Forwarding to referenced wrapper");
        WrapperEntry {
            plan: None,
            reference: WrapperRef {
                class_path: eco_format!("global::{namespace}.{class_name}"),
                message_type: handler.message.type_ref.clone(),
                is_async: true,
                response: handler.response_type().cloned(),
                tuple: handler
                    .is_cascading()
                    .then(|| handler.return_shape.unwrapped_type.clone()),
                handler_display: handler.display_name(),
            },
        }
    }

    fn local_wrapper(&mut self, handler: &HandlerRecord, message: &TypeRef) -> Option<WrapperEntry> {
        let bindings = self.matcher.bind_generic(handler, message)?;
        let type_arguments: Vec<TypeRef> = handler
            .generic_parameters
            .iter()
            .map(|p| bindings.get(&p.name).cloned().unwrap_or(TypeRef::Error))
            .collect();
        if type_arguments.iter().any(TypeRef::contains_error) {
            return None;
        }

        let composition = self.composer.compose(handler, message);
        self.diagnostics.extend(composition.diagnostics);
        let identity = eco_format!("{}|{}", handler.display_name(), message.key());
        let class_name = self.claim_class_name(wrapper_class_name(&handler.handler_type, message), &identity);
        let table = self.ctx.table;
        let is_public = self.ctx.is_module()
            && handler.is_public
            && table.is_public(message)
            && type_arguments.iter().all(|t| table.is_public(t));

        let mut plan = WrapperPlan {
            namespace: self.namespace.clone(),
            class_name,
            is_public,
            pipeline: composition.pipeline,
            type_arguments,
            cascades: Vec::new(),
            names: self.names.clone(),
        };
        if plan.pipeline.strategy == InvocationStrategy::Cascading {
            if let Some(TypeRef::Tuple { elements }) = plan.tuple_type() {
                for (index, element) in elements.iter().enumerate().skip(1) {
                    let element_type = element.ty.canonical().non_nullable().clone();
                    let key = self.publisher_for(&element_type);
                    let publisher = self
                        .publishers
                        .get(&key)
                        .map(|p| eco_format!("global::{}.{}", self.namespace, p.class_name))
                        .unwrap_or_default();
                    plan.cascades.push(CascadeTarget {
                        field_name: eco_format!("Item{}", index + 1),
                        element_type,
                        publisher,
                    });
                }
            }
        }
        debug!(class = %plan.class_name, strategy = ?plan.pipeline.strategy, "Planned wrapper");
        Some(WrapperEntry {
            reference: plan.wrapper_ref(),
            plan: Some(plan),
        })
    }

    /// `name`, or a hashed variant when another identity already holds it.
    fn claim_class_name(&mut self, name: EcoString, identity: &str) -> EcoString {
        match self.class_names.get(&name) {
            None => {
                self.class_names.insert(name.clone(), identity.into());
                name
            }
            Some(owner) if owner == identity => name,
            Some(_) => {
                let renamed = disambiguate(&name, identity);
                self.class_names.insert(renamed.clone(), identity.into());
                renamed
            }
        }
    }
}
