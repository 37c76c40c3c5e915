// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Normalized descriptors of signature types.
//!
//! **DDD Context:** Analysis / Value Object
//!
//! A [`TypeShape`] answers every question the later passes ask about a
//! return or parameter type: is it awaitable, nullable, the library's own
//! outcome type, a cascading tuple. Shapes are computed from canonical
//! type references, so `Task<int?>` and `global::System.Threading.Tasks.Task<Nullable<System.Int32>>`
//! resolve to equal shapes.

use crate::config::RuntimeNames;
use crate::symbols::{TypeRef, well_known};
use ecow::{EcoString, eco_format};

/// Descriptor of a type as the generator sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeShape {
    /// Human-readable spelling of the original type.
    pub display_name: EcoString,
    /// Identity key of the original type.
    pub full_name: EcoString,
    /// Identity key after stripping the async and nullable layers.
    pub unwrapped_name: EcoString,
    pub unwrapped_type: TypeRef,
    pub is_nullable: bool,
    pub is_async_wrapper: bool,
    /// The async wrapper is the value-task variant.
    pub is_value_task: bool,
    /// `void`, or an async wrapper without a result.
    pub is_void: bool,
    pub is_outcome_type: bool,
    pub is_generic_outcome: bool,
    pub is_untyped_handler_result: bool,
    pub is_cancellation_token: bool,
    pub is_object: bool,
    pub is_tuple_return: bool,
    pub tuple_elements: Vec<TupleElementShape>,
    /// Tuple element 0 is itself awaitable, which cascading cannot express.
    pub tuple_primary_is_async: bool,
}

/// One element of a tuple return.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleElementShape {
    /// Declared element name, if any.
    pub element_name: Option<EcoString>,
    /// Backing field (`Item1`, `Item2`, ...).
    pub field_name: EcoString,
    /// Element type with nullability stripped.
    pub element_type: TypeRef,
    pub full_name: EcoString,
    pub is_nullable: bool,
}

impl TypeShape {
    /// Resolves the shape of `ty`.
    #[must_use]
    pub fn resolve(ty: &TypeRef, runtime: &RuntimeNames) -> Self {
        let original = ty.canonical();

        // (1) async wrapper
        let (after_async, is_async_wrapper, is_value_task, async_void) = match &original {
            TypeRef::Named { name, args, .. } if is_task_like(name) => {
                let value_task = name == well_known::VALUE_TASK;
                match args.first() {
                    Some(inner) if args.len() == 1 => (inner.clone(), true, value_task, false),
                    _ => (TypeRef::void(), true, value_task, true),
                }
            }
            other => (other.clone(), false, false, false),
        };

        // (2) nullable wrapper
        let (unwrapped, is_nullable) = match after_async {
            TypeRef::Nullable { inner } => (*inner, true),
            other => (other, false),
        };

        // (3) classify
        let definition = unwrapped.definition_name().unwrap_or_default();
        let is_void = async_void || unwrapped.is_void();
        let is_outcome_type = definition == runtime.result;
        let is_generic_outcome = is_outcome_type && !unwrapped.type_args().is_empty();
        let is_untyped_handler_result = definition == runtime.handler_result;
        let is_cancellation_token = definition == well_known::CANCELLATION_TOKEN;
        let is_object = unwrapped.is_object();

        // (4) tuple elements: nullability only
        let (is_tuple_return, tuple_elements, tuple_primary_is_async) = match &unwrapped {
            TypeRef::Tuple { elements } => {
                let shapes: Vec<TupleElementShape> = elements
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        let is_nullable = matches!(element.ty, TypeRef::Nullable { .. });
                        let element_type = element.ty.non_nullable().clone();
                        TupleElementShape {
                            element_name: element.name.clone(),
                            field_name: eco_format!("Item{}", index + 1),
                            full_name: element_type.key(),
                            element_type,
                            is_nullable,
                        }
                    })
                    .collect();
                let primary_async = shapes
                    .first()
                    .and_then(|e| e.element_type.definition_name())
                    .is_some_and(|name| is_task_like(&name));
                (true, shapes, primary_async)
            }
            _ => (false, Vec::new(), false),
        };

        Self {
            display_name: original.to_string().into(),
            full_name: original.key(),
            unwrapped_name: unwrapped.key(),
            unwrapped_type: unwrapped,
            is_nullable,
            is_async_wrapper,
            is_value_task,
            is_void,
            is_outcome_type,
            is_generic_outcome,
            is_untyped_handler_result,
            is_cancellation_token,
            is_object,
            is_tuple_return,
            tuple_elements,
            tuple_primary_is_async,
        }
    }

    /// Shape of the unwrapped type. Idempotent.
    #[must_use]
    pub fn unwrapped(&self, runtime: &RuntimeNames) -> Self {
        Self::resolve(&self.unwrapped_type, runtime)
    }

    /// The value a caller receives after awaiting: tuple element 0 for
    /// cascading returns, `None` for void.
    #[must_use]
    pub fn primary_response(&self) -> Option<&TypeRef> {
        if self.is_void {
            None
        } else if self.is_tuple_return {
            self.tuple_elements.first().map(|e| &e.element_type)
        } else {
            Some(&self.unwrapped_type)
        }
    }

    /// The awaited value type including nullability, or `None` for void.
    #[must_use]
    pub fn value_type(&self) -> Option<TypeRef> {
        if self.is_void {
            None
        } else if self.is_nullable {
            Some(self.unwrapped_type.clone().nullable())
        } else {
            Some(self.unwrapped_type.clone())
        }
    }

    /// Keys of tuple element types that occur more than once.
    #[must_use]
    pub fn duplicate_tuple_elements(&self) -> Vec<EcoString> {
        let mut seen: Vec<&EcoString> = Vec::new();
        let mut duplicates = Vec::new();
        for element in &self.tuple_elements {
            if seen.contains(&&element.full_name) {
                if !duplicates.contains(&element.full_name) {
                    duplicates.push(element.full_name.clone());
                }
            } else {
                seen.push(&element.full_name);
            }
        }
        duplicates
    }

    /// Index of the tuple element whose type key is `key`.
    #[must_use]
    pub fn tuple_element_index(&self, key: &str) -> Option<usize> {
        self.tuple_elements.iter().position(|e| e.full_name == key)
    }
}

fn is_task_like(name: &str) -> bool {
    name == well_known::TASK || name == well_known::VALUE_TASK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::TupleElementRef;

    fn runtime() -> RuntimeNames {
        RuntimeNames::default()
    }

    fn task(inner: TypeRef) -> TypeRef {
        TypeRef::generic("System.Threading.Tasks.Task", vec![inner])
    }

    #[test]
    fn plain_type() {
        let shape = TypeShape::resolve(&TypeRef::named("Demo.Order"), &runtime());
        assert!(!shape.is_async_wrapper);
        assert!(!shape.is_nullable);
        assert_eq!(shape.unwrapped_name, "Demo.Order");
        assert_eq!(shape.primary_response(), Some(&TypeRef::named("Demo.Order")));
    }

    #[test]
    fn task_of_nullable_value_type() {
        let ty = task(TypeRef::generic("System.Nullable", vec![TypeRef::named("int")]));
        let shape = TypeShape::resolve(&ty, &runtime());
        assert!(shape.is_async_wrapper);
        assert!(!shape.is_value_task);
        assert!(shape.is_nullable);
        assert_eq!(shape.unwrapped_name, "System.Int32");
        assert_eq!(shape.full_name, "System.Threading.Tasks.Task<System.Int32?>");
    }

    #[test]
    fn non_generic_tasks_are_void() {
        let shape = TypeShape::resolve(&TypeRef::value("System.Threading.Tasks.ValueTask"), &runtime());
        assert!(shape.is_async_wrapper);
        assert!(shape.is_value_task);
        assert!(shape.is_void);
        assert_eq!(shape.primary_response(), None);
        assert_eq!(shape.value_type(), None);
    }

    #[test]
    fn differently_spelled_types_resolve_equal() {
        let a = TypeShape::resolve(&task(TypeRef::named("int").nullable()), &runtime());
        let b = TypeShape::resolve(
            &TypeRef::generic(
                "global::System.Threading.Tasks.Task`1",
                vec![TypeRef::generic("System.Nullable`1", vec![TypeRef::named("System.Int32")])],
            ),
            &runtime(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn unwrapping_is_idempotent() {
        let shape = TypeShape::resolve(&task(TypeRef::named("string").nullable()), &runtime());
        let once = shape.unwrapped(&runtime());
        assert_eq!(once.unwrapped(&runtime()), once);
        assert!(!once.is_async_wrapper);
        assert!(!once.is_nullable);
    }

    #[test]
    fn outcome_and_short_circuit_types() {
        let generic = TypeShape::resolve(
            &task(TypeRef::generic("Switchboard.Result", vec![TypeRef::named("Demo.Order")])),
            &runtime(),
        );
        assert!(generic.is_outcome_type);
        assert!(generic.is_generic_outcome);

        let plain = TypeShape::resolve(&TypeRef::named("Switchboard.Result"), &runtime());
        assert!(plain.is_outcome_type);
        assert!(!plain.is_generic_outcome);

        let marker = TypeShape::resolve(&TypeRef::named("Switchboard.HandlerResult"), &runtime());
        assert!(marker.is_untyped_handler_result);
    }

    #[test]
    fn cancellation_token_and_object() {
        let token = TypeShape::resolve(&TypeRef::value("System.Threading.CancellationToken"), &runtime());
        assert!(token.is_cancellation_token);
        let object = TypeShape::resolve(&TypeRef::named("object").nullable(), &runtime());
        assert!(object.is_object);
        assert!(object.is_nullable);
    }

    #[test]
    fn cascading_tuple_elements() {
        let ty = task(TypeRef::tuple(vec![
            TupleElementRef::new(Some("order"), TypeRef::generic("Switchboard.Result", vec![TypeRef::named("Demo.Order")])),
            TupleElementRef::new(Some("created"), TypeRef::named("Demo.OrderCreated").nullable()),
        ]));
        let shape = TypeShape::resolve(&ty, &runtime());
        assert!(shape.is_tuple_return);
        assert!(!shape.tuple_primary_is_async);
        assert_eq!(shape.tuple_elements.len(), 2);
        assert_eq!(shape.tuple_elements[1].field_name, "Item2");
        assert_eq!(shape.tuple_elements[1].element_name.as_deref(), Some("created"));
        assert!(shape.tuple_elements[1].is_nullable);
        assert_eq!(shape.tuple_element_index("Demo.OrderCreated"), Some(1));
        assert_eq!(
            shape.primary_response().map(TypeRef::key),
            Some("Switchboard.Result<Demo.Order>".into())
        );
    }

    #[test]
    fn async_primary_element_is_flagged() {
        let ty = TypeRef::tuple(vec![
            TupleElementRef::new(None, task(TypeRef::named("Demo.Order"))),
            TupleElementRef::new(None, TypeRef::named("Demo.OrderCreated")),
        ]);
        assert!(TypeShape::resolve(&ty, &runtime()).tuple_primary_is_async);
    }

    #[test]
    fn duplicate_elements_are_reported_once() {
        let ty = TypeRef::tuple(vec![
            TupleElementRef::new(None, TypeRef::named("Demo.Order")),
            TupleElementRef::new(None, TypeRef::named("Demo.Created").nullable()),
            TupleElementRef::new(None, TypeRef::named("Demo.Created")),
            TupleElementRef::new(None, TypeRef::named("Demo.Created")),
        ]);
        let shape = TypeShape::resolve(&ty, &runtime());
        assert_eq!(shape.duplicate_tuple_elements(), vec![EcoString::from("Demo.Created")]);
    }
}
