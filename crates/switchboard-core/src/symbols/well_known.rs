// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Host platform types the generator must recognize by name.
//!
//! Library-specific names (façade, markers, outcome types) are configurable
//! and live in [`crate::config`]; the names here belong to the host runtime
//! and never change.

pub const VOID: &str = "System.Void";
pub const OBJECT: &str = "System.Object";
pub const STRING: &str = "System.String";
pub const TYPE: &str = "System.Type";
pub const EXCEPTION: &str = "System.Exception";
pub const AGGREGATE_EXCEPTION: &str = "System.AggregateException";
pub const INVALID_OPERATION_EXCEPTION: &str = "System.InvalidOperationException";
pub const NULLABLE: &str = "System.Nullable";
pub const VALUE_TUPLE: &str = "System.ValueTuple";
pub const TASK: &str = "System.Threading.Tasks.Task";
pub const VALUE_TASK: &str = "System.Threading.Tasks.ValueTask";
pub const CANCELLATION_TOKEN: &str = "System.Threading.CancellationToken";
pub const SERVICE_PROVIDER: &str = "System.IServiceProvider";
pub const LIST: &str = "System.Collections.Generic.List";

/// Language keyword aliases and whether they denote value types.
const KEYWORD_ALIASES: &[(&str, &str, bool)] = &[
    ("bool", "System.Boolean", true),
    ("byte", "System.Byte", true),
    ("sbyte", "System.SByte", true),
    ("char", "System.Char", true),
    ("decimal", "System.Decimal", true),
    ("double", "System.Double", true),
    ("float", "System.Single", true),
    ("int", "System.Int32", true),
    ("uint", "System.UInt32", true),
    ("long", "System.Int64", true),
    ("ulong", "System.UInt64", true),
    ("short", "System.Int16", true),
    ("ushort", "System.UInt16", true),
    ("nint", "System.IntPtr", true),
    ("nuint", "System.UIntPtr", true),
    ("object", OBJECT, false),
    ("string", STRING, false),
    ("void", VOID, false),
];

/// Resolves a language keyword (`int`, `string`, ...) to its metadata name.
///
/// Returns the metadata name and whether it is a value type.
#[must_use]
pub fn keyword_alias(name: &str) -> Option<(&'static str, bool)> {
    KEYWORD_ALIASES
        .iter()
        .find(|(alias, _, _)| *alias == name)
        .map(|(_, full, value_type)| (*full, *value_type))
}

/// Returns the keyword spelling for a metadata name, if one exists.
#[must_use]
pub fn keyword_for(full_name: &str) -> Option<&'static str> {
    match full_name {
        OBJECT => Some("object"),
        STRING => Some("string"),
        VOID => Some("void"),
        _ => None,
    }
}

/// Returns true for built-in primitive value types.
#[must_use]
pub fn is_primitive_value_type(full_name: &str) -> bool {
    KEYWORD_ALIASES
        .iter()
        .any(|(_, full, value_type)| *value_type && *full == full_name)
}
