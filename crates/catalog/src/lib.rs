//! Capability catalog for tool-calling backends.
//!
//! This crate turns host function signatures into the machine-readable tool
//! descriptions a reasoning backend uses to decide which host operations it
//! can request.
//!
//! # Core Concepts
//!
//! ## FunctionSignature
//!
//! A [`FunctionSignature`] is the declarative stand-in for an annotated host
//! function: a name, free-form documentation and an ordered list of
//! parameters, each with a [`TypeHint`] and an optional default. Parameter
//! types can be spelled out as hints or taken from Rust types through the
//! [`ParamType`] trait.
//!
//! ## compile
//!
//! [`compile`] maps a signature to a [`ToolSpec`]:
//! - the first documentation line becomes the description;
//! - `:param <name>: <text>` lines describe parameters;
//! - integers map to `integer`, floats and complex numbers to `number`,
//!   booleans to `boolean`, nullable wrappers to their inner type, sequences
//!   to `array` with typed `items`, mappings to `object` with a `key`/`value`
//!   sub-schema, and anything else to `string`;
//! - hidden parameters are dropped, and a parameter is required when it has no
//!   default and is not nullable.
//!
//! # Example
//!
//! ```
//! use catalog::{FunctionSignature, TypeHint, compile};
//! use serde_json::json;
//!
//! let signature = FunctionSignature::new("f")
//!     .param::<Vec<String>>("a")
//!     .param_with_default::<i64>("b", json!(3))
//!     .param_hint("user", TypeHint::other("User"));
//!
//! let spec = compile(&signature, ["user"]);
//! assert_eq!(spec.required(), ["a"]);
//! assert!(spec.parameter("user").is_none());
//! ```

mod compiler;
mod hint;
mod signature;
mod spec;

pub use compiler::{DEFAULT_PARAM_DESCRIPTION, DEFAULT_TOOL_DESCRIPTION, compile, schema_for};
pub use hint::{ParamType, SequenceKind, TypeHint};
pub use signature::{FunctionSignature, Parameter};
pub use spec::{JsonType, ParamSchema, ToolParameterSpec, ToolSpec};
