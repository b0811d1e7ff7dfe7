//! Hierarchical, typed, keypath-addressed configuration tree for hardware
//! compilation flows: parameters with per-(step, index) overrides, wildcard
//! `default` templates, a replayable mutation journal, named dependency
//! graphs and a JSON manifest form.

pub mod deps;
pub mod edit;
pub mod error;
pub mod journal;
pub mod manifest;
pub mod parameter;
pub mod pathresolve;
pub mod schema;
pub mod switch;
pub mod typespec;
pub mod value;

pub use deps::{DEPS_KEY, DependencySchema, SharedDep};
pub use edit::EditableSchema;
pub use error::SchemaError;
pub use journal::{Journal, JournalEntry, JournalKind};
pub use manifest::{JOURNAL_KEY, ManifestDiff};
pub use parameter::{
    DEFAULT_KEY, Field, FieldValue, GLOBAL_KEY, ParamError, Parameter, PerNode, Scope,
};
pub use pathresolve::{
    LocalResolver, ResolveError, Resolver, ResolverRegistry, find_files,
};
pub use schema::{BaseSchema, SchemaNode};
pub use switch::{SwitchArity, SwitchError, SwitchSpec, format_switch, parse_switch};
pub use typespec::{ScalarKind, TypeParseError, TypeSpec};
pub use value::{PathValue, Value, ValueError, normalize_value};
