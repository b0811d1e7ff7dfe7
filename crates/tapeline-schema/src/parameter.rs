//! Typed leaf of the schema tree: a default value plus per-(step, index)
//! override slots, resolved through an ordered fallback chain.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::typespec::{TypeParseError, TypeSpec};
use crate::value::{Value, ValueError, normalize_value};

/// Sentinel step/index key for values not scoped to a pipeline node.
pub const GLOBAL_KEY: &str = "global";

/// Reserved key: the wildcard template child and an illegal step/index name.
pub const DEFAULT_KEY: &str = "default";

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("step and index are not accepted (pernode=never)")]
    StepIndexNotAccepted,
    #[error("step and index are both required (pernode=required)")]
    StepIndexRequired,
    #[error("an index requires a step")]
    IndexWithoutStep,
    #[error("'default' is reserved and cannot be used as a step or index")]
    ReservedStepIndex,
    #[error("field '{}' does not accept step/index arguments", .0.token())]
    FieldStepIndex(Field),
    #[error("field '{}' is not a list field", .0.token())]
    FieldNotAList(Field),
    #[error("field '{field}' expects a {1} value", field = .0.token())]
    FieldType(Field, &'static str),
    #[error("add is only valid for list or set typed parameters")]
    NotAList,
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    TypeParse(#[from] TypeParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Job,
    Scratch,
}

impl Scope {
    pub fn token(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Job => "job",
            Scope::Scratch => "scratch",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "global" => Some(Scope::Global),
            "job" => Some(Scope::Job),
            "scratch" => Some(Scope::Scratch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerNode {
    Never,
    Optional,
    Required,
}

impl PerNode {
    pub fn token(&self) -> &'static str {
        match self {
            PerNode::Never => "never",
            PerNode::Optional => "optional",
            PerNode::Required => "required",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "never" => Some(PerNode::Never),
            "optional" => Some(PerNode::Optional),
            "required" => Some(PerNode::Required),
            _ => None,
        }
    }
}

/// Field selector for `get_field`/`set_field`. A closed enum instead of
/// string dispatch, so every field is covered by an exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Value,
    Type,
    Scope,
    Lock,
    Require,
    Switch,
    Shorthelp,
    Example,
    Help,
    Notes,
    Pernode,
    Unit,
    Hashalgo,
    Copy,
}

impl Field {
    pub fn token(&self) -> &'static str {
        match self {
            Field::Value => "value",
            Field::Type => "type",
            Field::Scope => "scope",
            Field::Lock => "lock",
            Field::Require => "require",
            Field::Switch => "switch",
            Field::Shorthelp => "shorthelp",
            Field::Example => "example",
            Field::Help => "help",
            Field::Notes => "notes",
            Field::Pernode => "pernode",
            Field::Unit => "unit",
            Field::Hashalgo => "hashalgo",
            Field::Copy => "copy",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "value" => Some(Field::Value),
            "type" => Some(Field::Type),
            "scope" => Some(Field::Scope),
            "lock" => Some(Field::Lock),
            "require" => Some(Field::Require),
            "switch" => Some(Field::Switch),
            "shorthelp" => Some(Field::Shorthelp),
            "example" => Some(Field::Example),
            "help" => Some(Field::Help),
            "notes" => Some(Field::Notes),
            "pernode" => Some(Field::Pernode),
            "unit" => Some(Field::Unit),
            "hashalgo" => Some(Field::Hashalgo),
            "copy" => Some(Field::Copy),
            _ => None,
        }
    }
}

/// Typed payload moving in and out of `get_field`/`set_field`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    Type(TypeSpec),
    Scope(Scope),
    Pernode(PerNode),
    Bool(bool),
    Str(String),
    StrList(Vec<String>),
    OptStr(Option<String>),
}

impl FieldValue {
    /// Flattens to a plain [`Value`] for journal entries.
    pub fn into_value(self) -> Value {
        match self {
            FieldValue::Value(v) => v,
            FieldValue::Type(t) => Value::Str(t.to_string()),
            FieldValue::Scope(s) => Value::Str(s.token().to_string()),
            FieldValue::Pernode(p) => Value::Str(p.token().to_string()),
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Str(s) => Value::Str(s),
            FieldValue::StrList(items) => {
                Value::List(items.into_iter().map(Value::Str).collect())
            }
            FieldValue::OptStr(opt) => opt.map(Value::Str).unwrap_or(Value::Null),
        }
    }

    /// Reconstructs the typed payload for `field` from a journal [`Value`].
    pub fn from_value(field: Field, value: Value) -> Result<FieldValue, ParamError> {
        match field {
            Field::Value => Ok(FieldValue::Value(value)),
            Field::Type => match value {
                Value::Str(s) => Ok(FieldValue::Type(s.parse()?)),
                other => Err(bad_payload(field, "type grammar str", &other)),
            },
            Field::Scope => match value {
                Value::Str(s) => Scope::parse(&s)
                    .map(FieldValue::Scope)
                    .ok_or(ParamError::FieldType(field, "scope token")),
                other => Err(bad_payload(field, "scope token", &other)),
            },
            Field::Pernode => match value {
                Value::Str(s) => PerNode::parse(&s)
                    .map(FieldValue::Pernode)
                    .ok_or(ParamError::FieldType(field, "pernode token")),
                other => Err(bad_payload(field, "pernode token", &other)),
            },
            Field::Lock | Field::Require | Field::Copy => match value {
                Value::Bool(b) => Ok(FieldValue::Bool(b)),
                other => Err(bad_payload(field, "bool", &other)),
            },
            Field::Shorthelp | Field::Help | Field::Notes | Field::Hashalgo => match value {
                Value::Str(s) => Ok(FieldValue::Str(s)),
                other => Err(bad_payload(field, "str", &other)),
            },
            Field::Switch | Field::Example => match value {
                Value::List(items) | Value::Set(items) => {
                    let strings = items
                        .into_iter()
                        .map(|item| match item {
                            Value::Str(s) => Ok(s),
                            other => Err(bad_payload(field, "[str]", &other)),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(FieldValue::StrList(strings))
                }
                other => Err(bad_payload(field, "[str]", &other)),
            },
            Field::Unit => match value {
                Value::Null => Ok(FieldValue::OptStr(None)),
                Value::Str(s) => Ok(FieldValue::OptStr(Some(s))),
                other => Err(bad_payload(field, "str or null", &other)),
            },
        }
    }
}

fn bad_payload(field: Field, expected: &'static str, _found: &Value) -> ParamError {
    ParamError::FieldType(field, expected)
}

/// A typed leaf value holder. Always a tree leaf; never has children.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub(crate) typespec: TypeSpec,
    pub(crate) scope: Scope,
    pub(crate) pernode: PerNode,
    pub(crate) lock: bool,
    pub(crate) require: bool,
    pub(crate) switch: Vec<String>,
    pub(crate) shorthelp: String,
    pub(crate) example: Vec<String>,
    pub(crate) help: String,
    pub(crate) notes: String,
    pub(crate) unit: Option<String>,
    pub(crate) hashalgo: String,
    pub(crate) copy: bool,
    pub(crate) defvalue: Value,
    pub(crate) nodevalues: IndexMap<(String, String), Value>,
}

impl Parameter {
    pub fn new(typespec: TypeSpec) -> Self {
        // Null normalizes for every spec: scalars stay Null, list kinds
        // become the empty collection.
        let defvalue = normalize_value(&typespec, Value::Null)
            .unwrap_or(Value::Null);
        Parameter {
            typespec,
            scope: Scope::Job,
            pernode: PerNode::Never,
            lock: false,
            require: false,
            switch: Vec::new(),
            shorthelp: String::new(),
            example: Vec::new(),
            help: String::new(),
            notes: String::new(),
            unit: None,
            hashalgo: "sha256".to_string(),
            copy: false,
            defvalue,
            nodevalues: IndexMap::new(),
        }
    }

    pub fn from_grammar(type_str: &str) -> Result<Self, TypeParseError> {
        Ok(Parameter::new(type_str.parse()?))
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Result<Self, ValueError> {
        self.defvalue = normalize_value(&self.typespec, value.into())?;
        Ok(self)
    }

    pub fn with_pernode(mut self, pernode: PerNode) -> Self {
        self.pernode = pernode;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_shorthelp(mut self, text: impl Into<String>) -> Self {
        self.shorthelp = text.into();
        self
    }

    pub fn with_help(mut self, text: impl Into<String>) -> Self {
        self.help = text.into();
        self
    }

    pub fn with_switch(mut self, switch: impl Into<String>) -> Self {
        self.switch.push(switch.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example.push(example.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_require(mut self, require: bool) -> Self {
        self.require = require;
        self
    }

    pub fn with_copy(mut self, copy: bool) -> Self {
        self.copy = copy;
        self
    }

    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    pub fn typespec(&self) -> &TypeSpec {
        &self.typespec
    }

    pub fn is_locked(&self) -> bool {
        self.lock
    }

    pub fn is_list(&self) -> bool {
        self.typespec.is_list()
    }

    /// Validates step/index legality and resolves omitted keys to the
    /// global sentinel. `strict_required` enforces the pernode=required
    /// both-or-nothing rule; `unset` relaxes it.
    fn node_keys(
        &self,
        step: Option<&str>,
        index: Option<&str>,
        strict_required: bool,
    ) -> Result<(String, String), ParamError> {
        if index.is_some() && step.is_none() {
            return Err(ParamError::IndexWithoutStep);
        }
        if step == Some(DEFAULT_KEY) || index == Some(DEFAULT_KEY) {
            return Err(ParamError::ReservedStepIndex);
        }
        match self.pernode {
            PerNode::Never if step.is_some() => return Err(ParamError::StepIndexNotAccepted),
            PerNode::Required if strict_required && (step.is_none() || index.is_none()) => {
                return Err(ParamError::StepIndexRequired);
            }
            _ => {}
        }
        Ok((
            step.unwrap_or(GLOBAL_KEY).to_string(),
            index.unwrap_or(GLOBAL_KEY).to_string(),
        ))
    }

    /// Step/index legality check without resolving a slot, used to reject
    /// a mutation before any tree node is materialized for it.
    pub(crate) fn check_keys(
        &self,
        step: Option<&str>,
        index: Option<&str>,
        strict_required: bool,
    ) -> Result<(), ParamError> {
        self.node_keys(step, index, strict_required).map(|_| ())
    }

    /// Resolves the value for `(step, index)` through the fallback chain:
    /// exact slot, then (required: default), then `(step, global)`, then
    /// `(global, global)`, then the default.
    pub fn get_value(&self, step: Option<&str>, index: Option<&str>) -> Result<Value, ParamError> {
        let (step, index) = self.node_keys(step, index, true)?;
        if let Some(value) = self.nodevalues.get(&(step.clone(), index.clone())) {
            return Ok(value.clone());
        }
        if self.pernode == PerNode::Required {
            return Ok(self.defvalue.clone());
        }
        if index != GLOBAL_KEY {
            if let Some(value) = self.nodevalues.get(&(step.clone(), GLOBAL_KEY.to_string())) {
                return Ok(value.clone());
            }
        }
        if step != GLOBAL_KEY {
            if let Some(value) = self
                .nodevalues
                .get(&(GLOBAL_KEY.to_string(), GLOBAL_KEY.to_string()))
            {
                return Ok(value.clone());
            }
        }
        Ok(self.defvalue.clone())
    }

    /// Returns a metadata field. Step/index are illegal here; `Field::Value`
    /// resolves like `get_value` with no step.
    pub fn get_field(&self, field: Field) -> Result<FieldValue, ParamError> {
        match field {
            Field::Value => Ok(FieldValue::Value(self.get_value(None, None)?)),
            Field::Type => Ok(FieldValue::Type(self.typespec.clone())),
            Field::Scope => Ok(FieldValue::Scope(self.scope)),
            Field::Lock => Ok(FieldValue::Bool(self.lock)),
            Field::Require => Ok(FieldValue::Bool(self.require)),
            Field::Switch => Ok(FieldValue::StrList(self.switch.clone())),
            Field::Shorthelp => Ok(FieldValue::Str(self.shorthelp.clone())),
            Field::Example => Ok(FieldValue::StrList(self.example.clone())),
            Field::Help => Ok(FieldValue::Str(self.help.clone())),
            Field::Notes => Ok(FieldValue::Str(self.notes.clone())),
            Field::Pernode => Ok(FieldValue::Pernode(self.pernode)),
            Field::Unit => Ok(FieldValue::OptStr(self.unit.clone())),
            Field::Hashalgo => Ok(FieldValue::Str(self.hashalgo.clone())),
            Field::Copy => Ok(FieldValue::Bool(self.copy)),
        }
    }

    /// Writes the `(step, index)` slot. `Ok(false)` when locked or when the
    /// slot already holds a value and `clobber` is false.
    pub fn set_value(
        &mut self,
        value: Value,
        step: Option<&str>,
        index: Option<&str>,
        clobber: bool,
    ) -> Result<bool, ParamError> {
        if self.lock {
            return Ok(false);
        }
        let slot = self.node_keys(step, index, true)?;
        let value = normalize_value(&self.typespec, value)?;
        if !clobber && self.nodevalues.contains_key(&slot) {
            return Ok(false);
        }
        self.nodevalues.insert(slot, value);
        Ok(true)
    }

    /// Writes a metadata field. Locked parameters reject every field except
    /// `lock` itself, silently.
    pub fn set_field(&mut self, field: Field, value: FieldValue) -> Result<bool, ParamError> {
        if self.lock && field != Field::Lock {
            return Ok(false);
        }
        match (field, value) {
            (Field::Value, FieldValue::Value(v)) => return self.set_value(v, None, None, true),
            (Field::Type, FieldValue::Type(t)) => self.typespec = t,
            (Field::Scope, FieldValue::Scope(s)) => self.scope = s,
            (Field::Lock, FieldValue::Bool(b)) => self.lock = b,
            (Field::Require, FieldValue::Bool(b)) => self.require = b,
            (Field::Switch, FieldValue::StrList(items)) => self.switch = items,
            (Field::Shorthelp, FieldValue::Str(s)) => self.shorthelp = s,
            (Field::Example, FieldValue::StrList(items)) => self.example = items,
            (Field::Help, FieldValue::Str(s)) => self.help = s,
            (Field::Notes, FieldValue::Str(s)) => self.notes = s,
            (Field::Pernode, FieldValue::Pernode(p)) => self.pernode = p,
            (Field::Unit, FieldValue::OptStr(u)) => self.unit = u,
            (Field::Hashalgo, FieldValue::Str(s)) => self.hashalgo = s,
            (Field::Copy, FieldValue::Bool(b)) => self.copy = b,
            (field, other) => {
                return Err(ParamError::FieldType(field, expected_payload(field, &other)));
            }
        }
        Ok(true)
    }

    /// Appends to a list/set typed slot. Starts from the exact slot's
    /// current content (never from a fallback scope).
    pub fn add_value(
        &mut self,
        value: Value,
        step: Option<&str>,
        index: Option<&str>,
    ) -> Result<bool, ParamError> {
        if self.lock {
            return Ok(false);
        }
        if !self.typespec.is_list() {
            return Err(ParamError::NotAList);
        }
        let slot = self.node_keys(step, index, true)?;
        let incoming = match normalize_value(&self.typespec, value)? {
            Value::List(items) | Value::Set(items) => items,
            other => vec![other],
        };
        let mut items = match self.nodevalues.get(&slot) {
            Some(Value::List(items)) | Some(Value::Set(items)) => items.clone(),
            _ => Vec::new(),
        };
        items.extend(incoming);
        let merged = normalize_value(&self.typespec, Value::List(items))?;
        self.nodevalues.insert(slot, merged);
        Ok(true)
    }

    /// Appends to one of the list-shaped metadata fields (`switch`,
    /// `example`).
    pub fn add_field(&mut self, field: Field, item: impl Into<String>) -> Result<bool, ParamError> {
        if self.lock {
            return Ok(false);
        }
        match field {
            Field::Switch => self.switch.push(item.into()),
            Field::Example => self.example.push(item.into()),
            _ => return Err(ParamError::FieldNotAList(field)),
        }
        Ok(true)
    }

    /// Deletes the exact override slot if present. Never touches the default
    /// value or any other slot.
    pub fn unset(&mut self, step: Option<&str>, index: Option<&str>) -> Result<bool, ParamError> {
        if self.lock {
            return Ok(false);
        }
        let slot = self.node_keys(step, index, false)?;
        Ok(self.nodevalues.shift_remove(&slot).is_some())
    }

    /// True when the fallback chain for `(step, index)` lands on an explicit
    /// slot rather than the default.
    pub fn is_set(&self, step: Option<&str>, index: Option<&str>) -> bool {
        let Ok((step, index)) = self.node_keys(step, index, true) else {
            return false;
        };
        if self.nodevalues.contains_key(&(step.clone(), index.clone())) {
            return true;
        }
        if self.pernode == PerNode::Required {
            return false;
        }
        self.nodevalues
            .contains_key(&(step, GLOBAL_KEY.to_string()))
            || self
                .nodevalues
                .contains_key(&(GLOBAL_KEY.to_string(), GLOBAL_KEY.to_string()))
    }

    /// True when resolution yields a non-empty value.
    pub fn has_value(&self, step: Option<&str>, index: Option<&str>) -> bool {
        self.get_value(step, index)
            .map(|v| !v.is_empty_value())
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.nodevalues.is_empty() && self.defvalue.is_empty_value()
    }

    /// Enumerates every concrete `(value, step, index)` triple in insertion
    /// order. With `include_default`, the default value is substituted when
    /// no global slot exists.
    pub fn getvalues(&self, include_default: bool) -> Vec<(Value, Option<String>, Option<String>)> {
        let mut out = Vec::with_capacity(self.nodevalues.len());
        let mut has_global = false;
        for ((step, index), value) in &self.nodevalues {
            let step_out = (step != GLOBAL_KEY).then(|| step.clone());
            let index_out = (index != GLOBAL_KEY).then(|| index.clone());
            if step_out.is_none() && index_out.is_none() {
                has_global = true;
            }
            out.push((value.clone(), step_out, index_out));
        }
        if include_default && !has_global {
            out.push((self.defvalue.clone(), None, None));
        }
        out
    }
}

fn expected_payload(field: Field, _found: &FieldValue) -> &'static str {
    match field {
        Field::Value => "value",
        Field::Type => "type grammar str",
        Field::Scope => "scope token",
        Field::Pernode => "pernode token",
        Field::Lock | Field::Require | Field::Copy => "bool",
        Field::Switch | Field::Example => "[str]",
        Field::Unit => "str or null",
        Field::Shorthelp | Field::Help | Field::Notes | Field::Hashalgo => "str",
    }
}
