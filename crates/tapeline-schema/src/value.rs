//! Typed value container and schema-directed normalization. Raw values are
//! coerced against a [`TypeSpec`] before they land in a parameter slot, so
//! every stored value is already in canonical form.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};
use thiserror::Error;

use crate::typespec::{ScalarKind, TypeSpec};

#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("cannot parse '{value}' as {kind}")]
    Unparsable { value: String, kind: &'static str },
    #[error("'{value}' is not one of <{}>", allowed.join(","))]
    NotInEnum {
        value: String,
        allowed: Vec<String>,
    },
    #[error("expected a tuple of {expected} elements, found {found}")]
    TupleArity { expected: usize, found: usize },
}

/// Path payload for `file`/`dir` values: the logical path plus the content
/// hash and dataroot reference resolved later by external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathValue {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataroot: Option<String>,
}

impl PathValue {
    pub fn new(path: impl Into<String>) -> Self {
        PathValue {
            path: path.into(),
            hash: None,
            dataroot: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    File(PathValue),
    Dir(PathValue),
    List(Vec<Value>),
    Set(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::File(_) => "file",
            Value::Dir(_) => "dir",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Tuple(_) => "tuple",
        }
    }

    /// True for absent scalars and empty collections.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::List(items) | Value::Set(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::Str(s) => json!(s),
            Value::File(p) | Value::Dir(p) => {
                serde_json::to_value(p).unwrap_or(Json::Null)
            }
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }

    /// Schema-directed decode of a manifest value.
    pub fn from_json(spec: &TypeSpec, json: &Json) -> Result<Value, ValueError> {
        normalize_value(spec, Value::from_json_untyped(json))
    }

    /// Best-effort decode without a schema, used for journal payloads which
    /// are normalized again when replayed against a parameter.
    pub fn from_json_untyped(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json_untyped).collect()),
            Json::Object(_) => match serde_json::from_value::<PathValue>(json.clone()) {
                Ok(path) => Value::File(path),
                Err(err) => {
                    warn!("discarding object that is not a path value ({err}): {json}");
                    Value::Null
                }
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<PathValue> for Value {
    fn from(v: PathValue) -> Self {
        Value::File(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Coerces `value` into the canonical form for `spec`. Total over the
/// [`TypeSpec`] enum; every rejection is a [`ValueError`].
pub fn normalize_value(spec: &TypeSpec, value: Value) -> Result<Value, ValueError> {
    match spec {
        TypeSpec::Scalar(kind) => normalize_scalar(*kind, value),
        TypeSpec::Enum(allowed) => match value {
            Value::Null => Ok(Value::Null),
            Value::Str(s) => {
                if allowed.contains(&s) {
                    Ok(Value::Str(s))
                } else {
                    Err(ValueError::NotInEnum {
                        value: s,
                        allowed: allowed.clone(),
                    })
                }
            }
            other => Err(ValueError::TypeMismatch {
                expected: "enum str",
                found: other.kind_str(),
            }),
        },
        TypeSpec::List(kind) => Ok(Value::List(normalize_elements(*kind, value)?)),
        TypeSpec::Set(kind) => {
            let mut items = normalize_elements(*kind, value)?;
            dedup_preserving_order(&mut items);
            Ok(Value::Set(items))
        }
        TypeSpec::Tuple(kinds) => match value {
            Value::Null => Ok(Value::Null),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
                if items.len() != kinds.len() {
                    return Err(ValueError::TupleArity {
                        expected: kinds.len(),
                        found: items.len(),
                    });
                }
                let normalized = kinds
                    .iter()
                    .zip(items)
                    .map(|(kind, item)| normalize_scalar(*kind, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Tuple(normalized))
            }
            other => Err(ValueError::TypeMismatch {
                expected: "tuple",
                found: other.kind_str(),
            }),
        },
    }
}

fn normalize_elements(kind: ScalarKind, value: Value) -> Result<Vec<Value>, ValueError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::List(items) | Value::Set(items) | Value::Tuple(items) => items,
        scalar => vec![scalar],
    };
    items
        .into_iter()
        .map(|item| normalize_scalar(kind, item))
        .collect()
}

fn dedup_preserving_order(items: &mut Vec<Value>) {
    let mut kept: Vec<Value> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if !kept.contains(&item) {
            kept.push(item);
        }
    }
    *items = kept;
}

fn normalize_scalar(kind: ScalarKind, value: Value) -> Result<Value, ValueError> {
    if matches!(value, Value::Null) {
        return Ok(Value::Null);
    }
    match kind {
        ScalarKind::Str => match value {
            Value::Str(s) => Ok(Value::Str(s)),
            Value::Bool(b) => Ok(Value::Str(b.to_string())),
            Value::Int(i) => Ok(Value::Str(i.to_string())),
            Value::Float(f) => Ok(Value::Str(f.to_string())),
            Value::File(p) | Value::Dir(p) => Ok(Value::Str(p.path)),
            other => Err(mismatch("str", &other)),
        },
        ScalarKind::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::Str(s) => s.parse::<bool>().map(Value::Bool).map_err(|_| {
                ValueError::Unparsable {
                    value: s,
                    kind: "bool",
                }
            }),
            other => Err(mismatch("bool", &other)),
        },
        ScalarKind::Int => match value {
            Value::Int(i) => Ok(Value::Int(i)),
            Value::Str(s) => {
                s.parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| ValueError::Unparsable {
                        value: s,
                        kind: "int",
                    })
            }
            other => Err(mismatch("int", &other)),
        },
        ScalarKind::Float => match value {
            Value::Float(f) => Ok(Value::Float(f)),
            Value::Int(i) => Ok(Value::Float(i as f64)),
            Value::Str(s) => {
                s.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| ValueError::Unparsable {
                        value: s,
                        kind: "float",
                    })
            }
            other => Err(mismatch("float", &other)),
        },
        ScalarKind::File => match value {
            Value::File(p) => Ok(Value::File(p)),
            Value::Str(s) => Ok(Value::File(PathValue::new(s))),
            other => Err(mismatch("file", &other)),
        },
        ScalarKind::Dir => match value {
            Value::Dir(p) => Ok(Value::Dir(p)),
            Value::File(p) => Ok(Value::Dir(p)),
            Value::Str(s) => Ok(Value::Dir(PathValue::new(s))),
            other => Err(mismatch("dir", &other)),
        },
    }
}

fn mismatch(expected: &'static str, found: &Value) -> ValueError {
    ValueError::TypeMismatch {
        expected,
        found: found.kind_str(),
    }
}
