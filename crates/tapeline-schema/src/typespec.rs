//! Type grammar for parameters: `str|bool|int|float|file|dir`, `<a,b,c>`
//! enums, `[T]` lists, `{T}` sets and `(T,T,...)` tuples.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("empty type string")]
    Empty,
    #[error("unknown scalar kind '{0}'")]
    UnknownScalar(String),
    #[error("composite types may only contain scalars: '{0}'")]
    NestedComposite(String),
    #[error("enum type '{0}' must list at least one variant")]
    EmptyEnum(String),
}

/// The six scalar kinds a leaf value can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Str,
    Bool,
    Int,
    Float,
    File,
    Dir,
}

impl ScalarKind {
    pub fn token(&self) -> &'static str {
        match self {
            ScalarKind::Str => "str",
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::File => "file",
            ScalarKind::Dir => "dir",
        }
    }

    fn parse(token: &str) -> Result<Self, TypeParseError> {
        match token {
            "str" => Ok(ScalarKind::Str),
            "bool" => Ok(ScalarKind::Bool),
            "int" => Ok(ScalarKind::Int),
            "float" => Ok(ScalarKind::Float),
            "file" => Ok(ScalarKind::File),
            "dir" => Ok(ScalarKind::Dir),
            "" => Err(TypeParseError::Empty),
            other if other.starts_with(['[', '{', '(', '<']) => {
                Err(TypeParseError::NestedComposite(other.to_string()))
            }
            other => Err(TypeParseError::UnknownScalar(other.to_string())),
        }
    }

    pub fn is_path(&self) -> bool {
        matches!(self, ScalarKind::File | ScalarKind::Dir)
    }
}

/// Closed representation of the type grammar. Composites hold scalars only;
/// there is no composite-of-composite nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    Scalar(ScalarKind),
    Enum(Vec<String>),
    List(ScalarKind),
    Set(ScalarKind),
    Tuple(Vec<ScalarKind>),
}

impl TypeSpec {
    /// True for the kinds `add` may append to.
    pub fn is_list(&self) -> bool {
        matches!(self, TypeSpec::List(_) | TypeSpec::Set(_))
    }

    /// True when values of this type carry file/dir path payloads.
    pub fn is_path(&self) -> bool {
        match self {
            TypeSpec::Scalar(kind) | TypeSpec::List(kind) | TypeSpec::Set(kind) => kind.is_path(),
            TypeSpec::Tuple(kinds) => kinds.iter().any(ScalarKind::is_path),
            TypeSpec::Enum(_) => false,
        }
    }
}

impl FromStr for TypeSpec {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TypeParseError::Empty);
        }
        if let Some(inner) = delimited(s, '[', ']') {
            return Ok(TypeSpec::List(ScalarKind::parse(inner.trim())?));
        }
        if let Some(inner) = delimited(s, '{', '}') {
            return Ok(TypeSpec::Set(ScalarKind::parse(inner.trim())?));
        }
        if let Some(inner) = delimited(s, '(', ')') {
            let kinds = inner
                .split(',')
                .map(|tok| ScalarKind::parse(tok.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            if kinds.is_empty() {
                return Err(TypeParseError::Empty);
            }
            return Ok(TypeSpec::Tuple(kinds));
        }
        if let Some(inner) = delimited(s, '<', '>') {
            let values: Vec<String> = inner
                .split(',')
                .map(|tok| tok.trim().to_string())
                .filter(|tok| !tok.is_empty())
                .collect();
            if values.is_empty() {
                return Err(TypeParseError::EmptyEnum(s.to_string()));
            }
            return Ok(TypeSpec::Enum(values));
        }
        Ok(TypeSpec::Scalar(ScalarKind::parse(s)?))
    }
}

fn delimited(s: &str, open: char, close: char) -> Option<&str> {
    let rest = s.strip_prefix(open)?;
    rest.strip_suffix(close)
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Scalar(kind) => f.write_str(kind.token()),
            TypeSpec::Enum(values) => write!(f, "<{}>", values.join(",")),
            TypeSpec::List(kind) => write!(f, "[{}]", kind.token()),
            TypeSpec::Set(kind) => write!(f, "{{{}}}", kind.token()),
            TypeSpec::Tuple(kinds) => {
                let inner: Vec<&str> = kinds.iter().map(ScalarKind::token).collect();
                write!(f, "({})", inner.join(","))
            }
        }
    }
}

impl Serialize for TypeSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TypeSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
