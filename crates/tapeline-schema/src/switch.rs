//! Command-line switch grammar for parameters. A switch string names the
//! keypath (wildcard segments become free placeholders) and describes the
//! expected arguments: `-library_lef 'libraryname [step] [index] <[file]>'`.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::parameter::{DEFAULT_KEY, PerNode};
use crate::typespec::{TypeParseError, TypeSpec};

#[derive(Debug, Error, PartialEq)]
pub enum SwitchError {
    #[error("switch '{0}' is not of the form -name 'args <type>'")]
    Malformed(String),
    #[error("switch '{0}' is missing its trailing <type> placeholder")]
    MissingValue(String),
    #[error("'{0}' is not a legal free-key placeholder")]
    BadFreeKey(String),
    #[error(transparent)]
    BadType(#[from] TypeParseError),
}

/// How many step/index arguments the switch takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchArity {
    /// No step/index arguments (pernode=never).
    None,
    /// `[step] [index]` may be given (pernode=optional).
    Optional,
    /// `step index` must be given (pernode=required).
    Required,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchSpec {
    pub name: String,
    pub free_keys: Vec<String>,
    pub arity: SwitchArity,
}

static SWITCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-(?P<name>[a-z][a-z0-9_]*)\s+'(?P<body>[^']*)'$")
        .unwrap_or_else(|err| panic!("switch regex: {err}"))
});

static FREE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*$").unwrap_or_else(|err| panic!("free-key regex: {err}"))
});

/// Renders the canonical switch string for a keypath. Each `default`
/// wildcard segment becomes a free placeholder named after the concrete
/// segment preceding it.
pub fn format_switch(keypath: &[&str], typespec: &TypeSpec, pernode: PerNode) -> String {
    let mut name_parts: Vec<&str> = Vec::new();
    let mut args: Vec<String> = Vec::new();
    let mut prev = "key";
    for segment in keypath {
        if *segment == DEFAULT_KEY {
            args.push(format!("{prev}name"));
        } else {
            name_parts.push(segment);
            prev = segment;
        }
    }
    match pernode {
        PerNode::Never => {}
        PerNode::Optional => {
            args.push("[step]".to_string());
            args.push("[index]".to_string());
        }
        PerNode::Required => {
            args.push("step".to_string());
            args.push("index".to_string());
        }
    }
    args.push(format!("<{typespec}>"));
    format!("-{} '{}'", name_parts.join("_"), args.join(" "))
}

/// Validates a switch string and breaks it into its parts. The `<type>`
/// placeholder must hold a legal type grammar string.
pub fn parse_switch(text: &str) -> Result<SwitchSpec, SwitchError> {
    let text = text.trim();
    let caps = SWITCH_RE
        .captures(text)
        .ok_or_else(|| SwitchError::Malformed(text.to_string()))?;
    let name = caps["name"].to_string();
    let tokens: Vec<&str> = caps["body"].split_whitespace().collect();

    let Some((value, args)) = tokens.split_last() else {
        return Err(SwitchError::MissingValue(text.to_string()));
    };
    let inner = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .ok_or_else(|| SwitchError::MissingValue(text.to_string()))?;
    inner.parse::<TypeSpec>()?;

    let (arity, free) = if args.ends_with(&["step", "index"]) {
        (SwitchArity::Required, &args[..args.len() - 2])
    } else if args.ends_with(&["[step]", "[index]"]) {
        (SwitchArity::Optional, &args[..args.len() - 2])
    } else {
        (SwitchArity::None, args)
    };
    let free_keys = free
        .iter()
        .map(|key| {
            if FREE_KEY_RE.is_match(key) {
                Ok(key.to_string())
            } else {
                Err(SwitchError::BadFreeKey(key.to_string()))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SwitchSpec {
        name,
        free_keys,
        arity,
    })
}
