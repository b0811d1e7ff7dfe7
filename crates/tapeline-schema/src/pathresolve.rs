//! Resolution of file/dir parameter values to on-disk paths. A value may
//! name a `dataroot`, a registered data source whose locator is dispatched
//! by scheme to a [`Resolver`]; plain values resolve against search roots.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use thiserror::Error;
use url::Url;

use crate::error::SchemaError;
use crate::schema::BaseSchema;
use crate::value::{PathValue, Value};

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("no resolver registered for scheme '{scheme}'")]
    UnknownScheme { scheme: String },
    #[error("dataroot '{name}' is not registered")]
    UnregisteredDataroot { name: String },
    #[error("[{keypath}]: '{path}' not found")]
    FileNotFound { keypath: String, path: String },
    #[error("[{keypath}] is not a file or dir parameter")]
    NotFileParam { keypath: String },
    #[error("cannot interpret locator '{locator}': {detail}")]
    BadLocator { locator: String, detail: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Turns a dataroot locator into a local directory. Implementations own
/// the fetch/cache policy for their scheme; the core only dispatches.
pub trait Resolver {
    fn resolve(
        &self,
        name: &str,
        root: &BaseSchema,
        locator: &str,
        tag: Option<&str>,
    ) -> Result<PathBuf, ResolveError>;
}

/// Scheme → resolver dispatch table. Locators that do not parse as URLs
/// are plain filesystem paths and bypass the table entirely.
pub struct ResolverRegistry {
    resolvers: HashMap<String, Box<dyn Resolver>>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        ResolverRegistry::new()
    }
}

impl ResolverRegistry {
    /// A registry with the built-in `file://` passthrough registered.
    pub fn new() -> Self {
        let mut registry = ResolverRegistry {
            resolvers: HashMap::new(),
        };
        registry.register("file", Box::new(LocalResolver));
        registry
    }

    pub fn register(&mut self, scheme: impl Into<String>, resolver: Box<dyn Resolver>) {
        self.resolvers.insert(scheme.into(), resolver);
    }

    pub fn resolve(
        &self,
        name: &str,
        root: &BaseSchema,
        locator: &str,
        tag: Option<&str>,
    ) -> Result<PathBuf, ResolveError> {
        match Url::parse(locator) {
            Ok(url) => {
                let resolver =
                    self.resolvers
                        .get(url.scheme())
                        .ok_or_else(|| ResolveError::UnknownScheme {
                            scheme: url.scheme().to_string(),
                        })?;
                resolver.resolve(name, root, locator, tag)
            }
            Err(_) => Ok(PathBuf::from(locator)),
        }
    }
}

/// `file://` locators map straight to their local path.
pub struct LocalResolver;

impl Resolver for LocalResolver {
    fn resolve(
        &self,
        name: &str,
        _root: &BaseSchema,
        locator: &str,
        _tag: Option<&str>,
    ) -> Result<PathBuf, ResolveError> {
        let url = Url::parse(locator).map_err(|err| ResolveError::BadLocator {
            locator: locator.to_string(),
            detail: err.to_string(),
        })?;
        debug!("resolving dataroot '{name}' locally from {locator}");
        url.to_file_path().map_err(|()| ResolveError::BadLocator {
            locator: locator.to_string(),
            detail: "not a local file path".to_string(),
        })
    }
}

/// Resolves every file/dir value at a keypath to an existing on-disk path.
/// Values with a `dataroot` resolve through the registry; the rest try the
/// search roots in order, then the path as given.
pub fn find_files(
    schema: &BaseSchema,
    keypath: &[&str],
    step: Option<&str>,
    index: Option<&str>,
    registry: &ResolverRegistry,
    dataroots: &IndexMap<String, String>,
    search_roots: &[PathBuf],
) -> Result<Vec<PathBuf>, ResolveError> {
    let param = schema.parameter(keypath)?;
    if !param.typespec().is_path() {
        return Err(ResolveError::NotFileParam {
            keypath: SchemaError::join(keypath),
        });
    }
    let value = schema.get(keypath, step, index)?;
    let mut values = Vec::new();
    collect_path_values(&value, &mut values);

    let mut out = Vec::with_capacity(values.len());
    for path_value in values {
        out.push(resolve_one(
            &path_value,
            schema,
            keypath,
            registry,
            dataroots,
            search_roots,
        )?);
    }
    Ok(out)
}

fn collect_path_values(value: &Value, out: &mut Vec<PathValue>) {
    match value {
        Value::File(p) | Value::Dir(p) => out.push(p.clone()),
        Value::Str(s) => out.push(PathValue::new(s.clone())),
        Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
            for item in items {
                collect_path_values(item, out);
            }
        }
        _ => {}
    }
}

fn resolve_one(
    path_value: &PathValue,
    schema: &BaseSchema,
    keypath: &[&str],
    registry: &ResolverRegistry,
    dataroots: &IndexMap<String, String>,
    search_roots: &[PathBuf],
) -> Result<PathBuf, ResolveError> {
    let not_found = || ResolveError::FileNotFound {
        keypath: SchemaError::join(keypath),
        path: path_value.path.clone(),
    };
    if let Some(name) = &path_value.dataroot {
        let locator = dataroots
            .get(name)
            .ok_or_else(|| ResolveError::UnregisteredDataroot { name: name.clone() })?;
        let root = registry.resolve(name, schema, locator, None)?;
        let candidate = root.join(&path_value.path);
        if candidate.exists() {
            return Ok(candidate);
        }
        return Err(not_found());
    }

    let direct = Path::new(&path_value.path);
    if direct.is_absolute() {
        if direct.exists() {
            return Ok(direct.to_path_buf());
        }
        return Err(not_found());
    }
    for root in search_roots {
        let candidate = root.join(direct);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    if direct.exists() {
        return Ok(direct.to_path_buf());
    }
    Err(not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::EditableSchema;
    use crate::parameter::Parameter;
    use crate::typespec::{ScalarKind, TypeSpec};
    use std::fs;

    fn file_schema() -> BaseSchema {
        let mut schema = BaseSchema::new();
        let mut edit = EditableSchema::new(&mut schema);
        edit.insert(
            &["input", "lef"],
            Parameter::new(TypeSpec::List(ScalarKind::File)),
            false,
        )
        .expect("compose");
        edit.insert(
            &["option", "jobname"],
            Parameter::new(TypeSpec::Scalar(ScalarKind::Str)),
            false,
        )
        .expect("compose");
        schema
    }

    #[test]
    fn resolves_against_search_roots() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cells.lef"), "MACRO").unwrap();

        let mut schema = file_schema();
        schema
            .add(&["input", "lef"], Value::Str("cells.lef".into()), None, None)
            .unwrap();

        let found = find_files(
            &schema,
            &["input", "lef"],
            None,
            None,
            &ResolverRegistry::new(),
            &IndexMap::new(),
            &[dir.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(found, vec![dir.path().join("cells.lef")]);
    }

    #[test]
    fn resolves_through_a_dataroot_locator() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cells.lef"), "MACRO").unwrap();

        let mut schema = file_schema();
        let mut value = PathValue::new("cells.lef");
        value.dataroot = Some("pdkroot".to_string());
        schema
            .add(&["input", "lef"], Value::File(value), None, None)
            .unwrap();

        // Plain-path locators bypass the registry.
        let mut dataroots = IndexMap::new();
        dataroots.insert(
            "pdkroot".to_string(),
            dir.path().to_string_lossy().into_owned(),
        );
        let found = find_files(
            &schema,
            &["input", "lef"],
            None,
            None,
            &ResolverRegistry::new(),
            &dataroots,
            &[],
        )
        .unwrap();
        assert_eq!(found, vec![dir.path().join("cells.lef")]);

        // file:// locators go through the built-in resolver.
        dataroots.insert(
            "pdkroot".to_string(),
            format!("file://{}", dir.path().display()),
        );
        let found = find_files(
            &schema,
            &["input", "lef"],
            None,
            None,
            &ResolverRegistry::new(),
            &dataroots,
            &[],
        )
        .unwrap();
        assert_eq!(found, vec![dir.path().join("cells.lef")]);
    }

    #[test]
    fn missing_files_and_dataroots_are_reported() {
        let mut schema = file_schema();
        schema
            .add(&["input", "lef"], Value::Str("nosuch.lef".into()), None, None)
            .unwrap();

        let err = find_files(
            &schema,
            &["input", "lef"],
            None,
            None,
            &ResolverRegistry::new(),
            &IndexMap::new(),
            &[],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::FileNotFound {
                keypath: "input,lef".to_string(),
                path: "nosuch.lef".to_string(),
            }
        );

        let mut value = PathValue::new("x.lef");
        value.dataroot = Some("ghost".to_string());
        schema
            .set(&["input", "lef"], Value::File(value), None, None)
            .unwrap();
        let err = find_files(
            &schema,
            &["input", "lef"],
            None,
            None,
            &ResolverRegistry::new(),
            &IndexMap::new(),
            &[],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnregisteredDataroot {
                name: "ghost".to_string()
            }
        );
    }

    #[test]
    fn unknown_schemes_and_non_path_parameters_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut schema = file_schema();
        let mut value = PathValue::new("x.lef");
        value.dataroot = Some("remote".to_string());
        schema
            .add(&["input", "lef"], Value::File(value), None, None)
            .unwrap();

        let mut dataroots = IndexMap::new();
        dataroots.insert(
            "remote".to_string(),
            "git+https://example.com/pdk.git".to_string(),
        );
        let err = find_files(
            &schema,
            &["input", "lef"],
            None,
            None,
            &ResolverRegistry::new(),
            &dataroots,
            &[dir.path().to_path_buf()],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownScheme {
                scheme: "git+https".to_string()
            }
        );

        let err = find_files(
            &schema,
            &["option", "jobname"],
            None,
            None,
            &ResolverRegistry::new(),
            &IndexMap::new(),
            &[],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotFileParam {
                keypath: "option,jobname".to_string()
            }
        );
    }
}
