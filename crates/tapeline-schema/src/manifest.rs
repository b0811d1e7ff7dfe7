//! Manifest serialization: the full schema tree as a JSON document and the
//! reverse merge. Deserialization is forward and backward compatible: keys
//! on one side only are collected into a [`ManifestDiff`], never raised.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::warn;
use serde_json::{Map, Value as Json};

use crate::error::SchemaError;
use crate::journal::JournalEntry;
use crate::parameter::{DEFAULT_KEY, Parameter, PerNode, Scope};
use crate::schema::{BaseSchema, SchemaNode};
use crate::typespec::TypeSpec;
use crate::value::Value;

/// Root document key holding the serialized journal entries.
pub const JOURNAL_KEY: &str = "__journal__";

/// Keys that only one side of a merge knows about. `unknown` lists document
/// keypaths the schema lacks; `missing` lists schema keypaths the document
/// lacks. Both joined with `,`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestDiff {
    pub unknown: Vec<String>,
    pub missing: Vec<String>,
}

impl ManifestDiff {
    pub fn is_clean(&self) -> bool {
        self.unknown.is_empty() && self.missing.is_empty()
    }
}

impl BaseSchema {
    /// Serializes the full tree, the template child included under its
    /// literal `default` key. The root document carries `__journal__` when
    /// the journal holds entries.
    pub fn getdict(&self) -> Json {
        let mut doc = schema_to_json(self);
        if self.journal.has_journaling() {
            if let Json::Object(map) = &mut doc {
                let entries: Vec<Json> = self
                    .journal
                    .get()
                    .iter()
                    .map(JournalEntry::to_json)
                    .collect();
                map.insert(JOURNAL_KEY.to_string(), Json::Array(entries));
            }
        }
        doc
    }

    /// Merges a manifest document into this tree. Document keys under a
    /// level with a `default` template materialize concrete children; field
    /// restoration bypasses locks, matching what serialization captured.
    /// Value slots that fail to normalize are warned about and skipped.
    pub fn from_dict(&mut self, doc: &Json) -> Result<ManifestDiff, SchemaError> {
        let Json::Object(map) = doc else {
            return Err(SchemaError::Manifest(
                "manifest root must be an object".to_string(),
            ));
        };
        let mut diff = ManifestDiff::default();
        let mut path = Vec::new();
        merge_schema(self, map, &mut path, &mut diff);
        if let Some(Json::Array(entries)) = map.get(JOURNAL_KEY) {
            let parsed = entries
                .iter()
                .map(JournalEntry::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            self.journal.restore(parsed);
        }
        Ok(diff)
    }

    pub fn write_manifest(&self, path: &Path) -> Result<(), SchemaError> {
        let file = File::create(path)
            .map_err(|err| SchemaError::Manifest(format!("writing {}: {err}", path.display())))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.getdict())
            .map_err(|err| SchemaError::Manifest(format!("writing {}: {err}", path.display())))
    }

    pub fn read_manifest(&mut self, path: &Path) -> Result<ManifestDiff, SchemaError> {
        let file = File::open(path)
            .map_err(|err| SchemaError::Manifest(format!("reading {}: {err}", path.display())))?;
        let doc: Json = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| SchemaError::Manifest(format!("reading {}: {err}", path.display())))?;
        self.from_dict(&doc)
    }
}

fn schema_to_json(schema: &BaseSchema) -> Json {
    let mut map = Map::new();
    for (key, node) in &schema.tree {
        let sub = match node {
            SchemaNode::Parameter(param) => parameter_to_json(param),
            SchemaNode::Schema(child) => schema_to_json(child),
        };
        map.insert(key.clone(), sub);
    }
    Json::Object(map)
}

fn parameter_to_json(param: &Parameter) -> Json {
    let str_list = |items: &[String]| {
        Json::Array(items.iter().map(|s| Json::String(s.clone())).collect())
    };
    let mut doc = Map::new();
    doc.insert("type".to_string(), Json::String(param.typespec.to_string()));
    doc.insert("require".to_string(), Json::Bool(param.require));
    doc.insert(
        "scope".to_string(),
        Json::String(param.scope.token().to_string()),
    );
    doc.insert("lock".to_string(), Json::Bool(param.lock));
    doc.insert("switch".to_string(), str_list(&param.switch));
    doc.insert(
        "shorthelp".to_string(),
        Json::String(param.shorthelp.clone()),
    );
    doc.insert("example".to_string(), str_list(&param.example));
    doc.insert("help".to_string(), Json::String(param.help.clone()));
    doc.insert("notes".to_string(), Json::String(param.notes.clone()));
    doc.insert(
        "pernode".to_string(),
        Json::String(param.pernode.token().to_string()),
    );
    if let Some(unit) = &param.unit {
        doc.insert("unit".to_string(), Json::String(unit.clone()));
    }
    if param.typespec.is_path() {
        doc.insert(
            "hashalgo".to_string(),
            Json::String(param.hashalgo.clone()),
        );
        doc.insert("copy".to_string(), Json::Bool(param.copy));
    }

    let mut node = Map::new();
    let mut default_slot = Map::new();
    default_slot.insert(DEFAULT_KEY.to_string(), param.defvalue.to_json());
    node.insert(DEFAULT_KEY.to_string(), Json::Object(default_slot));
    for ((step, index), value) in &param.nodevalues {
        let slot = node
            .entry(step.clone())
            .or_insert_with(|| Json::Object(Map::new()));
        if let Json::Object(slot) = slot {
            slot.insert(index.clone(), value.to_json());
        }
    }
    doc.insert("node".to_string(), Json::Object(node));
    Json::Object(doc)
}

fn merge_schema(
    schema: &mut BaseSchema,
    map: &Map<String, Json>,
    path: &mut Vec<String>,
    diff: &mut ManifestDiff,
) {
    for (key, sub) in map {
        if path.is_empty() && key == JOURNAL_KEY {
            continue;
        }
        path.push(key.clone());
        if !schema.materialize_child(key) {
            diff.unknown.push(path.join(","));
            path.pop();
            continue;
        }
        match schema.tree.get_mut(key) {
            Some(SchemaNode::Parameter(param)) => merge_parameter(param, sub, path),
            Some(SchemaNode::Schema(child)) => {
                if let Json::Object(sub) = sub {
                    merge_schema(child, sub, path, diff);
                } else {
                    warn!("[{}] expected an object, got {}", path.join(","), sub);
                }
            }
            None => {}
        }
        path.pop();
    }
    for key in schema.tree.keys() {
        if !map.contains_key(key) {
            path.push(key.clone());
            diff.missing.push(path.join(","));
            path.pop();
        }
    }
}

/// Restores a parameter from its serialized document. Direct field writes:
/// a serialized lock must not prevent restoring the slots captured with it.
fn merge_parameter(param: &mut Parameter, doc: &Json, path: &[String]) {
    let Json::Object(map) = doc else {
        warn!("[{}] expected a parameter object, got {}", path.join(","), doc);
        return;
    };
    if let Some(Json::String(spec)) = map.get("type") {
        match spec.parse::<TypeSpec>() {
            Ok(incoming) if incoming == param.typespec => {}
            _ => warn!(
                "[{}] manifest type '{}' does not match '{}', keeping the in-memory type",
                path.join(","),
                spec,
                param.typespec
            ),
        }
    }
    if let Some(require) = map.get("require").and_then(Json::as_bool) {
        param.require = require;
    }
    if let Some(token) = map.get("scope").and_then(Json::as_str) {
        match Scope::parse(token) {
            Some(scope) => param.scope = scope,
            None => warn!("[{}] unknown scope '{token}'", path.join(",")),
        }
    }
    if let Some(token) = map.get("pernode").and_then(Json::as_str) {
        match PerNode::parse(token) {
            Some(pernode) => param.pernode = pernode,
            None => warn!("[{}] unknown pernode '{token}'", path.join(",")),
        }
    }
    if let Some(items) = map.get("switch").and_then(Json::as_array) {
        param.switch = json_strings(items);
    }
    if let Some(items) = map.get("example").and_then(Json::as_array) {
        param.example = json_strings(items);
    }
    if let Some(text) = map.get("shorthelp").and_then(Json::as_str) {
        param.shorthelp = text.to_string();
    }
    if let Some(text) = map.get("help").and_then(Json::as_str) {
        param.help = text.to_string();
    }
    if let Some(text) = map.get("notes").and_then(Json::as_str) {
        param.notes = text.to_string();
    }
    if let Some(text) = map.get("hashalgo").and_then(Json::as_str) {
        param.hashalgo = text.to_string();
    }
    if let Some(copy) = map.get("copy").and_then(Json::as_bool) {
        param.copy = copy;
    }
    match map.get("unit") {
        Some(Json::String(unit)) => param.unit = Some(unit.clone()),
        Some(Json::Null) => param.unit = None,
        _ => {}
    }

    if let Some(Json::Object(node)) = map.get("node") {
        for (step, slots) in node {
            let Json::Object(slots) = slots else {
                warn!("[{}] step '{step}' is not an object", path.join(","));
                continue;
            };
            for (index, json) in slots {
                match Value::from_json(&param.typespec, json) {
                    Ok(value) if step == DEFAULT_KEY && index == DEFAULT_KEY => {
                        param.defvalue = value;
                    }
                    Ok(value) => {
                        param
                            .nodevalues
                            .insert((step.clone(), index.clone()), value);
                    }
                    Err(err) => warn!(
                        "[{}] ignoring value at ({step},{index}): {err}",
                        path.join(",")
                    ),
                }
            }
        }
    }

    // Applied last so the lock state cannot shadow the restore above.
    if let Some(lock) = map.get("lock").and_then(Json::as_bool) {
        param.lock = lock;
    }
}

fn json_strings(items: &[Json]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::EditableSchema;
    use crate::parameter::Field;
    use crate::parameter::FieldValue;
    use crate::typespec::ScalarKind;

    fn build_schema() -> BaseSchema {
        let mut schema = BaseSchema::new();
        let mut edit = EditableSchema::new(&mut schema);
        edit.insert(
            &["option", "width"],
            Parameter::new(TypeSpec::Scalar(ScalarKind::Float))
                .with_unit("um")
                .with_pernode(PerNode::Optional),
            false,
        )
        .expect("compose");
        edit.insert(
            &["library", DEFAULT_KEY, "lef"],
            Parameter::new(TypeSpec::List(ScalarKind::File)),
            false,
        )
        .expect("compose");
        schema
    }

    #[test]
    fn round_trip_reproduces_every_slot() {
        let mut a = build_schema();
        a.set(&["option", "width"], Value::Float(1.5), None, None)
            .unwrap();
        a.set(
            &["option", "width"],
            Value::Float(2.5),
            Some("place"),
            Some("0"),
        )
        .unwrap();
        a.add(
            &["library", "asap7", "lef"],
            Value::Str("asap7.lef".into()),
            None,
            None,
        )
        .unwrap();
        a.set_field(&["option", "width"], Field::Lock, FieldValue::Bool(true))
            .unwrap();

        let mut b = build_schema();
        let diff = b.from_dict(&a.getdict()).unwrap();
        assert!(diff.unknown.is_empty());
        assert_eq!(b.getdict(), a.getdict());
        assert_eq!(
            b.get(&["option", "width"], Some("place"), Some("0")).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn path_fields_serialize_only_for_path_types() {
        let schema = build_schema();
        let doc = schema.getdict();
        assert!(doc["option"]["width"].get("hashalgo").is_none());
        assert_eq!(
            doc["library"][DEFAULT_KEY]["lef"]["hashalgo"],
            Json::String("sha256".to_string())
        );
        assert_eq!(doc["option"]["width"]["unit"], Json::String("um".to_string()));
    }

    #[test]
    fn diff_collects_unknown_and_missing_keys() {
        let mut schema = build_schema();
        let mut doc = schema.getdict();
        if let Json::Object(map) = &mut doc {
            map.remove("library");
            map.insert("retired".to_string(), serde_json::json!({"old": true}));
        }
        let diff = schema.from_dict(&doc).unwrap();
        assert_eq!(diff.unknown, vec!["retired".to_string()]);
        assert_eq!(diff.missing, vec!["library".to_string()]);
    }

    #[test]
    fn templated_keys_materialize_on_merge() {
        let mut a = build_schema();
        a.add(
            &["library", "sky130", "lef"],
            Value::Str("sky130.lef".into()),
            None,
            None,
        )
        .unwrap();

        let mut b = build_schema();
        b.from_dict(&a.getdict()).unwrap();
        assert_eq!(
            b.getkeys(&["library"]).unwrap(),
            vec!["sky130".to_string()]
        );
    }

    #[test]
    fn journal_survives_the_document() {
        let mut a = build_schema();
        a.journal().start();
        a.set(&["option", "width"], Value::Float(3.25), None, None)
            .unwrap();

        let mut b = build_schema();
        b.from_dict(&a.getdict()).unwrap();
        let entries = b.journal().get();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].keypath, vec!["option", "width"]);
        assert_eq!(entries[0].value, Some(Value::Float(3.25)));
    }

    #[test]
    fn manifest_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut a = build_schema();
        a.set(&["option", "width"], Value::Float(0.5), None, None)
            .unwrap();
        a.write_manifest(&path).unwrap();

        let mut b = build_schema();
        let diff = b.read_manifest(&path).unwrap();
        assert!(diff.is_clean());
        assert_eq!(b.getdict(), a.getdict());
    }
}
