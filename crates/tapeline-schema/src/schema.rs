//! The recursive, keypath-addressed schema tree. Every non-leaf node is a
//! [`BaseSchema`]; leaves are [`Parameter`]s. A child stored under the
//! reserved key `default` is a template: mutating through a key that does
//! not exist yet clones the template into a fresh concrete child.

use indexmap::IndexMap;
use log::{debug, warn};

use crate::error::SchemaError;
use crate::journal::{Journal, JournalKind};
use crate::parameter::{DEFAULT_KEY, Field, FieldValue, ParamError, Parameter};
use crate::value::{Value, normalize_value};

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Parameter(Box<Parameter>),
    Schema(BaseSchema),
}

impl SchemaNode {
    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            SchemaNode::Parameter(p) => Some(p),
            SchemaNode::Schema(_) => None,
        }
    }

    pub fn as_schema(&self) -> Option<&BaseSchema> {
        match self {
            SchemaNode::Schema(s) => Some(s),
            SchemaNode::Parameter(_) => None,
        }
    }
}

impl From<Parameter> for SchemaNode {
    fn from(p: Parameter) -> Self {
        SchemaNode::Parameter(Box::new(p))
    }
}

impl From<BaseSchema> for SchemaNode {
    fn from(s: BaseSchema) -> Self {
        SchemaNode::Schema(s)
    }
}

#[derive(Debug, Clone)]
pub struct BaseSchema {
    pub(crate) tree: IndexMap<String, SchemaNode>,
    pub(crate) name: Option<String>,
    pub(crate) journal: Journal,
}

/// Structural equality ignores the journal; two trees with the same shape,
/// names and values are equal regardless of what was recorded along the way.
impl PartialEq for BaseSchema {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree && self.name == other.name
    }
}

impl Default for BaseSchema {
    fn default() -> Self {
        BaseSchema::new()
    }
}

impl BaseSchema {
    pub fn new() -> Self {
        BaseSchema {
            tree: IndexMap::new(),
            name: None,
            journal: Journal::new_root(),
        }
    }

    /// The journal view rooted at this node.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// The identity of this schema, if one was assigned.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Assigns the identity name, exactly once.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), SchemaError> {
        if let Some(existing) = &self.name {
            return Err(SchemaError::NameAlreadySet {
                name: existing.clone(),
            });
        }
        self.name = Some(name.into());
        Ok(())
    }

    pub(crate) fn force_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Points this subtree (recursively) at a new journal lineage.
    pub(crate) fn relink_journal(&mut self, journal: Journal) {
        self.journal = journal.clone();
        for (key, child) in self.tree.iter_mut() {
            if let SchemaNode::Schema(s) = child {
                s.relink_journal(journal.child(key));
            }
        }
    }

    // ------------------------------------------------------------------
    // Traversal

    /// Read-only descent, resolving missing keys through `default`
    /// templates without materializing anything.
    fn node_at(&self, keypath: &[&str]) -> Option<&SchemaNode> {
        let (first, rest) = keypath.split_first()?;
        let child = self
            .tree
            .get(*first)
            .or_else(|| self.tree.get(DEFAULT_KEY))?;
        if rest.is_empty() {
            Some(child)
        } else {
            child.as_schema().and_then(|s| s.node_at(rest))
        }
    }

    /// Descent over the literal structure only (no `default` fallback).
    fn concrete_node(&self, keypath: &[&str]) -> Option<&SchemaNode> {
        let (first, rest) = keypath.split_first()?;
        let child = self.tree.get(*first)?;
        if rest.is_empty() {
            Some(child)
        } else {
            child.as_schema().and_then(|s| s.concrete_node(rest))
        }
    }

    /// Makes `key` concrete in this node, cloning the `default` template if
    /// needed. Returns false when the key neither exists nor has a template
    /// to spawn from.
    pub(crate) fn materialize_child(&mut self, key: &str) -> bool {
        if self.tree.contains_key(key) {
            return true;
        }
        if key == DEFAULT_KEY {
            return false;
        }
        let Some(template) = self.tree.get(DEFAULT_KEY) else {
            return false;
        };
        let mut child = template.clone();
        if let SchemaNode::Schema(s) = &mut child {
            s.relink_journal(self.journal.child(key));
            if s.name.is_none() {
                s.name = Some(key.to_string());
            }
        }
        debug!("materializing '{key}' from its default template");
        self.tree.insert(key.to_string(), child);
        true
    }

    /// Validates a value mutation against the template-resolved parameter
    /// without touching the tree. Runs before [`Self::node_at_mut`]: a
    /// mutation that would error must not leave materialized children
    /// behind. Returns the normalized value.
    fn check_mutation(
        &self,
        keypath: &[&str],
        value: Value,
        step: Option<&str>,
        index: Option<&str>,
    ) -> Result<Value, SchemaError> {
        let node = self
            .node_at(keypath)
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))?;
        let param = node
            .as_parameter()
            .ok_or_else(|| SchemaError::not_a_parameter(keypath))?;
        param
            .check_keys(step, index, true)
            .map_err(|err| SchemaError::param(keypath, err))?;
        normalize_value(param.typespec(), value)
            .map_err(|err| SchemaError::param(keypath, ParamError::from(err)))
    }

    /// Mutable descent that materializes template-backed keys along the way.
    fn node_at_mut(&mut self, keypath: &[&str]) -> Result<&mut SchemaNode, SchemaError> {
        let (last, parents) = keypath
            .split_last()
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))?;
        let mut current = self;
        for key in parents {
            if !current.materialize_child(key) {
                return Err(SchemaError::invalid_keypath(keypath));
            }
            match current.tree.get_mut(*key) {
                Some(SchemaNode::Schema(s)) => current = s,
                _ => return Err(SchemaError::invalid_keypath(keypath)),
            }
        }
        if !current.materialize_child(last) {
            return Err(SchemaError::invalid_keypath(keypath));
        }
        current
            .tree
            .get_mut(*last)
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))
    }

    // ------------------------------------------------------------------
    // Value access

    /// Resolves the value at a keypath. Reading through a `default`
    /// template returns the template's own resolution without creating a
    /// concrete child.
    pub fn get(
        &self,
        keypath: &[&str],
        step: Option<&str>,
        index: Option<&str>,
    ) -> Result<Value, SchemaError> {
        let node = self
            .node_at(keypath)
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))?;
        let param = node
            .as_parameter()
            .ok_or_else(|| SchemaError::not_a_parameter(keypath))?;
        let value = param
            .get_value(step, index)
            .map_err(|err| SchemaError::param(keypath, err))?;
        self.journal.record(
            JournalKind::Get,
            keypath,
            Some(value.clone()),
            None,
            step,
            index,
        );
        Ok(value)
    }

    pub fn get_field(&self, keypath: &[&str], field: Field) -> Result<FieldValue, SchemaError> {
        let node = self
            .node_at(keypath)
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))?;
        let param = node
            .as_parameter()
            .ok_or_else(|| SchemaError::not_a_parameter(keypath))?;
        let payload = param
            .get_field(field)
            .map_err(|err| SchemaError::param(keypath, err))?;
        self.journal.record(
            JournalKind::Get,
            keypath,
            Some(payload.clone().into_value()),
            Some(field),
            None,
            None,
        );
        Ok(payload)
    }

    /// Sets the value at a keypath, overwriting any existing slot.
    pub fn set(
        &mut self,
        keypath: &[&str],
        value: impl Into<Value>,
        step: Option<&str>,
        index: Option<&str>,
    ) -> Result<bool, SchemaError> {
        self.set_clobber(keypath, value, step, index, true)
    }

    pub fn set_clobber(
        &mut self,
        keypath: &[&str],
        value: impl Into<Value>,
        step: Option<&str>,
        index: Option<&str>,
        clobber: bool,
    ) -> Result<bool, SchemaError> {
        let value = self.check_mutation(keypath, value.into(), step, index)?;
        let (ok, locked) = {
            let node = self.node_at_mut(keypath)?;
            let SchemaNode::Parameter(param) = node else {
                return Err(SchemaError::not_a_parameter(keypath));
            };
            let locked = param.is_locked();
            let ok = param
                .set_value(value.clone(), step, index, clobber)
                .map_err(|err| SchemaError::param(keypath, err))?;
            (ok, locked)
        };
        if ok {
            self.journal
                .record(JournalKind::Set, keypath, Some(value), None, step, index);
        } else if locked {
            warn!("[{}] is locked, ignoring set", SchemaError::join(keypath));
        }
        Ok(ok)
    }

    pub fn set_field(
        &mut self,
        keypath: &[&str],
        field: Field,
        payload: FieldValue,
    ) -> Result<bool, SchemaError> {
        let (ok, locked) = {
            let node = self.node_at_mut(keypath)?;
            let SchemaNode::Parameter(param) = node else {
                return Err(SchemaError::not_a_parameter(keypath));
            };
            let locked = param.is_locked();
            let ok = param
                .set_field(field, payload.clone())
                .map_err(|err| SchemaError::param(keypath, err))?;
            (ok, locked)
        };
        if ok {
            self.journal.record(
                JournalKind::Set,
                keypath,
                Some(payload.into_value()),
                Some(field),
                None,
                None,
            );
        } else if locked {
            warn!(
                "[{}] is locked, ignoring set of field '{}'",
                SchemaError::join(keypath),
                field.token()
            );
        }
        Ok(ok)
    }

    /// Appends to a list/set typed parameter.
    pub fn add(
        &mut self,
        keypath: &[&str],
        value: impl Into<Value>,
        step: Option<&str>,
        index: Option<&str>,
    ) -> Result<bool, SchemaError> {
        if let Ok(param) = self.parameter(keypath) {
            if !param.is_list() {
                return Err(SchemaError::param(keypath, ParamError::NotAList));
            }
        }
        let value = self.check_mutation(keypath, value.into(), step, index)?;
        let (ok, locked) = {
            let node = self.node_at_mut(keypath)?;
            let SchemaNode::Parameter(param) = node else {
                return Err(SchemaError::not_a_parameter(keypath));
            };
            let locked = param.is_locked();
            let ok = param
                .add_value(value.clone(), step, index)
                .map_err(|err| SchemaError::param(keypath, err))?;
            (ok, locked)
        };
        if ok {
            self.journal
                .record(JournalKind::Add, keypath, Some(value), None, step, index);
        } else if locked {
            warn!("[{}] is locked, ignoring add", SchemaError::join(keypath));
        }
        Ok(ok)
    }

    pub fn add_field(
        &mut self,
        keypath: &[&str],
        field: Field,
        item: &str,
    ) -> Result<bool, SchemaError> {
        let ok = {
            let node = self.node_at_mut(keypath)?;
            let SchemaNode::Parameter(param) = node else {
                return Err(SchemaError::not_a_parameter(keypath));
            };
            param
                .add_field(field, item)
                .map_err(|err| SchemaError::param(keypath, err))?
        };
        if ok {
            self.journal.record(
                JournalKind::Add,
                keypath,
                Some(Value::Str(item.to_string())),
                Some(field),
                None,
                None,
            );
        }
        Ok(ok)
    }

    /// Deletes the exact `(step, index)` slot. A keypath that only exists
    /// through a template has no concrete slot and unsets nothing.
    pub fn unset(
        &mut self,
        keypath: &[&str],
        step: Option<&str>,
        index: Option<&str>,
    ) -> Result<bool, SchemaError> {
        if self.concrete_node(keypath).is_none() {
            if self.node_at(keypath).is_some() {
                return Ok(false);
            }
            return Err(SchemaError::invalid_keypath(keypath));
        }
        let ok = {
            let node = self.node_at_mut(keypath)?;
            let SchemaNode::Parameter(param) = node else {
                return Err(SchemaError::not_a_parameter(keypath));
            };
            param
                .unset(step, index)
                .map_err(|err| SchemaError::param(keypath, err))?
        };
        if ok {
            self.journal
                .record(JournalKind::Unset, keypath, None, None, step, index);
        }
        Ok(ok)
    }

    /// Removes a concrete, template-materialized subtree or leaf. A silent
    /// no-op when the path does not exist, names the reserved `default`
    /// key, targets a static child, or covers any locked parameter.
    pub fn remove(&mut self, keypath: &[&str]) -> bool {
        let Some((last, parents)) = keypath.split_last() else {
            return false;
        };
        if *last == DEFAULT_KEY {
            return false;
        }
        let removed = {
            let parent = match self.concrete_schema_mut(parents) {
                Some(parent) => parent,
                None => return false,
            };
            if !parent.tree.contains_key(DEFAULT_KEY) {
                return false;
            }
            let Some(node) = parent.tree.get(*last) else {
                return false;
            };
            if node_has_locked_param(node) {
                warn!(
                    "[{}] contains locked parameters, ignoring remove",
                    SchemaError::join(keypath)
                );
                return false;
            }
            parent.tree.shift_remove(*last).is_some()
        };
        if removed {
            self.journal
                .record(JournalKind::Remove, keypath, None, None, None, None);
        }
        removed
    }

    fn concrete_schema_mut(&mut self, keypath: &[&str]) -> Option<&mut BaseSchema> {
        let mut current = self;
        for key in keypath {
            match current.tree.get_mut(*key) {
                Some(SchemaNode::Schema(s)) => current = s,
                _ => return None,
            }
        }
        Some(current)
    }

    // ------------------------------------------------------------------
    // Introspection

    /// Checks a keypath without materializing. `default_valid` lets paths
    /// that only exist through a template count; `check_complete` requires
    /// the final node to be a parameter.
    pub fn valid(&self, keypath: &[&str], default_valid: bool, check_complete: bool) -> bool {
        let mut current = self;
        let Some((last, parents)) = keypath.split_last() else {
            return !check_complete;
        };
        for key in parents {
            let child = match self.lookup(current, key, default_valid) {
                Some(child) => child,
                None => return false,
            };
            match child {
                SchemaNode::Schema(s) => current = s,
                SchemaNode::Parameter(_) => return false,
            }
        }
        match self.lookup(current, last, default_valid) {
            Some(node) => !check_complete || node.as_parameter().is_some(),
            None => false,
        }
    }

    fn lookup<'a>(
        &self,
        node: &'a BaseSchema,
        key: &str,
        default_valid: bool,
    ) -> Option<&'a SchemaNode> {
        node.tree.get(key).or_else(|| {
            if default_valid {
                node.tree.get(DEFAULT_KEY)
            } else {
                None
            }
        })
    }

    /// Immediate child keys under a prefix, excluding the literal `default`.
    pub fn getkeys(&self, keypath: &[&str]) -> Result<Vec<String>, SchemaError> {
        let schema = if keypath.is_empty() {
            self
        } else {
            match self
                .node_at(keypath)
                .ok_or_else(|| SchemaError::invalid_keypath(keypath))?
            {
                SchemaNode::Schema(s) => s,
                SchemaNode::Parameter(_) => return Ok(Vec::new()),
            }
        };
        Ok(schema
            .tree
            .keys()
            .filter(|key| key.as_str() != DEFAULT_KEY)
            .cloned()
            .collect())
    }

    /// Every full leaf keypath under a prefix.
    pub fn allkeys(
        &self,
        keypath: &[&str],
        include_default: bool,
    ) -> Result<Vec<Vec<String>>, SchemaError> {
        let schema = if keypath.is_empty() {
            self
        } else {
            match self
                .node_at(keypath)
                .ok_or_else(|| SchemaError::invalid_keypath(keypath))?
            {
                SchemaNode::Schema(s) => s,
                SchemaNode::Parameter(_) => return Ok(vec![Vec::new()]),
            }
        };
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        collect_leaf_paths(schema, include_default, &mut prefix, &mut out);
        Ok(out)
    }

    /// Borrow of the parameter at a keypath.
    pub fn parameter(&self, keypath: &[&str]) -> Result<&Parameter, SchemaError> {
        self.node_at(keypath)
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))?
            .as_parameter()
            .ok_or_else(|| SchemaError::not_a_parameter(keypath))
    }

    /// Full recursive clone, detached from the original journal; the copy
    /// starts a fresh, empty log of its own.
    pub fn copy(&self) -> BaseSchema {
        let mut clone = self.clone();
        clone.relink_journal(Journal::new_root());
        clone
    }
}

fn collect_leaf_paths(
    schema: &BaseSchema,
    include_default: bool,
    prefix: &mut Vec<String>,
    out: &mut Vec<Vec<String>>,
) {
    for (key, node) in &schema.tree {
        if key == DEFAULT_KEY && !include_default {
            continue;
        }
        prefix.push(key.clone());
        match node {
            SchemaNode::Parameter(_) => out.push(prefix.clone()),
            SchemaNode::Schema(s) => collect_leaf_paths(s, include_default, prefix, out),
        }
        prefix.pop();
    }
}

fn node_has_locked_param(node: &SchemaNode) -> bool {
    match node {
        SchemaNode::Parameter(p) => p.is_locked(),
        SchemaNode::Schema(s) => s.tree.values().any(node_has_locked_param),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::EditableSchema;
    use crate::parameter::PerNode;
    use crate::typespec::{ScalarKind, TypeSpec};

    /// A section with a wildcard template: section.<name>.x
    fn templated_schema() -> BaseSchema {
        let mut schema = BaseSchema::new();
        let mut edit = EditableSchema::new(&mut schema);
        edit.insert(
            &["section", DEFAULT_KEY, "x"],
            Parameter::new(TypeSpec::Scalar(ScalarKind::Int)),
            false,
        )
        .expect("compose");
        schema
    }

    #[test]
    fn template_materializes_on_write_not_on_read() {
        let mut schema = templated_schema();

        // Reading through the template resolves the template's default.
        assert_eq!(
            schema.get(&["section", "alpha", "x"], None, None).unwrap(),
            Value::Null
        );
        assert_eq!(schema.getkeys(&["section"]).unwrap(), Vec::<String>::new());

        // Writing materializes a concrete child.
        schema
            .set(&["section", "alpha", "x"], Value::Int(1), None, None)
            .unwrap();
        schema
            .set(&["section", "beta", "x"], Value::Int(2), None, None)
            .unwrap();
        assert_eq!(
            schema.getkeys(&["section"]).unwrap(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn materialized_children_are_independent_of_the_template() {
        let mut schema = templated_schema();
        schema
            .set(&["section", "alpha", "x"], Value::Int(1), None, None)
            .unwrap();
        schema
            .set(&["section", "beta", "x"], Value::Int(2), None, None)
            .unwrap();

        assert_eq!(
            schema.get(&["section", "alpha", "x"], None, None).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            schema.get(&["section", "beta", "x"], None, None).unwrap(),
            Value::Int(2)
        );
        // The template itself still resolves to its own default.
        assert_eq!(
            schema.get(&["section", "gamma", "x"], None, None).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn invalid_keypath_is_a_hard_error() {
        let schema = templated_schema();
        assert_eq!(
            schema.get(&["nosuch", "key"], None, None),
            Err(SchemaError::InvalidKeypath {
                keypath: "nosuch,key".to_string()
            })
        );
        assert_eq!(
            schema.get(&["section"], None, None),
            Err(SchemaError::NotAParameter {
                keypath: "section".to_string()
            })
        );
    }

    #[test]
    fn valid_honours_default_and_completeness() {
        let schema = templated_schema();
        assert!(!schema.valid(&["section", "alpha", "x"], false, false));
        assert!(schema.valid(&["section", "alpha", "x"], true, false));
        assert!(schema.valid(&["section", "alpha", "x"], true, true));
        assert!(schema.valid(&["section", "alpha"], true, false));
        assert!(!schema.valid(&["section", "alpha"], true, true));
    }

    #[test]
    fn failed_mutations_do_not_materialize_template_children() {
        let mut schema = templated_schema();

        // Reserved step name, illegal step for pernode=never, and a value
        // that fails to normalize: each errors without spawning a child.
        assert!(
            schema
                .set(&["section", "alpha", "x"], Value::Int(1), Some(DEFAULT_KEY), None)
                .is_err()
        );
        assert!(
            schema
                .set(&["section", "beta", "x"], Value::Int(1), Some("syn"), Some("0"))
                .is_err()
        );
        assert!(
            schema
                .set(&["section", "gamma", "x"], Value::Str("zz".into()), None, None)
                .is_err()
        );
        assert!(
            schema
                .add(&["section", "delta", "x"], Value::Int(1), None, None)
                .is_err()
        );
        assert_eq!(schema.getkeys(&["section"]).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn remove_only_deletes_materialized_children() {
        let mut schema = templated_schema();
        schema
            .set(&["section", "alpha", "x"], Value::Int(1), None, None)
            .unwrap();

        assert!(!schema.remove(&["section", DEFAULT_KEY]));
        assert!(!schema.remove(&["section", "nosuch"]));
        // "section" itself is static (its parent has no template).
        assert!(!schema.remove(&["section"]));

        assert!(schema.remove(&["section", "alpha"]));
        assert_eq!(schema.getkeys(&["section"]).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn remove_skips_subtrees_with_locked_parameters() {
        let mut schema = templated_schema();
        schema
            .set(&["section", "alpha", "x"], Value::Int(1), None, None)
            .unwrap();
        schema
            .set_field(&["section", "alpha", "x"], Field::Lock, FieldValue::Bool(true))
            .unwrap();
        assert!(!schema.remove(&["section", "alpha"]));
        assert_eq!(
            schema.getkeys(&["section"]).unwrap(),
            vec!["alpha".to_string()]
        );
    }

    #[test]
    fn allkeys_walks_leaves_and_skips_default() {
        let mut schema = templated_schema();
        let mut edit = EditableSchema::new(&mut schema);
        edit.insert(
            &["tool", "opt"],
            Parameter::new(TypeSpec::Scalar(ScalarKind::Str)),
            false,
        )
        .expect("compose");

        schema
            .set(&["section", "alpha", "x"], Value::Int(1), None, None)
            .unwrap();

        let keys = schema.allkeys(&[], false).unwrap();
        assert_eq!(
            keys,
            vec![
                vec!["section".to_string(), "alpha".to_string(), "x".to_string()],
                vec!["tool".to_string(), "opt".to_string()],
            ]
        );
        let with_default = schema.allkeys(&[], true).unwrap();
        assert!(with_default.contains(&vec![
            "section".to_string(),
            DEFAULT_KEY.to_string(),
            "x".to_string()
        ]));
    }

    #[test]
    fn copy_detaches_journal_and_preserves_values() {
        let mut schema = templated_schema();
        schema.journal().start();
        schema
            .set(&["section", "alpha", "x"], Value::Int(1), None, None)
            .unwrap();
        assert!(schema.journal().has_journaling());

        let copy = schema.copy();
        assert_eq!(copy, schema);
        assert!(!copy.journal().has_journaling());
    }

    #[test]
    fn name_is_settable_exactly_once() {
        let mut schema = BaseSchema::new();
        schema.set_name("asap7").unwrap();
        assert_eq!(schema.name(), Some("asap7"));
        assert_eq!(
            schema.set_name("sky130"),
            Err(SchemaError::NameAlreadySet {
                name: "asap7".to_string()
            })
        );
    }

    #[test]
    fn mutations_record_into_the_journal() {
        let mut schema = templated_schema();
        schema.journal().start();
        schema
            .set(&["section", "alpha", "x"], Value::Int(1), None, None)
            .unwrap();
        schema.remove(&["section", "alpha"]);

        let entries = schema.journal().get();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, JournalKind::Set);
        assert_eq!(entries[0].keypath, vec!["section", "alpha", "x"]);
        assert_eq!(entries[1].kind, JournalKind::Remove);
        assert_eq!(entries[1].keypath, vec!["section", "alpha"]);
    }

    #[test]
    fn pernode_steps_resolve_per_parameter() {
        let mut schema = BaseSchema::new();
        let mut edit = EditableSchema::new(&mut schema);
        edit.insert(
            &["metric", "errors"],
            Parameter::new(TypeSpec::Scalar(ScalarKind::Int)).with_pernode(PerNode::Required),
            false,
        )
        .expect("compose");

        schema
            .set(&["metric", "errors"], Value::Int(4), Some("syn"), Some("0"))
            .unwrap();
        assert_eq!(
            schema
                .get(&["metric", "errors"], Some("syn"), Some("0"))
                .unwrap(),
            Value::Int(4)
        );
        assert_eq!(
            schema
                .get(&["metric", "errors"], Some("place"), Some("0"))
                .unwrap(),
            Value::Null
        );
    }
}
