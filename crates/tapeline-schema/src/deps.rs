//! Named-object dependency graph. A [`DependencySchema`] owns a locked
//! `deps` list parameter (the serialized form: names only) plus a runtime
//! name→object map rebuilt after deserialization.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::edit::EditableSchema;
use crate::error::SchemaError;
use crate::parameter::{Field, FieldValue, Parameter};
use crate::schema::BaseSchema;
use crate::typespec::{ScalarKind, TypeSpec};
use crate::value::Value;

pub const DEPS_KEY: &str = "deps";

/// Shared handle to a dependency object. Shared ownership is required for
/// diamond and cyclic graphs; the engine is single-threaded, so `Rc` over
/// `RefCell` suffices.
pub type SharedDep = Rc<RefCell<DependencySchema>>;

#[derive(Debug)]
pub struct DependencySchema {
    base: BaseSchema,
    depmap: IndexMap<String, SharedDep>,
}

impl DependencySchema {
    pub fn new(name: impl Into<String>) -> Self {
        let mut base = BaseSchema::new();
        base.force_name(Some(name.into()));
        let mut edit = EditableSchema::new(&mut base);
        // Permanently locked against direct edits; add_dep/remove_dep
        // unlock it around their own writes.
        let deps = Parameter::new(TypeSpec::List(ScalarKind::Str))
            .with_shorthelp("Ordered dependency names")
            .with_lock(true);
        edit.insert(&[DEPS_KEY], deps, false)
            .expect("a fresh schema accepts the deps parameter");
        DependencySchema {
            base,
            depmap: IndexMap::new(),
        }
    }

    pub fn shared(name: impl Into<String>) -> SharedDep {
        Rc::new(RefCell::new(DependencySchema::new(name)))
    }

    pub fn name(&self) -> Option<&str> {
        self.base.name()
    }

    /// The parameter tree carried by this object.
    pub fn base(&self) -> &BaseSchema {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut BaseSchema {
        &mut self.base
    }

    fn dep_names(&self) -> Vec<String> {
        match self.base.get(&[DEPS_KEY], None, None) {
            Ok(Value::List(items)) | Ok(Value::Set(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Str(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn with_deps_unlocked<T>(
        &mut self,
        f: impl FnOnce(&mut BaseSchema) -> Result<T, SchemaError>,
    ) -> Result<T, SchemaError> {
        self.base
            .set_field(&[DEPS_KEY], Field::Lock, FieldValue::Bool(false))?;
        let result = f(&mut self.base);
        self.base
            .set_field(&[DEPS_KEY], Field::Lock, FieldValue::Bool(true))?;
        result
    }

    /// Registers a dependency. `Ok(false)` when already present and
    /// `clobber` is false; an error when the object carries no name.
    pub fn add_dep(&mut self, dep: &SharedDep, clobber: bool) -> Result<bool, SchemaError> {
        let name = dep
            .borrow()
            .name()
            .map(str::to_string)
            .ok_or(SchemaError::DependencyUnnamed)?;
        if self.depmap.contains_key(&name) && !clobber {
            return Ok(false);
        }
        if !self.dep_names().contains(&name) {
            self.with_deps_unlocked(|base| {
                base.add(&[DEPS_KEY], Value::Str(name.clone()), None, None)
            })?;
        }
        self.depmap.insert(name, Rc::clone(dep));
        Ok(true)
    }

    /// Cycle-safe depth-first flattening of the dependency graph, in
    /// declaration order. With `hierarchy`, walks transitively; a seen set
    /// guarantees each object appears once and the walk terminates on
    /// diamonds and cycles. The receiver itself is never included.
    pub fn get_dep(&self, hierarchy: bool) -> Vec<SharedDep> {
        let mut seen: HashSet<String> = HashSet::new();
        if let Some(name) = self.name() {
            seen.insert(name.to_string());
        }
        let mut out = Vec::new();
        self.collect_deps(hierarchy, &mut seen, &mut out);
        out
    }

    fn collect_deps(&self, hierarchy: bool, seen: &mut HashSet<String>, out: &mut Vec<SharedDep>) {
        for name in self.dep_names() {
            let Some(dep) = self.depmap.get(&name) else {
                continue;
            };
            if !seen.insert(name) {
                continue;
            }
            out.push(Rc::clone(dep));
            if hierarchy {
                dep.borrow().collect_deps(hierarchy, seen, out);
            }
        }
    }

    /// Looks up a dependency by name, direct first, then transitively.
    pub fn get_dep_named(&self, name: &str) -> Result<SharedDep, SchemaError> {
        if let Some(dep) = self.depmap.get(name) {
            return Ok(Rc::clone(dep));
        }
        for dep in self.get_dep(true) {
            if dep.borrow().name() == Some(name) {
                return Ok(dep);
            }
        }
        Err(SchemaError::DependencyNotFound {
            name: name.to_string(),
        })
    }

    /// Drops a dependency from both the locked list and the runtime map.
    /// `Ok(false)` when the name is not present.
    pub fn remove_dep(&mut self, name: &str) -> Result<bool, SchemaError> {
        if !self.depmap.contains_key(name) && !self.dep_names().contains(&name.to_string()) {
            return Ok(false);
        }
        let kept: Vec<Value> = self
            .dep_names()
            .into_iter()
            .filter(|dep| dep != name)
            .map(Value::Str)
            .collect();
        self.with_deps_unlocked(|base| base.set(&[DEPS_KEY], Value::List(kept), None, None))?;
        self.depmap.shift_remove(name);
        Ok(true)
    }

    /// Rebuilds the runtime object map after deserialization: the `deps`
    /// parameter holds names only, resolved against a caller-supplied map.
    /// Recurses into nested dependencies; errors when a name is absent.
    pub fn populate_deps(&mut self, map: &IndexMap<String, SharedDep>) -> Result<(), SchemaError> {
        let mut seen: HashSet<String> = HashSet::new();
        if let Some(name) = self.name() {
            seen.insert(name.to_string());
        }
        self.populate_deps_inner(map, &mut seen)
    }

    fn populate_deps_inner(
        &mut self,
        map: &IndexMap<String, SharedDep>,
        seen: &mut HashSet<String>,
    ) -> Result<(), SchemaError> {
        for name in self.dep_names() {
            let dep = map
                .get(&name)
                .cloned()
                .ok_or_else(|| SchemaError::DependencyNotFound { name: name.clone() })?;
            self.depmap.insert(name.clone(), Rc::clone(&dep));
            if seen.insert(name) {
                dep.borrow_mut().populate_deps_inner(map, seen)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deps_parameter_rejects_direct_edits() {
        let mut lib = DependencySchema::new("stdcell");
        assert!(
            !lib.base_mut()
                .set(&[DEPS_KEY], Value::Str("rogue".into()), None, None)
                .unwrap()
        );
        assert!(lib.dep_names().is_empty());
    }

    #[test]
    fn add_get_remove_round_trip() {
        let mut top = DependencySchema::new("top");
        let lib = DependencySchema::shared("stdcell");

        assert!(top.add_dep(&lib, false).unwrap());
        assert!(!top.add_dep(&lib, false).unwrap());
        assert_eq!(top.dep_names(), vec!["stdcell".to_string()]);

        let found = top.get_dep_named("stdcell").unwrap();
        assert_eq!(found.borrow().name(), Some("stdcell"));

        assert!(top.remove_dep("stdcell").unwrap());
        assert!(!top.remove_dep("stdcell").unwrap());
        assert!(top.dep_names().is_empty());
    }

    #[test]
    fn unnamed_dependency_is_a_hard_error() {
        let mut top = DependencySchema::new("top");
        let anon = DependencySchema::shared("x");
        anon.borrow_mut().base.force_name(None);
        assert_eq!(
            top.add_dep(&anon, false),
            Err(SchemaError::DependencyUnnamed)
        );
    }

    #[test]
    fn cycle_flattens_in_finite_time_without_the_receiver() {
        let a = DependencySchema::shared("a");
        let b = DependencySchema::shared("b");
        let c = DependencySchema::shared("c");
        a.borrow_mut().add_dep(&b, false).unwrap();
        b.borrow_mut().add_dep(&c, false).unwrap();
        c.borrow_mut().add_dep(&a, false).unwrap();

        let flat = a.borrow().get_dep(true);
        let names: Vec<String> = flat
            .iter()
            .map(|dep| dep.borrow().name().unwrap_or_default().to_string())
            .collect();
        assert_eq!(names, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn diamond_yields_each_dependency_once() {
        let top = DependencySchema::shared("top");
        let left = DependencySchema::shared("left");
        let right = DependencySchema::shared("right");
        let shared = DependencySchema::shared("shared");
        left.borrow_mut().add_dep(&shared, false).unwrap();
        right.borrow_mut().add_dep(&shared, false).unwrap();
        top.borrow_mut().add_dep(&left, false).unwrap();
        top.borrow_mut().add_dep(&right, false).unwrap();

        let flat = top.borrow().get_dep(true);
        let names: Vec<String> = flat
            .iter()
            .map(|dep| dep.borrow().name().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["left".to_string(), "shared".to_string(), "right".to_string()]
        );

        let direct = top.borrow().get_dep(false);
        assert_eq!(direct.len(), 2);
    }

    #[test]
    fn populate_deps_rebuilds_the_map_by_name() {
        let mut top = DependencySchema::new("top");
        let lib = DependencySchema::shared("stdcell");
        top.add_dep(&lib, false).unwrap();
        // Simulate deserialization: names survive, the map does not.
        top.depmap.clear();

        let mut map = IndexMap::new();
        map.insert("stdcell".to_string(), Rc::clone(&lib));
        top.populate_deps(&map).unwrap();
        assert!(top.get_dep_named("stdcell").is_ok());

        top.depmap.clear();
        let empty = IndexMap::new();
        assert_eq!(
            top.populate_deps(&empty),
            Err(SchemaError::DependencyNotFound {
                name: "stdcell".to_string()
            })
        );
    }
}
