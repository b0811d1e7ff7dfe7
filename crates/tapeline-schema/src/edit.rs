//! Privileged builder used while composing a schema's shape. Shape is fixed
//! at construction time; all `EditableSchema` calls happen in constructors.

use crate::error::SchemaError;
use crate::parameter::DEFAULT_KEY;
use crate::schema::{BaseSchema, SchemaNode};

pub struct EditableSchema<'a> {
    schema: &'a mut BaseSchema,
}

impl<'a> EditableSchema<'a> {
    pub fn new(schema: &'a mut BaseSchema) -> Self {
        EditableSchema { schema }
    }

    /// Wires `node` in at `keypath`, creating intermediate tree nodes as
    /// needed. Inserting a subtree names it after its terminal key, unless
    /// the key is `default`, which denotes a template and clears the name.
    pub fn insert(
        &mut self,
        keypath: &[&str],
        node: impl Into<SchemaNode>,
        clobber: bool,
    ) -> Result<(), SchemaError> {
        let (last, parents) = keypath
            .split_last()
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))?;
        let mut current = &mut *self.schema;
        for key in parents {
            if !current.tree.contains_key(*key) {
                let mut section = BaseSchema::new();
                section.relink_journal(current.journal.child(key));
                current.tree.insert(key.to_string(), section.into());
            }
            match current.tree.get_mut(*key) {
                Some(SchemaNode::Schema(s)) => current = s,
                _ => return Err(SchemaError::invalid_keypath(keypath)),
            }
        }
        if !clobber && current.tree.contains_key(*last) {
            return Err(SchemaError::KeyExists {
                keypath: SchemaError::join(keypath),
            });
        }
        let mut node = node.into();
        if let SchemaNode::Schema(subtree) = &mut node {
            subtree.relink_journal(current.journal.child(last));
            if *last == DEFAULT_KEY {
                subtree.force_name(None);
            } else if subtree.name().is_none() {
                subtree.force_name(Some(last.to_string()));
            }
        }
        current.tree.insert(last.to_string(), node);
        Ok(())
    }

    /// Removes the literal node at `keypath`, the `default` template
    /// included. No materialization, no lock checks; this edits shape, not
    /// content.
    pub fn remove(&mut self, keypath: &[&str]) -> Result<(), SchemaError> {
        let (last, parents) = keypath
            .split_last()
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))?;
        let mut current = &mut *self.schema;
        for key in parents {
            match current.tree.get_mut(*key) {
                Some(SchemaNode::Schema(s)) => current = s,
                _ => return Err(SchemaError::invalid_keypath(keypath)),
            }
        }
        current
            .tree
            .shift_remove(*last)
            .map(|_| ())
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))
    }

    /// Borrow of the literal node at `keypath`, the `default` template
    /// included.
    pub fn search(&mut self, keypath: &[&str]) -> Result<&mut SchemaNode, SchemaError> {
        let (last, parents) = keypath
            .split_last()
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))?;
        let mut current = &mut *self.schema;
        for key in parents {
            match current.tree.get_mut(*key) {
                Some(SchemaNode::Schema(s)) => current = s,
                _ => return Err(SchemaError::invalid_keypath(keypath)),
            }
        }
        current
            .tree
            .get_mut(*last)
            .ok_or_else(|| SchemaError::invalid_keypath(keypath))
    }

    /// Re-identifies a schema that is not yet attached to a parent. The
    /// set-once rule applies to attached schemas; a root under composition
    /// may still be renamed.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.schema.force_name(Some(name.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;
    use crate::typespec::{ScalarKind, TypeSpec};
    use crate::value::Value;

    #[test]
    fn insert_creates_intermediate_sections() {
        let mut schema = BaseSchema::new();
        let mut edit = EditableSchema::new(&mut schema);
        edit.insert(
            &["pdk", "foundry"],
            Parameter::new(TypeSpec::Scalar(ScalarKind::Str)),
            false,
        )
        .unwrap();

        assert!(schema.valid(&["pdk", "foundry"], false, true));
    }

    #[test]
    fn insert_without_clobber_rejects_existing_keys() {
        let mut schema = BaseSchema::new();
        let mut edit = EditableSchema::new(&mut schema);
        let param = || Parameter::new(TypeSpec::Scalar(ScalarKind::Str));
        edit.insert(&["pdk", "foundry"], param(), false).unwrap();
        assert_eq!(
            edit.insert(&["pdk", "foundry"], param(), false),
            Err(SchemaError::KeyExists {
                keypath: "pdk,foundry".to_string()
            })
        );
        edit.insert(&["pdk", "foundry"], param(), true).unwrap();
    }

    #[test]
    fn inserted_subtrees_take_their_key_as_name() {
        let mut schema = BaseSchema::new();
        let mut edit = EditableSchema::new(&mut schema);
        edit.insert(&["library", "stdcell"], BaseSchema::new(), false)
            .unwrap();
        edit.insert(&["library", DEFAULT_KEY], BaseSchema::new(), false)
            .unwrap();

        let named = edit.search(&["library", "stdcell"]).unwrap();
        assert_eq!(named.as_schema().and_then(|s| s.name()), Some("stdcell"));
        let template = edit.search(&["library", DEFAULT_KEY]).unwrap();
        assert_eq!(template.as_schema().and_then(|s| s.name()), None);
    }

    #[test]
    fn search_and_remove_operate_on_literal_structure() {
        let mut schema = BaseSchema::new();
        let mut edit = EditableSchema::new(&mut schema);
        edit.insert(
            &["section", DEFAULT_KEY, "x"],
            Parameter::new(TypeSpec::Scalar(ScalarKind::Int)),
            false,
        )
        .unwrap();

        assert!(edit.search(&["section", DEFAULT_KEY, "x"]).is_ok());
        // No materialization through templates.
        assert!(edit.search(&["section", "alpha", "x"]).is_err());

        edit.remove(&["section", DEFAULT_KEY]).unwrap();
        assert!(edit.search(&["section", DEFAULT_KEY]).is_err());
    }

    #[test]
    fn inserted_subtree_journals_against_the_root() {
        let mut schema = BaseSchema::new();
        let mut sub = BaseSchema::new();
        let mut sub_edit = EditableSchema::new(&mut sub);
        sub_edit
            .insert(
                &["rev"],
                Parameter::new(TypeSpec::Scalar(ScalarKind::Str)),
                false,
            )
            .unwrap();

        let mut edit = EditableSchema::new(&mut schema);
        edit.insert(&["library", "stdcell"], sub, false).unwrap();

        schema.journal().start();
        schema
            .set(&["library", "stdcell", "rev"], Value::Str("1p0".into()), None, None)
            .unwrap();
        let entries = schema.journal().get();
        assert_eq!(entries[0].keypath, vec!["library", "stdcell", "rev"]);
    }
}
