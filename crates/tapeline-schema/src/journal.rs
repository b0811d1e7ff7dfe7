//! Append-only mutation log shared between a schema root and its subtree
//! views. A clone handed to an isolated task records everything that
//! changed; replaying the log against the parent reconciles state without
//! re-running work.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};

use crate::error::SchemaError;
use crate::parameter::{Field, FieldValue};
use crate::schema::BaseSchema;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalKind {
    Set,
    Add,
    Remove,
    Unset,
    Get,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub kind: JournalKind,
    pub keypath: Vec<String>,
    pub value: Option<Value>,
    pub field: Option<Field>,
    pub step: Option<String>,
    pub index: Option<String>,
}

impl JournalEntry {
    pub fn to_json(&self) -> Json {
        json!({
            "type": self.kind,
            "key": self.keypath,
            "value": self.value.as_ref().map(Value::to_json).unwrap_or(Json::Null),
            "field": self.field,
            "step": self.step,
            "index": self.index,
        })
    }

    pub fn from_json(json: &Json) -> Result<JournalEntry, SchemaError> {
        let bad = |detail: &str| SchemaError::Manifest(format!("__journal__ entry: {detail}"));
        let kind: JournalKind = serde_json::from_value(json["type"].clone())
            .map_err(|err| bad(&err.to_string()))?;
        let keypath: Vec<String> = serde_json::from_value(json["key"].clone())
            .map_err(|err| bad(&err.to_string()))?;
        let field: Option<Field> = serde_json::from_value(json["field"].clone())
            .map_err(|err| bad(&err.to_string()))?;
        let value = match &json["value"] {
            Json::Null => None,
            other => Some(Value::from_json_untyped(other)),
        };
        let opt_str = |key: &str| -> Result<Option<String>, SchemaError> {
            serde_json::from_value(json[key].clone()).map_err(|err| bad(&err.to_string()))
        };
        Ok(JournalEntry {
            kind,
            keypath,
            value,
            field,
            step: opt_str("step")?,
            index: opt_str("index")?,
        })
    }
}

#[derive(Debug)]
struct JournalLog {
    entries: Vec<JournalEntry>,
    active: bool,
    kinds: HashSet<JournalKind>,
}

impl Default for JournalLog {
    fn default() -> Self {
        JournalLog {
            entries: Vec::new(),
            active: false,
            kinds: HashSet::from([
                JournalKind::Set,
                JournalKind::Add,
                JournalKind::Remove,
                JournalKind::Unset,
            ]),
        }
    }
}

/// Handle onto the shared log. The root view owns an empty prefix; child
/// views created while wiring a subtree prepend their keypath before
/// delegating to the same log.
#[derive(Debug, Clone)]
pub struct Journal {
    log: Rc<RefCell<JournalLog>>,
    prefix: Vec<String>,
}

impl Default for Journal {
    fn default() -> Self {
        Journal::new_root()
    }
}

impl Journal {
    pub fn new_root() -> Self {
        Journal {
            log: Rc::new(RefCell::new(JournalLog::default())),
            prefix: Vec::new(),
        }
    }

    /// A view one key deeper, sharing the same log.
    pub(crate) fn child(&self, key: &str) -> Journal {
        let mut prefix = self.prefix.clone();
        prefix.push(key.to_string());
        Journal {
            log: Rc::clone(&self.log),
            prefix,
        }
    }

    pub fn is_root(&self) -> bool {
        self.prefix.is_empty()
    }

    pub fn start(&self) {
        self.log.borrow_mut().active = true;
    }

    pub fn stop(&self) {
        self.log.borrow_mut().active = false;
    }

    pub fn add_type(&self, kind: JournalKind) {
        self.log.borrow_mut().kinds.insert(kind);
    }

    pub fn remove_type(&self, kind: JournalKind) {
        self.log.borrow_mut().kinds.remove(&kind);
    }

    pub fn is_recording(&self, kind: JournalKind) -> bool {
        let log = self.log.borrow();
        log.active && log.kinds.contains(&kind)
    }

    /// Appends an entry if recording is active for `kind`. `keypath` is
    /// relative to this view; the root-relative path is stored.
    pub(crate) fn record(
        &self,
        kind: JournalKind,
        keypath: &[&str],
        value: Option<Value>,
        field: Option<Field>,
        step: Option<&str>,
        index: Option<&str>,
    ) {
        if !self.is_recording(kind) {
            return;
        }
        let mut full = self.prefix.clone();
        full.extend(keypath.iter().map(|key| key.to_string()));
        self.log.borrow_mut().entries.push(JournalEntry {
            kind,
            keypath: full,
            value,
            field,
            step: step.map(str::to_string),
            index: index.map(str::to_string),
        });
    }

    /// Deep copy of the recorded entries, in occurrence order.
    pub fn get(&self) -> Vec<JournalEntry> {
        self.log.borrow().entries.clone()
    }

    /// True only at the root view and only once an entry exists.
    pub fn has_journaling(&self) -> bool {
        self.is_root() && !self.log.borrow().entries.is_empty()
    }

    pub(crate) fn restore(&self, entries: Vec<JournalEntry>) {
        self.log.borrow_mut().entries = entries;
    }

    /// Re-applies every entry in original order against `target`. `Get`
    /// entries were recorded for audit only and replay as no-ops. Whether
    /// the replay is itself recorded depends on the target's own journal.
    pub fn replay(&self, target: &mut BaseSchema) -> Result<(), SchemaError> {
        let entries = self.get();
        debug!("replaying {} journal entries", entries.len());
        for entry in entries {
            replay_entry(&entry, target)?;
        }
        Ok(())
    }
}

fn replay_entry(entry: &JournalEntry, target: &mut BaseSchema) -> Result<(), SchemaError> {
    let keypath: Vec<&str> = entry.keypath.iter().map(String::as_str).collect();
    let step = entry.step.as_deref();
    let index = entry.index.as_deref();
    match entry.kind {
        JournalKind::Set => match entry.field {
            None | Some(Field::Value) => {
                let value = entry.value.clone().unwrap_or(Value::Null);
                target.set(&keypath, value, step, index)?;
            }
            Some(field) => {
                let value = entry.value.clone().unwrap_or(Value::Null);
                let payload = FieldValue::from_value(field, value)
                    .map_err(|err| SchemaError::param(&keypath, err))?;
                target.set_field(&keypath, field, payload)?;
            }
        },
        JournalKind::Add => match entry.field {
            None | Some(Field::Value) => {
                let value = entry.value.clone().unwrap_or(Value::Null);
                target.add(&keypath, value, step, index)?;
            }
            Some(field) => {
                let item = match entry.value.clone() {
                    Some(Value::Str(s)) => s,
                    other => {
                        return Err(SchemaError::Manifest(format!(
                            "journal add to field '{}' expects a str, got {:?}",
                            field.token(),
                            other
                        )));
                    }
                };
                target.add_field(&keypath, field, &item)?;
            }
        },
        JournalKind::Remove => {
            target.remove(&keypath);
        }
        JournalKind::Unset => {
            target.unset(&keypath, step, index)?;
        }
        JournalKind::Get => {}
    }
    Ok(())
}
