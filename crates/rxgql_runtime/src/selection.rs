//! Selection sets and response shaping.

use crate::executor::{FieldError, PathSegment};
use crate::resolver::lookup_field;
use serde_json::Value;

/// One selected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    name: String,
    alias: Option<String>,
    selection_set: SelectionSet,
}

impl Selection {
    /// Selects a leaf field.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            selection_set: SelectionSet::new(),
        }
    }

    /// Renames the field in the response.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets the sub-selection.
    pub fn select(mut self, selection_set: SelectionSet) -> Self {
        self.selection_set = selection_set;
        self
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key this field is written under in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// The sub-selection.
    pub fn selection_set(&self) -> &SelectionSet {
        &self.selection_set
    }
}

/// An ordered set of selected fields.
///
/// An empty set selects the whole value, which is what a leaf field needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    selections: Vec<Selection>,
}

impl SelectionSet {
    /// Creates an empty selection set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a list of leaf fields.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selections: names.into_iter().map(Selection::field).collect(),
        }
    }

    /// Adds a selection.
    pub fn field(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    /// Returns true if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Iterates over the selections.
    pub fn iter(&self) -> impl Iterator<Item = &Selection> {
        self.selections.iter()
    }

    /// Projects `value` onto this selection.
    ///
    /// Objects keep only the selected fields in selection order, lists are
    /// projected element by element and null passes through. Selecting
    /// sub-fields of a scalar is an error located at `path`.
    pub fn project(&self, value: &Value, path: &mut Vec<PathSegment>) -> Result<Value, FieldError> {
        if self.is_empty() {
            return Ok(value.clone());
        }

        match value {
            Value::Null => Ok(Value::Null),
            Value::Object(object) => {
                let mut projected = serde_json::Map::new();
                for selection in &self.selections {
                    path.push(PathSegment::Field(selection.response_key().to_string()));
                    let child = lookup_field(object, &selection.name);
                    let child = selection.selection_set.project(&child, path)?;
                    path.pop();
                    projected.insert(selection.response_key().to_string(), child);
                }
                Ok(Value::Object(projected))
            }
            Value::Array(items) => {
                let mut projected = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    projected.push(self.project(item, path)?);
                    path.pop();
                }
                Ok(Value::Array(projected))
            }
            _ => Err(FieldError::new(format!(
                "Cannot select sub-fields of scalar value {}",
                value
            ))
            .with_path(path.clone())
            .with_code("VALIDATION_ERROR")),
        }
    }
}

impl FromIterator<Selection> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = Selection>>(iter: I) -> Self {
        Self {
            selections: iter.into_iter().collect(),
        }
    }
}
