//! Models and schemas consumed by the store.
//!
//! A [`Model`] is a name plus a [`Schema`]. Stores only ever ask a model for
//! its name and for the field holding the primary key; field types are kept
//! for callers but never enforced.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Primary key field used when a schema does not flag one.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Declaration of a single schema field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(rename = "primaryKey", default, skip_serializing_if = "is_false")]
    pub primary_key: bool,
    /// Any other attribute, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Record schema: the primary key field plus optional field declarations.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    primary_key: String,
    fields: BTreeMap<String, FieldSpec>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::with_primary_key(DEFAULT_PRIMARY_KEY)
    }
}

impl Schema {
    /// Schema with no declared fields and the given primary key.
    pub fn with_primary_key(primary_key: impl Into<String>) -> Self {
        Schema {
            primary_key: primary_key.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Parse a field definition document.
    ///
    /// ```
    /// use cache_store::model::Schema;
    /// use serde_json::json;
    ///
    /// let schema = Schema::from_definition(&json!({
    ///     "id":  { "type": "String", "primaryKey": true },
    ///     "foo": { "type": "String" }
    /// })).unwrap();
    ///
    /// assert_eq!(schema.primary_key(), "id");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the document is not an object, a field
    /// declaration is malformed, or more than one field is flagged as
    /// primary key.
    pub fn from_definition(definition: &Value) -> Result<Self> {
        let object = definition.as_object().ok_or_else(|| {
            Error::Validation("schema definition must be an object".to_string())
        })?;

        let mut fields = BTreeMap::new();
        let mut primary_key: Option<String> = None;

        for (name, spec) in object {
            let spec: FieldSpec = serde_json::from_value(spec.clone()).map_err(|e| {
                Error::Validation(format!("invalid declaration for field {}: {}", name, e))
            })?;

            if spec.primary_key {
                if let Some(existing) = &primary_key {
                    return Err(Error::Validation(format!(
                        "schema declares more than one primary key ({}, {})",
                        existing, name
                    )));
                }
                primary_key = Some(name.clone());
            }

            fields.insert(name.clone(), spec);
        }

        Ok(Schema {
            primary_key: primary_key.unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string()),
            fields,
        })
    }

    /// Name of the primary key field.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldSpec> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }
}

/// A named model.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    name: String,
    schema: Schema,
}

impl Model {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Model {
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Name of the primary key field.
    pub fn primary_key(&self) -> &str {
        self.schema.primary_key()
    }

    /// Extract the primary key value from a record or query.
    ///
    /// Returns `None` when the field is missing or holds `null`, `false`,
    /// `0` or an empty string. Strings are returned as-is, other scalars in
    /// their JSON text form, composite values as compact JSON.
    pub fn primary_key_of(&self, record: &Value) -> Option<String> {
        let value = record.get(self.primary_key()).filter(|v| is_truthy(v))?;
        match value {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Whether a value counts as present: anything but `null`, `false`, `0`
/// or an empty string.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}
