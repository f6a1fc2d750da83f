//! Table schemas and the built-in schema registry.
//!
//! The schema model follows the frictionless table-schema shape used by Open
//! Referral package descriptors: named fields with types and constraints,
//! a primary key, and foreign-key declarations. The registry embeds the
//! standard Open Referral descriptor at compile time and resolves a resource
//! name to its schema; it is parsed once and read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// The standard Open Referral package descriptor, embedded at build time.
const BUILTIN_DESCRIPTOR: &str = include_str!("../data/datapackage.json");

/// Cell type of a schema field.
///
/// Unknown type names in external descriptors degrade to `Any` rather than
/// failing the whole descriptor load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Any,
    String,
    Integer,
    Number,
    Boolean,
    Date,
    Time,
    DateTime,
    Email,
    Uri,
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "string" => FieldType::String,
            "integer" => FieldType::Integer,
            "number" => FieldType::Number,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "time" => FieldType::Time,
            "datetime" => FieldType::DateTime,
            "email" => FieldType::Email,
            "uri" => FieldType::Uri,
            _ => FieldType::Any,
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Any => "any",
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::DateTime => "datetime",
            FieldType::Email => "email",
            FieldType::Uri => "uri",
        };
        f.write_str(name)
    }
}

/// Value constraints on a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
}

/// One column of a tabular resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub constraints: Constraints,
}

/// A foreign-key declaration: values of `fields` must exist in the
/// referenced resource's `reference.fields` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    #[serde(deserialize_with = "string_or_seq")]
    pub fields: Vec<String>,
    pub reference: ForeignKeyReference,
}

/// The referenced side of a foreign key. An empty `resource` means a
/// self-reference, per the frictionless convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyReference {
    #[serde(default)]
    pub resource: String,
    #[serde(deserialize_with = "string_or_seq")]
    pub fields: Vec<String>,
}

/// Schema of one tabular resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, rename = "primaryKey", deserialize_with = "string_or_seq")]
    pub primary_key: Vec<String>,
    #[serde(default, rename = "foreignKeys")]
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    /// Look up a field by column name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `name` must hold distinct values: either declared unique or
    /// the sole primary-key column.
    pub fn is_unique_column(&self, name: &str) -> bool {
        if let Some(field) = self.field(name)
            && field.constraints.unique
        {
            return true;
        }
        self.primary_key.len() == 1 && self.primary_key[0] == name
    }

    /// Whether a cell in `name` may be empty.
    pub fn is_required_column(&self, name: &str) -> bool {
        self.field(name)
            .map(|f| f.constraints.required)
            .unwrap_or(false)
            || self.primary_key.iter().any(|k| k == name)
    }
}

/// Frictionless descriptors write single-column keys either as a bare string
/// or as a one-element array; accept both.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrSeq {
        One(String),
        Many(Vec<String>),
    }

    match StringOrSeq::deserialize(deserializer)? {
        StringOrSeq::One(s) => Ok(vec![s]),
        StringOrSeq::Many(v) => Ok(v),
    }
}

/// Process-wide read-only registry of the built-in resource schemas.
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<TableSchema>>,
    names: Vec<String>,
}

static REGISTRY: LazyLock<SchemaRegistry> = LazyLock::new(|| {
    SchemaRegistry::from_descriptor_json(BUILTIN_DESCRIPTOR)
        .expect("embedded Open Referral descriptor is valid")
});

impl SchemaRegistry {
    /// The shared registry built from the embedded descriptor.
    pub fn shared() -> &'static SchemaRegistry {
        &REGISTRY
    }

    /// Build a registry from a package-descriptor JSON document.
    pub fn from_descriptor_json(json: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct RawDescriptor {
            #[serde(default)]
            resources: Vec<RawResource>,
        }

        #[derive(Deserialize)]
        struct RawResource {
            name: String,
            #[serde(default)]
            schema: Option<TableSchema>,
        }

        let descriptor: RawDescriptor = serde_json::from_str(json)?;
        let mut schemas = HashMap::new();
        let mut names = Vec::new();
        for resource in descriptor.resources {
            if let Some(schema) = resource.schema {
                names.push(resource.name.clone());
                schemas.insert(resource.name, Arc::new(schema));
            }
        }
        Ok(SchemaRegistry { schemas, names })
    }

    /// Resolve a schema by resource name.
    pub fn get(&self, name: &str) -> Option<Arc<TableSchema>> {
        self.schemas.get(name).cloned()
    }

    /// Registered resource names in descriptor order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
