// Collection schema framework - declarative field, validator and index definitions
// Stored documents are validated against these definitions and the storage DDL is
// derived from them.

use regex::Regex;
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Schema definition for one persisted collection
pub trait CollectionSchema: Send + Sync {
    /// Table name the collection is stored under
    fn collection() -> &'static str
    where
        Self: Sized;

    /// Fields of the stored document
    fn fields() -> Vec<FieldDefinition>
    where
        Self: Sized;

    /// Indexes for this collection. Every indexed field is lifted into its own
    /// column next to the JSON document.
    fn indexes() -> Vec<IndexDefinition>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Field definition
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub field_type: FieldType,
    pub optional: bool,
    pub validators: Vec<FieldValidator>,
}

impl FieldDefinition {
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            optional: false,
            validators: Vec::new(),
        }
    }

    /// Mark field as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Add field validator
    pub fn validate(mut self, validator: FieldValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Required string that must be non-empty after trimming
    pub fn required_text(name: &'static str) -> Self {
        Self::new(name, FieldType::String).validate(FieldValidator::NotBlank)
    }

    /// Required list of non-blank strings with at least one entry
    pub fn required_list(name: &'static str) -> Self {
        Self::new(name, FieldType::StringList)
            .validate(FieldValidator::MinItems(1))
            .validate(FieldValidator::NotBlank)
    }
}

/// Field types a document may carry
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    StringList,
    Timestamp,
    /// Identifier of a record in the named collection
    Reference(&'static str),
}

/// Field validators
#[derive(Debug, Clone)]
pub enum FieldValidator {
    /// Strings (or every list entry) non-empty after trimming
    NotBlank,
    MinItems(usize),
    Pattern {
        regex: &'static Regex,
        message: &'static str,
    },
}

/// Index definition
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub name: String,
    pub field: &'static str,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(collection: &str, field: &'static str) -> Self {
        Self {
            name: format!("idx_{}_{}", collection, field),
            field,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Check a serialized document against the schema's field definitions
pub fn validate_document<S: CollectionSchema>(document: &Value) -> AppResult<()> {
    for field in S::fields() {
        let value = document.get(field.name).unwrap_or(&Value::Null);
        if value.is_null() {
            if field.optional {
                continue;
            }
            return Err(AppError::Validation(format!("{} is required", field.name)));
        }
        validate_type(&field, value)?;
        for validator in &field.validators {
            apply_validator(field.name, validator, value)?;
        }
    }
    Ok(())
}

fn validate_type(field: &FieldDefinition, value: &Value) -> AppResult<()> {
    let ok = match field.field_type {
        FieldType::String | FieldType::Timestamp | FieldType::Reference(_) => value.is_string(),
        FieldType::StringList => value
            .as_array()
            .map(|items| items.iter().all(Value::is_string))
            .unwrap_or(false),
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} has the wrong type (expected {:?})",
            field.name, field.field_type
        )))
    }
}

fn apply_validator(name: &str, validator: &FieldValidator, value: &Value) -> AppResult<()> {
    match validator {
        FieldValidator::NotBlank => {
            let blank = match value {
                Value::String(s) => s.trim().is_empty(),
                Value::Array(items) => items
                    .iter()
                    .any(|item| item.as_str().map_or(true, |s| s.trim().is_empty())),
                _ => false,
            };
            if blank {
                return Err(AppError::Validation(format!("{} must not be empty", name)));
            }
        }
        FieldValidator::MinItems(min) => {
            let len = value.as_array().map_or(0, Vec::len);
            if len < *min {
                return Err(AppError::Validation(format!(
                    "{} must have at least {} item(s)",
                    name, min
                )));
            }
        }
        FieldValidator::Pattern { regex, message } => {
            let matches = value.as_str().map_or(false, |s| regex.is_match(s));
            if !matches {
                return Err(AppError::Validation(format!("{}: {}", name, message)));
            }
        }
    }
    Ok(())
}

/// DDL statements creating the collection table and its indexes
pub fn collection_ddl<S: CollectionSchema>() -> Vec<String> {
    let collection = S::collection();
    let indexes = S::indexes();

    let mut columns = vec!["id TEXT PRIMARY KEY".to_string()];
    for index in &indexes {
        columns.push(format!("{} TEXT NOT NULL", index.field));
    }
    columns.push("document TEXT NOT NULL".to_string());
    columns.push("created_at INTEGER NOT NULL".to_string());
    columns.push("updated_at INTEGER NOT NULL".to_string());

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        collection,
        columns.join(", ")
    )];

    for index in indexes {
        statements.push(format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {}({})",
            if index.unique { "UNIQUE " } else { "" },
            index.name,
            collection,
            index.field
        ));
    }
    statements
}
