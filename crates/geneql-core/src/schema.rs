//! Schema: entity types, typed fields and the permission vocabulary.
//!
//! The default is the Genesis ontology; other schemas load from JSON.

use crate::query::lexer::TokenKind;
use crate::value::FieldType;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Owner field name used when a resource entity does not declare one
pub const DEFAULT_OWNER_FIELD: &str = "owner";

/// Permission required to grant or revoke on a resource
pub const ADMIN_PERMISSION: &str = "admin";

/// Whether an entity type can act (hold permissions) or be acted upon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Principal,
    Resource,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Principal => write!(f, "principal"),
            EntityKind::Resource => write!(f, "resource"),
        }
    }
}

/// A typed field of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Values identify at most one row
    #[serde(default)]
    pub unique: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// An entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub kind: EntityKind,
    pub fields: Vec<FieldDef>,
    /// Resource field holding the owning user's id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_field: Option<String>,
}

impl EntityDef {
    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// `id` and fields declared `unique` pin a single row
    pub fn is_unique(&self, name: &str) -> bool {
        name == "id" || self.field(name).is_some_and(|f| f.unique)
    }

    /// Owner field of a resource entity; principals have none
    pub fn owner_field(&self) -> Option<&str> {
        match self.kind {
            EntityKind::Resource => {
                Some(self.owner_field.as_deref().unwrap_or(DEFAULT_OWNER_FIELD))
            }
            EntityKind::Principal => None,
        }
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Schema loading and validation errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("entity '{entity}' is missing required field '{field}'")]
    MissingRequiredField { entity: String, field: String },

    #[error("field '{entity}.{field}' must be of type {expected}")]
    WrongFieldType {
        entity: String,
        field: String,
        expected: FieldType,
    },

    #[error("entity '{0}' is declared more than once")]
    DuplicateEntity(String),

    #[error("field '{entity}.{field}' is declared more than once")]
    DuplicateField { entity: String, field: String },

    #[error("'{0}' is not a valid name")]
    InvalidName(String),

    #[error("schema declares no principal entity")]
    NoPrincipal,

    #[error("schema declares more than one principal entity: {0:?}")]
    MultiplePrincipals(Vec<String>),

    #[error("permission vocabulary must include 'admin'")]
    MissingAdminPermission,
}

/// Entity types and permission vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub entities: Vec<EntityDef>,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub allow_custom_permissions: bool,
}

impl Schema {
    /// The Genesis ontology: users, resources and the default vocabulary
    pub fn genesis() -> Self {
        Self {
            entities: vec![
                EntityDef {
                    name: "User".to_string(),
                    kind: EntityKind::Principal,
                    fields: vec![
                        FieldDef::new("id", FieldType::String).unique(),
                        FieldDef::new("username", FieldType::String).unique(),
                        FieldDef::new("email", FieldType::String).unique(),
                        FieldDef::new("active", FieldType::Boolean),
                        FieldDef::new("created_at", FieldType::Timestamp),
                    ],
                    owner_field: None,
                },
                EntityDef {
                    name: "Resource".to_string(),
                    kind: EntityKind::Resource,
                    fields: vec![
                        FieldDef::new("id", FieldType::String).unique(),
                        FieldDef::new("type", FieldType::String),
                        FieldDef::new("name", FieldType::String),
                        FieldDef::new("owner", FieldType::String),
                    ],
                    owner_field: None,
                },
            ],
            permissions: ["read", "write", "delete", "share", "admin"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            allow_custom_permissions: false,
        }
    }

    /// Parse and validate a JSON schema document
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Read, parse and validate a JSON schema file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check structural rules the compiler and evaluator rely on
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for entity in &self.entities {
            check_name(&entity.name)?;
            if !seen.insert(entity.name.as_str()) {
                return Err(SchemaError::DuplicateEntity(entity.name.clone()));
            }

            let mut fields = HashSet::new();
            for field in &entity.fields {
                check_name(&field.name)?;
                if !fields.insert(field.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }

            require_string_field(entity, "id")?;
            if let Some(owner) = entity.owner_field() {
                require_string_field(entity, owner)?;
            }
        }

        let principals: Vec<String> = self
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Principal)
            .map(|e| e.name.clone())
            .collect();
        match principals.len() {
            0 => return Err(SchemaError::NoPrincipal),
            1 => {}
            _ => return Err(SchemaError::MultiplePrincipals(principals)),
        }

        for permission in &self.permissions {
            check_name(permission)?;
        }
        if !self.permissions.iter().any(|p| p == ADMIN_PERMISSION) {
            return Err(SchemaError::MissingAdminPermission);
        }

        Ok(())
    }

    /// Look up an entity type by name
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// The entity type whose rows act as principals
    pub fn principal_entity(&self) -> Option<&EntityDef> {
        self.entities
            .iter()
            .find(|e| e.kind == EntityKind::Principal)
    }

    /// Whether `permission` may appear in a query
    pub fn has_permission(&self, permission: &str) -> bool {
        self.allow_custom_permissions || self.permissions.iter().any(|p| p == permission)
    }

    /// CRC32 over every name, type and flag, in declaration order.
    ///
    /// Plans carry this so a plan compiled against one schema is not run
    /// against another.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = Hasher::new();
        for entity in &self.entities {
            hasher.update(b"E");
            hasher.update(entity.name.as_bytes());
            hasher.update(&[entity.kind as u8]);
            if let Some(owner) = entity.owner_field() {
                hasher.update(b"O");
                hasher.update(owner.as_bytes());
            }
            for field in &entity.fields {
                hasher.update(b"F");
                hasher.update(field.name.as_bytes());
                hasher.update(&[field.field_type as u8, field.unique as u8]);
            }
        }
        for permission in &self.permissions {
            hasher.update(b"P");
            hasher.update(permission.as_bytes());
        }
        hasher.update(&[self.allow_custom_permissions as u8]);
        hasher.finalize()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::genesis()
    }
}

fn check_name(name: &str) -> Result<(), SchemaError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_start && valid_rest && !TokenKind::is_reserved(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidName(name.to_string()))
    }
}

fn require_string_field(entity: &EntityDef, name: &str) -> Result<(), SchemaError> {
    match entity.field(name) {
        None => Err(SchemaError::MissingRequiredField {
            entity: entity.name.clone(),
            field: name.to_string(),
        }),
        Some(field) if field.field_type != FieldType::String => Err(SchemaError::WrongFieldType {
            entity: entity.name.clone(),
            field: name.to_string(),
            expected: FieldType::String,
        }),
        Some(_) => Ok(()),
    }
}
