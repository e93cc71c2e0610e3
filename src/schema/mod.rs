//! Static per-entity schema registry.
//!
//! Field *values* are always bound as query parameters, but field *names*
//! cannot be; every caller-supplied key must pass the allow-list below before
//! it is interpolated into SQL. The registry is the single source of truth
//! for which entities exist, which of their columns are writable, which are
//! stored encrypted, and which hold password hashes.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid table: {0}")]
    InvalidEntity(String),
    #[error("Invalid column: {0}")]
    InvalidField(String),
}

/// Everything the data layer needs to know about one entity.
#[derive(Debug, PartialEq, Eq)]
pub struct EntitySchema {
    /// Physical table name; also the path segment in `/api/:entity`.
    pub table: &'static str,
    /// Exhaustive allow-list of columns reachable through the API.
    pub columns: &'static [&'static str],
    /// Columns stored as ciphertext envelopes.
    pub sensitive: &'static [&'static str],
    /// Columns holding password hashes, never stored or returned as plaintext.
    pub hashed: &'static [&'static str],
    /// Caller-writable timestamptz columns; values arrive as strings and are
    /// cast in the statement, so Postgres does the date parsing.
    pub timestamp_fields: &'static [&'static str],
    /// Whether updates refresh an `updated_at` column.
    pub has_updated_at: bool,
}

impl EntitySchema {
    pub fn is_sensitive(&self, field: &str) -> bool {
        self.sensitive.contains(&field)
    }

    pub fn is_hashed(&self, field: &str) -> bool {
        self.hashed.contains(&field)
    }

    /// Reject any field not in this entity's allow-list. The empty set is
    /// always valid.
    pub fn validate_fields<'a, I>(&self, fields: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for field in fields {
            if !self.columns.contains(&field) {
                return Err(SchemaError::InvalidField(field.to_string()));
            }
        }
        Ok(())
    }
}

const ENTITY_SCHEMAS: &[EntitySchema] = &[
    EntitySchema {
        table: "users",
        columns: &["id", "email", "password", "created_at"],
        sensitive: &[],
        hashed: &["password"],
        timestamp_fields: &[],
        has_updated_at: false,
    },
    EntitySchema {
        table: "profiles",
        columns: &["id", "user_id", "full_name", "created_at"],
        sensitive: &[],
        hashed: &[],
        timestamp_fields: &[],
        has_updated_at: false,
    },
    EntitySchema {
        table: "user_roles",
        columns: &["id", "user_id", "role", "created_at"],
        sensitive: &[],
        hashed: &[],
        timestamp_fields: &[],
        has_updated_at: false,
    },
    EntitySchema {
        table: "pessoas",
        columns: &[
            "id",
            "nome",
            "rg",
            "cpf",
            "data_nascimento",
            "nome_mae",
            "nome_pai",
            "observacao",
            "foto_url",
            "residencial",
            "telefone",
            "created_at",
            "updated_at",
        ],
        sensitive: &["nome", "cpf", "nome_mae", "nome_pai", "observacao"],
        hashed: &[],
        timestamp_fields: &[],
        has_updated_at: true,
    },
    EntitySchema {
        table: "artigos",
        columns: &["id", "numero", "nome", "created_at", "updated_at"],
        sensitive: &[],
        hashed: &[],
        timestamp_fields: &[],
        has_updated_at: true,
    },
    EntitySchema {
        table: "condominios",
        columns: &["id", "nome", "created_at"],
        sensitive: &[],
        hashed: &[],
        timestamp_fields: &[],
        has_updated_at: false,
    },
    EntitySchema {
        table: "pessoas_artigos",
        columns: &["id", "pessoa_id", "artigo_id", "created_at"],
        sensitive: &[],
        hashed: &[],
        timestamp_fields: &[],
        has_updated_at: false,
    },
    EntitySchema {
        table: "pessoas_condominios",
        columns: &[
            "id",
            "pessoa_id",
            "condominio_id",
            "data_vinculo",
            "created_at",
            "updated_at",
        ],
        sensitive: &[],
        hashed: &[],
        timestamp_fields: &["data_vinculo"],
        has_updated_at: true,
    },
    EntitySchema {
        table: "group_permissions",
        columns: &[
            "id",
            "group_role",
            "resource",
            "can_create",
            "can_read",
            "can_update",
            "can_delete",
            "created_at",
            "updated_at",
        ],
        sensitive: &[],
        hashed: &[],
        timestamp_fields: &[],
        has_updated_at: true,
    },
];

static REGISTRY: Lazy<HashMap<&'static str, &'static EntitySchema>> =
    Lazy::new(|| ENTITY_SCHEMAS.iter().map(|s| (s.table, s)).collect());

/// Resolve a path segment to its entity schema, before any query runs.
pub fn entity(name: &str) -> Result<&'static EntitySchema, SchemaError> {
    REGISTRY
        .get(name)
        .copied()
        .ok_or_else(|| SchemaError::InvalidEntity(name.to_string()))
}

/// All registered entities, in declaration order.
pub fn entities() -> impl Iterator<Item = &'static EntitySchema> {
    ENTITY_SCHEMAS.iter()
}
