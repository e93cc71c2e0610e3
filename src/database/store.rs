//! Generic CRUD executor over whitelisted entities.
//!
//! Field names are validated against the schema registry before they appear
//! in any statement; values are always bound. Sensitive person fields pass
//! through the cipher on the way in and out, password columns are hashed on
//! write and withheld on read.

use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth;
use crate::crypto::FieldCipher;
use crate::database::rows;
use crate::error::ApiError;
use crate::schema::EntitySchema;

// Written by the store itself, never accepted from a payload.
const SYSTEM_FIELDS: &[&str] = &["created_at", "updated_at"];

#[derive(Clone)]
pub struct RecordStore {
    pool: PgPool,
    cipher: FieldCipher,
}

impl RecordStore {
    pub fn new(pool: PgPool, cipher: FieldCipher) -> Self {
        Self { pool, cipher }
    }

    pub async fn list(&self, schema: &EntitySchema) -> Result<Vec<Value>, ApiError> {
        let query = format!("SELECT * FROM \"{}\"", schema.table);
        let fetched = sqlx::query(&query).fetch_all(&self.pool).await?;
        let mut records = rows::rows_to_json(&fetched);
        for record in &mut records {
            self.present_record(schema, record);
        }
        Ok(records)
    }

    pub async fn get(&self, schema: &EntitySchema, id: &str) -> Result<Value, ApiError> {
        let query = format!("SELECT * FROM \"{}\" WHERE id = $1", schema.table);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Not found"))?;
        let mut record = rows::row_to_json(&row);
        self.present_record(schema, &mut record);
        Ok(record)
    }

    /// Insert one record, returning its id. The id is caller-suppliable and
    /// generated when omitted; timestamps are always set server-side.
    pub async fn create(
        &self,
        schema: &EntitySchema,
        mut data: Map<String, Value>,
    ) -> Result<String, ApiError> {
        schema.validate_fields(data.keys().map(String::as_str))?;
        for field in SYSTEM_FIELDS {
            data.remove(*field);
        }

        let id = match data.remove("id") {
            Some(Value::String(value)) if !value.is_empty() => value,
            Some(Value::String(_)) | Some(Value::Null) | None => Uuid::new_v4().to_string(),
            Some(_) => return Err(ApiError::invalid_input("Invalid value for column: id")),
        };

        let mut columns = vec!["id".to_string()];
        let mut values = vec![Value::String(id.clone())];
        for (field, value) in data {
            values.push(prepare_value(schema, &field, value, &self.cipher)?);
            columns.push(field);
        }

        let statement = insert_statement(schema, &columns);
        let mut query = sqlx::query(&statement);
        for value in &values {
            query = bind_value(query, value);
        }
        query.execute(&self.pool).await?;

        Ok(id)
    }

    pub async fn update(
        &self,
        schema: &EntitySchema,
        id: &str,
        mut data: Map<String, Value>,
    ) -> Result<(), ApiError> {
        schema.validate_fields(data.keys().map(String::as_str))?;
        data.remove("id");
        for field in SYSTEM_FIELDS {
            data.remove(*field);
        }

        if data.is_empty() {
            // Nothing to set; still report a missing record as such.
            return self.require_exists(schema, id).await;
        }

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (field, value) in data {
            values.push(prepare_value(schema, &field, value, &self.cipher)?);
            columns.push(field);
        }

        let statement = update_statement(schema, &columns);
        let mut query = sqlx::query(&statement);
        for value in &values {
            query = bind_value(query, value);
        }
        let result = query.bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Not found"));
        }
        Ok(())
    }

    pub async fn delete(&self, schema: &EntitySchema, id: &str) -> Result<(), ApiError> {
        let query = format!("DELETE FROM \"{}\" WHERE id = $1", schema.table);
        let result = sqlx::query(&query).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Not found"));
        }
        Ok(())
    }

    /// Guarded delete for residential complexes: refuses while persons are
    /// still linked, naming the dependent count.
    pub async fn delete_condominio(&self, id: &str) -> Result<(), ApiError> {
        let linked = self
            .count_dependents("pessoas_condominios", "condominio_id", id)
            .await?;
        if linked > 0 {
            return Err(ApiError::conflict(format!(
                "Não é possível excluir, pois {} pessoa(s) estão vinculadas a este condomínio.",
                linked
            )));
        }
        let schema = crate::schema::entity("condominios")?;
        self.delete(schema, id).await
    }

    /// Guarded delete for offense codes, same contract as complexes.
    pub async fn delete_artigo(&self, id: &str) -> Result<(), ApiError> {
        let linked = self
            .count_dependents("pessoas_artigos", "artigo_id", id)
            .await?;
        if linked > 0 {
            return Err(ApiError::conflict(format!(
                "Não é possível excluir, pois {} pessoa(s) estão vinculadas a este código.",
                linked
            )));
        }
        let schema = crate::schema::entity("artigos")?;
        self.delete(schema, id).await
    }

    async fn count_dependents(
        &self,
        link_table: &str,
        link_column: &str,
        id: &str,
    ) -> Result<i64, ApiError> {
        let query = format!(
            "SELECT COUNT(*) FROM \"{}\" WHERE \"{}\" = $1",
            link_table, link_column
        );
        let count: i64 = sqlx::query_scalar(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn require_exists(&self, schema: &EntitySchema, id: &str) -> Result<(), ApiError> {
        let query = format!("SELECT id FROM \"{}\" WHERE id = $1", schema.table);
        let found: Option<String> = sqlx::query_scalar(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found("Not found")),
        }
    }

    /// Decrypt sensitive fields and withhold hash columns before a record
    /// leaves the store.
    fn present_record(&self, schema: &EntitySchema, record: &mut Value) {
        let Some(object) = record.as_object_mut() else {
            return;
        };

        let id = object
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        for field in schema.sensitive {
            if let Some(value) = object.get_mut(*field) {
                let outcome = self.cipher.decrypt(value.as_str());
                if outcome.is_corrupted() {
                    tracing::warn!(
                        "Undecryptable value in {}.{} for record {}",
                        schema.table,
                        field,
                        id
                    );
                }
                *value = match outcome.into_option() {
                    Some(plaintext) => Value::String(plaintext),
                    None => Value::Null,
                };
            }
        }

        for field in schema.hashed {
            object.remove(*field);
        }
    }
}

/// Encrypt, hash, or pass through one caller-supplied value.
fn prepare_value(
    schema: &EntitySchema,
    field: &str,
    value: Value,
    cipher: &FieldCipher,
) -> Result<Value, ApiError> {
    if schema.is_hashed(field) {
        return match value {
            Value::String(ref password) if !password.is_empty() => {
                Ok(Value::String(auth::hash_password(password)?))
            }
            Value::Null => Ok(Value::Null),
            _ => Err(ApiError::invalid_input(format!(
                "Invalid value for column: {}",
                field
            ))),
        };
    }

    if schema.is_sensitive(field) {
        return match value {
            Value::String(ref plaintext) if !plaintext.is_empty() => {
                Ok(Value::String(cipher.encrypt(plaintext)?))
            }
            // Empty or absent plaintext short-circuits to a null envelope.
            Value::String(_) | Value::Null => Ok(Value::Null),
            _ => Err(ApiError::invalid_input(format!(
                "Invalid value for column: {}",
                field
            ))),
        };
    }

    Ok(value)
}

fn quoted(column: &str) -> String {
    format!("\"{}\"", column)
}

fn placeholder(schema: &EntitySchema, column: &str, position: usize) -> String {
    if schema.timestamp_fields.contains(&column) {
        format!("${}::timestamptz", position)
    } else {
        format!("${}", position)
    }
}

fn insert_statement(schema: &EntitySchema, columns: &[String]) -> String {
    let mut names: Vec<String> = columns.iter().map(|c| quoted(c)).collect();
    let mut placeholders: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| placeholder(schema, column, i + 1))
        .collect();

    names.push(quoted("created_at"));
    placeholders.push("NOW()".to_string());
    if schema.has_updated_at {
        names.push(quoted("updated_at"));
        placeholders.push("NOW()".to_string());
    }

    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        schema.table,
        names.join(", "),
        placeholders.join(", ")
    )
}

fn update_statement(schema: &EntitySchema, columns: &[String]) -> String {
    let mut sets: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = {}", quoted(column), placeholder(schema, column, i + 1)))
        .collect();
    if schema.has_updated_at {
        sets.push("\"updated_at\" = NOW()".to_string());
    }
    format!(
        "UPDATE \"{}\" SET {} WHERE id = ${}",
        schema.table,
        sets.join(", "),
        columns.len() + 1
    )
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(flag) => query.bind(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                query.bind(int)
            } else if let Some(float) = number.as_f64() {
                query.bind(float)
            } else {
                query.bind(number.to_string())
            }
        }
        Value::String(text) => query.bind(text),
        other => query.bind(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DecryptOutcome;
    use crate::schema::entity;

    fn cipher() -> FieldCipher {
        FieldCipher::new(b"0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn test_insert_statement_sets_timestamps_server_side() {
        let condominios = entity("condominios").unwrap();
        let sql = insert_statement(condominios, &["id".into(), "nome".into()]);
        assert_eq!(
            sql,
            "INSERT INTO \"condominios\" (\"id\", \"nome\", \"created_at\") VALUES ($1, $2, NOW())"
        );
    }

    #[test]
    fn test_insert_statement_adds_updated_at_when_present() {
        let artigos = entity("artigos").unwrap();
        let sql = insert_statement(artigos, &["id".into(), "numero".into(), "nome".into()]);
        assert_eq!(
            sql,
            "INSERT INTO \"artigos\" (\"id\", \"numero\", \"nome\", \"created_at\", \"updated_at\") \
             VALUES ($1, $2, $3, NOW(), NOW())"
        );
    }

    #[test]
    fn test_insert_statement_casts_timestamp_fields() {
        let links = entity("pessoas_condominios").unwrap();
        let sql = insert_statement(
            links,
            &[
                "id".into(),
                "pessoa_id".into(),
                "condominio_id".into(),
                "data_vinculo".into(),
            ],
        );
        assert!(sql.contains("$4::timestamptz"));
    }

    #[test]
    fn test_update_statement_refreshes_updated_at() {
        let pessoas = entity("pessoas").unwrap();
        let sql = update_statement(pessoas, &["rg".into()]);
        assert_eq!(
            sql,
            "UPDATE \"pessoas\" SET \"rg\" = $1, \"updated_at\" = NOW() WHERE id = $2"
        );
    }

    #[test]
    fn test_update_statement_without_updated_at() {
        let condominios = entity("condominios").unwrap();
        let sql = update_statement(condominios, &["nome".into()]);
        assert_eq!(
            sql,
            "UPDATE \"condominios\" SET \"nome\" = $1 WHERE id = $2"
        );
    }

    #[test]
    fn test_prepare_value_encrypts_sensitive_fields() {
        let pessoas = entity("pessoas").unwrap();
        let c = cipher();
        let prepared = prepare_value(pessoas, "nome", Value::String("Maria".into()), &c).unwrap();
        let envelope = prepared.as_str().unwrap();
        assert_ne!(envelope, "Maria");
        assert_eq!(
            c.decrypt(Some(envelope)),
            DecryptOutcome::Present("Maria".to_string())
        );
    }

    #[test]
    fn test_prepare_value_empty_sensitive_becomes_null() {
        let pessoas = entity("pessoas").unwrap();
        let c = cipher();
        assert_eq!(
            prepare_value(pessoas, "cpf", Value::String(String::new()), &c).unwrap(),
            Value::Null
        );
        assert_eq!(
            prepare_value(pessoas, "cpf", Value::Null, &c).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_prepare_value_rejects_non_string_sensitive() {
        let pessoas = entity("pessoas").unwrap();
        assert!(prepare_value(pessoas, "nome", Value::Bool(true), &cipher()).is_err());
    }

    #[test]
    fn test_prepare_value_hashes_passwords() {
        let users = entity("users").unwrap();
        let prepared =
            prepare_value(users, "password", Value::String("s3cret!".into()), &cipher()).unwrap();
        let hash = prepared.as_str().unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(auth::verify_password("s3cret!", hash));
    }

    #[test]
    fn test_prepare_value_passes_plain_fields_through() {
        let pessoas = entity("pessoas").unwrap();
        let prepared =
            prepare_value(pessoas, "rg", Value::String("12.345-6".into()), &cipher()).unwrap();
        assert_eq!(prepared, Value::String("12.345-6".into()));
    }
}
