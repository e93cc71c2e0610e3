//! Role → resource → operation permission matrix.
//!
//! Privilege is granted per logical resource, not per physical table: the
//! user/profile/role tables all answer to the `usuarios` resource, the person
//! link tables to `pessoas`. A caller with no role row, or no matrix row for
//! (role, resource), is denied.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Gestor,
    Operador,
    Visualizador,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Gestor, Role::Operador, Role::Visualizador];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Gestor => "gestor",
            Role::Operador => "operador",
            Role::Visualizador => "visualizador",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "gestor" => Some(Role::Gestor),
            "operador" => Some(Role::Operador),
            "visualizador" => Some(Role::Visualizador),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// Matrix column carrying this operation's flag. Static strings only;
    /// this name is interpolated into SQL.
    pub fn flag_column(&self) -> &'static str {
        match self {
            Operation::Create => "can_create",
            Operation::Read => "can_read",
            Operation::Update => "can_update",
            Operation::Delete => "can_delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { role: Role },
    Deny { reason: &'static str },
}

/// Map a physical entity/table name to its logical permission resource.
/// Unmapped names fall through unchanged, where the absent matrix row then
/// denies everything.
pub fn resource_for_entity(table: &str) -> &str {
    match table {
        "users" | "profiles" | "user_roles" | "group_permissions" => "usuarios",
        "pessoas" | "pessoas_artigos" | "pessoas_condominios" => "pessoas",
        "artigos" => "artigos",
        "condominios" => "condominios",
        other => other,
    }
}

/// The pure decision step, split from the lookups so it can be tested flat.
pub fn decide(role: Option<Role>, flag: Option<bool>) -> Decision {
    let Some(role) = role else {
        return Decision::Deny {
            reason: "User has no assigned role",
        };
    };
    match flag {
        Some(true) => Decision::Allow { role },
        _ => Decision::Deny {
            reason: "Permission denied",
        },
    }
}

/// Look up the caller's single role, if any.
///
/// Identity columns are TEXT, so the id binds as a string.
pub async fn role_of(pool: &PgPool, user_id: Uuid) -> Result<Option<Role>, sqlx::Error> {
    let role: Option<String> =
        sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(user_id.to_string())
            .fetch_optional(pool)
            .await?;
    Ok(role.as_deref().and_then(Role::parse))
}

/// `check(subject, resource, operation)` per the matrix: role lookup, then
/// flag lookup, then the pure decision.
pub async fn check(
    pool: &PgPool,
    user_id: Uuid,
    resource: &str,
    operation: Operation,
) -> Result<Decision, sqlx::Error> {
    let role = role_of(pool, user_id).await?;

    let flag = match role {
        Some(role) => {
            let query = format!(
                "SELECT {} FROM group_permissions WHERE group_role = $1 AND resource = $2",
                operation.flag_column()
            );
            sqlx::query_scalar::<_, bool>(&query)
                .bind(role.as_str())
                .bind(resource)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };

    Ok(decide(role, flag))
}

/// Permission gate used by handlers: deny becomes a 403 with the decision's
/// reason as the client message.
pub async fn require(
    pool: &PgPool,
    user_id: Uuid,
    resource: &str,
    operation: Operation,
) -> Result<Role, ApiError> {
    match check(pool, user_id, resource, operation).await? {
        Decision::Allow { role } => Ok(role),
        Decision::Deny { reason } => Err(ApiError::forbidden(reason)),
    }
}
