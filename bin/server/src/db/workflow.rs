//! PostgreSQL workflow store.

use super::{StoreResult, WorkflowStore};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use defi_flow_core::WorkflowId;
use defi_flow_workflow::{Connection, Module, Workflow};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Row type for workflow queries.
#[derive(FromRow)]
struct WorkflowRow {
    id: String,
    name: String,
    description: Option<String>,
    modules: serde_json::Value,
    connections: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    fn try_into_workflow(self) -> Result<Workflow, StoreError> {
        let corrupt = |details: String| StoreError::CorruptRecord {
            id: self.id.clone(),
            details,
        };

        let id = WorkflowId::from_str(&self.id).map_err(|e| corrupt(e.to_string()))?;
        let modules: Vec<Module> =
            serde_json::from_value(self.modules).map_err(|e| corrupt(e.to_string()))?;
        let connections: Vec<Connection> = serde_json::from_value(self.connections)
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(Workflow {
            id,
            name: self.name,
            description: self.description,
            modules,
            connections,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn database_error(e: sqlx::Error) -> StoreError {
    StoreError::DatabaseError {
        details: e.to_string(),
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::DatabaseError {
        details: format!("failed to encode workflow graph: {e}"),
    })
}

/// Workflow store backed by the `workflows` table.
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    /// Creates a new store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    async fn create(&self, owner: &str, workflow: &Workflow) -> StoreResult<()> {
        let modules = encode(&workflow.modules)?;
        let connections = encode(&workflow.connections)?;

        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, owner, name, description, modules, connections, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(owner)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(&modules)
        .bind(&connections)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, owner: &str) -> StoreResult<Vec<Workflow>> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, modules, connections, created_at, updated_at
            FROM workflows
            WHERE owner = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        let workflows = rows
            .into_iter()
            .map(WorkflowRow::try_into_workflow)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(workflows)
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn get(&self, owner: &str, id: WorkflowId) -> StoreResult<Option<Workflow>> {
        let row: Option<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, modules, connections, created_at, updated_at
            FROM workflows
            WHERE id = $1 AND owner = $2
            "#,
        )
        .bind(id.to_string())
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        match row {
            Some(r) => Ok(Some(r.try_into_workflow()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn delete(&self, owner: &str, id: WorkflowId) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM workflows
            WHERE id = $1 AND owner = $2
            "#,
        )
        .bind(id.to_string())
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() > 0)
    }
}
