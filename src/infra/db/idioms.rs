use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{IdiomsRepo, RepoError},
    domain::entities::{IdiomRecord, ImplementationRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct IdiomRow {
    id: i32,
    title: String,
    lead_paragraph: String,
    version: i32,
    updated_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct ImplementationRow {
    id: i32,
    idiom_id: i32,
    language_name: String,
    imports_block: Option<String>,
    code_block: String,
    updated_at: OffsetDateTime,
}

impl From<ImplementationRow> for ImplementationRecord {
    fn from(row: ImplementationRow) -> Self {
        Self {
            id: row.id,
            idiom_id: row.idiom_id,
            language_name: row.language_name,
            imports_block: row.imports_block,
            code_block: row.code_block,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl IdiomsRepo for PostgresRepositories {
    async fn find_idiom(&self, id: i32) -> Result<IdiomRecord, RepoError> {
        let idiom = sqlx::query_as::<_, IdiomRow>(
            r#"
            SELECT id, title, lead_paragraph, version, updated_at
            FROM idioms
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let implementations = sqlx::query_as::<_, ImplementationRow>(
            r#"
            SELECT id, idiom_id, language_name, imports_block, code_block, updated_at
            FROM implementations
            WHERE idiom_id = $1
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(IdiomRecord {
            id: idiom.id,
            title: idiom.title,
            lead_paragraph: idiom.lead_paragraph,
            version: idiom.version,
            implementations: implementations.into_iter().map(Into::into).collect(),
            updated_at: idiom.updated_at,
        })
    }
}
