use chrono::{DateTime, Utc};
use kazi_core::error::AppError;
use kazi_core::models::{
    CategorizedRecord, Category, RawRecord, RecordStatus, StoredOpportunity,
};
use kazi_core::traits::OpportunityStore;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Repository for opportunity persistence in PostgreSQL.
#[derive(Clone)]
pub struct OpportunityRepository {
    pool: Pool<Postgres>,
}

impl OpportunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Id of the opportunity stored under `source_url`, if any.
    pub async fn find_id_by_source_url(&self, source_url: &str) -> Result<Option<Uuid>, AppError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as(r#"SELECT id FROM opportunities WHERE source_url = $1"#)
                .bind(source_url)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(|(id,)| id))
    }

    /// Insert a new opportunity. Returns `None` if the URL is already stored.
    pub async fn insert(&self, record: &CategorizedRecord) -> Result<Option<Uuid>, AppError> {
        let raw = &record.record;
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO opportunities
                (title, company, type, description, location, source_url, source_platform, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&raw.title)
        .bind(&raw.company)
        .bind(record.category.as_str())
        .bind(&raw.description)
        .bind(&raw.location)
        .bind(&raw.source_url)
        .bind(&raw.source_platform)
        .bind(record.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(|(id,)| id))
    }

    /// Full stored opportunity for a URL.
    pub async fn get_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Option<StoredOpportunity>, AppError> {
        let row = sqlx::query_as::<_, OpportunityRow>(
            r#"
            SELECT id, title, company, type, description, location, source_url,
                   source_platform, status, scraped_at, created_at
            FROM opportunities
            WHERE source_url = $1
            "#,
        )
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(TryInto::try_into).transpose()
    }

    /// Most recently stored opportunities, newest first, optionally limited
    /// to one category.
    pub async fn list_recent(
        &self,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<StoredOpportunity>, AppError> {
        let rows = sqlx::query_as::<_, OpportunityRow>(
            r#"
            SELECT id, title, company, type, description, location, source_url,
                   source_platform, status, scraped_at, created_at
            FROM opportunities
            WHERE ($1::varchar IS NULL OR type = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(category.map(|c| c.as_str()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct OpportunityRow {
    id: Uuid,
    title: String,
    company: String,
    #[sqlx(rename = "type")]
    category: String,
    description: Option<String>,
    location: Option<String>,
    source_url: String,
    source_platform: Option<String>,
    status: String,
    scraped_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OpportunityRow> for StoredOpportunity {
    type Error = AppError;

    fn try_from(row: OpportunityRow) -> Result<Self, Self::Error> {
        let category: Category = row
            .category
            .parse()
            .map_err(|e: String| AppError::DatabaseError(e))?;
        let status: RecordStatus = row.status.parse().unwrap_or_default();

        Ok(StoredOpportunity {
            id: row.id,
            record: CategorizedRecord {
                record: RawRecord {
                    title: row.title,
                    company: row.company,
                    location: row.location.unwrap_or_default(),
                    description: row.description.unwrap_or_default(),
                    source_url: row.source_url,
                    source_platform: row.source_platform.unwrap_or_default(),
                },
                category,
                status,
            },
            scraped_at: row.scraped_at,
            created_at: row.created_at,
        })
    }
}

// -- Trait implementation --

impl OpportunityStore for OpportunityRepository {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<Uuid>, AppError> {
        OpportunityRepository::find_id_by_source_url(self, source_url).await
    }

    async fn insert(&self, record: &CategorizedRecord) -> Result<Option<Uuid>, AppError> {
        OpportunityRepository::insert(self, record).await
    }
}
