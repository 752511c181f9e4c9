//! Persistence for fetched vacancies and their enrichment status.
//!
//! `job_ads` holds one row per vacancy, nested remote objects as JSONB.
//! `processed_job_ads` tracks which vacancies still need a cover letter.

use std::future::Future;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;

use crate::board::Vacancy;
use crate::error::ScribeError;
use crate::text::Enrichment;

const STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A vacancy waiting for enrichment.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingVacancy {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[allow(async_fn_in_trait)]
pub trait VacancyStore {
    async fn exists(&self, id: &str) -> Result<bool, ScribeError>;

    /// Insert a vacancy; an existing row with the same id is left as is.
    async fn insert_vacancy(&self, vacancy: &Vacancy) -> Result<(), ScribeError>;

    /// Whether the vacancy has a row in the enrichment queue, processed or not.
    async fn is_queued(&self, id: &str) -> Result<bool, ScribeError>;

    /// Queue a stored vacancy for enrichment.
    async fn mark_pending(&self, id: &str) -> Result<(), ScribeError>;

    async fn load_pending(&self) -> Result<Vec<PendingVacancy>, ScribeError>;

    /// Store the enrichment result and mark the vacancy processed. Fails with
    /// [`ScribeError::NotQueued`] when the vacancy was never queued.
    async fn save_enrichment(&self, id: &str, enrichment: &Enrichment) -> Result<(), ScribeError>;
}

pub struct PgVacancyStore {
    pool: PgPool,
}

impl PgVacancyStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, ScribeError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(STATEMENT_TIMEOUT)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), ScribeError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn bounded<T>(fut: impl Future<Output = Result<T, sqlx::Error>>) -> Result<T, ScribeError> {
    match tokio::time::timeout(STATEMENT_TIMEOUT, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ScribeError::DatabaseTimeout),
    }
}

impl VacancyStore for PgVacancyStore {
    async fn exists(&self, id: &str) -> Result<bool, ScribeError> {
        bounded(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM job_ads WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn insert_vacancy(&self, v: &Vacancy) -> Result<(), ScribeError> {
        bounded(
            sqlx::query(
                r#"
                INSERT INTO job_ads (
                    id, accept_handicapped, accept_incomplete_resumes, accept_kids,
                    accept_temporary,
                    allow_messages, alternate_url, apply_alternate_url, approved, archived, area,
                    billing_type, code, contacts, department, description, driver_license_types,
                    employer, employment_form, experience, fly_in_fly_out_duration, has_test,
                    initial_created_at, insider_interview, internship, key_skills, languages, name,
                    negotiations_url, night_shifts, premium, professional_roles, published_at,
                    relations, response_letter_required, response_url, salary, suitable_resumes_url,
                    test, type, video_vacancy, work_format, work_schedule_by_days, working_hours,
                    address
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32,
                    $33, $34, $35, $36, $37, $38, $39, $40, $41, $42, $43, $44, $45
                )
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&v.id)
            .bind(v.accept_handicapped)
            .bind(v.accept_incomplete_resumes)
            .bind(v.accept_kids)
            .bind(v.accept_temporary)
            .bind(v.allow_messages)
            .bind(&v.alternate_url)
            .bind(&v.apply_alternate_url)
            .bind(v.approved)
            .bind(v.archived)
            .bind(v.area.as_ref().map(Json))
            .bind(v.billing_type.as_ref().map(Json))
            .bind(&v.code)
            .bind(v.contacts.as_ref().map(Json))
            .bind(v.department.as_ref().map(Json))
            .bind(&v.description)
            .bind(Json(&v.driver_license_types))
            .bind(v.employer.as_ref().map(Json))
            .bind(v.employment_form.as_ref().map(Json))
            .bind(v.experience.as_ref().map(Json))
            .bind(Json(&v.fly_in_fly_out_duration))
            .bind(v.has_test)
            .bind(v.initial_created_at)
            .bind(v.insider_interview.as_ref().map(Json))
            .bind(v.internship)
            .bind(Json(&v.key_skills))
            .bind(Json(&v.languages))
            .bind(&v.name)
            .bind(&v.negotiations_url)
            .bind(v.night_shifts)
            .bind(v.premium)
            .bind(Json(&v.professional_roles))
            .bind(v.published_at)
            .bind(Json(&v.relations))
            .bind(v.response_letter_required)
            .bind(&v.response_url)
            .bind(v.salary.as_ref().map(Json))
            .bind(&v.suitable_resumes_url)
            .bind(v.test.as_ref().map(Json))
            .bind(v.kind.as_ref().map(Json))
            .bind(v.video_vacancy.as_ref().map(Json))
            .bind(Json(&v.work_format))
            .bind(Json(&v.work_schedule_by_days))
            .bind(Json(&v.working_hours))
            .bind(v.address.as_ref().map(Json))
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn is_queued(&self, id: &str) -> Result<bool, ScribeError> {
        bounded(
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM processed_job_ads WHERE job_id = $1)",
            )
            .bind(id)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn mark_pending(&self, id: &str) -> Result<(), ScribeError> {
        bounded(
            sqlx::query(
                "INSERT INTO processed_job_ads (job_id) VALUES ($1) \
                 ON CONFLICT (job_id) DO NOTHING",
            )
            .bind(id)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn load_pending(&self) -> Result<Vec<PendingVacancy>, ScribeError> {
        bounded(
            sqlx::query_as::<_, PendingVacancy>(
                r#"
                SELECT j.id, j.name, j.description
                FROM job_ads j
                JOIN processed_job_ads p ON p.job_id = j.id
                WHERE p.processed = FALSE
                ORDER BY j.published_at DESC NULLS LAST, j.id
                "#,
            )
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn save_enrichment(&self, id: &str, enrichment: &Enrichment) -> Result<(), ScribeError> {
        let result = bounded(
            sqlx::query(
                r#"
                UPDATE processed_job_ads
                SET cover_letter = $1, thinking = $2, processed = TRUE, processed_at = NOW()
                WHERE job_id = $3
                "#,
            )
            .bind(&enrichment.cover_letter)
            .bind(&enrichment.thinking)
            .bind(id)
            .execute(&self.pool),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(ScribeError::NotQueued(id.to_string()));
        }
        Ok(())
    }
}
