use sqlx::PgPool;
use tracing::debug;

use crate::database::manager::DatabaseError;
use crate::database::models::job::{Job, JobField, JobFilter, JobNew, JOB_COLUMNS};
use crate::database::sql::{bind_param_query_as, sql_for_partial_update, FieldMap};

use super::ServiceError;

pub struct JobService {
    pool: PgPool,
}

impl JobService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a job and return it with its generated id.
    ///
    /// An unknown company handle is a bad request, not a store failure.
    pub async fn create(&self, data: JobNew) -> Result<Job, ServiceError> {
        let sql = format!(
            "INSERT INTO jobs (title, salary, equity, company_handle) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            JOB_COLUMNS
        );

        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(&data.title)
            .bind(data.salary)
            .bind(data.equity)
            .bind(&data.company_handle)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DatabaseError::from(e) {
                DatabaseError::ForeignKeyViolation(_) => {
                    ServiceError::BadRequest(format!("No company: {}", data.company_handle))
                }
                other => other.into(),
            })?;

        debug!("Created job {} for {}", job.id, job.company_handle);
        Ok(job)
    }

    /// All jobs matching `filter`, ordered by title.
    pub async fn find_all(&self, filter: &JobFilter) -> Result<Vec<Job>, ServiceError> {
        let (where_clause, values) = filter.where_clause();
        let sql = format!("SELECT {} FROM jobs{} ORDER BY title, id", JOB_COLUMNS, where_clause);

        let mut q = sqlx::query_as::<_, Job>(&sql);
        for v in values {
            q = bind_param_query_as(q, v);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    pub async fn get(&self, id: i32) -> Result<Job, ServiceError> {
        let sql = format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS);

        sqlx::query_as::<_, Job>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No job: {}", id)))
    }

    /// Apply a partial update. Fails before reaching the store when `fields`
    /// is empty, and with NotFound when no row has `id`.
    pub async fn update(&self, id: i32, fields: &FieldMap<JobField>) -> Result<Job, ServiceError> {
        let update = sql_for_partial_update(fields)?;
        let sql = format!(
            "UPDATE jobs SET {} WHERE id = {} RETURNING {}",
            update.set_clause,
            update.next_placeholder(),
            JOB_COLUMNS
        );

        let mut q = sqlx::query_as::<_, Job>(&sql);
        for v in update.values {
            q = bind_param_query_as(q, v);
        }

        q.bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No job: {}", id)))
    }

    pub async fn remove(&self, id: i32) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!("No job: {}", id)));
        }
        debug!("Removed job {}", id);
        Ok(())
    }
}
