use sqlx::PgPool;
use tracing::{debug, info};

use crate::auth::password::{hash_password, verify_password};
use crate::database::manager::DatabaseError;
use crate::database::models::user::{
    User, UserCredentials, UserDetail, UserField, UserNew, USER_COLUMNS,
};
use crate::database::sql::{bind_param_query_as, sql_for_partial_update, FieldMap, SqlValue};

use super::ServiceError;

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check a username/password pair. Unknown users and wrong passwords
    /// fail the same way.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, ServiceError> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            "SELECT username, password, is_admin FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        match creds {
            Some(creds) if verify_password(password, &creds.password) => {
                debug!("Authenticated {} (admin: {})", creds.username, creds.is_admin);
                self.find(username).await
            }
            _ => Err(ServiceError::Unauthorized("Invalid username/password".to_string())),
        }
    }

    /// Store a new user with a hashed password.
    pub async fn register(&self, data: UserNew) -> Result<User, ServiceError> {
        let hashed = hash_password(&data.password)?;
        let sql = format!(
            "INSERT INTO users (username, password, first_name, last_name, email, is_admin) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {}",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&data.username)
            .bind(&hashed)
            .bind(&data.first_name)
            .bind(&data.last_name)
            .bind(&data.email)
            .bind(data.is_admin)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DatabaseError::from(e) {
                DatabaseError::UniqueViolation(_) => {
                    ServiceError::Conflict(format!("Duplicate username: {}", data.username))
                }
                other => other.into(),
            })?;

        info!("Registered user {}", user.username);
        Ok(user)
    }

    pub async fn find_all(&self) -> Result<Vec<User>, ServiceError> {
        let sql = format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn find(&self, username: &str) -> Result<User, ServiceError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No user: {}", username)))
    }

    /// A user with the ids of the jobs they applied to.
    pub async fn get(&self, username: &str) -> Result<UserDetail, ServiceError> {
        let user = self.find(username).await?;

        let jobs: Vec<i32> = sqlx::query_scalar(
            "SELECT job_id FROM applications WHERE username = $1 ORDER BY job_id",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(UserDetail { user, jobs })
    }

    /// Apply a partial update. A new password is hashed in place, keeping
    /// its parameter position.
    pub async fn update(
        &self,
        username: &str,
        fields: &FieldMap<UserField>,
    ) -> Result<User, ServiceError> {
        let mut fields = fields.clone();
        if let Some(SqlValue::Text(Some(password))) = fields.get_mut(UserField::Password) {
            *password = hash_password(password)?;
        }

        let update = sql_for_partial_update(&fields)?;
        let sql = format!(
            "UPDATE users SET {} WHERE username = {} RETURNING {}",
            update.set_clause,
            update.next_placeholder(),
            USER_COLUMNS
        );

        let mut q = sqlx::query_as::<_, User>(&sql);
        for v in update.values {
            q = bind_param_query_as(q, v);
        }

        q.bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No user: {}", username)))
    }

    pub async fn remove(&self, username: &str) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!("No user: {}", username)));
        }
        info!("Removed user {}", username);
        Ok(())
    }

    /// Record that `username` applied to `job_id`.
    pub async fn apply_to_job(&self, username: &str, job_id: i32) -> Result<(), ServiceError> {
        let job: Option<i32> = sqlx::query_scalar("SELECT id FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        if job.is_none() {
            return Err(ServiceError::NotFound(format!("No job: {}", job_id)));
        }

        let user: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        if user.is_none() {
            return Err(ServiceError::NotFound(format!("No user: {}", username)));
        }

        sqlx::query("INSERT INTO applications (job_id, username) VALUES ($1, $2)")
            .bind(job_id)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| match DatabaseError::from(e) {
                DatabaseError::UniqueViolation(_) => ServiceError::Conflict(format!(
                    "{} already applied to job {}",
                    username, job_id
                )),
                // Row vanished between the existence checks and the insert.
                DatabaseError::ForeignKeyViolation(_) => {
                    ServiceError::NotFound(format!("No job: {}", job_id))
                }
                other => other.into(),
            })?;

        debug!("{} applied to job {}", username, job_id);
        Ok(())
    }
}
