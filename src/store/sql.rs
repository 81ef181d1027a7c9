use std::path::{Path, PathBuf};

use sqlx::{migrate::MigrateDatabase, Pool, Sqlite, SqlitePool};
use uuid::Uuid;

use log::{error, info};

use crate::contact::ContactForm;
use crate::scholarship::{ListQuery, ScholarshipDraft, ScholarshipRecord};
use crate::store::{FindError, WriteError};
use crate::subscribe::SubscribeForm;
use crate::time::{today_string, Timestamp};
use crate::user::{NewUser, UserRecord, UserRow};

type Result<T> = std::result::Result<T, ()>;

#[derive(Clone, Debug)]
pub struct Store(pub Pool<Sqlite>);

fn into_sql(path: &Path) -> PathBuf {
    path.join("board.sql")
}

pub async fn init(data_dir: &Path) {
    let final_path = format!(
        "sqlite://{}",
        into_sql(data_dir).to_str().expect("non utf-8 data")
    );
    match Sqlite::create_database(&final_path).await {
        Ok(()) => {
            info!("Using {}", &final_path);
        }
        Err(e) => {
            let sqlx::Error::Database(db_err) = e else {
                panic!("error creating database: {e}");
            };

            panic!("sql db error: {db_err:?}");
        }
    }
}

impl Store {
    pub async fn new(data_dir: &Path) -> Self {
        let db_pathbuf = into_sql(data_dir);
        let db_path = db_pathbuf.to_str().expect("non utf-8 data");
        let pool = match SqlitePool::connect(db_path).await {
            Ok(pool) => pool,
            Err(_err) => {
                init(data_dir).await;
                SqlitePool::connect(db_path).await.expect("db connection")
            }
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migration");

        Self(pool)
    }
}

fn user_record(row: UserRow) -> Result<UserRecord> {
    UserRecord::try_from(row).map_err(|e| {
        error!("invalid stored user: {e}");
    })
}

fn user_records(rows: Vec<UserRow>) -> Result<Vec<UserRecord>> {
    rows.into_iter().map(user_record).collect()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed")
    )
}

impl Store {
    pub async fn find_user_by_email(&self, email: &str) -> std::result::Result<UserRecord, FindError> {
        let row = sqlx::query_as::<_, UserRow>(
            "
            SELECT *
            FROM users
            WHERE email = ?
            ",
        )
        .bind(email)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                error!("error selecting user {email}: {e:?}");
                FindError::Internal
            }
        })?;

        user_record(row).map_err(|()| FindError::Internal)
    }

    pub async fn users_with_session(&self, session_id: &str) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "
            SELECT *
            FROM users
            WHERE session_id = ?
            ",
        )
        .bind(session_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("couldn't query for session {session_id}: {e:?}");
        })?;

        user_records(rows)
    }

    /// Panel listing, newest account first.
    pub async fn users(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "
            SELECT *
            FROM users
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting users: {e:?}");
        })?;

        user_records(rows)
    }

    pub async fn insert_user(&self, user: &NewUser) -> std::result::Result<(), WriteError> {
        sqlx::query(
            "
            INSERT INTO users
            (id, email, fullname, phone, role, pwhash, session_id, created_at)
            VALUES
            (?, ?, ?, ?, ?, ?, NULL, ?)
            ",
        )
        .bind(user.id.to_string())
        .bind(user.email.as_str())
        .bind(user.fullname.as_str())
        .bind(user.phone.as_str())
        .bind(user.role.as_str())
        .bind(user.pwhash.as_str())
        .bind(user.created_at)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            if is_unique_violation(&e) {
                WriteError::Duplicate
            } else {
                error!("error inserting user: {e:?}");
                WriteError::Internal
            }
        })
    }

    /// session_id: set to None to logout / make NULL
    pub async fn set_session(&self, user: &Uuid, session_id: Option<&str>) -> bool {
        sqlx::query(
            "
            UPDATE users
            SET session_id = ?
            WHERE id = ?
            ",
        )
        .bind(session_id)
        .bind(user.to_string())
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("update user session: {e}");
            e
        })
        .is_ok()
    }

    pub async fn delete_user(&self, id: &Uuid) -> std::result::Result<(), FindError> {
        let result = sqlx::query(
            "
            DELETE FROM users
            WHERE id = ?
            ",
        )
        .bind(id.to_string())
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("error deleting user {id}: {e:?}");
            FindError::Internal
        })?;

        if result.rows_affected() == 0 {
            Err(FindError::NotFound)
        } else {
            Ok(())
        }
    }
}

impl Store {
    pub async fn insert_scholarship(
        &self,
        draft: &ScholarshipDraft,
        now: Timestamp,
    ) -> Result<i64> {
        sqlx::query(
            "
            INSERT INTO scholarships
            (name, description, deadline, host_country, benefits,
             eligibility, degree_level, link, author, created_at)
            VALUES
            (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(draft.name.as_str())
        .bind(draft.description.as_str())
        .bind(draft.deadline.as_str())
        .bind(draft.host_country.as_str())
        .bind(draft.benefits.as_str())
        .bind(draft.eligibility.as_str())
        .bind(draft.degree_level.as_str())
        .bind(draft.link.as_str())
        .bind(draft.author.as_str())
        .bind(now)
        .execute(&self.0)
        .await
        .map(|done| done.last_insert_rowid())
        .map_err(|e| {
            error!("error inserting scholarship: {e:?}");
        })
    }

    /// Newest first. Absent filters are passed as NULL and ignored by
    /// the matching arm, so one statement serves every combination.
    pub async fn scholarships(&self, query: &ListQuery) -> Result<Vec<ScholarshipRecord>> {
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let country = query.country.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let degree_level = query
            .degree_level
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let limit = query.limit.map(i64::from).unwrap_or(-1);

        sqlx::query_as::<_, ScholarshipRecord>(
            "
            SELECT scholarships.*
            FROM
                scholarships,
                (SELECT ? as search, ? as country, ? as degree_level,
                        ? as ongoing, ? as today) as filter
            WHERE (filter.search IS NULL
                    OR instr(lower(scholarships.name), lower(filter.search)) > 0)
                AND (filter.country IS NULL
                    OR scholarships.host_country = filter.country)
                AND (filter.degree_level IS NULL
                    OR scholarships.degree_level = filter.degree_level)
                AND (filter.ongoing IS NULL
                    OR filter.ongoing = 0
                    OR scholarships.deadline > filter.today)
            ORDER BY scholarships.created_at DESC
            LIMIT ?
            ",
        )
        .bind(search)
        .bind(country)
        .bind(degree_level)
        .bind(query.ongoing)
        .bind(today_string())
        .bind(limit)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting scholarships: {e:?}");
        })
    }

    /// Distinct filter values for the listing page's dropdowns.
    pub async fn filter_options(&self) -> Result<(Vec<String>, Vec<String>)> {
        let countries = sqlx::query_scalar::<_, String>(
            "
            SELECT DISTINCT host_country
            FROM scholarships
            ORDER BY host_country
            ",
        )
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting countries: {e:?}");
        })?;

        let degree_levels = sqlx::query_scalar::<_, String>(
            "
            SELECT DISTINCT degree_level
            FROM scholarships
            ORDER BY degree_level
            ",
        )
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting degree levels: {e:?}");
        })?;

        Ok((countries, degree_levels))
    }

    pub async fn scholarships_named(&self, search: Option<&str>) -> Result<Vec<ScholarshipRecord>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        sqlx::query_as::<_, ScholarshipRecord>(
            "
            SELECT scholarships.*
            FROM
                scholarships,
                (SELECT ? as search) as filter
            WHERE (filter.search IS NULL
                    OR instr(lower(scholarships.name), lower(filter.search)) > 0)
            ORDER BY scholarships.created_at DESC
            ",
        )
        .bind(search)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting scholarships by name: {e:?}");
        })
    }

    pub async fn find_scholarship(
        &self,
        id: i64,
    ) -> std::result::Result<ScholarshipRecord, FindError> {
        sqlx::query_as::<_, ScholarshipRecord>(
            "
            SELECT *
            FROM scholarships
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                error!("error selecting scholarship {id}: {e:?}");
                FindError::Internal
            }
        })
    }

    /// Full-row replacement, `created_at` keeps its original value.
    pub async fn update_scholarship(
        &self,
        id: i64,
        draft: &ScholarshipDraft,
    ) -> std::result::Result<(), FindError> {
        let result = sqlx::query(
            "
            UPDATE scholarships
            SET name = ?, description = ?, deadline = ?, host_country = ?,
                benefits = ?, eligibility = ?, degree_level = ?, link = ?,
                author = ?
            WHERE id = ?
            ",
        )
        .bind(draft.name.as_str())
        .bind(draft.description.as_str())
        .bind(draft.deadline.as_str())
        .bind(draft.host_country.as_str())
        .bind(draft.benefits.as_str())
        .bind(draft.eligibility.as_str())
        .bind(draft.degree_level.as_str())
        .bind(draft.link.as_str())
        .bind(draft.author.as_str())
        .bind(id)
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("error updating scholarship {id}: {e:?}");
            FindError::Internal
        })?;

        if result.rows_affected() == 0 {
            Err(FindError::NotFound)
        } else {
            Ok(())
        }
    }

    pub async fn delete_scholarship(&self, id: i64) -> std::result::Result<(), FindError> {
        let result = sqlx::query(
            "
            DELETE FROM scholarships
            WHERE id = ?
            ",
        )
        .bind(id)
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("error deleting scholarship {id}: {e:?}");
            FindError::Internal
        })?;

        if result.rows_affected() == 0 {
            Err(FindError::NotFound)
        } else {
            Ok(())
        }
    }
}

impl Store {
    pub async fn insert_contact(&self, form: &ContactForm, now: Timestamp) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO contact
            (name, email, message, created_at)
            VALUES
            (?, ?, ?, ?)
            ",
        )
        .bind(form.name.as_str())
        .bind(form.email.as_str())
        .bind(form.message.as_str())
        .bind(now)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error inserting contact message: {e:?}");
        })
    }
}

impl Store {
    pub async fn subscriber_exists(&self, email: &str) -> Result<bool> {
        sqlx::query_scalar::<_, i64>(
            "
            SELECT COUNT(*)
            FROM subscribe
            WHERE email = ?
            ",
        )
        .bind(email)
        .fetch_one(&self.0)
        .await
        .map(|count| count > 0)
        .map_err(|e| {
            error!("error counting subscribers: {e:?}");
        })
    }

    pub async fn insert_subscriber(
        &self,
        form: &SubscribeForm,
        email: &str,
        now: Timestamp,
    ) -> std::result::Result<(), WriteError> {
        sqlx::query(
            "
            INSERT INTO subscribe
            (name, email, created_at)
            VALUES
            (?, ?, ?)
            ",
        )
        .bind(form.name.as_str())
        .bind(email)
        .bind(now)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            if is_unique_violation(&e) {
                WriteError::Duplicate
            } else {
                error!("error inserting subscriber: {e:?}");
                WriteError::Internal
            }
        })
    }
}
