use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{BoardError, Result};
use crate::filter::{Equality, JobStore};
use crate::models::{Job, NewJob};

const JOB_COLUMNS: &str = "id, title, company, location, category, salary, description, tags,
     latitude, longitude, application_link, application_email, posted_at, approved,
     created_by, created_at, updated_at";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                company TEXT,
                location TEXT NOT NULL,
                category TEXT NOT NULL,
                salary TEXT,
                description TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                latitude REAL,
                longitude REAL,
                application_link TEXT,
                application_email TEXT,
                posted_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                approved INTEGER NOT NULL DEFAULT 0 CHECK (approved IN (0, 1)),
                created_by TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE IF NOT EXISTS favorites (
                user_id TEXT NOT NULL,
                job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                saved_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                PRIMARY KEY (user_id, job_id)
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_feed ON jobs(approved, created_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_category ON jobs(category);
            CREATE INDEX IF NOT EXISTS idx_jobs_location ON jobs(location);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(BoardError::NotInitialized);
        }
        Ok(())
    }

    // --- Job operations ---

    pub fn add_job(&self, job: &NewJob, created_by: &str, approved: bool) -> Result<i64> {
        let tags = serde_json::to_string(&job.tags)?;
        self.conn.execute(
            "INSERT INTO jobs (title, company, location, category, salary, description, tags,
                               latitude, longitude, application_link, application_email,
                               approved, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                job.title,
                job.company,
                job.location,
                job.category,
                job.salary,
                job.description,
                tags,
                job.latitude,
                job.longitude,
                job.application_link,
                job.application_email,
                approved,
                created_by,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(id, title = %job.title, approved, "job posted");
        Ok(id)
    }

    /// Owner edit. Approval status is left as it was.
    pub fn update_job(&self, id: i64, job: &NewJob) -> Result<()> {
        let tags = serde_json::to_string(&job.tags)?;
        let changed = self.conn.execute(
            "UPDATE jobs SET title = ?1, company = ?2, location = ?3, category = ?4, salary = ?5,
                             description = ?6, tags = ?7, latitude = ?8, longitude = ?9,
                             application_link = ?10, application_email = ?11,
                             updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
             WHERE id = ?12",
            params![
                job.title,
                job.company,
                job.location,
                job.category,
                job.salary,
                job.description,
                tags,
                job.latitude,
                job.longitude,
                job.application_link,
                job.application_email,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(BoardError::JobNotFound(id));
        }
        info!(id, "job updated");
        Ok(())
    }

    pub fn delete_job(&self, id: i64) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(BoardError::JobNotFound(id));
        }
        info!(id, "job deleted");
        Ok(())
    }

    /// Approve (`true`) or reject (`false`) a posting.
    pub fn set_approved(&self, id: i64, approved: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE jobs SET approved = ?1, updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
             WHERE id = ?2",
            params![approved, id],
        )?;
        if changed == 0 {
            return Err(BoardError::JobNotFound(id));
        }
        info!(id, approved, "moderation decision recorded");
        Ok(())
    }

    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS);
        let result = self.conn.query_row(&sql, [id], Self::row_to_job);
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Moderation view: pending jobs, or every job when `include_approved`.
    pub fn list_moderation_queue(&self, include_approved: bool) -> Result<Vec<Job>> {
        let mut sql = format!("SELECT {} FROM jobs", JOB_COLUMNS);
        if !include_approved {
            sql.push_str(" WHERE approved = 0");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_job)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let tags: String = row.get(7)?;
        let tags = serde_json::from_str(&tags).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Job {
            id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            location: row.get(3)?,
            category: row.get(4)?,
            salary: row.get(5)?,
            description: row.get(6)?,
            tags,
            latitude: row.get(8)?,
            longitude: row.get(9)?,
            application_link: row.get(10)?,
            application_email: row.get(11)?,
            posted_at: row.get(12)?,
            approved: row.get(13)?,
            created_by: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    // --- Favorites ---

    pub fn save_favorite(&self, user: &str, job_id: i64) -> Result<()> {
        if self.get_job(job_id)?.is_none() {
            return Err(BoardError::JobNotFound(job_id));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO favorites (user_id, job_id) VALUES (?1, ?2)",
            params![user, job_id],
        )?;
        Ok(())
    }

    pub fn remove_favorite(&self, user: &str, job_id: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND job_id = ?2",
            params![user, job_id],
        )?;
        Ok(())
    }

    pub fn is_favorite(&self, user: &str, job_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM favorites WHERE user_id = ?1 AND job_id = ?2",
            params![user, job_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn favorite_job_ids(&self, user: &str) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT job_id FROM favorites WHERE user_id = ?1 ORDER BY saved_at DESC, job_id DESC",
        )?;
        let rows = stmt.query_map([user], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<i64>>>()?)
    }

    /// Saved jobs that still exist, most recently saved first.
    pub fn favorite_jobs(&self, user: &str) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for id in self.favorite_job_ids(user)? {
            if let Some(job) = self.get_job(id)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }
}

impl JobStore for Database {
    fn fetch_approved(&self, equality: &[Equality]) -> Result<Vec<Job>> {
        let mut sql = format!("SELECT {} FROM jobs WHERE approved = 1", JOB_COLUMNS);
        for (i, eq) in equality.iter().enumerate() {
            sql.push_str(&format!(" AND {} = ?{}", eq.field.column(), i + 1));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(equality.iter().map(|eq| &eq.value)), Self::row_to_job)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{self, FilterSpec, JobField};
    use crate::map::MarkerBoard;
    use crate::salary::SalaryBucket;
    use crate::session::FeedSession;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn posting(title: &str, location: &str, category: &str, salary: &str) -> NewJob {
        let mut job = NewJob {
            title: title.to_string(),
            company: "Acme Nigeria".to_string(),
            location: location.to_string(),
            category: category.to_string(),
            salary: Some(salary.to_string()),
            description: format!("{} role", title),
            tags: vec!["onsite".to_string()],
            application_link: Some("https://acme.ng/careers".to_string()),
            ..Default::default()
        };
        job.validate().unwrap();
        job
    }

    fn titles(jobs: &[Job]) -> Vec<&str> {
        jobs.iter().map(|j| j.title.as_str()).collect()
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobmap.db");
        let db = Database::open(&path).unwrap();
        db.init().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_reports_unwritable_parent_as_io() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().join("sub").join("jobmap.db");
        assert!(matches!(Database::open(&path), Err(BoardError::Io(_))));
    }

    #[test]
    fn test_uninitialized_database_is_reported() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.ensure_initialized(), Err(BoardError::NotInitialized)));
        db.init().unwrap();
        db.ensure_initialized().unwrap();
    }

    #[test]
    fn test_add_and_get_job_round_trips_fields() {
        let db = db();
        let id = db.add_job(&posting("Teller", "Lagos", "Finance", "₦120,000"), "ada", true).unwrap();
        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.title, "Teller");
        assert_eq!(job.tags, vec!["onsite"]);
        assert_eq!(job.created_by.as_deref(), Some("ada"));
        assert!(job.approved);
        assert!(db.get_job(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_fetch_approved_hides_pending_and_orders_newest_first() {
        let db = db();
        db.add_job(&posting("First", "Lagos", "IT", "100k"), "ada", true).unwrap();
        db.add_job(&posting("Pending", "Lagos", "IT", "100k"), "ada", false).unwrap();
        db.add_job(&posting("Second", "Abuja", "IT", "100k"), "ada", true).unwrap();

        let jobs = db.fetch_approved(&[]).unwrap();
        assert_eq!(titles(&jobs), vec!["Second", "First"]);
    }

    #[test]
    fn test_fetch_approved_with_equality() {
        let db = db();
        db.add_job(&posting("Dev", "Lagos", "IT", "100k"), "ada", true).unwrap();
        db.add_job(&posting("Clerk", "Lagos", "Finance", "100k"), "ada", true).unwrap();
        db.add_job(&posting("Ops", "Abuja", "IT", "100k"), "ada", true).unwrap();

        let eq = [
            Equality { field: JobField::Category, value: "IT".to_string() },
            Equality { field: JobField::Location, value: "Lagos".to_string() },
        ];
        assert_eq!(titles(&db.fetch_approved(&eq).unwrap()), vec!["Dev"]);
        assert_eq!(titles(&db.fetch_approved(&eq[..1]).unwrap()), vec!["Ops", "Dev"]);
    }

    #[test]
    fn test_moderation_flow() {
        let db = db();
        let id = db.add_job(&posting("Nurse", "Abuja", "Other", "200k"), "ada", false).unwrap();
        assert_eq!(db.list_moderation_queue(false).unwrap().len(), 1);
        assert!(db.fetch_approved(&[]).unwrap().is_empty());

        db.set_approved(id, true).unwrap();
        assert!(db.list_moderation_queue(false).unwrap().is_empty());
        assert_eq!(db.list_moderation_queue(true).unwrap().len(), 1);
        assert_eq!(db.fetch_approved(&[]).unwrap().len(), 1);

        db.set_approved(id, false).unwrap();
        assert!(db.fetch_approved(&[]).unwrap().is_empty());
        assert!(matches!(db.set_approved(999, true), Err(BoardError::JobNotFound(999))));
    }

    #[test]
    fn test_update_keeps_approval() {
        let db = db();
        let id = db.add_job(&posting("Nurse", "Abuja", "Other", "200k"), "ada", true).unwrap();
        db.update_job(id, &posting("Head Nurse", "Abuja", "Other", "350k")).unwrap();
        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.title, "Head Nurse");
        assert_eq!(job.salary.as_deref(), Some("350k"));
        assert!(job.approved);
        assert!(db.update_job(id + 5, &posting("X role", "Lagos", "IT", "1k")).is_err());
    }

    #[test]
    fn test_favorites() {
        let db = db();
        let a = db.add_job(&posting("Dev", "Lagos", "IT", "100k"), "ada", true).unwrap();
        let b = db.add_job(&posting("Ops", "Abuja", "IT", "100k"), "ada", true).unwrap();

        db.save_favorite("bola", a).unwrap();
        db.save_favorite("bola", b).unwrap();
        db.save_favorite("bola", b).unwrap();
        assert!(db.is_favorite("bola", a).unwrap());
        assert!(!db.is_favorite("chidi", a).unwrap());
        assert_eq!(db.favorite_job_ids("bola").unwrap(), vec![b, a]);

        db.remove_favorite("bola", a).unwrap();
        assert_eq!(titles(&db.favorite_jobs("bola").unwrap()), vec!["Ops"]);

        db.delete_job(b).unwrap();
        assert!(db.favorite_jobs("bola").unwrap().is_empty());
        assert!(matches!(db.save_favorite("bola", b), Err(BoardError::JobNotFound(_))));
    }

    #[test]
    fn test_filter_scenario_over_sqlite() {
        let db = db();
        db.add_job(&posting("Backend Engineer", "Lagos", "IT", "400k"), "ada", true).unwrap();
        db.add_job(&posting("Driver", "Abuja", "Logistics", "80k"), "ada", true).unwrap();
        db.add_job(&posting("Frontend Engineer", "Lagos", "IT", "600k"), "ada", false).unwrap();

        let spec = FilterSpec {
            location: Some("Lagos".to_string()),
            salary_bucket: Some(SalaryBucket::parse("300k+").unwrap()),
            ..Default::default()
        };
        let jobs = filter::run_pipeline(&db, &spec).unwrap();
        assert_eq!(titles(&jobs), vec!["Backend Engineer"]);
    }

    #[test]
    fn test_session_search_over_sqlite() {
        let db = db();
        db.add_job(&posting("Backend Engineer", "Lagos", "IT", "400k"), "ada", true).unwrap();
        db.add_job(&posting("Data Engineer", "Abuja", "IT", "500k"), "ada", true).unwrap();
        db.add_job(&posting("Driver", "Abuja", "Logistics", "80k"), "ada", true).unwrap();

        let mut map = MarkerBoard::new();
        let mut session = FeedSession::new(Default::default(), std::time::Duration::ZERO);
        session.set_location("Abuja");
        session.type_search("ENGINEER", std::time::Instant::now());
        session.flush_search();
        let jobs = session.refresh(&db, &mut map).unwrap();
        assert_eq!(titles(&jobs), vec!["Data Engineer"]);
        assert_eq!(map.markers().len(), 1);
    }
}
