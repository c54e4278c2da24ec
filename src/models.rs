use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub company: Option<String>,
    pub location: String,
    pub category: String,
    pub salary: Option<String>, // free-form: "500k+", "₦150,000 - ₦200,000 / month", "Negotiable"
    pub description: String,
    pub tags: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub application_link: Option<String>,
    pub application_email: Option<String>,
    pub posted_at: String,
    pub approved: bool,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A job as submitted by its poster, before the store assigns identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub category: String,
    pub salary: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub application_link: Option<String>,
    pub application_email: Option<String>,
}

const STORE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.f";

impl Job {
    /// Posting date as shown in listings ("Jun 1, 2025"). Falls back to the
    /// raw stored value when it does not parse.
    pub fn posted_date(&self) -> String {
        match NaiveDateTime::parse_from_str(&self.posted_at, STORE_TIMESTAMP) {
            Ok(ts) => ts.format("%b %-d, %Y").to_string(),
            Err(_) => self.posted_at.clone(),
        }
    }
}

impl NewJob {
    /// Checks the posting form rules and normalizes whitespace in place.
    pub fn validate(&mut self) -> Result<()> {
        for field in [
            &mut self.title,
            &mut self.company,
            &mut self.location,
            &mut self.category,
            &mut self.description,
        ] {
            *field = field.trim().to_string();
        }

        let required = [
            ("title", &self.title),
            ("company", &self.company),
            ("location", &self.location),
            ("category", &self.category),
            ("description", &self.description),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(BoardError::InvalidJob(format!("{} is required", name)));
            }
        }

        self.salary = non_empty(self.salary.take());
        self.application_link = non_empty(self.application_link.take());
        self.application_email = non_empty(self.application_email.take());
        if self.application_link.is_none() && self.application_email.is_none() {
            return Err(BoardError::InvalidJob(
                "provide an application link or an application email".to_string(),
            ));
        }

        self.tags = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if self.latitude.is_some() != self.longitude.is_some() {
            return Err(BoardError::InvalidJob(
                "latitude and longitude must be given together".to_string(),
            ));
        }

        Ok(())
    }
}

/// Splits a comma-separated tag list as typed into the posting form.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Job;
    use crate::error::Result;
    use crate::filter::{Equality, JobStore};

    /// An approved job whose creation time grows with its id.
    pub fn job(id: i64, title: &str, location: &str, category: &str, salary: Option<&str>) -> Job {
        let created_at = format!("2025-06-01 09:{:02}:{:02}.000", id / 60, id % 60);
        Job {
            id,
            title: title.to_string(),
            company: None,
            location: location.to_string(),
            category: category.to_string(),
            salary: salary.map(str::to_string),
            description: format!("{} wanted", title),
            tags: vec![],
            latitude: None,
            longitude: None,
            application_link: None,
            application_email: Some("jobs@example.com".to_string()),
            posted_at: created_at.clone(),
            approved: true,
            created_by: Some("poster".to_string()),
            created_at: created_at.clone(),
            updated_at: created_at,
        }
    }

    /// Behaves like the store query: approved only, equality, newest first.
    pub struct MemoryStore(pub Vec<Job>);

    impl JobStore for MemoryStore {
        fn fetch_approved(&self, equality: &[Equality]) -> Result<Vec<Job>> {
            let mut jobs: Vec<Job> = self
                .0
                .iter()
                .filter(|j| j.approved)
                .filter(|j| equality.iter().all(|eq| eq.field.value_of(j) == eq.value))
                .cloned()
                .collect();
            jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(jobs)
        }
    }
}
