//! Feed filtering: snapshotting the filter inputs, deciding what the store
//! can answer, and evaluating everything else locally.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::geo::{self, Coordinates};
use crate::models::Job;
use crate::salary::SalaryBucket;

/// Raw filter values as the user left them in the filter bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterInputs {
    pub category: String,
    pub location: String,
    pub salary: String,
    pub search: String,
}

impl FilterInputs {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RadiusFilter {
    pub center: Coordinates,
    pub km: f64,
}

/// Immutable criteria for one filtering pass. `None` means the axis does
/// not constrain the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub category: Option<String>,
    pub location: Option<String>,
    pub salary_bucket: Option<SalaryBucket>,
    pub search_term: Option<String>,
    pub radius: Option<RadiusFilter>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.location.is_none()
            && self.salary_bucket.is_none()
            && self.search_term.is_none()
            && self.radius.is_none()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Snapshots the inputs into a `FilterSpec`. The radius comes from the
/// session's radius state rather than the text inputs.
pub fn read_filters(inputs: &FilterInputs, radius: Option<RadiusFilter>) -> Result<FilterSpec> {
    let salary_bucket = match non_empty(&inputs.salary) {
        Some(token) => Some(SalaryBucket::parse(&token)?),
        None => None,
    };

    Ok(FilterSpec {
        category: non_empty(&inputs.category),
        location: non_empty(&inputs.location),
        salary_bucket,
        search_term: non_empty(&inputs.search).map(|s| s.to_lowercase()),
        radius,
    })
}

/// Job attributes the store can match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobField {
    Category,
    Location,
}

impl JobField {
    pub fn column(&self) -> &'static str {
        match self {
            JobField::Category => "category",
            JobField::Location => "location",
        }
    }

    pub fn value_of<'a>(&self, job: &'a Job) -> &'a str {
        match self {
            JobField::Category => &job.category,
            JobField::Location => &job.location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equality {
    pub field: JobField,
    pub value: String,
}

impl fmt::Display for Equality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {:?}", self.field.column(), self.value)
    }
}

/// Predicates handed to the store. Everything else is evaluated locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchPlan {
    pub equality: Vec<Equality>,
    pub needs_full_scan: bool,
}

impl FetchPlan {
    pub fn pushes(&self, field: JobField) -> bool {
        self.equality.iter().any(|eq| eq.field == field)
    }
}

/// Store query interface: approved jobs only, newest first.
pub trait JobStore {
    fn fetch_approved(&self, equality: &[Equality]) -> Result<Vec<Job>>;
}

/// A search term forces a full scan, as does the absence of any
/// category/location constraint. Salary and radius are never pushed.
pub fn plan_fetch(spec: &FilterSpec) -> FetchPlan {
    let has_exact = spec.category.is_some() || spec.location.is_some();

    if spec.search_term.is_some() || !has_exact {
        return FetchPlan {
            equality: Vec::new(),
            needs_full_scan: true,
        };
    }

    let equality = [
        (JobField::Category, &spec.category),
        (JobField::Location, &spec.location),
    ]
    .into_iter()
    .filter_map(|(field, value)| {
        value.as_ref().map(|v| Equality {
            field,
            value: v.clone(),
        })
    })
    .collect();

    FetchPlan {
        equality,
        needs_full_scan: false,
    }
}

/// Applies every predicate locally. Equality axes are re-checked even when
/// the store already matched them, so any candidate list can be passed in.
/// The input order is preserved.
pub fn evaluate(candidates: &[Job], spec: &FilterSpec) -> Vec<Job> {
    candidates
        .iter()
        .filter(|job| passes(job, spec))
        .cloned()
        .collect()
}

fn passes(job: &Job, spec: &FilterSpec) -> bool {
    for (field, wanted) in [
        (JobField::Category, &spec.category),
        (JobField::Location, &spec.location),
    ] {
        if let Some(wanted) = wanted {
            if field.value_of(job) != wanted {
                return false;
            }
        }
    }

    if let Some(bucket) = &spec.salary_bucket {
        if !bucket.admits(job.salary.as_deref()) {
            return false;
        }
    }

    if let Some(radius) = &spec.radius {
        if !geo::is_within_radius(geo::job_coordinates(job), radius.center, radius.km) {
            return false;
        }
    }

    if let Some(term) = &spec.search_term {
        if !matches_text(job, term) {
            return false;
        }
    }

    true
}

fn matches_text(job: &Job, term: &str) -> bool {
    job.title.to_lowercase().contains(term)
        || job
            .company
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(term))
        || job.location.to_lowercase().contains(term)
}

/// Plan, fetch, evaluate.
pub fn run_pipeline(store: &dyn JobStore, spec: &FilterSpec) -> Result<Vec<Job>> {
    let plan = plan_fetch(spec);
    debug!(
        full_scan = plan.needs_full_scan,
        pushed = ?plan.equality.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "planned fetch"
    );

    let candidates = store.fetch_approved(&plan.equality)?;
    let jobs = evaluate(&candidates, spec);
    debug!(candidates = candidates.len(), kept = jobs.len(), "evaluated filters");
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{ABUJA, LAGOS};
    use crate::models::fixtures::{job, MemoryStore};

    fn titles(jobs: &[Job]) -> Vec<&str> {
        jobs.iter().map(|j| j.title.as_str()).collect()
    }

    fn sample() -> Vec<Job> {
        vec![
            job(3, "Backend Engineer", "Lagos", "IT", Some("400k")),
            job(2, "Accountant", "Abuja", "Finance", Some("₦250,000 - ₦300,000")),
            job(1, "Brand Manager", "Remote", "Marketing", Some("Negotiable")),
        ]
    }

    #[test]
    fn test_read_filters_normalizes_inputs() {
        let inputs = FilterInputs {
            category: " IT ".to_string(),
            location: "".to_string(),
            salary: "300k+".to_string(),
            search: "  Engineer ".to_string(),
        };
        let spec = read_filters(&inputs, None).unwrap();
        assert_eq!(spec.category.as_deref(), Some("IT"));
        assert_eq!(spec.location, None);
        assert_eq!(spec.salary_bucket.unwrap().min, 300_000.0);
        assert_eq!(spec.search_term.as_deref(), Some("engineer"));
    }

    #[test]
    fn test_read_filters_rejects_bad_bucket() {
        let inputs = FilterInputs {
            salary: "lots".to_string(),
            ..Default::default()
        };
        assert!(read_filters(&inputs, None).is_err());
    }

    #[test]
    fn test_empty_inputs_give_empty_spec() {
        let spec = read_filters(&FilterInputs::default(), None).unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn test_plan_pushes_category() {
        let spec = FilterSpec {
            category: Some("IT".to_string()),
            ..Default::default()
        };
        let plan = plan_fetch(&spec);
        assert!(!plan.needs_full_scan);
        assert!(plan.pushes(JobField::Category));
        assert!(!plan.pushes(JobField::Location));
    }

    #[test]
    fn test_plan_search_term_forces_full_scan() {
        let spec = FilterSpec {
            category: Some("IT".to_string()),
            location: Some("Lagos".to_string()),
            search_term: Some("engineer".to_string()),
            ..Default::default()
        };
        let plan = plan_fetch(&spec);
        assert!(plan.needs_full_scan);
        assert!(plan.equality.is_empty());
    }

    #[test]
    fn test_plan_salary_and_radius_only_is_full_scan() {
        let spec = FilterSpec {
            salary_bucket: Some(SalaryBucket::parse("300k+").unwrap()),
            radius: Some(RadiusFilter { center: LAGOS, km: 20.0 }),
            ..Default::default()
        };
        assert!(plan_fetch(&spec).needs_full_scan);
        assert!(plan_fetch(&FilterSpec::default()).needs_full_scan);
    }

    #[test]
    fn test_empty_spec_keeps_everything() {
        let jobs = sample();
        assert_eq!(evaluate(&jobs, &FilterSpec::default()), jobs);
    }

    #[test]
    fn test_salary_filter_fails_open() {
        let spec = FilterSpec {
            salary_bucket: Some(SalaryBucket::parse("300k+").unwrap()),
            ..Default::default()
        };
        assert_eq!(titles(&evaluate(&sample(), &spec)), vec!["Backend Engineer", "Brand Manager"]);
    }

    #[test]
    fn test_radius_filter_excludes_unresolvable() {
        let spec = FilterSpec {
            radius: Some(RadiusFilter { center: ABUJA, km: 30.0 }),
            ..Default::default()
        };
        assert_eq!(titles(&evaluate(&sample(), &spec)), vec!["Accountant"]);
    }

    #[test]
    fn test_search_matches_title_company_location() {
        let mut jobs = sample();
        jobs[1].company = Some("Flutterwave".to_string());
        for (term, expected) in [
            ("engineer", vec!["Backend Engineer"]),
            ("flutter", vec!["Accountant"]),
            ("remote", vec!["Brand Manager"]),
        ] {
            let spec = FilterSpec {
                search_term: Some(term.to_string()),
                ..Default::default()
            };
            assert_eq!(titles(&evaluate(&jobs, &spec)), expected, "term {}", term);
        }
    }

    #[test]
    fn test_search_rechecks_category_locally() {
        let spec = FilterSpec {
            category: Some("Finance".to_string()),
            search_term: Some("a".to_string()),
            ..Default::default()
        };
        assert_eq!(titles(&evaluate(&sample(), &spec)), vec!["Accountant"]);
    }

    #[test]
    fn test_equality_checked_on_unfetched_candidates() {
        let spec = FilterSpec {
            category: Some("IT".to_string()),
            ..Default::default()
        };
        assert!(!plan_fetch(&spec).needs_full_scan);
        let mixed = vec![
            job(5, "Accountant", "Lagos", "Finance", None),
            job(4, "QA Engineer", "Lagos", "IT", None),
        ];
        assert_eq!(titles(&evaluate(&mixed, &spec)), vec!["QA Engineer"]);

        let spec = FilterSpec {
            location: Some("Abuja".to_string()),
            ..Default::default()
        };
        assert_eq!(titles(&evaluate(&mixed, &spec)), Vec::<&str>::new());
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let spec = FilterSpec {
            salary_bucket: Some(SalaryBucket::parse("200k-450k").unwrap()),
            search_term: Some("e".to_string()),
            ..Default::default()
        };
        let once = evaluate(&sample(), &spec);
        assert_eq!(evaluate(&once, &spec), once);
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let mut frontend = job(4, "Frontend Engineer", "Lagos", "IT", Some("600k"));
        frontend.approved = false;
        let store = MemoryStore(vec![
            job(5, "Backend Engineer", "Lagos", "IT", Some("400k")),
            job(6, "Driver", "Abuja", "Logistics", Some("80k")),
            frontend,
        ]);
        let spec = FilterSpec {
            location: Some("Lagos".to_string()),
            salary_bucket: Some(SalaryBucket::parse("300k+").unwrap()),
            ..Default::default()
        };
        let jobs = run_pipeline(&store, &spec).unwrap();
        assert_eq!(titles(&jobs), vec!["Backend Engineer"]);
    }
}
