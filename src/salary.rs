//! Salary normalization.
//!
//! Posted salaries are free text ("₦500,000 – 600,000", "300k+", "Negotiable"),
//! while the feed filter offers a fixed set of buckets. A posting matches a
//! bucket when the smallest figure it mentions falls inside the bucket, so a
//! ">= X" filter only shows jobs guaranteed to pay at least X.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BoardError, Result};

/// A number, optionally followed by a standalone `k` or `m` multiplier.
/// The trailing letters group lets "150000 monthly" keep its plain value.
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d,]*(?:\.\d+)?)(?:\s*([km])([a-z]*))?").expect("valid amount regex")
});

static BUCKET_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d[\d,]*(?:\.\d+)?)\s*([km])?$").expect("valid bucket regex")
});

fn multiplier(suffix: &str) -> f64 {
    match suffix {
        "k" => 1_000.0,
        "m" => 1_000_000.0,
        _ => 1.0,
    }
}

fn parse_digits(digits: &str) -> Option<f64> {
    digits.replace(',', "").parse::<f64>().ok()
}

/// Returns the smallest positive amount mentioned in `raw`, or `None` when
/// the text carries no usable figure.
pub fn normalize_salary_to_minimum(raw: &str) -> Option<f64> {
    let lower = raw.to_lowercase();

    AMOUNT_RE
        .captures_iter(&lower)
        .filter_map(|caps| {
            let value = parse_digits(&caps[1])?;
            let scaled = match (caps.get(2), caps.get(3)) {
                (Some(suffix), Some(rest)) if rest.as_str().is_empty() => {
                    value * multiplier(suffix.as_str())
                }
                _ => value,
            };
            normalize_salary_amount(scaled)
        })
        .min_by(f64::total_cmp)
}

/// Numeric salaries skip text parsing but obey the same positivity rule.
pub fn normalize_salary_amount(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

/// A salary filter option such as `300k+` or `100000-200000`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalaryBucket {
    pub min: f64,
    pub max: Option<f64>,
}

impl SalaryBucket {
    pub fn parse(token: &str) -> Result<Self> {
        let invalid = || BoardError::InvalidBucket(token.to_string());
        let normalized = token.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(invalid());
        }

        let (body, open) = match normalized.strip_suffix('+') {
            Some(body) => (body.trim_end(), true),
            None => (normalized.as_str(), false),
        };

        match body.split_once('-') {
            Some(_) if open => Err(invalid()),
            Some((low, high)) => {
                let min = parse_bucket_amount(low).ok_or_else(invalid)?;
                let max = parse_bucket_amount(high).ok_or_else(invalid)?;
                if max < min {
                    return Err(invalid());
                }
                Ok(Self { min, max: Some(max) })
            }
            None => {
                let min = parse_bucket_amount(body).ok_or_else(invalid)?;
                Ok(Self { min, max: None })
            }
        }
    }

    /// Unparsable or missing salaries pass: the filter fails open.
    pub fn admits(&self, salary: Option<&str>) -> bool {
        match salary.and_then(normalize_salary_to_minimum) {
            Some(value) => value >= self.min && self.max.is_none_or(|max| value <= max),
            None => true,
        }
    }
}

fn parse_bucket_amount(text: &str) -> Option<f64> {
    let caps = BUCKET_AMOUNT_RE.captures(text.trim())?;
    let value = parse_digits(&caps[1])?;
    let scale = caps.get(2).map_or(1.0, |s| multiplier(s.as_str()));
    Some(value * scale)
}

fn format_amount(value: f64) -> String {
    if value >= 1_000_000.0 && value % 1_000_000.0 == 0.0 {
        format!("{}m", value / 1_000_000.0)
    } else if value >= 1_000.0 && value % 1_000.0 == 0.0 {
        format!("{}k", value / 1_000.0)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for SalaryBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}-{}", format_amount(self.min), format_amount(max)),
            None => write!(f, "{}+", format_amount(self.min)),
        }
    }
}
