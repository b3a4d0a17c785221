//! Review aggregation
//!
//! Combines the reviews of one revision into per-criterion means and
//! population standard deviations plus an overall recommendation.
//! Everything is derived from exact integer sums, so the result does
//! not depend on the order reviews arrive in.

use reviewforge_common::config::WorkflowConfig;
use reviewforge_common::domain::{Criterion, Review};
use serde::{Deserialize, Serialize};

/// Decision signal handed to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    RecommendAccept,
    Borderline,
    RecommendReject,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::RecommendAccept => "recommend_accept",
            Recommendation::Borderline => "borderline",
            Recommendation::RecommendReject => "recommend_reject",
        }
    }
}

/// Cut-offs on the overall mean, both inclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub accept: f64,
    pub reject: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            accept: 7.0,
            reject: 4.0,
        }
    }
}

impl From<&WorkflowConfig> for Thresholds {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            accept: config.accept_threshold,
            reject: config.reject_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionSummary {
    pub criterion: Criterion,
    pub mean: f64,
    /// Population standard deviation; zero for a single review
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub revision_number: u32,
    pub review_count: usize,
    /// One entry per criterion, in `Criterion::ALL` order
    pub criteria: Vec<CriterionSummary>,
    /// Mean of every rating across all criteria
    pub overall_mean: f64,
    pub recommendation: Recommendation,
}

impl AggregateSummary {
    pub fn criterion(&self, criterion: Criterion) -> Option<&CriterionSummary> {
        self.criteria.iter().find(|c| c.criterion == criterion)
    }
}

pub fn recommend(overall_mean: f64, thresholds: Thresholds) -> Recommendation {
    if overall_mean >= thresholds.accept {
        Recommendation::RecommendAccept
    } else if overall_mean <= thresholds.reject {
        Recommendation::RecommendReject
    } else {
        Recommendation::Borderline
    }
}

/// Aggregate the reviews of `revision_number`.
///
/// Reviews of other revisions are ignored. Returns `None` when no review
/// for the revision exists.
pub fn aggregate<'a, I>(revision_number: u32, reviews: I, thresholds: Thresholds) -> Option<AggregateSummary>
where
    I: IntoIterator<Item = &'a Review>,
{
    let mut sums = [0u64; Criterion::ALL.len()];
    let mut squares = [0u64; Criterion::ALL.len()];
    let mut n: u64 = 0;

    for review in reviews.into_iter().filter(|r| r.revision_number == revision_number) {
        n += 1;
        for (i, criterion) in Criterion::ALL.iter().enumerate() {
            let value = u64::from(review.ratings.get(*criterion));
            sums[i] += value;
            squares[i] += value * value;
        }
    }

    if n == 0 {
        return None;
    }

    let criteria = Criterion::ALL
        .iter()
        .enumerate()
        .map(|(i, criterion)| {
            // n * Σx² - (Σx)² is exact and never negative
            let spread = n * squares[i] - sums[i] * sums[i];
            CriterionSummary {
                criterion: *criterion,
                mean: sums[i] as f64 / n as f64,
                std_dev: (spread as f64 / (n * n) as f64).sqrt(),
            }
        })
        .collect();

    let total: u64 = sums.iter().sum();
    let overall_mean = total as f64 / (n * Criterion::ALL.len() as u64) as f64;

    Some(AggregateSummary {
        revision_number,
        review_count: n as usize,
        criteria,
        overall_mean,
        recommendation: recommend(overall_mean, thresholds),
    })
}
