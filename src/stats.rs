//! Rating aggregates shared by the store detail view and the dashboards.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{RatingWithDetails, Store, StoreWithOwner, User};

/// Number of items in the admin recent activity feed.
pub const ACTIVITY_PAGE_SIZE: usize = 10;
/// Ratings pulled into the activity feed before merging.
pub const ACTIVITY_RATING_SOURCE: i64 = 10;
/// Stores pulled into the activity feed before merging.
pub const ACTIVITY_STORE_SOURCE: i64 = 5;
/// Number of recent ratings on a store owner's dashboard.
pub const OWNER_RECENT_RATINGS: i64 = 10;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Arithmetic mean of the given ratings, 0 when there are none.
#[must_use]
pub fn average_rating(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: i64 = values.iter().sum();
    sum as f64 / values.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DistributionBucket {
    pub rating: i64,
    pub count: i64,
    pub percentage: i64,
}

/// Count and rounded percentage of ratings at each star value, 1 through 5.
/// Values outside the range are ignored.
#[must_use]
pub fn rating_distribution(values: &[i64]) -> Vec<DistributionBucket> {
    let mut counts = [0i64; MAX_RATING as usize];
    for &value in values {
        if (MIN_RATING..=MAX_RATING).contains(&value) {
            counts[(value - MIN_RATING) as usize] += 1;
        }
    }
    let total: i64 = counts.iter().sum();

    counts
        .iter()
        .zip(MIN_RATING..=MAX_RATING)
        .map(|(&count, rating)| DistributionBucket {
            rating,
            count,
            percentage: percentage(count, total),
        })
        .collect()
}

fn percentage(count: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as i64
}

/// One entry of the admin activity feed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityItem {
    Rating {
        created_at: DateTime<Utc>,
        user: User,
        store: Store,
        rating: i64,
    },
    Store {
        created_at: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        user: Option<User>,
        store: Store,
    },
}

impl ActivityItem {
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ActivityItem::Rating { created_at, .. } | ActivityItem::Store { created_at, .. } => {
                *created_at
            }
        }
    }
}

impl From<RatingWithDetails> for ActivityItem {
    fn from(r: RatingWithDetails) -> Self {
        ActivityItem::Rating {
            created_at: r.rating.created_at,
            rating: r.rating.rating,
            user: r.user,
            store: r.store,
        }
    }
}

impl From<StoreWithOwner> for ActivityItem {
    fn from(s: StoreWithOwner) -> Self {
        ActivityItem::Store {
            created_at: s.store.created_at,
            user: s.owner,
            store: s.store,
        }
    }
}

/// Merges recent ratings and recent stores into one feed, newest first
/// across both sources, truncated to `limit`.
#[must_use]
pub fn merge_recent_activity(
    ratings: Vec<RatingWithDetails>,
    stores: Vec<StoreWithOwner>,
    limit: usize,
) -> Vec<ActivityItem> {
    let mut items: Vec<ActivityItem> = ratings
        .into_iter()
        .map(ActivityItem::from)
        .chain(stores.into_iter().map(ActivityItem::from))
        .collect();

    // Stable sort keeps ratings ahead of stores on equal timestamps.
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    items.truncate(limit);
    items
}
