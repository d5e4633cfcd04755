pub mod commissions;
pub mod dashboards;
pub mod notifications;
pub mod orders;
pub mod royalties;
pub mod stock;
pub mod users;
pub mod works;

use chrono::{DateTime, Datelike, Utc};

/// Bucket key used by every monthly chart payload, e.g. `2025-07`.
pub(crate) fn month_key(ts: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", ts.year(), ts.month())
}
