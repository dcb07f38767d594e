//! Log identifier generation.
//!
//! Ids are sortable: a UTC timestamp prefix (`YYYYMMDDHHMMSS`) followed by
//! an underscore and a 12-character random alphanumeric suffix. They are
//! used as audio correlation ids ("req ids") and are safe to put in log
//! lines and error reports.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const SUFFIX_LEN: usize = 12;

/// Generate a log identifier in the format `YYYYMMDDHHMMSS_<suffix>`.
pub fn generate_log_id() -> String {
    generate_at(Utc::now())
}

fn generate_at(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}_{}", now.format(TIMESTAMP_FORMAT), suffix)
}
