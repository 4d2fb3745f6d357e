//! Shared helpers and constants.

use chrono::Utc;

pub const APP_NAME: &str = "threadline_consumer";

/// Seconds since the Unix epoch; the unit used by every `pub_date`/`time` field.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

pub fn print_banner() {
    println!("{APP_NAME} v{}", env!("CARGO_PKG_VERSION"));
}
