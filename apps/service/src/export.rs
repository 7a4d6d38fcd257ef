//! CSV export of per-schedule logs.

use crate::models::ScheduleStats;

/// Renders a schedule's logs as CSV, newest entry first.
///
/// A transport failure (status 0) prints `ERROR` in the status column
/// and an empty response-time cell.
pub fn schedule_logs_csv(stats: &ScheduleStats) -> String {
    let mut out =
        String::from("Request Number,Timestamp,Status Code,Response Time (ms),Level,Message\n");
    for entry in stats.logs.iter().rev() {
        let status = if entry.status == 0 {
            "ERROR".to_string()
        } else {
            entry.status.to_string()
        };
        let response_time = if entry.response_time_ms == 0 {
            String::new()
        } else {
            entry.response_time_ms.to_string()
        };
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            entry.request_number,
            escape(&entry.timestamp.to_rfc3339()),
            status,
            response_time,
            entry.level,
            escape(&entry.message),
        ));
    }
    out
}

/// Quotes a field when it contains a comma, quote, or newline,
/// doubling embedded quotes.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
