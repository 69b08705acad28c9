//! Error reporting for failures that are not the caller's fault.
//!
//! Each captured error gets a fresh event id that is logged next to the error chain and
//! handed back to the client, so an operator can find the log line from a user report.

use uuid::Uuid;

/// 記錄錯誤並回傳事件 ID
pub fn capture_error(context: &str, err: &(dyn std::error::Error + 'static)) -> String {
    let event_id = Uuid::new_v4().simple().to_string();

    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }

    tracing::error!(
        event_id = %event_id,
        error = %err,
        causes = ?chain,
        "❌ {} failed",
        context
    );

    event_id
}
