use crate::severity::LogSeverity;
use crate::systime::now;
use once_cell::sync::OnceCell;

static MIN_SEVERITY: OnceCell<LogSeverity> = OnceCell::new();

/// Environment variable read when no minimum severity was set explicitly
pub const LOG_ENV: &str = "METROBLOCK_LOG";

/// Sets the minimum severity printed by [`log`]. Only the first call wins.
pub fn set_min_severity(severity: LogSeverity) -> bool {
    MIN_SEVERITY.set(severity).is_ok()
}

pub fn min_severity() -> LogSeverity {
    *MIN_SEVERITY.get_or_init(|| {
        std::env::var(LOG_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(LogSeverity::Info)
    })
}

pub fn enabled(severity: LogSeverity) -> bool {
    severity >= min_severity()
}

pub fn log(msg: String, log_severity: LogSeverity) {
    if !enabled(log_severity) {
        return;
    }
    match log_severity {
        LogSeverity::Error | LogSeverity::Fatal => {
            eprintln!("[{}] {} {}", log_severity, now(), msg)
        }
        _ => println!("[{}] {} {}", log_severity, now(), msg),
    }
}
