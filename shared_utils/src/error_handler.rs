//! Unified Error Handler Module
//!
//! ## Error categories
//! - Recoverable: log a warning and fall back
//! - Fatal: propagate and stop the current operation
//! - Optional: a non-critical step failed, log and continue

use std::fmt;
use std::panic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Recoverable,
    Fatal,
    Optional,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Recoverable => write!(f, "RECOVERABLE"),
            ErrorCategory::Fatal => write!(f, "FATAL"),
            ErrorCategory::Optional => write!(f, "OPTIONAL"),
        }
    }
}

#[derive(Debug)]
pub enum ErrorAction {
    Continue,
    Abort(anyhow::Error),
}

pub fn handle_error<E: std::error::Error + Send + Sync + 'static>(
    category: ErrorCategory,
    context: &str,
    error: E,
    suggestion: Option<&str>,
) -> ErrorAction {
    let suggestion_str = suggestion.unwrap_or("No specific action required");

    match category {
        ErrorCategory::Recoverable => {
            tracing::warn!(%category, context, error = %error, suggestion = suggestion_str, "Recoverable error");
            eprintln!("⚠️ [{}] {}: {}", category, context, error);
            eprintln!("   → Suggested action: {}", suggestion_str);
            ErrorAction::Continue
        }
        ErrorCategory::Fatal => {
            tracing::error!(%category, context, error = %error, suggestion = suggestion_str, "Fatal error");
            eprintln!("❌ [{}] {}: {}", category, context, error);
            eprintln!("   → Suggested action: {}", suggestion_str);
            ErrorAction::Abort(anyhow::anyhow!("{}: {}", context, error))
        }
        ErrorCategory::Optional => {
            tracing::info!(%category, context, error = %error, "Optional step failed");
            eprintln!("ℹ️ [{}] {}: {}", category, context, error);
            ErrorAction::Continue
        }
    }
}

pub fn report_error<E: std::error::Error + ?Sized>(error: &E) {
    eprintln!("🔥 ERROR: {}", error);
    tracing::error!("Error occurred: {}", error);

    let mut source = error.source();
    let mut level = 1;
    while let Some(err) = source {
        eprintln!("   {}. Caused by: {}", level, err);
        tracing::error!("  Caused by (level {}): {}", level, err);
        source = err.source();
        level += 1;
    }
}

pub fn install_panic_handler() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        let location = if let Some(loc) = panic_info.location() {
            format!("{}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            "Unknown location".to_string()
        };

        eprintln!("💥 PANIC occurred!");
        eprintln!("   Message: {}", message);
        eprintln!("   Location: {}", location);

        tracing::error!("PANIC: {} at {}", message, location);

        default_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_handle_error_actions_follow_category() {
        let test_cases = vec![
            (ErrorCategory::Recoverable, true),
            (ErrorCategory::Fatal, false),
            (ErrorCategory::Optional, true),
        ];

        for (category, should_continue) in test_cases {
            let error = io::Error::other("test error");
            let action = handle_error(category, "writing output", error, None);

            let is_continue = matches!(action, ErrorAction::Continue);
            assert_eq!(
                is_continue, should_continue,
                "Category {:?} should {}",
                category,
                if should_continue { "continue" } else { "abort" }
            );
        }
    }

    #[test]
    fn test_fatal_abort_carries_context() {
        let error = io::Error::new(io::ErrorKind::NotFound, "decoder missing");
        match handle_error(ErrorCategory::Fatal, "Loading decoder", error, None) {
            ErrorAction::Abort(e) => {
                let msg = e.to_string();
                assert!(msg.contains("Loading decoder"));
                assert!(msg.contains("decoder missing"));
            }
            ErrorAction::Continue => panic!("fatal errors must abort"),
        }
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(format!("{}", ErrorCategory::Recoverable), "RECOVERABLE");
        assert_eq!(format!("{}", ErrorCategory::Fatal), "FATAL");
        assert_eq!(format!("{}", ErrorCategory::Optional), "OPTIONAL");
    }

    #[test]
    fn test_report_error_chain() {
        let outer_error: Box<dyn std::error::Error> =
            Box::new(io::Error::other("outer error with inner cause"));
        report_error(outer_error.as_ref());
    }
}
