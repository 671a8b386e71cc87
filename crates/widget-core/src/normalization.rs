use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{DEFAULT_RATE_LIMIT_WAIT, WidgetError, WidgetErrorCategory, wait_minutes_rounded_up},
    types::{AnalysisOutcome, WidgetEvent},
};

/// User-facing message category for a failed pipeline run.
///
/// The UI renders one of these; raw transport errors never cross the event
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserMessage {
    /// The submitted image was rejected (bad type, too large, undecodable).
    InvalidImage {
        /// Short detail suitable for display.
        detail: String,
    },
    /// Rate limited; the UI shows a countdown.
    RateLimited {
        /// Whole minutes until the limit resets, rounded up.
        wait_minutes: u64,
    },
    /// The device reports no connectivity.
    Offline,
    /// The device is online but the service did not answer.
    ServerUnreachable,
    /// Anything else: a generic retry-prompting message.
    TryAgain,
}

/// Map a terminal pipeline error to its user-facing message.
///
/// `online` is the platform connectivity signal; it only matters for network
/// failures, where "you're offline" and "server unreachable" read differently.
pub fn user_message(error: &WidgetError, online: bool) -> UserMessage {
    match error.category {
        WidgetErrorCategory::Validation | WidgetErrorCategory::Decode => UserMessage::InvalidImage {
            detail: error.message.clone(),
        },
        WidgetErrorCategory::RateLimited => {
            let wait = error
                .retry_after_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RATE_LIMIT_WAIT);
            UserMessage::RateLimited {
                wait_minutes: wait_minutes_rounded_up(wait),
            }
        }
        WidgetErrorCategory::Network if !online => UserMessage::Offline,
        WidgetErrorCategory::Network => UserMessage::ServerUnreachable,
        _ => UserMessage::TryAgain,
    }
}

/// Convert a pipeline run's terminal result into its UI event.
pub fn terminal_event(
    generation: u64,
    result: Result<AnalysisOutcome, WidgetError>,
    online: bool,
) -> WidgetEvent {
    match result {
        Ok(outcome) => WidgetEvent::AnalysisCompleted {
            generation,
            outcome,
        },
        Err(error) => WidgetEvent::PipelineFailed {
            generation,
            code: error.code.clone(),
            user_message: user_message(&error, online),
        },
    }
}
