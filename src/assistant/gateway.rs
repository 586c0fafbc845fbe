use std::{sync::Arc, time::Duration};

use tokio::time;

use super::{
    backend::GenerationBackend,
    prompt::{build_full_prompt, build_policy_prompt},
};
use crate::context::{summarize, ContextConfig};
use crate::db::HazardReport;
use crate::error::BackendError;
use crate::{log_debug, log_warn};

const ENABLE_LOGS: bool = true;

/// Reply when the backend answers with nothing usable.
pub const EMPTY_REPLY_FALLBACK: &str =
    "I'm not sure yet, but stay in well-lit areas and avoid isolated paths.";

/// Reply when the backend cannot be reached, errors, or times out.
pub const UNREACHABLE_FALLBACK: &str = "I couldn't reach the assistant model right now. \
     For now: stick to main walkways and stay near other people.";

/// Answers safety questions from recent reports. Never fails: backend
/// problems become one of the fixed fallback replies.
#[derive(Clone)]
pub struct AssistantGateway {
    backend: Arc<dyn GenerationBackend>,
    context: ContextConfig,
    timeout: Duration,
}

impl AssistantGateway {
    pub fn new(backend: Arc<dyn GenerationBackend>, context: ContextConfig, timeout: Duration) -> Self {
        Self {
            backend,
            context,
            timeout,
        }
    }

    pub fn context_config(&self) -> &ContextConfig {
        &self.context
    }

    pub async fn answer(&self, user_message: &str, reports: &[HazardReport]) -> String {
        let digest = summarize(reports, &self.context);
        let prompt = build_full_prompt(&build_policy_prompt(&digest), user_message);

        log_debug!(
            "Asking backend with {} report(s), {} prompt bytes",
            reports.len(),
            prompt.len()
        );

        let outcome = match time::timeout(self.timeout, self.backend.generate(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        };

        resolve_reply(outcome)
    }
}

fn resolve_reply(outcome: Result<String, BackendError>) -> String {
    match outcome {
        Ok(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                log_warn!("Assistant backend returned an empty reply");
                EMPTY_REPLY_FALLBACK.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Err(err) => {
            log_warn!("Assistant backend call failed: {err}");
            UNREACHABLE_FALLBACK.to_string()
        }
    }
}
