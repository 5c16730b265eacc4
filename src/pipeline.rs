use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::dates::format_for_lookup;
use crate::error::Result;
use crate::lookup::{LookupPayload, ResultLookup};
use crate::normalizer::normalize;
use crate::time::TimeService;
use crate::types::LotteryResult;

/// Fixed-delay retry budget for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(1500),
        }
    }
}

/// Produces a [`LotteryResult`] for any date. Never fails: when every attempt
/// is used up the caller gets the all-sentinel result instead.
pub struct AcquisitionPipeline {
    lookup: Arc<dyn ResultLookup>,
    time: TimeService,
    policy: RetryPolicy,
}

impl AcquisitionPipeline {
    pub fn new(lookup: Arc<dyn ResultLookup>, time: TimeService) -> Self {
        Self::with_policy(lookup, time, RetryPolicy::default())
    }

    pub fn with_policy(lookup: Arc<dyn ResultLookup>, time: TimeService, policy: RetryPolicy) -> Self {
        Self {
            lookup,
            time,
            policy,
        }
    }

    pub fn time(&self) -> &TimeService {
        &self.time
    }

    pub async fn fetch_result(&self, date: &str) -> LotteryResult {
        let search_date = match format_for_lookup(date) {
            Ok(search_date) => search_date,
            Err(e) => {
                warn!("Cannot look up {}: {}", date, e);
                return LotteryResult::empty(date, self.time.now_millis());
            }
        };

        for attempt in 1..=self.policy.attempts {
            match self.attempt(date, &search_date).await {
                Ok(result) => {
                    info!("Fetched XSMB result for {} on attempt {}", date, attempt);
                    return result;
                }
                Err(e) => {
                    warn!("Attempt {} for {} failed: {}", attempt, date, e);
                    // The wait also follows the final failure.
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }

        error!(
            "All {} attempts to fetch {} failed, returning empty result",
            self.policy.attempts, date
        );
        LotteryResult::empty(date, self.time.now_millis())
    }

    async fn attempt(&self, date: &str, search_date: &str) -> Result<LotteryResult> {
        let text = self.lookup.lookup(search_date).await?;
        debug!("Lookup for {} returned {} bytes", date, text.len());

        let record = LookupPayload::from_text(&text).into_record()?;
        normalize(&record, date, &self.time)
    }
}
