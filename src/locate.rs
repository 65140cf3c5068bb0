//! Element location and query submission.
//!
//! The search widget has no stable markup contract, so candidate locators
//! are kept as an ordered list, most specific first. The resolver walks the
//! list and commits to the first strategy that currently matches anything;
//! generic fallbacks can therefore never shadow a specific locator that
//! also matches.

use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use crate::driver::{Locator, PageDriver};
use crate::error::ScrapeError;

/// A named, ordered rule for finding an element.
#[derive(Debug, Clone, Copy)]
pub struct LocatorStrategy {
    pub name: &'static str,
    pub locator: Locator,
}

/// Return the first strategy that resolves to at least one element.
///
/// Strategies are evaluated strictly in list order; failure is only reported
/// after every one has been tried.
pub fn resolve_first<'a>(
    driver: &dyn PageDriver,
    strategies: &'a [LocatorStrategy],
) -> Result<&'a LocatorStrategy, ScrapeError> {
    for strategy in strategies {
        if driver.query_count(&strategy.locator) > 0 {
            info!(strategy = strategy.name, "locator resolved");
            return Ok(strategy);
        }
    }
    Err(ScrapeError::NoLocatorMatched {
        tried: strategies.len(),
    })
}

fn submit_failure(strategy: &LocatorStrategy) -> impl FnOnce(anyhow::Error) -> ScrapeError + '_ {
    move |cause| ScrapeError::QuerySubmission {
        strategy: strategy.name.to_string(),
        cause,
    }
}

/// Focus the resolved input, clear it, type `query` and submit with Enter.
///
/// Exactly one attempt: retrying with an alternate locator is the
/// orchestrator's decision, not this function's.
pub async fn submit_query(
    driver: &dyn PageDriver,
    strategy: &LocatorStrategy,
    query: &str,
) -> Result<(), ScrapeError> {
    driver
        .click(&strategy.locator)
        .map_err(submit_failure(strategy))?;
    // Let the widget finish wiring its focus handlers before typing.
    sleep(Duration::from_millis(300)).await;

    driver
        .clear(&strategy.locator)
        .map_err(submit_failure(strategy))?;
    driver
        .send_keys(&strategy.locator, query)
        .map_err(submit_failure(strategy))?;
    sleep(Duration::from_millis(300)).await;

    driver.press_enter().map_err(submit_failure(strategy))?;
    info!(strategy = strategy.name, query, "query submitted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::MockDriver;

    const STRATEGIES: [LocatorStrategy; 3] = [
        LocatorStrategy {
            name: "a",
            locator: Locator::Css("#a"),
        },
        LocatorStrategy {
            name: "b",
            locator: Locator::Css("#b"),
        },
        LocatorStrategy {
            name: "c",
            locator: Locator::Css("#c"),
        },
    ];

    #[test]
    fn first_matching_strategy_wins_over_later_ones() {
        // Only b and c match; b must win because it comes first.
        let driver = MockDriver::with_counts(&[
            (&Locator::Css("#b"), 1),
            (&Locator::Css("#c"), 4),
        ]);
        let resolved = resolve_first(&driver, &STRATEGIES).unwrap();
        assert_eq!(resolved.name, "b");
    }

    #[test]
    fn all_strategies_exhausted_is_an_error() {
        let driver = MockDriver::default();
        let err = resolve_first(&driver, &STRATEGIES).unwrap_err();
        match err {
            ScrapeError::NoLocatorMatched { tried } => assert_eq!(tried, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn submission_clicks_clears_types_then_submits() {
        let driver = MockDriver::default();
        submit_query(&driver, &STRATEGIES[0], "23220").await.unwrap();
        assert_eq!(
            driver.calls(),
            vec![
                "click:css:#a",
                "clear:css:#a",
                "send_keys:css:#a:23220",
                "press_enter",
            ]
        );
    }
}
