use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};

/// Represents an entity responsible for providing dates across application. Callers are expected to
/// ask for the date every time they need it, so that day changes are noticed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn today(&self) -> NaiveDate;

    async fn sleep(&self, duration: Duration);
}

/// Uses local date of the machine.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Always reports the same date. Used for looking at the calendar as of some past day.
pub struct FixedClock(pub NaiveDate);

#[async_trait]
impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
