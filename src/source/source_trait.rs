//! Trait abstraction for report acquisition to enable testing

use async_trait::async_trait;

use super::QueryWindow;
use crate::error::Result;
use crate::report::Report;

/// Trait for fetching report batches
#[async_trait]
pub trait ReportSource: Send {
    /// Fetch the reports inside `window`, ordered by (timestamp, callsign)
    async fn fetch(&mut self, window: &QueryWindow) -> Result<Vec<Report>>;
}
