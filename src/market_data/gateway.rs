// =============================================================================
// Market data gateway: the seam between the refresh cycle and a provider
// =============================================================================

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::market_data::{Bar, Snapshot};

/// A source of bars and snapshots.
///
/// Each call is a single attempt. Callers treat an `Err` as "unavailable for
/// this symbol this cycle" and carry on with the next symbol.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &'static str;

    /// Bars for `symbol` over `period` sampled every `interval`, ascending by
    /// timestamp. An empty series is reported as `FetchError::EmptyResult`.
    async fn fetch_bars(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<Bar>, FetchError>;

    /// Latest price, previous close, volume and market cap for `symbol`.
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot, FetchError>;
}
