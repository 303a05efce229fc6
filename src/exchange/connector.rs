//! Building exchange handles for API users
//!
//! Routes never construct clients themselves: they ask the connector for the
//! public market data venue or for a user's trading account. In paper mode the
//! account is a [`PaperExchange`] kept per owner for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::auth::Credentials;
use super::binance::{BinanceClient, BinanceConfig};
use super::error::{ExchangeError, ExchangeResult};
use super::fallback::FallbackExchange;
use super::paper::PaperExchange;
use super::Exchange;

pub trait ExchangeConnector: Send + Sync {
    /// Venue for unauthenticated market data
    fn public(&self) -> Arc<dyn Exchange>;

    /// Trading account for `owner`. Live connectors require credentials.
    fn account(
        &self,
        owner: &str,
        credentials: Option<Credentials>,
    ) -> ExchangeResult<Arc<dyn Exchange>>;

    /// Whether accounts are simulated
    fn paper_trading(&self) -> bool;
}

/// Simulated accounts keyed by owner
struct PaperAccounts {
    quote_asset: String,
    starting_balance: f64,
    accounts: Mutex<HashMap<String, Arc<PaperExchange>>>,
}

impl PaperAccounts {
    fn new(quote_asset: &str, starting_balance: f64) -> Self {
        Self {
            quote_asset: quote_asset.to_string(),
            starting_balance,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_open(&self, owner: &str, feed: &Arc<dyn Exchange>) -> Arc<PaperExchange> {
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        accounts
            .entry(owner.to_string())
            .or_insert_with(|| {
                tracing::info!(owner, balance = self.starting_balance, "Opening paper account");
                Arc::new(PaperExchange::new(
                    feed.clone(),
                    &self.quote_asset,
                    self.starting_balance,
                ))
            })
            .clone()
    }
}

/// Connector for the real Binance API (mainnet or testnet)
pub struct BinanceConnector {
    client: BinanceClient,
    paper: Option<PaperAccounts>,
}

impl BinanceConnector {
    pub fn new(config: BinanceConfig) -> ExchangeResult<Self> {
        Ok(Self {
            client: BinanceClient::new(config)?,
            paper: None,
        })
    }

    /// Fill orders against simulated balances while reading live prices
    pub fn with_paper_trading(mut self, quote_asset: &str, starting_balance: f64) -> Self {
        self.paper = Some(PaperAccounts::new(quote_asset, starting_balance));
        self
    }
}

impl ExchangeConnector for BinanceConnector {
    fn public(&self) -> Arc<dyn Exchange> {
        Arc::new(self.client.clone())
    }

    fn account(
        &self,
        owner: &str,
        credentials: Option<Credentials>,
    ) -> ExchangeResult<Arc<dyn Exchange>> {
        if let Some(paper) = &self.paper {
            return Ok(paper.get_or_open(owner, &self.public()));
        }
        let credentials = credentials.ok_or(ExchangeError::MissingCredentials)?;
        // Clones share the breaker and throttle with the public client
        Ok(Arc::new(self.client.clone().with_credentials(credentials)))
    }

    fn paper_trading(&self) -> bool {
        self.paper.is_some()
    }
}

/// Connector that never touches the network: fallback prices, paper fills
pub struct OfflineConnector {
    feed: Arc<dyn Exchange>,
    paper: PaperAccounts,
}

impl OfflineConnector {
    pub fn new(quote_asset: &str, starting_balance: f64) -> Self {
        Self {
            feed: Arc::new(FallbackExchange::new()),
            paper: PaperAccounts::new(quote_asset, starting_balance),
        }
    }
}

impl Default for OfflineConnector {
    fn default() -> Self {
        Self::new("USDT", 10_000.0)
    }
}

impl ExchangeConnector for OfflineConnector {
    fn public(&self) -> Arc<dyn Exchange> {
        self.feed.clone()
    }

    fn account(
        &self,
        owner: &str,
        _credentials: Option<Credentials>,
    ) -> ExchangeResult<Arc<dyn Exchange>> {
        Ok(self.paper.get_or_open(owner, &self.feed))
    }

    fn paper_trading(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataSource, Side};

    #[tokio::test]
    async fn test_offline_accounts_persist_per_owner() {
        let connector = OfflineConnector::new("USDT", 1_000.0);
        let a = connector.account("user-1", None).unwrap();
        a.place_market_order("DOTUSDT", Side::Buy, 10.0).await.unwrap();

        let again = connector.account("user-1", None).unwrap();
        let balances = again.balances().await.unwrap();
        assert!(balances.iter().any(|b| b.asset == "DOT"));

        let other = connector.account("user-2", None).unwrap();
        let balances = other.balances().await.unwrap();
        assert!(balances.iter().all(|b| b.asset != "DOT"));
        assert_eq!(other.source(), DataSource::Paper);
    }

    #[test]
    fn test_live_connector_requires_credentials() {
        let connector = BinanceConnector::new(BinanceConfig::testnet()).unwrap();
        assert!(!connector.paper_trading());
        assert!(matches!(
            connector.account("user-1", None).err(),
            Some(ExchangeError::MissingCredentials)
        ));
        let account = connector
            .account("user-1", Some(Credentials::new("key", "secret")))
            .unwrap();
        assert_eq!(account.source(), DataSource::Binance);
    }

    #[test]
    fn test_paper_connector_ignores_credentials() {
        let connector = BinanceConnector::new(BinanceConfig::testnet())
            .unwrap()
            .with_paper_trading("USDT", 500.0);
        let account = connector.account("user-9", None).unwrap();
        assert_eq!(account.source(), DataSource::Paper);
        assert_eq!(connector.public().source(), DataSource::Binance);
    }
}
