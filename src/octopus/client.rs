//! GraphQL client for the Kraken France API.
//!
//! Handles authentication, token refresh before expiry, request retries with
//! exponential backoff, and the typed getters the poller consumes.

use crate::error::{PieuvreError, Result};
use crate::logging::get_logger;
use crate::octopus::queries;
use crate::octopus::token::TokenManager;
use crate::octopus::types::{
    AccountData, AccountNode, AccountSummary, AgreementNode, Connection, CreditLedger,
    ElectricityReading, GasReading, GraphQlError, Ledger, LedgerKind, LedgerSummary, MeterPoint,
    PaymentRequest, RateNode, Tariffs, value_as_f64,
};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

/// Kraken API client with session token management
pub struct OctopusClient {
    http: reqwest::Client,
    endpoint: String,
    email: String,
    password: String,
    tokens: TokenManager,
    max_retries: u32,
    retry_delay: Duration,
    logger: crate::logging::StructuredLogger,
}

impl OctopusClient {
    /// Create a new client from the API section of the configuration
    pub fn new(config: &crate::config::Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.api.endpoint.clone(),
            email: config.credentials.email.clone(),
            password: config.credentials.password.clone(),
            tokens: TokenManager::new(),
            max_retries: config.api.max_retries,
            retry_delay: Duration::from_secs(config.api.retry_delay_seconds),
            logger: get_logger("octopus"),
        })
    }

    /// Execute one GraphQL request with retry on transport errors and
    /// retryable statuses (429 and 5xx), exponential backoff between attempts
    async fn execute(
        &self,
        query: &str,
        variables: Value,
        authorization: Option<String>,
    ) -> Result<Value> {
        let payload = json!({ "query": query, "variables": variables });

        for attempt in 0..self.max_retries {
            let mut request = self
                .http
                .post(&self.endpoint)
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .json(&payload);
            if let Some(auth) = authorization.as_ref() {
                request = request.header(AUTHORIZATION, auth);
            }

            let backoff = self.retry_delay * 2u32.saturating_pow(attempt);
            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.json::<Value>().await?);
                    }

                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    self.logger.warn(&format!(
                        "API returned status {} (attempt {}/{})",
                        status,
                        attempt + 1,
                        self.max_retries
                    ));
                    if !retryable {
                        return Err(PieuvreError::api(format!("HTTP status {}", status)));
                    }
                }
                Err(err) => {
                    self.logger.warn(&format!(
                        "Network error: {} (attempt {}/{})",
                        err,
                        attempt + 1,
                        self.max_retries
                    ));
                    if attempt + 1 >= self.max_retries {
                        return Err(err.into());
                    }
                }
            }

            if attempt + 1 < self.max_retries {
                tokio::time::sleep(backoff).await;
            }
        }

        Err(PieuvreError::api("All retry attempts failed"))
    }

    /// Authenticate with the stored credentials and cache the token
    pub async fn authenticate(&mut self) -> Result<()> {
        // Another call may already have refreshed it
        if self.tokens.is_valid() {
            return Ok(());
        }

        self.logger.info("Authenticating with the Kraken API");
        let variables = json!({
            "input": { "email": self.email, "password": self.password }
        });
        let result = self
            .execute(queries::MUTATION_LOGIN, variables, None)
            .await?;

        if let Some(token) = result
            .pointer("/data/obtainKrakenToken/token")
            .and_then(Value::as_str)
        {
            self.tokens.set_token(token.to_string());
            self.logger.info("Authentication successful");
            return Ok(());
        }

        let detail = parse_errors(&result)
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Invalid credentials".to_string());
        Err(PieuvreError::auth(format!(
            "Authentication failed: {}",
            detail
        )))
    }

    /// Execute a query with a valid token, re-authenticating once when the
    /// response carries an authentication error
    pub async fn execute_with_auth(&mut self, query: &str, variables: Value) -> Result<Value> {
        for retry in 0..2 {
            if !self.tokens.is_valid() {
                self.authenticate().await?;
            }

            let authorization = self
                .tokens
                .authorization_value()
                .ok_or_else(|| PieuvreError::auth("No session token available"))?;
            let result = self
                .execute(query, variables.clone(), Some(authorization))
                .await?;

            let errors = parse_errors(&result);
            if !errors.is_empty() {
                if is_auth_error(&errors) && retry == 0 {
                    self.logger
                        .warn("Token expired during request, re-authenticating");
                    self.tokens.clear();
                    continue;
                }
                return Err(PieuvreError::api(errors[0].message.clone()));
            }

            return result
                .get("data")
                .cloned()
                .ok_or_else(|| PieuvreError::api("Response without data"));
        }

        Err(PieuvreError::auth("Re-authentication failed"))
    }

    /// All accounts for the authenticated user
    pub async fn get_accounts(&mut self) -> Result<Vec<AccountSummary>> {
        let data = self
            .execute_with_auth(queries::QUERY_ACCOUNTS, json!({}))
            .await?;
        let accounts = data
            .pointer("/viewer/accounts")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        Ok(serde_json::from_value(accounts)?)
    }

    /// Detailed account data: ledgers, supply points, address.
    /// `summary_ledgers` (from the accounts query) fills in ledger kinds the
    /// credit storage does not carry.
    pub async fn get_account_data(
        &mut self,
        account_number: &str,
        summary_ledgers: &[LedgerSummary],
    ) -> Result<AccountData> {
        let variables = json!({ "accountNumber": account_number });
        let data = self
            .execute_with_auth(queries::QUERY_ACCOUNT_DATA, variables)
            .await?;

        let account = data
            .get("account")
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| PieuvreError::api("No account data received"))?;
        parse_account_data(account, account_number, summary_ledgers)
    }

    /// Electricity readings for a PRM
    pub async fn get_electricity_readings(
        &mut self,
        account_number: &str,
        prm_id: &str,
    ) -> Result<Vec<ElectricityReading>> {
        let variables = json!({ "accountNumber": account_number, "prmId": prm_id });
        let data = self
            .execute_with_auth(queries::QUERY_ELECTRICITY_READINGS, variables)
            .await?;
        let connection: Connection<ElectricityReading> = data
            .get("electricityReading")
            .filter(|v| !v.is_null())
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        Ok(connection.into_nodes())
    }

    /// Gas readings for a PCE reference
    pub async fn get_gas_readings(
        &mut self,
        account_number: &str,
        pce_ref: &str,
    ) -> Result<Vec<GasReading>> {
        let variables = json!({ "accountNumber": account_number, "pceRef": pce_ref });
        let data = self
            .execute_with_auth(queries::QUERY_GAS_READINGS, variables)
            .await?;
        let connection: Connection<GasReading> = data
            .get("gasReading")
            .filter(|v| !v.is_null())
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        Ok(connection.into_nodes())
    }

    /// Active tariffs for the account
    pub async fn get_tariffs(&mut self, account_number: &str) -> Result<Tariffs> {
        let variables = json!({ "accountNumber": account_number });
        let data = self
            .execute_with_auth(queries::QUERY_TARIFFS, variables)
            .await?;
        let connection: Connection<AgreementNode> = data
            .get("agreements")
            .filter(|v| !v.is_null())
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        Ok(extract_tariffs(&connection.into_nodes()))
    }

    /// Latest payment request for a ledger
    pub async fn get_payment_request(
        &mut self,
        ledger_number: &str,
    ) -> Result<Option<PaymentRequest>> {
        let variables = json!({ "ledgerNumber": ledger_number });
        let data = self
            .execute_with_auth(queries::QUERY_PAYMENT_REQUESTS, variables)
            .await?;
        let node = data
            .pointer("/paymentRequests/paymentRequest/edges/0/node")
            .filter(|v| !v.is_null())
            .cloned();
        Ok(node.map(serde_json::from_value).transpose()?)
    }
}

/// Extract the GraphQL error entries from a response envelope
pub fn parse_errors(envelope: &Value) -> Vec<GraphQlError> {
    envelope
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| serde_json::from_value(e.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Whether the error list points at an expired or rejected session
pub fn is_auth_error(errors: &[GraphQlError]) -> bool {
    const KEYWORDS: [&str; 4] = ["authentication", "unauthorized", "token", "expired"];
    errors.iter().any(|e| {
        let message = e.message.to_lowercase();
        KEYWORDS.iter().any(|k| message.contains(k))
    })
}

/// Parse the account node into normalized account data
pub fn parse_account_data(
    account: Value,
    account_number: &str,
    summary_ledgers: &[LedgerSummary],
) -> Result<AccountData> {
    let node: AccountNode = serde_json::from_value(account)?;

    let mut address = None;
    let mut electricity_meters = Vec::new();
    let mut gas_meters = Vec::new();

    for property in node.properties {
        if address.is_none() {
            address = property.address;
        }
        let Some(supply_points) = property.supply_points else {
            continue;
        };
        for supply_point in supply_points.into_nodes() {
            match supply_point.meter_point {
                Some(MeterPoint::Electricity(m)) => electricity_meters.push(m),
                Some(MeterPoint::Gas(m)) => gas_meters.push(m),
                _ => {}
            }
        }
    }

    let credit_ledgers = node
        .credit_storage
        .and_then(|cs| cs.ledger)
        .map(parse_credit_ledgers)
        .unwrap_or_default();

    Ok(AccountData {
        account_number: node
            .number
            .unwrap_or_else(|| account_number.to_string()),
        address,
        ledgers: merge_ledgers(credit_ledgers, summary_ledgers),
        electricity_meters,
        gas_meters,
    })
}

/// The creditStorage ledger field arrives as a single object or a list
fn parse_credit_ledgers(value: Value) -> Vec<CreditLedger> {
    match value {
        Value::Array(entries) => entries
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        Value::Object(_) => serde_json::from_value(value).map(|l| vec![l]).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Merge credit-storage ledgers with the accounts-query summaries; credit
/// storage wins when both carry the same kind
pub fn merge_ledgers(
    credit_ledgers: Vec<CreditLedger>,
    summary_ledgers: &[LedgerSummary],
) -> HashMap<LedgerKind, Ledger> {
    let mut ledgers = HashMap::new();

    for ledger in credit_ledgers {
        let Some(kind) = ledger.ledger_type.as_deref().and_then(LedgerKind::from_api) else {
            continue;
        };
        ledgers.insert(
            kind,
            Ledger {
                kind,
                balance_cents: ledger.current_balance,
                name: ledger.name.unwrap_or_default(),
                number: ledger.number.unwrap_or_default(),
            },
        );
    }

    for ledger in summary_ledgers {
        let Some(kind) = ledger.ledger_type.as_deref().and_then(LedgerKind::from_api) else {
            continue;
        };
        ledgers.entry(kind).or_insert_with(|| Ledger {
            kind,
            balance_cents: ledger.balance,
            name: ledger.name.clone().unwrap_or_else(|| kind.as_str().to_string()),
            number: ledger.number.clone().unwrap_or_default(),
        });
    }

    ledgers
}

/// Derive per-energy tariffs from the active agreements.
/// For PEAK_OFF_PEAK electricity rates HC is the lowest taxed unit price and
/// HP the highest; the gas price is taken from price level 1.
pub fn extract_tariffs(agreements: &[AgreementNode]) -> Tariffs {
    let mut tariffs = Tariffs::default();

    for agreement in agreements {
        if !agreement.is_active.unwrap_or(false) {
            continue;
        }

        let ledger_type = agreement
            .charging_ledger
            .as_ref()
            .and_then(|l| l.ledger_type.as_deref());
        let rates: Vec<&RateNode> = agreement
            .product
            .as_ref()
            .and_then(|p| p.consumption_rates.as_ref())
            .map(|c| c.edges.iter().filter_map(|e| e.node.as_ref()).collect())
            .unwrap_or_default();

        match ledger_type.and_then(LedgerKind::from_api) {
            Some(LedgerKind::Electricity) => {
                for rate in rates {
                    if rate.provider_calendar.as_deref() != Some("PEAK_OFF_PEAK") {
                        continue;
                    }
                    let Some(price) = rate
                        .price_per_unit_with_taxes
                        .as_ref()
                        .and_then(value_as_f64)
                    else {
                        continue;
                    };
                    let hc = &mut tariffs.electricity.hc_cents;
                    if hc.is_none_or(|current| price < current) {
                        *hc = Some(price);
                    }
                    let hp = &mut tariffs.electricity.hp_cents;
                    if hp.is_none_or(|current| price > current) {
                        *hp = Some(price);
                    }
                }
            }
            Some(LedgerKind::Gas) => {
                for rate in rates {
                    if rate.price_level == Some(1) {
                        tariffs.gas.price_cents =
                            rate.price_per_unit.as_ref().and_then(value_as_f64);
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    tariffs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth_error() {
        let errors = vec![GraphQlError {
            message: "Signature of the JWT has expired".to_string(),
        }];
        assert!(is_auth_error(&errors));

        let errors = vec![GraphQlError {
            message: "Field does not exist".to_string(),
        }];
        assert!(!is_auth_error(&errors));
    }

    #[test]
    fn test_parse_errors() {
        let envelope = serde_json::json!({
            "errors": [{"message": "boom"}],
            "data": null
        });
        let errors = parse_errors(&envelope);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "boom");

        assert!(parse_errors(&serde_json::json!({"data": {}})).is_empty());
    }
}
