//! Wire and domain types for the Kraken France API.
//!
//! Wire structs mirror the GraphQL response shapes (camelCase, connection
//! envelopes). Domain types are the normalized view the rest of the crate
//! consumes: ledgers keyed by kind, meter points split per energy, balances
//! kept in cents until display.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// GraphQL error entry
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
}

/// Relay-style connection wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

/// Relay-style edge wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: Option<T>,
}

impl<T> Connection<T> {
    /// Flatten edges into their nodes, dropping null entries
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().filter_map(|e| e.node).collect()
    }
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

// ---- accounts query ----

/// Ledger entry as returned by the accounts query
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub balance: Option<i64>,
    pub ledger_type: Option<String>,
    pub name: Option<String>,
    pub number: Option<String>,
    pub id: Option<String>,
}

/// Account entry as returned by the accounts query
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSummary {
    pub number: String,
    #[serde(default)]
    pub ledgers: Vec<LedgerSummary>,
}

// ---- account data query ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNode {
    pub number: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyNode>,
    pub credit_storage: Option<CreditStorage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyNode {
    pub address: Option<String>,
    #[serde(default)]
    pub supply_points: Option<Connection<SupplyPointNode>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyPointNode {
    pub meter_point: Option<MeterPoint>,
}

/// Credit storage container; the ledger field is an object or a list
#[derive(Debug, Clone, Deserialize)]
pub struct CreditStorage {
    pub ledger: Option<Value>,
}

/// Ledger entry under creditStorage
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditLedger {
    pub current_balance: Option<i64>,
    pub ledger_type: Option<String>,
    pub name: Option<String>,
    pub number: Option<String>,
}

/// Meter point union; gas is matched first on its required `gasNature`,
/// electricity on its required `distributorStatus`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MeterPoint {
    Gas(GasMeterPoint),
    Electricity(ElectricityMeterPoint),
    Other(Value),
}

/// Electricity supply point (PRM) contract metadata
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectricityMeterPoint {
    /// PRM identifier
    pub id: String,
    /// Distributor contract status (SERVC, RESIL, LIMI)
    pub distributor_status: String,
    pub meter_kind: Option<String>,
    pub subscribed_max_power: Option<Value>,
    pub is_teleoperable: Option<bool>,
    /// Distributor off-peak label, e.g. "HC (0H50-6H50, 12H20-14H20)"
    pub off_peak_label: Option<String>,
    pub powered_status: Option<String>,
    pub provider_calendar_id: Option<Value>,
    pub provider_calendar_name: Option<String>,
}

impl ElectricityMeterPoint {
    /// Terminated meters are excluded from all derived sensors
    pub fn is_terminated(&self) -> bool {
        matches!(self.distributor_status.as_str(), "RESIL" | "LIMI")
    }

    /// Human-readable contract status
    pub fn contract_status_label(&self) -> String {
        match self.distributor_status.as_str() {
            "SERVC" => "En service".to_string(),
            "RESIL" => "Résilié".to_string(),
            other => other.to_string(),
        }
    }
}

/// Gas supply point (PCE) contract metadata
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasMeterPoint {
    /// PCE reference
    pub id: String,
    pub gas_nature: String,
    pub annual_consumption: Option<Value>,
    pub is_smart_meter: Option<bool>,
    pub powered_status: Option<String>,
    pub price_level: Option<Value>,
    pub tariff_option: Option<String>,
}

impl GasMeterPoint {
    /// Human-readable contract status derived from the powered state
    pub fn contract_status_label(&self) -> String {
        match self.powered_status.as_deref() {
            Some("non_coupe") => "En service".to_string(),
            Some("coupe") => "Coupé".to_string(),
            Some(other) => other.to_string(),
            None => "Inconnu".to_string(),
        }
    }
}

// ---- readings ----

/// Daily electricity reading for one calendar temp class (HP or HC)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectricityReading {
    pub index_start_value: Option<f64>,
    pub index_end_value: Option<f64>,
    pub calendar_type: Option<String>,
    /// "HP" (peak) or "HC" (off-peak)
    pub calendar_temp_class: Option<String>,
    pub consumption: Option<f64>,
    /// REAL or ESTIMATED
    pub consumption_reliability: Option<String>,
    pub status_processed: Option<String>,
    pub period_end_at: Option<String>,
    pub period_start_at: Option<String>,
}

/// Periodic gas reading; index and consumption in cubic meters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasReading {
    pub consumption: Option<f64>,
    pub index_end_value: Option<f64>,
    pub index_start_value: Option<f64>,
    pub period_end_at: Option<String>,
    pub period_start_at: Option<String>,
    pub reading_date: Option<String>,
    pub reading_type: Option<String>,
    pub status_processed: Option<String>,
}

// ---- payment requests ----

/// Latest payment request for a ledger; amounts in cents
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payment_status: Option<String>,
    pub total_amount: Option<i64>,
    pub customer_amount: Option<i64>,
    pub expected_payment_date: Option<String>,
}

// ---- tariffs ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementNode {
    pub is_active: Option<bool>,
    pub charging_ledger: Option<ChargingLedger>,
    pub product: Option<ProductNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingLedger {
    pub ledger_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductNode {
    pub consumption_rates: Option<Connection<RateNode>>,
}

/// Consumption rate; prices arrive as numbers or decimal strings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateNode {
    pub price_per_unit: Option<Value>,
    pub price_per_unit_with_taxes: Option<Value>,
    pub provider_calendar: Option<String>,
    pub price_level: Option<i64>,
    pub currency: Option<String>,
}

/// Coerce a JSON number or decimal string into f64
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// ---- domain types ----

/// Normalized ledger kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LedgerKind {
    Pot,
    Electricity,
    Gas,
}

impl LedgerKind {
    /// Map the API ledger type strings (long and short forms)
    pub fn from_api(s: &str) -> Option<Self> {
        match s {
            "POT_LEDGER" | "CREDIT" => Some(Self::Pot),
            "FRA_ELECTRICITY_LEDGER" | "ELECTRICITY" => Some(Self::Electricity),
            "FRA_GAS_LEDGER" | "GAS" => Some(Self::Gas),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pot => "pot",
            Self::Electricity => "electricity",
            Self::Gas => "gas",
        }
    }
}

/// Normalized ledger with its balance in cents
#[derive(Debug, Clone)]
pub struct Ledger {
    pub kind: LedgerKind,
    pub balance_cents: Option<i64>,
    pub name: String,
    pub number: String,
}

impl Ledger {
    /// Balance converted from cents to euros
    pub fn balance_euros(&self) -> Option<f64> {
        self.balance_cents.map(|c| c as f64 / 100.0)
    }
}

/// Electricity unit prices in cents per kWh, taxes included
#[derive(Debug, Clone, Default)]
pub struct ElectricityTariff {
    pub hp_cents: Option<f64>,
    pub hc_cents: Option<f64>,
}

/// Gas unit price in cents per kWh
#[derive(Debug, Clone, Default)]
pub struct GasTariff {
    pub price_cents: Option<f64>,
}

/// Active tariffs per energy
#[derive(Debug, Clone, Default)]
pub struct Tariffs {
    pub electricity: ElectricityTariff,
    pub gas: GasTariff,
}

/// Account detail before readings and tariffs are attached
#[derive(Debug, Clone)]
pub struct AccountData {
    pub account_number: String,
    pub address: Option<String>,
    pub ledgers: HashMap<LedgerKind, Ledger>,
    pub electricity_meters: Vec<ElectricityMeterPoint>,
    pub gas_meters: Vec<GasMeterPoint>,
}

/// Everything one poll cycle fetched for an account
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub account: AccountData,
    /// Readings keyed by PRM
    pub electricity_readings: HashMap<String, Vec<ElectricityReading>>,
    /// Readings keyed by PCE
    pub gas_readings: HashMap<String, Vec<GasReading>>,
    pub tariffs: Tariffs,
    /// Latest payment request per ledger kind
    pub payment_requests: HashMap<LedgerKind, PaymentRequest>,
}
