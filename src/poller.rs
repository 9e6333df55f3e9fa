//! Account poller
//!
//! This module contains the periodic fetch loop that drives the rest of the
//! system: it authenticates against the Kraken API, pulls account data,
//! readings, tariffs and payment requests, derives sensor values, imports
//! long-term statistics and publishes a snapshot for the web API.

use crate::config::Config;
use crate::error::Result;
use crate::logging::{LogContext, get_logger, get_logger_with_context};
use crate::octopus::OctopusClient;
use crate::octopus::types::{AccountSnapshot, LedgerKind, LedgerSummary};
use crate::offpeak::OffPeakSchedule;
use crate::sensors::{self, SensorValue};
use crate::statistics::{StatisticPeriod, StatisticsStore, statistic_id};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, interval};

/// Commands accepted by the poller from external components (web, signals)
#[derive(Debug, Clone)]
pub enum PollerCommand {
    /// Refresh immediately and restart the poll interval
    ForceUpdate,
    Shutdown,
}

/// Published state of the last poll cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollerSnapshot {
    pub timestamp: Option<DateTime<Utc>>,
    pub account_number: Option<String>,
    pub sensors: Vec<SensorValue>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub total_polls: u64,
    pub poll_interval_minutes: u64,
    /// Off-peak schedule per PRM, re-evaluated against the clock at read time
    pub off_peak_schedules: HashMap<String, OffPeakSchedule>,
}

/// Periodic account poller
pub struct AccountPoller {
    config: Config,
    client: OctopusClient,
    statistics: StatisticsStore,
    commands_rx: mpsc::UnboundedReceiver<PollerCommand>,
    snapshot_tx: watch::Sender<Arc<PollerSnapshot>>,
    logger: crate::logging::StructuredLogger,

    account_number: Option<String>,
    summary_ledgers: Vec<LedgerSummary>,
    last_success: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    total_polls: u64,
}

impl AccountPoller {
    /// Create a new poller from a validated configuration. Initializes
    /// logging and the statistics store, and returns the receiver side of the
    /// snapshot channel. Out-of-bounds settings are rejected here so they
    /// never reach the poll loop.
    pub fn new(
        config: Config,
        commands_rx: mpsc::UnboundedReceiver<PollerCommand>,
    ) -> Result<(Self, watch::Receiver<Arc<PollerSnapshot>>)> {
        config.validate()?;

        crate::logging::init_logging(&config.logging)?;

        let logger = get_logger("poller");
        logger.info("Initializing account poller");

        let client = OctopusClient::new(&config)?;
        let statistics = StatisticsStore::load(&config.statistics.path).unwrap_or_else(|e| {
            logger.warn(&format!(
                "Could not load statistics store ({}), starting empty",
                e
            ));
            StatisticsStore::new(&config.statistics.path)
        });

        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(PollerSnapshot {
            poll_interval_minutes: config.poll_interval_minutes,
            ..PollerSnapshot::default()
        }));

        Ok((
            Self {
                config,
                client,
                statistics,
                commands_rx,
                snapshot_tx,
                logger,
                account_number: None,
                summary_ledgers: Vec::new(),
                last_success: None,
                consecutive_failures: 0,
                total_polls: 0,
            },
            snapshot_rx,
        ))
    }

    /// Main poll loop. Runs until a shutdown command arrives.
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info(&format!(
            "Starting poll loop (every {} minutes)",
            self.config.poll_interval_minutes
        ));

        let mut poll_interval = interval(Duration::from_secs(
            self.config.poll_interval_minutes * 60,
        ));

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if let Err(e) = self.poll_cycle().await {
                        self.logger.error(&format!("Poll cycle failed: {}", e));
                        // Keep the cadence even on errors
                    }
                }
                cmd = self.commands_rx.recv() => {
                    match cmd {
                        Some(PollerCommand::ForceUpdate) => {
                            self.logger.info("Force update requested");
                            if let Err(e) = self.poll_cycle().await {
                                self.logger.error(&format!("Forced poll failed: {}", e));
                            }
                            // The interval restarts from now
                            poll_interval.reset();
                        }
                        Some(PollerCommand::Shutdown) | None => {
                            self.logger.info("Shutdown signal received");
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Err(e) = self.statistics.save() {
            self.logger
                .warn(&format!("Could not save statistics on shutdown: {}", e));
        }
        self.logger.info("Poller stopped");
        Ok(())
    }

    /// Single polling cycle
    async fn poll_cycle(&mut self) -> Result<()> {
        self.logger.debug("Starting poll cycle");
        self.total_polls += 1;

        let result = self.refresh().await;
        match &result {
            Ok(()) => {
                self.last_success = Some(Utc::now());
                self.consecutive_failures = 0;
            }
            Err(_) => {
                self.consecutive_failures += 1;
                // Keep the last good sensor values and schedules visible
                let (sensors, schedules) = {
                    let previous = self.snapshot_tx.borrow();
                    (previous.sensors.clone(), previous.off_peak_schedules.clone())
                };
                self.publish(sensors, schedules);
            }
        }
        result
    }

    /// Resolve the account number to poll. Uses the configured one when it
    /// exists on the user, otherwise the first account returned by the API.
    async fn resolve_account(&mut self) -> Result<String> {
        let accounts = self.client.get_accounts().await?;
        if accounts.is_empty() {
            return Err(crate::error::PieuvreError::api(
                "No accounts found for these credentials",
            ));
        }

        let chosen = match self.config.account_number.as_deref() {
            Some(wanted) if accounts.iter().any(|a| a.number == wanted) => wanted.to_string(),
            Some(wanted) => {
                self.logger.warn(&format!(
                    "Configured account {} not found, using {}",
                    wanted, accounts[0].number
                ));
                accounts[0].number.clone()
            }
            None => accounts[0].number.clone(),
        };

        self.summary_ledgers = accounts
            .into_iter()
            .find(|a| a.number == chosen)
            .map(|a| a.ledgers)
            .unwrap_or_default();

        // From here on, log lines carry the account being polled
        self.logger = get_logger_with_context(
            LogContext::new("poller").with_account_number(chosen.clone()),
        );
        self.logger.info("Account resolved");
        Ok(chosen)
    }

    /// Fetch everything for the account and publish the derived sensors
    async fn refresh(&mut self) -> Result<()> {
        if self.account_number.is_none() {
            self.account_number = Some(self.resolve_account().await?);
        }
        let account_number = self
            .account_number
            .clone()
            .unwrap_or_default();

        let account = self
            .client
            .get_account_data(&account_number, &self.summary_ledgers)
            .await?;

        // Per-section failures degrade the snapshot instead of failing the cycle
        let mut electricity_readings = HashMap::new();
        for meter in &account.electricity_meters {
            if meter.is_terminated() {
                continue;
            }
            match self
                .client
                .get_electricity_readings(&account_number, &meter.id)
                .await
            {
                Ok(readings) => {
                    electricity_readings.insert(meter.id.clone(), readings);
                }
                Err(e) => self.logger.warn(&format!(
                    "Could not fetch electricity readings for {}: {}",
                    meter.id, e
                )),
            }
        }

        let mut gas_readings = HashMap::new();
        for meter in &account.gas_meters {
            match self
                .client
                .get_gas_readings(&account_number, &meter.id)
                .await
            {
                Ok(readings) => {
                    gas_readings.insert(meter.id.clone(), readings);
                }
                Err(e) => self.logger.warn(&format!(
                    "Could not fetch gas readings for {}: {}",
                    meter.id, e
                )),
            }
        }

        let tariffs = match self.client.get_tariffs(&account_number).await {
            Ok(tariffs) => tariffs,
            Err(e) => {
                self.logger.warn(&format!("Could not fetch tariffs: {}", e));
                Default::default()
            }
        };

        let mut payment_requests = HashMap::new();
        for kind in [LedgerKind::Electricity, LedgerKind::Gas] {
            let Some(ledger) = account.ledgers.get(&kind) else {
                continue;
            };
            if ledger.number.is_empty() {
                continue;
            }
            match self.client.get_payment_request(&ledger.number).await {
                Ok(Some(payment)) => {
                    payment_requests.insert(kind, payment);
                }
                Ok(None) => {}
                Err(e) => self.logger.warn(&format!(
                    "Could not fetch payment request for {} ledger: {}",
                    kind.as_str(),
                    e
                )),
            }
        }

        let snapshot = AccountSnapshot {
            account,
            electricity_readings,
            gas_readings,
            tariffs,
            payment_requests,
        };

        self.import_statistics(&snapshot);
        if let Err(e) = self.statistics.save() {
            self.logger
                .warn(&format!("Could not save statistics: {}", e));
        }

        let tz = self
            .config
            .parsed_timezone()
            .unwrap_or(chrono_tz::Europe::Paris);
        let sensors = sensors::map_snapshot(&snapshot, self.config.gas.conversion_factor, tz);
        let schedules = off_peak_schedules(&snapshot);
        self.logger
            .info(&format!("Poll complete, {} sensors derived", sensors.len()));
        self.publish(sensors, schedules);
        Ok(())
    }

    /// Append consumption history into the statistics store
    fn import_statistics(&mut self, snapshot: &AccountSnapshot) {
        for (prm_id, readings) in &snapshot.electricity_readings {
            for class in ["HP", "HC"] {
                let periods: Vec<StatisticPeriod> = readings
                    .iter()
                    .filter(|r| r.calendar_temp_class.as_deref() == Some(class))
                    .filter_map(|r| {
                        Some(StatisticPeriod {
                            period_start: parse_timestamp(r.period_start_at.as_deref()?)?,
                            period_end: parse_timestamp(r.period_end_at.as_deref()?)?,
                            value: r.consumption?,
                        })
                    })
                    .collect();
                let id = statistic_id(prm_id, &format!("consumption_{}", class.to_lowercase()));
                self.statistics.import(&id, &periods);
            }
        }

        let factor = self.config.gas.conversion_factor;
        for (pce_ref, readings) in &snapshot.gas_readings {
            let periods: Vec<StatisticPeriod> = readings
                .iter()
                .filter_map(|r| {
                    Some(StatisticPeriod {
                        period_start: parse_timestamp(r.period_start_at.as_deref()?)?,
                        period_end: parse_timestamp(r.period_end_at.as_deref()?)?,
                        value: r.consumption? * factor,
                    })
                })
                .collect();
            let id = statistic_id(pce_ref, "consumption");
            self.statistics.import(&id, &periods);
        }
    }

    /// Publish the latest snapshot on the watch channel
    fn publish(&self, sensors: Vec<SensorValue>, schedules: HashMap<String, OffPeakSchedule>) {
        let snapshot = PollerSnapshot {
            timestamp: Some(Utc::now()),
            account_number: self.account_number.clone(),
            sensors,
            last_success: self.last_success,
            consecutive_failures: self.consecutive_failures,
            total_polls: self.total_polls,
            poll_interval_minutes: self.config.poll_interval_minutes,
            off_peak_schedules: schedules,
        };
        self.snapshot_tx.send(Arc::new(snapshot)).ok();
    }
}

/// Parsed off-peak schedules for the active electricity meters
fn off_peak_schedules(snapshot: &AccountSnapshot) -> HashMap<String, OffPeakSchedule> {
    snapshot
        .account
        .electricity_meters
        .iter()
        .filter(|m| !m.is_terminated())
        .filter_map(|m| {
            let schedule = OffPeakSchedule::parse(m.off_peak_label.as_deref()?);
            (!schedule.is_empty()).then(|| (m.id.clone(), schedule))
        })
        .collect()
}

/// Parse an API timestamp (RFC 3339, with or without offset)
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2025-01-15T00:00:00+01:00").is_some());
        assert!(parse_timestamp("2025-01-15T00:00:00").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_off_peak_schedules_skip_terminated_and_unlabeled() {
        let snapshot = AccountSnapshot {
            account: crate::octopus::types::AccountData {
                account_number: "A-1".to_string(),
                address: None,
                ledgers: HashMap::new(),
                electricity_meters: vec![
                    serde_json::from_value(serde_json::json!({
                        "id": "PRM1", "distributorStatus": "SERVC",
                        "offPeakLabel": "HC (0H50-6H50)"
                    }))
                    .unwrap(),
                    serde_json::from_value(serde_json::json!({
                        "id": "PRM2", "distributorStatus": "RESIL",
                        "offPeakLabel": "HC (0H50-6H50)"
                    }))
                    .unwrap(),
                    serde_json::from_value(serde_json::json!({
                        "id": "PRM3", "distributorStatus": "SERVC"
                    }))
                    .unwrap(),
                ],
                gas_meters: Vec::new(),
            },
            electricity_readings: HashMap::new(),
            gas_readings: HashMap::new(),
            tariffs: Default::default(),
            payment_requests: HashMap::new(),
        };

        let schedules = off_peak_schedules(&snapshot);
        assert_eq!(schedules.len(), 1);
        assert!(schedules.contains_key("PRM1"));
    }

    #[test]
    fn test_out_of_bounds_config_rejected() {
        let mut config = Config::default();
        config.credentials.email = "user@example.com".to_string();
        config.credentials.password = "secret".to_string();
        config.poll_interval_minutes = 0;
        config.gas.conversion_factor = 99.0;

        let (_tx, rx) = mpsc::unbounded_channel();
        let result = AccountPoller::new(config, rx);
        assert!(matches!(
            result,
            Err(crate::error::PieuvreError::Validation { .. })
        ));
    }
}
