//! Derivation of typed sensor values from an account snapshot.
//!
//! Mirrors the device split of the account: balance and bill sensors on the
//! account device, consumption/index/tariff/contract sensors per electricity
//! and gas meter, plus the off-peak binary sensor. Terminated electricity
//! meters (distributor status RESIL or LIMI) are excluded.

use crate::octopus::types::{
    AccountSnapshot, ElectricityMeterPoint, ElectricityReading, GasMeterPoint, GasReading,
    LedgerKind,
};
use crate::offpeak::OffPeakSchedule;
use serde::Serialize;
use serde_json::{Map, Value, json};

const DOMAIN: &str = "pieuvre";

/// Which device a sensor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Account,
    ElectricityMeter,
    GasMeter,
}

/// Sensor state value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorState {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// One derived sensor value with its attributes
#[derive(Debug, Clone, Serialize)]
pub struct SensorValue {
    /// Stable identifier, e.g. "pieuvre_PRM123_consumption_hp"
    pub unique_id: String,
    pub name: String,
    pub device: DeviceKind,
    /// Account number, PRM or PCE
    pub device_id: String,
    pub state: SensorState,
    pub unit: Option<&'static str>,
    pub attributes: Map<String, Value>,
}

impl SensorValue {
    fn new(
        device: DeviceKind,
        device_id: &str,
        key: &str,
        name: &str,
        state: SensorState,
        unit: Option<&'static str>,
    ) -> Self {
        Self {
            unique_id: format!("{}_{}_{}", DOMAIN, device_id, key),
            name: name.to_string(),
            device,
            device_id: device_id.to_string(),
            state,
            unit,
            attributes: Map::new(),
        }
    }

    fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Numeric state, when the sensor carries one
    pub fn as_number(&self) -> Option<f64> {
        match self.state {
            SensorState::Number(n) => Some(n),
            _ => None,
        }
    }
}

/// Map a full account snapshot into sensor values
pub fn map_snapshot(
    snapshot: &AccountSnapshot,
    gas_conversion_factor: f64,
    tz: chrono_tz::Tz,
) -> Vec<SensorValue> {
    let mut sensors = Vec::new();

    map_ledger_sensors(snapshot, &mut sensors);

    for meter in &snapshot.account.electricity_meters {
        if meter.is_terminated() {
            continue;
        }
        let readings = snapshot
            .electricity_readings
            .get(&meter.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        map_electricity_sensors(snapshot, meter, readings, tz, &mut sensors);
    }

    for meter in &snapshot.account.gas_meters {
        let readings = snapshot
            .gas_readings
            .get(&meter.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        map_gas_sensors(snapshot, meter, readings, gas_conversion_factor, &mut sensors);
    }

    sensors
}

fn map_ledger_sensors(snapshot: &AccountSnapshot, sensors: &mut Vec<SensorValue>) {
    let account_number = &snapshot.account.account_number;
    let ledger_sensors = [
        (LedgerKind::Pot, "pot_ledger", "Cagnotte"),
        (LedgerKind::Electricity, "electricity_ledger", "Solde électricité"),
        (LedgerKind::Gas, "gas_ledger", "Solde gaz"),
    ];

    for (kind, key, name) in ledger_sensors {
        let Some(ledger) = snapshot.account.ledgers.get(&kind) else {
            continue;
        };
        let Some(balance) = ledger.balance_euros() else {
            continue;
        };
        let mut attributes = Map::new();
        attributes.insert("ledger_number".to_string(), json!(ledger.number));
        attributes.insert("ledger_name".to_string(), json!(ledger.name));
        attributes.insert("balance_cents".to_string(), json!(ledger.balance_cents));
        sensors.push(
            SensorValue::new(
                DeviceKind::Account,
                account_number,
                key,
                name,
                SensorState::Number(balance),
                Some("€"),
            )
            .with_attributes(attributes),
        );
    }

    let bill_sensors = [
        (LedgerKind::Electricity, "electricity_bill", "Facture électricité"),
        (LedgerKind::Gas, "gas_bill", "Facture gaz"),
    ];

    for (kind, key, name) in bill_sensors {
        let Some(payment) = snapshot.payment_requests.get(&kind) else {
            continue;
        };
        let Some(customer_cents) = payment.customer_amount else {
            continue;
        };
        let mut attributes = Map::new();
        attributes.insert("payment_status".to_string(), json!(payment.payment_status));
        attributes.insert(
            "total_amount".to_string(),
            json!(format!(
                "{:.2} €",
                payment.total_amount.unwrap_or(0) as f64 / 100.0
            )),
        );
        attributes.insert(
            "customer_amount".to_string(),
            json!(format!("{:.2} €", customer_cents as f64 / 100.0)),
        );
        attributes.insert(
            "expected_payment_date".to_string(),
            json!(payment.expected_payment_date),
        );
        sensors.push(
            SensorValue::new(
                DeviceKind::Account,
                account_number,
                key,
                name,
                SensorState::Number(customer_cents as f64 / 100.0),
                Some("€"),
            )
            .with_attributes(attributes),
        );
    }
}

fn map_electricity_sensors(
    snapshot: &AccountSnapshot,
    meter: &ElectricityMeterPoint,
    readings: &[ElectricityReading],
    tz: chrono_tz::Tz,
    sensors: &mut Vec<SensorValue>,
) {
    // Readings arrive newest first; keep the latest per calendar temp class
    let latest_hp = readings
        .iter()
        .find(|r| r.calendar_temp_class.as_deref() == Some("HP"));
    let latest_hc = readings
        .iter()
        .find(|r| r.calendar_temp_class.as_deref() == Some("HC"));

    let reading_sensors = [
        ("consumption_hp", "Consommation HP", latest_hp, true),
        ("consumption_hc", "Consommation HC", latest_hc, true),
        ("index_hp", "Index HP", latest_hp, false),
        ("index_hc", "Index HC", latest_hc, false),
    ];
    for (key, name, reading, is_consumption) in reading_sensors {
        let Some(reading) = reading else { continue };
        let value = if is_consumption {
            reading.consumption
        } else {
            reading.index_end_value
        };
        let Some(value) = value else { continue };
        sensors.push(
            SensorValue::new(
                DeviceKind::ElectricityMeter,
                &meter.id,
                key,
                name,
                SensorState::Number(value),
                Some("kWh"),
            )
            .with_attributes(electricity_reading_attributes(reading)),
        );
    }

    let tariff_sensors = [
        ("tarif_hp", "Tarif HP", snapshot.tariffs.electricity.hp_cents),
        ("tarif_hc", "Tarif HC", snapshot.tariffs.electricity.hc_cents),
    ];
    for (key, name, cents) in tariff_sensors {
        let Some(cents) = cents else { continue };
        sensors.push(SensorValue::new(
            DeviceKind::ElectricityMeter,
            &meter.id,
            key,
            name,
            SensorState::Number(round4(cents / 100.0)),
            Some("€/kWh"),
        ));
    }

    let mut contract_attributes = Map::new();
    if let Some(ledger) = snapshot.account.ledgers.get(&LedgerKind::Electricity) {
        contract_attributes.insert("ledger_id".to_string(), json!(ledger.number));
    }
    contract_attributes.insert("prm_id".to_string(), json!(meter.id));
    contract_attributes.insert(
        "distributor_status".to_string(),
        json!(meter.distributor_status),
    );
    contract_attributes.insert("meter_kind".to_string(), json!(meter.meter_kind));
    if let Some(power) = &meter.subscribed_max_power {
        contract_attributes.insert(
            "subscribed_max_power".to_string(),
            json!(format!("{} kVA", stringify_scalar(power))),
        );
    }
    contract_attributes.insert("is_teleoperable".to_string(), json!(meter.is_teleoperable));
    contract_attributes.insert("off_peak_label".to_string(), json!(meter.off_peak_label));
    contract_attributes.insert("powered_status".to_string(), json!(meter.powered_status));
    sensors.push(
        SensorValue::new(
            DeviceKind::ElectricityMeter,
            &meter.id,
            "contrat",
            "Contrat",
            SensorState::Text(meter.contract_status_label()),
            None,
        )
        .with_attributes(contract_attributes),
    );

    if let Some(label) = &meter.off_peak_label {
        let schedule = OffPeakSchedule::parse(label);
        if !schedule.is_empty() {
            sensors.push(off_peak_sensor(&meter.id, &schedule, tz));
        }
    }
}

/// Binary sensor: is "now" inside an off-peak range for this meter
fn off_peak_sensor(prm_id: &str, schedule: &OffPeakSchedule, tz: chrono_tz::Tz) -> SensorValue {
    let mut attributes = Map::new();
    attributes.insert("hc_schedule_available".to_string(), json!(true));
    attributes.insert("total_hc_hours".to_string(), json!(schedule.total_hours()));
    attributes.insert(
        "hc_type".to_string(),
        json!(schedule.kind.clone().unwrap_or_else(|| "Unknown".to_string())),
    );
    for (i, range) in schedule.ranges.iter().enumerate() {
        attributes.insert(
            format!("hc_range_{}", i + 1),
            json!(format!("{} - {}", range.start_hhmm(), range.end_hhmm())),
        );
    }

    SensorValue::new(
        DeviceKind::ElectricityMeter,
        prm_id,
        "hc_active",
        "Heures creuses actives",
        SensorState::Bool(schedule.is_active_now(tz)),
        None,
    )
    .with_attributes(attributes)
}

fn map_gas_sensors(
    snapshot: &AccountSnapshot,
    meter: &GasMeterPoint,
    readings: &[GasReading],
    conversion_factor: f64,
    sensors: &mut Vec<SensorValue>,
) {
    // Newest reading first
    if let Some(latest) = readings.first() {
        if let Some(consumption_m3) = latest.consumption {
            let mut attributes = gas_reading_attributes(latest);
            attributes.insert("consumption_m3".to_string(), json!(consumption_m3));
            attributes.insert("conversion_factor".to_string(), json!(conversion_factor));
            sensors.push(
                SensorValue::new(
                    DeviceKind::GasMeter,
                    &meter.id,
                    "consumption",
                    "Consommation",
                    SensorState::Number(consumption_m3 * conversion_factor),
                    Some("kWh"),
                )
                .with_attributes(attributes),
            );
        }
        if let Some(index_m3) = latest.index_end_value {
            let mut attributes = gas_reading_attributes(latest);
            attributes.insert("index_m3".to_string(), json!(index_m3));
            attributes.insert("conversion_factor".to_string(), json!(conversion_factor));
            sensors.push(
                SensorValue::new(
                    DeviceKind::GasMeter,
                    &meter.id,
                    "index",
                    "Index",
                    SensorState::Number(index_m3 * conversion_factor),
                    Some("kWh"),
                )
                .with_attributes(attributes),
            );
        }
    }

    if let Some(cents) = snapshot.tariffs.gas.price_cents {
        sensors.push(SensorValue::new(
            DeviceKind::GasMeter,
            &meter.id,
            "tarif",
            "Tarif",
            SensorState::Number(round4(cents / 100.0)),
            Some("€/kWh"),
        ));
    }

    let mut contract_attributes = Map::new();
    if let Some(ledger) = snapshot.account.ledgers.get(&LedgerKind::Gas) {
        contract_attributes.insert("ledger_id".to_string(), json!(ledger.number));
    }
    contract_attributes.insert("pce_ref".to_string(), json!(meter.id));
    contract_attributes.insert("gas_nature".to_string(), json!(meter.gas_nature));
    if let Some(annual) = &meter.annual_consumption {
        contract_attributes.insert(
            "annual_consumption".to_string(),
            json!(format!("{} kWh", stringify_scalar(annual))),
        );
    }
    contract_attributes.insert("is_smart_meter".to_string(), json!(meter.is_smart_meter));
    contract_attributes.insert("powered_status".to_string(), json!(meter.powered_status));
    contract_attributes.insert("price_level".to_string(), json!(meter.price_level));
    contract_attributes.insert("tariff_option".to_string(), json!(meter.tariff_option));
    sensors.push(
        SensorValue::new(
            DeviceKind::GasMeter,
            &meter.id,
            "contrat",
            "Contrat",
            SensorState::Text(meter.contract_status_label()),
            None,
        )
        .with_attributes(contract_attributes),
    );
}

fn electricity_reading_attributes(reading: &ElectricityReading) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("period_start".to_string(), json!(reading.period_start_at));
    attributes.insert("period_end".to_string(), json!(reading.period_end_at));
    attributes.insert(
        "reliability".to_string(),
        json!(reading.consumption_reliability),
    );
    attributes.insert("status".to_string(), json!(reading.status_processed));
    attributes
}

fn gas_reading_attributes(reading: &GasReading) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("period_start".to_string(), json!(reading.period_start_at));
    attributes.insert("period_end".to_string(), json!(reading.period_end_at));
    attributes.insert("reading_date".to_string(), json!(reading.reading_date));
    attributes.insert("reading_type".to_string(), json!(reading.reading_type));
    attributes.insert("status".to_string(), json!(reading.status_processed));
    attributes
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Render a JSON scalar without surrounding quotes
fn stringify_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round4() {
        assert!((round4(0.123_456) - 0.1235).abs() < 1e-9);
        assert!((round4(2251.0 / 10_000.0) - 0.2251).abs() < 1e-9);
    }

    #[test]
    fn test_stringify_scalar() {
        assert_eq!(stringify_scalar(&json!("6")), "6");
        assert_eq!(stringify_scalar(&json!(6)), "6");
    }
}
