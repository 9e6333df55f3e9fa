use pieuvre::octopus::client::{extract_tariffs, is_auth_error, merge_ledgers, parse_account_data, parse_errors};
use pieuvre::octopus::types::{AgreementNode, CreditLedger, LedgerKind, LedgerSummary};
use serde_json::json;

#[test]
fn account_data_splits_meters_per_energy() {
    let account = json!({
        "number": "A-1",
        "properties": [{
            "address": "1 rue de la Paix, Paris",
            "supplyPoints": {
                "edges": [
                    {"node": {"meterPoint": {
                        "id": "PRM1", "distributorStatus": "SERVC", "meterKind": "LINKY"
                    }}},
                    {"node": {"meterPoint": {
                        "id": "PCE1", "gasNature": "NATURAL", "isSmartMeter": true
                    }}},
                    {"node": {"meterPoint": null}}
                ]
            }
        }],
        "creditStorage": {
            "ledger": {"currentBalance": 2500, "ledgerType": "POT_LEDGER",
                        "name": "Cagnotte", "number": "L1"}
        }
    });

    let data = parse_account_data(account, "A-1", &[]).unwrap();
    assert_eq!(data.account_number, "A-1");
    assert_eq!(data.address.as_deref(), Some("1 rue de la Paix, Paris"));
    assert_eq!(data.electricity_meters.len(), 1);
    assert_eq!(data.gas_meters.len(), 1);

    let pot = data.ledgers.get(&LedgerKind::Pot).unwrap();
    assert_eq!(pot.balance_cents, Some(2500));
    assert_eq!(pot.balance_euros(), Some(25.0));
}

#[test]
fn credit_storage_ledger_list_accepted() {
    let account = json!({
        "number": "A-1",
        "properties": [],
        "creditStorage": {
            "ledger": [
                {"currentBalance": 100, "ledgerType": "POT_LEDGER", "number": "L1"},
                {"currentBalance": 200, "ledgerType": "FRA_GAS_LEDGER", "number": "L2"}
            ]
        }
    });

    let data = parse_account_data(account, "A-1", &[]).unwrap();
    assert_eq!(data.ledgers.len(), 2);
    assert_eq!(
        data.ledgers.get(&LedgerKind::Gas).unwrap().balance_cents,
        Some(200)
    );
}

#[test]
fn summary_ledgers_fill_missing_kinds_only() {
    let credit = vec![CreditLedger {
        current_balance: Some(100),
        ledger_type: Some("ELECTRICITY".to_string()),
        name: Some("Elec".to_string()),
        number: Some("L-CS".to_string()),
    }];
    let summaries: Vec<LedgerSummary> = serde_json::from_value(json!([
        {"balance": 999, "ledgerType": "FRA_ELECTRICITY_LEDGER", "number": "L-SUM"},
        {"balance": -300, "ledgerType": "FRA_GAS_LEDGER", "number": "L-GAS"}
    ]))
    .unwrap();

    let merged = merge_ledgers(credit, &summaries);

    // Credit storage wins for electricity
    assert_eq!(
        merged.get(&LedgerKind::Electricity).unwrap().number,
        "L-CS"
    );
    // Gas only exists in the summary
    assert_eq!(
        merged.get(&LedgerKind::Gas).unwrap().balance_cents,
        Some(-300)
    );
}

#[test]
fn tariffs_pick_min_hc_max_hp_and_gas_level_one() {
    let agreements: Vec<AgreementNode> = serde_json::from_value(json!([
        {
            "isActive": true,
            "chargingLedger": {"ledgerType": "FRA_ELECTRICITY_LEDGER"},
            "product": {"consumptionRates": {"edges": [
                {"node": {"providerCalendar": "PEAK_OFF_PEAK",
                          "pricePerUnitWithTaxes": "20.40"}},
                {"node": {"providerCalendar": "PEAK_OFF_PEAK",
                          "pricePerUnitWithTaxes": 27.0}},
                {"node": {"providerCalendar": "BASE",
                          "pricePerUnitWithTaxes": 1.0}}
            ]}}
        },
        {
            "isActive": true,
            "chargingLedger": {"ledgerType": "FRA_GAS_LEDGER"},
            "product": {"consumptionRates": {"edges": [
                {"node": {"priceLevel": 0, "pricePerUnit": "99.0"}},
                {"node": {"priceLevel": 1, "pricePerUnit": "11.30"}}
            ]}}
        },
        {
            "isActive": false,
            "chargingLedger": {"ledgerType": "FRA_ELECTRICITY_LEDGER"},
            "product": {"consumptionRates": {"edges": [
                {"node": {"providerCalendar": "PEAK_OFF_PEAK",
                          "pricePerUnitWithTaxes": 1.0}}
            ]}}
        }
    ]))
    .unwrap();

    let tariffs = extract_tariffs(&agreements);
    assert_eq!(tariffs.electricity.hc_cents, Some(20.40));
    assert_eq!(tariffs.electricity.hp_cents, Some(27.0));
    assert_eq!(tariffs.gas.price_cents, Some(11.30));
}

#[test]
fn auth_errors_detected_by_keyword() {
    let envelope = json!({
        "errors": [{"message": "Signature of the JWT token has expired"}]
    });
    let errors = parse_errors(&envelope);
    assert!(is_auth_error(&errors));

    let envelope = json!({
        "errors": [{"message": "Cannot query field 'foo' on type 'Account'"}]
    });
    assert!(!is_auth_error(&parse_errors(&envelope)));

    assert!(parse_errors(&json!({"data": {"ok": true}})).is_empty());
}
