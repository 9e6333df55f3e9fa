//! GraphQL documents for the Kraken France API.

/// Obtain a JWT session token from credentials
pub const MUTATION_LOGIN: &str = r#"
mutation obtainKrakenToken($input: ObtainJSONWebTokenInput!) {
    obtainKrakenToken(input: $input) {
        token
    }
}
"#;

/// All accounts visible to the authenticated user, with ledger balances
pub const QUERY_ACCOUNTS: &str = r#"
{
  viewer {
    accounts {
      number
      ledgers {
        balance
        ledgerType
        name
        number
        id
      }
    }
  }
}
"#;

/// Account detail: supply points (meter contracts) and credit storage
pub const QUERY_ACCOUNT_DATA: &str = r#"
query getAccountData($accountNumber: String!) {
  account(accountNumber: $accountNumber) {
    number
    properties {
      address
      supplyPoints(first: 10) {
        edges {
          node {
            meterPoint {
              ... on ElectricityMeterPoint {
                id
                distributorStatus
                meterKind
                subscribedMaxPower
                isTeleoperable
                offPeakLabel
                poweredStatus
                providerCalendarId
                providerCalendarName
              }
              ... on GasMeterPoint {
                id
                gasNature
                annualConsumption
                isSmartMeter
                poweredStatus
                priceLevel
                tariffOption
              }
            }
          }
        }
      }
    }
    creditStorage {
      ledger {
        currentBalance
        ledgerType
        name
        number
      }
    }
  }
}
"#;

/// Latest payment request for a ledger
pub const QUERY_PAYMENT_REQUESTS: &str = r#"
query paiement($ledgerNumber: String!) {
  paymentRequests(ledgerNumber: $ledgerNumber) {
    paymentRequest(first: 1) {
      edges {
        node {
          paymentStatus
          totalAmount
          customerAmount
          expectedPaymentDate
        }
      }
    }
  }
}
"#;

/// Active agreements with consumption rates for electricity and gas
pub const QUERY_TARIFFS: &str = r#"
query GetTarifs($accountNumber: String!) {
  agreements(accountNumber: $accountNumber, first: 10) {
    edges {
      node {
        id
        isActive
        chargingLedger {
          ledgerType
        }
        ... on ElectricitySpecificAgreementType {
          product {
            consumptionRates(first: 3) {
              edges {
                node {
                  ... on ElectricityConsumptionRateType {
                    pricePerUnit
                    pricePerUnitWithTaxes
                    providerCalendar
                    currency
                  }
                }
              }
            }
          }
        }
        ... on GasSpecificAgreementType {
          product {
            consumptionRates(first: 1) {
              edges {
                node {
                  ... on GasConsumptionRateType {
                    priceLevel
                    pricePerUnit
                    currency
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// Processed daily electricity readings for a PRM, provider calendar
pub const QUERY_ELECTRICITY_READINGS: &str = r#"
query ElectricityMeterReadings($accountNumber: String!, $prmId: String!) {
  electricityReading(
    accountNumber: $accountNumber
    prmId: $prmId
    first: 10
    calendarType: PROVIDER
    statusProcessed: OK
  ) {
    edges {
      node {
        indexStartValue
        indexEndValue
        calendarType
        calendarTempClass
        consumption
        consumptionReliability
        statusProcessed
        periodEndAt
        periodStartAt
      }
    }
  }
}
"#;

/// Periodic gas readings for a PCE reference
pub const QUERY_GAS_READINGS: &str = r#"
query GasMeterReadings($accountNumber: String!, $pceRef: String!) {
  gasReading(accountNumber: $accountNumber, first: 10, pceRef: $pceRef) {
    edges {
      node {
        consumption
        indexEndValue
        indexStartValue
        periodEndAt
        periodStartAt
        readingDate
        readingType
        statusProcessed
      }
    }
  }
}
"#;
