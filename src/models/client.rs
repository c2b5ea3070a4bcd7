use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::risk_level::RiskLevel;

/// One banking client as served on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub estimated_income: f64,
    pub credit_card_balance: f64,
    pub bank_loans: f64,
    pub superannuation_savings: f64,
    pub saving_accounts: f64,
    pub properties_owned: u32,
    pub debt_to_income_ratio: f64,
    pub savings_to_debt_ratio: f64,
    pub default_risk: u8, // 0 = no default, 1 = default
    pub risk_level: RiskLevel,
    pub joined_bank: NaiveDate,
}

/// New-client payload accepted by `POST /api/clients`.
///
/// Numeric fields are signed so that out-of-range values reach the
/// validator instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSubmission {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub age: i64,
    pub estimated_income: f64,
    pub credit_card_balance: f64,
    pub bank_loans: f64,
    pub superannuation_savings: f64,
    pub saving_accounts: f64,
    pub properties_owned: i64,
    pub last_updated: String,
}

/// Scored submission returned to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPrediction {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: i64,
    pub estimated_income: f64,
    pub credit_card_balance: f64,
    pub bank_loans: f64,
    pub superannuation_savings: f64,
    pub saving_accounts: f64,
    pub properties_owned: i64,
    pub default_risk: u8,
    pub risk_level: RiskLevel,
    pub debt_to_income_ratio: f64,
    pub savings_to_debt_ratio: f64,
    pub last_updated: String,
}
