use crate::analysis::ratios::RatioPair;
use crate::models::client::ClientSubmission;

pub const FEATURE_COUNT: usize = 9;

/// Column names the model was trained on, in input order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Age",
    "Estimated Income",
    "Credit Card Balance",
    "Bank Loans",
    "Superannuation Savings",
    "Saving Accounts",
    "Properties Owned",
    "Debt_to_Income_Ratio",
    "Savings_to_Debt_Ratio",
];

/// Classifier input. Field order matches `FEATURE_NAMES` and is the order
/// `to_row` emits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub age: f64,
    pub estimated_income: f64,
    pub credit_card_balance: f64,
    pub bank_loans: f64,
    pub superannuation_savings: f64,
    pub saving_accounts: f64,
    pub properties_owned: f64,
    pub debt_to_income_ratio: f64,
    pub savings_to_debt_ratio: f64,
}

impl FeatureVector {
    pub fn from_submission(submission: &ClientSubmission, ratios: RatioPair) -> Self {
        Self {
            age: submission.age as f64,
            estimated_income: submission.estimated_income,
            credit_card_balance: submission.credit_card_balance,
            bank_loans: submission.bank_loans,
            superannuation_savings: submission.superannuation_savings,
            saving_accounts: submission.saving_accounts,
            properties_owned: submission.properties_owned as f64,
            debt_to_income_ratio: ratios.debt_to_income,
            savings_to_debt_ratio: ratios.savings_to_debt,
        }
    }

    pub fn to_row(&self) -> [f64; FEATURE_COUNT] {
        [
            self.age,
            self.estimated_income,
            self.credit_card_balance,
            self.bank_loans,
            self.superannuation_savings,
            self.saving_accounts,
            self.properties_owned,
            self.debt_to_income_ratio,
            self.savings_to_debt_ratio,
        ]
    }
}
