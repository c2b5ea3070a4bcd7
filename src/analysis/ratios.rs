use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RatioError {
    #[error("Cannot compute Debt_to_Income_Ratio: estimated income must be greater than 0 (got {0})")]
    InvalidIncome(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioPair {
    pub debt_to_income: f64,
    pub savings_to_debt: f64,
}

pub fn total_debt(credit_card_balance: f64, bank_loans: f64) -> f64 {
    credit_card_balance + bank_loans
}

/// (super + savings) / (debt + 1). The +1 keeps the denominator ≥ 1 for
/// non-negative debt.
pub fn savings_to_debt_ratio(
    credit_card_balance: f64,
    bank_loans: f64,
    superannuation_savings: f64,
    saving_accounts: f64,
) -> f64 {
    let savings = superannuation_savings + saving_accounts;
    savings / (total_debt(credit_card_balance, bank_loans) + 1.0)
}

/// Ratios for offline/bulk data: an income of exactly 0 is replaced by 1.
pub fn compute_ratios_safe(
    income: f64,
    credit_card_balance: f64,
    bank_loans: f64,
    superannuation_savings: f64,
    saving_accounts: f64,
) -> RatioPair {
    let divisor = if income == 0.0 { 1.0 } else { income };

    RatioPair {
        debt_to_income: total_debt(credit_card_balance, bank_loans) / divisor,
        savings_to_debt: savings_to_debt_ratio(
            credit_card_balance,
            bank_loans,
            superannuation_savings,
            saving_accounts,
        ),
    }
}

/// Ratios for interactive submissions: income must be strictly positive.
pub fn compute_ratios_strict(
    income: f64,
    credit_card_balance: f64,
    bank_loans: f64,
    superannuation_savings: f64,
    saving_accounts: f64,
) -> Result<RatioPair, RatioError> {
    if income.is_nan() || income <= 0.0 {
        return Err(RatioError::InvalidIncome(income));
    }

    Ok(RatioPair {
        debt_to_income: total_debt(credit_card_balance, bank_loans) / income,
        savings_to_debt: savings_to_debt_ratio(
            credit_card_balance,
            bank_loans,
            superannuation_savings,
            saving_accounts,
        ),
    })
}
