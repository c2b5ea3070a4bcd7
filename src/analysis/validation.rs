use crate::models::client::ClientSubmission;
use thiserror::Error;

pub const MINIMUM_AGE: i64 = 18;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Age must be at least 18 (got {0})")]
    InvalidAge(i64),
    #[error("Estimated income must be greater than 0")]
    InvalidIncome,
    #[error("Credit card balance cannot be negative")]
    InvalidCreditCardBalance,
    #[error("Bank loans cannot be negative")]
    InvalidBankLoans,
    #[error("Superannuation savings cannot be negative")]
    InvalidSuperannuationSavings,
    #[error("Saving accounts cannot be negative")]
    InvalidSavingAccounts,
    #[error("Number of properties owned cannot be negative")]
    InvalidPropertiesOwned,
    #[error("{field} {reason}")]
    InvalidPagination { field: &'static str, reason: String },
}

impl ValidationError {
    /// Name of the submitted field the rule applies to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidAge(_) => "age",
            ValidationError::InvalidIncome => "estimatedIncome",
            ValidationError::InvalidCreditCardBalance => "creditCardBalance",
            ValidationError::InvalidBankLoans => "bankLoans",
            ValidationError::InvalidSuperannuationSavings => "superannuationSavings",
            ValidationError::InvalidSavingAccounts => "savingAccounts",
            ValidationError::InvalidPropertiesOwned => "propertiesOwned",
            ValidationError::InvalidPagination { field, .. } => *field,
        }
    }
}

/// Checks business rules in a fixed order and reports the first failure only.
pub fn validate_submission(submission: &ClientSubmission) -> Result<(), ValidationError> {
    if submission.age < MINIMUM_AGE {
        return Err(ValidationError::InvalidAge(submission.age));
    }
    if !is_positive(submission.estimated_income) {
        return Err(ValidationError::InvalidIncome);
    }
    if !is_non_negative(submission.credit_card_balance) {
        return Err(ValidationError::InvalidCreditCardBalance);
    }
    if !is_non_negative(submission.bank_loans) {
        return Err(ValidationError::InvalidBankLoans);
    }
    if !is_non_negative(submission.superannuation_savings) {
        return Err(ValidationError::InvalidSuperannuationSavings);
    }
    if !is_non_negative(submission.saving_accounts) {
        return Err(ValidationError::InvalidSavingAccounts);
    }
    if submission.properties_owned < 0 {
        return Err(ValidationError::InvalidPropertiesOwned);
    }
    Ok(())
}

pub fn validate_pagination(
    page: i64,
    page_size: i64,
    max_page_size: Option<usize>,
) -> Result<(usize, usize), ValidationError> {
    if page < 1 {
        return Err(ValidationError::InvalidPagination {
            field: "page",
            reason: format!("must be at least 1 (got {page})"),
        });
    }
    if page_size < 1 {
        return Err(ValidationError::InvalidPagination {
            field: "pageSize",
            reason: format!("must be at least 1 (got {page_size})"),
        });
    }
    if let Some(max) = max_page_size.filter(|max| page_size as u64 > *max as u64) {
        return Err(ValidationError::InvalidPagination {
            field: "pageSize",
            reason: format!("must be at most {max} (got {page_size})"),
        });
    }
    Ok((page as usize, page_size as usize))
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_submission() -> ClientSubmission {
        ClientSubmission {
            name: "Client".to_string(),
            email: Some("client@example.com".to_string()),
            phone: None,
            age: 30,
            estimated_income: 1000.0,
            credit_card_balance: 100.0,
            bank_loans: 100.0,
            superannuation_savings: 50.0,
            saving_accounts: 50.0,
            properties_owned: 1,
            last_updated: "2025-05-16".to_string(),
        }
    }

    #[test]
    fn accepts_valid_submission() {
        assert_eq!(validate_submission(&valid_submission()), Ok(()));
    }

    #[test]
    fn rejects_minors() {
        let submission = ClientSubmission {
            age: 17,
            estimated_income: 50_000.0,
            ..valid_submission()
        };
        let err = validate_submission(&submission).unwrap_err();
        assert_eq!(err, ValidationError::InvalidAge(17));
        assert_eq!(err.field(), "age");
    }

    #[test]
    fn first_failing_rule_wins() {
        let submission = ClientSubmission {
            estimated_income: 0.0,
            credit_card_balance: -1.0,
            properties_owned: -1,
            ..valid_submission()
        };
        assert_eq!(
            validate_submission(&submission),
            Err(ValidationError::InvalidIncome)
        );

        let submission = ClientSubmission {
            bank_loans: -1.0,
            saving_accounts: -1.0,
            ..valid_submission()
        };
        assert_eq!(
            validate_submission(&submission),
            Err(ValidationError::InvalidBankLoans)
        );
    }

    #[test]
    fn each_rule_reports_its_field() {
        let cases = [
            (ClientSubmission { credit_card_balance: -0.5, ..valid_submission() }, "creditCardBalance"),
            (ClientSubmission { superannuation_savings: -2.0, ..valid_submission() }, "superannuationSavings"),
            (ClientSubmission { saving_accounts: -3.0, ..valid_submission() }, "savingAccounts"),
            (ClientSubmission { properties_owned: -1, ..valid_submission() }, "propertiesOwned"),
        ];

        for (submission, field) in cases {
            let err = validate_submission(&submission).expect_err("should fail");
            assert_eq!(err.field(), field);
        }
    }

    #[test]
    fn non_finite_amounts_are_rejected() {
        let submission = ClientSubmission {
            estimated_income: f64::INFINITY,
            ..valid_submission()
        };
        assert_eq!(
            validate_submission(&submission),
            Err(ValidationError::InvalidIncome)
        );

        let submission = ClientSubmission {
            bank_loans: f64::NAN,
            ..valid_submission()
        };
        assert_eq!(
            validate_submission(&submission),
            Err(ValidationError::InvalidBankLoans)
        );
    }

    #[test]
    fn pagination_bounds() {
        assert_eq!(validate_pagination(3, 10, None), Ok((3, 10)));
        assert_eq!(validate_pagination(0, 10, None).unwrap_err().field(), "page");
        assert_eq!(validate_pagination(1, 0, None).unwrap_err().field(), "pageSize");
        assert_eq!(validate_pagination(1, 101, Some(100)).unwrap_err().field(), "pageSize");
    }

    #[test]
    fn page_size_is_unbounded_without_a_cap() {
        assert_eq!(validate_pagination(1, 10_000, None), Ok((1, 10_000)));
        assert_eq!(validate_pagination(1, -5, None).unwrap_err().field(), "pageSize");
    }
}
