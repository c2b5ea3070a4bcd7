use crate::analysis::classifier::RiskModel;
use crate::analysis::ratios::compute_ratios_strict;
use crate::analysis::risk_level::risk_level_from_default;
use crate::analysis::validation::validate_submission;
use crate::error::AppError;
use crate::models::client::{ClientPrediction, ClientSubmission};
use crate::models::features::FeatureVector;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

pub async fn create_client(
    State(state): State<AppState>,
    payload: Result<Json<ClientSubmission>, JsonRejection>,
) -> Result<Json<ClientPrediction>, AppError> {
    let Json(submission) = payload?;
    create_client_internal(&state.model, submission).map(Json)
}

/// Validates, derives ratios, then scores. Stops at the first failure.
pub fn create_client_internal(model: &RiskModel, submission: ClientSubmission) -> Result<ClientPrediction, AppError> {
    log::debug!("Received client submission for {:?}", submission.name);

    validate_submission(&submission)?;

    let ratios = compute_ratios_strict(
        submission.estimated_income,
        submission.credit_card_balance,
        submission.bank_loans,
        submission.superannuation_savings,
        submission.saving_accounts,
    )?;

    let features = FeatureVector::from_submission(&submission, ratios);
    let default_risk = model.score(&features)?;
    let risk_level = risk_level_from_default(default_risk);

    log::debug!(
        "Scored {:?}: default_risk={} dti={:.4} std={:.4}",
        submission.name,
        default_risk,
        ratios.debt_to_income,
        ratios.savings_to_debt
    );

    Ok(ClientPrediction {
        name: submission.name,
        email: submission.email,
        phone: submission.phone,
        age: submission.age,
        estimated_income: submission.estimated_income,
        credit_card_balance: submission.credit_card_balance,
        bank_loans: submission.bank_loans,
        superannuation_savings: submission.superannuation_savings,
        saving_accounts: submission.saving_accounts,
        properties_owned: submission.properties_owned,
        default_risk,
        risk_level,
        debt_to_income_ratio: ratios.debt_to_income,
        savings_to_debt_ratio: ratios.savings_to_debt,
        last_updated: submission.last_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classifier::{LogisticRegression, StandardScaler};
    use crate::analysis::ratios::RatioError;
    use crate::analysis::risk_level::RiskLevel;
    use crate::analysis::validation::ValidationError;
    use crate::models::features::FEATURE_COUNT;

    /// Flags anyone whose debt exceeds half their income.
    fn debt_ratio_model() -> RiskModel {
        let mut coefficients = [0.0; FEATURE_COUNT];
        coefficients[7] = 10.0;
        RiskModel::new(
            Box::new(StandardScaler::new(&[0.0; FEATURE_COUNT], &[1.0; FEATURE_COUNT]).unwrap()),
            Box::new(LogisticRegression::new(&coefficients, -5.0, 0.5).unwrap()),
        )
    }

    fn submission() -> ClientSubmission {
        ClientSubmission {
            name: "Jane Doe".to_string(),
            email: Some("jane@example.com".to_string()),
            phone: None,
            age: 30,
            estimated_income: 1000.0,
            credit_card_balance: 100.0,
            bank_loans: 100.0,
            superannuation_savings: 50.0,
            saving_accounts: 50.0,
            properties_owned: 1,
            last_updated: "2025-01-01".to_string(),
        }
    }

    #[test]
    fn scores_a_valid_submission() {
        let prediction = create_client_internal(&debt_ratio_model(), submission()).unwrap();

        assert!((prediction.debt_to_income_ratio - 0.2).abs() < 1e-12);
        assert!((prediction.savings_to_debt_ratio - 100.0 / 201.0).abs() < 1e-12);
        assert_eq!(prediction.default_risk, 0);
        assert_eq!(prediction.risk_level, RiskLevel::Low);
        assert_eq!(prediction.email.as_deref(), Some("jane@example.com"));
        assert_eq!(prediction.last_updated, "2025-01-01");
    }

    #[test]
    fn high_debt_submission_is_flagged() {
        let mut heavy = submission();
        heavy.bank_loans = 5000.0;

        let prediction = create_client_internal(&debt_ratio_model(), heavy).unwrap();
        assert_eq!(prediction.default_risk, 1);
        assert_eq!(prediction.risk_level, RiskLevel::High);
    }

    #[test]
    fn underage_submission_is_rejected() {
        let mut minor = submission();
        minor.age = 17;

        let err = create_client_internal(&debt_ratio_model(), minor).unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::InvalidAge(17))));
    }

    #[test]
    fn zero_income_never_reaches_the_model() {
        let mut broke = submission();
        broke.estimated_income = 0.0;

        let err = create_client_internal(&debt_ratio_model(), broke).unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidIncome) | AppError::Computation(RatioError::InvalidIncome(_))
        ));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }
}
