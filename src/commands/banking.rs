use crate::analysis::aggregate::{compute_portfolio_metrics, paginate, risk_distribution, risk_trend};
use crate::analysis::risk_level::risk_tier_from_score;
use crate::analysis::validation::validate_pagination;
use crate::commands::settings::Settings;
use crate::error::AppError;
use crate::models::client::ClientRecord;
use crate::models::dashboard::DashboardData;
use crate::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Datelike;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn get_banking_data(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<DashboardData>, AppError> {
    let Query(query) = query?;
    let settings = Arc::clone(&state.settings);
    let current_year = chrono::Local::now().year();

    let dashboard = tokio::task::spawn_blocking(move || {
        get_banking_data_internal(&settings, query.page, query.page_size, current_year)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Dashboard task failed: {e}")))??;

    Ok(Json(dashboard))
}

pub fn get_banking_data_internal(
    settings: &Settings,
    page: Option<i64>,
    page_size: Option<i64>,
    current_year: i32,
) -> Result<DashboardData, AppError> {
    let (page, page_size) = validate_pagination(
        page.unwrap_or(1),
        page_size.unwrap_or(settings.default_page_size as i64),
        settings.max_page_size,
    )?;

    let records = crate::commands::dataset::load_clients(settings)?;
    let dashboard = build_dashboard(&records, page, page_size, current_year);

    log::debug!(
        "Served page {}/{} ({} of {} clients)",
        dashboard.pagination.page,
        dashboard.pagination.total_pages,
        dashboard.clients.len(),
        dashboard.pagination.total_clients
    );
    Ok(dashboard)
}

/// Portfolio figures cover every record; `clients` holds only the requested page.
pub fn build_dashboard(records: &[ClientRecord], page: usize, page_size: usize, current_year: i32) -> DashboardData {
    let metrics = compute_portfolio_metrics(records);
    let (clients, pagination) = paginate(records, page, page_size);

    DashboardData {
        avg_risk: metrics.avg_risk,
        high_risk_clients: metrics.high_risk_clients,
        total_loans: metrics.total_loans,
        total_deposits: metrics.total_deposits,
        portfolio_risk_level: risk_tier_from_score(metrics.avg_risk),
        risk_distribution: risk_distribution(records),
        risk_trend: risk_trend(records, current_year),
        clients: clients.to_vec(),
        pagination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::risk_level::{risk_level_from_default, RiskTier};
    use crate::analysis::validation::ValidationError;
    use chrono::NaiveDate;

    fn records(count: usize) -> Vec<ClientRecord> {
        (0..count)
            .map(|index| {
                let default_risk = (index % 4 == 0) as u8;
                ClientRecord {
                    id: format!("id-{index}"),
                    name: format!("Client {}", index + 1),
                    age: 30,
                    estimated_income: 1000.0,
                    credit_card_balance: 0.0,
                    bank_loans: 10.0,
                    superannuation_savings: 0.0,
                    saving_accounts: 2.0,
                    properties_owned: 0,
                    debt_to_income_ratio: 0.01,
                    savings_to_debt_ratio: 0.2,
                    default_risk,
                    risk_level: risk_level_from_default(default_risk),
                    joined_bank: NaiveDate::from_ymd_opt(2016 + (index % 3) as i32, 6, 1).unwrap(),
                }
            })
            .collect()
    }

    #[test]
    fn dashboard_aggregates_everything_but_pages_clients() {
        let data = build_dashboard(&records(25), 3, 10, 2026);

        assert_eq!(data.clients.len(), 5);
        assert_eq!(data.clients[0].id, "id-20");
        assert_eq!(data.pagination.total_pages, 3);
        assert_eq!(data.total_loans, 250.0);
        assert_eq!(data.total_deposits, 50.0);
        // 7 of 25 indices are multiples of 4.
        assert_eq!(data.high_risk_clients, 7);
        assert_eq!(data.portfolio_risk_level, RiskTier::Low);
        assert_eq!(data.risk_trend.len(), 3);
    }

    #[test]
    fn empty_portfolio_still_has_shape() {
        let data = build_dashboard(&[], 1, 10, 2026);

        assert!(data.clients.is_empty());
        assert_eq!(data.avg_risk, 0.0);
        assert_eq!(data.risk_distribution.len(), 2);
        assert_eq!(data.risk_trend.len(), 1);
        assert_eq!(data.risk_trend[0].year, "2026");
        assert_eq!(data.pagination.total_pages, 1);
    }

    #[test]
    fn invalid_page_size_is_rejected_before_reading_data() {
        let mut settings = Settings::default();
        settings.csv_path = "does-not-exist.csv".into();

        let err = get_banking_data_internal(&settings, Some(1), Some(0), 2026).unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidPagination { field: "pageSize", .. })
        ));
    }

    #[test]
    fn missing_dataset_is_a_server_error() {
        let mut settings = Settings::default();
        settings.csv_path = "does-not-exist.csv".into();

        let err = get_banking_data_internal(&settings, None, None, 2026).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
