use serde::Serialize;

use crate::analysis::risk_level::RiskTier;
use crate::models::client::ClientRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskDistributionEntry {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskTrendPoint {
    pub year: String,
    pub avg_risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_clients: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Portfolio-wide figures computed over the whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub avg_risk: f64,
    pub high_risk_clients: usize,
    pub total_loans: f64,
    pub total_deposits: f64,
}

/// Response body of `GET /api/banking`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub avg_risk: f64,
    pub high_risk_clients: usize,
    pub total_loans: f64,
    pub total_deposits: f64,
    pub portfolio_risk_level: RiskTier,
    pub risk_distribution: Vec<RiskDistributionEntry>,
    pub risk_trend: Vec<RiskTrendPoint>,
    pub clients: Vec<ClientRecord>,
    pub pagination: Pagination,
}
