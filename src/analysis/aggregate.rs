use chrono::Datelike;
use std::collections::BTreeMap;

use crate::models::client::ClientRecord;
use crate::models::dashboard::{Pagination, PortfolioMetrics, RiskDistributionEntry, RiskTrendPoint};

pub const NO_DEFAULT_LABEL: &str = "No Default";
pub const DEFAULT_LABEL: &str = "Default";

/// Averages and totals over the whole dataset (not just the served page).
pub fn compute_portfolio_metrics(records: &[ClientRecord]) -> PortfolioMetrics {
    let high_risk_clients = records.iter().filter(|r| r.default_risk == 1).count();
    let risk_sum: f64 = records.iter().map(|r| r.default_risk as f64).sum();

    PortfolioMetrics {
        avg_risk: if records.is_empty() {
            0.0
        } else {
            risk_sum / records.len() as f64
        },
        high_risk_clients,
        total_loans: records.iter().map(|r| r.bank_loans).sum(),
        total_deposits: records.iter().map(|r| r.saving_accounts).sum(),
    }
}

/// Client count per default bucket. Both buckets are always present.
pub fn risk_distribution(records: &[ClientRecord]) -> Vec<RiskDistributionEntry> {
    let defaults = records.iter().filter(|r| r.default_risk == 1).count();

    vec![
        RiskDistributionEntry {
            label: NO_DEFAULT_LABEL.to_string(),
            count: records.len() - defaults,
        },
        RiskDistributionEntry {
            label: DEFAULT_LABEL.to_string(),
            count: defaults,
        },
    ]
}

/// Mean default rate per year joined, ascending by year.
/// An empty dataset yields a single zero point for `current_year`.
pub fn risk_trend(records: &[ClientRecord], current_year: i32) -> Vec<RiskTrendPoint> {
    let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for record in records {
        let entry = by_year.entry(record.joined_bank.year()).or_insert((0.0, 0));
        entry.0 += record.default_risk as f64;
        entry.1 += 1;
    }

    if by_year.is_empty() {
        return vec![RiskTrendPoint {
            year: current_year.to_string(),
            avg_risk: 0.0,
        }];
    }

    by_year
        .into_iter()
        .map(|(year, (sum, count))| RiskTrendPoint {
            year: year.to_string(),
            avg_risk: sum / count as f64,
        })
        .collect()
}

/// ceil(total / page_size), never below 1.
pub fn total_pages(total_clients: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    if total_clients == 0 {
        1
    } else {
        total_clients.div_ceil(page_size)
    }
}

/// Returns the 1-indexed `page` of `records`. Pages past the end are empty.
pub fn paginate(records: &[ClientRecord], page: usize, page_size: usize) -> (&[ClientRecord], Pagination) {
    let total_clients = records.len();
    let start = page.saturating_sub(1).saturating_mul(page_size).min(total_clients);
    let end = start.saturating_add(page_size).min(total_clients);

    (
        &records[start..end],
        Pagination {
            total_clients,
            page,
            page_size,
            total_pages: total_pages(total_clients, page_size),
        },
    )
}
