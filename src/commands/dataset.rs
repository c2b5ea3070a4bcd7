use crate::analysis::ratios::compute_ratios_safe;
use crate::analysis::risk_level::risk_level_from_default;
use crate::commands::settings::{DatasetKind, JoinedBankWindow, Settings};
use crate::models::client::ClientRecord;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to open dataset {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Dataset {path} is missing required columns: {columns}")]
    MissingColumns { path: PathBuf, columns: String },
    #[error("Invalid row at line {line} of {path}: {reason}")]
    InvalidRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("Database {0} does not exist")]
    MissingDatabase(PathBuf),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Invalid stored client {id}: {reason}")]
    InvalidStoredClient { id: String, reason: String },
}

const REQUIRED_COLUMNS: [&str; 8] = [
    "Age",
    "Estimated Income",
    "Credit Card Balance",
    "Bank Loans",
    "Superannuation Savings",
    "Saving Accounts",
    "Properties Owned",
    "Default_Risk",
];

/// One row of the banking CSV. The `REQUIRED_COLUMNS` headers must be
/// present, though their cells may be empty; everything else is filled in.
#[derive(Debug, Deserialize)]
struct CsvClientRow {
    #[serde(rename = "Client_ID", default)]
    client_id: Option<String>,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Age")]
    age: Option<f64>,
    #[serde(rename = "Estimated Income")]
    estimated_income: Option<f64>,
    #[serde(rename = "Credit Card Balance")]
    credit_card_balance: Option<f64>,
    #[serde(rename = "Bank Loans")]
    bank_loans: Option<f64>,
    #[serde(rename = "Superannuation Savings")]
    superannuation_savings: Option<f64>,
    #[serde(rename = "Saving Accounts")]
    saving_accounts: Option<f64>,
    #[serde(rename = "Properties Owned")]
    properties_owned: Option<f64>,
    #[serde(rename = "Default_Risk")]
    default_risk: Option<f64>,
    #[serde(rename = "Debt_to_Income_Ratio", default)]
    debt_to_income_ratio: Option<f64>,
    #[serde(rename = "Savings_to_Debt_Ratio", default)]
    savings_to_debt_ratio: Option<f64>,
    #[serde(rename = "Joined_Bank", default)]
    joined_bank: Option<String>,
}

/// Reads every client from the configured source, in dataset order.
pub fn load_clients(settings: &Settings) -> Result<Vec<ClientRecord>, DatasetError> {
    match settings.dataset_source {
        DatasetKind::Csv => read_csv_clients(&settings.csv_path, &settings.joined_bank),
        DatasetKind::Sqlite => {
            if !settings.database_path.exists() {
                return Err(DatasetError::MissingDatabase(settings.database_path.clone()));
            }
            let conn = crate::commands::db::open_existing_db(&settings.database_path)?;
            crate::commands::db::load_clients(&conn)
        }
    }
}

/// Imports the CSV into an empty SQLite table when the SQLite source is
/// configured with seeding on. Returns how many rows were imported.
pub fn seed_database(settings: &Settings) -> Result<usize, DatasetError> {
    if settings.dataset_source != DatasetKind::Sqlite || !settings.seed_database_from_csv {
        return Ok(0);
    }

    let conn = crate::commands::db::get_db_connection(&settings.database_path)?;
    if crate::commands::db::count_clients(&conn)? > 0 {
        log::debug!("Database {} already populated", settings.database_path.display());
        return Ok(0);
    }
    if !settings.csv_path.exists() {
        log::warn!(
            "Database {} is empty and seed file {} does not exist",
            settings.database_path.display(),
            settings.csv_path.display()
        );
        return Ok(0);
    }

    let clients = read_csv_clients(&settings.csv_path, &settings.joined_bank)?;
    let imported =
        crate::commands::db::seed_clients_if_empty(&conn, &clients, settings.import_risk_level_policy)?;
    log::info!(
        "Seeded {} clients from {} into {}",
        imported,
        settings.csv_path.display(),
        settings.database_path.display()
    );
    Ok(imported)
}

pub fn read_csv_clients(path: &Path, window: &JoinedBankWindow) -> Result<Vec<ClientRecord>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_csv_clients(BufReader::new(file), path, window)
}

pub fn parse_csv_clients<R: Read>(
    reader: R,
    path: &Path,
    window: &JoinedBankWindow,
) -> Result<Vec<ClientRecord>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    check_required_columns(&mut reader, path)?;
    let mut rng = StdRng::seed_from_u64(window.seed);
    let mut clients = Vec::new();

    for (index, row) in reader.deserialize::<CsvClientRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = row.map_err(|source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let record = client_from_row(row, index, window, &mut rng).map_err(|reason| {
            DatasetError::InvalidRow {
                path: path.to_path_buf(),
                line,
                reason,
            }
        })?;
        clients.push(record);
    }

    log::debug!("Loaded {} clients from {}", clients.len(), path.display());
    Ok(clients)
}

fn check_required_columns<R: Read>(reader: &mut csv::Reader<R>, path: &Path) -> Result<(), DatasetError> {
    let headers = reader.headers().map_err(|source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|header| header == *column))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DatasetError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing.join(", "),
        })
    }
}

fn client_from_row(
    row: CsvClientRow,
    index: usize,
    window: &JoinedBankWindow,
    rng: &mut StdRng,
) -> Result<ClientRecord, String> {
    // Empty cells count as 0.
    let estimated_income = amount(row.estimated_income, "Estimated Income")?;
    let credit_card_balance = amount(row.credit_card_balance, "Credit Card Balance")?;
    let bank_loans = amount(row.bank_loans, "Bank Loans")?;
    let superannuation_savings = amount(row.superannuation_savings, "Superannuation Savings")?;
    let saving_accounts = amount(row.saving_accounts, "Saving Accounts")?;

    let default_risk = match row.default_risk.unwrap_or(0.0) {
        v if v == 0.0 => 0u8,
        v if v == 1.0 => 1u8,
        other => return Err(format!("Default_Risk must be 0 or 1, got {other}")),
    };

    let ratios = compute_ratios_safe(
        estimated_income,
        credit_card_balance,
        bank_loans,
        superannuation_savings,
        saving_accounts,
    );

    let id = match row.client_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => uuid::Builder::from_random_bytes(rng.gen()).into_uuid().to_string(),
    };
    let joined_bank = match row.joined_bank.filter(|d| !d.is_empty()) {
        Some(raw) => parse_joined_bank(&raw).ok_or_else(|| format!("unreadable Joined_Bank date {raw:?}"))?,
        None => random_join_date(window, rng),
    };

    Ok(ClientRecord {
        id,
        name: row
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Client {}", index + 1)),
        age: count(row.age, "Age")?,
        estimated_income,
        credit_card_balance,
        bank_loans,
        superannuation_savings,
        saving_accounts,
        properties_owned: count(row.properties_owned, "Properties Owned")?,
        debt_to_income_ratio: row.debt_to_income_ratio.unwrap_or(ratios.debt_to_income),
        savings_to_debt_ratio: row.savings_to_debt_ratio.unwrap_or(ratios.savings_to_debt),
        default_risk,
        risk_level: risk_level_from_default(default_risk),
        joined_bank,
    })
}

fn amount(value: Option<f64>, column: &str) -> Result<f64, String> {
    let value = value.unwrap_or(0.0);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{column} is not a finite number"))
    }
}

fn count(value: Option<f64>, column: &str) -> Result<u32, String> {
    let value = value.unwrap_or(0.0);
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(format!("{column} must be a non-negative whole number, got {value}"));
    }
    Ok(value as u32)
}

pub fn parse_joined_bank(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn random_join_date(window: &JoinedBankWindow, rng: &mut StdRng) -> NaiveDate {
    let span = (window.end - window.start).num_days().max(0);
    window.start + Duration::days(rng.gen_range(0..=span))
}
