use crate::analysis::risk_level::{RiskLevel, RiskLevelPolicy};
use crate::commands::dataset::{parse_joined_bank, DatasetError};
use crate::models::client::ClientRecord;
use rusqlite::{params, Connection, OpenFlags, Result, Row};
use std::path::Path;

const DB_SCHEMA_VERSION: i64 = 2;

const CLIENT_COLUMNS: &str = "Client_ID, Name, Age, Estimated_Income, Credit_Card_Balance, Bank_Loans, \
     Superannuation_Savings, Saving_Accounts, Properties_Owned, Default_Risk, \
     Debt_to_Income_Ratio, Savings_to_Debt_Ratio, Risk_Level, Joined_Bank";

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("Database schema version {version} is newer than supported {DB_SCHEMA_VERSION}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS clients (
            Client_ID TEXT PRIMARY KEY,
            Name TEXT NOT NULL,
            Age INTEGER NOT NULL,
            Estimated_Income REAL NOT NULL,
            Credit_Card_Balance REAL NOT NULL,
            Bank_Loans REAL NOT NULL,
            Superannuation_Savings REAL NOT NULL,
            Saving_Accounts REAL NOT NULL,
            Properties_Owned INTEGER NOT NULL,
            Default_Risk INTEGER NOT NULL CHECK(Default_Risk IN (0, 1)),
            Debt_to_Income_Ratio REAL NOT NULL,
            Savings_to_Debt_Ratio REAL NOT NULL,
            Risk_Level TEXT NOT NULL CHECK(Risk_Level IN ('High', 'Low')),
            Joined_Bank TEXT NOT NULL
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_clients_joined_bank ON clients(Joined_Bank);")
}

pub fn get_db_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// Opens a database that must already exist. Never creates the file or runs migrations.
pub fn open_existing_db(db_path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

pub fn count_clients(conn: &Connection) -> Result<usize> {
    conn.query_row("SELECT COUNT(*) FROM clients", [], |row| row.get::<_, i64>(0))
        .map(|count| count as usize)
}

/// Writes clients in one transaction. `Risk_Level` is recomputed with `policy`.
pub fn upsert_clients(conn: &Connection, clients: &[ClientRecord], policy: RiskLevelPolicy) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO clients ({CLIENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(Client_ID) DO UPDATE SET
                Name = excluded.Name,
                Age = excluded.Age,
                Estimated_Income = excluded.Estimated_Income,
                Credit_Card_Balance = excluded.Credit_Card_Balance,
                Bank_Loans = excluded.Bank_Loans,
                Superannuation_Savings = excluded.Superannuation_Savings,
                Saving_Accounts = excluded.Saving_Accounts,
                Properties_Owned = excluded.Properties_Owned,
                Default_Risk = excluded.Default_Risk,
                Debt_to_Income_Ratio = excluded.Debt_to_Income_Ratio,
                Savings_to_Debt_Ratio = excluded.Savings_to_Debt_Ratio,
                Risk_Level = excluded.Risk_Level,
                Joined_Bank = excluded.Joined_Bank"
        ))?;

        for client in clients {
            let risk_level = policy.apply(client.default_risk, client.debt_to_income_ratio);
            stmt.execute(params![
                client.id,
                client.name,
                client.age,
                client.estimated_income,
                client.credit_card_balance,
                client.bank_loans,
                client.superannuation_savings,
                client.saving_accounts,
                client.properties_owned,
                client.default_risk,
                client.debt_to_income_ratio,
                client.savings_to_debt_ratio,
                risk_level.as_str(),
                client.joined_bank.format("%Y-%m-%d").to_string(),
            ])?;
        }
    }
    tx.commit()
}

/// All clients in insertion order.
pub fn load_clients(conn: &Connection) -> std::result::Result<Vec<ClientRecord>, DatasetError> {
    let mut stmt = conn.prepare(&format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY rowid ASC"))?;
    let rows = stmt.query_map([], StoredClient::from_row)?;

    let mut clients = Vec::new();
    for row in rows {
        clients.push(row?.into_record()?);
    }
    Ok(clients)
}

/// Imports `clients` into an empty table. Returns how many rows were written.
pub fn seed_clients_if_empty(
    conn: &Connection,
    clients: &[ClientRecord],
    policy: RiskLevelPolicy,
) -> Result<usize> {
    if count_clients(conn)? > 0 {
        return Ok(0);
    }
    upsert_clients(conn, clients, policy)?;
    Ok(clients.len())
}

struct StoredClient {
    id: String,
    name: String,
    age: u32,
    estimated_income: f64,
    credit_card_balance: f64,
    bank_loans: f64,
    superannuation_savings: f64,
    saving_accounts: f64,
    properties_owned: u32,
    default_risk: u8,
    debt_to_income_ratio: f64,
    savings_to_debt_ratio: f64,
    risk_level: String,
    joined_bank: String,
}

impl StoredClient {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
            estimated_income: row.get(3)?,
            credit_card_balance: row.get(4)?,
            bank_loans: row.get(5)?,
            superannuation_savings: row.get(6)?,
            saving_accounts: row.get(7)?,
            properties_owned: row.get(8)?,
            default_risk: row.get(9)?,
            debt_to_income_ratio: row.get(10)?,
            savings_to_debt_ratio: row.get(11)?,
            risk_level: row.get(12)?,
            joined_bank: row.get(13)?,
        })
    }

    fn into_record(self) -> std::result::Result<ClientRecord, DatasetError> {
        let risk_level = RiskLevel::parse(&self.risk_level).ok_or_else(|| DatasetError::InvalidStoredClient {
            id: self.id.clone(),
            reason: format!("unknown Risk_Level {:?}", self.risk_level),
        })?;
        let joined_bank = parse_joined_bank(&self.joined_bank).ok_or_else(|| DatasetError::InvalidStoredClient {
            id: self.id.clone(),
            reason: format!("unreadable Joined_Bank {:?}", self.joined_bank),
        })?;

        Ok(ClientRecord {
            id: self.id,
            name: self.name,
            age: self.age,
            estimated_income: self.estimated_income,
            credit_card_balance: self.credit_card_balance,
            bank_loans: self.bank_loans,
            superannuation_savings: self.superannuation_savings,
            saving_accounts: self.saving_accounts,
            properties_owned: self.properties_owned,
            debt_to_income_ratio: self.debt_to_income_ratio,
            savings_to_debt_ratio: self.savings_to_debt_ratio,
            default_risk: self.default_risk,
            risk_level,
            joined_bank,
        })
    }
}
