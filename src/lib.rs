//! # P&L Statement Editor
//!
//! The editing core behind a profit and loss statement editor: a typed model of
//! an extracted statement, structural paths into it, reconciliation against the
//! canonical chart of accounts, and deterministic recomputation of every total.
//!
//! ## Core Concepts
//!
//! - **Fields**: every amount is a decimal string with a display label and an optional itemized breakdown (`entries`)
//! - **Sections**: Operating Income, Cost of Goods Sold and Operating Expenses, each with well-known keys plus free-form additional line items
//! - **Derived Fields**: section totals, `GrossProfit` and `NetIncome` are always recomputed from leaves and never edited directly
//! - **Reconciliation**: a loaded statement is merged over the canonical template so every known field exists
//! - **Edits**: serializable commands applied to an immutable statement, returning a new one with totals recomputed
//!
//! ## Example
//!
//! ```rust,ignore
//! use pnl_statement_editor::*;
//!
//! let mut session = EditSession::new_statement(
//!     PROFIT_AND_LOSS_FORM_TYPE,
//!     "latest",
//!     "stmt-1",
//!     "doc-1",
//!     "2023",
//!     EngineConfig::default(),
//! )?;
//!
//! session.apply(&Edit::SetValue {
//!     path: FieldPath::section_field(0, SectionId::OperatingIncome, "RentalIncome"),
//!     value: "100".to_string(),
//! })?;
//! session.apply(&Edit::SetValue {
//!     path: "/Financials/0/Expense/Operating/Insurance".parse()?,
//!     value: "40".to_string(),
//! })?;
//!
//! assert_eq!(session.working().data.financials[0].net_income.value, "60");
//!
//! let mut store = StatementStore::new();
//! session.save(&mut store)?;
//! ```

pub mod chart_of_accounts;
pub mod edits;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod line_items;
pub mod path;
pub mod reconcile;
pub mod schema;
pub mod search;
pub mod session;
pub mod store;
pub mod utils;
pub mod verification;

pub use chart_of_accounts::{
    canonical_schema, ChartOfAccounts, SchemaVersion, SectionChart, PROFIT_AND_LOSS_FORM_TYPE,
};
pub use edits::{apply_edit, Edit, EditBatch};
pub use engine::{recompute_totals, PeriodTotals, TotalsEngine};
pub use error::{Result, StatementError};
pub use ingestion::*;
pub use path::{EntryAttr, FieldAttr, FieldPath, FieldRef, Location, Node, PathSegment};
pub use reconcile::{reconcile, reconcile_section};
pub use schema::*;
pub use search::{collect_fields, filter_fields, filter_section_keys, FieldSummary};
pub use session::{EditSession, SaveHandler};
pub use store::{PortfolioSummary, StatementStore};
pub use utils::{format_decimal, parse_decimal};
pub use verification::{ensure_totals_consistent, verify_totals, TotalsMismatch, VerificationResult};

use log::{debug, info};
use rust_decimal::Decimal;

pub struct StatementProcessor;

impl StatementProcessor {
    /// Reconciles a loaded statement and recomputes its totals.
    pub fn process(
        statement: &FinancialStatement,
        config: &EngineConfig,
    ) -> Result<FinancialStatement> {
        let chart = chart_for(statement)?;

        info!(
            "Processing statement '{}' for {}",
            statement.id,
            statement.data.company_name.value
        );
        debug!(
            "Statement has {} period(s) and {} reporting date(s)",
            statement.data.financials.len(),
            statement.data.reporting_dates.len()
        );

        let reconciled = reconcile(&chart, statement);
        recompute_totals(&chart, config, &reconciled)
    }

    /// Like [`StatementProcessor::process`], also reporting where the totals
    /// stored on the incoming statement disagree with the recomputed ones.
    pub fn process_with_verification(
        statement: &FinancialStatement,
        config: &EngineConfig,
        tolerance: Decimal,
    ) -> Result<(FinancialStatement, VerificationResult)> {
        let chart = chart_for(statement)?;
        let reconciled = reconcile(&chart, statement);

        let verification = verify_totals(&chart, config, &reconciled, tolerance)?;
        for mismatch in &verification.mismatches {
            debug!(
                "Stored total {} = '{}' replaced by {}",
                mismatch.path, mismatch.stored, mismatch.recomputed
            );
        }

        let processed = recompute_totals(&chart, config, &reconciled)?;
        Ok((processed, verification))
    }
}

pub fn process_statement(
    statement: &FinancialStatement,
    config: &EngineConfig,
) -> Result<FinancialStatement> {
    StatementProcessor::process(statement, config)
}

pub fn process_with_verification(
    statement: &FinancialStatement,
    config: &EngineConfig,
    tolerance: Decimal,
) -> Result<(FinancialStatement, VerificationResult)> {
    StatementProcessor::process_with_verification(statement, config, tolerance)
}

fn chart_for(statement: &FinancialStatement) -> Result<ChartOfAccounts> {
    if statement.form_type.is_empty() {
        return ChartOfAccounts::lookup(PROFIT_AND_LOSS_FORM_TYPE, &statement.version);
    }
    ChartOfAccounts::for_statement(statement)
}
