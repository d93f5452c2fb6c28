use crate::chart_of_accounts::{TOTAL_OPERATING_EXPENSES_KEY, TOTAL_OPERATING_INCOME_KEY};
use crate::error::Result;
use crate::schema::{FinancialStatement, SectionId};
use crate::session::SaveHandler;
use crate::utils::{checked_add, parse_decimal};
use chrono::Utc;
use log::info;
use rust_decimal::Decimal;

/// Totals across every statement in a store, taken from each first period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortfolioSummary {
    pub statement_count: usize,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
}

/// An in-memory, insertion-ordered list of statements keyed by id.
#[derive(Debug, Clone, Default)]
pub struct StatementStore {
    statements: Vec<FinancialStatement>,
}

impl StatementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new statement and returns the id it was stored under.
    ///
    /// An empty or already taken id is replaced by one derived from the
    /// current time in milliseconds.
    pub fn insert(&mut self, mut statement: FinancialStatement) -> String {
        if statement.id.is_empty() || self.get(&statement.id).is_some() {
            let mut stamp = Utc::now().timestamp_millis();
            while self.get(&stamp.to_string()).is_some() {
                stamp += 1;
            }
            statement.id = stamp.to_string();
        }

        let id = statement.id.clone();
        self.statements.push(statement);
        id
    }

    /// Replaces the statement with the same id, or inserts it if there is none.
    pub fn upsert(&mut self, statement: FinancialStatement) -> String {
        match self.statements.iter().position(|s| s.id == statement.id) {
            Some(position) => {
                let id = statement.id.clone();
                self.statements[position] = statement;
                id
            }
            None => self.insert(statement),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<FinancialStatement> {
        let position = self.statements.iter().position(|s| s.id == id)?;
        Some(self.statements.remove(position))
    }

    pub fn get(&self, id: &str) -> Option<&FinancialStatement> {
        self.statements.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FinancialStatement> {
        self.statements.iter()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn summary(&self) -> PortfolioSummary {
        let mut summary = PortfolioSummary {
            statement_count: self.statements.len(),
            ..Default::default()
        };

        for period in self.statements.iter().filter_map(|s| s.period(0)) {
            let income = period
                .section(SectionId::OperatingIncome)
                .and_then(|s| s.field(TOTAL_OPERATING_INCOME_KEY))
                .map_or(Decimal::ZERO, |f| parse_decimal(&f.value));
            let expenses = period
                .section(SectionId::OperatingExpense)
                .and_then(|s| s.field(TOTAL_OPERATING_EXPENSES_KEY))
                .map_or(Decimal::ZERO, |f| parse_decimal(&f.value));

            summary.total_income = checked_add(summary.total_income, income);
            summary.total_expenses = checked_add(summary.total_expenses, expenses);
            summary.net_income =
                checked_add(summary.net_income, parse_decimal(&period.net_income.value));
        }

        summary
    }
}

impl SaveHandler for StatementStore {
    fn save(&mut self, statement: &FinancialStatement) -> Result<()> {
        let id = self.upsert(statement.clone());
        info!("Stored statement '{}' ({} in store)", id, self.len());
        Ok(())
    }
}
