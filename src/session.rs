//! Editing session over one statement.
//!
//! A session keeps the statement as it was opened (the baseline) next to the
//! working copy every edit produces. Saving hands the working copy to a
//! [`SaveHandler`]; cancelling returns the baseline untouched.

use crate::chart_of_accounts::{ChartOfAccounts, PROFIT_AND_LOSS_FORM_TYPE};
use crate::edits::{Edit, EditBatch};
use crate::engine::TotalsEngine;
use crate::error::Result;
use crate::path::{self, FieldPath, Node};
use crate::reconcile::reconcile;
use crate::schema::{EngineConfig, FinancialStatement};
use log::{debug, info};

/// Receives the working statement when a session is saved.
pub trait SaveHandler {
    fn save(&mut self, statement: &FinancialStatement) -> Result<()>;
}

impl<F> SaveHandler for F
where
    F: FnMut(&FinancialStatement) -> Result<()>,
{
    fn save(&mut self, statement: &FinancialStatement) -> Result<()> {
        self(statement)
    }
}

#[derive(Debug, Clone)]
pub struct EditSession {
    chart: ChartOfAccounts,
    config: EngineConfig,
    baseline: FinancialStatement,
    working: FinancialStatement,
}

impl EditSession {
    /// Opens a statement for editing: schema lookup, reconcile, recompute.
    ///
    /// A statement without a form type is treated as a profit and loss statement.
    pub fn open(statement: FinancialStatement, config: EngineConfig) -> Result<Self> {
        let form_type = if statement.form_type.is_empty() {
            PROFIT_AND_LOSS_FORM_TYPE
        } else {
            statement.form_type.as_str()
        };
        let chart = ChartOfAccounts::lookup(form_type, &statement.version)?;

        let mut working = reconcile(&chart, &statement);
        TotalsEngine::new(&chart, config.clone()).recompute_in_place(&mut working)?;

        info!(
            "Opened statement '{}' ({}, {}) for editing",
            working.id, chart.form_type, chart.version
        );

        Ok(Self {
            chart,
            config,
            baseline: statement,
            working,
        })
    }

    /// Starts a session on the canonical empty template of `form_type`.
    pub fn new_statement(
        form_type: &str,
        version: &str,
        id: impl Into<String>,
        document_id: impl Into<String>,
        year: impl Into<String>,
        config: EngineConfig,
    ) -> Result<Self> {
        let chart = ChartOfAccounts::lookup(form_type, version)?;
        let template = chart.new_statement(id, document_id, year);
        Self::open(template, config)
    }

    pub fn chart(&self) -> &ChartOfAccounts {
        &self.chart
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn baseline(&self) -> &FinancialStatement {
        &self.baseline
    }

    pub fn working(&self) -> &FinancialStatement {
        &self.working
    }

    pub fn get(&self, path: &FieldPath) -> Result<Node<'_>> {
        path::get(&self.working, path)
    }

    /// Applies one edit to the working copy. On error the working copy is unchanged.
    pub fn apply(&mut self, edit: &Edit) -> Result<&FinancialStatement> {
        self.working = edit.apply(&self.chart, &self.config, &self.working)?;
        debug!("Applied {:?} to statement '{}'", edit, self.working.id);
        Ok(&self.working)
    }

    pub fn apply_batch(&mut self, batch: &EditBatch) -> Result<&FinancialStatement> {
        self.working = batch.apply(&self.chart, &self.config, &self.working)?;
        debug!(
            "Applied batch of {} edits to statement '{}'",
            batch.edits.len(),
            self.working.id
        );
        Ok(&self.working)
    }

    /// Whether the working copy differs from the reconciled, recomputed baseline.
    pub fn is_dirty(&self) -> bool {
        let mut opened = reconcile(&self.chart, &self.baseline);
        if TotalsEngine::new(&self.chart, self.config.clone())
            .recompute_in_place(&mut opened)
            .is_err()
        {
            return true;
        }
        opened != self.working
    }

    /// Hands the working copy to `handler`. The session stays open.
    pub fn save<H: SaveHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        handler.save(&self.working)?;
        info!("Saved statement '{}'", self.working.id);
        Ok(())
    }

    /// Discards every edit and returns the statement exactly as it was opened.
    pub fn cancel(self) -> FinancialStatement {
        info!("Cancelled editing of statement '{}'", self.baseline.id);
        self.baseline
    }

    /// Ends the session, returning the working copy.
    pub fn into_working(self) -> FinancialStatement {
        self.working
    }
}
