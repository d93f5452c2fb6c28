use crate::chart_of_accounts::{ChartOfAccounts, GROSS_PROFIT_LABEL, NET_INCOME_LABEL};
use crate::error::{Result, StatementError};
use crate::path::{write_location, DerivedField, FieldRef, Location, SectionRef};
use crate::schema::{
    EngineConfig, EntriesPolicy, Field, FinancialPeriod, FinancialStatement, Section, SectionId,
};
use crate::utils::{checked_add, checked_sub, format_decimal, sum_decimal_strings};
use log::debug;
use rust_decimal::Decimal;

/// Aggregates of one financial period, as written back by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTotals {
    pub operating_income: Decimal,
    /// Zero when the period has no Cogs section.
    pub cost_of_goods_sold: Decimal,
    /// Operating expense section alone, without cost of goods sold.
    pub operating_expense_section: Decimal,
    pub total_operating_expenses: Decimal,
    /// Only for charts that define a Cogs section.
    pub gross_profit: Option<Decimal>,
    pub net_income: Decimal,
}

/// Recomputes every derived field of a statement from its leaf values.
pub struct TotalsEngine<'a> {
    chart: &'a ChartOfAccounts,
    config: EngineConfig,
}

impl<'a> TotalsEngine<'a> {
    pub fn new(chart: &'a ChartOfAccounts, config: EngineConfig) -> Self {
        Self { chart, config }
    }

    /// Sum of a section's leaf fields and additional items, excluding `Total*` keys.
    ///
    /// Fails only when the chart has no such section; a section the chart knows
    /// but the period lacks sums to zero.
    pub fn section_total(&self, period: &FinancialPeriod, id: SectionId) -> Result<Decimal> {
        self.chart.section(id)?;
        Ok(period
            .section(id)
            .map(|section| self.sum_section(section))
            .unwrap_or(Decimal::ZERO))
    }

    fn sum_section(&self, section: &Section) -> Decimal {
        let leaves = section
            .fields
            .iter()
            .filter(|(key, _)| !self.chart.is_total_key(key))
            .map(|(_, field)| field.value.as_str());
        let additional = section
            .additional_line_items
            .iter()
            .map(|item| item.field.value.as_str());

        sum_decimal_strings(leaves.chain(additional))
    }

    /// Fails with `UnknownSection` when the period carries a Cogs section or a
    /// `GrossProfit` the chart's schema version does not have.
    pub fn period_totals(&self, period: &FinancialPeriod) -> Result<PeriodTotals> {
        self.check_period_shape(period)?;

        let operating_income = self.section_total(period, SectionId::OperatingIncome)?;
        let operating_expense_section = self.section_total(period, SectionId::OperatingExpense)?;

        let cost_of_goods_sold = if self.chart.has_section(SectionId::CostOfGoodsSold) {
            self.section_total(period, SectionId::CostOfGoodsSold)?
        } else {
            Decimal::ZERO
        };

        let total_operating_expenses = checked_add(cost_of_goods_sold, operating_expense_section);
        let gross_profit = self
            .chart
            .has_gross_profit()
            .then(|| checked_sub(operating_income, cost_of_goods_sold));
        let net_income = checked_sub(operating_income, total_operating_expenses);

        Ok(PeriodTotals {
            operating_income,
            cost_of_goods_sold,
            operating_expense_section,
            total_operating_expenses,
            gross_profit,
            net_income,
        })
    }

    fn check_period_shape(&self, period: &FinancialPeriod) -> Result<()> {
        let has_cogs = self.chart.has_section(SectionId::CostOfGoodsSold);
        let unknown = if period.expense.cogs.is_some() && !has_cogs {
            Some(SectionId::CostOfGoodsSold.to_string())
        } else if period.gross_profit.is_some() && !self.chart.has_gross_profit() {
            Some("GrossProfit".to_string())
        } else {
            None
        };

        match unknown {
            Some(section) => Err(StatementError::UnknownSection {
                section,
                form_type: self.chart.form_type.clone(),
                version: self.chart.version.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Returns a copy of `statement` with every derived field recomputed.
    ///
    /// Never fails on malformed leaf values (they count as zero). Running it on
    /// its own output changes nothing.
    pub fn recompute(&self, statement: &FinancialStatement) -> Result<FinancialStatement> {
        let mut updated = statement.clone();
        self.recompute_in_place(&mut updated)?;
        Ok(updated)
    }

    pub(crate) fn recompute_in_place(&self, statement: &mut FinancialStatement) -> Result<()> {
        for index in 0..statement.data.financials.len() {
            if self.config.entries_policy == EntriesPolicy::SumIntoParent {
                if let Some(period) = statement.data.financials.get_mut(index) {
                    self.sum_entries_into_parents(period);
                }
            }

            let totals = match statement.data.financials.get(index) {
                Some(period) => self.period_totals(period)?,
                None => continue,
            };

            self.write_period_totals(statement, index, &totals)?;

            debug!(
                "Recomputed period {}: income {}, expenses {}, net income {}",
                index, totals.operating_income, totals.total_operating_expenses, totals.net_income
            );
        }

        Ok(())
    }

    fn sum_entries_into_parents(&self, period: &mut FinancialPeriod) {
        for chart in &self.chart.sections {
            let Some(section) = period.section_mut(chart.id) else {
                continue;
            };

            for (key, field) in section.fields.iter_mut() {
                if !self.chart.is_total_key(key) {
                    sum_entries_into(field);
                }
            }
            for item in &mut section.additional_line_items {
                sum_entries_into(&mut item.field);
            }
        }
    }

    fn write_period_totals(
        &self,
        statement: &mut FinancialStatement,
        period: usize,
        totals: &PeriodTotals,
    ) -> Result<()> {
        let income = self.chart.section(SectionId::OperatingIncome)?;
        write_derived(
            statement,
            FieldRef::Section {
                section: SectionRef {
                    period,
                    section: SectionId::OperatingIncome,
                },
                key: income.total_key.to_string(),
            },
            income.total_label,
            totals.operating_income,
        )?;

        let has_cogs_section = statement
            .data
            .financials
            .get(period)
            .is_some_and(|p| p.expense.cogs.is_some());
        if has_cogs_section && self.chart.has_section(SectionId::CostOfGoodsSold) {
            let cogs = self.chart.section(SectionId::CostOfGoodsSold)?;
            write_derived(
                statement,
                FieldRef::Section {
                    section: SectionRef {
                        period,
                        section: SectionId::CostOfGoodsSold,
                    },
                    key: cogs.total_key.to_string(),
                },
                cogs.total_label,
                totals.cost_of_goods_sold,
            )?;
        }

        let expenses = self.chart.section(SectionId::OperatingExpense)?;
        write_derived(
            statement,
            FieldRef::Section {
                section: SectionRef {
                    period,
                    section: SectionId::OperatingExpense,
                },
                key: expenses.total_key.to_string(),
            },
            expenses.total_label,
            totals.total_operating_expenses,
        )?;

        if let Some(gross_profit) = totals.gross_profit {
            write_derived(
                statement,
                FieldRef::Derived {
                    period,
                    field: DerivedField::GrossProfit,
                },
                GROSS_PROFIT_LABEL,
                gross_profit,
            )?;
        }

        write_derived(
            statement,
            FieldRef::Derived {
                period,
                field: DerivedField::NetIncome,
            },
            NET_INCOME_LABEL,
            totals.net_income,
        )
    }
}

fn sum_entries_into(field: &mut Field) {
    if field.entries.is_empty() {
        return;
    }
    let sum = sum_decimal_strings(field.entries.iter().map(|e| e.value.as_str()));
    field.value = format_decimal(sum);
}

/// Writes a derived value through the path lens, creating the reserved field
/// with its canonical label when the loaded data lacks it.
fn write_derived(
    statement: &mut FinancialStatement,
    field_ref: FieldRef,
    label: &str,
    value: Decimal,
) -> Result<()> {
    match &field_ref {
        FieldRef::Section { section, key } => {
            if let Some(section) = section.get_mut(statement) {
                section
                    .fields
                    .entry(key.clone())
                    .or_insert_with(|| Field::new(label));
            }
        }
        FieldRef::Derived {
            period,
            field: DerivedField::GrossProfit,
        } => {
            if let Some(period) = statement.data.financials.get_mut(*period) {
                period
                    .gross_profit
                    .get_or_insert_with(|| Field::new(GROSS_PROFIT_LABEL));
            }
        }
        _ => {}
    }

    if let Some(field) = field_ref.get_mut(statement) {
        if field.field_label.trim().is_empty() {
            field.field_label = label.to_string();
        }
    }

    let path = field_ref.path();
    write_location(statement, &Location::Field(field_ref), &path, &format_decimal(value))
}

/// Recomputes all derived fields of `statement` with the given chart and config.
pub fn recompute_totals(
    chart: &ChartOfAccounts,
    config: &EngineConfig,
    statement: &FinancialStatement,
) -> Result<FinancialStatement> {
    TotalsEngine::new(chart, config.clone()).recompute(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_of_accounts::{
        canonical_schema, PROFIT_AND_LOSS_FORM_TYPE, TOTAL_COST_OF_GOODS_SOLD_KEY,
        TOTAL_OPERATING_EXPENSES_KEY, TOTAL_OPERATING_INCOME_KEY,
    };
    use crate::schema::{AdditionalLineItem, LineItem};
    use std::str::FromStr;

    fn chart() -> ChartOfAccounts {
        canonical_schema(PROFIT_AND_LOSS_FORM_TYPE).unwrap()
    }

    fn set_leaf(statement: &mut FinancialStatement, id: SectionId, key: &str, value: &str) {
        statement.data.financials[0]
            .section_mut(id)
            .unwrap()
            .field_mut(key)
            .unwrap()
            .value = value.to_string();
    }

    fn value_of(section: &Section, key: &str) -> String {
        section.field(key).unwrap().value.clone()
    }

    #[test]
    fn test_basic_totals() {
        let chart = chart();
        let mut statement = chart.new_statement("s", "d", "2023");
        set_leaf(&mut statement, SectionId::OperatingIncome, "RentalIncome", "100");
        set_leaf(&mut statement, SectionId::OperatingExpense, "Insurance", "40");

        let engine = TotalsEngine::new(&chart, EngineConfig::default());
        let result = engine.recompute(&statement).unwrap();
        let period = &result.data.financials[0];

        assert_eq!(value_of(&period.income.operating, TOTAL_OPERATING_INCOME_KEY), "100");
        assert_eq!(value_of(&period.expense.operating, TOTAL_OPERATING_EXPENSES_KEY), "40");
        assert_eq!(period.net_income.value, "60");
        assert_eq!(period.gross_profit.as_ref().unwrap().value, "100");
    }

    #[test]
    fn test_cogs_feeds_expenses_and_gross_profit() {
        let chart = chart();
        let mut statement = chart.new_statement("s", "d", "2023");
        set_leaf(&mut statement, SectionId::OperatingIncome, "SalesRevenue", "1000.50");
        set_leaf(&mut statement, SectionId::CostOfGoodsSold, "Purchases", "300.25");
        set_leaf(&mut statement, SectionId::OperatingExpense, "Rent", "200");

        let result = recompute_totals(&chart, &EngineConfig::default(), &statement).unwrap();
        let period = &result.data.financials[0];

        let cogs = period.expense.cogs.as_ref().unwrap();
        assert_eq!(value_of(cogs, TOTAL_COST_OF_GOODS_SOLD_KEY), "300.25");
        assert_eq!(value_of(&period.expense.operating, TOTAL_OPERATING_EXPENSES_KEY), "500.25");
        assert_eq!(period.gross_profit.as_ref().unwrap().value, "700.25");
        assert_eq!(period.net_income.value, "500.25");
    }

    #[test]
    fn test_additional_items_are_summed_and_totals_excluded() {
        let chart = chart();
        let mut statement = chart.new_statement("s", "d", "2023");
        set_leaf(&mut statement, SectionId::OperatingIncome, "RentalIncome", "100");
        set_leaf(&mut statement, SectionId::OperatingIncome, TOTAL_OPERATING_INCOME_KEY, "99999");
        let mut item = AdditionalLineItem::custom();
        item.field.value = "50".to_string();
        statement.data.financials[0]
            .income
            .operating
            .additional_line_items
            .push(item);

        let engine = TotalsEngine::new(&chart, EngineConfig::default());
        let totals = engine.period_totals(&statement.data.financials[0]).unwrap();
        assert_eq!(totals.operating_income, Decimal::from(150));
    }

    #[test]
    fn test_malformed_values_count_as_zero() {
        let chart = chart();
        let mut statement = chart.new_statement("s", "d", "2023");
        set_leaf(&mut statement, SectionId::OperatingIncome, "RentalIncome", "100");
        set_leaf(&mut statement, SectionId::OperatingIncome, "OtherRevenue", "abc");

        let engine = TotalsEngine::new(&chart, EngineConfig::default());
        let result = engine.recompute(&statement).unwrap();
        assert_eq!(result.data.financials[0].net_income.value, "100");
    }

    #[test]
    fn test_recompute_is_a_fixed_point() {
        let chart = chart();
        let mut statement = chart.new_statement("s", "d", "2023");
        set_leaf(&mut statement, SectionId::OperatingIncome, "FoodSales", "12.345");
        set_leaf(&mut statement, SectionId::CostOfGoodsSold, "CostOfLabor", "2");
        set_leaf(&mut statement, SectionId::OperatingExpense, "Utilities", "-1.5");

        let engine = TotalsEngine::new(&chart, EngineConfig::default());
        let once = engine.recompute(&statement).unwrap();
        let twice = engine.recompute(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_reserved_keys_are_created() {
        let chart = chart();
        let mut statement = chart.new_statement("s", "d", "2023");
        let period = &mut statement.data.financials[0];
        period.income.operating.fields.remove(TOTAL_OPERATING_INCOME_KEY);
        period.gross_profit = None;

        let result = recompute_totals(&chart, &EngineConfig::default(), &statement).unwrap();
        let period = &result.data.financials[0];
        let total = period.income.operating.field(TOTAL_OPERATING_INCOME_KEY).unwrap();
        assert_eq!(total.field_label, "Total Income");
        assert_eq!(total.value, "0");
        assert_eq!(period.gross_profit.as_ref().unwrap().field_label, GROSS_PROFIT_LABEL);
    }

    #[test]
    fn test_legacy_chart_skips_cogs() {
        let chart = ChartOfAccounts::lookup(PROFIT_AND_LOSS_FORM_TYPE, "legacy").unwrap();
        let mut statement = chart.new_statement("s", "d", "2023");
        set_leaf(&mut statement, SectionId::OperatingIncome, "RentalIncome", "10");

        let engine = TotalsEngine::new(&chart, EngineConfig::default());
        let result = engine.recompute(&statement).unwrap();
        let period = &result.data.financials[0];
        assert!(period.gross_profit.is_none());
        assert_eq!(period.net_income.value, "10");

        let err = engine
            .section_total(period, SectionId::CostOfGoodsSold)
            .unwrap_err();
        assert!(matches!(err, crate::error::StatementError::UnknownSection { .. }));
    }

    #[test]
    fn test_legacy_chart_rejects_cogs_and_gross_profit() {
        let legacy = ChartOfAccounts::lookup(PROFIT_AND_LOSS_FORM_TYPE, "legacy").unwrap();
        let latest = chart();
        let engine = TotalsEngine::new(&legacy, EngineConfig::default());

        let mut with_cogs = legacy.new_statement("s", "d", "2023");
        set_leaf(&mut with_cogs, SectionId::OperatingIncome, "RentalIncome", "100");
        with_cogs.data.financials[0].expense.cogs =
            Some(latest.section(SectionId::CostOfGoodsSold).unwrap().default_section());
        with_cogs.data.financials[0]
            .section_mut(SectionId::CostOfGoodsSold)
            .unwrap()
            .field_mut("Purchases")
            .unwrap()
            .value = "30".to_string();

        match engine.recompute(&with_cogs).unwrap_err() {
            StatementError::UnknownSection { section, version, .. } => {
                assert_eq!(section, SectionId::CostOfGoodsSold.to_string());
                assert_eq!(version, "legacy");
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut with_gross_profit = legacy.new_statement("s", "d", "2023");
        with_gross_profit.data.financials[0].gross_profit = Some(Field::with_value("", "999"));
        match engine.period_totals(&with_gross_profit.data.financials[0]).unwrap_err() {
            StatementError::UnknownSection { section, .. } => assert_eq!(section, "GrossProfit"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extracted_total_keys_are_not_summed() {
        let chart = chart();
        let mut statement = chart.new_statement("s", "d", "2023");
        set_leaf(&mut statement, SectionId::OperatingIncome, "RentalIncome", "100");
        statement.data.financials[0]
            .income
            .operating
            .fields
            .insert("TotalRevenue".to_string(), Field::with_value("Total Revenue", "100"));

        let result = recompute_totals(&chart, &EngineConfig::default(), &statement).unwrap();
        let period = &result.data.financials[0];
        assert_eq!(value_of(&period.income.operating, TOTAL_OPERATING_INCOME_KEY), "100");
        assert_eq!(value_of(&period.income.operating, "TotalRevenue"), "100");
        assert_eq!(period.net_income.value, "100");
    }

    #[test]
    fn test_entries_independent_by_default() {
        let chart = chart();
        let mut statement = chart.new_statement("s", "d", "2023");
        let field = statement.data.financials[0]
            .income
            .operating
            .field_mut("RentalIncome")
            .unwrap();
        field.value = "10".to_string();
        field.entries.push(LineItem::new("A", "30"));
        field.entries.push(LineItem::new("B", "20"));

        let result = recompute_totals(&chart, &EngineConfig::default(), &statement).unwrap();
        let period = &result.data.financials[0];
        assert_eq!(value_of(&period.income.operating, "RentalIncome"), "10");
        assert_eq!(value_of(&period.income.operating, TOTAL_OPERATING_INCOME_KEY), "10");
    }

    #[test]
    fn test_entries_summed_into_parent_when_configured() {
        let chart = chart();
        let mut statement = chart.new_statement("s", "d", "2023");
        let field = statement.data.financials[0]
            .income
            .operating
            .field_mut("RentalIncome")
            .unwrap();
        field.value = "10".to_string();
        field.entries.push(LineItem::new("A", "30"));
        field.entries.push(LineItem::new("B", "20"));

        let config = EngineConfig {
            entries_policy: EntriesPolicy::SumIntoParent,
        };
        let result = recompute_totals(&chart, &config, &statement).unwrap();
        let period = &result.data.financials[0];
        assert_eq!(value_of(&period.income.operating, "RentalIncome"), "50");
        assert_eq!(
            Decimal::from_str(&value_of(&period.income.operating, TOTAL_OPERATING_INCOME_KEY)).unwrap(),
            Decimal::from(50)
        );
    }
}
