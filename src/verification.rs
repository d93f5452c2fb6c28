use crate::chart_of_accounts::ChartOfAccounts;
use crate::engine::TotalsEngine;
use crate::error::{Result, StatementError};
use crate::path::{DerivedField, FieldRef, SectionRef};
use crate::schema::{EngineConfig, FinancialStatement};
use crate::utils::{format_decimal, parse_decimal};
use log::warn;
use rust_decimal::Decimal;

/// A stored derived value that disagrees with its recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsMismatch {
    pub path: String,
    pub stored: String,
    pub recomputed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationResult {
    pub mismatches: Vec<TotalsMismatch>,
}

impl VerificationResult {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compares every stored derived field with a fresh recomputation.
///
/// Useful on statements loaded from storage, whose totals may have been
/// written by another tool. A difference no larger than `tolerance` is accepted.
pub fn verify_totals(
    chart: &ChartOfAccounts,
    config: &EngineConfig,
    statement: &FinancialStatement,
    tolerance: Decimal,
) -> Result<VerificationResult> {
    let recomputed = TotalsEngine::new(chart, config.clone()).recompute(statement)?;
    let mut result = VerificationResult::default();

    for (index, expected) in recomputed.data.financials.iter().enumerate() {
        let mut derived = vec![FieldRef::Derived {
            period: index,
            field: DerivedField::NetIncome,
        }];
        if expected.gross_profit.is_some() {
            derived.push(FieldRef::Derived {
                period: index,
                field: DerivedField::GrossProfit,
            });
        }
        for section_chart in &chart.sections {
            if expected.section(section_chart.id).is_some() {
                derived.push(FieldRef::Section {
                    section: SectionRef {
                        period: index,
                        section: section_chart.id,
                    },
                    key: section_chart.total_key.to_string(),
                });
            }
        }

        for field_ref in derived {
            let want = field_ref
                .get(&recomputed)
                .map(|f| parse_decimal(&f.value))
                .unwrap_or(Decimal::ZERO);
            let stored_raw = field_ref
                .get(statement)
                .map(|f| f.value.clone())
                .unwrap_or_default();
            let have = parse_decimal(&stored_raw);

            let differs = match have.checked_sub(want) {
                Some(diff) => diff.abs() > tolerance,
                None => true,
            };
            if differs {
                let path = field_ref.path().to_string();
                warn!("Stored total at {} is {}, recomputed {}", path, stored_raw, want);
                result.mismatches.push(TotalsMismatch {
                    path,
                    stored: stored_raw,
                    recomputed: format_decimal(want),
                });
            }
        }
    }

    Ok(result)
}

/// Like [`verify_totals`] with zero tolerance, failing on the first mismatch.
pub fn ensure_totals_consistent(
    chart: &ChartOfAccounts,
    config: &EngineConfig,
    statement: &FinancialStatement,
) -> Result<()> {
    let result = verify_totals(chart, config, statement, Decimal::ZERO)?;
    match result.mismatches.into_iter().next() {
        None => Ok(()),
        Some(mismatch) => Err(StatementError::TotalsMismatch {
            path: mismatch.path,
            stored: mismatch.stored,
            recomputed: mismatch.recomputed,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_of_accounts::{canonical_schema, PROFIT_AND_LOSS_FORM_TYPE};
    use crate::engine::recompute_totals;
    use crate::schema::{Field, SectionId};

    fn chart() -> ChartOfAccounts {
        canonical_schema(PROFIT_AND_LOSS_FORM_TYPE).unwrap()
    }

    fn sample(chart: &ChartOfAccounts) -> FinancialStatement {
        let mut statement = chart.new_statement("s", "d", "2023");
        let period = &mut statement.data.financials[0];
        period
            .income
            .operating
            .fields
            .insert("RentalIncome".to_string(), Field::with_value("Rental Income", "100"));
        period
            .section_mut(SectionId::OperatingExpense)
            .unwrap()
            .fields
            .insert("Insurance".to_string(), Field::with_value("Insurance", "40"));
        statement
    }

    #[test]
    fn test_recomputed_statement_verifies() {
        let chart = chart();
        let config = EngineConfig::default();
        let statement = recompute_totals(&chart, &config, &sample(&chart)).unwrap();

        let result = verify_totals(&chart, &config, &statement, Decimal::ZERO).unwrap();
        assert!(result.is_consistent());
        assert!(ensure_totals_consistent(&chart, &config, &statement).is_ok());
    }

    #[test]
    fn test_stale_totals_are_reported() {
        let chart = chart();
        let config = EngineConfig::default();
        let mut statement = recompute_totals(&chart, &config, &sample(&chart)).unwrap();
        statement.data.financials[0].net_income.value = "61".to_string();

        let result = verify_totals(&chart, &config, &statement, Decimal::ZERO).unwrap();
        assert_eq!(result.mismatches.len(), 1);
        assert_eq!(result.mismatches[0].path, "/Financials/0/NetIncome");
        assert_eq!(result.mismatches[0].recomputed, "60");

        let lenient = verify_totals(&chart, &config, &statement, Decimal::ONE).unwrap();
        assert!(lenient.is_consistent());

        let err = ensure_totals_consistent(&chart, &config, &statement).unwrap_err();
        assert!(matches!(err, StatementError::TotalsMismatch { .. }));
    }

    #[test]
    fn test_extreme_stored_totals_are_reported() {
        let chart = chart();
        let config = EngineConfig::default();
        let mut extreme = sample(&chart);
        extreme.data.financials[0]
            .section_mut(SectionId::OperatingExpense)
            .unwrap()
            .field_mut("Insurance")
            .unwrap()
            .value = Decimal::MAX.to_string();
        let mut statement = recompute_totals(&chart, &config, &extreme).unwrap();
        statement.data.financials[0].net_income.value = Decimal::MAX.to_string();

        let result = verify_totals(&chart, &config, &statement, Decimal::ZERO).unwrap();
        assert_eq!(result.mismatches.len(), 1);
        assert_eq!(result.mismatches[0].path, "/Financials/0/NetIncome");
        assert_eq!(result.mismatches[0].stored, Decimal::MAX.to_string());
    }

    #[test]
    fn test_never_recomputed_statement_is_inconsistent() {
        let chart = chart();
        let result =
            verify_totals(&chart, &EngineConfig::default(), &sample(&chart), Decimal::ZERO).unwrap();
        assert!(!result.is_consistent());
    }
}
