use crate::chart_of_accounts::{ChartOfAccounts, COMPANY_NAME_LABEL, DOCUMENT_DATE_LABEL};
use crate::error::Result;
use crate::schema::{Field, FinancialPeriod, FinancialStatement, Section, SectionId};
use crate::utils::humanize_key;
use log::{debug, info};

/// Merges one loaded field over its canonical default.
///
/// Loaded value, entries and extraction metadata always win; an empty loaded
/// label is back-filled from the canonical one.
pub fn merge_field(canonical: &Field, loaded: &Field) -> Field {
    let mut merged = loaded.clone();
    if merged.field_label.trim().is_empty() {
        merged.field_label = canonical.field_label.clone();
    }
    if merged.value.is_empty() && !canonical.value.is_empty() {
        merged.value = canonical.value.clone();
    }
    merged
}

/// Key-by-key merge of a loaded section over its canonical default.
///
/// Every canonical key ends up present; keys only the loaded section knows
/// about are kept, as are its additional line items.
pub fn merge_section(canonical: &Section, loaded: &Section) -> Section {
    let mut merged = loaded.clone();

    for (key, default) in &canonical.fields {
        match merged.fields.get_mut(key) {
            Some(existing) => *existing = merge_field(default, existing),
            None => {
                merged.fields.insert(key.clone(), default.clone());
            }
        }
    }

    for (key, field) in merged.fields.iter_mut() {
        if field.field_label.trim().is_empty() {
            field.field_label = humanize_key(key);
        }
    }

    for item in &mut merged.additional_line_items {
        if item.field.field_label.trim().is_empty() {
            item.field.field_label = item.name.clone();
        }
    }

    let added = merged.fields.len() - loaded.fields.len();
    if added > 0 {
        debug!("Back-filled {} missing fields from the canonical section", added);
    }

    merged
}

fn merge_optional_section(canonical: Option<&Section>, loaded: Option<&Section>) -> Option<Section> {
    match (canonical, loaded) {
        (Some(c), Some(l)) => Some(merge_section(c, l)),
        (Some(c), None) => Some(c.clone()),
        (None, l) => l.cloned(),
    }
}

fn merge_optional_field(canonical: Option<&Field>, loaded: Option<&Field>) -> Option<Field> {
    match (canonical, loaded) {
        (Some(c), Some(l)) => Some(merge_field(c, l)),
        (Some(c), None) => Some(c.clone()),
        (None, l) => l.cloned(),
    }
}

/// Merges a loaded financial period over the canonical default period.
pub fn reconcile_period(canonical: &FinancialPeriod, loaded: &FinancialPeriod) -> FinancialPeriod {
    let mut merged = loaded.clone();

    if merged.year.is_empty() {
        merged.year = canonical.year.clone();
    }

    merged.income.operating = merge_section(&canonical.income.operating, &loaded.income.operating);
    merged.expense.cogs =
        merge_optional_section(canonical.expense.cogs.as_ref(), loaded.expense.cogs.as_ref());
    merged.expense.operating =
        merge_section(&canonical.expense.operating, &loaded.expense.operating);

    merged.net_income = merge_field(&canonical.net_income, &loaded.net_income);
    merged.gross_profit =
        merge_optional_field(canonical.gross_profit.as_ref(), loaded.gross_profit.as_ref());

    merged
}

/// Reconciles one section against the chart, failing if the chart has no such section.
pub fn reconcile_section(
    chart: &ChartOfAccounts,
    id: SectionId,
    loaded: Option<&Section>,
) -> Result<Section> {
    let canonical = chart.section(id)?.default_section();
    Ok(match loaded {
        Some(section) => merge_section(&canonical, section),
        None => canonical,
    })
}

/// Reconciles a loaded statement so every known field and section exists.
///
/// Idempotent: reconciling an already reconciled statement changes nothing.
pub fn reconcile(chart: &ChartOfAccounts, loaded: &FinancialStatement) -> FinancialStatement {
    let mut merged = loaded.clone();

    if merged.form_type.is_empty() {
        merged.form_type = chart.form_type.clone();
    }
    if merged.version.is_empty() {
        merged.version = chart.version.to_string();
    }

    if loaded.data.financials.is_empty() {
        let year = loaded.year.clone().unwrap_or_default();
        merged.data.financials = vec![chart.default_period(year)];
    } else {
        merged.data.financials = loaded
            .data
            .financials
            .iter()
            .map(|period| reconcile_period(&chart.default_period(period.year.clone()), period))
            .collect();
    }

    merged.data.company_name = merge_field(&Field::new(COMPANY_NAME_LABEL), &loaded.data.company_name);
    merged.data.document_date =
        merge_field(&Field::new(DOCUMENT_DATE_LABEL), &loaded.data.document_date);

    info!(
        "Reconciled statement '{}' against {} ({}) with {} period(s)",
        merged.id,
        chart.form_type,
        chart.version,
        merged.data.financials.len()
    );

    merged
}
