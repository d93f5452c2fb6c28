use crate::chart_of_accounts::is_total_key;
use crate::schema::{FinancialStatement, Section, SectionId, ADDITIONAL_LINE_ITEMS_KEY};
use serde::Serialize;

/// One searchable field of a period, flattened out of its section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub section: SectionId,
    pub key: String,
    pub label: String,
    /// `"0"` when the stored value is empty.
    pub value: String,
}

/// Lists the fields of every section in `period`, in section then key order.
///
/// Additional line items are not included; a missing period yields nothing.
pub fn collect_fields(statement: &FinancialStatement, period: usize) -> Vec<FieldSummary> {
    let Some(period) = statement.period(period) else {
        return Vec::new();
    };

    SectionId::ALL
        .iter()
        .filter_map(|id| period.section(*id).map(|section| (*id, section)))
        .flat_map(|(id, section)| {
            section.fields.iter().map(move |(key, field)| FieldSummary {
                section: id,
                key: key.clone(),
                label: field.field_label.clone(),
                value: if field.value.is_empty() {
                    "0".to_string()
                } else {
                    field.value.clone()
                },
            })
        })
        .collect()
}

/// Case-insensitive match on the field label or the section's display name.
pub fn filter_fields<'a>(fields: &'a [FieldSummary], term: &str) -> Vec<&'a FieldSummary> {
    let term = term.to_lowercase();
    if term.is_empty() {
        return fields.iter().collect();
    }

    fields
        .iter()
        .filter(|f| {
            f.label.to_lowercase().contains(&term)
                || f.section.display_name().to_lowercase().contains(&term)
        })
        .collect()
}

/// Keys of `section` that stay visible under `term` in a section editor.
///
/// Totals always stay visible, as does the additional items group when the
/// section has any.
pub fn filter_section_keys<'a>(section: &'a Section, term: &str) -> Vec<&'a str> {
    let term = term.to_lowercase();

    let mut keys: Vec<&str> = section
        .fields
        .iter()
        .filter(|(key, field)| {
            is_total_key(key)
                || term.is_empty()
                || field.field_label.to_lowercase().contains(&term)
        })
        .map(|(key, _)| key.as_str())
        .collect();

    if !section.additional_line_items.is_empty() {
        keys.push(ADDITIONAL_LINE_ITEMS_KEY);
    }
    keys
}
