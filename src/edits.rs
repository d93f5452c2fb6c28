use crate::chart_of_accounts::ChartOfAccounts;
use crate::engine::TotalsEngine;
use crate::error::{Result, StatementError};
use crate::line_items;
use crate::path::{self, resolve, EntryAttr, FieldAttr, FieldPath, Location, Node};
use crate::reconcile::reconcile_section;
use crate::schema::{EngineConfig, FinancialStatement, Section};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single user edit against a statement.
///
/// Edits are serializable so a host can queue, replay or log them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Edit {
    /// Replace the value at a path. Derived totals are rejected.
    SetValue {
        #[schemars(description = "JSON pointer or array path to a scalar or field.")]
        path: FieldPath,
        value: String,
    },

    /// Append a line item to a field's entries.
    AppendEntry {
        field: FieldPath,
        #[schemars(description = "Entry name. Defaults to 'New <field label> Item'.")]
        #[serde(default)]
        name: Option<String>,
        #[schemars(description = "Entry value. Defaults to '0'.")]
        #[serde(default)]
        value: Option<String>,
    },

    UpdateEntry {
        field: FieldPath,
        index: usize,
        attr: EntryAttr,
        value: String,
    },

    /// Remove an entry. An index past the end leaves the statement unchanged.
    RemoveEntry { field: FieldPath, index: usize },

    /// Append a 'Custom Line Item' to a section's additional items.
    AppendAdditionalItem { section: FieldPath },

    UpdateAdditionalItem {
        section: FieldPath,
        index: usize,
        attr: FieldAttr,
        value: String,
    },

    RemoveAdditionalItem { section: FieldPath, index: usize },

    AppendAdditionalItemEntry {
        section: FieldPath,
        item: usize,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        value: Option<String>,
    },

    UpdateAdditionalItemEntry {
        section: FieldPath,
        item: usize,
        index: usize,
        attr: EntryAttr,
        value: String,
    },

    RemoveAdditionalItemEntry {
        section: FieldPath,
        item: usize,
        index: usize,
    },

    /// Swap in a whole section, e.g. from a section dialog.
    /// Missing canonical keys are back-filled before it is stored.
    ReplaceSection {
        section: FieldPath,
        data: Section,
    },
}

const DEFAULT_ENTRY_VALUE: &str = "0";

impl Edit {
    /// Applies the edit without recomputing totals.
    pub fn apply_to(
        &self,
        chart: &ChartOfAccounts,
        statement: &FinancialStatement,
    ) -> Result<FinancialStatement> {
        match self {
            Edit::SetValue { path, value } => set_value(statement, path, value),
            Edit::AppendEntry { field, name, value } => match name {
                Some(name) => line_items::append_entry(
                    statement,
                    field,
                    name,
                    value.as_deref().unwrap_or(DEFAULT_ENTRY_VALUE),
                ),
                None => {
                    let updated = line_items::append_placeholder_entry(statement, field)?;
                    match value {
                        Some(value) => {
                            let last = last_entry_index(&updated, field)?;
                            line_items::update_entry(&updated, field, last, EntryAttr::Value, value)
                        }
                        None => Ok(updated),
                    }
                }
            },
            Edit::UpdateEntry {
                field,
                index,
                attr,
                value,
            } => line_items::update_entry(statement, field, *index, *attr, value),
            Edit::RemoveEntry { field, index } => line_items::remove_entry(statement, field, *index),
            Edit::AppendAdditionalItem { section } => {
                line_items::append_additional_item(statement, section)
            }
            Edit::UpdateAdditionalItem {
                section,
                index,
                attr,
                value,
            } => line_items::update_additional_item(statement, section, *index, *attr, value),
            Edit::RemoveAdditionalItem { section, index } => {
                line_items::remove_additional_item(statement, section, *index)
            }
            Edit::AppendAdditionalItemEntry {
                section,
                item,
                name,
                value,
            } => line_items::append_additional_item_entry(
                statement,
                section,
                *item,
                name.as_deref(),
                value.as_deref().unwrap_or(DEFAULT_ENTRY_VALUE),
            ),
            Edit::UpdateAdditionalItemEntry {
                section,
                item,
                index,
                attr,
                value,
            } => line_items::update_additional_item_entry(
                statement, section, *item, *index, *attr, value,
            ),
            Edit::RemoveAdditionalItemEntry {
                section,
                item,
                index,
            } => line_items::remove_additional_item_entry(statement, section, *item, *index),
            Edit::ReplaceSection { section, data } => {
                replace_section(chart, statement, section, data)
            }
        }
    }

    /// Applies the edit and recomputes every derived field.
    pub fn apply(
        &self,
        chart: &ChartOfAccounts,
        config: &EngineConfig,
        statement: &FinancialStatement,
    ) -> Result<FinancialStatement> {
        let mut updated = self.apply_to(chart, statement)?;
        TotalsEngine::new(chart, config.clone()).recompute_in_place(&mut updated)?;
        Ok(updated)
    }
}

fn set_value(statement: &FinancialStatement, path: &FieldPath, value: &str) -> Result<FinancialStatement> {
    let (location, _) = resolve(statement, path)?;
    match &location {
        Location::Field(field_ref) | Location::FieldAttr(field_ref, FieldAttr::Value)
            if field_ref.is_derived() =>
        {
            Err(StatementError::DerivedField(path.to_string()))
        }
        _ => path::set(statement, path, value),
    }
}

fn last_entry_index(statement: &FinancialStatement, field: &FieldPath) -> Result<usize> {
    let len = match path::get(statement, field)? {
        Node::Entries(entries) => entries.len(),
        node => node.as_field().map_or(0, |f| f.entries.len()),
    };
    len.checked_sub(1).ok_or_else(|| StatementError::PathNotFound {
        path: field.to_string(),
        details: "field has no entries".to_string(),
    })
}

fn replace_section(
    chart: &ChartOfAccounts,
    statement: &FinancialStatement,
    section_path: &FieldPath,
    data: &Section,
) -> Result<FinancialStatement> {
    let section_ref = match resolve(statement, section_path)? {
        (Location::Section(section_ref), _) => section_ref,
        _ => {
            return Err(StatementError::PathNotFound {
                path: section_path.to_string(),
                details: "expected a section".to_string(),
            })
        }
    };

    let reconciled = reconcile_section(chart, section_ref.section, Some(data))?;
    let mut updated = statement.clone();
    let target = section_ref
        .get_mut(&mut updated)
        .ok_or_else(|| StatementError::PathNotFound {
            path: section_path.to_string(),
            details: "section disappeared during edit".to_string(),
        })?;
    *target = reconciled;
    Ok(updated)
}

/// An ordered group of edits applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EditBatch {
    #[schemars(description = "Edits applied in order. Totals are recomputed once, after the last one.")]
    #[serde(default)]
    pub edits: Vec<Edit>,
}

impl EditBatch {
    pub fn new(edits: Vec<Edit>) -> Self {
        Self { edits }
    }

    /// Applies every edit in order, returning a new statement.
    /// If any edit fails, the error is returned and nothing is applied.
    pub fn apply(
        &self,
        chart: &ChartOfAccounts,
        config: &EngineConfig,
        statement: &FinancialStatement,
    ) -> Result<FinancialStatement> {
        let mut updated = statement.clone();

        for (i, edit) in self.edits.iter().enumerate() {
            updated = edit.apply_to(chart, &updated)?;
            debug!("Applied edit {} of {}", i + 1, self.edits.len());
        }

        TotalsEngine::new(chart, config.clone()).recompute_in_place(&mut updated)?;
        Ok(updated)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EditBatch)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// Applies one edit and recomputes totals.
pub fn apply_edit(
    chart: &ChartOfAccounts,
    config: &EngineConfig,
    statement: &FinancialStatement,
    edit: &Edit,
) -> Result<FinancialStatement> {
    edit.apply(chart, config, statement)
}
