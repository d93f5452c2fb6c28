//! Ordered-collection edits on a field's entries and on a section's additional items.
//!
//! Every function here is a pure transformation: the input statement is left
//! untouched and a new statement is returned. None of them recompute totals;
//! the outermost edit (see [`crate::edits`]) does that once.

use crate::error::{Result, StatementError};
use crate::path::{resolve, EntryAttr, FieldAttr, FieldPath, FieldRef, Location, SectionRef};
use crate::schema::{AdditionalLineItem, Field, FinancialStatement, LineItem, Section};

fn field_ref_at(statement: &FinancialStatement, path: &FieldPath) -> Result<FieldRef> {
    match resolve(statement, path)? {
        (Location::Field(field_ref), _) | (Location::Entries(field_ref), _) => Ok(field_ref),
        _ => Err(StatementError::PathNotFound {
            path: path.to_string(),
            details: "expected a field".to_string(),
        }),
    }
}

fn section_ref_at(statement: &FinancialStatement, path: &FieldPath) -> Result<SectionRef> {
    match resolve(statement, path)? {
        (Location::Section(section_ref), _) | (Location::AdditionalItems(section_ref), _) => {
            Ok(section_ref)
        }
        _ => Err(StatementError::PathNotFound {
            path: path.to_string(),
            details: "expected a section".to_string(),
        }),
    }
}

fn vanished(path: &FieldPath) -> StatementError {
    StatementError::PathNotFound {
        path: path.to_string(),
        details: "node disappeared during edit".to_string(),
    }
}

fn with_field<F>(statement: &FinancialStatement, path: &FieldPath, edit: F) -> Result<FinancialStatement>
where
    F: FnOnce(&mut Field) -> Result<()>,
{
    let field_ref = field_ref_at(statement, path)?;
    let mut updated = statement.clone();
    let field = field_ref.get_mut(&mut updated).ok_or_else(|| vanished(path))?;
    edit(field)?;
    Ok(updated)
}

fn with_section<F>(statement: &FinancialStatement, path: &FieldPath, edit: F) -> Result<FinancialStatement>
where
    F: FnOnce(&mut Section) -> Result<()>,
{
    let section_ref = section_ref_at(statement, path)?;
    let mut updated = statement.clone();
    let section = section_ref.get_mut(&mut updated).ok_or_else(|| vanished(path))?;
    edit(section)?;
    Ok(updated)
}

fn out_of_range(path: &FieldPath, index: usize, len: usize) -> StatementError {
    StatementError::IndexOutOfRange {
        path: path.to_string(),
        index,
        len,
    }
}

/// Appends a line item to the end of the addressed field's entries.
pub fn append_entry(
    statement: &FinancialStatement,
    field_path: &FieldPath,
    name: &str,
    value: &str,
) -> Result<FinancialStatement> {
    with_field(statement, field_path, |field| {
        field.entries.push(LineItem::new(name, value));
        Ok(())
    })
}

/// Appends the editor's placeholder row ("New <label> Item", "0").
pub fn append_placeholder_entry(
    statement: &FinancialStatement,
    field_path: &FieldPath,
) -> Result<FinancialStatement> {
    with_field(statement, field_path, |field| {
        let entry = LineItem::placeholder(&field.field_label);
        field.entries.push(entry);
        Ok(())
    })
}

/// Replaces the name or value of the entry at `index`; out of range is an error.
pub fn update_entry(
    statement: &FinancialStatement,
    field_path: &FieldPath,
    index: usize,
    attr: EntryAttr,
    value: &str,
) -> Result<FinancialStatement> {
    with_field(statement, field_path, |field| {
        let len = field.entries.len();
        let entry = field
            .entries
            .get_mut(index)
            .ok_or_else(|| out_of_range(field_path, index, len))?;
        match attr {
            EntryAttr::Name => entry.name = value.to_string(),
            EntryAttr::Value => entry.value = value.to_string(),
        }
        Ok(())
    })
}

/// Removes the entry at `index`, shifting later entries down. Out of range is a no-op.
pub fn remove_entry(
    statement: &FinancialStatement,
    field_path: &FieldPath,
    index: usize,
) -> Result<FinancialStatement> {
    with_field(statement, field_path, |field| {
        if index < field.entries.len() {
            field.entries.remove(index);
        }
        Ok(())
    })
}

/// Appends a "Custom Line Item" with value "0" to the section's additional items.
pub fn append_additional_item(
    statement: &FinancialStatement,
    section_path: &FieldPath,
) -> Result<FinancialStatement> {
    with_section(statement, section_path, |section| {
        section.additional_line_items.push(AdditionalLineItem::custom());
        Ok(())
    })
}

pub fn update_additional_item(
    statement: &FinancialStatement,
    section_path: &FieldPath,
    index: usize,
    attr: FieldAttr,
    value: &str,
) -> Result<FinancialStatement> {
    with_section(statement, section_path, |section| {
        let len = section.additional_line_items.len();
        let item = section
            .additional_line_items
            .get_mut(index)
            .ok_or_else(|| out_of_range(section_path, index, len))?;
        match attr {
            FieldAttr::Name => item.name = value.to_string(),
            FieldAttr::Value => item.field.value = value.to_string(),
            FieldAttr::Label => item.field.field_label = value.to_string(),
        }
        Ok(())
    })
}

pub fn remove_additional_item(
    statement: &FinancialStatement,
    section_path: &FieldPath,
    index: usize,
) -> Result<FinancialStatement> {
    with_section(statement, section_path, |section| {
        if index < section.additional_line_items.len() {
            section.additional_line_items.remove(index);
        }
        Ok(())
    })
}

/// Appends an entry to the additional item at `item_index`.
///
/// `None` for the name gives the placeholder "New <item name> Item".
pub fn append_additional_item_entry(
    statement: &FinancialStatement,
    section_path: &FieldPath,
    item_index: usize,
    name: Option<&str>,
    value: &str,
) -> Result<FinancialStatement> {
    with_section(statement, section_path, |section| {
        let len = section.additional_line_items.len();
        let item = section
            .additional_line_items
            .get_mut(item_index)
            .ok_or_else(|| out_of_range(section_path, item_index, len))?;
        let entry = match name {
            Some(name) => LineItem::new(name, value),
            None => LineItem::new(LineItem::placeholder(&item.name).name, value),
        };
        item.field.entries.push(entry);
        Ok(())
    })
}

pub fn update_additional_item_entry(
    statement: &FinancialStatement,
    section_path: &FieldPath,
    item_index: usize,
    entry_index: usize,
    attr: EntryAttr,
    value: &str,
) -> Result<FinancialStatement> {
    with_section(statement, section_path, |section| {
        let len = section.additional_line_items.len();
        let item = section
            .additional_line_items
            .get_mut(item_index)
            .ok_or_else(|| out_of_range(section_path, item_index, len))?;

        let entries = &mut item.field.entries;
        let len = entries.len();
        let entry = entries
            .get_mut(entry_index)
            .ok_or_else(|| out_of_range(section_path, entry_index, len))?;
        match attr {
            EntryAttr::Name => entry.name = value.to_string(),
            EntryAttr::Value => entry.value = value.to_string(),
        }
        Ok(())
    })
}

/// Removes one entry of one additional item. Either index out of range is a no-op.
pub fn remove_additional_item_entry(
    statement: &FinancialStatement,
    section_path: &FieldPath,
    item_index: usize,
    entry_index: usize,
) -> Result<FinancialStatement> {
    with_section(statement, section_path, |section| {
        if let Some(item) = section.additional_line_items.get_mut(item_index) {
            if entry_index < item.field.entries.len() {
                item.field.entries.remove(entry_index);
            }
        }
        Ok(())
    })
}
