//! Structural addressing of nodes inside a [`FinancialStatement`].
//!
//! A [`FieldPath`] is an ordered list of keys and indices, written either as a
//! JSON array (`["Financials", 0, "Income", "Operating", "RentalIncome"]`) or as
//! a JSON pointer (`/Financials/0/Income/Operating/RentalIncome`). Resolving a
//! path yields a typed [`Location`] over a closed set of node kinds; reads and
//! writes go through that location rather than through untyped JSON.

use crate::chart_of_accounts::is_total_key;
use crate::error::{Result, StatementError};
use crate::schema::{
    AdditionalLineItem, ExpenseSections, Field, FinancialPeriod, FinancialStatement,
    IncomeSections, LineItem, Section, SectionId, StatementStatus, ADDITIONAL_LINE_ITEMS_KEY,
};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Accepted on the wire either as a segment array or as a JSON pointer string;
/// always written back as an array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct FieldPath(Vec<PathSegment>);

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Pointer(String),
            Segments(Vec<PathSegment>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Pointer(pointer) => pointer.parse().map_err(de::Error::custom),
            Repr::Segments(segments) => Ok(Self(segments)),
        }
    }
}

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn period(index: usize) -> Self {
        Self::root().key("Financials").index(index)
    }

    pub fn section(period: usize, section: SectionId) -> Self {
        let [group, name] = section.path_keys();
        Self::period(period).key(group).key(name)
    }

    pub fn section_field(period: usize, section: SectionId, key: &str) -> Self {
        Self::section(period, section).key(key)
    }

    pub fn additional_item(period: usize, section: SectionId, index: usize) -> Self {
        Self::section(period, section)
            .key(ADDITIONAL_LINE_ITEMS_KEY)
            .index(index)
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for FieldPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<PathSegment>> for FieldPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            match segment {
                PathSegment::Index(i) => write!(f, "/{}", i)?,
                PathSegment::Key(k) => write!(f, "/{}", k.replace('~', "~0").replace('/', "~1"))?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = StatementError;

    /// Parses a JSON pointer. The empty string is the statement root.
    fn from_str(pointer: &str) -> Result<Self> {
        if pointer.is_empty() {
            return Ok(Self::root());
        }

        let rest = pointer
            .strip_prefix('/')
            .ok_or_else(|| StatementError::InvalidPath(pointer.to_string()))?;

        let mut segments = Vec::new();
        for token in rest.split('/') {
            if token.is_empty() {
                return Err(StatementError::InvalidPath(pointer.to_string()));
            }
            let segment = match token.parse::<usize>() {
                Ok(index) => PathSegment::Index(index),
                Err(_) => PathSegment::Key(token.replace("~1", "/").replace("~0", "~")),
            };
            segments.push(segment);
        }

        Ok(Self(segments))
    }
}

/// Scalar attributes of the statement envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    Id,
    DocumentId,
    Type,
    Subtype,
    FormType,
    ExtractedAt,
    Status,
    Year,
    Version,
}

impl MetaKey {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "id" => MetaKey::Id,
            "documentId" => MetaKey::DocumentId,
            "type" => MetaKey::Type,
            "subtype" => MetaKey::Subtype,
            "formType" => MetaKey::FormType,
            "extractedAt" => MetaKey::ExtractedAt,
            "status" => MetaKey::Status,
            "year" => MetaKey::Year,
            "version" => MetaKey::Version,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentField {
    CompanyName,
    DocumentDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedField {
    NetIncome,
    GrossProfit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRef {
    pub period: usize,
    pub section: SectionId,
}

impl SectionRef {
    pub fn get<'a>(&self, statement: &'a FinancialStatement) -> Option<&'a Section> {
        statement
            .data
            .financials
            .get(self.period)
            .and_then(|p| p.section(self.section))
    }

    pub fn get_mut<'a>(&self, statement: &'a mut FinancialStatement) -> Option<&'a mut Section> {
        statement
            .data
            .financials
            .get_mut(self.period)
            .and_then(|p| p.section_mut(self.section))
    }
}

/// A lens onto one Field-shaped node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Document(DocumentField),
    Derived { period: usize, field: DerivedField },
    Section { section: SectionRef, key: String },
    Additional { section: SectionRef, index: usize },
}

impl FieldRef {
    pub fn get<'a>(&self, statement: &'a FinancialStatement) -> Option<&'a Field> {
        match self {
            FieldRef::Document(DocumentField::CompanyName) => Some(&statement.data.company_name),
            FieldRef::Document(DocumentField::DocumentDate) => Some(&statement.data.document_date),
            FieldRef::Derived { period, field } => {
                let period = statement.data.financials.get(*period)?;
                match field {
                    DerivedField::NetIncome => Some(&period.net_income),
                    DerivedField::GrossProfit => period.gross_profit.as_ref(),
                }
            }
            FieldRef::Section { section, key } => section.get(statement)?.fields.get(key),
            FieldRef::Additional { section, index } => section
                .get(statement)?
                .additional_line_items
                .get(*index)
                .map(|item| &item.field),
        }
    }

    pub fn get_mut<'a>(&self, statement: &'a mut FinancialStatement) -> Option<&'a mut Field> {
        match self {
            FieldRef::Document(DocumentField::CompanyName) => {
                Some(&mut statement.data.company_name)
            }
            FieldRef::Document(DocumentField::DocumentDate) => {
                Some(&mut statement.data.document_date)
            }
            FieldRef::Derived { period, field } => {
                let period = statement.data.financials.get_mut(*period)?;
                match field {
                    DerivedField::NetIncome => Some(&mut period.net_income),
                    DerivedField::GrossProfit => period.gross_profit.as_mut(),
                }
            }
            FieldRef::Section { section, key } => section.get_mut(statement)?.fields.get_mut(key),
            FieldRef::Additional { section, index } => section
                .get_mut(statement)?
                .additional_line_items
                .get_mut(*index)
                .map(|item| &mut item.field),
        }
    }

    fn additional_mut<'a>(
        &self,
        statement: &'a mut FinancialStatement,
    ) -> Option<&'a mut AdditionalLineItem> {
        match self {
            FieldRef::Additional { section, index } => section
                .get_mut(statement)?
                .additional_line_items
                .get_mut(*index),
            _ => None,
        }
    }

    pub fn path(&self) -> FieldPath {
        match self {
            FieldRef::Document(DocumentField::CompanyName) => FieldPath::root().key("CompanyName"),
            FieldRef::Document(DocumentField::DocumentDate) => FieldPath::root().key("DocumentDate"),
            FieldRef::Derived { period, field } => FieldPath::period(*period).key(match field {
                DerivedField::NetIncome => "NetIncome",
                DerivedField::GrossProfit => "GrossProfit",
            }),
            FieldRef::Section { section, key } => {
                FieldPath::section_field(section.period, section.section, key)
            }
            FieldRef::Additional { section, index } => {
                FieldPath::additional_item(section.period, section.section, *index)
            }
        }
    }

    /// Derived fields are recomputed from leaves and never edited directly.
    pub fn is_derived(&self) -> bool {
        match self {
            FieldRef::Derived { .. } => true,
            FieldRef::Section { key, .. } => is_total_key(key),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum FieldAttr {
    #[serde(rename = "value")]
    Value,
    #[serde(rename = "fieldLabel")]
    Label,
    /// Only additional line items carry a name.
    #[serde(rename = "name")]
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum EntryAttr {
    Name,
    Value,
}

/// Where a path points, validated against a concrete statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Root,
    Meta(MetaKey),
    ReportingDates,
    ReportingDate(usize),
    Financials,
    Period(usize),
    Year(usize),
    Income(usize),
    Expense(usize),
    Section(SectionRef),
    AdditionalItems(SectionRef),
    Field(FieldRef),
    FieldAttr(FieldRef, FieldAttr),
    Entries(FieldRef),
    Entry(FieldRef, usize),
    EntryAttr(FieldRef, usize, EntryAttr),
}

/// Read-only view of the node a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'a> {
    Statement(&'a FinancialStatement),
    Financials(&'a [FinancialPeriod]),
    Period(&'a FinancialPeriod),
    Income(&'a IncomeSections),
    Expense(&'a ExpenseSections),
    Section(&'a Section),
    AdditionalItems(&'a [AdditionalLineItem]),
    AdditionalItem(&'a AdditionalLineItem),
    Field(&'a Field),
    Entries(&'a [LineItem]),
    Entry(&'a LineItem),
    ReportingDates(&'a [String]),
    Scalar(&'a str),
    Timestamp(&'a DateTime<Utc>),
    Null,
}

impl<'a> Node<'a> {
    /// The amount or text a leaf-ish node carries. Containers return `None`.
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Node::Scalar(s) => Some(s),
            Node::Field(f) => Some(&f.value),
            Node::AdditionalItem(item) => Some(&item.field.value),
            Node::Entry(e) => Some(&e.value),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&'a Field> {
        match self {
            Node::Field(f) => Some(f),
            Node::AdditionalItem(item) => Some(&item.field),
            _ => None,
        }
    }
}

struct Cursor<'p> {
    path: &'p FieldPath,
    pos: usize,
}

impl<'p> Cursor<'p> {
    fn new(path: &'p FieldPath) -> Self {
        Self { path, pos: 0 }
    }

    fn next(&mut self) -> Option<&'p PathSegment> {
        let segment = self.path.0.get(self.pos);
        if segment.is_some() {
            self.pos += 1;
        }
        segment
    }

    fn not_found(&self, details: impl Into<String>) -> StatementError {
        StatementError::PathNotFound {
            path: self.path.to_string(),
            details: details.into(),
        }
    }

    fn key(&self, segment: &'p PathSegment) -> Result<&'p str> {
        match segment {
            PathSegment::Key(k) => Ok(k),
            PathSegment::Index(i) => Err(self.not_found(format!("expected a key, found index {}", i))),
        }
    }

    fn index(&self, segment: &PathSegment) -> Result<usize> {
        match segment {
            PathSegment::Index(i) => Ok(*i),
            PathSegment::Key(k) => Err(self.not_found(format!("expected an index, found key '{}'", k))),
        }
    }

    fn finish<T>(&mut self, resolved: T) -> Result<T> {
        match self.next() {
            None => Ok(resolved),
            Some(extra) => Err(self.not_found(format!("cannot descend into a value at {:?}", extra))),
        }
    }
}

#[derive(Clone, Copy)]
enum FieldView<'a> {
    Plain(&'a Field),
    Additional(&'a AdditionalLineItem),
}

impl<'a> FieldView<'a> {
    fn field(&self) -> &'a Field {
        match *self {
            FieldView::Plain(f) => f,
            FieldView::Additional(item) => &item.field,
        }
    }

    fn node(&self) -> Node<'a> {
        match *self {
            FieldView::Plain(f) => Node::Field(f),
            FieldView::Additional(item) => Node::AdditionalItem(item),
        }
    }
}

/// Resolves `path` against `statement`, requiring every step to exist.
pub fn resolve<'a>(statement: &'a FinancialStatement, path: &FieldPath) -> Result<(Location, Node<'a>)> {
    let mut cur = Cursor::new(path);
    let Some(first) = cur.next() else {
        return Ok((Location::Root, Node::Statement(statement)));
    };

    match cur.key(first)? {
        "Financials" => {
            let periods = &statement.data.financials;
            match cur.next() {
                None => Ok((Location::Financials, Node::Financials(periods))),
                Some(segment) => {
                    let index = cur.index(segment)?;
                    let period = periods.get(index).ok_or_else(|| {
                        cur.not_found(format!(
                            "no financial period at index {} ({} periods)",
                            index,
                            periods.len()
                        ))
                    })?;
                    resolve_period(&mut cur, index, period)
                }
            }
        }
        "CompanyName" => resolve_field(
            &mut cur,
            FieldRef::Document(DocumentField::CompanyName),
            FieldView::Plain(&statement.data.company_name),
        ),
        "DocumentDate" => resolve_field(
            &mut cur,
            FieldRef::Document(DocumentField::DocumentDate),
            FieldView::Plain(&statement.data.document_date),
        ),
        "ReportingDates" => {
            let dates = &statement.data.reporting_dates;
            match cur.next() {
                None => Ok((Location::ReportingDates, Node::ReportingDates(dates))),
                Some(segment) => {
                    let index = cur.index(segment)?;
                    let date = dates.get(index).ok_or_else(|| {
                        cur.not_found(format!("no reporting date at index {}", index))
                    })?;
                    cur.finish((Location::ReportingDate(index), Node::Scalar(date)))
                }
            }
        }
        other => {
            let meta = MetaKey::from_key(other)
                .ok_or_else(|| cur.not_found(format!("unknown statement key '{}'", other)))?;
            cur.finish((Location::Meta(meta), meta_node(statement, meta)))
        }
    }
}

fn meta_node(statement: &FinancialStatement, key: MetaKey) -> Node<'_> {
    match key {
        MetaKey::Id => Node::Scalar(&statement.id),
        MetaKey::DocumentId => Node::Scalar(&statement.document_id),
        MetaKey::Type => Node::Scalar(&statement.statement_type),
        MetaKey::Subtype => statement.subtype.as_deref().map_or(Node::Null, Node::Scalar),
        MetaKey::FormType => Node::Scalar(&statement.form_type),
        MetaKey::ExtractedAt => statement.extracted_at.as_ref().map_or(Node::Null, Node::Timestamp),
        MetaKey::Status => Node::Scalar(statement.status.as_str()),
        MetaKey::Year => statement.year.as_deref().map_or(Node::Null, Node::Scalar),
        MetaKey::Version => Node::Scalar(&statement.version),
    }
}

fn resolve_period<'a>(
    cur: &mut Cursor<'_>,
    index: usize,
    period: &'a FinancialPeriod,
) -> Result<(Location, Node<'a>)> {
    let Some(segment) = cur.next() else {
        return Ok((Location::Period(index), Node::Period(period)));
    };

    match cur.key(segment)? {
        "Year" => cur.finish((Location::Year(index), Node::Scalar(&period.year))),
        "NetIncome" => resolve_field(
            cur,
            FieldRef::Derived {
                period: index,
                field: DerivedField::NetIncome,
            },
            FieldView::Plain(&period.net_income),
        ),
        "GrossProfit" => {
            let field = period
                .gross_profit
                .as_ref()
                .ok_or_else(|| cur.not_found("period has no GrossProfit field"))?;
            resolve_field(
                cur,
                FieldRef::Derived {
                    period: index,
                    field: DerivedField::GrossProfit,
                },
                FieldView::Plain(field),
            )
        }
        group @ ("Income" | "Expense") => {
            let Some(segment) = cur.next() else {
                return Ok(if group == "Income" {
                    (Location::Income(index), Node::Income(&period.income))
                } else {
                    (Location::Expense(index), Node::Expense(&period.expense))
                });
            };
            let name = cur.key(segment)?;
            let id = SectionId::from_path_keys(group, name)
                .ok_or_else(|| cur.not_found(format!("unknown section {}/{}", group, name)))?;
            let section = period
                .section(id)
                .ok_or_else(|| cur.not_found(format!("section {} is absent", id)))?;
            resolve_section(
                cur,
                SectionRef {
                    period: index,
                    section: id,
                },
                section,
            )
        }
        other => Err(cur.not_found(format!("unknown period key '{}'", other))),
    }
}

fn resolve_section<'a>(
    cur: &mut Cursor<'_>,
    section_ref: SectionRef,
    section: &'a Section,
) -> Result<(Location, Node<'a>)> {
    let Some(segment) = cur.next() else {
        return Ok((Location::Section(section_ref), Node::Section(section)));
    };

    let key = cur.key(segment)?;
    if key == ADDITIONAL_LINE_ITEMS_KEY {
        let items = &section.additional_line_items;
        let Some(segment) = cur.next() else {
            return Ok((
                Location::AdditionalItems(section_ref),
                Node::AdditionalItems(items),
            ));
        };
        let index = cur.index(segment)?;
        let item = items.get(index).ok_or_else(|| {
            cur.not_found(format!(
                "no additional line item at index {} ({} items)",
                index,
                items.len()
            ))
        })?;
        return resolve_field(
            cur,
            FieldRef::Additional {
                section: section_ref,
                index,
            },
            FieldView::Additional(item),
        );
    }

    let field = section
        .fields
        .get(key)
        .ok_or_else(|| cur.not_found(format!("section {} has no field '{}'", section_ref.section, key)))?;
    resolve_field(
        cur,
        FieldRef::Section {
            section: section_ref,
            key: key.to_string(),
        },
        FieldView::Plain(field),
    )
}

fn resolve_field<'a>(
    cur: &mut Cursor<'_>,
    field_ref: FieldRef,
    view: FieldView<'a>,
) -> Result<(Location, Node<'a>)> {
    let Some(segment) = cur.next() else {
        return Ok((Location::Field(field_ref), view.node()));
    };

    let field = view.field();
    match (cur.key(segment)?, view) {
        ("value", _) => cur.finish((
            Location::FieldAttr(field_ref, FieldAttr::Value),
            Node::Scalar(&field.value),
        )),
        ("fieldLabel", _) => cur.finish((
            Location::FieldAttr(field_ref, FieldAttr::Label),
            Node::Scalar(&field.field_label),
        )),
        ("name", FieldView::Additional(item)) => cur.finish((
            Location::FieldAttr(field_ref, FieldAttr::Name),
            Node::Scalar(&item.name),
        )),
        ("entries", _) => {
            let Some(segment) = cur.next() else {
                return Ok((Location::Entries(field_ref), Node::Entries(&field.entries)));
            };
            let index = cur.index(segment)?;
            let entry = field.entries.get(index).ok_or_else(|| {
                cur.not_found(format!(
                    "no entry at index {} ({} entries)",
                    index,
                    field.entries.len()
                ))
            })?;
            let Some(segment) = cur.next() else {
                return Ok((Location::Entry(field_ref, index), Node::Entry(entry)));
            };
            let resolved = match cur.key(segment)? {
                "name" => (
                    Location::EntryAttr(field_ref, index, EntryAttr::Name),
                    Node::Scalar(&entry.name),
                ),
                "value" => (
                    Location::EntryAttr(field_ref, index, EntryAttr::Value),
                    Node::Scalar(&entry.value),
                ),
                other => return Err(cur.not_found(format!("unknown entry attribute '{}'", other))),
            };
            cur.finish(resolved)
        }
        (other, _) => Err(cur.not_found(format!("unknown field attribute '{}'", other))),
    }
}

pub fn get<'a>(statement: &'a FinancialStatement, path: &FieldPath) -> Result<Node<'a>> {
    resolve(statement, path).map(|(_, node)| node)
}

/// Returns a new statement with the node at `path` replaced by `value`.
///
/// Field-shaped nodes (fields, additional items, line items) keep their label
/// and entries; only their `value` changes. Scalars are replaced directly.
/// Containers cannot be set. The input statement is never modified.
pub fn set(statement: &FinancialStatement, path: &FieldPath, value: &str) -> Result<FinancialStatement> {
    let (location, _) = resolve(statement, path)?;
    let mut updated = statement.clone();
    write_location(&mut updated, &location, path, value)?;
    Ok(updated)
}

pub(crate) fn write_location(
    statement: &mut FinancialStatement,
    location: &Location,
    path: &FieldPath,
    value: &str,
) -> Result<()> {
    let gone = || StatementError::PathNotFound {
        path: path.to_string(),
        details: "node disappeared during write".to_string(),
    };

    match location {
        Location::Meta(key) => write_meta(statement, *key, path, value)?,
        Location::ReportingDate(index) => {
            *statement
                .data
                .reporting_dates
                .get_mut(*index)
                .ok_or_else(gone)? = value.to_string();
        }
        Location::Year(index) => {
            statement.data.financials.get_mut(*index).ok_or_else(gone)?.year = value.to_string();
        }
        Location::Field(field_ref) | Location::FieldAttr(field_ref, FieldAttr::Value) => {
            field_ref.get_mut(statement).ok_or_else(gone)?.value = value.to_string();
        }
        Location::FieldAttr(field_ref, FieldAttr::Label) => {
            field_ref.get_mut(statement).ok_or_else(gone)?.field_label = value.to_string();
        }
        Location::FieldAttr(field_ref, FieldAttr::Name) => {
            field_ref.additional_mut(statement).ok_or_else(gone)?.name = value.to_string();
        }
        Location::Entry(field_ref, index)
        | Location::EntryAttr(field_ref, index, EntryAttr::Value) => {
            let field = field_ref.get_mut(statement).ok_or_else(gone)?;
            field.entries.get_mut(*index).ok_or_else(gone)?.value = value.to_string();
        }
        Location::EntryAttr(field_ref, index, EntryAttr::Name) => {
            let field = field_ref.get_mut(statement).ok_or_else(gone)?;
            field.entries.get_mut(*index).ok_or_else(gone)?.name = value.to_string();
        }
        Location::Root
        | Location::ReportingDates
        | Location::Financials
        | Location::Period(_)
        | Location::Income(_)
        | Location::Expense(_)
        | Location::Section(_)
        | Location::AdditionalItems(_)
        | Location::Entries(_) => return Err(StatementError::NotALeaf(path.to_string())),
    }

    Ok(())
}

fn write_meta(
    statement: &mut FinancialStatement,
    key: MetaKey,
    path: &FieldPath,
    value: &str,
) -> Result<()> {
    let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

    match key {
        MetaKey::Id => statement.id = value.to_string(),
        MetaKey::DocumentId => statement.document_id = value.to_string(),
        MetaKey::Type => statement.statement_type = value.to_string(),
        MetaKey::Subtype => statement.subtype = optional(value),
        // These select the chart a session was opened with, or record extraction.
        MetaKey::FormType | MetaKey::Version | MetaKey::ExtractedAt => {
            return Err(StatementError::ReadOnly(path.to_string()))
        }
        MetaKey::Status => statement.status = StatementStatus::from(value.to_string()),
        MetaKey::Year => statement.year = optional(value),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_of_accounts::{canonical_schema, PROFIT_AND_LOSS_FORM_TYPE};

    fn template() -> FinancialStatement {
        canonical_schema(PROFIT_AND_LOSS_FORM_TYPE)
            .unwrap()
            .new_statement("s-1", "doc-1", "2023")
    }

    #[test]
    fn test_pointer_round_trip() {
        let path: FieldPath = "/Financials/0/Income/Operating/RentalIncome".parse().unwrap();
        assert_eq!(
            path,
            FieldPath::section_field(0, SectionId::OperatingIncome, "RentalIncome")
        );
        assert_eq!(path.to_string(), "/Financials/0/Income/Operating/RentalIncome");

        let escaped: FieldPath = "/a~1b/c~0d".parse().unwrap();
        assert_eq!(escaped.segments()[0], PathSegment::Key("a/b".to_string()));
        assert_eq!(escaped.to_string(), "/a~1b/c~0d");

        assert!("Financials/0".parse::<FieldPath>().is_err());
        assert!("/Financials//0".parse::<FieldPath>().is_err());
    }

    #[test]
    fn test_path_serializes_as_mixed_array() {
        let path = FieldPath::section_field(0, SectionId::OperatingExpense, "Insurance");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["Financials",0,"Expense","Operating","Insurance"]"#);

        let back: FieldPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);

        let pointer: FieldPath =
            serde_json::from_str(r#""/Financials/0/Expense/Operating/Insurance""#).unwrap();
        assert_eq!(pointer, path);
        assert!(serde_json::from_str::<FieldPath>(r#""no-slash""#).is_err());
    }

    #[test]
    fn test_get_field_and_scalar() {
        let statement = template();
        let node = get(
            &statement,
            &FieldPath::section_field(0, SectionId::OperatingIncome, "RentalIncome"),
        )
        .unwrap();
        assert_eq!(node.as_field().unwrap().field_label, "Rental Income");

        let year = get(&statement, &FieldPath::period(0).key("Year")).unwrap();
        assert_eq!(year.as_str(), Some("2023"));

        let subtype = get(&statement, &FieldPath::root().key("subtype")).unwrap();
        assert_eq!(subtype, Node::Null);
    }

    #[test]
    fn test_set_field_replaces_only_value() {
        let mut statement = template();
        statement.data.financials[0]
            .income
            .operating
            .field_mut("RentalIncome")
            .unwrap()
            .entries
            .push(LineItem::new("Unit A", "30"));

        let path = FieldPath::section_field(0, SectionId::OperatingIncome, "RentalIncome");
        let updated = set(&statement, &path, "100").unwrap();

        let field = updated.data.financials[0].income.operating.field("RentalIncome").unwrap();
        assert_eq!(field.value, "100");
        assert_eq!(field.field_label, "Rental Income");
        assert_eq!(field.entries.len(), 1);

        let original = statement.data.financials[0].income.operating.field("RentalIncome").unwrap();
        assert_eq!(original.value, "");
    }

    #[test]
    fn test_set_plain_scalars() {
        let statement = template();
        let updated = set(&statement, &FieldPath::root().key("CompanyName"), "Charles Evans").unwrap();
        assert_eq!(updated.data.company_name.value, "Charles Evans");
        assert_eq!(updated.data.company_name.field_label, "Company Name");

        let updated = set(&updated, &FieldPath::root().key("status"), "Completed").unwrap();
        assert_eq!(updated.status, StatementStatus::Completed);

        let updated = set(&updated, &FieldPath::root().key("subtype"), "Annual").unwrap();
        assert_eq!(updated.subtype.as_deref(), Some("Annual"));

        for key in ["extractedAt", "formType", "version"] {
            let err = set(&updated, &FieldPath::root().key(key), "2024-01-01T00:00:00Z").unwrap_err();
            assert!(matches!(err, StatementError::ReadOnly(_)));
        }
        assert_eq!(updated.version, statement.version);
    }

    #[test]
    fn test_set_rejects_missing_and_container_paths() {
        let statement = template();

        let missing = FieldPath::section_field(0, SectionId::OperatingIncome, "NoSuchKey");
        assert!(matches!(
            set(&statement, &missing, "1"),
            Err(StatementError::PathNotFound { .. })
        ));

        let out_of_range = FieldPath::period(3).key("Year");
        assert!(matches!(
            set(&statement, &out_of_range, "2020"),
            Err(StatementError::PathNotFound { .. })
        ));

        let container = FieldPath::section(0, SectionId::OperatingIncome);
        assert!(matches!(
            set(&statement, &container, "1"),
            Err(StatementError::NotALeaf(_))
        ));

        let past_leaf = FieldPath::root().key("id").key("deeper");
        assert!(matches!(
            get(&statement, &past_leaf),
            Err(StatementError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_absent_cogs_is_not_created() {
        let chart = crate::chart_of_accounts::ChartOfAccounts::lookup(PROFIT_AND_LOSS_FORM_TYPE, "legacy").unwrap();
        let statement = chart.new_statement("s", "d", "2023");
        let path = FieldPath::section_field(0, SectionId::CostOfGoodsSold, "Purchases");
        assert!(matches!(
            set(&statement, &path, "10"),
            Err(StatementError::PathNotFound { .. })
        ));
        assert!(statement.data.financials[0].expense.cogs.is_none());
    }

    #[test]
    fn test_entry_and_additional_item_attributes() {
        let mut statement = template();
        let section = &mut statement.data.financials[0].income.operating;
        let mut item = AdditionalLineItem::custom();
        item.field.entries.push(LineItem::new("Spot 1", "5"));
        section.additional_line_items.push(item);

        let item_path = FieldPath::additional_item(0, SectionId::OperatingIncome, 0);
        let renamed = set(&statement, &item_path.clone().key("name"), "Parking").unwrap();
        let item = &renamed.data.financials[0].income.operating.additional_line_items[0];
        assert_eq!(item.name, "Parking");
        assert_eq!(item.field.field_label, "Custom Line Item");

        let entry_path = item_path.clone().key("entries").index(0);
        let updated = set(&renamed, &entry_path, "7").unwrap();
        let entry = &updated.data.financials[0].income.operating.additional_line_items[0]
            .field
            .entries[0];
        assert_eq!(entry.value, "7");
        assert_eq!(entry.name, "Spot 1");

        let plain_name = FieldPath::section_field(0, SectionId::OperatingIncome, "Rent").key("name");
        assert!(get(&statement, &plain_name).is_err());
    }

    #[test]
    fn test_derived_detection() {
        let statement = template();
        let (location, _) = resolve(&statement, &FieldPath::period(0).key("NetIncome")).unwrap();
        match location {
            Location::Field(field_ref) => assert!(field_ref.is_derived()),
            other => panic!("unexpected location {:?}", other),
        }

        let total = FieldPath::section_field(0, SectionId::OperatingIncome, "TotalOperatingIncome");
        let (location, _) = resolve(&statement, &total).unwrap();
        assert!(matches!(location, Location::Field(ref f) if f.is_derived()));
    }
}
