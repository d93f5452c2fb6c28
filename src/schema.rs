use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved key under which a section stores its user-defined items.
pub const ADDITIONAL_LINE_ITEMS_KEY: &str = "AdditionalLineItems";

/// Default name (and label) of a freshly appended additional item.
pub const CUSTOM_LINE_ITEM_NAME: &str = "Custom Line Item";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItem {
    #[serde(default)]
    #[schemars(description = "Free-text description of the itemized row")]
    pub name: String,

    #[serde(default)]
    #[schemars(description = "Decimal string amount of the row. Empty or non-numeric counts as zero.")]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Bounding boxes produced by document extraction, carried through untouched")]
    pub bbox: Option<Vec<serde_json::Value>>,
}

impl LineItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            bbox: None,
        }
    }

    /// The row the editor inserts when the user clicks "Add Line Item" on a field.
    pub fn placeholder(field_label: &str) -> Self {
        Self::new(format!("New {} Item", field_label), "0")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default)]
    #[schemars(description = "Decimal string amount. Empty string is treated as zero.")]
    pub value: String,

    #[serde(default)]
    #[schemars(description = "Human readable name shown next to the amount; independent of the storage key")]
    pub field_label: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(description = "Ordered itemized breakdown of this amount")]
    pub entries: Vec<LineItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<serde_json::Value>>,
}

impl Field {
    pub fn new(field_label: impl Into<String>) -> Self {
        Self {
            field_label: field_label.into(),
            ..Default::default()
        }
    }

    pub fn with_value(field_label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            field_label: field_label.into(),
            ..Default::default()
        }
    }
}

/// A user-defined field living outside the fixed schema of a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AdditionalLineItem {
    #[serde(default)]
    #[schemars(description = "Display identity of the custom item")]
    pub name: String,

    #[serde(flatten)]
    pub field: Field,
}

impl AdditionalLineItem {
    pub fn custom() -> Self {
        Self {
            name: CUSTOM_LINE_ITEM_NAME.to_string(),
            field: Field::with_value(CUSTOM_LINE_ITEM_NAME, "0"),
        }
    }
}

/// Well-known keys mapped to fields, plus the section's additional items.
///
/// Reserved total keys (e.g. `TotalOperatingIncome`) are stored among `fields`
/// and are rewritten by the totals engine. Keys holding `null` are dropped on
/// load and back-filled by reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct Section {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Field>,

    #[serde(
        rename = "AdditionalLineItems",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub additional_line_items: Vec<AdditionalLineItem>,
}

impl<'de> Deserialize<'de> for Section {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;

        let additional_line_items = match raw.remove(ADDITIONAL_LINE_ITEMS_KEY) {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(items) => serde_json::from_value(items)
                .map_err(|e| de::Error::custom(format!("{}: {}", ADDITIONAL_LINE_ITEMS_KEY, e)))?,
        };

        let mut fields = BTreeMap::new();
        for (key, value) in raw {
            if value.is_null() {
                continue;
            }
            let field = serde_json::from_value(value)
                .map_err(|e| de::Error::custom(format!("field '{}': {}", key, e)))?;
            fields.insert(key, field);
        }

        Ok(Self {
            fields,
            additional_line_items,
        })
    }
}

impl Section {
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    pub fn field_mut(&mut self, key: &str) -> Option<&mut Field> {
        self.fields.get_mut(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum SectionId {
    #[schemars(description = "Income / Operating")]
    OperatingIncome,

    #[schemars(description = "Expense / Cogs")]
    CostOfGoodsSold,

    #[schemars(description = "Expense / Operating")]
    OperatingExpense,
}

impl SectionId {
    pub const ALL: [SectionId; 3] = [
        SectionId::OperatingIncome,
        SectionId::CostOfGoodsSold,
        SectionId::OperatingExpense,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            SectionId::OperatingIncome => "Operating Income",
            SectionId::CostOfGoodsSold => "Cost of Goods Sold",
            SectionId::OperatingExpense => "Operating Expenses",
        }
    }

    /// Keys leading from a financial period to this section.
    pub fn path_keys(self) -> [&'static str; 2] {
        match self {
            SectionId::OperatingIncome => ["Income", "Operating"],
            SectionId::CostOfGoodsSold => ["Expense", "Cogs"],
            SectionId::OperatingExpense => ["Expense", "Operating"],
        }
    }

    pub fn from_path_keys(group: &str, name: &str) -> Option<Self> {
        match (group, name) {
            ("Income", "Operating") => Some(SectionId::OperatingIncome),
            ("Expense", "Cogs") => Some(SectionId::CostOfGoodsSold),
            ("Expense", "Operating") => Some(SectionId::OperatingExpense),
            _ => None,
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [group, name] = self.path_keys();
        write!(f, "{}/{}", group, name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IncomeSections {
    #[serde(rename = "Operating", default)]
    pub operating: Section,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExpenseSections {
    #[serde(rename = "Cogs", default, skip_serializing_if = "Option::is_none")]
    pub cogs: Option<Section>,

    #[serde(rename = "Operating", default)]
    pub operating: Section,
}

/// One year's statement body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct FinancialPeriod {
    #[serde(default)]
    pub year: String,

    #[serde(default)]
    pub income: IncomeSections,

    #[serde(default)]
    pub expense: ExpenseSections,

    #[serde(default)]
    #[schemars(description = "Derived: total operating income minus total operating expenses")]
    pub net_income: Field,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Derived: total operating income minus cost of goods sold. Only in schema versions with a Cogs section.")]
    pub gross_profit: Option<Field>,
}

impl FinancialPeriod {
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        match id {
            SectionId::OperatingIncome => Some(&self.income.operating),
            SectionId::CostOfGoodsSold => self.expense.cogs.as_ref(),
            SectionId::OperatingExpense => Some(&self.expense.operating),
        }
    }

    pub fn section_mut(&mut self, id: SectionId) -> Option<&mut Section> {
        match id {
            SectionId::OperatingIncome => Some(&mut self.income.operating),
            SectionId::CostOfGoodsSold => self.expense.cogs.as_mut(),
            SectionId::OperatingExpense => Some(&mut self.expense.operating),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct FinancialData {
    #[serde(default)]
    pub financials: Vec<FinancialPeriod>,

    #[serde(default)]
    pub company_name: Field,

    #[serde(default)]
    pub document_date: Field,

    #[serde(default)]
    pub reporting_dates: Vec<String>,
}

/// Lifecycle tag of a statement. Unknown tags survive a load/save cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatementStatus {
    #[default]
    Draft,
    Completed,
    Other(String),
}

impl StatementStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StatementStatus::Draft => "Draft",
            StatementStatus::Completed => "Completed",
            StatementStatus::Other(s) => s,
        }
    }
}

impl From<String> for StatementStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Draft" => StatementStatus::Draft,
            "Completed" => StatementStatus::Completed,
            _ => StatementStatus::Other(s),
        }
    }
}

impl From<StatementStatus> for String {
    fn from(status: StatementStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialStatement {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    #[schemars(description = "Identifier of the source document this statement was extracted from")]
    pub document_id: String,

    #[serde(rename = "type", default)]
    pub statement_type: String,

    #[serde(default)]
    pub subtype: Option<String>,

    #[serde(default)]
    #[schemars(description = "Form type tag selecting the canonical schema, e.g. ProfitAndLossStatement")]
    pub form_type: String,

    #[serde(default)]
    pub data: FinancialData,

    #[serde(default)]
    pub extracted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    #[schemars(with = "String")]
    pub status: StatementStatus,

    #[serde(default)]
    pub year: Option<String>,

    #[serde(default)]
    #[schemars(description = "Schema version tag: 'latest' or 'legacy'")]
    pub version: String,
}

impl FinancialStatement {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(FinancialStatement)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn period(&self, index: usize) -> Option<&FinancialPeriod> {
        self.data.financials.get(index)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum EntriesPolicy {
    #[default]
    #[schemars(description = "A field's value is edited on its own; its entries are informational")]
    Independent,

    #[schemars(
        description = "Whenever a non-derived field has entries, its value is replaced by the sum of the entries during recomputation"
    )]
    SumIntoParent,
}

/// Knobs the host application passes when opening an editing session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default)]
    pub entries_policy: EntriesPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = FinancialStatement::schema_as_json().unwrap();
        assert!(schema_json.contains("formType"));
        assert!(schema_json.contains("Financials"));
        assert!(schema_json.contains("fieldLabel"));
    }

    #[test]
    fn test_section_skips_null_keys() {
        let json = r#"{
            "RentalIncome": { "value": "100", "fieldLabel": "Rental Income" },
            "OtherRevenue": null,
            "AdditionalLineItems": null
        }"#;

        let section: Section = serde_json::from_str(json).unwrap();
        assert_eq!(section.fields.len(), 1);
        assert!(section.field("OtherRevenue").is_none());
        assert!(section.additional_line_items.is_empty());

        let bad = r#"{ "RentalIncome": { "value": 5 } }"#;
        let err = serde_json::from_str::<Section>(bad).unwrap_err();
        assert!(err.to_string().contains("RentalIncome"));
    }

    #[test]
    fn test_section_keeps_unknown_keys_and_additional_items() {
        let json = r#"{
            "RentalIncome": { "value": "100", "fieldLabel": "Rental Income" },
            "LegacyKey": { "value": "5", "fieldLabel": "Legacy" },
            "AdditionalLineItems": [
                { "name": "Parking", "value": "12", "fieldLabel": "Parking", "entries": [] }
            ]
        }"#;

        let section: Section = serde_json::from_str(json).unwrap();
        assert_eq!(section.fields.len(), 2);
        assert_eq!(section.field("LegacyKey").unwrap().value, "5");
        assert_eq!(section.additional_line_items.len(), 1);
        assert_eq!(section.additional_line_items[0].name, "Parking");
        assert_eq!(section.additional_line_items[0].field.value, "12");

        let back = serde_json::to_value(&section).unwrap();
        assert_eq!(back["AdditionalLineItems"][0]["name"], "Parking");
        assert_eq!(back["RentalIncome"]["fieldLabel"], "Rental Income");
    }

    #[test]
    fn test_field_without_label_deserializes() {
        let field: Field = serde_json::from_str(r#"{ "value": "Charles Evans" }"#).unwrap();
        assert_eq!(field.value, "Charles Evans");
        assert!(field.field_label.is_empty());
        assert!(field.entries.is_empty());
    }

    #[test]
    fn test_status_round_trips_unknown_tags() {
        let status: StatementStatus = serde_json::from_str("\"InReview\"").unwrap();
        assert_eq!(status, StatementStatus::Other("InReview".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"InReview\"");

        let status: StatementStatus = serde_json::from_str("\"Completed\"").unwrap();
        assert_eq!(status, StatementStatus::Completed);
    }

    #[test]
    fn test_period_section_lookup() {
        let mut period = FinancialPeriod::default();
        assert!(period.section(SectionId::CostOfGoodsSold).is_none());
        assert!(period.section(SectionId::OperatingIncome).is_some());

        period.expense.cogs = Some(Section::default());
        assert!(period.section_mut(SectionId::CostOfGoodsSold).is_some());
        assert_eq!(SectionId::CostOfGoodsSold.to_string(), "Expense/Cogs");
        assert_eq!(
            SectionId::from_path_keys("Income", "Operating"),
            Some(SectionId::OperatingIncome)
        );
    }
}
