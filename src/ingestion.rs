use crate::error::Result;
use crate::schema::{EngineConfig, FinancialStatement};
use crate::session::EditSession;
use log::debug;
use std::io::Read;

/// Parses a statement in its stored JSON shape without touching it.
pub fn load_statement(json: &str) -> Result<FinancialStatement> {
    let statement: FinancialStatement = serde_json::from_str(json)?;
    debug!(
        "Loaded statement '{}' with {} period(s)",
        statement.id,
        statement.data.financials.len()
    );
    Ok(statement)
}

pub fn load_statement_from_reader<R: Read>(reader: R) -> Result<FinancialStatement> {
    let statement: FinancialStatement = serde_json::from_reader(reader)?;
    Ok(statement)
}

/// Parses, reconciles and recomputes a statement, ready to be edited or displayed.
pub fn load_working_statement(json: &str, config: EngineConfig) -> Result<FinancialStatement> {
    let statement = load_statement(json)?;
    Ok(EditSession::open(statement, config)?.into_working())
}

pub fn to_json_pretty(statement: &FinancialStatement) -> Result<String> {
    Ok(serde_json::to_string_pretty(statement)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SectionId;

    const SAMPLE: &str = r#"{
        "id": "stmt-1",
        "documentId": "doc-1",
        "type": "BusinessFinancialStatement",
        "formType": "ProfitAndLossStatement",
        "extractedAt": "2024-03-01T10:00:00Z",
        "status": "completed",
        "version": "latest",
        "data": {
            "Financials": [{
                "Year": "2023",
                "Income": { "Operating": {
                    "RentalIncome": { "value": "100", "fieldLabel": "Rental Income" }
                } },
                "Expense": { "Operating": {
                    "Insurance": { "value": "40", "fieldLabel": "Insurance" }
                } },
                "NetIncome": { "value": "999", "fieldLabel": "Net Income" }
            }],
            "CompanyName": { "value": "Acme", "fieldLabel": "Company Name" },
            "DocumentDate": { "value": "2024-01-31", "fieldLabel": "Document Date" },
            "ReportingDates": ["2023-12-31"]
        }
    }"#;

    #[test]
    fn test_load_keeps_stored_values() {
        let statement = load_statement(SAMPLE).unwrap();
        assert_eq!(statement.data.financials[0].net_income.value, "999");
        assert!(statement.data.financials[0].expense.cogs.is_none());
        assert_eq!(statement.status.as_str(), "completed");

        let from_reader = load_statement_from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(from_reader, statement);
    }

    #[test]
    fn test_load_working_statement_reconciles_and_recomputes() {
        let statement = load_working_statement(SAMPLE, EngineConfig::default()).unwrap();
        let period = &statement.data.financials[0];
        assert_eq!(period.net_income.value, "60");
        assert!(period.section(SectionId::CostOfGoodsSold).is_some());
        assert!(period.income.operating.field("OtherRevenue").is_some());
    }

    #[test]
    fn test_json_round_trip_preserves_wire_keys() {
        let statement = load_working_statement(SAMPLE, EngineConfig::default()).unwrap();
        let json = to_json_pretty(&statement).unwrap();
        assert!(json.contains("\"documentId\""));
        assert!(json.contains("\"Financials\""));
        assert!(json.contains("\"TotalOperatingIncome\""));

        let reparsed = load_statement(&json).unwrap();
        assert_eq!(reparsed, statement);
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        assert!(matches!(
            load_statement("{ not json"),
            Err(crate::error::StatementError::SerializationError(_))
        ));
    }
}
