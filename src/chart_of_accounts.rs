use crate::error::{Result, StatementError};
use crate::schema::{
    ExpenseSections, Field, FinancialData, FinancialPeriod, FinancialStatement, IncomeSections,
    Section, SectionId, StatementStatus,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PROFIT_AND_LOSS_FORM_TYPE: &str = "ProfitAndLossStatement";
pub const BUSINESS_FINANCIAL_STATEMENT_TYPE: &str = "BusinessFinancialStatement";

pub const COMPANY_NAME_LABEL: &str = "Company Name";
pub const DOCUMENT_DATE_LABEL: &str = "Document Date";
pub const NET_INCOME_LABEL: &str = "Net Income";
pub const GROSS_PROFIT_LABEL: &str = "Gross Profit";

pub const TOTAL_OPERATING_INCOME_KEY: &str = "TotalOperatingIncome";
pub const TOTAL_COST_OF_GOODS_SOLD_KEY: &str = "TotalCostOfGoodsSold";
pub const TOTAL_OPERATING_EXPENSES_KEY: &str = "TotalOperatingExpenses";

pub const TOTAL_KEY_PREFIX: &str = "Total";

/// True for any `Total*` key, whatever the schema version.
///
/// Totals are never summed as leaves and never edited directly. Only the
/// reserved keys above are rewritten by the engine; other extracted totals
/// (e.g. `TotalRevenue`) are kept as loaded.
pub fn is_total_key(key: &str) -> bool {
    key.starts_with(TOTAL_KEY_PREFIX)
}

const OPERATING_INCOME_ACCOUNTS: &[(&str, &str)] = &[
    ("FoodSales", "Food Sales"),
    ("OnlineSales", "Online Sales"),
    ("RetailSales", "Retail Sales"),
    ("RoomRevenue", "Room Revenue"),
    ("AlcoholSales", "Alcohol Sales"),
    ("HandlingFees", "Handling Fees"),
    ("OtherRevenue", "Other Revenue"),
    ("RentalIncome", "Rental Income"),
    ("SalesRevenue", "Sales Revenue"),
    ("GamingRevenue", "Gaming Revenue"),
    ("GiftCardSales", "Gift Card Sales"),
    ("FreightRevenue", "Freight Revenue"),
    ("HostingRevenue", "Hosting Revenue"),
    ("InterestIncome", "Interest Income"),
    ("MembershipDues", "Membership Dues"),
    ("SalesDiscounts", "Sales Discounts"),
    ("ServiceRevenue", "Service Revenue"),
    ("StorageRevenue", "Storage Revenue"),
    ("WholesaleSales", "Wholesale Sales"),
    ("ContractRevenue", "Contract Revenue"),
    ("ServicingIncome", "Servicing Income"),
    ("MerchandiseSales", "Merchandise Sales"),
    ("ColocationRevenue", "Colocation Revenue"),
    ("ConsultingRevenue", "Consulting Revenue"),
    ("DirectMailRevenue", "Direct Mail Revenue"),
    ("GainOnSaleOfLoans", "Gain on Sale of Loans"),
    ("LabTestingRevenue", "Lab Testing Revenue"),
    ("RetainageReleased", "Retainage Released"),
    ("VenueRentalIncome", "Venue Rental Income"),
    ("AccessorialCharges", "Accessorial Charges"),
    ("ChangeOrderRevenue", "Change Order Revenue"),
    ("EventPromotionFees", "Event Promotion Fees"),
    ("MaintenanceRevenue", "Maintenance Revenue"),
    ("RetainerFeesEarned", "Retainer Fees Earned"),
    ("RvSiteRentalIncome", "RV Site Rental Income"),
    ("SponsorshipRevenue", "Sponsorship Revenue"),
    ("VehicleLeaseIncome", "Vehicle Lease Income"),
    ("LoanOriginationFees", "Loan Origination Fees"),
    ("ProjectBasedRevenue", "Project-Based Revenue"),
    ("EquipmentLeaseIncome", "Equipment Lease Income"),
    ("LateFeesAndPenalties", "Late Fees and Penalties"),
    ("OtherOperatingIncome", "Other Operating Income"),
    ("RepairServiceRevenue", "Repair Service Revenue"),
    ("ReturnsAndAllowances", "Returns and Allowances"),
    ("PatientServiceRevenue", "Patient Service Revenue"),
    ("ProgramServiceRevenue", "Program Service Revenue"),
    ("RealEstateLeaseIncome", "Real Estate Lease Income"),
    ("BurialAndCremationFees", "Burial and Cremation Fees"),
    ("CreativeDesignServices", "Creative Design Services"),
    ("FuneralServicesRevenue", "Funeral Services Revenue"),
    ("ManagedServicesRevenue", "Managed Services Revenue"),
    ("PerformanceTicketSales", "Performance Ticket Sales"),
    ("ReferralFeesAndRebates", "Referral Fees and Rebates"),
    ("SoftwareLicenseRevenue", "Software License Revenue"),
    ("WasteCollectionRevenue", "Waste Collection Revenue"),
    ("FundraisingEventRevenue", "Fundraising Event Revenue"),
    ("PublicRelationsServices", "Public Relations Services"),
    ("SaasSubscriptionRevenue", "SaaS Subscription Revenue"),
    ("SecurityServicesRevenue", "Security Services Revenue"),
    ("CateringAndSpecialEvents", "Catering and Special Events"),
    ("ConsumerGoodsLeaseIncome", "Consumer Goods Lease Income"),
    ("PropertyManagementIncome", "Property Management Income"),
    ("TemporaryStaffingRevenue", "Temporary Staffing Revenue"),
    ("DomainRegistrationRevenue", "Domain Registration Revenue"),
    ("DonationsAndContributions", "Donations and Contributions"),
    ("InterestIncomeCreditCards", "Interest Income - Credit Cards"),
    ("JanitorialServicesRevenue", "Janitorial Services Revenue"),
    ("MediaPlacementCommissions", "Media Placement Commissions"),
    ("OutpatientServicesRevenue", "Outpatient Services Revenue"),
    ("AdvertisingServicesRevenue", "Advertising Services Revenue"),
    ("GrantsAndFoundationSupport", "Grants and Foundation Support"),
    ("BandwidthAndNetworkServices", "Bandwidth and Network Services"),
    ("InterestIncomeConsumerLoans", "Interest Income - Consumer Loans"),
    ("ProfessionalServicesRevenue", "Professional Services Revenue"),
    ("SalonAndPersonalCareRevenue", "Salon and Personal Care Revenue"),
    ("LaundryAndDryCleaningRevenue", "Laundry and Dry Cleaning Revenue"),
    ("MaintenanceAndSupportRevenue", "Maintenance and Support Revenue"),
    ("MortgageBrokerageCommissions", "Mortgage Brokerage Commissions"),
    ("ImplementationServicesRevenue", "Implementation Services Revenue"),
    ("InterestIncomeCommercialLoans", "Interest Income - Commercial Loans"),
    ("SpaAndWellnessServicesRevenue", "Spa and Wellness Services Revenue"),
    ("PrivateInsuranceReimbursements", "Private Insurance Reimbursements"),
    ("ServiceChargesAndTipsCollected", "Service Charges and Tips Collected"),
    ("AdmissionsAndAttractionsRevenue", "Admissions and Attractions Revenue"),
    ("DigitalMarketingCampaignRevenue", "Digital Marketing Campaign Revenue"),
    ("FacilitiesSupportServicesRevenue", "Facilities Support Services Revenue"),
    ("MedicareOrMedicaidReimbursements", "Medicare or Medicaid Reimbursements"),
    ("SponsorshipsAndAdvertisingIncome", "Sponsorships and Advertising Income"),
    ("CommunityServicesAndHousingSupport", "Community Services and Housing Support"),
    ("RemediationAndHazardousWasteRevenue", "Remediation and Hazardous Waste Revenue"),
    ("ExpertTestimonyAndSpecializedServices", "Expert Testimony and Specialized Services"),
];

const COST_OF_GOODS_SOLD_ACCOUNTS: &[(&str, &str)] = &[
    ("Purchases", "Purchases"),
    ("CostOfLabor", "Cost of Labor"),
    ("Depreciation", "Depreciation"),
    ("OtherCostOfGoodsSold", "Other Cost of Goods Sold"),
];

const OPERATING_EXPENSE_ACCOUNTS: &[(&str, &str)] = &[
    ("Rent", "Rent"),
    ("Insurance", "Insurance"),
    ("Utilities", "Utilities"),
    ("OfficeRent", "Office Rent"),
    ("Advertising", "Advertising"),
    ("BankCharges", "Bank Charges"),
    ("PayrollTaxes", "Payroll Taxes"),
    ("BadDebtExpense", "Bad Debt Expense"),
    ("OfficeSupplies", "Office Supplies"),
    ("OfficerSalaries", "Officer Salaries"),
    ("ProfessionalFees", "Professional Fees"),
    ("SalariesAndWages", "Salaries and Wages"),
    ("PermitsAndLicenses", "Permits and Licenses"),
    ("AmortizationExpense", "Amortization Expense"),
    ("DepreciationExpense", "Depreciation Expense"),
    ("RepairsAndMaintenance", "Repairs and Maintenance"),
    ("OtherOperatingExpenses", "Other Operating Expenses"),
    ("TravelAndEntertainment", "Travel and Entertainment"),
    ("EmployeeBenefitPrograms", "Employee Benefit Programs"),
    ("GuaranteedPaymentsToPartners", "Guaranteed Payments to Partners"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// Income and operating expenses only; no Cogs section and no gross profit.
    Legacy,
    Latest,
}

impl SchemaVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::Legacy => "legacy",
            SchemaVersion::Latest => "latest",
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" | "latest" => Ok(SchemaVersion::Latest),
            "legacy" | "v1" => Ok(SchemaVersion::Legacy),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical description of one section: known keys with labels and its reserved total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionChart {
    pub id: SectionId,
    pub accounts: &'static [(&'static str, &'static str)],
    pub total_key: &'static str,
    pub total_label: &'static str,
}

impl SectionChart {
    pub fn label_for(&self, key: &str) -> Option<&'static str> {
        if key == self.total_key {
            return Some(self.total_label);
        }
        self.accounts
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, label)| *label)
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.label_for(key).is_some()
    }

    /// Canonical empty section: every known key plus the reserved total, all with empty values.
    pub fn default_section(&self) -> Section {
        let mut section = Section::default();
        for (key, label) in self.accounts {
            section.fields.insert((*key).to_string(), Field::new(*label));
        }
        section
            .fields
            .insert(self.total_key.to_string(), Field::new(self.total_label));
        section
    }
}

/// Canonical field table for one form type and schema version.
///
/// This is the single source of truth for which keys are known, their display
/// labels and the sections a new statement is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartOfAccounts {
    pub form_type: String,
    pub version: SchemaVersion,
    pub sections: Vec<SectionChart>,
}

impl ChartOfAccounts {
    pub fn profit_and_loss(version: SchemaVersion) -> Self {
        let mut sections = vec![SectionChart {
            id: SectionId::OperatingIncome,
            accounts: OPERATING_INCOME_ACCOUNTS,
            total_key: TOTAL_OPERATING_INCOME_KEY,
            total_label: "Total Income",
        }];

        if version == SchemaVersion::Latest {
            sections.push(SectionChart {
                id: SectionId::CostOfGoodsSold,
                accounts: COST_OF_GOODS_SOLD_ACCOUNTS,
                total_key: TOTAL_COST_OF_GOODS_SOLD_KEY,
                total_label: "Total Cost of Goods Sold",
            });
        }

        sections.push(SectionChart {
            id: SectionId::OperatingExpense,
            accounts: OPERATING_EXPENSE_ACCOUNTS,
            total_key: TOTAL_OPERATING_EXPENSES_KEY,
            total_label: "Total Expense",
        });

        Self {
            form_type: PROFIT_AND_LOSS_FORM_TYPE.to_string(),
            version,
            sections,
        }
    }

    /// Looks up the chart for a form type and version tag.
    pub fn lookup(form_type: &str, version: &str) -> Result<Self> {
        if form_type != PROFIT_AND_LOSS_FORM_TYPE {
            return Err(StatementError::UnknownFormType(form_type.to_string()));
        }

        let version = version
            .parse::<SchemaVersion>()
            .map_err(|v| StatementError::UnsupportedSchemaVersion {
                form_type: form_type.to_string(),
                version: v,
            })?;

        Ok(Self::profit_and_loss(version))
    }

    pub fn for_statement(statement: &FinancialStatement) -> Result<Self> {
        Self::lookup(&statement.form_type, &statement.version)
    }

    pub fn has_section(&self, id: SectionId) -> bool {
        self.sections.iter().any(|s| s.id == id)
    }

    pub fn has_gross_profit(&self) -> bool {
        self.has_section(SectionId::CostOfGoodsSold)
    }

    pub fn section(&self, id: SectionId) -> Result<&SectionChart> {
        self.sections
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| StatementError::UnknownSection {
                section: id.to_string(),
                form_type: self.form_type.clone(),
                version: self.version.to_string(),
            })
    }

    pub fn is_total_key(&self, key: &str) -> bool {
        self.sections.iter().any(|s| s.total_key == key) || is_total_key(key)
    }

    pub fn default_period(&self, year: impl Into<String>) -> FinancialPeriod {
        let mut period = FinancialPeriod {
            year: year.into(),
            income: IncomeSections::default(),
            expense: ExpenseSections::default(),
            net_income: Field::new(NET_INCOME_LABEL),
            gross_profit: None,
        };

        for chart in &self.sections {
            let section = chart.default_section();
            match chart.id {
                SectionId::OperatingIncome => period.income.operating = section,
                SectionId::CostOfGoodsSold => period.expense.cogs = Some(section),
                SectionId::OperatingExpense => period.expense.operating = section,
            }
        }

        if self.has_gross_profit() {
            period.gross_profit = Some(Field::new(GROSS_PROFIT_LABEL));
        }

        period
    }

    /// Builds the empty template a new statement starts from.
    pub fn new_statement(
        &self,
        id: impl Into<String>,
        document_id: impl Into<String>,
        year: impl Into<String>,
    ) -> FinancialStatement {
        FinancialStatement {
            id: id.into(),
            document_id: document_id.into(),
            statement_type: BUSINESS_FINANCIAL_STATEMENT_TYPE.to_string(),
            subtype: None,
            form_type: self.form_type.clone(),
            data: FinancialData {
                financials: vec![self.default_period(year)],
                company_name: Field::new(COMPANY_NAME_LABEL),
                document_date: Field::new(DOCUMENT_DATE_LABEL),
                reporting_dates: Vec::new(),
            },
            extracted_at: Some(Utc::now()),
            status: StatementStatus::Draft,
            year: None,
            version: self.version.to_string(),
        }
    }
}

/// Canonical chart for a form type at the latest schema version.
pub fn canonical_schema(form_type: &str) -> Result<ChartOfAccounts> {
    ChartOfAccounts::lookup(form_type, SchemaVersion::Latest.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_chart_has_cogs_and_gross_profit() {
        let chart = canonical_schema(PROFIT_AND_LOSS_FORM_TYPE).unwrap();
        assert_eq!(chart.sections.len(), 3);
        assert!(chart.has_gross_profit());

        let period = chart.default_period("2023");
        assert!(period.expense.cogs.is_some());
        assert_eq!(
            period.gross_profit.as_ref().unwrap().field_label,
            GROSS_PROFIT_LABEL
        );

        let rental = period.income.operating.field("RentalIncome").unwrap();
        assert_eq!(rental.value, "");
        assert_eq!(rental.field_label, "Rental Income");
        assert!(period
            .income
            .operating
            .field(TOTAL_OPERATING_INCOME_KEY)
            .is_some());
    }

    #[test]
    fn test_legacy_chart_has_no_cogs() {
        let chart = ChartOfAccounts::lookup(PROFIT_AND_LOSS_FORM_TYPE, "legacy").unwrap();
        assert!(!chart.has_gross_profit());

        let period = chart.default_period("2022");
        assert!(period.expense.cogs.is_none());
        assert!(period.gross_profit.is_none());

        let err = chart.section(SectionId::CostOfGoodsSold).unwrap_err();
        assert!(matches!(err, StatementError::UnknownSection { .. }));
    }

    #[test]
    fn test_unknown_form_type_and_version() {
        assert!(matches!(
            ChartOfAccounts::lookup("BalanceSheet", "latest"),
            Err(StatementError::UnknownFormType(_))
        ));
        assert!(matches!(
            ChartOfAccounts::lookup(PROFIT_AND_LOSS_FORM_TYPE, "v9"),
            Err(StatementError::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_labels_and_total_keys() {
        let chart = canonical_schema(PROFIT_AND_LOSS_FORM_TYPE).unwrap();
        let expenses = chart.section(SectionId::OperatingExpense).unwrap();
        assert_eq!(expenses.label_for("BankCharges"), Some("Bank Charges"));
        assert_eq!(
            expenses.label_for(TOTAL_OPERATING_EXPENSES_KEY),
            Some("Total Expense")
        );
        assert_eq!(expenses.label_for("Nonexistent"), None);

        assert!(chart.is_total_key(TOTAL_OPERATING_INCOME_KEY));
        assert!(chart.is_total_key(TOTAL_COST_OF_GOODS_SOLD_KEY));
        assert!(!chart.is_total_key("Rent"));
        assert!(chart.is_total_key("TotalRevenue"));
        assert!(!chart
            .sections
            .iter()
            .flat_map(|s| s.accounts.iter())
            .any(|(key, _)| is_total_key(key)));
    }

    #[test]
    fn test_new_statement_template() {
        let chart = canonical_schema(PROFIT_AND_LOSS_FORM_TYPE).unwrap();
        let statement = chart.new_statement("s-1", "doc-1", "2024");
        assert_eq!(statement.status, StatementStatus::Draft);
        assert_eq!(statement.version, "latest");
        assert_eq!(statement.data.financials.len(), 1);
        assert_eq!(statement.data.financials[0].year, "2024");
        assert_eq!(statement.data.company_name.field_label, COMPANY_NAME_LABEL);
    }
}
