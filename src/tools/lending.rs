//! Lending tool implementations.
//!
//! These are mock services: each returns a deterministic string so the
//! assistant flow can be exercised end to end. Real integrations replace the
//! bodies of these functions; argument parsing stays as is.

use serde::Deserialize;

pub const WEB_SEARCH: &str = "webSearch";
pub const GET_RATE_SHEET: &str = "getRateSheet";
pub const CREATE_LOAN_DOC: &str = "createLoanDoc";

#[derive(Debug, Deserialize)]
pub struct WebSearchArgs {
    pub query: String,
    #[serde(default)]
    pub freshness_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSheetArgs {
    pub loan_type: String,
    pub fico: u32,
    pub ltv: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanDocArgs {
    pub borrower_id: String,
    pub template_id: String,
}

pub fn web_search(args: &WebSearchArgs) -> Result<String, String> {
    if args.query.trim().is_empty() {
        return Err("query must not be empty".into());
    }
    let freshness = args
        .freshness_days
        .map(|d| d.to_string())
        .unwrap_or_else(|| "none".to_string());
    Ok(format!(
        "<mock WebSearch results for '{}', freshness={freshness}>",
        args.query
    ))
}

pub fn get_rate_sheet(args: &RateSheetArgs) -> Result<String, String> {
    if !(300..=850).contains(&args.fico) {
        return Err(format!("fico {} is outside 300-850", args.fico));
    }
    if !args.ltv.is_finite() || args.ltv <= 0.0 {
        return Err(format!("ltv {} must be a positive number", args.ltv));
    }
    Ok(format!(
        "RateSheet mock → {}|FICO {}|LTV {} ⇒ 6.25%/0.2 pts",
        args.loan_type, args.fico, args.ltv
    ))
}

pub fn create_loan_doc(args: &LoanDocArgs) -> Result<String, String> {
    Ok(format!("file_mock_{}_{}", args.borrower_id, args.template_id))
}
