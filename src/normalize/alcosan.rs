use crate::error::{AppError, Result};
use crate::model::SoakStatus;
use scraper::{Html, Selector};

/// SOAK notifications run April 1 through October 31.
pub fn is_soak_season(month: u32) -> bool {
    (4..=10).contains(&month)
}

/// The SOAK page has no structured feed; status is read from its text.
pub fn parse_soak_page(html: &str) -> Result<SoakStatus> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("body")
        .map_err(|e| AppError::Parse(format!("Invalid selector: {:?}", e)))?;

    let text: String = match document.select(&selector).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => document.root_element().text().collect::<Vec<_>>().join(" "),
    };

    Ok(classify_soak_text(&text))
}

/// Negative phrases are checked first: "no overflow" contains "overflow".
pub fn classify_soak_text(text: &str) -> SoakStatus {
    let text = text.to_lowercase();
    if text.contains("no overflow") || text.contains("no active") {
        SoakStatus::NoOverflow
    } else if text.contains("overflow") || text.contains("active") {
        SoakStatus::OverflowActive
    } else {
        SoakStatus::Unclear
    }
}
