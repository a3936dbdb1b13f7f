//! Detail page extraction
//!
//! The scraper pool only depends on the [`Extractor`] trait. The default
//! [`LabelExtractor`] reads layouts where each value sits in the `<span>`
//! that follows a `<span>` holding the field's label.

use crate::config::FieldLabels;
use crate::storage::{JobRecord, SENTINEL};
use crate::url::ListingAddress;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};

/// Non-key fields of one listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub title: String,
    pub publication_date: String,
    pub workload: String,
    pub contract_type: String,
    pub salary: String,
    pub languages: String,
    pub place_of_work: String,
}

impl ExtractedFields {
    pub fn into_record(self, id: u64, address: ListingAddress) -> JobRecord {
        JobRecord {
            id,
            address,
            title: self.title,
            publication_date: self.publication_date,
            workload: self.workload,
            contract_type: self.contract_type,
            salary: self.salary,
            languages: self.languages,
            place_of_work: self.place_of_work,
        }
    }
}

/// Turns a detail page into field values
///
/// Missing values are reported as [`SENTINEL`], never as errors.
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> ExtractedFields;
}

/// Label-driven extractor over the `scraper` crate
#[derive(Debug)]
pub struct LabelExtractor {
    labels: FieldLabels,
    title_suffix: String,
    span: Selector,
    title: Selector,
    heading: Selector,
    title_div: Selector,
}

impl LabelExtractor {
    pub fn new(labels: FieldLabels, title_suffix: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            labels,
            title_suffix: title_suffix.into(),
            span: parse_selector("span")?,
            title: parse_selector("title")?,
            heading: parse_selector("h1")?,
            title_div: parse_selector("div.job-title")?,
        })
    }

    /// Title priority chain: `<title>` minus suffix, first `<h1>`, `div.job-title`
    fn extract_title(&self, document: &Html) -> String {
        let from_title_tag = document.select(&self.title).next().map(|element| {
            let text = element.text().collect::<String>();
            let cut = if self.title_suffix.is_empty() {
                text.as_str()
            } else {
                text.split(self.title_suffix.as_str()).next().unwrap_or_default()
            };
            cut.trim().to_string()
        });

        [
            from_title_tag,
            first_text(document, &self.heading),
            first_text(document, &self.title_div),
        ]
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.is_empty() && candidate != SENTINEL)
        .unwrap_or_else(|| SENTINEL.to_string())
    }
}

impl Extractor for LabelExtractor {
    fn extract(&self, html: &str) -> ExtractedFields {
        let document = Html::parse_document(html);
        let spans: Vec<ElementRef<'_>> = document.select(&self.span).collect();
        let field = |label: &str| labelled_value(&spans, label);

        ExtractedFields {
            title: self.extract_title(&document),
            publication_date: field(&self.labels.publication_date),
            workload: field(&self.labels.workload),
            contract_type: field(&self.labels.contract_type),
            salary: field(&self.labels.salary),
            languages: field(&self.labels.languages),
            place_of_work: field(&self.labels.place_of_work),
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector(format!("{}: {:?}", css, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(element_text)
}

/// Text of the span after the first span whose trimmed text equals `label`
fn labelled_value(spans: &[ElementRef<'_>], label: &str) -> String {
    spans
        .iter()
        .position(|span| element_text(*span) == label)
        .and_then(|index| spans.get(index + 1))
        .map(|value| element_text(*value))
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| SENTINEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> LabelExtractor {
        LabelExtractor::new(FieldLabels::default(), " - Job Offer").unwrap()
    }

    const DETAIL_PAGE: &str = r#"
        <html>
        <head><title>Pflegefachperson HF 80-100% - Job Offer at Spital Zürich - jobs.ch</title></head>
        <body>
            <h1>Pflegefachperson HF</h1>
            <ul>
                <li><span>Publication date:</span><span> 03 March 2025 </span></li>
                <li><span>Workload:</span><span>80 – 100%</span></li>
                <li><span>Contract type:</span><span>Unlimited employment</span></li>
                <li><span>Language:</span><span>German (Fluent)</span></li>
                <li><span>Place of work:</span><span>Zürich</span></li>
            </ul>
        </body>
        </html>
    "#;

    #[test]
    fn test_extracts_labelled_fields() {
        let fields = extractor().extract(DETAIL_PAGE);
        assert_eq!(fields.publication_date, "03 March 2025");
        assert_eq!(fields.workload, "80 – 100%");
        assert_eq!(fields.contract_type, "Unlimited employment");
        assert_eq!(fields.languages, "German (Fluent)");
        assert_eq!(fields.place_of_work, "Zürich");
    }

    #[test]
    fn test_missing_label_uses_sentinel() {
        let fields = extractor().extract(DETAIL_PAGE);
        assert_eq!(fields.salary, SENTINEL);
    }

    #[test]
    fn test_label_without_following_span() {
        let html = "<html><body><span>Salary:</span></body></html>";
        assert_eq!(extractor().extract(html).salary, SENTINEL);
    }

    #[test]
    fn test_value_taken_from_next_span_in_document_order() {
        let html = r#"
            <div><span>Salary:</span></div>
            <div><p><span>CHF 90,000 - 110,000</span></p></div>
        "#;
        assert_eq!(extractor().extract(html).salary, "CHF 90,000 - 110,000");
    }

    #[test]
    fn test_title_suffix_is_cut() {
        let fields = extractor().extract(DETAIL_PAGE);
        assert_eq!(fields.title, "Pflegefachperson HF 80-100%");
    }

    #[test]
    fn test_title_falls_back_to_heading() {
        let html = "<html><head><title> - Job Offer</title></head><body><h1> Koch/Köchin </h1></body></html>";
        assert_eq!(extractor().extract(html).title, "Koch/Köchin");
    }

    #[test]
    fn test_title_suffix_cut_before_trimming() {
        let html = "<html><head><title>\n  Koch - Job Offer at Hotel Bären </title></head><body><h1>Other</h1></body></html>";
        assert_eq!(extractor().extract(html).title, "Koch");

        let bare_suffix = "<html><head><title>\n - Job Offer\n</title></head><body><div class=\"job-title\">Koch</div></body></html>";
        assert_eq!(extractor().extract(bare_suffix).title, "Koch");
    }

    #[test]
    fn test_title_falls_back_to_job_title_div() {
        let html = r#"<html><body><div class="job-title">Sachbearbeiter</div></body></html>"#;
        assert_eq!(extractor().extract(html).title, "Sachbearbeiter");
    }

    #[test]
    fn test_title_sentinel_when_nothing_matches() {
        assert_eq!(extractor().extract("<html><body></body></html>").title, SENTINEL);
    }

    #[test]
    fn test_custom_labels() {
        let labels = FieldLabels {
            workload: "Pensum:".to_string(),
            ..FieldLabels::default()
        };
        let extractor = LabelExtractor::new(labels, "").unwrap();
        let html = "<span>Pensum:</span><span>60%</span>";
        assert_eq!(extractor.extract(html).workload, "60%");
    }

    #[test]
    fn test_into_record_keeps_id_and_address() {
        let base = url::Url::parse("https://www.jobs.ch").unwrap();
        let address = crate::url::canonicalize("/en/vacancies/detail/1/", &base).unwrap();
        let record = extractor().extract(DETAIL_PAGE).into_record(7, address.clone());
        assert_eq!(record.id, 7);
        assert_eq!(record.address, address);
        assert_eq!(record.place_of_work, "Zürich");
    }
}
