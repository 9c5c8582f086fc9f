use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use scraper::{Html, Selector};
use scrapyard_core::{sanitize_cell, CsvSink, Error, ErrorKind, LocatorKind, OutputSink, Result, Row};
use thirtyfour::prelude::*;
use tracing::{info, warn};

use crate::ocr::OcrEngine;

const EMMA_BASE_URL: &str = "https://emma.msrb.org";

/// Output sink configuration shared by every extraction kind.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OutputConfig {
    /// Only `"csv"` is implemented; other values are logged and skipped.
    #[serde(default = "default_format")]
    pub format: String,
    pub path: PathBuf,
}

fn default_format() -> String {
    "csv".to_string()
}

/// A single declared extraction, tagged by what it yields.
///
/// Mirrors `scraper/scraper/etl/extraction.py::Extraction`/`ExtractionType`;
/// modeled as a Rust enum per the design notes rather than a single struct
/// with a `type` discriminant field.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "extraction_type", rename_all = "snake_case")]
pub enum Extraction {
    Element {
        locator: String,
        locator_type: String,
        #[serde(default = "default_wait")]
        wait_interval: u64,
        #[serde(default)]
        exclude_tags: HashMap<String, Vec<String>>,
        #[serde(default)]
        invalid_output: Vec<String>,
        output: OutputConfig,
    },
    IssuerTable {
        locator: String,
        locator_type: String,
        #[serde(default = "default_wait")]
        wait_interval: u64,
        #[serde(default)]
        pagination_locator: Option<String>,
        #[serde(default)]
        pagination_locator_type: Option<String>,
        #[serde(default)]
        invalid_output: Vec<String>,
        output: OutputConfig,
    },
    IssueScaleTable {
        locator: String,
        locator_type: String,
        #[serde(default = "default_wait")]
        wait_interval: u64,
        #[serde(default)]
        pagination_locator: Option<String>,
        #[serde(default)]
        pagination_locator_type: Option<String>,
        #[serde(default)]
        invalid_output: Vec<String>,
        output: OutputConfig,
    },
    IssueOsTable {
        #[serde(default = "default_wait")]
        wait_interval: u64,
        output: OutputConfig,
    },
    PageSource {
        output: OutputConfig,
    },
}

fn default_wait() -> u64 {
    10
}

impl Extraction {
    fn output(&self) -> &OutputConfig {
        match self {
            Extraction::Element { output, .. }
            | Extraction::IssuerTable { output, .. }
            | Extraction::IssueScaleTable { output, .. }
            | Extraction::IssueOsTable { output, .. }
            | Extraction::PageSource { output } => output,
        }
    }

    fn pagination(&self) -> Option<(&str, &str)> {
        match self {
            Extraction::IssuerTable {
                pagination_locator: Some(loc),
                pagination_locator_type: Some(kind),
                ..
            }
            | Extraction::IssueScaleTable {
                pagination_locator: Some(loc),
                pagination_locator_type: Some(kind),
                ..
            } => Some((loc.as_str(), kind.as_str())),
            _ => None,
        }
    }
}

/// Runs declared extractions against a live page, optionally paginating, and
/// writes the produced rows to the extraction's output sink. Grounded on
/// `scraper/scraper/etl/extraction.py::ExtractionManager`.
pub struct ExtractionManager;

impl ExtractionManager {
    /// Runs a single extraction (paginated or not) and appends its rows to
    /// the configured sink. Errors are logged and swallowed here, matching
    /// the original's per-extraction try/except: one bad extraction does not
    /// abort the rest of the URL's plan.
    pub async fn run(
        driver: &WebDriver,
        ocr_driver: Option<&WebDriver>,
        ocr: &dyn OcrEngine,
        extraction: &Extraction,
        supplemental: &[String],
    ) {
        let rows = if extraction.pagination().is_some() {
            Self::perform_paginated(driver, ocr_driver, ocr, extraction, supplemental).await
        } else {
            Self::perform(driver, ocr_driver, ocr, extraction, supplemental).await
        };

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "extraction failed");
                return;
            }
        };

        if rows.is_empty() {
            return;
        }

        let output = extraction.output();
        if output.format != "csv" {
            warn!(format = %output.format, "unsupported output format, skipping");
            return;
        }

        let sink = CsvSink::new(output.path.clone());
        if let Err(e) = sink.append(&rows) {
            warn!(error = %e, path = %output.path.display(), "failed to append extraction output");
        }
    }

    async fn perform(
        driver: &WebDriver,
        ocr_driver: Option<&WebDriver>,
        ocr: &dyn OcrEngine,
        extraction: &Extraction,
        supplemental: &[String],
    ) -> Result<Vec<Row>> {
        match extraction {
            Extraction::Element {
                locator,
                locator_type,
                wait_interval,
                exclude_tags,
                invalid_output,
                ..
            } => {
                let element = find_element(driver, locator, locator_type, *wait_interval).await?;
                parse_element(&element, exclude_tags, invalid_output, supplemental).await
            }
            Extraction::IssuerTable {
                locator,
                locator_type,
                wait_interval,
                invalid_output,
                ..
            } => {
                let element = find_element(driver, locator, locator_type, *wait_interval).await?;
                issuer_table(&element, invalid_output, supplemental).await
            }
            Extraction::IssueScaleTable {
                locator,
                locator_type,
                wait_interval,
                invalid_output,
                ..
            } => {
                let element = find_element(driver, locator, locator_type, *wait_interval).await?;
                issue_scale_table(&element, invalid_output, supplemental, ocr_driver, ocr).await
            }
            Extraction::IssueOsTable { wait_interval, .. } => {
                issue_os_table(driver, *wait_interval, supplemental).await
            }
            Extraction::PageSource { .. } => {
                let source = driver
                    .source()
                    .await
                    .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to read page source", Box::new(e)))?;
                Ok(vec![Row::new(vec![Some(source)])])
            }
        }
    }

    async fn perform_paginated(
        driver: &WebDriver,
        ocr_driver: Option<&WebDriver>,
        ocr: &dyn OcrEngine,
        extraction: &Extraction,
        supplemental: &[String],
    ) -> Result<Vec<Row>> {
        let Some((locator, locator_type)) = extraction.pagination() else {
            return Self::perform(driver, ocr_driver, ocr, extraction, supplemental).await;
        };

        let wait_interval = match extraction {
            Extraction::IssuerTable { wait_interval, .. }
            | Extraction::IssueScaleTable { wait_interval, .. } => *wait_interval,
            _ => default_wait(),
        };

        let mut all_rows = Vec::new();
        let mut page_count = 0u32;
        let (mut max_pages, mut next_button) =
            discover_pagination(driver, locator, locator_type, wait_interval).await?;

        while page_count < max_pages {
            let page_rows = Self::perform(driver, ocr_driver, ocr, extraction, supplemental).await?;
            all_rows.extend(page_rows);
            page_count += 1;

            match next_button.take() {
                Some(button) => {
                    button
                        .click()
                        .await
                        .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to click next page", Box::new(e)))?;
                    let refreshed =
                        discover_pagination(driver, locator, locator_type, wait_interval).await?;
                    max_pages = refreshed.0;
                    next_button = refreshed.1;
                    info!(page_count, "paginating extraction");
                }
                None => break,
            }
        }

        Ok(all_rows)
    }
}

async fn find_element(
    driver: &WebDriver,
    locator: &str,
    locator_type: &str,
    wait_interval: u64,
) -> Result<WebElement> {
    let by = to_by(locator, locator_type)?;
    if let Ok(element) = driver.find(by.clone()).await {
        return Ok(element);
    }
    driver
        .query(by)
        .wait(Duration::from_secs(wait_interval), Duration::from_millis(10))
        .single()
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "element not found", Box::new(e)))
}

fn to_by(locator: &str, locator_type: &str) -> Result<By> {
    let kind = LocatorKind::parse(locator_type)?;
    Ok(match kind {
        LocatorKind::Id => By::Id(locator.to_string()),
        LocatorKind::XPath => By::XPath(locator.to_string()),
        LocatorKind::LinkText => By::LinkText(locator.to_string()),
        LocatorKind::PartialLinkText => By::PartialLinkText(locator.to_string()),
        LocatorKind::Name => By::Name(locator.to_string()),
        LocatorKind::TagName => By::Tag(locator.to_string()),
        LocatorKind::ClassName => By::ClassName(locator.to_string()),
        LocatorKind::CssSelector => By::Css(locator.to_string()),
    })
}

async fn parse_element(
    element: &WebElement,
    exclude_tags: &HashMap<String, Vec<String>>,
    invalid_output: &[String],
    supplemental: &[String],
) -> Result<Vec<Row>> {
    let inner_html = element
        .inner_html()
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to read innerHTML", Box::new(e)))?;

    let segments = extract_text_segments(&inner_html, exclude_tags.keys().map(String::as_str));
    Ok(segments_to_rows(segments, invalid_output, supplemental))
}

/// One row per non-empty segment, each suffixed with a timestamp and the
/// supplemental fields, matching how the table extractions emit one row
/// per parsed table row.
fn segments_to_rows(segments: Vec<String>, invalid_output: &[String], supplemental: &[String]) -> Vec<Row> {
    segments
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            let mut cells = vec![sanitize_cell(&s, invalid_output)];
            cells.push(Some(scrapyard_core::timestamp()));
            cells.extend(supplemental.iter().cloned().map(Some));
            Row::new(cells)
        })
        .collect()
}

/// Splits an HTML fragment's text content on tag boundaries with the
/// original's `&&&` separator, after removing any excluded tags.
fn extract_text_segments<'a>(html: &str, exclude_tags: impl Iterator<Item = &'a str>) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let excluded: Vec<&str> = exclude_tags.collect();

    let mut segments = Vec::new();
    for node in fragment.tree.nodes() {
        if let scraper::node::Node::Text(text) = node.value() {
            if text.trim().is_empty() {
                continue;
            }
            let ancestor_excluded = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| excluded.contains(&el.name()))
            });
            if !ancestor_excluded {
                segments.push(text.trim().to_string());
            }
        }
    }
    segments
}

async fn issuer_table(element: &WebElement, invalid_output: &[String], supplemental: &[String]) -> Result<Vec<Row>> {
    let outer_html = element
        .outer_html()
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to read outerHTML", Box::new(e)))?;

    let document = Html::parse_fragment(&outer_html);
    let row_selector = Selector::parse("tr").expect("static selector");
    let cell_selector = Selector::parse("td, th").expect("static selector");
    let link_selector = Selector::parse("a[href]").expect("static selector");

    let mut rows = Vec::new();
    for tr in document.select(&row_selector) {
        let mut cells: Vec<Option<String>> = Vec::new();
        for cell in tr.select(&cell_selector) {
            let text: String = cell.text().collect::<Vec<_>>().join("").trim().to_string();
            if !text.is_empty() {
                cells.push(sanitize_cell(&text, invalid_output));
            }
            if let Some(a) = cell.select(&link_selector).next() {
                if let Some(href) = a.value().attr("href") {
                    cells.push(Some(format!("{EMMA_BASE_URL}{href}")));
                }
            }
        }
        cells.push(Some(scrapyard_core::timestamp()));
        cells.extend(supplemental.iter().cloned().map(Some));
        rows.push(Row::new(cells));
    }
    Ok(rows)
}

async fn issue_scale_table(
    element: &WebElement,
    invalid_output: &[String],
    supplemental: &[String],
    ocr_driver: Option<&WebDriver>,
    ocr: &dyn OcrEngine,
) -> Result<Vec<Row>> {
    let outer_html = element
        .outer_html()
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to read outerHTML", Box::new(e)))?;

    let document = Html::parse_fragment(&outer_html);
    let row_selector = Selector::parse("tr").expect("static selector");
    let cell_selector = Selector::parse("td, th").expect("static selector");
    let link_selector = Selector::parse("a[href]").expect("static selector");
    let img_selector = Selector::parse("img[src]").expect("static selector");

    let mut rows = Vec::new();
    for tr in document.select(&row_selector) {
        let mut cells: Vec<Option<String>> = Vec::new();
        for cell in tr.select(&cell_selector) {
            let text: String = cell.text().collect::<Vec<_>>().join("").trim().to_string();
            if !text.is_empty() {
                cells.push(sanitize_cell(&text, invalid_output));
            }

            if let Some(a) = cell.select(&link_selector).next() {
                let href = a.value().attr("href").unwrap_or_default();
                let cusip_link = format!("{EMMA_BASE_URL}{href}");
                if let Some(img) = a.select(&img_selector).next() {
                    let src = img.value().attr("src").unwrap_or_default();
                    let ocr_link = format!("{EMMA_BASE_URL}{src}");
                    let cusip = match ocr_driver {
                        Some(driver) => ocr.recognize_cusip(driver, &ocr_link).await,
                        None => ocr_link,
                    };
                    cells.push(Some(cusip));
                    cells.push(Some(cusip_link.clone()));
                    let last_segment = cusip_link.rsplit('/').next().unwrap_or_default().to_string();
                    cells.push(Some(last_segment));
                }
            }

            if let Some(rating_img) = cell
                .select(&img_selector)
                .find(|img| img.value().attr("data-rating").is_some())
            {
                let src = rating_img.value().attr("src").unwrap_or_default();
                let rating_link = format!("{EMMA_BASE_URL}{src}");
                let rating = match ocr_driver {
                    Some(driver) => ocr.recognize_rating(driver, &rating_link).await,
                    None => rating_link,
                };
                cells.push(Some(rating));
            }
        }
        cells.push(Some(scrapyard_core::timestamp()));
        cells.extend(supplemental.iter().cloned().map(Some));
        rows.push(Row::new(cells));
    }
    Ok(rows)
}

async fn issue_os_table(driver: &WebDriver, wait_interval: u64, supplemental: &[String]) -> Result<Vec<Row>> {
    let tab_trigger = By::Css("li[data-cid='t-os']".to_string());
    driver
        .find(tab_trigger)
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "OS tab trigger not found", Box::new(e)))?
        .click()
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to click OS tab", Box::new(e)))?;

    let div_selector = By::Css("div#t-os[style='']".to_string());
    let div_element = driver
        .query(div_selector)
        .wait(Duration::from_secs(wait_interval), Duration::from_millis(250))
        .single()
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "OS tab content not loaded", Box::new(e)))?;

    let row_selector = Selector::parse("tr").expect("static selector");
    let cell_selector = Selector::parse("td, th").expect("static selector");
    let link_selector = Selector::parse("a[href]").expect("static selector");

    let mut all_rows = Vec::new();
    loop {
        let outer_html = div_element
            .outer_html()
            .await
            .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to read outerHTML", Box::new(e)))?;
        let document = Html::parse_fragment(&outer_html);

        for tr in document.select(&row_selector) {
            let mut cells: Vec<Option<String>> = Vec::new();
            for cell in tr.select(&cell_selector) {
                if let Some(a) = cell.select(&link_selector).next() {
                    if let Some(href) = a.value().attr("href") {
                        cells.push(Some(format!("{EMMA_BASE_URL}{href}")));
                    }
                }
            }
            cells.push(Some(scrapyard_core::timestamp()));
            cells.extend(supplemental.iter().cloned().map(Some));
            if cells.len() == 7 {
                all_rows.push(Row::new(cells));
            }
        }

        if !paginate_tab(&div_element).await? {
            break;
        }
        info!("paginating OS tab");
    }

    Ok(all_rows)
}

/// Clicks the inner tab's "Next" button unless it is absent or disabled.
async fn paginate_tab(div_element: &WebElement) -> Result<bool> {
    let next = div_element.find(By::Css(".paginate_button.next".to_string())).await;
    let Ok(next_button) = next else {
        return Ok(false);
    };
    let class = next_button
        .attr("class")
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to read next button class", Box::new(e)))?
        .unwrap_or_default();
    if class.split_whitespace().any(|c| c == "disabled") {
        return Ok(false);
    }
    next_button
        .click()
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to click next button", Box::new(e)))?;
    Ok(true)
}

/// Parses the pagination container's innerHTML for the maximum discovered
/// page number and the live "Next" element, if any and not disabled.
async fn discover_pagination(
    driver: &WebDriver,
    locator: &str,
    locator_type: &str,
    wait_interval: u64,
) -> Result<(u32, Option<WebElement>)> {
    let element = find_element(driver, locator, locator_type, wait_interval).await?;
    let inner_html = element
        .inner_html()
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to read pagination innerHTML", Box::new(e)))?;

    let max_pages = max_page_count(&inner_html);

    let next = element.find(By::Css("a.paginate_button.next".to_string())).await;
    let next_button = match next {
        Ok(button) => {
            let class = button.attr("class").await.ok().flatten().unwrap_or_default();
            if class.split_whitespace().any(|c| c == "disabled") {
                None
            } else {
                Some(button)
            }
        }
        Err(_) => None,
    };

    Ok((max_pages, next_button))
}

/// Pure parsing half of pagination discovery: the largest integer text among
/// `a.paginate_button` children, defaulting to 1.
fn max_page_count(pagination_html: &str) -> u32 {
    let document = Html::parse_fragment(pagination_html);
    let selector = Selector::parse("a.paginate_button").expect("static selector");
    document
        .select(&selector)
        .filter_map(|el| {
            let text: String = el.text().collect();
            text.trim().parse::<u32>().ok()
        })
        .max()
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_page_count_picks_largest_digit_link() {
        let html = r#"
            <a class="paginate_button">1</a>
            <a class="paginate_button">2</a>
            <a class="paginate_button">3</a>
            <a class="paginate_button next">Next</a>
        "#;
        assert_eq!(max_page_count(html), 3);
    }

    #[test]
    fn max_page_count_defaults_to_one_with_no_links() {
        assert_eq!(max_page_count("<span>no pagination</span>"), 1);
    }

    #[test]
    fn extract_text_segments_splits_on_tag_boundaries() {
        let html = "<span>alpha</span><span>beta</span>";
        let segments = extract_text_segments(html, std::iter::empty());
        assert_eq!(segments, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn extract_text_segments_drops_excluded_tags() {
        let html = "<span>alpha</span><script>beta</script>";
        let segments = extract_text_segments(html, std::iter::once("script"));
        assert_eq!(segments, vec!["alpha".to_string()]);
    }

    #[test]
    fn element_extraction_emits_one_row_per_segment() {
        let segments = vec!["alpha".to_string(), "beta".to_string()];
        let rows = segments_to_rows(segments, &[], &["meta1".to_string()]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0[0], Some("alpha".to_string()));
        assert_eq!(rows[0].0[2], Some("meta1".to_string()));
        assert_eq!(rows[1].0[0], Some("beta".to_string()));
        assert_eq!(rows[1].0[2], Some("meta1".to_string()));
    }
}
