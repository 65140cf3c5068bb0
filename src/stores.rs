//! Store lookup by zipcode against the site's store locator.
//!
//! The locator page renders through Coveo search widgets behind a Cloudflare
//! interstitial, and its markup shifts between deployments. The flow below
//! leans on ordered fallbacks at every step that depends on page structure:
//! wait out the challenge, find the search box by any of several locators,
//! submit the zipcode, wait for result cards, then try extraction routines
//! from most targeted to most generic. Cleanup and deduplication run on
//! whatever the winning routine produced.

use std::collections::HashSet;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::driver::{Locator, PageDriver};
use crate::error::ScrapeError;
use crate::extract::{extract_first, raw_str, ExtractionSource, ExtractionStrategy, RawRecord};
use crate::locate::{resolve_first, submit_query, LocatorStrategy};
use crate::normalize;
use crate::poll::{poll_until, PollResult};
use crate::session::{BrowserSession, SessionConfig};

/// One retail location as returned to API consumers. Every field is
/// best-effort; any may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    pub store_number: String,
    pub address: String,
    pub phone: String,
    pub hours: String,
    pub google_maps_link: String,
}

/// Title Cloudflare shows while the interstitial is still running.
const CHALLENGE_TITLE: &str = "Just a moment...";

/// Candidate locators for the search input, most specific first. The id-based
/// XPath survives most deployments; the placeholder text is the last resort.
const SEARCH_BOX_STRATEGIES: [LocatorStrategy; 5] = [
    LocatorStrategy {
        name: "stores-search-box-id",
        locator: Locator::XPath(r#"//*[@id="StoresSearchBox"]/div[4]/div[1]/input"#),
    },
    LocatorStrategy {
        name: "stores-page-path",
        locator: Locator::XPath(
            "/html/body/div[4]/div/div/div[1]/div[2]/div[1]/div[3]/div[3]/div[2]/div[1]/div/div[4]/div[1]/input",
        ),
    },
    LocatorStrategy {
        name: "omnibox-combobox",
        locator: Locator::XPath(r#"//div[contains(@class, "CoveoOmnibox")]//input[@role="combobox"]"#),
    },
    LocatorStrategy {
        name: "magic-box-combobox",
        locator: Locator::Css(".magic-box-input input[role='combobox']"),
    },
    LocatorStrategy {
        name: "search-placeholder",
        locator: Locator::Css("input[placeholder='Search by City, Zip, or Store #']"),
    },
];

/// Elements whose presence means the result grid has populated.
const RESULT_MARKERS: [Locator; 2] = [
    Locator::Css(".CoveoResult"),
    Locator::Css("[class*='store']"),
];

/// Targeted collection over known result-card markup. Data attributes win
/// over rendered text when a card carries them.
const STORE_CARDS_JS: &str = r#"
(() => {
    const stores = [];
    const cards = document.querySelectorAll('.CoveoResult, [class*="store-result"], [class*="store-info"]');
    cards.forEach(card => {
        let storeNumber = '';
        let address = '';
        let phone = '';
        let hours = '';
        let googleMapsLink = '';

        const numberEl = card.querySelector('[class*="store-number"], .store-id, h3, h4');
        if (numberEl) {
            const match = numberEl.textContent.trim().match(/(\d+)/);
            if (match) storeNumber = match[1];
        }

        const addressEl = card.querySelector('[class*="address"], .location, [class*="location"]');
        if (addressEl) {
            let fullText = addressEl.textContent.trim().replace(/\s+/g, ' ');
            const phoneMatch = fullText.match(/(\d{3}-\d{3}-\d{4})/);
            if (phoneMatch) {
                phone = phoneMatch[1];
                fullText = fullText.replace(phoneMatch[0], '').trim();
            }
            address = fullText;
        }

        const hoursEl = card.querySelector('[class*="hours"], [class*="time"]');
        if (hoursEl) hours = hoursEl.textContent.trim();

        const mapLink = card.querySelector('a[href*="google.com/maps"], a[href*="maps.google"]');
        if (mapLink) googleMapsLink = mapLink.href;

        if (card.hasAttribute('data-store-id')) storeNumber = card.getAttribute('data-store-id');
        if (card.hasAttribute('data-address')) address = card.getAttribute('data-address');
        if (card.hasAttribute('data-hours')) hours = card.getAttribute('data-hours');

        if (storeNumber || address) {
            stores.push({ storeNumber, address, phone, hours, googleMapsLink });
        }
    });
    return JSON.stringify(stores);
})()
"#;

/// Last resort: sweep every element for a number near the word "Store".
/// Noisy by construction, so capped at ten rows.
const STORE_SCAN_JS: &str = r#"
(() => {
    const stores = [];
    document.querySelectorAll('*').forEach(el => {
        const text = el.textContent;
        if (!text || !text.includes('Store') || !text.match(/\d{3,}/)) return;
        const match = text.match(/Store\s*#?\s*(\d+)/i);
        if (match) {
            stores.push({
                storeNumber: match[1],
                address: text.slice(0, 200),
                phone: '',
                hours: '',
                googleMapsLink: ''
            });
        }
    });
    return JSON.stringify(stores.slice(0, 10));
})()
"#;

static CARD_PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3}-\d{3}-\d{4}").unwrap());
static CARD_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// Rust-side fallback over the rendered HTML, mirroring the in-page card
/// collection. Useful when script evaluation is blocked but the DOM is
/// otherwise intact.
fn parse_result_grid(html: &str) -> Vec<RawRecord> {
    let document = Html::parse_document(html);
    let card_sel =
        Selector::parse(".CoveoResult, [class*='store-result'], [class*='store-info']").unwrap();
    let number_sel = Selector::parse("[class*='store-number'], .store-id, h3, h4").unwrap();
    let address_sel = Selector::parse("[class*='address'], .location, [class*='location']").unwrap();
    let hours_sel = Selector::parse("[class*='hours'], [class*='time']").unwrap();
    let link_sel =
        Selector::parse("a[href*='google.com/maps'], a[href*='maps.google']").unwrap();

    let mut rows = Vec::new();
    for card in document.select(&card_sel) {
        let mut store_number = first_text(card, &number_sel)
            .and_then(|text| {
                CARD_NUMBER_RE
                    .captures(&text)
                    .map(|caps| caps[1].to_string())
            })
            .unwrap_or_default();

        let mut phone = String::new();
        let mut address = first_text(card, &address_sel).unwrap_or_default();
        if let Some(found) = CARD_PHONE_RE.find(&address).map(|m| m.as_str().to_string()) {
            address = address.replacen(found.as_str(), "", 1);
            phone = found;
        }

        let mut hours = first_text(card, &hours_sel).unwrap_or_default();
        let maps_link = card
            .select(&link_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        if let Some(id) = card.value().attr("data-store-id") {
            store_number = id.to_string();
        }
        if let Some(addr) = card.value().attr("data-address") {
            address = addr.to_string();
        }
        if let Some(h) = card.value().attr("data-hours") {
            hours = h.to_string();
        }

        if store_number.is_empty() && address.is_empty() {
            continue;
        }
        let mut row = RawRecord::new();
        row.insert("storeNumber".into(), Value::String(store_number));
        row.insert("address".into(), Value::String(address));
        row.insert("phone".into(), Value::String(phone));
        row.insert("hours".into(), Value::String(hours));
        row.insert("googleMapsLink".into(), Value::String(maps_link));
        rows.push(row);
    }
    rows
}

fn extraction_strategies() -> Vec<ExtractionStrategy> {
    vec![
        ExtractionStrategy {
            name: "store-cards",
            source: ExtractionSource::InPage(STORE_CARDS_JS),
        },
        ExtractionStrategy {
            name: "result-grid-dom",
            source: ExtractionSource::Document(parse_result_grid),
        },
        ExtractionStrategy {
            name: "store-number-scan",
            source: ExtractionSource::InPage(STORE_SCAN_JS),
        },
    ]
}

/// True once the page title no longer reads as the interstitial placeholder.
/// An empty title means the page is still loading.
fn challenge_cleared(title: &str) -> bool {
    !title.is_empty() && title != CHALLENGE_TITLE
}

/// Convert one raw row into the strict record shape, cleaning the text
/// fields. Fields of unexpected shape read as empty rather than failing the
/// record.
fn record_from_raw(raw: &RawRecord) -> StoreRecord {
    StoreRecord {
        store_number: raw_str(raw, "storeNumber").to_string(),
        address: normalize::clean_address(raw_str(raw, "address")),
        phone: raw_str(raw, "phone").to_string(),
        hours: normalize::clean_hours(raw_str(raw, "hours")),
        google_maps_link: raw_str(raw, "googleMapsLink").to_string(),
    }
}

/// Drop repeats by the `storeNumber|address` composite key, keeping first
/// occurrences in order. Records with both key fields blank carry no
/// identity and are dropped outright. The seen-set lives and dies with this
/// call; nothing is shared across requests.
pub fn dedupe(records: Vec<StoreRecord>) -> Vec<StoreRecord> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for record in records {
        if record.store_number.is_empty() && record.address.is_empty() {
            continue;
        }
        let key = format!("{}|{}", record.store_number, record.address);
        if seen.insert(key) {
            unique.push(record);
        }
    }
    unique
}

/// Run one full store lookup: open a browser, clear the challenge, submit
/// the zipcode, extract, clean and dedupe.
///
/// Zero records is a valid outcome; only launch and submission problems
/// surface as errors. The browser (and any virtual display) is torn down on
/// every path out of this function.
pub async fn lookup_stores(zipcode: &str) -> Result<Vec<StoreRecord>, ScrapeError> {
    let config = SessionConfig::for_store_lookup();
    let session = BrowserSession::open(&config)?;
    let driver = session.driver();
    let deadline = session.deadline();

    info!(zipcode, url = %config.target_url, "🛒 starting store lookup");
    driver.navigate(&config.target_url)?;

    let cleared = poll_until(20, Duration::from_secs(3), deadline, || {
        match driver.title() {
            Ok(title) if challenge_cleared(&title) => PollResult::Ready,
            _ => PollResult::NotYet,
        }
    })
    .await;
    if !cleared {
        // The placeholder title may be a false positive; downstream steps
        // will fail explicitly if the page truly never loaded.
        warn!("challenge clearance not confirmed, continuing best-effort");
    }
    if deadline.expired() {
        return Err(ScrapeError::DeadlineExceeded {
            stage: "challenge wait",
        });
    }

    let mut resolved: Option<LocatorStrategy> = None;
    poll_until(15, Duration::from_secs(2), deadline, || {
        match resolve_first(driver, &SEARCH_BOX_STRATEGIES) {
            Ok(strategy) => {
                resolved = Some(*strategy);
                PollResult::Ready
            }
            Err(_) => PollResult::NotYet,
        }
    })
    .await;
    let strategy = resolved.ok_or(ScrapeError::NoLocatorMatched {
        tried: SEARCH_BOX_STRATEGIES.len(),
    })?;

    submit_query(driver, &strategy, zipcode).await?;
    sleep(Duration::from_millis(500)).await;

    let populated = poll_until(20, Duration::from_secs(2), deadline, || {
        if RESULT_MARKERS
            .iter()
            .any(|marker| driver.query_count(marker) > 0)
        {
            PollResult::Ready
        } else {
            PollResult::NotYet
        }
    })
    .await;
    if !populated {
        warn!("result grid not confirmed, extraction may come back empty");
    }
    if deadline.expired() {
        return Err(ScrapeError::DeadlineExceeded {
            stage: "results wait",
        });
    }

    let records = match extract_first(driver, &extraction_strategies()) {
        Ok((rows, matched)) => {
            info!(strategy = matched, rows = rows.len(), "raw rows collected");
            rows.iter().map(record_from_raw).collect()
        }
        Err(ScrapeError::NoDataExtracted { tried }) => {
            info!(tried, "no stores extracted, returning empty list");
            Vec::new()
        }
        Err(other) => return Err(other),
    };

    let records = dedupe(records);
    info!(count = records.len(), "✅ store lookup finished");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: &str, address: &str, hours: &str) -> StoreRecord {
        StoreRecord {
            store_number: number.to_string(),
            address: address.to_string(),
            phone: String::new(),
            hours: hours.to_string(),
            google_maps_link: String::new(),
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence_per_key() {
        let records = vec![
            record("12", "123 Main St", "Mon-Fri 9-5"),
            record("34", "9 Oak Ave", ""),
            record("12", "123 Main St", "Sun 12-6"),
        ];
        let unique = dedupe(records);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].hours, "Mon-Fri 9-5");
        assert_eq!(unique[1].store_number, "34");
    }

    #[test]
    fn dedupe_is_idempotent() {
        let records = vec![
            record("1", "A", ""),
            record("1", "A", ""),
            record("2", "B", ""),
        ];
        let once = dedupe(records);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn dedupe_drops_records_with_no_identity() {
        let records = vec![
            record("", "", "Mon 9-5"),
            record("", "77 Pine Rd", ""),
            record("5", "", ""),
        ];
        let unique = dedupe(records);
        assert_eq!(unique.len(), 2);
        assert!(unique.iter().all(|r| !r.store_number.is_empty() || !r.address.is_empty()));
    }

    #[test]
    fn same_number_different_address_is_not_a_duplicate() {
        let records = vec![record("12", "123 Main St", ""), record("12", "9 Oak Ave", "")];
        assert_eq!(dedupe(records).len(), 2);
    }

    #[test]
    fn raw_rows_are_cleaned_during_conversion() {
        let mut raw = RawRecord::new();
        raw.insert("storeNumber".into(), Value::String(" 12 ".into()));
        raw.insert(
            "address".into(),
            Value::String("123 Main St 555-123-4567 2.1 Miles Hours Mon-Fri 9-5".into()),
        );
        raw.insert("phone".into(), Value::String("555-123-4567".into()));
        raw.insert("hours".into(), Value::String("Hours   Mon-Fri   9am-9pm".into()));
        raw.insert("googleMapsLink".into(), Value::Null);

        let record = record_from_raw(&raw);
        assert_eq!(record.store_number, "12");
        assert_eq!(record.address, "123 Main St");
        assert_eq!(record.phone, "555-123-4567");
        assert_eq!(record.hours, "Mon-Fri 9am-9pm");
        assert_eq!(record.google_maps_link, "");
    }

    #[test]
    fn challenge_title_and_blank_title_are_not_cleared() {
        assert!(!challenge_cleared("Just a moment..."));
        assert!(!challenge_cleared(""));
        assert!(challenge_cleared("Find a Store"));
    }

    #[test]
    fn result_grid_parse_reads_card_markup() {
        let html = r#"
            <div class="CoveoResult">
                <h4>Store 123</h4>
                <div class="store-address">700 Broad St 555-867-5309</div>
                <div class="store-hours">Hours Mon-Sat 10-9</div>
                <a href="https://www.google.com/maps?q=700+Broad+St">map</a>
            </div>
            <div class="store-result" data-store-id="456" data-address="9 Oak Ave">
                <span class="location">ignored by data attributes</span>
            </div>
        "#;
        let rows = parse_result_grid(html);
        assert_eq!(rows.len(), 2);

        assert_eq!(raw_str(&rows[0], "storeNumber"), "123");
        assert_eq!(raw_str(&rows[0], "phone"), "555-867-5309");
        assert!(raw_str(&rows[0], "address").starts_with("700 Broad St"));
        assert_eq!(raw_str(&rows[0], "hours"), "Hours Mon-Sat 10-9");
        assert!(raw_str(&rows[0], "googleMapsLink").contains("google.com/maps"));

        assert_eq!(raw_str(&rows[1], "storeNumber"), "456");
        assert_eq!(raw_str(&rows[1], "address"), "9 Oak Ave");
    }

    #[test]
    fn result_grid_parse_skips_cards_without_identity() {
        let html = r#"<div class="CoveoResult"><span class="note">nothing useful</span></div>"#;
        assert!(parse_result_grid(html).is_empty());
    }
}
