//! Text cleanup for raw store fields.
//!
//! The result cards render address, phone, distance, hours and action links
//! as one run of text, so the address field usually arrives polluted with all
//! of them. Both cleaners are total: any input, including empty, produces a
//! deterministic output.

use once_cell::sync::Lazy;
use regex::Regex;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3}-\d{3}-\d{4}").unwrap());
static DISTANCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.?\d*\s+Miles?").unwrap());
static HOURS_TAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)Hours\s+.*").unwrap());
static BOILERPLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)(Visit Store Page|Make My Store|My Store).*").unwrap());
static HOURS_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Hours\s*").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip a pattern until the text stops changing. Removing one match can
/// splice the surrounding digits into a fresh match, so a single
/// `replace_all` pass is not enough to guarantee none remain.
fn strip_all(re: &Regex, text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = re.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Reduce a raw address run to just the street address.
///
/// Removes embedded phone numbers, "<n> Miles" distances, everything from the
/// word "Hours" onward and everything from the store-page action links
/// onward, then collapses whitespace.
pub fn clean_address(raw: &str) -> String {
    let mut address = raw.trim().to_string();
    address = strip_all(&PHONE_RE, &address);
    address = strip_all(&DISTANCE_RE, &address);
    address = HOURS_TAIL_RE.replace_all(&address, "").into_owned();
    address = BOILERPLATE_RE.replace_all(&address, "").into_owned();
    let address = SPACE_RE.replace_all(&address, " ");
    address.trim().to_string()
}

/// Drop the leading "Hours" label (any casing, repeated) and collapse
/// whitespace.
pub fn clean_hours(raw: &str) -> String {
    let mut hours = raw.trim().to_string();
    loop {
        let next = HOURS_PREFIX_RE.replace(&hours, "").into_owned();
        if next == hours {
            break;
        }
        hours = next;
    }
    let hours = SPACE_RE.replace_all(&hours, " ");
    hours.trim().to_string()
}
