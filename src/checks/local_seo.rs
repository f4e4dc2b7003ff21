//! Local SEO: NAP consistency, LocalBusiness markup, geo tags and profiles
//!
//! NAP (name, address, phone) details are gathered from JSON-LD, `<address>`
//! elements, `tel:` links and the visible text of every crawled page, then
//! compared across the site.

use super::*;
use crate::text::{clean_text, extract_emails, extract_phone_numbers, normalize_phone};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static TEL_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']tel:([^"']+)["']"#).expect("valid tel regex")
});

/// Schema.org types that describe a physical business besides `*Business`
const LOCAL_TYPES: &[&str] = &[
    "Restaurant",
    "Store",
    "Dentist",
    "Physician",
    "Hotel",
    "Attorney",
    "AutoRepair",
    "BarOrPub",
    "CafeOrCoffeeShop",
    "RealEstateAgent",
    "MedicalClinic",
];

const GEO_META: &[&str] = &["geo.region", "geo.placename", "geo.position", "icbm"];

const PROFILE_HOSTS: &[(&str, &str)] = &[
    ("google.com/maps", "google_maps"),
    ("maps.google.", "google_maps"),
    ("g.page", "google_business"),
    ("yelp.", "yelp"),
    ("facebook.com", "facebook"),
];

/// NAP details found on one page
#[derive(Debug, Default)]
struct PageNap {
    names: Vec<String>,
    addresses: Vec<String>,
    phones: Vec<String>,
    emails: Vec<String>,
    local_business: bool,
}

pub struct LocalSeoCheck;

#[async_trait]
impl Check for LocalSeoCheck {
    fn name(&self) -> &'static str {
        "local_seo"
    }

    fn description(&self) -> &'static str {
        "Checks NAP consistency, LocalBusiness schema, geo tags and business profile links"
    }

    async fn run(
        &self,
        snapshot: &CrawlSnapshot,
        ctx: &CheckContext,
    ) -> Result<CheckResult, CheckError> {
        let mut findings = Findings::new();
        let mut names: BTreeSet<String> = BTreeSet::new();
        let mut addresses: BTreeSet<String> = BTreeSet::new();
        // normalized digits -> first spelling seen
        let mut phones: BTreeMap<String, String> = BTreeMap::new();
        let mut emails: BTreeSet<String> = BTreeSet::new();
        let mut schema_pages = 0;
        let mut geo_tags: BTreeSet<&str> = BTreeSet::new();
        let mut profiles: BTreeSet<&str> = BTreeSet::new();
        let mut pages = 0;

        for (_, doc) in snapshot.documents() {
            pages += 1;
            let nap = page_nap(doc);
            if nap.local_business {
                schema_pages += 1;
            }
            names.extend(nap.names);
            addresses.extend(nap.addresses);
            emails.extend(nap.emails.into_iter().map(|e| e.to_lowercase()));
            for phone in nap.phones {
                let digits = normalize_phone(&phone);
                if digits.len() >= 7 {
                    phones.entry(digits).or_insert(phone);
                }
            }

            for &tag in GEO_META {
                if doc.meta(tag).is_some() {
                    geo_tags.insert(tag);
                }
            }
            for link in &doc.links {
                let lowered = link.url.to_lowercase();
                let profile = PROFILE_HOSTS.iter().find(|(host, _)| lowered.contains(host));
                if let Some((_, kind)) = profile {
                    profiles.insert(*kind);
                }
            }
        }

        if pages == 0 {
            return Ok(findings.into_result(json!({ "pages_analyzed": 0 })));
        }

        if ctx.config.local_seo.nap_check {
            if phones.len() > 1 {
                findings.issue(
                    Severity::Medium,
                    format!(
                        "Inconsistent phone numbers across pages: {}",
                        phones.values().cloned().collect::<Vec<_>>().join(", ")
                    ),
                );
                findings.recommend(
                    "Use one business phone number, formatted the same way, on every page",
                );
            }
            if addresses.len() > 1 {
                findings.issue(
                    Severity::Medium,
                    format!("{} different business addresses found", addresses.len()),
                );
                findings.recommend("Keep the business address identical wherever it appears");
            }
            if names.len() > 1 {
                findings.issue(
                    Severity::Low,
                    format!(
                        "Business name varies in structured data: {}",
                        names.iter().cloned().collect::<Vec<_>>().join(", ")
                    ),
                );
            }
        }

        if schema_pages == 0 {
            findings.issue(Severity::Low, "No LocalBusiness structured data found");
            findings.recommend("Add LocalBusiness JSON-LD with name, address and telephone");
        }
        if phones.is_empty() {
            findings.issue(Severity::Low, "No phone number found on the site");
        }
        if geo_tags.is_empty() {
            findings.issue(Severity::Info, "No geo meta tags (geo.region, geo.position, ICBM)");
        }
        if profiles.is_empty() {
            findings.issue(
                Severity::Info,
                "No links to business profiles (Google Maps, Yelp, Facebook)",
            );
            findings.recommend("Link to the business's Google Business Profile and other listings");
        }

        let metrics = json!({
            "pages_analyzed": pages,
            "local_business_pages": schema_pages,
            "business_names": names,
            "addresses": addresses,
            "phones": phones.values().collect::<Vec<_>>(),
            "emails": emails,
            "geo_tags": geo_tags,
            "profile_links": profiles,
        });
        Ok(findings.into_result(metrics))
    }
}

fn page_nap(doc: &crate::snapshot::PageDocument) -> PageNap {
    let mut nap = PageNap::default();

    for value in doc.json_ld_values() {
        for business in local_businesses(value) {
            nap.local_business = true;
            if let Some(name) = business.get("name").and_then(Value::as_str) {
                nap.names.push(clean_text(name));
            }
            if let Some(phone) = business.get("telephone").and_then(Value::as_str) {
                nap.phones.push(phone.trim().to_string());
            }
            if let Some(address) = business.get("address").and_then(format_address) {
                nap.addresses.push(address);
            }
        }
    }

    nap.addresses.extend(address_elements(&doc.html));
    nap.phones.extend(
        TEL_HREF_RE
            .captures_iter(&doc.html)
            .map(|c| c[1].trim().to_string()),
    );
    nap.phones.extend(extract_phone_numbers(&doc.text));
    nap.emails = extract_emails(&doc.text);
    nap
}

/// JSON-LD objects typed as a local business, including `@graph` members
fn local_businesses(value: &Value) -> Vec<&serde_json::Map<String, Value>> {
    let mut found = Vec::new();
    match value {
        Value::Array(items) => {
            for item in items {
                found.extend(local_businesses(item));
            }
        }
        Value::Object(map) => {
            let local = match map.get("@type") {
                Some(Value::String(t)) => is_local_type(t),
                Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).any(is_local_type),
                _ => false,
            };
            if local {
                found.push(map);
            }
            if let Some(graph) = map.get("@graph") {
                found.extend(local_businesses(graph));
            }
        }
        _ => {}
    }
    found
}

fn is_local_type(schema_type: &str) -> bool {
    schema_type.ends_with("Business") || LOCAL_TYPES.contains(&schema_type)
}

/// Renders a schema.org address (text or `PostalAddress`) as one line
fn format_address(value: &Value) -> Option<String> {
    let line = match value {
        Value::String(s) => clean_text(s),
        Value::Object(map) => ["streetAddress", "addressLocality", "addressRegion", "postalCode"]
            .iter()
            .filter_map(|k| map.get(*k).and_then(Value::as_str))
            .map(clean_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    (!line.is_empty()).then_some(line)
}

fn address_elements(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("address") else {
        return Vec::new();
    };
    Html::parse_document(html)
        .select(&selector)
        .map(|e| clean_text(&e.text().collect::<Vec<_>>().join(" ")))
        .filter(|s| !s.is_empty())
        .collect()
}
