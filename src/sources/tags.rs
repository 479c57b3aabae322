//! Rules applied to raw tagged map features.
//!
//! Everything in here is a pure function of a feature's tag map, so the same
//! tags always yield the same verdict and the same classification.

use crate::models::AccommodationType;
use std::collections::HashMap;

pub type Tags = HashMap<String, String>;

/// Names that mappers use instead of leaving the name empty
const PLACEHOLDER_NAMES: &[&str] = &[
    "unnamed",
    "no name",
    "noname",
    "unknown",
    "naamloos",
    "onbekend",
    "zonder naam",
    "sans nom",
    "inconnu",
    "ohne namen",
    "unbenannt",
];

/// Hosts that show up as fake or template websites
const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "example.be",
    "website.com",
    "yourwebsite.com",
    "mywebsite.com",
    "domain.com",
    "yourdomain.com",
    "test.com",
    "sample.com",
    "placeholder.com",
    "localhost",
];

/// Organization-name tokens of youth movements. Single words match word prefixes.
pub const YOUTH_KEYWORDS: &[&str] = &[
    "chiro",
    "scouts",
    "scouting",
    "scout",
    "ksa",
    "klj",
    "kljb",
    "vvksm",
    "patro",
    "gidsen",
    "guides",
    "jeugdbeweging",
    "jeugdhuis",
    "jeugdlokaal",
    "jeugdcentrum",
    "pfadfinder",
    "jugendzentrum",
    "youth centre",
    "youth center",
    "youth club",
    "youth movement",
    "maison de jeunes",
];

const CAMPING_KEYWORDS: &[&str] = &["camping", "campsite", "kampeerterrein", "kampeerweide", "kampterrein"];

const HOSTEL_KEYWORDS: &[&str] = &["hostel", "jeugdherberg", "jugendherberge", "auberge de jeunesse", "groepsverblijf"];

pub fn tag<'a>(tags: &'a Tags, key: &str) -> Option<&'a str> {
    tags.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn tag_is(tags: &Tags, key: &str, value: &str) -> bool {
    tag(tags, key).is_some_and(|v| v.eq_ignore_ascii_case(value))
}

fn first_tag<'a>(tags: &'a Tags, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| tag(tags, key))
}

/// True when the name is missing or a known placeholder.
pub fn is_placeholder_name(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    name.is_empty() || PLACEHOLDER_NAMES.contains(&name.as_str())
}

/// Declared capacity, reading the leading number of values like "40" or "40-60".
pub fn capacity(tags: &Tags) -> Option<u32> {
    let raw = first_tag(tags, &["capacity:persons", "capacity", "beds"])?;
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn has_group_flag(tags: &Tags) -> bool {
    ["group_accommodation", "groups", "group_only"]
        .iter()
        .any(|key| tag_is(tags, key, "yes"))
}

fn is_campsite(tags: &Tags) -> bool {
    tag_is(tags, "tourism", "camp_site")
}

fn is_hostel(tags: &Tags) -> bool {
    tag_is(tags, "tourism", "hostel") || tag_is(tags, "hostel", "yes")
}

fn is_club_or_community_centre(tags: &Tags) -> bool {
    tag(tags, "club").is_some() || tag_is(tags, "leisure", "club") || tag_is(tags, "amenity", "community_centre")
}

fn has_youth_marker(tags: &Tags) -> bool {
    tag_is(tags, "club", "scout")
        || tag_is(tags, "club", "youth")
        || tag_is(tags, "scout", "yes")
        || tag_is(tags, "youth", "yes")
        || tag(tags, "community_centre").is_some_and(|v| v.contains("youth"))
        || tag(tags, "community_centre:for").is_some_and(|v| v.contains("juvenile") || v.contains("youth"))
}

/// Outcome of the group-suitability filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suitability {
    Accept(&'static str),
    Reject(&'static str),
}

impl Suitability {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Suitability::Accept(_))
    }
}

struct GroupRule {
    matches: fn(&Tags) -> bool,
    verdict: Suitability,
}

/// Evaluated top to bottom, first match wins.
const GROUP_RULES: &[GroupRule] = &[
    GroupRule {
        matches: has_group_flag,
        verdict: Suitability::Accept("flagged as group accommodation"),
    },
    GroupRule {
        matches: |tags| capacity(tags).is_some_and(|c| c >= 10),
        verdict: Suitability::Accept("capacity of 10 or more"),
    },
    GroupRule {
        matches: |tags| capacity(tags).is_some_and(|c| c < 5),
        verdict: Suitability::Reject("capacity below 5"),
    },
    GroupRule {
        matches: |tags| is_campsite(tags) && (tag_is(tags, "groups", "no") || tag_is(tags, "group_only", "no")),
        verdict: Suitability::Reject("campsite refuses groups"),
    },
    GroupRule {
        matches: is_campsite,
        verdict: Suitability::Accept("campsite without group restriction"),
    },
    GroupRule {
        matches: is_hostel,
        verdict: Suitability::Accept("hostel"),
    },
    GroupRule {
        matches: |tags| is_club_or_community_centre(tags) && has_youth_marker(tags),
        verdict: Suitability::Accept("scout or youth venue"),
    },
];

/// Decides whether a feature can host a group.
pub fn group_suitability(tags: &Tags) -> Suitability {
    GROUP_RULES
        .iter()
        .find(|rule| (rule.matches)(tags))
        .map(|rule| rule.verdict)
        .unwrap_or(Suitability::Reject("no sign of group use"))
}

fn classify_by_tags(tags: &Tags) -> Option<AccommodationType> {
    if is_campsite(tags) {
        Some(AccommodationType::Camping)
    } else if is_hostel(tags) || tag_is(tags, "group_accommodation", "yes") {
        Some(AccommodationType::Hostel)
    } else if has_youth_marker(tags) {
        Some(AccommodationType::YouthMovement)
    } else {
        None
    }
}

fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        return haystack.contains(keyword);
    }
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.starts_with(keyword))
}

/// Youth organization token found in `text`, if any.
pub fn youth_keyword(text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    YOUTH_KEYWORDS.iter().copied().find(|kw| contains_keyword(&text, kw))
}

fn classify_by_name(name: &str) -> Option<AccommodationType> {
    let lower = name.to_lowercase();
    if youth_keyword(&lower).is_some() {
        Some(AccommodationType::YouthMovement)
    } else if CAMPING_KEYWORDS.iter().any(|kw| contains_keyword(&lower, kw)) {
        Some(AccommodationType::Camping)
    } else if HOSTEL_KEYWORDS.iter().any(|kw| contains_keyword(&lower, kw)) {
        Some(AccommodationType::Hostel)
    } else {
        None
    }
}

/// Tag values decide first; the name is only consulted when tags are ambiguous.
pub fn classify(tags: &Tags, name: &str) -> Option<AccommodationType> {
    classify_by_tags(tags).or_else(|| classify_by_name(name))
}

/// Postal address from `addr:*` tags.
pub fn assemble_address(tags: &Tags) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(street) = tag(tags, "addr:street") {
        let line = match tag(tags, "addr:housenumber") {
            Some(number) => format!("{street} {number}"),
            None => street.to_string(),
        };
        parts.push(line);
    }

    let locality: Vec<&str> = [tag(tags, "addr:postcode"), tag(tags, "addr:city")]
        .into_iter()
        .flatten()
        .collect();
    if !locality.is_empty() {
        parts.push(locality.join(" "));
    }

    if parts.is_empty() {
        if let Some(place) = tag(tags, "addr:place") {
            parts.push(place.to_string());
        }
    }

    if parts.is_empty() {
        return None;
    }
    if let Some(country) = tag(tags, "addr:country") {
        parts.push(country.to_string());
    }
    Some(parts.join(", "))
}

/// Trims, adds a scheme when missing, and drops placeholder domains.
pub fn normalize_website(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let url = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let host = url
        .split("://")
        .nth(1)?
        .split(['/', '?', '#'])
        .next()?
        .split(':')
        .next()?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if host.is_empty() || !host.contains('.') && host != "localhost" {
        return None;
    }
    let is_placeholder = PLACEHOLDER_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")));
    if is_placeholder {
        return None;
    }
    Some(url)
}

pub fn website(tags: &Tags) -> Option<String> {
    first_tag(tags, &["website", "contact:website", "url"]).and_then(normalize_website)
}

pub fn phone(tags: &Tags) -> Option<String> {
    first_tag(tags, &["phone", "contact:phone"]).map(str::to_string)
}

pub fn email(tags: &Tags) -> Option<String> {
    first_tag(tags, &["email", "contact:email"]).map(str::to_string)
}

/// Youth venues need an address; everything else needs a website or phone.
pub fn passes_information_gate(
    kind: AccommodationType,
    address: Option<&str>,
    website: Option<&str>,
    phone: Option<&str>,
) -> bool {
    let present = |v: Option<&str>| v.is_some_and(|s| !s.trim().is_empty());
    match kind {
        AccommodationType::YouthMovement => present(address),
        _ => present(website) || present(phone),
    }
}
