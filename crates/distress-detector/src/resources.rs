//! Country-specific crisis resources

use serde::{Deserialize, Serialize};

/// Country codes recognised in free-form addresses
const KNOWN_COUNTRIES: &[&str] = &[
    "US", "CA", "UK", "AU", "DE", "FR", "ES", "MX", "BR", "IN", "CN", "JP", "KR",
];

/// A crisis phone line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Helpline {
    /// `suicide_prevention`, `crisis_text` or `mental_health`
    pub kind: String,
    pub name: String,
    pub number: String,
    /// SMS short code or instructions, when the line accepts texts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A therapist directory or online therapy service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryLink {
    pub name: String,
    pub url: String,
    /// `directory` or `online_therapy`
    pub kind: String,
}

/// Self-help exercise, as localization keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfHelpResource {
    pub id: String,
    pub title_key: String,
    pub description_key: String,
    pub step_keys: Vec<String>,
}

/// Resources offered alongside an alert-worthy verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisResources {
    /// Resolved country code, `None` when unknown
    pub country: Option<String>,
    pub emergency_number: String,
    pub helplines: Vec<Helpline>,
    pub therapist_directories: Vec<DirectoryLink>,
    pub self_help: Vec<SelfHelpResource>,
}

impl CrisisResources {
    /// Resources for a country code; unknown or missing codes get the defaults
    pub fn for_country(code: Option<&str>) -> Self {
        let country = code.map(|c| c.trim().to_ascii_uppercase()).filter(|c| !c.is_empty());
        let key = country.as_deref().unwrap_or("");
        Self {
            emergency_number: emergency_number(key).to_string(),
            helplines: helplines(key),
            therapist_directories: directories(key),
            self_help: self_help(),
            country,
        }
    }

    /// Resources for the country named in a free-form address
    pub fn for_address(address: Option<&str>) -> Self {
        Self::for_country(address.and_then(country_from_address))
    }
}

impl Default for CrisisResources {
    fn default() -> Self {
        Self::for_country(None)
    }
}

/// Last known two-letter country code appearing as a standalone
/// uppercase token in an address. Scanning from the end keeps state
/// abbreviations such as `DE` or `CA` in "city, state, country" addresses
/// from being read as countries.
pub fn country_from_address(address: &str) -> Option<&'static str> {
    address
        .rsplit(|c: char| !c.is_ascii_alphanumeric())
        .find_map(|token| KNOWN_COUNTRIES.iter().copied().find(|code| *code == token))
}

fn emergency_number(country: &str) -> &'static str {
    match country {
        "UK" => "999",
        "AU" => "000",
        "DE" | "FR" | "ES" => "112",
        _ => "911",
    }
}

fn line(kind: &str, name: &str, number: &str, text: Option<&str>) -> Helpline {
    Helpline {
        kind: kind.to_string(),
        name: name.to_string(),
        number: number.to_string(),
        text: text.map(str::to_string),
    }
}

fn helplines(country: &str) -> Vec<Helpline> {
    match country {
        "US" => vec![
            line("suicide_prevention", "National Suicide Prevention Lifeline", "988", Some("988")),
            line("crisis_text", "Crisis Text Line", "741741", Some("Text HOME to 741741")),
            line("mental_health", "SAMHSA National Helpline", "1-800-662-4357", None),
        ],
        "CA" => vec![
            line("suicide_prevention", "Crisis Services Canada", "1-833-456-4566", Some("45645")),
            line("mental_health", "Mental Health Helpline", "1-866-531-2600", None),
        ],
        "UK" => vec![
            line("suicide_prevention", "Samaritans", "116 123", Some("SHOUT to 85258")),
            line("mental_health", "Mind Infoline", "0300 123 3393", None),
        ],
        "AU" => vec![
            line("suicide_prevention", "Lifeline Australia", "13 11 14", Some("0477 13 11 14")),
            line("mental_health", "Beyond Blue", "1300 22 4636", None),
        ],
        "DE" => vec![
            line("suicide_prevention", "Telefonseelsorge", "0800 111 0 111", None),
            line("mental_health", "Nummer gegen Kummer", "116 111", None),
        ],
        "FR" => vec![
            line("suicide_prevention", "SOS Amitié", "09 72 39 40 50", None),
            line("mental_health", "Fil Santé Jeunes", "0 800 235 236", None),
        ],
        "ES" => vec![
            line("suicide_prevention", "Teléfono de la Esperanza", "717 003 717", None),
            line("mental_health", "Salud Mental", "024", None),
        ],
        _ => vec![
            line("suicide_prevention", "International Suicide Prevention", "988", Some("988")),
            line("mental_health", "Mental Health Support", "116 123", None),
        ],
    }
}

fn link(name: &str, url: &str, kind: &str) -> DirectoryLink {
    DirectoryLink {
        name: name.to_string(),
        url: url.to_string(),
        kind: kind.to_string(),
    }
}

fn directories(country: &str) -> Vec<DirectoryLink> {
    match country {
        "US" => vec![
            link("Psychology Today", "https://www.psychologytoday.com", "directory"),
            link("BetterHelp", "https://www.betterhelp.com", "online_therapy"),
        ],
        "CA" => vec![link("Canadian Psychological Association", "https://cpa.ca", "directory")],
        "UK" => vec![link("BACP", "https://www.bacp.co.uk", "directory")],
        _ => vec![link(
            "International Therapist Directory",
            "https://www.psychologytoday.com",
            "directory",
        )],
    }
}

fn exercise(id: &str, steps: usize) -> SelfHelpResource {
    SelfHelpResource {
        id: id.to_string(),
        title_key: format!("{}_title", id),
        description_key: format!("{}_description", id),
        step_keys: (1..=steps).map(|i| format!("{}_step_{}", id, i)).collect(),
    }
}

fn self_help() -> Vec<SelfHelpResource> {
    vec![
        exercise("breathing_exercise", 4),
        exercise("grounding_technique", 3),
        exercise("safety_plan", 3),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emergency_numbers() {
        assert_eq!(CrisisResources::for_country(Some("US")).emergency_number, "911");
        assert_eq!(CrisisResources::for_country(Some("uk")).emergency_number, "999");
        assert_eq!(CrisisResources::for_country(Some("AU")).emergency_number, "000");
        assert_eq!(CrisisResources::for_country(Some("FR")).emergency_number, "112");
        assert_eq!(CrisisResources::for_country(Some("JP")).emergency_number, "911");
        assert_eq!(CrisisResources::default().emergency_number, "911");
    }

    #[test]
    fn test_unknown_country_gets_default_lines() {
        let resources = CrisisResources::for_country(Some("MX"));
        assert_eq!(resources.country.as_deref(), Some("MX"));
        assert_eq!(resources.helplines.len(), 2);
        assert_eq!(resources.helplines[0].name, "International Suicide Prevention");
        assert_eq!(resources.therapist_directories[0].name, "International Therapist Directory");
    }

    #[test]
    fn test_us_resources() {
        let resources = CrisisResources::for_country(Some("US"));
        assert_eq!(resources.helplines.len(), 3);
        assert_eq!(resources.helplines[1].kind, "crisis_text");
        assert_eq!(resources.therapist_directories.len(), 2);
    }

    #[test]
    fn test_self_help_keys() {
        let resources = CrisisResources::default();
        let breathing = &resources.self_help[0];
        assert_eq!(breathing.title_key, "breathing_exercise_title");
        assert_eq!(breathing.step_keys.len(), 4);
        assert_eq!(breathing.step_keys[3], "breathing_exercise_step_4");
    }

    #[test]
    fn test_state_abbreviation_does_not_pick_country() {
        let resources = CrisisResources::for_address(Some("Wilmington, DE 19801, US"));
        assert_eq!(resources.country.as_deref(), Some("US"));
        assert_eq!(resources.emergency_number, "911");
    }

    #[test]
    fn test_country_from_address() {
        assert_eq!(country_from_address("221B Baker Street, London, UK"), Some("UK"));
        assert_eq!(country_from_address("1 Main St, Springfield, IL 62701, US"), Some("US"));
        assert_eq!(country_from_address("Calle de Alcalá 1, Madrid"), None);
        assert_eq!(country_from_address("1000 N King St, Wilmington, DE 19801, US"), Some("US"));
        assert_eq!(country_from_address("500 Capitol Mall, Sacramento, CA 95814, US"), Some("US"));
        assert_eq!(country_from_address(""), None);

        let resources = CrisisResources::for_address(Some("Unter den Linden 5, Berlin, DE"));
        assert_eq!(resources.emergency_number, "112");
        assert_eq!(resources.helplines[0].name, "Telefonseelsorge");
    }
}
