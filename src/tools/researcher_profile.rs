//! Researcher profile adapters (ORCID public API)
//!
//! `researcher_profile` merges the person, works, education, and employment
//! sections into a single record; `search_researcher_works` reuses the same
//! works fetch with a keyword filter.

use regex::Regex;
use reqwest::Client;
use serde_json::{json, Map, Value};

use super::registry::ToolDefinition;
use super::{http_client, str_arg, ToolAdapter, ToolOutput};

const API_BASE: &str = "https://pub.orcid.org/v3.0";
const ORCID_PATTERN: &str = r"^\d{4}-\d{4}-\d{4}-\d{3}[\dX]$";

/// Shared ORCID public-API client
#[derive(Clone)]
pub(crate) struct OrcidClient {
    client: Client,
    id_pattern: Regex,
}

impl OrcidClient {
    pub(crate) fn new(timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            // The pattern is a literal; construction cannot fail
            id_pattern: Regex::new(ORCID_PATTERN).unwrap(),
        }
    }

    fn is_valid_id(&self, id: &str) -> bool {
        self.id_pattern.is_match(id)
    }

    async fn fetch_section(&self, orcid: &str, section: &str) -> Result<Value, String> {
        let url = format!("{}/{}/{}", API_BASE, orcid, section);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| format!("ORCID {} request failed: {}", section, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(format!("ORCID iD {} not found", orcid));
        }
        if !response.status().is_success() {
            return Err(format!(
                "ORCID {} returned HTTP {}",
                section,
                response.status()
            ));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse ORCID {} response: {}", section, e))
    }
}

/// Pull a nested string out of a loosely-shaped ORCID payload
fn nested_str(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    match current {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Flatten the person section into name/biography fields
fn flatten_person(person: &Value) -> Map<String, Value> {
    let mut record = Map::new();

    let given = nested_str(person, &["name", "given-names", "value"]);
    let family = nested_str(person, &["name", "family-name", "value"]);
    let name = match (given, family) {
        (Some(g), Some(f)) => Some(format!("{} {}", g, f)),
        (Some(g), None) => Some(g),
        (None, Some(f)) => Some(f),
        (None, None) => None,
    };
    if let Some(name) = name {
        record.insert("name".to_string(), json!(name));
    }
    if let Some(bio) = nested_str(person, &["biography", "content"]) {
        record.insert("biography".to_string(), json!(bio));
    }

    let keywords: Vec<String> = person
        .pointer("/keywords/keyword")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|k| nested_str(k, &["content"]))
                .collect()
        })
        .unwrap_or_default();
    if !keywords.is_empty() {
        record.insert("keywords".to_string(), json!(keywords));
    }

    record
}

/// Flatten the works section into `{title, year, type, journal, url}` rows
fn flatten_works(works: &Value) -> Vec<Value> {
    works
        .get("group")
        .and_then(Value::as_array)
        .map(|groups| {
            groups
                .iter()
                .filter_map(|group| {
                    let summary = group.pointer("/work-summary/0")?;
                    let title = nested_str(summary, &["title", "title", "value"])?;

                    let mut row = Map::new();
                    row.insert("title".to_string(), json!(title));
                    if let Some(year) =
                        nested_str(summary, &["publication-date", "year", "value"])
                    {
                        row.insert("year".to_string(), json!(year));
                    }
                    if let Some(kind) = nested_str(summary, &["type"]) {
                        row.insert("type".to_string(), json!(kind));
                    }
                    if let Some(journal) = nested_str(summary, &["journal-title", "value"]) {
                        row.insert("journal".to_string(), json!(journal));
                    }

                    // First DOI external id, as a resolvable URL
                    let doi = summary
                        .pointer("/external-ids/external-id")
                        .and_then(Value::as_array)
                        .and_then(|ids| {
                            ids.iter().find_map(|id| {
                                let id_type = nested_str(id, &["external-id-type"])?;
                                if id_type.eq_ignore_ascii_case("doi") {
                                    nested_str(id, &["external-id-value"])
                                } else {
                                    None
                                }
                            })
                        });
                    if let Some(doi) = doi {
                        row.insert("url".to_string(), json!(format!("https://doi.org/{}", doi)));
                    }

                    Some(Value::Object(row))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Flatten an affiliation section (educations or employments)
fn flatten_affiliations(section: &Value, summary_key: &str) -> Vec<Value> {
    section
        .get("affiliation-group")
        .and_then(Value::as_array)
        .map(|groups| {
            groups
                .iter()
                .flat_map(|group| {
                    group
                        .get("summaries")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default()
                })
                .filter_map(|summary| {
                    let entry = summary.get(summary_key)?;
                    let organization = nested_str(entry, &["organization", "name"])?;

                    let mut row = Map::new();
                    row.insert("organization".to_string(), json!(organization));
                    if let Some(role) = nested_str(entry, &["role-title"]) {
                        row.insert("role".to_string(), json!(role));
                    }
                    if let Some(start) = nested_str(entry, &["start-date", "year", "value"]) {
                        row.insert("start_year".to_string(), json!(start));
                    }
                    if let Some(end) = nested_str(entry, &["end-date", "year", "value"]) {
                        row.insert("end_year".to_string(), json!(end));
                    }
                    Some(Value::Object(row))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Merged researcher profile lookup
pub struct ResearcherProfileTool {
    orcid: OrcidClient,
    max_works: usize,
}

impl ResearcherProfileTool {
    pub fn new(timeout_secs: u64, max_works: usize) -> Self {
        Self {
            orcid: OrcidClient::new(timeout_secs),
            max_works,
        }
    }
}

#[async_trait::async_trait]
impl ToolAdapter for ResearcherProfileTool {
    fn name(&self) -> &'static str {
        "researcher_profile"
    }

    fn citation_prefix(&self) -> &'static str {
        "orcid"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Fetch a researcher's ORCID profile: name, biography, education, \
                          employment history, and recent publications, merged into one record."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "orcid": {
                        "type": "string",
                        "description": "ORCID iD, e.g. 0000-0002-1825-0097"
                    }
                },
                "required": ["orcid"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> ToolOutput {
        let Some(id) = str_arg(args, "orcid") else {
            return ToolOutput::empty("no_queries", "No ORCID iD provided");
        };
        if !self.orcid.is_valid_id(id) {
            return ToolOutput::empty(
                "no_matches",
                format!("'{}' is not a valid ORCID iD", id),
            );
        }

        tracing::debug!(orcid = %id, "Fetching researcher profile");

        // The four sections are independent; fetch them concurrently
        let (person, works, educations, employments) = tokio::join!(
            self.orcid.fetch_section(id, "person"),
            self.orcid.fetch_section(id, "works"),
            self.orcid.fetch_section(id, "educations"),
            self.orcid.fetch_section(id, "employments"),
        );

        // The person section is load-bearing; without it there is no profile
        let person = match person {
            Ok(person) => person,
            Err(e) => {
                tracing::warn!(orcid = %id, error = %e, "ORCID profile fetch failed");
                return ToolOutput::error(e);
            }
        };

        let mut profile = flatten_person(&person);
        profile.insert("orcid".to_string(), json!(id));

        let mut metadata = Map::new();
        metadata.insert("status".to_string(), json!("matches_found"));

        match works {
            Ok(works) => {
                let all = flatten_works(&works);
                let total = all.len();
                let kept: Vec<Value> = all.into_iter().take(self.max_works).collect();
                if total > kept.len() {
                    metadata.insert(
                        "works_note".to_string(),
                        json!(format!("showing {} of {} works", kept.len(), total)),
                    );
                }
                profile.insert("works".to_string(), json!(kept));
            }
            Err(e) => {
                metadata.insert("works_error".to_string(), json!(e));
            }
        }
        match educations {
            Ok(educations) => {
                profile.insert(
                    "education".to_string(),
                    json!(flatten_affiliations(&educations, "education-summary")),
                );
            }
            Err(e) => {
                metadata.insert("educations_error".to_string(), json!(e));
            }
        }
        match employments {
            Ok(employments) => {
                profile.insert(
                    "employment".to_string(),
                    json!(flatten_affiliations(&employments, "employment-summary")),
                );
            }
            Err(e) => {
                metadata.insert("employments_error".to_string(), json!(e));
            }
        }

        ToolOutput::new(vec![Value::Object(profile)], metadata)
    }
}

/// Keyword search over a researcher's ORCID works
pub struct ResearcherWorksTool {
    orcid: OrcidClient,
    max_works: usize,
}

impl ResearcherWorksTool {
    pub fn new(timeout_secs: u64, max_works: usize) -> Self {
        Self {
            orcid: OrcidClient::new(timeout_secs),
            max_works,
        }
    }
}

#[async_trait::async_trait]
impl ToolAdapter for ResearcherWorksTool {
    fn name(&self) -> &'static str {
        "search_researcher_works"
    }

    fn citation_prefix(&self) -> &'static str {
        "orcworks"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Search a researcher's ORCID publication list for works whose titles \
                          match a keyword (e.g. an organism or technique name)."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "orcid": {
                        "type": "string",
                        "description": "ORCID iD, e.g. 0000-0002-1825-0097"
                    },
                    "keyword": {
                        "type": "string",
                        "description": "Keyword to match against work titles"
                    }
                },
                "required": ["orcid", "keyword"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> ToolOutput {
        let Some(id) = str_arg(args, "orcid") else {
            return ToolOutput::empty("no_queries", "No ORCID iD provided");
        };
        let Some(keyword) = str_arg(args, "keyword") else {
            return ToolOutput::empty("no_queries", "No keyword provided");
        };
        if !self.orcid.is_valid_id(id) {
            return ToolOutput::empty(
                "no_matches",
                format!("'{}' is not a valid ORCID iD", id),
            );
        }

        tracing::debug!(orcid = %id, keyword = %keyword, "Searching researcher works");

        let works = match self.orcid.fetch_section(id, "works").await {
            Ok(works) => works,
            Err(e) => {
                tracing::warn!(orcid = %id, error = %e, "ORCID works fetch failed");
                return ToolOutput::error(e);
            }
        };

        let needle = keyword.to_lowercase();
        let matches: Vec<Value> = flatten_works(&works)
            .into_iter()
            .filter(|work| {
                work.get("title")
                    .and_then(Value::as_str)
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .collect();

        if matches.is_empty() {
            return ToolOutput::empty(
                "no_matches",
                format!("No works matching '{}' for ORCID iD {}", keyword, id),
            );
        }

        let total = matches.len();
        let items: Vec<Value> = matches.into_iter().take(self.max_works).collect();

        let mut metadata = Map::new();
        metadata.insert("status".to_string(), json!("matches_found"));
        metadata.insert("keyword".to_string(), json!(keyword));
        metadata.insert("count".to_string(), json!(items.len()));
        if total > items.len() {
            metadata.insert(
                "works_note".to_string(),
                json!(format!("showing {} of {} matching works", items.len(), total)),
            );
        }

        ToolOutput::new(items, metadata)
    }
}
