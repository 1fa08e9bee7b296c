//! Scholarly article search adapter (Europe PMC)

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::registry::ToolDefinition;
use super::{http_client, str_arg, ToolAdapter, ToolOutput};

const SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

/// Search mode: lite returns many shallow records, full returns few deep ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchMode {
    Lite,
    Full,
}

/// Article search via the Europe PMC REST API
pub struct ArticleSearchTool {
    client: Client,
    lite_results: usize,
    full_results: usize,
}

impl ArticleSearchTool {
    pub fn new(timeout_secs: u64, lite_results: usize, full_results: usize) -> Self {
        Self {
            client: http_client(timeout_secs),
            lite_results,
            full_results,
        }
    }

    /// Build a Europe PMC query string from the structured filters
    fn build_query(args: &Value) -> Option<String> {
        let mut clauses = Vec::new();

        if let Some(author) = str_arg(args, "author") {
            clauses.push(format!("AUTH:\"{}\"", author));
        }
        if let Some(orcid) = str_arg(args, "orcid") {
            clauses.push(format!("AUTHORID:\"{}\"", orcid));
        }
        if let Some(affiliation) = str_arg(args, "affiliation") {
            clauses.push(format!("AFF:\"{}\"", affiliation));
        }
        if let Some(topic) = str_arg(args, "topic") {
            clauses.push(topic.to_string());
        }

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }
}

/// Europe PMC search response
#[derive(Debug, Deserialize)]
struct PmcResponse {
    #[serde(rename = "resultList", default)]
    result_list: Option<PmcResultList>,
    #[serde(rename = "hitCount", default)]
    hit_count: u64,
}

#[derive(Debug, Deserialize, Default)]
struct PmcResultList {
    #[serde(default)]
    result: Vec<PmcArticle>,
}

#[derive(Debug, Deserialize)]
struct PmcArticle {
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "authorString")]
    author_string: Option<String>,
    #[serde(rename = "authorList")]
    author_list: Option<PmcAuthorList>,
    #[serde(rename = "journalTitle")]
    journal_title: Option<String>,
    #[serde(rename = "pubYear")]
    pub_year: Option<String>,
    doi: Option<String>,
    #[serde(rename = "abstractText")]
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PmcAuthorList {
    #[serde(default)]
    author: Vec<PmcAuthor>,
}

#[derive(Debug, Deserialize)]
struct PmcAuthor {
    #[serde(rename = "fullName")]
    full_name: Option<String>,
    #[serde(rename = "authorId")]
    author_id: Option<PmcAuthorId>,
    #[serde(rename = "affiliation")]
    affiliation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PmcAuthorId {
    value: Option<String>,
}

/// Build a resolvable URL from a DOI
fn doi_url(doi: &str) -> String {
    format!("https://doi.org/{}", doi)
}

/// Case-insensitive check that an author name matches the queried name
fn author_matches(full_name: &str, queried: &str) -> bool {
    let full = full_name.to_lowercase();
    queried
        .to_lowercase()
        .split_whitespace()
        .all(|part| full.contains(part))
        // Surname-only fallback for "J. Smith" style records
        || queried
            .to_lowercase()
            .split_whitespace()
            .last()
            .map(|last| full.contains(last))
            .unwrap_or(false)
}

/// Flatten one article into an LLM-friendly record
fn flatten_article(
    article: PmcArticle,
    mode: SearchMode,
    queried_author: Option<&str>,
    queried_orcid: Option<&str>,
) -> Value {
    let url = article.doi.as_deref().map(doi_url);

    let mut record = Map::new();
    record.insert("id".to_string(), json!(article.id.unwrap_or_default()));
    record.insert(
        "title".to_string(),
        json!(article.title.unwrap_or_default()),
    );
    if let Some(journal) = article.journal_title {
        record.insert("journal".to_string(), json!(journal));
    }
    if let Some(year) = article.pub_year {
        record.insert("year".to_string(), json!(year));
    }
    if let Some(doi) = article.doi {
        record.insert("doi".to_string(), json!(doi));
    }
    if let Some(url) = url {
        record.insert("url".to_string(), json!(url));
    }

    match mode {
        SearchMode::Lite => {
            // Surface only the authors that match the queried name/ORCID to
            // keep 25-record responses compact
            let matching: Vec<String> = article
                .author_list
                .as_ref()
                .map(|list| {
                    list.author
                        .iter()
                        .filter(|a| {
                            let name_hit = match (queried_author, a.full_name.as_deref()) {
                                (Some(q), Some(name)) => author_matches(name, q),
                                _ => false,
                            };
                            let orcid_hit = match (
                                queried_orcid,
                                a.author_id.as_ref().and_then(|id| id.value.as_deref()),
                            ) {
                                (Some(q), Some(id)) => id.eq_ignore_ascii_case(q),
                                _ => false,
                            };
                            name_hit || orcid_hit
                        })
                        .filter_map(|a| a.full_name.clone())
                        .collect()
                })
                .unwrap_or_default();

            if !matching.is_empty() {
                record.insert("matching_authors".to_string(), json!(matching));
            } else if let Some(authors) = article.author_string {
                record.insert("authors".to_string(), json!(authors));
            }
        }
        SearchMode::Full => {
            if let Some(authors) = article.author_string {
                record.insert("authors".to_string(), json!(authors));
            }
            // Flatten author affiliations for provenance checks
            let affiliations: Vec<Value> = article
                .author_list
                .map(|list| {
                    list.author
                        .into_iter()
                        .filter_map(|a| {
                            let name = a.full_name?;
                            Some(json!({
                                "name": name,
                                "affiliation": a.affiliation.unwrap_or_default(),
                            }))
                        })
                        .collect()
                })
                .unwrap_or_default();
            if !affiliations.is_empty() {
                record.insert("author_affiliations".to_string(), json!(affiliations));
            }
            if let Some(abstract_text) = article.abstract_text {
                record.insert("abstract".to_string(), json!(abstract_text));
            }
        }
    }

    Value::Object(record)
}

#[async_trait::async_trait]
impl ToolAdapter for ArticleSearchTool {
    fn name(&self) -> &'static str {
        "article_search"
    }

    fn citation_prefix(&self) -> &'static str {
        "epmc"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Search Europe PMC for scholarly publications. Filter by author name, \
                          affiliation, ORCID iD, and/or topic keywords. Use mode 'lite' for a \
                          broad survey (many shallow records) or 'full' for detailed records \
                          with abstracts and author affiliations."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "author": {"type": "string", "description": "Author name"},
                    "affiliation": {"type": "string", "description": "Institutional affiliation"},
                    "orcid": {"type": "string", "description": "Author ORCID iD"},
                    "topic": {"type": "string", "description": "Topic keywords"},
                    "mode": {
                        "type": "string",
                        "enum": ["lite", "full"],
                        "description": "Result verbosity (default lite)"
                    }
                }
            }),
        }
    }

    async fn execute(&self, args: &Value) -> ToolOutput {
        let Some(query) = Self::build_query(args) else {
            return ToolOutput::empty("no_queries", "No article search filters provided");
        };

        let mode = match str_arg(args, "mode") {
            Some("full") => SearchMode::Full,
            _ => SearchMode::Lite,
        };
        let (page_size, result_type) = match mode {
            SearchMode::Lite => (self.lite_results, "lite"),
            SearchMode::Full => (self.full_results, "core"),
        };

        tracing::debug!(query = %query, mode = ?mode, "Running article search");

        let response = match self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("query", query.as_str()),
                ("format", "json"),
                ("resultType", result_type),
                ("pageSize", &page_size.to_string()),
            ])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Article search request failed");
                return ToolOutput::error(format!("Article search request failed: {}", e));
            }
        };

        if !response.status().is_success() {
            return ToolOutput::error(format!(
                "Article search returned HTTP {}",
                response.status()
            ));
        }

        let parsed: PmcResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return ToolOutput::error(format!("Failed to parse article search response: {}", e));
            }
        };

        let articles = parsed.result_list.unwrap_or_default().result;
        if articles.is_empty() {
            return ToolOutput::empty(
                "no_matches",
                format!("No publications found for query '{}'", query),
            );
        }

        let queried_author = str_arg(args, "author");
        let queried_orcid = str_arg(args, "orcid");
        let items: Vec<Value> = articles
            .into_iter()
            .take(page_size)
            .map(|a| flatten_article(a, mode, queried_author, queried_orcid))
            .collect();

        let mut metadata = Map::new();
        metadata.insert("status".to_string(), json!("matches_found"));
        metadata.insert("query".to_string(), json!(query));
        metadata.insert("total_hits".to_string(), json!(parsed.hit_count));
        metadata.insert("count".to_string(), json!(items.len()));

        ToolOutput::new(items, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_combines_filters_with_and() {
        let query = ArticleSearchTool::build_query(&json!({
            "author": "Jane Doe",
            "affiliation": "Broad Institute",
            "topic": "influenza",
        }))
        .unwrap();
        assert!(query.contains("AUTH:\"Jane Doe\""));
        assert!(query.contains("AFF:\"Broad Institute\""));
        assert!(query.contains("influenza"));
        assert_eq!(query.matches(" AND ").count(), 2);
    }

    #[test]
    fn no_filters_means_no_query() {
        assert!(ArticleSearchTool::build_query(&json!({})).is_none());
    }

    #[test]
    fn doi_becomes_resolvable_url() {
        assert_eq!(doi_url("10.1000/xyz"), "https://doi.org/10.1000/xyz");
    }

    #[test]
    fn lite_mode_surfaces_only_matching_authors() {
        let article: PmcArticle = serde_json::from_value(json!({
            "id": "PMC1",
            "title": "Reverse genetics of influenza",
            "authorString": "Doe J, Roe R.",
            "authorList": {"author": [
                {"fullName": "Doe Jane", "authorId": {"value": "0000-0001-2345-6789"}},
                {"fullName": "Roe Richard"}
            ]},
            "doi": "10.1/abc"
        }))
        .unwrap();

        let record = flatten_article(article, SearchMode::Lite, Some("Jane Doe"), None);
        let matching = record["matching_authors"].as_array().unwrap();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0], "Doe Jane");
        assert_eq!(record["url"], "https://doi.org/10.1/abc");
    }

    #[test]
    fn full_mode_flattens_affiliations() {
        let article: PmcArticle = serde_json::from_value(json!({
            "id": "PMC2",
            "title": "A study",
            "authorString": "Doe J.",
            "authorList": {"author": [
                {"fullName": "Doe Jane", "affiliation": "Broad Institute"}
            ]},
            "abstractText": "We studied things."
        }))
        .unwrap();

        let record = flatten_article(article, SearchMode::Full, None, None);
        assert_eq!(
            record["author_affiliations"][0]["affiliation"],
            "Broad Institute"
        );
        assert_eq!(record["abstract"], "We studied things.");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn live_article_search() {
        let tool = ArticleSearchTool::new(30, 25, 5);
        let output = tool
            .execute(&json!({"topic": "CRISPR", "mode": "lite"}))
            .await;
        assert!(!output.items.is_empty());
    }
}
