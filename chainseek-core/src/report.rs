// Report generation from search state

use chainseek_scanner::{CrawlState, CrawlSummary, MatchRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSection {
    pub keyword: String,
    pub matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub seed_handle: String,
    pub visited_count: usize,
    pub total_matches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<CrawlSummary>,
    pub keywords: Vec<KeywordSection>,
}

impl ReportData {
    /// Groups the state's matches by keyword. Keywords listed in `keywords`
    /// come first in that order (even when empty); any other keyword present
    /// in the state follows in first-seen order.
    pub fn collect(state: &CrawlState, summary: Option<&CrawlSummary>, keywords: &[String]) -> Self {
        let mut order: Vec<String> = keywords.to_vec();
        for record in state.matches().records() {
            if !order.contains(&record.matched_keyword) {
                order.push(record.matched_keyword.clone());
            }
        }

        let sections = order
            .into_iter()
            .map(|keyword| KeywordSection {
                matches: state.matches().for_keyword(&keyword),
                keyword,
            })
            .collect();

        Self {
            seed_handle: state.seed_handle().to_string(),
            visited_count: state.visited().len(),
            total_matches: state.matches().len(),
            summary: summary.cloned(),
            keywords: sections,
        }
    }
}

pub fn generate_report(
    state: &CrawlState,
    summary: Option<&CrawlSummary>,
    keywords: &[String],
    format: ReportFormat,
) -> String {
    let data = ReportData::collect(state, summary, keywords);
    match format {
        ReportFormat::Text => generate_text_report(&data),
        ReportFormat::Json => generate_json_report(&data),
        ReportFormat::Markdown => generate_markdown_report(&data),
    }
}

fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str(&format!("# Search from @{}\n", data.seed_handle));
    report.push_str(&format!("  Profiles visited: {}\n", data.visited_count));
    report.push_str(&format!("  Total matches: {}\n", data.total_matches));

    if let Some(ref summary) = data.summary {
        report.push_str(&format!("  Chains fetched this run: {}\n", summary.chains_fetched));
        report.push_str(&format!("  New matches this run: {}\n", summary.new_matches));
        report.push_str(&format!("  Failed lookups: {}\n", summary.leaf_failures));
        if summary.cancelled {
            report.push_str("  Run was interrupted; resume to continue.\n");
        }
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    for section in &data.keywords {
        report.push_str(&format!("## {}\n", section.keyword));
        report.push_str(&format!("  {} match(es)\n\n", section.matches.len()));

        for m in &section.matches {
            report.push_str(&format!(
                "  @{} - {} (id {}) via @{} at depth {}\n",
                m.handle, m.display_name, m.node_id, m.found_via_handle, m.depth
            ));
        }
        report.push('\n');
    }

    report
}

fn generate_json_report(data: &ReportData) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

fn escape_markdown_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

fn generate_markdown_report(data: &ReportData) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Chainseek report for @{}\n\n", data.seed_handle));
    md.push_str(&format!("- **Profiles visited:** {}\n", data.visited_count));
    md.push_str(&format!("- **Total matches:** {}\n", data.total_matches));
    if let Some(ref summary) = data.summary {
        md.push_str(&format!("- **New matches this run:** {}\n", summary.new_matches));
        md.push_str(&format!("- **Interrupted:** {}\n", if summary.cancelled { "yes" } else { "no" }));
    }
    md.push('\n');

    for section in &data.keywords {
        md.push_str(&format!("## {}\n\n", escape_markdown_cell(&section.keyword)));
        if section.matches.is_empty() {
            md.push_str("_No matches._\n\n");
            continue;
        }
        md.push_str("| Handle | Name | ID | Depth | Found via |\n");
        md.push_str("|--------|------|----|-------|-----------|\n");
        for m in &section.matches {
            md.push_str(&format!(
                "| @{} | {} | {} | {} | @{} |\n",
                escape_markdown_cell(&m.handle),
                escape_markdown_cell(&m.display_name),
                m.node_id,
                m.depth,
                escape_markdown_cell(&m.found_via_handle)
            ));
        }
        md.push('\n');
    }

    md
}
