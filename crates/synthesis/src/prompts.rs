//! Fixed instruction prompts and augmented-turn templates.

use vitalchat_core::health::CategoryMap;

pub const SEARCH_CLASSIFIER: &str = r#"You are a decision maker. Determine if a user query requires web search to answer accurately.

Return ONLY "YES" if the query needs web search for:
- Current events, news, recent developments
- Real-time information (stock prices, weather, sports scores)
- Recent research, studies, or publications
- Current technology, software versions, or product information
- Live data, statistics, or facts that change frequently

Return ONLY "NO" if the query can be answered with:
- General knowledge, definitions, explanations
- Historical facts, established theories
- How-to instructions, tutorials
- Personal advice, opinions, or subjective topics

Examples:
- "What's the weather today?" -> YES
- "Explain photosynthesis" -> NO
- "Latest guidance on statins" -> YES
- "What is machine learning?" -> NO"#;

pub const HEALTH_CLASSIFIER: &str = r#"You are a health data analyzer. Determine if a user query requires personal health data to answer accurately.

Return ONLY "YES" if the query needs personal health data for:
- Personal health questions, symptoms, conditions
- Medication-related questions about the user
- Lab results, vital signs, or health metrics
- Personal medical history or records
- Questions about the user's specific health status

Return ONLY "NO" if the query can be answered with:
- General health information, definitions
- Educational content about diseases, treatments
- Questions about health topics in general
- Non-health related questions

Examples:
- "What are my current medications?" -> YES
- "What is diabetes?" -> NO
- "How is my blood pressure?" -> YES
- "What causes high blood pressure?" -> NO"#;

/// Category selection prompt constrained to what the store holds.
pub fn category_selector(available: &CategoryMap) -> String {
    let listing: String = available
        .iter()
        .map(|(category, subs)| format!("\n{category}: {}", subs.join(", ")))
        .collect();

    format!(
        r#"You are a health data analyzer. Given a user query, determine which health categories and subcategories are needed to answer it.

You MUST ONLY select from the available categories and subcategories listed below.

Available categories and subcategories:{listing}

Return a JSON object with the format:
{{"categories": {{"category_name": ["subcategory1", "subcategory2"]}}}}

Only include categories that are clearly needed for the query.
If no health data is needed, return: {{"categories": {{}}}}"#
    )
}

pub const CHUNK_SUMMARY: &str = "You summarize a portion of a patient's personal health data. \
Keep every clinically relevant value, date, medication, trend and abnormal finding. \
Drop formatting noise and repetition. Do not add advice or interpretation.";

pub const DIRECT_SUMMARY: &str = "You summarize a patient's personal health data so it can be \
used to answer their question. Keep the values, dates and trends that bear on the question. \
Do not add advice or interpretation.";

pub const COMBINE_SUMMARY: &str = "You merge partial summaries of one patient's health data \
into a single concise summary. Remove duplication, keep every distinct value and date, \
and keep the category structure.";

pub fn chunk_request(category: &str, index: usize, total: usize, text: &str) -> String {
    format!("Category: {category}\nPart {} of {total}\n\n{text}", index + 1)
}

pub fn direct_request(query: &str, payload: &str) -> String {
    format!("Question: {query}\n\nHealth data:\n{payload}")
}

pub fn combine_request(query: &str, summaries: &str) -> String {
    format!("Question: {query}\n\nPartial summaries:\n{summaries}")
}

pub const SUMMARY_UNAVAILABLE: &str =
    "A summary of your health data could not be produced in time. Available data:";

pub fn chunk_placeholder(category: &str) -> String {
    format!("[summary unavailable for {category} chunk]")
}

const ANSWER_RULES: &str = "Refer to specific values and dates where relevant. \
Do not diagnose; suggest consulting a clinician for medical decisions.";

/// System instruction for an augmented turn, naming the sources it carries.
pub fn source_instruction(web: bool, health: bool) -> String {
    match (web, health) {
        (true, true) => format!(
            "You are a personal health assistant. The user's message contains WEB INFORMATION \
from a current web search and PERSONAL HEALTH DATA from their own records. Use the web \
information for general and current knowledge and the personal data for their own situation. \
Cite web sources you rely on. {ANSWER_RULES}"
        ),
        (true, false) => "You are a personal health assistant. The user's message contains \
WEB INFORMATION from a current web search. Use it where relevant and cite the sources you \
rely on."
            .to_string(),
        (false, true) => format!(
            "You are a personal health assistant. The user's message contains PERSONAL HEALTH \
DATA from their own records. Answer using that data. {ANSWER_RULES}"
        ),
        (false, false) => String::new(),
    }
}

pub fn web_only(query: &str, web: &str) -> String {
    format!("WEB INFORMATION:\n{web}\n\nQUESTION: {query}")
}

pub fn health_only(query: &str, health: &str) -> String {
    format!("PERSONAL HEALTH DATA:\n{health}\n\nQUESTION: {query}")
}

pub fn combined(query: &str, web: &str, health: &str) -> String {
    format!(
        "WEB INFORMATION:\n{web}\n\nPERSONAL HEALTH DATA:\n{health}\n\nQUESTION: {query}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_puts_web_before_health() {
        let text = combined("q", "W", "H");
        let web = text.find("WEB INFORMATION:").unwrap();
        let health = text.find("PERSONAL HEALTH DATA:").unwrap();
        assert!(web < health);
        assert!(text.ends_with("QUESTION: q"));
    }

    #[test]
    fn single_source_templates_hold_one_block() {
        assert!(!web_only("q", "W").contains("PERSONAL HEALTH DATA:"));
        assert!(!health_only("q", "H").contains("WEB INFORMATION:"));
    }

    #[test]
    fn instruction_names_the_sources_present() {
        let both = source_instruction(true, true);
        assert!(both.contains("WEB INFORMATION") && both.contains("PERSONAL HEALTH DATA"));
        assert!(!source_instruction(true, false).contains("PERSONAL HEALTH DATA"));
        assert!(!source_instruction(false, true).contains("WEB INFORMATION"));
    }

    #[test]
    fn category_selector_lists_available() {
        let mut available = CategoryMap::new();
        available.insert("medications".into(), vec!["ClinicalMedication".into()]);
        let prompt = category_selector(&available);
        assert!(prompt.contains("\nmedications: ClinicalMedication"));
        assert!(prompt.contains(r#"{"categories": {}}"#));
    }
}
