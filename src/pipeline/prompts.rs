//! Prompt templates.
//!
//! All prompts are plain text with values interpolated in; the model is
//! never given tools or a response schema beyond what the text asks for.

use crate::models::PaperSection;

pub const CLASSIFIER_SYSTEM: &str =
    "You are a research assistant. Analyze the query as instructed.";

/// Ask the model to split a query into needs, details and task type.
pub fn classifier_user(query: &str) -> String {
    format!(
        r#"You are a research assistant. Analyze the query provided below:

1. Identify the "needs" (what the user is requesting, such as a research paper or a concise answer).
2. Identify any "details provided" (information or context explicitly mentioned in the query).
3. Based on the analysis, decide whether the user wants a "full research paper" or a "concise answer".
4. Return your analysis as a single JSON object in exactly this format:
   {{
       "needs": "<Extracted needs>",
       "details_provided": "<Details provided>",
       "task_type": "<full_paper or concise_answer>"
   }}

Query: {query}"#
    )
}

// ===== Concise answer =====

pub const ANSWER_FIRST_SYSTEM: &str = "You are a research assistant. First understand what the \
user means and needs by the query, then work out what data and knowledge you can extract from \
the provided research papers to fulfil it. Accumulate all the knowledge and data that can help \
you give a proper response to the query.";

pub fn answer_first_user(needs: &str, details: &str, papers: &str) -> String {
    format!("Query: {needs}+{details}\n\nSet of papers:\n{papers}")
}

pub fn answer_next_system(knowledge: &str) -> String {
    format!(
        "You are a research assistant. You have accumulated the following knowledge about the query:\n\
         {knowledge}\n\
         Now analyze these additional papers and expand your knowledge. \
         Integrate new information with what you already know."
    )
}

pub fn additional_papers_user(papers: &str) -> String {
    format!("Additional papers:\n{papers}")
}

pub const ANSWER_FINAL_SYSTEM: &str =
    "You are a research assistant. Provide a comprehensive final answer.";

pub fn answer_final_user(needs: &str, details: &str, knowledge: &str) -> String {
    format!(
        "Based on all the research papers analyzed, provide a comprehensive answer to the \
         original query: {needs}+{details}\n\n\
         Your accumulated knowledge:\n{knowledge}\n\n\
         Synthesize a complete answer that cites specific papers, covers all key findings and \
         satisfies the query."
    )
}

// ===== Paper generation =====

/// Notes every paper draft starts from.
pub const GOLDEN_RULES: &str = "Golden rules:\n\
1) Try to keep abstract short, informative, and concise (max 2 paragraphs per section).\n\
2) The introduction should provide an overview of the entire paper (4-5 paragraphs).\n";

pub const NOTES_FIRST_SYSTEM: &str = "You are a research assistant. You have to write a research \
paper according to the user's needs. Take these papers as reference and note down the key points \
that each section should have to generate a good research paper.";

pub fn notes_first_user(needs: &str, details: &str, papers: &str) -> String {
    format!("Query: {needs} + {details}\n\nSet of papers:\n{papers}")
}

pub fn notes_next_system(notes: &str) -> String {
    format!(
        "You are a research assistant. You have noted these points:\n{notes}\n\
         Analyze further papers and make changes to these points if needed."
    )
}

pub const SECTION_SYSTEM: &str =
    "You are a research assistant. Generate the requested section of the paper.";

pub fn section_user(notes: &str, section: PaperSection, details: &str) -> String {
    format!(
        "You are a research assistant. Write a research paper based on the user's query and data.\n\n\
         Accumulated knowledge:\n{notes}\n\n\
         Write the {section} of the research paper using the details: {details}.\n\
         Fill in any missing points from the notes or your own expertise, list them under \
         'Added Points' and keep the added points short.\n"
    )
}
