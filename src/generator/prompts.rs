//! 各阶段的提示词模板，每个模板中可变内容只出现一次以便按预算截断

use chrono::Local;

use crate::types::{ChatMessage, messages_to_transcript};
use crate::utils::token_budget::{count_tokens, fit_template, truncate_messages};

pub fn today() -> String {
    Local::now().format("%a %b %-d, %Y").to_string()
}

/// 把对话压平成文本并嵌入模板，整体不超过`max_tokens`
///
/// 先按FIFO淘汰最早的消息，再对压平后的文本做截断。
pub fn conversation_prompt<F>(messages: &[ChatMessage], max_tokens: usize, render: F) -> String
where
    F: Fn(&str) -> String,
{
    let template_tokens = count_tokens(&render(""));
    let kept = truncate_messages(messages, max_tokens.saturating_sub(template_tokens), true);
    let transcript = messages_to_transcript(&kept);
    fit_template(render, &transcript, max_tokens, 0)
}

pub fn clarify_prompt(conversation: &str, date: &str) -> String {
    format!(
        r#"These are the messages exchanged so far with the user asking for a research report:
<Messages>
{conversation}
</Messages>

Today's date is {date}.

Decide whether you need to ask the user one clarifying question before starting the research, or whether the request is clear enough to proceed.
Only ask when the request is genuinely ambiguous: unknown acronyms or jargon, an unclear scope, or a missing essential constraint. If a clarifying question has already been asked in the conversation, do not ask another one unless it is absolutely necessary.

If you need to ask, set need_clarification to true and put one concise, well-structured question in question.
If you do not need to ask, set need_clarification to false and leave question empty."#
    )
}

pub fn brief_prompt(conversation: &str, date: &str) -> String {
    format!(
        r#"You will be given the messages exchanged with a user. Translate them into a detailed, concrete research brief that will guide the research.

<Messages>
{conversation}
</Messages>

Today's date is {date}.

Guidelines:
1. Maximize specificity: include every preference and requirement the user stated.
2. Fill unstated but necessary dimensions as open-ended rather than inventing constraints.
3. Avoid unwarranted assumptions about details the user did not provide.
4. Write the brief in the first person, from the user's perspective.
5. Prefer primary and official sources when the topic calls for them.

Return research_brief with the full brief and title with a short report title."#
    )
}

pub fn planner_prompt(
    research_brief: &str,
    iteration: usize,
    max_iterations: usize,
    max_units: usize,
    notes: &str,
    date: &str,
) -> String {
    format!(
        r#"You are a research supervisor. Today's date is {date}.

<Research Brief>
{research_brief}
</Research Brief>

This is planning round {round} of at most {max_iterations}. You may delegate at most {max_units} research topics this round; they will be researched in parallel by assistants who cannot see each other's work.

<Findings So Far>
{notes}
</Findings So Far>

Decide whether the findings already answer the brief comprehensively.
- If they do, set research_complete to true and return no topics.
- Otherwise set research_complete to false and list the topics to research next. Each topic must be a standalone, detailed instruction that does not rely on the other topics or on abbreviations. Do not repeat topics that the findings already cover."#,
        round = iteration + 1,
    )
}

pub fn search_queries_prompt(topic: &str, max_queries: usize, date: &str) -> String {
    format!(
        r#"Today's date is {date}. You are researching the following topic:

<Topic>
{topic}
</Topic>

Write at most {max_queries} focused web search queries that together cover the topic. Return them in queries."#
    )
}

pub fn research_summary_prompt(topic: &str, findings: &str, date: &str) -> String {
    format!(
        r#"Today's date is {date}. You are a research assistant working on this topic:

<Topic>
{topic}
</Topic>

<Search Results>
{findings}
</Search Results>

Distill everything relevant to the topic into a concise set of findings. Keep concrete facts, figures, dates and names. When a finding comes from a search result, cite its URL inline in square brackets. If the search results are empty, answer from your own knowledge and say so. Do not add a preamble."#
    )
}

pub const FINAL_REPORT_SYSTEM_PROMPT: &str = "You are an expert research writer. You MUST deliver the report by calling the createTextDocument tool exactly once with the title and the complete markdown content. Never answer with the report as plain text.";

pub fn final_report_prompt(research_brief: &str, title: &str, findings: &str, date: &str) -> String {
    format!(
        r#"Write a comprehensive, well-structured report that answers the research brief using the findings below. Today's date is {date}.

<Report Title>
{title}
</Report Title>

<Research Brief>
{research_brief}
</Research Brief>

<Findings>
{findings}
</Findings>

Requirements:
- Use markdown with # for the title and ## for sections.
- Cover every aspect of the brief, with specific facts and insights drawn from the findings.
- Cite sources inline as [n] and end with a ### Sources section listing each URL once, numbered sequentially.
- Write in the same language as the research brief.

Save the finished report by calling the createTextDocument tool with the report title and the full markdown content."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_embed_variable_once() {
        let marker = "<<VARIABLE>>";
        let rendered = [
            clarify_prompt(marker, "today"),
            brief_prompt(marker, "today"),
            planner_prompt("brief", 0, 3, 2, marker, "today"),
            research_summary_prompt("topic", marker, "today"),
            final_report_prompt("brief", "title", marker, "today"),
        ];
        for prompt in rendered {
            assert_eq!(prompt.matches(marker).count(), 1);
        }
    }

    #[test]
    fn test_conversation_prompt_fits_budget() {
        let messages: Vec<ChatMessage> = (0..40)
            .map(|i| ChatMessage::user(format!("turn {} {}", i, "lorem ipsum dolor ".repeat(30))))
            .collect();

        let prompt = conversation_prompt(&messages, 500, |c| clarify_prompt(c, "today"));

        assert!(count_tokens(&prompt) <= 500);
        assert!(prompt.contains("<Messages>"));
        // 最新的消息优先保留
        assert!(prompt.contains("turn 39"));
    }

    #[test]
    fn test_planner_prompt_reports_human_round_number() {
        let prompt = planner_prompt("brief", 0, 3, 2, "", "today");
        assert!(prompt.contains("planning round 1 of at most 3"));
        assert!(prompt.contains("at most 2 research topics"));
    }
}
