//! Token预算器 - 统计消息的token数量，并将文本/消息列表截断到预算以内

use std::sync::LazyLock;

use crate::types::{ChatMessage, ContentPart, MessageContent, Role};
use crate::utils::token_estimator::TokenEstimator;

static TOKEN_ESTIMATOR: LazyLock<TokenEstimator> = LazyLock::new(TokenEstimator::new);

/// 图片、文件等非文本内容的固定token开销
pub const IMAGE_PART_TOKENS: usize = 765;

/// 每条消息的固定开销（不含角色名本身）
pub const MESSAGE_OVERHEAD_TOKENS: usize = 3;

/// 递归切分的最小块长度（字符），低于此值直接做前缀截断
pub const MIN_TRIM_CHUNK_CHARS: usize = 140;

/// 估算溢出量时使用的平均每token字符数
const AVERAGE_CHARS_PER_TOKEN: usize = 3;

/// 从大到小的切分符：段落 -> 行 -> 句子 -> 单词 -> 字符
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

pub fn count_tokens(text: &str) -> usize {
    TOKEN_ESTIMATOR.count_tokens(text)
}

pub fn count_part_tokens(part: &ContentPart) -> usize {
    match part {
        ContentPart::Text { text } => count_tokens(text),
        ContentPart::Image { .. } | ContentPart::File { .. } => IMAGE_PART_TOKENS,
        ContentPart::ToolCall {
            tool_name, args, ..
        } => count_tokens(tool_name) + count_tokens(&args.to_string()),
        ContentPart::ToolResult {
            tool_name, output, ..
        } => count_tokens(tool_name) + count_tokens(output),
    }
}

fn role_overhead(role: Role) -> usize {
    MESSAGE_OVERHEAD_TOKENS + count_tokens(role.as_str())
}

pub fn count_single_message_tokens(message: &ChatMessage) -> usize {
    let content_tokens = match &message.content {
        MessageContent::Text(text) => count_tokens(text),
        MessageContent::Parts(parts) => parts.iter().map(count_part_tokens).sum(),
    };
    role_overhead(message.role) + content_tokens
}

pub fn count_message_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(count_single_message_tokens).sum()
}

/// 将文本截断到`max_tokens`以内，已满足预算时原样返回
///
/// 每轮按溢出量估算目标长度，用分层切分符取出不超过该长度的首块；
/// 每轮输入的字符数严格减少，目标长度低于下限时改为二分查找最长的合规前缀。
/// 返回值的token数总是不超过`max_tokens`。
pub fn trim_text(text: &str, max_tokens: usize) -> String {
    let mut current = text.to_string();
    loop {
        let tokens = count_tokens(&current);
        if tokens <= max_tokens {
            return current;
        }

        let overflow = tokens - max_tokens;
        let char_len = current.chars().count();
        let chunk_size =
            char_len.saturating_sub(overflow.saturating_mul(AVERAGE_CHARS_PER_TOKEN));
        if chunk_size < MIN_TRIM_CHUNK_CHARS {
            return prefix_within_budget(&current, max_tokens).to_string();
        }

        let first = first_chunk(&current, chunk_size);
        current = if first.is_empty() || first.chars().count() >= char_len {
            char_prefix(&current, chunk_size).to_string()
        } else {
            first
        };
    }
}

/// 在预留`reserved_tokens`（通常为系统提示词）之后，把变量部分截断并渲染进模板
///
/// 返回值满足`count_tokens(result) + reserved_tokens <= max_tokens`。
pub fn fit_template<F>(render: F, variable: &str, max_tokens: usize, reserved_tokens: usize) -> String
where
    F: Fn(&str) -> String,
{
    fit_template_parts(
        |_, body| render(body),
        "",
        count_tokens(variable),
        |budget| trim_text(variable, budget),
        max_tokens,
        reserved_tokens,
    )
}

/// 渲染带有两个变量的模板：上下文（简报、主题）与正文（笔记、搜索结果）
///
/// 上下文最多占可用预算的一半，正文较短时可以用掉正文剩下的部分；
/// 正文由`fit_body`按剩余预算自行截断。token计数只依赖字符分类计数，
/// 对拼接满足次可加性，因此按片段分配的预算之和就是整体的上界；
/// 最后仍会校验一次，保证`count_tokens(result) + reserved_tokens <= max_tokens`。
pub fn fit_template_parts<F, B>(
    render: F,
    context: &str,
    body_tokens: usize,
    fit_body: B,
    max_tokens: usize,
    reserved_tokens: usize,
) -> String
where
    F: Fn(&str, &str) -> String,
    B: FnOnce(usize) -> String,
{
    let available = max_tokens.saturating_sub(reserved_tokens);
    let template_tokens = count_tokens(&render("", ""));
    let content_budget = available.saturating_sub(template_tokens);

    let context_budget = (content_budget / 2).max(content_budget.saturating_sub(body_tokens));
    let context = trim_text(context, context_budget);
    let body_budget = content_budget.saturating_sub(count_tokens(&context));
    let rendered = render(&context, &fit_body(body_budget));

    if count_tokens(&rendered) <= available {
        rendered
    } else {
        trim_text(&rendered, available)
    }
}

/// 按从新到旧的顺序挑选条目，整条放得下就保留，放不下的那条截断后停止
///
/// 输出保持原有的先后顺序，最新的条目总会出现（必要时被截断）。
pub fn join_recent(items: &[String], separator: &str, max_tokens: usize) -> String {
    let separator_tokens = count_tokens(separator);
    let mut kept: Vec<String> = Vec::new();
    let mut used = 0;

    for item in items.iter().rev() {
        let joint = if kept.is_empty() { 0 } else { separator_tokens };
        let cost = joint + count_tokens(item);
        if used + cost <= max_tokens {
            kept.push(item.clone());
            used += cost;
            continue;
        }

        let remaining = max_tokens.saturating_sub(used + joint);
        let trimmed = trim_text(item, remaining);
        if !trimmed.trim().is_empty() {
            kept.push(trimmed);
        }
        break;
    }

    kept.reverse();
    kept.join(separator)
}

/// 按预算截断消息列表
///
/// - 可选地保留首条系统消息（其token仍计入预算），系统消息自身超限时截断而不丢弃；
/// - 其余消息从最旧的开始淘汰，直到剩余部分满足预算；
/// - 只剩最后一条仍超限时，截断该消息的内容；连消息开销都放不下则丢弃。
pub fn truncate_messages(
    messages: &[ChatMessage],
    max_tokens: usize,
    preserve_system_message: bool,
) -> Vec<ChatMessage> {
    let (system, rest) = match messages.split_first() {
        Some((first, rest)) if preserve_system_message && first.role == Role::System => {
            (Some(first.clone()), rest)
        }
        _ => (None, messages),
    };

    let mut result = Vec::with_capacity(messages.len());
    let mut budget = max_tokens;

    if let Some(mut system) = system {
        if count_single_message_tokens(&system) > budget {
            truncate_message_content(&mut system, budget);
        }
        budget = budget.saturating_sub(count_single_message_tokens(&system));
        result.push(system);
    }

    let mut start = 0;
    let mut remaining_tokens = count_message_tokens(rest);
    while start + 1 < rest.len() && remaining_tokens > budget {
        remaining_tokens -= count_single_message_tokens(&rest[start]);
        start += 1;
    }

    let mut kept = rest[start..].to_vec();
    if remaining_tokens > budget
        && let Some(last) = kept.last_mut()
    {
        truncate_message_content(last, budget);
        if count_single_message_tokens(last) > budget {
            kept.clear();
        }
    }

    result.extend(kept);
    result
}

/// 截断单条消息的内容，使整条消息尽量落在`max_tokens`以内
fn truncate_message_content(message: &mut ChatMessage, max_tokens: usize) {
    let content_budget = max_tokens.saturating_sub(role_overhead(message.role));
    match &mut message.content {
        MessageContent::Text(text) => *text = trim_text(text, content_budget),
        MessageContent::Parts(parts) => truncate_parts(parts, content_budget),
    }
}

/// 从最后一个带文本负载的部分开始截断，缩减为空的部分整体删除
fn truncate_parts(parts: &mut Vec<ContentPart>, budget: usize) {
    loop {
        let total: usize = parts.iter().map(count_part_tokens).sum();
        if total <= budget || parts.is_empty() {
            return;
        }
        let excess = total - budget;

        let index = parts
            .iter()
            .rposition(|part| part.text_payload().is_some_and(|text| !text.is_empty()))
            .unwrap_or(parts.len() - 1);

        if count_part_tokens(&parts[index]) <= excess {
            parts.remove(index);
            continue;
        }

        match parts[index].text_payload_mut() {
            Some(payload) => {
                let target = count_tokens(payload).saturating_sub(excess);
                let trimmed = trim_text(payload, target);
                if trimmed.is_empty() {
                    parts.remove(index);
                } else {
                    *payload = trimmed;
                }
            }
            None => {
                parts.remove(index);
            }
        }
    }
}

/// 使用分层切分符取出不超过`chunk_size`字符的首块
fn first_chunk(text: &str, chunk_size: usize) -> String {
    let mut remaining = text;
    let mut separators: &[&str] = &SEPARATORS;

    'descend: loop {
        if remaining.chars().count() <= chunk_size {
            return remaining.to_string();
        }

        let Some(index) = separators
            .iter()
            .position(|separator| separator.is_empty() || remaining.contains(separator))
        else {
            return char_prefix(remaining, chunk_size).to_string();
        };
        let separator = separators[index];

        let pieces: Vec<&str> = if separator.is_empty() {
            remaining
                .char_indices()
                .map(|(i, c)| &remaining[i..i + c.len_utf8()])
                .collect()
        } else {
            remaining.split(separator).collect()
        };

        let separator_len = separator.chars().count();
        let mut merged = String::new();
        let mut merged_len = 0;
        for piece in pieces.into_iter().filter(|piece| !piece.is_empty()) {
            let piece_len = piece.chars().count();
            let joint_len = if merged.is_empty() { 0 } else { separator_len };
            if merged_len + joint_len + piece_len <= chunk_size {
                if joint_len > 0 {
                    merged.push_str(separator);
                }
                merged.push_str(piece);
                merged_len += joint_len + piece_len;
                continue;
            }
            if merged.is_empty() {
                // 首个片段本身过长，换更细的切分符继续
                if index + 1 >= separators.len() {
                    return char_prefix(piece, chunk_size).to_string();
                }
                remaining = piece;
                separators = &separators[index + 1..];
                continue 'descend;
            }
            break;
        }
        return merged;
    }
}

/// 取前`char_count`个字符
fn char_prefix(text: &str, char_count: usize) -> &str {
    match text.char_indices().nth(char_count) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// 二分查找token数不超过预算的最长前缀
fn prefix_within_budget(text: &str, max_tokens: usize) -> &str {
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let (mut low, mut high) = (0, boundaries.len() - 1);
    while low < high {
        let mid = (low + high).div_ceil(2);
        if count_tokens(&text[..boundaries[mid]]) <= max_tokens {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    &text[..boundaries[low]]
}
