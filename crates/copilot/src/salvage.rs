//! Textual repair of LLM replies before JSON decoding.
//!
//! None of these passes understand string literals: braces, commas and
//! `key:` patterns inside string values are treated like structure. Generated
//! code with block bodies inside a `content` field can therefore shift the
//! extracted span or pick up spurious quotes.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SalvageOptions {
    pub strip_code_fence: bool,
    pub patch_commas: bool,
}

impl SalvageOptions {
    pub fn lenient() -> Self {
        Self {
            strip_code_fence: true,
            patch_commas: true,
        }
    }
}

/// Text without a balanced `{...}` span comes back untouched; no pass runs.
pub fn salvage(text: &str, options: SalvageOptions) -> String {
    let unfenced = if options.strip_code_fence {
        strip_code_fence(text)
    } else {
        text
    };
    let Some(block) = find_json_block(unfenced) else {
        return text.to_string();
    };
    let patched = if options.patch_commas {
        patch_commas(block)
    } else {
        block.to_string()
    };
    quote_property_names(&patched)
}

/// Returns the first balanced `{...}` span, or `text` unchanged when there is
/// no opening brace or the first one is never closed.
pub fn extract_json_block(text: &str) -> &str {
    find_json_block(text).unwrap_or(text)
}

fn find_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn quote_property_names(json: &str) -> String {
    bare_key_regex()
        .replace_all(json, "${1}\"${2}\"${3}")
        .into_owned()
}

pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    code_fence_regex()
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str())
        .unwrap_or(text)
}

pub fn patch_commas(json: &str) -> String {
    let joined = missing_comma_regex().replace_all(json, "},\"${1}\"");
    trailing_comma_regex()
        .replace_all(&joined, "${1}")
        .into_owned()
}

fn bare_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)").expect("bare key pattern is valid")
    })
}

fn code_fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^```(?:json)?\s*([\s\S]*?)```$").expect("code fence pattern is valid")
    })
}

fn missing_comma_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\}\s*"(files|actions|explanation)""#).expect("missing comma pattern is valid")
    })
}

fn trailing_comma_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([\]}])").expect("trailing comma pattern is valid"))
}
