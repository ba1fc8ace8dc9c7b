//! Pull module source out of a model reply.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:python|py)?[ \t]*\r?\n(.*?)```").unwrap());

/// Source of the last fenced code block, or the whole reply when it has none.
///
/// The result is trimmed and ends with a single newline; an empty string
/// means the reply carried no code.
pub fn extract_code(reply: &str) -> String {
    let body = FENCED_BLOCK_RE
        .captures_iter(reply)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply);

    let trimmed = body.trim_matches(|c: char| c == '\n' || c == '\r');
    if trimmed.trim().is_empty() {
        return String::new();
    }
    format!("{}\n", trimmed.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_reply_kept() {
        assert_eq!(extract_code("import pandas as pd\n"), "import pandas as pd\n");
    }

    #[test]
    fn test_python_fence() {
        let reply = "Here you go:\n```python\ndef run_strategy(prices, spec):\n    return prices\n```\nDone.";
        assert_eq!(extract_code(reply), "def run_strategy(prices, spec):\n    return prices\n");
    }

    #[test]
    fn test_last_block_wins() {
        let reply = "```python\nfirst = 1\n```\ntext\n```\nsecond = 2\n```";
        assert_eq!(extract_code(reply), "second = 2\n");
    }

    #[test]
    fn test_indentation_preserved() {
        let reply = "```py\n\n    x = 1\n    y = 2\n\n```";
        assert_eq!(extract_code(reply), "    x = 1\n    y = 2\n");
    }

    #[test]
    fn test_empty_reply() {
        assert_eq!(extract_code(""), "");
        assert_eq!(extract_code("```python\n\n```"), "");
        assert_eq!(extract_code("  \n\t\n"), "");
    }
}
