use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

// "The answer is: Option (D)", "the answer is option d", "The answer is: (d) Forceps"
static ANSWER_OPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)the\s+answer\s+is\s*:?\s*(?:option\s*)?\(?\s*([a-g])\s*\)?(?:[^a-z]|$)")
        .expect("valid answer regex")
});

static BARE_OPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:option\s*)?\(?([a-g])\)?(?:[^a-z]|$)").expect("valid option regex"));

/// Normalize a label for knowledge-graph lookup: lowercase, trim, collapse whitespace.
pub fn normalize_label(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    WHITESPACE.replace_all(&lowered, " ").into_owned()
}

/// Final option letter of a chain-of-thought answer, uppercased.
///
/// Takes the last "The answer is ..." statement when an answer restates itself.
pub fn parse_answer_option(answer: &str) -> Option<char> {
    ANSWER_OPTION
        .captures_iter(answer)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_uppercase())
}

/// Option letter of a ground-truth cell such as "E", "(e) Cutting" or "Option (E)".
pub fn parse_option_letter(text: &str) -> Option<char> {
    if let Some(letter) = parse_answer_option(text) {
        return Some(letter);
    }
    BARE_OPTION
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_label("  Monopolar   Curved Scissors "), "monopolar curved scissors");
        assert_eq!(normalize_label("Tool\tManipulation"), "tool manipulation");
    }

    #[test]
    fn test_answer_option() {
        assert_eq!(parse_answer_option("Chain 1: ...\nThe answer is: Option (D)"), Some('D'));
        assert_eq!(parse_answer_option("the answer is option b."), Some('B'));
        assert_eq!(parse_answer_option("The answer is: (e) Cutting"), Some('E'));
        assert_eq!(parse_answer_option("I cannot tell."), None);
    }

    #[test]
    fn test_answer_option_takes_last_statement() {
        let text = "Initially the answer is: Option (A). On reflection, the answer is: Option (C)";
        assert_eq!(parse_answer_option(text), Some('C'));
    }

    #[test]
    fn test_ground_truth_letter() {
        assert_eq!(parse_option_letter("E"), Some('E'));
        assert_eq!(parse_option_letter("(c) Cauterization"), Some('C'));
        assert_eq!(parse_option_letter("Option (G)"), Some('G'));
        assert_eq!(parse_option_letter("Cutting"), None);
    }
}
