//! Question normalization
//!
//! - Lowercase
//! - Punctuation becomes a token boundary
//! - `-`, `.` and `_` survive between two alphanumerics (`18-25`, `4.5`)
//! - `=` is kept as its own token

/// Normalized question text and its tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    pub tokens: Vec<String>,
}

/// Normalizes a question into tokens
pub fn normalize(input: &str) -> Normalized {
    let chars: Vec<char> = input.to_lowercase().chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            current.push(c);
            continue;
        }

        let joins = matches!(c, '-' | '.' | '_')
            && !current.is_empty()
            && chars.get(i + 1).map_or(false, |next| next.is_alphanumeric());
        if joins {
            current.push(c);
            continue;
        }

        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if c == '=' {
            tokens.push("=".to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    Normalized {
        text: tokens.join(" "),
        tokens,
    }
}

/// Splits an identifier or label into normalized tokens
pub fn phrase_tokens(text: &str) -> Vec<String> {
    normalize(&text.replace('_', " ")).tokens
}

/// Words that never identify a field
pub fn is_stop_word(token: &str) -> bool {
    matches!(
        token,
        "a" | "an"
            | "the"
            | "of"
            | "is"
            | "are"
            | "was"
            | "were"
            | "be"
            | "what"
            | "whats"
            | "which"
            | "who"
            | "how"
            | "do"
            | "does"
            | "did"
            | "to"
            | "on"
            | "for"
            | "with"
            | "where"
            | "whose"
            | "that"
            | "this"
            | "it"
            | "and"
            | "or"
            | "me"
            | "my"
            | "i"
            | "we"
            | "our"
            | "us"
            | "you"
            | "your"
            | "their"
            | "there"
            | "show"
            | "list"
            | "give"
            | "get"
            | "tell"
            | "find"
            | "please"
            | "s"
            | "all"
            | "have"
            | "has"
            | "had"
            | "from"
            | "at"
            | "as"
            | "than"
            | "in"
            | "by"
            | "per"
            | "each"
            | "across"
            | "response"
            | "responses"
            | "respondent"
            | "respondents"
            | "people"
            | "value"
            | "values"
    )
}

/// Parses a token as a finite number
pub fn as_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|n| n.is_finite())
}
