//! `LIKE` / `ILIKE` pattern matching.
//!
//! `%` (or its URL-safe alias `*`) matches any sequence, `_` matches one
//! character, and `\` escapes the next character.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Token {
    Any,
    One,
    Char(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();

    while let Some(ch) = chars.next() {
        let token = match ch {
            '%' | '*' => Token::Any,
            '_' => Token::One,
            // A trailing backslash matches itself.
            '\\' => Token::Char(chars.next().unwrap_or('\\')),
            _ => Token::Char(ch),
        };
        if !(token == Token::Any && tokens.last() == Some(&Token::Any)) {
            tokens.push(token);
        }
    }

    tokens
}

/// Match `text` against a LIKE pattern; `case_insensitive` gives ILIKE.
#[must_use]
pub(super) fn like(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        like_tokens(&text.to_lowercase(), &tokenize(&pattern.to_lowercase()))
    } else {
        like_tokens(text, &tokenize(pattern))
    }
}

// Greedy wildcard match with single-point backtracking to the last `Any`.
fn like_tokens(text: &str, tokens: &[Token]) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut resume: Option<(usize, usize)> = None;

    while t < chars.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                resume = Some((p, t));
                p += 1;
            }
            Some(Token::One) => {
                t += 1;
                p += 1;
            }
            Some(Token::Char(ch)) if *ch == chars[t] => {
                t += 1;
                p += 1;
            }
            _ => match resume {
                Some((any_p, any_t)) => {
                    p = any_p + 1;
                    t = any_t + 1;
                    resume = Some((any_p, any_t + 1));
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|token| *token == Token::Any)
}

///
/// TESTS
///
