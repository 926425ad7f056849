//! Natural ("human") ordering of strings.
//!
//! Strings are split into alternating runs of ASCII digits and non-digits.
//! Digit runs compare by value, so `img2` sorts before `img10`.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Number(&'a str),
    Text(&'a str),
}

fn tokenize(s: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut numeric = None;
    for (idx, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match numeric {
            Some(prev) if prev != is_digit => {
                tokens.push(make_token(&s[start..idx], prev));
                start = idx;
            }
            _ => {}
        }
        numeric = Some(is_digit);
    }
    if let Some(prev) = numeric {
        tokens.push(make_token(&s[start..], prev));
    }
    tokens
}

fn make_token(s: &str, numeric: bool) -> Token<'_> {
    if numeric {
        Token::Number(s)
    } else {
        Token::Text(s)
    }
}

/// Compares two digit runs by value without parsing them into a fixed-width
/// integer.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_tokens(a: &Token<'_>, b: &Token<'_>) -> Ordering {
    match (a, b) {
        (Token::Number(x), Token::Number(y)) => compare_digits(x, y).then_with(|| x.cmp(y)),
        // numbers before strings
        (Token::Number(_), Token::Text(_)) => Ordering::Less,
        (Token::Text(_), Token::Number(_)) => Ordering::Greater,
        (Token::Text(x), Token::Text(y)) => x.cmp(y),
    }
}

/// Compares two strings in natural order.
pub fn natural_compare(a: &str, b: &str) -> Ordering {
    let xs = tokenize(a);
    let ys = tokenize(b);
    for (x, y) in xs.iter().zip(ys.iter()) {
        match compare_tokens(x, y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    xs.len().cmp(&ys.len())
}

/// Case-insensitive [`natural_compare`].
pub fn natural_case_compare(a: &str, b: &str) -> Ordering {
    natural_compare(&a.to_uppercase(), &b.to_uppercase())
}
