//! Contains-text expressions.
//!
//! ```text
//! dragons tacos          both terms must occur
//! dragons OR caterpillar either group may match
//! dragons -salsa         second term must not occur
//! "love tacos"           phrase
//! \-1 \"quoted\" \OR     backslash removes special meaning
//! ```
//!
//! Matching is a case-insensitive substring test against the string values
//! of a node's properties.

use super::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    text: String,
    negated: bool,
}

/// A parsed expression: a disjunction of conjunctive groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    groups: Vec<Vec<Term>>,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word { text: String, negated: bool },
    Or,
}

impl Query {
    pub fn parse(expression: &str) -> StoreResult<Self> {
        let mut groups = Vec::new();
        let mut current = Vec::new();

        for token in tokenize(expression)? {
            match token {
                Token::Or => {
                    if current.is_empty() {
                        return Err(StoreError::InvalidQuery("OR without a preceding term"));
                    }
                    groups.push(std::mem::take(&mut current));
                }
                Token::Word { text, negated } => current.push(Term {
                    text: text.to_lowercase(),
                    negated,
                }),
            }
        }

        if current.is_empty() {
            return Err(if groups.is_empty() {
                StoreError::InvalidQuery("empty expression")
            } else {
                StoreError::InvalidQuery("OR without a following term")
            });
        }
        groups.push(current);
        Ok(Self { groups })
    }

    /// Tests the query against a set of text values.
    pub fn matches<'a, I>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let haystack: Vec<String> = values.into_iter().map(str::to_lowercase).collect();
        let contains = |needle: &str| haystack.iter().any(|value| value.contains(needle));

        self.groups.iter().any(|group| {
            group
                .iter()
                .all(|term| contains(&term.text) != term.negated)
        })
    }
}

fn tokenize(expression: &str) -> StoreResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        let negated = first == '-';
        if negated {
            chars.next();
        }

        let mut text = String::new();
        let mut escaped_any = false;
        let mut quoted = false;

        while let Some(&c) = chars.peek() {
            match c {
                '\\' => {
                    chars.next();
                    let next = chars
                        .next()
                        .ok_or(StoreError::InvalidQuery("trailing escape character"))?;
                    text.push(next);
                    escaped_any = true;
                }
                '"' => {
                    chars.next();
                    quoted = true;
                    read_phrase(&mut chars, &mut text)?;
                }
                c if c.is_whitespace() => break,
                c => {
                    chars.next();
                    text.push(c);
                }
            }
        }

        if text.is_empty() {
            if quoted {
                continue;
            }
            return Err(StoreError::InvalidQuery("negation without a term"));
        }
        if !negated && !escaped_any && !quoted && text == "OR" {
            tokens.push(Token::Or);
        } else {
            tokens.push(Token::Word { text, negated });
        }
    }

    Ok(tokens)
}

fn read_phrase(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, text: &mut String) -> StoreResult<()> {
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(()),
            '\\' => {
                let next = chars
                    .next()
                    .ok_or(StoreError::InvalidQuery("trailing escape character"))?;
                text.push(next);
            }
            c => text.push(c),
        }
    }
    Err(StoreError::InvalidQuery("unterminated phrase"))
}

/// Escapes `text` so every word in it is matched literally.
pub fn escape(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut out = String::with_capacity(word.len() + 2);
            if word == "OR" {
                out.push('\\');
            }
            for c in word.chars() {
                if matches!(c, '\\' | '"' | '-') {
                    out.push('\\');
                }
                out.push(c);
            }
            out
        })
        .collect::<Vec<_>>()
        .join(" ")
}
