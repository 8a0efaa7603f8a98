//! Column-name normalization.
//!
//! Derives database column names from declared field names or raw file
//! headers. Raw names are cleaned (punctuation stripped, `#` → "num",
//! `%` → "pct"), split into lowercase words, and re-joined in the requested
//! [`NameStyle`]. The word splitter understands `camelCase`, `PascalCase`,
//! `ALLCAPS` runs, and embedded digit runs, so `Ticket #24` and
//! `ticketNum24` normalize to the same name.

use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToTitleCase, ToUpperCamelCase};

use crate::profile::NameStyle;

const STRIPPED_CHARS: &[char] = &[
    '$', '/', '\\', '&', '@', '.', ':', ';', '?', ',', '(', ')', '[', ']', '{', '}', '\'', '"',
];

/// Renders `raw` as a column name in `style`.
///
/// `AsIs` (and blank input) returns the input unchanged. If cleaning strips
/// the name down to nothing, the splitter falls back to the original text;
/// if that still yields no words the original string is returned verbatim.
pub fn column_name(raw: &str, style: NameStyle) -> String {
    if matches!(style, NameStyle::AsIs) || raw.trim().is_empty() {
        return raw.to_string();
    }

    let cleaned = clean_raw_name(raw);
    let source = if cleaned.trim().is_empty() {
        raw
    } else {
        cleaned.as_str()
    };

    let mut words = split_words(source);
    if words.is_empty() {
        words = split_words(raw);
    }
    if words.is_empty() {
        return raw.to_string();
    }

    render(&words, style)
}

/// Strip punctuation, expand `#`/`%`, and normalize separators to spaces.
fn clean_raw_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 8);
    for c in name.trim().chars() {
        match c {
            c if STRIPPED_CHARS.contains(&c) => {}
            '#' => result.push_str(" num"),
            '%' => result.push_str(" pct"),
            '_' | '-' => result.push(' '),
            other => result.push(other),
        }
    }
    result.trim().to_string()
}

/// Splits into lowercase words: a run of lowercase letters (optionally led by
/// one uppercase letter), a run of uppercase letters not followed by a
/// lowercase letter, or a run of digits. Everything else is a boundary.
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    for token in input.split_whitespace() {
        let chars: Vec<char> = token.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_ascii_digit() {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                words.push(chars[start..i].iter().collect());
            } else if c.is_ascii_lowercase() {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_lowercase() {
                    i += 1;
                }
                words.push(chars[start..i].iter().collect());
            } else if c.is_ascii_uppercase() {
                if i + 1 < chars.len() && chars[i + 1].is_ascii_lowercase() {
                    // Capitalized word: one uppercase letter plus its lowercase run.
                    let start = i;
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_lowercase() {
                        i += 1;
                    }
                    words.push(chars[start..i].iter().collect::<String>().to_ascii_lowercase());
                } else {
                    // Uppercase run; stop before an uppercase that starts a capitalized word.
                    let start = i;
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_uppercase() {
                        if i + 1 < chars.len() && chars[i + 1].is_ascii_lowercase() {
                            break;
                        }
                        i += 1;
                    }
                    words.push(chars[start..i].iter().collect::<String>().to_ascii_lowercase());
                }
            } else {
                i += 1;
            }
        }
    }
    words
}

fn render(words: &[String], style: NameStyle) -> String {
    let joined = words.join(" ");
    match style {
        NameStyle::AsIs => joined,
        NameStyle::CamelCase => joined.to_lower_camel_case(),
        NameStyle::PascalCase => joined.to_upper_camel_case(),
        NameStyle::SnakeCase => joined.to_snake_case(),
        NameStyle::KebabCase => joined.to_kebab_case(),
        NameStyle::TitleWithSpaces => joined.to_title_case(),
    }
}
