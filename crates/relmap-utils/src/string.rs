use std::sync::LazyLock;

use regex::Regex;

use crate::error::{IdentifierError, IdentifierResult};

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("unable to compile identifier regex")
});

/// Returns `true` if `input` is a simple identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(input: &str) -> bool {
    IDENTIFIER_RE.is_match(input)
}

/// Validates that `input` is a simple identifier, reporting the first offending
/// character otherwise.
///
/// # Examples
///
/// ```
/// use relmap_utils::string::validate_identifier;
///
/// assert!(validate_identifier("barName").is_ok());
/// assert!(validate_identifier("bar-name").is_err());
/// ```
pub fn validate_identifier(input: &str) -> IdentifierResult<()> {
    if input.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if is_identifier(input) {
        return Ok(());
    }
    if input.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(IdentifierError::LeadingDigit {
            input: input.to_string(),
        });
    }

    let position = input
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(idx, _)| idx)
        .unwrap_or_default();

    Err(IdentifierError::InvalidCharacter {
        input: input.to_string(),
        position,
    })
}

/// Quotes a possibly dotted identifier (`table.column`) segment by segment.
///
/// The quote character is doubled inside a segment.
///
/// # Examples
///
/// ```
/// use relmap_utils::string::quote_identifier;
///
/// assert_eq!(quote_identifier("cart.id", '`'), "`cart`.`id`");
/// ```
pub fn quote_identifier(name: &str, quote: char) -> String {
    let doubled = format!("{quote}{quote}");
    name.split('.')
        .map(|segment| {
            format!(
                "{quote}{}{quote}",
                segment.replace(quote, &doubled)
            )
        })
        .collect::<Vec<_>>()
        .join(".")
}
