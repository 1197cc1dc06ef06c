//! Helpers over C type spellings
//!
//! Structural facts come from [`TypeNode`](crate::TypeNode). These helpers
//! are only for places where nothing but text is available.

use once_cell::sync::Lazy;
use regex::Regex;

static BASE_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\b(?:const|volatile|restrict)\b\s*)*(([^\[*(]+)(\(?).*)").unwrap()
});

static TYPE_COMPONENTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^(]*\(\**|[^\[]*)(.*)").unwrap());

/// Leaf identifier of a spelling, without leading cv-qualifiers, pointers
/// or array extents.
///
/// For function types the whole signature is kept, since it has no simpler
/// name.
pub fn base_name(spelling: &str) -> String {
    let caps = match BASE_TYPE_RE.captures(spelling) {
        Some(caps) => caps,
        None => return spelling.trim().to_string(),
    };
    let is_function = caps.get(3).map(|m| !m.as_str().is_empty()).unwrap_or(false);
    let group = if is_function { caps.get(1) } else { caps.get(2) };
    group
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| spelling.trim().to_string())
}

/// Form a declaration of `identifier` with the type `spelling`.
///
/// ```
/// use capi_core::spelling::typed_declaration;
///
/// assert_eq!(typed_declaration("int", "x"), "int x");
/// assert_eq!(typed_declaration("int [4]", "x"), "int x[4]");
/// assert_eq!(typed_declaration("void (*)(int)", "cb"), "void (*cb)(int)");
/// ```
pub fn typed_declaration(spelling: &str, identifier: &str) -> String {
    let (head, tail) = match TYPE_COMPONENTS_RE.captures(spelling) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()).unwrap_or(""),
            caps.get(2).map(|m| m.as_str()).unwrap_or(""),
        ),
        None => (spelling, ""),
    };

    let separator = if tail.is_empty() { " " } else { "" };
    format!("{}{}{}{}", head, separator, identifier, tail)
}

/// Strip a leading `struct`/`union`/`enum` keyword.
pub fn strip_tag_keyword(spelling: &str) -> &str {
    for keyword in ["struct ", "union ", "enum ", "class "] {
        if let Some(rest) = spelling.strip_prefix(keyword) {
            return rest.trim_start();
        }
    }
    spelling
}
