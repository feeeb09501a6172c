//! Identifier case conversions used by the rendering context.
//!
//! All three conversions are pure and idempotent on input already in their
//! target form, so the generator can re-apply them freely without tracking
//! which form an identifier is currently in.

/// Convert an identifier to `snake_case`.
///
/// An underscore is inserted at every lowercase-to-uppercase boundary and
/// the result is lowercased. Input that is already snake_case passes
/// through unchanged.
pub fn to_snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_is_lower = false;
    for ch in input.chars() {
        if ch.is_uppercase() && prev_is_lower {
            out.push('_');
        }
        prev_is_lower = ch.is_lowercase();
        out.extend(ch.to_lowercase());
    }
    out
}

/// Convert an identifier to `PascalCase`.
///
/// Snake segments are normalized first, then each segment's leading
/// character is capitalized. Interior capitals inside a segment are kept,
/// so PascalCase input is a fixed point.
pub fn to_pascal_case(input: &str) -> String {
    input
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(capitalize_first)
        .collect()
}

/// Convert an identifier to `camelCase`.
pub fn to_camel_case(input: &str) -> String {
    let pascal = to_pascal_case(input);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => pascal,
    }
}

fn capitalize_first(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
