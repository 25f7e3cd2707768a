/// Parses a boolean token using the vocabulary shared by environment flags, metafields and note attributes:
/// `true/1/yes/y/on` and `false/0/no/n/off`, case-insensitively. Anything else (including blank) is `None`.
pub fn parse_boolean_token(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    value.as_deref().and_then(parse_boolean_token).unwrap_or(default)
}

/// Returns the first candidate that is non-empty after trimming.
pub fn coalesce_string<'a, I>(candidates: I) -> Option<String>
where I: IntoIterator<Item = Option<&'a str>> {
    candidates.into_iter().flatten().map(str::trim).find(|s| !s.is_empty()).map(String::from)
}

/// Returns the first candidate that parses as a boolean token.
pub fn coalesce_bool<'a, I>(candidates: I) -> Option<bool>
where I: IntoIterator<Item = Option<&'a str>> {
    candidates.into_iter().flatten().find_map(parse_boolean_token)
}
