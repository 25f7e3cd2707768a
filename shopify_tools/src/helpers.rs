use serde_json::Value;

/// Builds a global id, e.g. `gid://shopify/Customer/42`.
pub fn shopify_gid(resource: &str, id: &str) -> String {
    format!("gid://shopify/{resource}/{id}")
}

/// The last path segment of a global id, or the input unchanged if it is not a gid.
pub fn gid_tail(gid: &str) -> &str {
    gid.rsplit('/').next().unwrap_or(gid)
}

/// Shopify reports mutation validation failures as `userErrors` arrays nested under each top-level field in `data`,
/// with a 200 status. Collects the messages of every non-empty list.
pub fn collect_user_errors(data: &Value) -> Vec<String> {
    let Some(fields) = data.as_object() else {
        return Vec::new();
    };
    fields
        .values()
        .filter_map(|v| v.get("userErrors").and_then(Value::as_array))
        .flatten()
        .map(|e| match (e.get("field"), e.get("message").and_then(Value::as_str)) {
            (Some(Value::Array(field)), Some(msg)) if !field.is_empty() => {
                let path = field.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(".");
                format!("{path}: {msg}")
            },
            (_, Some(msg)) => msg.to_string(),
            _ => e.to_string(),
        })
        .collect()
}
