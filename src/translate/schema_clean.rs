use serde_json::Value;

/// JSON-Schema keywords the upstream accepts in function parameters.
const ALLOWED_KEYS: [&str; 8] = [
    "type",
    "description",
    "properties",
    "required",
    "items",
    "enum",
    "format",
    "nullable",
];

/// Reduce a JSON Schema to the upstream-compatible subset.
///
/// Drops unsupported keywords at every nesting level and uppercases `type`
/// values (the upstream convention). Idempotent.
pub fn clean_schema(schema: &Value) -> Value {
    let mut cleaned = schema.clone();
    clean_in_place(&mut cleaned);
    cleaned
}

fn clean_in_place(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };

    map.retain(|key, _| ALLOWED_KEYS.contains(&key.as_str()));
    if let Some(Value::String(t)) = map.get_mut("type") {
        *t = t.to_ascii_uppercase();
    }

    // Nested schemas live under `properties` values and `items`; everything
    // else (enum, required, ...) is plain data and stays untouched.
    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        for nested in properties.values_mut() {
            clean_in_place(nested);
        }
    }
    match map.get_mut("items") {
        Some(item @ Value::Object(_)) => clean_in_place(item),
        Some(Value::Array(items)) => {
            for item in items {
                clean_in_place(item);
            }
        }
        _ => {}
    }
}
