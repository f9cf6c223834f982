use serde_json::Value;

use super::schema::FieldSchema;

/// Check a bound configuration against its schema rules.
///
/// `value` is the configuration re-serialized after binding, so defaults have
/// already been applied. Optional fields that are empty skip their rules.
pub fn validate_fields(fields: &[FieldSchema], value: &Value) -> Vec<String> {
    let mut violations = Vec::new();

    for field in fields {
        let field_value = value.get(&field.name).unwrap_or(&Value::Null);
        let empty = is_empty(field_value);

        if empty {
            if field.required {
                violations.push(format!("{} is required", field.name));
            }
            continue;
        }

        for rule in &field.validations {
            if let Some(message) = check_rule(&field.name, rule, field_value) {
                violations.push(message);
            }
        }
    }

    violations
}

fn check_rule(name: &str, rule: &str, value: &Value) -> Option<String> {
    let (tag, param) = match rule.split_once('=') {
        Some((tag, param)) => (tag, Some(param)),
        None => (rule, None),
    };

    match (tag, param) {
        ("required", _) => None,
        ("min", Some(bound)) => {
            let bound: f64 = bound.parse().ok()?;
            (measure(value)? < bound).then(|| format!("{} must be at least {}", name, bound))
        }
        ("max", Some(bound)) => {
            let bound: f64 = bound.parse().ok()?;
            (measure(value)? > bound).then(|| format!("{} must be at most {}", name, bound))
        }
        ("oneof", Some(options)) => {
            let actual = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let allowed: Vec<&str> = options.split_whitespace().collect();
            (!allowed.contains(&actual.as_str()))
                .then(|| format!("{} must be one of [{}]", name, allowed.join(", ")))
        }
        ("email", _) => (!value.as_str().is_some_and(is_email))
            .then(|| format!("{} must be a valid email", name)),
        ("url", _) => (!value.as_str().is_some_and(is_url))
            .then(|| format!("{} must be a valid URL", name)),
        _ => Some(format!("{} has unsupported rule '{}'", name, rule)),
    }
}

/// Numbers compare by value, strings by character count, collections by length.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(a) => Some(a.len() as f64),
        Value::Object(o) => Some(o.len() as f64),
        _ => None,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok_and(|u| u.has_host())
}
