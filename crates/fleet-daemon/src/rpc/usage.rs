//! `message_end` usage delta computation (spec §4.D.3).

use fleet_core::UsageDelta;
use serde_json::Value;

/// Compute a [`UsageDelta`] from a `message_end` event, if it carries
/// assistant usage. Returns `None` for non-assistant or usage-less events.
pub fn usage_delta_from_event(event: &Value) -> Option<UsageDelta> {
    let role = event.get("message").and_then(|m| m.get("role")).and_then(Value::as_str)?;
    if role != "assistant" {
        return None;
    }
    let usage = event.get("message").and_then(|m| m.get("usage"))?;
    if usage.as_object().map(|o| o.is_empty()).unwrap_or(true) {
        return None;
    }

    let field = |name: &str| usage.get(name).and_then(Value::as_u64).unwrap_or(0);
    let total_tokens = usage.get("totalTokens").and_then(Value::as_u64);
    let cost = sum_cost_channels(usage.get("cost"));

    Some(UsageDelta {
        input: field("input"),
        output: field("output"),
        cache_read: field("cacheRead"),
        cache_write: field("cacheWrite"),
        total_tokens,
        cost,
    })
}

/// Sum every numeric channel under `cost` (spec §4.D.3 "cost = sum of cost
/// channels"): nested keys like `input`, `output`, `cacheRead` each
/// contribute their own dollar amount.
fn sum_cost_channels(cost: Option<&Value>) -> f64 {
    match cost {
        Some(Value::Object(map)) => map.values().filter_map(Value::as_f64).sum(),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_delta_from_assistant_message_end() {
        let event = json!({
            "type": "message_end",
            "message": {
                "role": "assistant",
                "usage": {
                    "input": 100,
                    "output": 50,
                    "cacheRead": 10,
                    "cacheWrite": 5,
                    "cost": {"input": 0.01, "output": 0.02},
                }
            }
        });
        let delta = usage_delta_from_event(&event).unwrap();
        assert_eq!(delta.input, 100);
        assert_eq!(delta.output, 50);
        assert_eq!(delta.cache_read, 10);
        assert_eq!(delta.cache_write, 5);
        assert_eq!(delta.total_tokens, None);
        assert!((delta.cost - 0.03).abs() < f64::EPSILON);
    }

    #[test]
    fn non_assistant_role_has_no_delta() {
        let event = json!({"type": "message_end", "message": {"role": "user", "usage": {"input": 1}}});
        assert!(usage_delta_from_event(&event).is_none());
    }

    #[test]
    fn empty_usage_has_no_delta() {
        let event = json!({"type": "message_end", "message": {"role": "assistant", "usage": {}}});
        assert!(usage_delta_from_event(&event).is_none());
    }

    #[test]
    fn explicit_total_tokens_is_preserved() {
        let event = json!({
            "type": "message_end",
            "message": {"role": "assistant", "usage": {"input": 1, "output": 1, "totalTokens": 99}}
        });
        let delta = usage_delta_from_event(&event).unwrap();
        assert_eq!(delta.total_tokens, Some(99));
    }
}
