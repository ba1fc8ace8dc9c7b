//! Request parsing and validation into a canonical [`TaskSpec`].

use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::error::{Result, StratloopError};

use super::catalog::TaskCatalog;
use super::spec::{Frequency, TaskSpec};

/// Minimum window for weekly strategies (26 weeks).
const MIN_WEEKLY_DAYS: i64 = 26 * 7;

const PAIR_MODES: &[&str] = &["cointegration", "distance"];

/// Seeds feed `PYTHONHASHSEED`, which the interpreter caps at 32 bits
const MAX_SEED: u64 = u32::MAX as u64;

/// A task request before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    /// Field overrides keyed by spec field name, `task` selects the template
    Structured(Map<String, Value>),
    /// Bare task id, the catalog template is used as-is
    Shortcut(String),
}

impl TaskRequest {
    pub fn shortcut(task_id: impl Into<String>) -> Self {
        TaskRequest::Shortcut(task_id.into())
    }

    /// Parse free text.
    ///
    /// Accepts a JSON object, `key: value` / `key=value` lines, or a bare
    /// task id. Values on key lines are read as JSON when they parse as
    /// JSON and as plain strings otherwise.
    pub fn from_text(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StratloopError::InvalidSpec("empty request".to_string()));
        }

        if text.starts_with('{') {
            return match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(TaskRequest::Structured(map)),
                Ok(_) => Err(StratloopError::InvalidSpec("request JSON must be an object".to_string())),
                Err(e) => Err(StratloopError::InvalidSpec(format!("request is not valid JSON: {}", e))),
            };
        }

        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.len() == 1 && split_key_value(lines[0]).is_none() {
            return Ok(TaskRequest::Shortcut(lines[0].to_string()));
        }

        let mut map = Map::new();
        for line in lines {
            let (key, raw) = split_key_value(line)
                .ok_or_else(|| StratloopError::InvalidSpec(format!("cannot parse request line '{}'", line)))?;
            let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            map.insert(key.to_ascii_lowercase(), value);
        }
        Ok(TaskRequest::Structured(map))
    }
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let idx = line.find([':', '='])?;
    let key = line[..idx].trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, line[idx + 1..].trim()))
}

/// Validates requests against the frozen catalog.
#[derive(Debug, Clone)]
pub struct SpecGuard {
    catalog: Arc<TaskCatalog>,
}

impl SpecGuard {
    pub fn new(catalog: Arc<TaskCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// Turn a request into a validated, immutable spec.
    pub fn validate(&self, request: &TaskRequest) -> Result<TaskSpec> {
        let spec = match request {
            TaskRequest::Shortcut(task_id) => self.template(task_id.trim())?,
            TaskRequest::Structured(fields) => {
                let task_id = ["task", "name"]
                    .iter()
                    .find_map(|key| fields.get(*key).and_then(Value::as_str))
                    .ok_or_else(|| StratloopError::InvalidSpec("request is missing 'task'".to_string()))?;
                let mut spec = self.template(task_id.trim())?;
                for (key, value) in fields {
                    apply_override(&mut spec, key, value)?;
                }
                if spec.tools.is_empty() {
                    spec.tools = self.catalog.default_tools().to_vec();
                }
                spec
            }
        };

        self.check(&spec)?;
        debug!("Validated spec for task {}", spec.task_id);
        Ok(spec)
    }

    fn template(&self, task_id: &str) -> Result<TaskSpec> {
        self.catalog.get(task_id).cloned().ok_or_else(|| {
            StratloopError::InvalidSpec(format!(
                "task '{}' is not in the frozen suite. Allowed: {}",
                task_id,
                self.catalog.task_ids().join(", ")
            ))
        })
    }

    fn check(&self, spec: &TaskSpec) -> Result<()> {
        if spec.universe.is_empty() {
            return Err(invalid("universe must not be empty"));
        }
        let outside: Vec<&str> = spec
            .universe
            .iter()
            .filter(|s| !self.catalog.is_allowed_symbol(s))
            .map(String::as_str)
            .collect();
        if !outside.is_empty() {
            return Err(invalid(format!(
                "universe contains symbols outside the frozen universe: {}",
                outside.join(", ")
            )));
        }

        if !spec.costs_bps.is_finite() || spec.costs_bps < 0.0 {
            return Err(invalid("costs_bps must be non-negative"));
        }
        if !spec.max_leverage.is_finite() || spec.max_leverage <= 0.0 {
            return Err(invalid("max_leverage must be positive"));
        }
        if spec.seed > MAX_SEED {
            return Err(invalid(format!("seed must be at most {}", MAX_SEED)));
        }

        if spec.start_date >= spec.end_date {
            return Err(invalid("start_date must precede end_date"));
        }
        let bounds = self.catalog.bounds();
        if !bounds.contains(spec.start_date, spec.end_date) {
            return Err(invalid(format!(
                "date window must fall within data bounds {}..{}",
                bounds.start, bounds.end
            )));
        }
        if spec.frequency == Frequency::Weekly && spec.window_days() < MIN_WEEKLY_DAYS {
            return Err(invalid("weekly tasks require at least 26 weeks of data"));
        }

        if spec.task_id == "pair_trading" {
            let mode = spec.params.get("mode").and_then(Value::as_str).unwrap_or("");
            if !PAIR_MODES.contains(&mode) {
                return Err(invalid(format!(
                    "pair_trading mode must be one of {}",
                    PAIR_MODES.join(", ")
                )));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> StratloopError {
    StratloopError::InvalidSpec(msg.into())
}

fn apply_override(spec: &mut TaskSpec, key: &str, value: &Value) -> Result<()> {
    match key {
        "task" | "name" | "task_id" => {}
        "description" => spec.description = string_value(key, value)?,
        "signal" => spec.signal = string_value(key, value)?,
        "universe" => {
            let mut symbols: Vec<String> = Vec::new();
            for symbol in string_list(key, value)? {
                let symbol = symbol.to_ascii_uppercase();
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
            spec.universe = symbols;
        }
        "tools" => spec.tools = string_list(key, value)?,
        "required_metrics" => spec.required_metrics = string_list(key, value)?,
        "frequency" => {
            let raw = string_value(key, value)?;
            spec.frequency =
                Frequency::parse(&raw).ok_or_else(|| invalid(format!("unknown frequency '{}'", raw)))?;
        }
        "rules" => {
            for (rule, text) in json_object(key, value)? {
                let text = match text {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                spec.rules.insert(rule, text);
            }
        }
        "params" => {
            for (param, v) in json_object(key, value)? {
                spec.params.insert(param, v);
            }
        }
        "costs_bps" => spec.costs_bps = number(key, value)?,
        "max_leverage" => spec.max_leverage = number(key, value)?,
        "seed" => {
            spec.seed = match value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }
            .ok_or_else(|| invalid("seed must be a non-negative integer"))?;
        }
        "start_date" => spec.start_date = date(key, value)?,
        "end_date" => spec.end_date = date(key, value)?,
        other => warn!("Ignoring unknown request field '{}'", other),
    }
    Ok(())
}

fn string_value(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(invalid(format!("{} must be a string", key))),
    }
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| invalid(format!("{} entries must be strings", key)))
            })
            .collect(),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()),
        _ => Err(invalid(format!("{} must be a list or comma-separated string", key))),
    }
}

fn json_object(key: &str, value: &Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(invalid(format!("{} must be a JSON object", key))),
        },
        _ => Err(invalid(format!("{} must be a JSON object", key))),
    }
}

fn number(key: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid(format!("{} must be a number", key)))
}

fn date(key: &str, value: &Value) -> Result<NaiveDate> {
    let raw = value
        .as_str()
        .ok_or_else(|| invalid(format!("{} must be a YYYY-MM-DD string", key)))?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(format!("{} '{}' is not a YYYY-MM-DD date", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guard() -> SpecGuard {
        SpecGuard::new(Arc::new(TaskCatalog::builtin().unwrap()))
    }

    fn structured(value: Value) -> TaskRequest {
        match value {
            Value::Object(map) => TaskRequest::Structured(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_every_builtin_task_validates() {
        let guard = guard();
        let ids: Vec<String> = guard.catalog().task_ids().iter().map(|s| s.to_string()).collect();
        for id in ids {
            let spec = guard.validate(&TaskRequest::shortcut(&id)).unwrap();
            assert_eq!(spec.task_id, id);
        }
    }

    #[test]
    fn test_shortcut_and_structured_normalize_identically() {
        let guard = guard();
        let a = guard.validate(&TaskRequest::shortcut("momentum_daily")).unwrap();
        let b = guard.validate(&structured(json!({"task": "momentum_daily"}))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_task_lists_allowed() {
        let err = guard().validate(&TaskRequest::shortcut("lottery")).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, StratloopError::InvalidSpec(_)));
        assert!(msg.contains("lottery"));
        assert!(msg.contains("momentum_daily"));
    }

    #[test]
    fn test_missing_task_field() {
        let err = guard().validate(&structured(json!({"costs_bps": 2.0}))).unwrap_err();
        assert!(err.to_string().contains("missing 'task'"));
    }

    #[test]
    fn test_name_used_when_task_is_not_a_string() {
        let spec = guard()
            .validate(&structured(json!({"task": 1, "name": "breakout"})))
            .unwrap();
        assert_eq!(spec.task_id, "breakout");
    }

    #[test]
    fn test_seed_bounded_to_32_bits() {
        let guard = guard();
        let spec = guard
            .validate(&structured(json!({"task": "breakout", "seed": 4294967295u64})))
            .unwrap();
        assert_eq!(spec.seed, 4294967295);

        let err = guard
            .validate(&structured(json!({"task": "breakout", "seed": 5000000000u64})))
            .unwrap_err();
        assert!(matches!(err, StratloopError::InvalidSpec(_)));
        assert!(err.to_string().contains("seed must be at most 4294967295"));
    }

    #[test]
    fn test_params_merge_keywise() {
        let spec = guard()
            .validate(&structured(json!({"task": "momentum_daily", "params": {"top_k": 2}})))
            .unwrap();
        assert_eq!(spec.params["top_k"], 2);
        assert_eq!(spec.params["lookback"], 63);
        assert_eq!(spec.params["holding_period"], 20);
    }

    #[test]
    fn test_params_as_json_string() {
        let spec = guard()
            .validate(&structured(json!({"task": "breakout", "params": "{\"window\": 30}"})))
            .unwrap();
        assert_eq!(spec.params["window"], 30);
        assert_eq!(spec.params["stop_window"], 20);
    }

    #[test]
    fn test_comma_lists_and_numeric_strings() {
        let spec = guard()
            .validate(&structured(json!({
                "task": "momentum_daily",
                "universe": "spy, QQQ,GLD, spy",
                "costs_bps": "2.5",
                "max_leverage": "0.5"
            })))
            .unwrap();
        assert_eq!(spec.universe, vec!["SPY", "QQQ", "GLD"]);
        assert_eq!(spec.costs_bps, 2.5);
        assert_eq!(spec.max_leverage, 0.5);
    }

    #[test]
    fn test_empty_tools_fall_back_to_defaults() {
        let guard = guard();
        let spec = guard
            .validate(&structured(json!({"task": "breakout", "tools": []})))
            .unwrap();
        assert_eq!(spec.tools, guard.catalog().default_tools().to_vec());
    }

    #[test]
    fn test_negative_costs_rejected() {
        let err = guard()
            .validate(&structured(json!({"task": "momentum_daily", "costs_bps": -1})))
            .unwrap_err();
        assert!(err.to_string().contains("costs_bps"));
    }

    #[test]
    fn test_inverted_window_rejected() {
        let err = guard()
            .validate(&structured(json!({
                "task": "momentum_daily",
                "start_date": "2020-01-01",
                "end_date": "2019-01-01"
            })))
            .unwrap_err();
        assert!(err.to_string().contains("start_date must precede end_date"));
    }

    #[test]
    fn test_window_outside_bounds_rejected() {
        let err = guard()
            .validate(&structured(json!({"task": "momentum_daily", "start_date": "2001-01-02"})))
            .unwrap_err();
        assert!(err.to_string().contains("data bounds"));
    }

    #[test]
    fn test_foreign_symbol_rejected() {
        let err = guard()
            .validate(&structured(json!({"task": "momentum_daily", "universe": ["SPY", "TSLA"]})))
            .unwrap_err();
        assert!(err.to_string().contains("TSLA"));
    }

    #[test]
    fn test_short_weekly_window_rejected() {
        let err = guard()
            .validate(&structured(json!({
                "task": "momentum_weekly",
                "start_date": "2020-01-01",
                "end_date": "2020-03-01"
            })))
            .unwrap_err();
        assert!(err.to_string().contains("26 weeks"));
    }

    #[test]
    fn test_pair_mode_checked() {
        let guard = guard();
        let ok = guard.validate(&structured(json!({"task": "pair_trading", "params": {"mode": "distance"}})));
        assert!(ok.is_ok());
        let err = guard
            .validate(&structured(json!({"task": "pair_trading", "params": {"mode": "kalman"}})))
            .unwrap_err();
        assert!(err.to_string().contains("cointegration"));
    }

    #[test]
    fn test_bad_date_format() {
        let err = guard()
            .validate(&structured(json!({"task": "momentum_daily", "end_date": "31/10/2025"})))
            .unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_from_text_json() {
        let request = TaskRequest::from_text(r#"{"task": "breakout", "costs_bps": 3}"#).unwrap();
        assert!(matches!(request, TaskRequest::Structured(ref m) if m["costs_bps"] == 3));
    }

    #[test]
    fn test_from_text_key_value_lines() {
        let text = "task: momentum_daily\nuniverse = SPY, QQQ\nstart_date: 2015-01-02\nparams: {\"top_k\": 1}";
        let spec = guard().validate(&TaskRequest::from_text(text).unwrap()).unwrap();
        assert_eq!(spec.universe, vec!["SPY", "QQQ"]);
        assert_eq!(spec.start_date, NaiveDate::from_ymd_opt(2015, 1, 2).unwrap());
        assert_eq!(spec.params["top_k"], 1);
    }

    #[test]
    fn test_from_text_shortcut() {
        assert_eq!(
            TaskRequest::from_text("  risk_parity \n").unwrap(),
            TaskRequest::shortcut("risk_parity")
        );
    }

    #[test]
    fn test_from_text_rejects_empty_and_non_object() {
        assert!(TaskRequest::from_text("   ").is_err());
        assert!(TaskRequest::from_text("{not json").is_err());
        assert!(TaskRequest::from_text("task: breakout\njust words here").is_err());
    }

    #[test]
    fn test_unknown_field_ignored() {
        let spec = guard()
            .validate(&structured(json!({"task": "breakout", "colour": "blue"})))
            .unwrap();
        assert_eq!(spec.task_id, "breakout");
    }
}
