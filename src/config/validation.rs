//! Configuration validation.
//!
//! Checks an untrusted, loosely-typed JSON document against the shape of
//! [`GameConfig`](super::schema::GameConfig) before anything is deserialized
//! or swapped in. Validation is a pure function of the document: it never
//! mutates state, never panics, and collects ALL errors (doesn't stop at the
//! first) in document traversal order so the same document always yields
//! the same list.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::config::schema::{GENERAL_TIMER_ID, parse_clock_duration};

/// Top-level sections every configuration document must contain, in the
/// order they are checked.
pub const REQUIRED_SECTIONS: [&str; 6] = ["general", "devices", "timers", "events", "hints", "cameras"];

// ============================================================================
// Public API
// ============================================================================

/// Validates an untrusted configuration document.
///
/// Returns the ordered list of human-readable errors; an empty list means
/// the document can be deserialized into a `GameConfig` and used.
#[must_use]
pub fn validate_document(document: &Value) -> Vec<String> {
    Validator::new().validate(document)
}

/// Configuration validator.
///
/// Walks the document section by section, recording one error per
/// offending field.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a document and returns the collected errors.
    pub fn validate(&mut self, document: &Value) -> Vec<String> {
        self.errors.clear();

        let Some(root) = document.as_object() else {
            self.type_mismatch("<root>", "object", document);
            return std::mem::take(&mut self.errors);
        };

        // Event ids are needed to check timer references, which come first
        let event_ids = collect_ids(root.get("events"));

        for section in REQUIRED_SECTIONS {
            let Some(value) = root.get(section) else {
                self.errors
                    .push(format!("missing required section '{section}'"));
                continue;
            };
            match section {
                "general" => self.validate_general(value),
                "devices" => self.validate_devices(value),
                "timers" => self.validate_timers(value, &event_ids),
                "events" => self.validate_events(value),
                "hints" => self.validate_hints(value),
                "cameras" => self.validate_cameras(value),
                _ => {}
            }
        }

        std::mem::take(&mut self.errors)
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn validate_general(&mut self, value: &Value) {
        let Some(general) = self.expect_object("general", value) else {
            return;
        };
        self.require_string(general, "general", "name");
        if let Some(duration) = self.require_string(general, "general", "duration") {
            self.check_duration("general.duration", duration);
        }
        self.optional_string(general, "general", "host");
        if let Some(port) = general.get("port").filter(|v| !v.is_null()) {
            match port.as_u64() {
                Some(p) if p <= u64::from(u16::MAX) => {}
                Some(p) => self
                    .errors
                    .push(format!("general.port: {p} is out of range, expected 0-65535")),
                None => self.type_mismatch("general.port", "integer", port),
            }
        }
    }

    fn validate_devices(&mut self, value: &Value) {
        let Some(devices) = self.expect_array("devices", value) else {
            return;
        };
        let mut seen = HashSet::new();
        for (idx, device) in devices.iter().enumerate() {
            let path = format!("devices[{idx}]");
            let Some(device) = self.expect_object(&path, device) else {
                continue;
            };
            if let Some(id) = self.require_string(device, &path, "id") {
                self.check_id(&path, id, &mut seen, "device");
            }
            self.optional_string(device, &path, "category");
            self.optional_string(device, &path, "description");
            if let Some(push) = device.get("push_status").filter(|v| !v.is_null()) {
                if !push.is_boolean() {
                    self.type_mismatch(&format!("{path}.push_status"), "boolean", push);
                }
            }
        }
    }

    fn validate_timers(&mut self, value: &Value, event_ids: &HashSet<String>) {
        let Some(timers) = self.expect_array("timers", value) else {
            return;
        };
        let mut seen = HashSet::new();
        for (idx, timer) in timers.iter().enumerate() {
            let path = format!("timers[{idx}]");
            let Some(timer) = self.expect_object(&path, timer) else {
                continue;
            };
            if let Some(id) = self.require_string(timer, &path, "id") {
                if id == GENERAL_TIMER_ID {
                    self.errors.push(format!(
                        "{path}.id: '{GENERAL_TIMER_ID}' is reserved for the room timer"
                    ));
                } else {
                    self.check_id(&path, id, &mut seen, "timer");
                }
            }
            if let Some(duration) = self.require_string(timer, &path, "duration") {
                self.check_duration(&format!("{path}.duration"), duration);
            }
            if let Some(event) = self.optional_string(timer, &path, "event") {
                if !event_ids.contains(event) {
                    self.errors
                        .push(format!("{path}.event: unknown event '{event}'"));
                }
            }
        }
    }

    fn validate_events(&mut self, value: &Value) {
        let Some(events) = self.expect_array("events", value) else {
            return;
        };
        let mut seen = HashSet::new();
        for (idx, event) in events.iter().enumerate() {
            let path = format!("events[{idx}]");
            let Some(event) = self.expect_object(&path, event) else {
                continue;
            };
            if let Some(id) = self.require_string(event, &path, "id") {
                self.check_id(&path, id, &mut seen, "event");
            }
            self.require_string(event, &path, "description");
        }
    }

    fn validate_hints(&mut self, value: &Value) {
        let Some(groups) = self.expect_object("hints", value) else {
            return;
        };
        for (group, hints) in groups {
            let path = format!("hints.{group}");
            let Some(hints) = self.expect_array(&path, hints) else {
                continue;
            };
            for (idx, hint) in hints.iter().enumerate() {
                if !hint.is_string() {
                    self.type_mismatch(&format!("{path}[{idx}]"), "string", hint);
                }
            }
        }
    }

    fn validate_cameras(&mut self, value: &Value) {
        let Some(cameras) = self.expect_array("cameras", value) else {
            return;
        };
        for (idx, camera) in cameras.iter().enumerate() {
            let path = format!("cameras[{idx}]");
            let Some(camera) = self.expect_object(&path, camera) else {
                continue;
            };
            self.require_string(camera, &path, "name");
            self.require_string(camera, &path, "link");
        }
    }

    // ========================================================================
    // Field helpers
    // ========================================================================

    fn expect_object<'a>(&mut self, path: &str, value: &'a Value) -> Option<&'a Map<String, Value>> {
        let object = value.as_object();
        if object.is_none() {
            self.type_mismatch(path, "object", value);
        }
        object
    }

    fn expect_array<'a>(&mut self, path: &str, value: &'a Value) -> Option<&'a Vec<Value>> {
        let array = value.as_array();
        if array.is_none() {
            self.type_mismatch(path, "array", value);
        }
        array
    }

    fn require_string<'a>(
        &mut self,
        object: &'a Map<String, Value>,
        path: &str,
        field: &str,
    ) -> Option<&'a str> {
        match object.get(field) {
            None | Some(Value::Null) => {
                self.errors
                    .push(format!("{path}.{field}: missing required field"));
                None
            }
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                self.type_mismatch(&format!("{path}.{field}"), "string", other);
                None
            }
        }
    }

    fn optional_string<'a>(
        &mut self,
        object: &'a Map<String, Value>,
        path: &str,
        field: &str,
    ) -> Option<&'a str> {
        match object.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                self.type_mismatch(&format!("{path}.{field}"), "string", other);
                None
            }
        }
    }

    fn check_duration(&mut self, path: &str, duration: &str) {
        if parse_clock_duration(duration).is_none() {
            self.errors.push(format!(
                "{path}: invalid duration '{duration}', expected HH:MM:SS"
            ));
        }
    }

    fn check_id<'a>(&mut self, path: &str, id: &'a str, seen: &mut HashSet<&'a str>, kind: &str) {
        if id.is_empty() {
            self.errors.push(format!("{path}.id: {kind} id cannot be empty"));
        } else if !seen.insert(id) {
            self.errors
                .push(format!("{path}.id: duplicate {kind} id '{id}'"));
        }
    }

    fn type_mismatch(&mut self, path: &str, expected: &str, found: &Value) {
        self.errors.push(format!(
            "{path}: expected {expected}, found {}",
            json_type_name(found)
        ));
    }
}

/// Collects string ids from an array section, ignoring malformed entries
/// (those are reported when the section itself is validated).
fn collect_ids(section: Option<&Value>) -> HashSet<String> {
    section
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Returns the JSON type name used in validation messages.
#[must_use]
pub const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "general": {"name": "Escape X", "duration": "00:30:00", "host": "localhost", "port": 1883},
            "cameras": [{"name": "camera1", "link": "https://cams.local/1"}],
            "devices": [{"id": "telephone"}, {"id": "display", "category": "display", "push_status": true}],
            "timers": [{"id": "timer1", "duration": "00:00:10", "event": "rule"}],
            "events": [{"id": "rule", "description": "Solve it."}],
            "hints": {"Telephone": ["Press the button"]}
        })
    }

    #[test]
    fn valid_document_has_no_errors() {
        assert!(validate_document(&valid_document()).is_empty());
    }

    #[test]
    fn non_object_root() {
        assert_eq!(
            validate_document(&json!([1, 2])),
            vec!["<root>: expected object, found array"]
        );
    }

    #[test]
    fn duration_type_mismatch_is_one_descriptive_error() {
        let mut doc = valid_document();
        doc["general"]["duration"] = json!(1800);
        assert_eq!(
            validate_document(&doc),
            vec!["general.duration: expected string, found number"]
        );
    }

    #[test]
    fn missing_sections_reported_in_order() {
        let errors = validate_document(&json!({"general": {"name": "x", "duration": "00:00:01"}}));
        assert_eq!(
            errors,
            vec![
                "missing required section 'devices'",
                "missing required section 'timers'",
                "missing required section 'events'",
                "missing required section 'hints'",
                "missing required section 'cameras'",
            ]
        );
    }

    #[test]
    fn duplicate_and_empty_ids() {
        let mut doc = valid_document();
        doc["devices"] = json!([{"id": "a"}, {"id": "a"}, {"id": ""}]);
        assert_eq!(
            validate_document(&doc),
            vec![
                "devices[1].id: duplicate device id 'a'",
                "devices[2].id: device id cannot be empty",
            ]
        );
    }

    #[test]
    fn reserved_and_dangling_timer_references() {
        let mut doc = valid_document();
        doc["timers"] = json!([
            {"id": "general", "duration": "00:01:00"},
            {"id": "t", "duration": "1 minute", "event": "nope"}
        ]);
        assert_eq!(
            validate_document(&doc),
            vec![
                "timers[0].id: 'general' is reserved for the room timer",
                "timers[1].duration: invalid duration '1 minute', expected HH:MM:SS",
                "timers[1].event: unknown event 'nope'",
            ]
        );
    }

    #[test]
    fn hint_entries_must_be_strings() {
        let mut doc = valid_document();
        doc["hints"] = json!({"Group": ["ok", 3], "Other": "not a list"});
        assert_eq!(
            validate_document(&doc),
            vec![
                "hints.Group[1]: expected string, found number",
                "hints.Other: expected array, found string",
            ]
        );
    }

    #[test]
    fn port_out_of_range() {
        let mut doc = valid_document();
        doc["general"]["port"] = json!(70000);
        assert_eq!(
            validate_document(&doc),
            vec!["general.port: 70000 is out of range, expected 0-65535"]
        );
    }

    #[test]
    fn null_optional_fields_are_accepted() {
        let mut doc = valid_document();
        doc["general"]["host"] = Value::Null;
        doc["devices"][0]["category"] = Value::Null;
        doc["devices"][1]["push_status"] = Value::Null;
        assert!(validate_document(&doc).is_empty());
        assert!(crate::config::schema::GameConfig::from_value(doc).is_ok());
    }

    #[test]
    fn validation_is_deterministic() {
        let doc = json!({"general": [], "devices": {}, "timers": 1, "events": null, "hints": [], "cameras": {}});
        let first = validate_document(&doc);
        assert_eq!(first.len(), 6);
        assert_eq!(first, validate_document(&doc));
    }

    #[test]
    fn valid_documents_deserialize() {
        let config = crate::config::schema::GameConfig::from_value(valid_document());
        assert!(config.is_ok());
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z:0-9]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(
                    (
                        prop_oneof![
                            Just("general".to_string()),
                            Just("devices".to_string()),
                            Just("timers".to_string()),
                            Just("id".to_string()),
                            Just("duration".to_string()),
                            "[a-z]{1,6}",
                        ],
                        inner
                    ),
                    0..6
                )
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
            ]
        })
    }

    /// Fields of [`valid_document`] as (parent pointer, key) pairs.
    const FIELDS: [(&str, &str); 22] = [
        ("", "devices"),
        ("", "hints"),
        ("", "cameras"),
        ("/general", "name"),
        ("/general", "duration"),
        ("/general", "host"),
        ("/general", "port"),
        ("/devices", "0"),
        ("/devices/0", "id"),
        ("/devices/0", "category"),
        ("/devices/0", "description"),
        ("/devices/0", "push_status"),
        ("/devices/1", "push_status"),
        ("/timers/0", "id"),
        ("/timers/0", "duration"),
        ("/timers/0", "event"),
        ("/events/0", "id"),
        ("/events/0", "description"),
        ("/hints", "Telephone"),
        ("/hints/Telephone", "0"),
        ("/cameras/0", "name"),
        ("/cameras/0", "link"),
    ];

    /// Sets (or with `None`, removes) one field of `doc`.
    fn set_field(doc: &mut Value, parent: &str, key: &str, value: Option<Value>) {
        match doc.pointer_mut(parent) {
            Some(Value::Object(map)) => match value {
                Some(v) => {
                    map.insert(key.to_string(), v);
                }
                None => {
                    map.remove(key);
                }
            },
            Some(Value::Array(items)) => {
                if let (Ok(idx), Some(v)) = (key.parse::<usize>(), value) {
                    if let Some(slot) = items.get_mut(idx) {
                        *slot = v;
                    }
                }
            }
            _ => {}
        }
    }

    fn arb_field_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            (0u64..70_000).prop_map(|n| json!(n)),
            prop_oneof![
                Just("general".to_string()),
                Just("rule".to_string()),
                Just("00:00:05".to_string()),
                Just(String::new()),
                "[a-z:0-9]{0,8}",
            ]
            .prop_map(Value::String),
            prop::collection::vec("[a-z]{0,4}".prop_map(Value::String), 0..3).prop_map(Value::Array),
            Just(json!({})),
        ]
    }

    proptest! {
        #[test]
        fn single_field_change_keeps_validator_and_schema_agreeing(
            field in 0..FIELDS.len(),
            value in prop::option::of(arb_field_value()),
        ) {
            let (parent, key) = FIELDS[field];
            let mut doc = valid_document();
            set_field(&mut doc, parent, key, value);
            if validate_document(&doc).is_empty() {
                let config = crate::config::schema::GameConfig::from_value(doc);
                prop_assert!(config.is_ok(), "{:?}", config);
                let state = crate::store::GameState::from_config(config.unwrap(), "front-end");
                prop_assert!(state.is_ok());
            }
        }

        #[test]
        fn never_panics_and_is_deterministic(doc in arb_json()) {
            let first = validate_document(&doc);
            prop_assert_eq!(first, validate_document(&doc));
        }

        #[test]
        fn empty_error_list_means_deserializable(doc in arb_json()) {
            if validate_document(&doc).is_empty() {
                prop_assert!(crate::config::schema::GameConfig::from_value(doc).is_ok());
            }
        }
    }
}
