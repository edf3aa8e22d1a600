//! Configuration instructions: `check config` and `use config`.

use serde_json::Value;
use tracing::{info, warn};

use super::{HandlerContext, HandlerResult};
use crate::config::schema::GameConfig;
use crate::config::validate_document;
use crate::message::{ConfigReply, MessageKind};
use crate::observability::metrics;

/// Validates a proposed configuration and replies with the error list
/// (empty when valid). Never touches the store.
///
/// # Errors
///
/// Only fails if encoding the reply fails.
pub fn check_config(ctx: &HandlerContext, requester: &str, config: &Value) -> HandlerResult {
    let errors = validate_document(config);
    info!(requester, errors = errors.len(), "configuration checked");
    Ok(vec![ctx.message(
        requester,
        MessageKind::Config,
        &ConfigReply::errors(errors),
    )?])
}

/// Validates, persists and swaps in a new configuration.
///
/// An invalid document gets the same error list `check config` would
/// produce. A document that fails to persist is reported the same way. In
/// both cases the store keeps the current configuration.
///
/// # Errors
///
/// Only fails if encoding the reply fails.
pub fn use_config(ctx: &HandlerContext, requester: &str, config: &Value) -> HandlerResult {
    let reply = match apply(ctx, config) {
        Ok(()) => {
            metrics::record_config_swap(true);
            ConfigReply::accepted()
        }
        Err(errors) => {
            metrics::record_config_swap(false);
            warn!(requester, errors = errors.len(), "configuration rejected");
            ConfigReply::errors(errors)
        }
    };
    Ok(vec![ctx.message(requester, MessageKind::Config, &reply)?])
}

fn apply(ctx: &HandlerContext, document: &Value) -> Result<(), Vec<String>> {
    let errors = validate_document(document);
    if !errors.is_empty() {
        return Err(errors);
    }
    let config = GameConfig::from_value(document.clone()).map_err(|e| vec![e.to_string()])?;
    ctx.store
        .replace_config(config)
        .map_err(|e| vec![e.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::handlers::HandlerContext;
    use crate::handlers::test_support::{context, room};
    use crate::store::GameStore;
    use crate::timer::TimerEngine;
    use serde_json::json;
    use std::sync::Arc;

    fn valid_document(name: &str) -> Value {
        let mut document = serde_json::to_value(room()).unwrap();
        document["general"]["name"] = json!(name);
        document
    }

    fn invalid_document() -> Value {
        let mut document = valid_document("Broken");
        document["general"]["duration"] = json!(3600);
        document
    }

    #[test]
    fn check_valid_config_replies_empty_list() {
        let ctx = context();
        let out = check_config(&ctx, "front-end", &valid_document("Other")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].topic, "front-end");
        assert_eq!(out[0].message.kind, "config");
        assert_eq!(out[0].message.contents, json!({"errors": []}));
    }

    #[test]
    fn check_config_leaves_store_untouched() {
        let ctx = context();
        let before = ctx.store.config_document().unwrap();
        check_config(&ctx, "front-end", &valid_document("Other")).unwrap();
        check_config(&ctx, "front-end", &invalid_document()).unwrap();
        assert_eq!(ctx.store.config_document().unwrap(), before);
    }

    #[test]
    fn check_invalid_config_lists_errors() {
        let ctx = context();
        let out = check_config(&ctx, "front-end", &invalid_document()).unwrap();
        assert_eq!(
            out[0].message.contents,
            json!({"errors": ["general.duration: expected string, found number"]})
        );
    }

    #[test]
    fn use_valid_config_swaps() {
        let ctx = context();
        let out = use_config(&ctx, "front-end", &valid_document("Other")).unwrap();
        assert_eq!(out[0].message.contents, json!({}));
        assert_eq!(ctx.store.config().general.name, "Other");
    }

    #[test]
    fn use_invalid_config_matches_check() {
        let ctx = context();
        let before = ctx.store.config_document().unwrap();
        let checked = check_config(&ctx, "front-end", &invalid_document()).unwrap();
        let used = use_config(&ctx, "front-end", &invalid_document()).unwrap();
        assert_eq!(checked[0].message.contents, used[0].message.contents);
        assert_eq!(ctx.store.config_document().unwrap(), before);
    }

    #[test]
    fn use_config_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.json");
        let store = Arc::new(
            GameStore::new(room())
                .unwrap()
                .with_persistence(ConfigLoader::new(&path)),
        );
        let timers = Arc::new(TimerEngine::new(Arc::clone(&store)));
        let ctx = HandlerContext::new(store, timers, "back-end");

        use_config(&ctx, "front-end", &valid_document("Persisted")).unwrap();
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["general"]["name"], "Persisted");
    }

    #[test]
    fn persist_failure_is_reported_and_store_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("room.json");
        let store = Arc::new(
            GameStore::new(room())
                .unwrap()
                .with_persistence(ConfigLoader::new(&path)),
        );
        let timers = Arc::new(TimerEngine::new(Arc::clone(&store)));
        let ctx = HandlerContext::new(Arc::clone(&store), timers, "back-end");
        let before = store.config_document().unwrap();

        let out = use_config(&ctx, "front-end", &valid_document("Lost")).unwrap();
        let errors = out[0].message.contents["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(
            errors[0]
                .as_str()
                .unwrap()
                .starts_with("failed to persist configuration")
        );
        assert_eq!(store.config_document().unwrap(), before);
    }
}
