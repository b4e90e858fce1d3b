use crate::crawl::CrawlTarget;
use serde_json::{Map, Value};

/// Site-specific payload extraction seam
///
/// Parsing rules for any concrete site live outside this core; the
/// orchestrator only needs a body turned into a field map or a reason
/// it could not be.
pub trait ParsePayload: Send + Sync {
    fn parse(&self, target: &CrawlTarget, body: &str) -> std::result::Result<Map<String, Value>, String>;
}

/// Default wiring when no site parser is registered: keeps the raw
/// body so a later parser pass can reprocess the checkpoint
pub struct RawBodyParser;

impl ParsePayload for RawBodyParser {
    fn parse(
        &self,
        _target: &CrawlTarget,
        body: &str,
    ) -> std::result::Result<Map<String, Value>, String> {
        let mut payload = Map::new();
        payload.insert(
            "content_length".to_string(),
            Value::Number(body.len().into()),
        );
        payload.insert("body".to_string(), Value::String(body.to_string()));
        Ok(payload)
    }
}
