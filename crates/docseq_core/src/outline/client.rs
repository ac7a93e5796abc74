//! JSON collaborator built on an explicit `ServiceConfig`.
//!
//! # Responsibility
//! - Validate configuration once, at construction.
//! - Encode outline/segmentation requests as JSON and decode the replies.
//! - Map transport failures onto `ExternalServiceError`.
//!
//! # Invariants
//! - A client never exists with an unusable configuration.
//! - A reply that arrives after `config.timeout` counts as a timeout.

use crate::outline::model::{NodePreview, OutlineDraft, Segment};
use crate::outline::service::{
    ExternalServiceError, OutlineService, SegmentationService, ServiceConfig,
};
use log::{debug, warn};
use serde_json::json;
use std::time::Instant;

/// Failure reported by a transport before any reply was decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    TimedOut,
    Failed(String),
}

/// Carries one JSON request to the model endpoint and returns the raw body.
pub trait JsonTransport {
    fn send(&self, config: &ServiceConfig, payload: &str) -> Result<String, TransportFailure>;
}

/// Outline and segmentation collaborator speaking JSON over `T`.
pub struct JsonServiceClient<T: JsonTransport> {
    config: ServiceConfig,
    transport: T,
}

impl<T: JsonTransport> JsonServiceClient<T> {
    /// # Errors
    /// - `ExternalServiceError::NotConfigured` when the key, model, or
    ///   timeout is unusable.
    pub fn new(config: ServiceConfig, transport: T) -> Result<Self, ExternalServiceError> {
        config.ensure_configured()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn call(&self, kind: &'static str, payload: &str) -> Result<String, ExternalServiceError> {
        let started = Instant::now();
        let reply = self.transport.send(&self.config, payload);
        let elapsed = started.elapsed();

        let body = match reply {
            Ok(_) if elapsed > self.config.timeout => Err(self.config.timeout_error()),
            Ok(body) => Ok(body),
            Err(TransportFailure::TimedOut) => Err(self.config.timeout_error()),
            Err(TransportFailure::Failed(message)) => {
                Err(ExternalServiceError::Unavailable(message))
            }
        };
        match &body {
            Ok(_) => debug!(
                "event=collaborator_call module=outline status=ok kind={kind} model={} duration_ms={}",
                self.config.model,
                elapsed.as_millis()
            ),
            Err(err) => warn!(
                "event=collaborator_call module=outline status=error kind={kind} model={} duration_ms={} error_code={}",
                self.config.model,
                elapsed.as_millis(),
                err.code()
            ),
        }
        body
    }
}

impl<T: JsonTransport> OutlineService for JsonServiceClient<T> {
    fn outline(&self, previews: &[NodePreview]) -> Result<OutlineDraft, ExternalServiceError> {
        let payload = json!({
            "model": self.config.model,
            "previews": previews,
        });
        let body = self.call("outline", &payload.to_string())?;
        OutlineDraft::from_json(&body)
    }
}

impl<T: JsonTransport> SegmentationService for JsonServiceClient<T> {
    fn segment(&self, text: &str) -> Result<Vec<Segment>, ExternalServiceError> {
        let payload = json!({
            "model": self.config.model,
            "text": text,
        });
        let body = self.call("segment", &payload.to_string())?;
        Segment::list_from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonServiceClient, JsonTransport, TransportFailure};
    use crate::outline::model::NodePreview;
    use crate::outline::service::{
        ExternalServiceError, OutlineService, SegmentationService, ServiceConfig,
    };
    use std::cell::RefCell;
    use std::time::Duration;

    struct Canned {
        reply: Result<String, TransportFailure>,
        delay: Duration,
        sent: RefCell<Vec<String>>,
    }

    impl Canned {
        fn replying(body: &str) -> Self {
            Self {
                reply: Ok(body.to_string()),
                delay: Duration::ZERO,
                sent: RefCell::new(Vec::new()),
            }
        }

        fn failing(failure: TransportFailure) -> Self {
            Self {
                reply: Err(failure),
                delay: Duration::ZERO,
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl JsonTransport for &Canned {
        fn send(&self, _config: &ServiceConfig, payload: &str) -> Result<String, TransportFailure> {
            self.sent.borrow_mut().push(payload.to_string());
            std::thread::sleep(self.delay);
            self.reply.clone()
        }
    }

    fn config() -> ServiceConfig {
        ServiceConfig::new("key", "outline-model")
    }

    #[test]
    fn blank_key_is_rejected_at_construction() {
        let transport = Canned::replying("{}");
        let err = JsonServiceClient::new(ServiceConfig::new("", "outline-model"), &transport)
            .err()
            .unwrap();
        assert_eq!(err, ExternalServiceError::NotConfigured("api_key".to_string()));
    }

    #[test]
    fn outline_reply_is_decoded_and_previews_are_sent() {
        let transport = Canned::replying(
            r#"{"title":"Guide","sections":[{"title":"Intro","start_node":1,"end_node":1}]}"#,
        );
        let client = JsonServiceClient::new(config(), &transport).unwrap();
        let previews = vec![NodePreview {
            position: 1,
            content_preview: "Hello".to_string(),
        }];

        let draft = client.outline(&previews).unwrap();
        assert_eq!(draft.title.as_deref(), Some("Guide"));
        assert_eq!(draft.sections.len(), 1);

        let sent: serde_json::Value =
            serde_json::from_str(&transport.sent.borrow()[0]).unwrap();
        assert_eq!(sent["model"], "outline-model");
        assert_eq!(sent["previews"][0]["content_preview"], "Hello");
    }

    #[test]
    fn transport_timeout_uses_configured_limit() {
        let transport = Canned::failing(TransportFailure::TimedOut);
        let client = JsonServiceClient::new(
            config().with_timeout(Duration::from_millis(1500)),
            &transport,
        )
        .unwrap();

        assert_eq!(
            client.segment("text").unwrap_err(),
            ExternalServiceError::Timeout { timeout_ms: 1500 }
        );
    }

    #[test]
    fn late_reply_counts_as_timeout() {
        let mut transport = Canned::replying(r#"{"segments":[]}"#);
        transport.delay = Duration::from_millis(20);
        let client = JsonServiceClient::new(
            config().with_timeout(Duration::from_millis(1)),
            &transport,
        )
        .unwrap();

        assert!(matches!(
            client.segment("text"),
            Err(ExternalServiceError::Timeout { timeout_ms: 1 })
        ));
    }

    #[test]
    fn failed_transport_and_bad_body_map_to_service_errors() {
        let down = Canned::failing(TransportFailure::Failed("connection refused".to_string()));
        let client = JsonServiceClient::new(config(), &down).unwrap();
        assert_eq!(
            client.segment("text").unwrap_err(),
            ExternalServiceError::Unavailable("connection refused".to_string())
        );

        let garbled = Canned::replying("<html>");
        let client = JsonServiceClient::new(config(), &garbled).unwrap();
        assert!(matches!(
            client.outline(&[]),
            Err(ExternalServiceError::InvalidResponse(_))
        ));
    }
}
