//! # Topics
//!
//! A [`Topic`] is a logical destination. Concrete transport subjects are
//! derived from it:
//!
//! | Derivation      | Subject              |
//! |-----------------|----------------------|
//! | `req`           | `T.REQ`              |
//! | `res`           | `T.RES`              |
//! | `res_unique`    | `T.RES.<uuid>`       |
//! | `res_wildcard`  | `T.RES.*`            |
//! | `stream`        | `T.STREAM.<uuid>`    |
//! | `heartbeat`     | `T.HEARTBEAT.<uuid>` |
//!
//! A topic that already carries a `REQ` or `RES` segment cannot be derived
//! again. Every derivation returns [`TopicError::AlreadyDerived`] in that case.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

const REQ: &str = "REQ";
const RES: &str = "RES";
const STREAM: &str = "STREAM";
const HEARTBEAT: &str = "HEARTBEAT";

/// Errors from topic derivation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// The topic is already a request or response subject.
    #[error("Unable to transform topic to {derivation}: {topic} is already a request/response subject")]
    AlreadyDerived {
        topic: String,
        derivation: &'static str,
    },
}

/// A named destination from which subjects are derived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the topic as a subject string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Subject for competing-consumer requests.
    pub fn req(&self) -> Result<Topic, TopicError> {
        self.derive(".REQ", format_args!("{REQ}"))
    }

    /// Generic response-family subject.
    pub fn res(&self) -> Result<Topic, TopicError> {
        self.derive(".RES", format_args!("{RES}"))
    }

    /// One-shot reply address, unique per call.
    pub fn res_unique(&self) -> Result<Topic, TopicError> {
        self.derive(".RES.<uuid>", format_args!("{RES}.{}", Uuid::new_v4()))
    }

    /// Matches every reply routed to requests on this topic.
    pub fn res_wildcard(&self) -> Result<Topic, TopicError> {
        self.derive(".RES.*", format_args!("{RES}.*"))
    }

    /// Unique broadcast subject for one producer instance.
    pub fn stream(&self) -> Result<Topic, TopicError> {
        self.derive(".STREAM.<uuid>", format_args!("{STREAM}.{}", Uuid::new_v4()))
    }

    /// Unique liveness-probe subject for one producer instance.
    pub fn heartbeat(&self) -> Result<Topic, TopicError> {
        self.derive(
            ".HEARTBEAT.<uuid>",
            format_args!("{HEARTBEAT}.{}", Uuid::new_v4()),
        )
    }

    /// Whether the topic already carries a `REQ` or `RES` segment.
    #[must_use]
    pub fn is_already_req_res(&self) -> bool {
        self.0.split('.').any(|segment| segment == REQ || segment == RES)
    }

    fn derive(
        &self,
        derivation: &'static str,
        suffix: fmt::Arguments<'_>,
    ) -> Result<Topic, TopicError> {
        if self.is_already_req_res() {
            return Err(TopicError::AlreadyDerived {
                topic: self.0.clone(),
                derivation,
            });
        }
        Ok(Topic(format!("{}.{}", self.0, suffix)))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_req_and_res() {
        let topic = Topic::new("orders");
        assert_eq!(topic.req().unwrap().as_str(), "orders.REQ");
        assert_eq!(topic.res().unwrap().as_str(), "orders.RES");
        assert_eq!(topic.res_wildcard().unwrap().as_str(), "orders.RES.*");
    }

    #[test]
    fn test_res_unique_is_unique() {
        let topic = Topic::new("orders");
        let a = topic.res_unique().unwrap();
        let b = topic.res_unique().unwrap();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("orders.RES."));
        assert!(a.as_str().len() > "orders.RES.".len());
    }

    #[test]
    fn test_stream_and_heartbeat_are_unique() {
        let topic = Topic::new("prices");
        let stream = topic.stream().unwrap();
        let heartbeat = topic.heartbeat().unwrap();

        assert!(stream.as_str().starts_with("prices.STREAM."));
        assert!(heartbeat.as_str().starts_with("prices.HEARTBEAT."));
        assert_ne!(stream, topic.stream().unwrap());
        assert_ne!(heartbeat, topic.heartbeat().unwrap());
    }

    #[test]
    fn test_derived_topics_can_still_take_req() {
        let heartbeat = Topic::new("prices").heartbeat().unwrap();
        let req = heartbeat.req().unwrap();
        assert!(req.as_str().ends_with(".REQ"));
    }

    #[test]
    fn test_double_derivation_rejected() {
        let topic = Topic::new("orders");
        let req = topic.req().unwrap();
        let res = topic.res().unwrap();

        assert!(matches!(
            req.req(),
            Err(TopicError::AlreadyDerived { .. })
        ));
        assert!(res.res_unique().is_err());
        assert!(res.req().is_err());
        assert!(req.res_wildcard().is_err());
        assert!(req.stream().is_err());
        assert!(res.heartbeat().is_err());
        assert!(topic.res_unique().unwrap().req().is_err());
    }

    #[test]
    fn test_reserved_segment_not_substring() {
        // Only whole segments count as reserved.
        let topic = Topic::new("REQUESTS.RESULTS");
        assert!(!topic.is_already_req_res());
        assert_eq!(topic.req().unwrap().as_str(), "REQUESTS.RESULTS.REQ");

        assert!(Topic::new("a.RESULTS").req().is_ok());
        assert!(Topic::new("REQ").req().is_err());
        assert!(Topic::new("a.RES.b").heartbeat().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let topic = Topic::new("orders");
        let json = serde_json::to_string(&topic).unwrap();
        assert_eq!(json, "\"orders\"");
        let back: Topic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, topic);
    }
}
