//! Shadow topic names.
//!
//! All shadow traffic for a thing lives under `$aws/things/<thing>/shadow/`.
//! The device publishes to `update` and subscribes to `update/delta`; the
//! remaining suffixes are recognised so inbound traffic can be classified
//! and logged rather than misrouted.

use std::fmt;

const PREFIX: &str = "$aws/things/";
const SHADOW_SEGMENT: &str = "/shadow/";

/// Kind of shadow message a topic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowMessageType {
    /// `update`
    Update,
    /// `update/accepted`
    UpdateAccepted,
    /// `update/rejected`
    UpdateRejected,
    /// `update/delta`
    UpdateDelta,
    /// `update/documents`
    UpdateDocuments,
    /// `get`
    Get,
    /// `get/accepted`
    GetAccepted,
    /// `get/rejected`
    GetRejected,
    /// `delete`
    Delete,
    /// `delete/accepted`
    DeleteAccepted,
    /// `delete/rejected`
    DeleteRejected,
}

impl ShadowMessageType {
    const ALL: [Self; 11] = [
        Self::Update,
        Self::UpdateAccepted,
        Self::UpdateRejected,
        Self::UpdateDelta,
        Self::UpdateDocuments,
        Self::Get,
        Self::GetAccepted,
        Self::GetRejected,
        Self::Delete,
        Self::DeleteAccepted,
        Self::DeleteRejected,
    ];

    /// Topic suffix after `/shadow/`.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::UpdateAccepted => "update/accepted",
            Self::UpdateRejected => "update/rejected",
            Self::UpdateDelta => "update/delta",
            Self::UpdateDocuments => "update/documents",
            Self::Get => "get",
            Self::GetAccepted => "get/accepted",
            Self::GetRejected => "get/rejected",
            Self::Delete => "delete",
            Self::DeleteAccepted => "delete/accepted",
            Self::DeleteRejected => "delete/rejected",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.suffix() == suffix)
    }
}

impl fmt::Display for ShadowMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Topic builder and matcher for one thing's shadow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowTopic {
    thing_name: String,
}

impl ShadowTopic {
    /// Topics for `thing_name`.
    pub fn new(thing_name: impl Into<String>) -> Self {
        Self { thing_name: thing_name.into() }
    }

    /// The thing these topics address.
    pub fn thing_name(&self) -> &str {
        &self.thing_name
    }

    /// Full topic string for a message type.
    pub fn topic(&self, kind: ShadowMessageType) -> String {
        format!("{PREFIX}{}{SHADOW_SEGMENT}{}", self.thing_name, kind.suffix())
    }

    /// Topic the device publishes its updates to.
    pub fn update(&self) -> String {
        self.topic(ShadowMessageType::Update)
    }

    /// Topic the device subscribes to for deltas.
    pub fn update_delta(&self) -> String {
        self.topic(ShadowMessageType::UpdateDelta)
    }

    /// Classify an arbitrary topic.
    ///
    /// Returns the thing name and message type, or `None` when the topic is
    /// not a shadow topic at all.
    pub fn parse(topic: &str) -> Option<(&str, ShadowMessageType)> {
        let rest = topic.strip_prefix(PREFIX)?;
        let (thing, suffix) = rest.split_once(SHADOW_SEGMENT)?;
        if thing.is_empty() || thing.contains('/') {
            return None;
        }
        ShadowMessageType::from_suffix(suffix).map(|kind| (thing, kind))
    }

    /// Classify a topic, keeping only messages addressed to this thing.
    pub fn match_own(&self, topic: &str) -> Option<ShadowMessageType> {
        match Self::parse(topic) {
            Some((thing, kind)) if thing == self.thing_name => Some(kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_update_topics() {
        let topics = ShadowTopic::new("lock-01");
        assert_eq!(topics.update(), "$aws/things/lock-01/shadow/update");
        assert_eq!(topics.update_delta(), "$aws/things/lock-01/shadow/update/delta");
    }

    #[test]
    fn parses_every_message_type() {
        let topics = ShadowTopic::new("lock-01");
        for kind in ShadowMessageType::ALL {
            let topic = topics.topic(kind);
            assert_eq!(ShadowTopic::parse(&topic), Some(("lock-01", kind)));
        }
    }

    #[test]
    fn rejects_foreign_topics() {
        assert_eq!(ShadowTopic::parse("sensors/temperature"), None);
        assert_eq!(ShadowTopic::parse("$aws/things/lock-01/shadow/unknown"), None);
        assert_eq!(ShadowTopic::parse("$aws/things//shadow/update"), None);
        assert_eq!(ShadowTopic::parse("$aws/things/a/b/shadow/update"), None);
    }

    #[test]
    fn match_own_filters_other_things() {
        let topics = ShadowTopic::new("lock-01");
        let other = ShadowTopic::new("lock-02");
        assert_eq!(topics.match_own(&topics.update_delta()), Some(ShadowMessageType::UpdateDelta));
        assert_eq!(topics.match_own(&other.update_delta()), None);
    }
}
