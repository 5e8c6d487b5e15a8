// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Inbound signal events
//!
//! [`SignalEnvelope`] is the loosely-typed shape accepted at the producer
//! boundary (every field optional, as it arrives over the wire).
//! [`SignalEvent`] is the checked form consumed by the aggregation field.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Arousal, valence and dominance, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affect {
    pub arousal: f64,
    pub valence: f64,
    pub dominance: f64,
}

impl Affect {
    pub fn new(arousal: f64, valence: f64, dominance: f64) -> Self {
        Self { arousal, valence, dominance }
    }

    pub fn components(&self) -> [f64; 3] {
        [self.arousal, self.valence, self.dominance]
    }
}

impl Default for Affect {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.5)
    }
}

/// A single interaction signal from one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    /// Named non-negative weights; they need not sum to one.
    pub elemental_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub active_tags: BTreeSet<String>,
    pub affect: Affect,
    pub quality_score: f64,
    pub confidence: f64,
    /// Transcribed utterance, if the front end supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl SignalEvent {
    pub fn new(session_id: SessionId, timestamp: DateTime<Utc>) -> Self {
        Self {
            session_id,
            timestamp,
            elemental_weights: BTreeMap::new(),
            active_tags: BTreeSet::new(),
            affect: Affect::default(),
            quality_score: 1.0,
            confidence: 1.0,
            text: None,
        }
    }

    pub fn with_weight(mut self, label: impl Into<String>, weight: f64) -> Self {
        self.elemental_weights.insert(label.into(), weight);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.active_tags.insert(tag.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_affect(mut self, affect: Affect) -> Self {
        self.affect = affect;
        self
    }

    pub fn with_quality(mut self, quality_score: f64) -> Self {
        self.quality_score = quality_score;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Check every bounded field. Nothing is mutated on failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.session_id.0.trim().is_empty() {
            return Err(ValidationError::MissingField("session_id"));
        }

        check_unit("quality_score", self.quality_score)?;
        check_unit("confidence", self.confidence)?;
        check_unit("affect.arousal", self.affect.arousal)?;
        check_unit("affect.valence", self.affect.valence)?;
        check_unit("affect.dominance", self.affect.dominance)?;

        Ok(())
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value })
    }
}

/// Wire shape of a signal as produced by the conversational front end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalEnvelope {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub elemental_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub active_tags: BTreeSet<String>,
    #[serde(default)]
    pub affect: Option<Affect>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
}

impl TryFrom<SignalEnvelope> for SignalEvent {
    type Error = ValidationError;

    fn try_from(envelope: SignalEnvelope) -> Result<Self, Self::Error> {
        let session_id = envelope
            .session_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ValidationError::MissingField("session_id"))?;
        let timestamp = envelope
            .timestamp
            .ok_or(ValidationError::MissingField("timestamp"))?;

        let event = SignalEvent {
            session_id: SessionId(session_id),
            timestamp,
            elemental_weights: envelope.elemental_weights,
            active_tags: envelope.active_tags,
            affect: envelope
                .affect
                .ok_or(ValidationError::MissingField("affect"))?,
            quality_score: envelope
                .quality_score
                .ok_or(ValidationError::MissingField("quality_score"))?,
            confidence: envelope
                .confidence
                .ok_or(ValidationError::MissingField("confidence"))?,
            text: envelope.text,
        };

        event.validate()?;
        Ok(event)
    }
}

/// Stages a signal passes through on its way into the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Received,
    Validated,
    Enriched,
    Folded,
    Published,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Validated => "validated",
            IngestStage::Enriched => "enriched",
            IngestStage::Folded => "folded",
            IngestStage::Published => "published",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> SignalEvent {
        SignalEvent::new(SessionId::new("s-1"), Utc::now()).with_weight("fire", 1.0)
    }

    #[test]
    fn test_valid_event_passes() {
        assert!(event().validate().is_ok());
    }

    #[test]
    fn test_quality_out_of_range_rejected() {
        let err = event().with_quality(1.5).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRange { field: "quality_score", value: 1.5 }
        );
    }

    #[test]
    fn test_nan_affect_rejected() {
        let err = event()
            .with_affect(Affect::new(0.2, f64::NAN, 0.3))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange { field: "affect.valence", .. }
        ));
    }

    #[test]
    fn test_blank_session_rejected() {
        let mut e = event();
        e.session_id = SessionId::new("  ");
        assert_eq!(e.validate(), Err(ValidationError::MissingField("session_id")));
    }

    #[test]
    fn test_envelope_missing_timestamp() {
        let json = r#"{
            "session_id": "abc",
            "affect": {"arousal": 0.1, "valence": 0.2, "dominance": 0.3},
            "quality_score": 0.9,
            "confidence": 0.8
        }"#;
        let envelope: SignalEnvelope = serde_json::from_str(json).unwrap();
        let err = SignalEvent::try_from(envelope).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("timestamp"));
    }

    #[test]
    fn test_envelope_converts() {
        let json = r#"{
            "session_id": "abc",
            "timestamp": "2026-03-01T10:00:00Z",
            "elemental_weights": {"water": 0.7, "air": 0.3},
            "active_tags": ["ocean"],
            "affect": {"arousal": 0.1, "valence": 0.2, "dominance": 0.3},
            "quality_score": 0.9,
            "confidence": 0.8,
            "text": "the ocean was calm"
        }"#;
        let envelope: SignalEnvelope = serde_json::from_str(json).unwrap();
        let event = SignalEvent::try_from(envelope).unwrap();

        assert_eq!(event.session_id.as_str(), "abc");
        assert_eq!(event.elemental_weights.len(), 2);
        assert!(event.active_tags.contains("ocean"));
        assert_eq!(event.text.as_deref(), Some("the ocean was calm"));
    }
}
