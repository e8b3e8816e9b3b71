//! Personality profile of the player as judged by the remote service

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::state::clamp_f32;

/// Trait scores in `[0, 1]` plus an overall confidence. Replaced wholesale on
/// every refresh, never merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalityProfile {
    pub traits: BTreeMap<String, f32>,
    pub confidence: f32,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatedPersonality {
    pub traits: BTreeMap<String, f32>,
    #[serde(default)]
    pub confidence: f32,
}

/// Accepted response shapes: wrapped, pre-aggregated or raw trait scores
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PersonalityPayload {
    Wrapped { personality: AggregatedPersonality },
    Aggregated(AggregatedPersonality),
    Raw(BTreeMap<String, Value>),
}

impl PersonalityPayload {
    pub fn into_profile(self) -> PersonalityProfile {
        let (traits, confidence) = match self {
            PersonalityPayload::Wrapped { personality } | PersonalityPayload::Aggregated(personality) => {
                (personality.traits, personality.confidence)
            }
            PersonalityPayload::Raw(map) => {
                let mut confidence = 0.0;
                let mut traits = BTreeMap::new();
                for (name, value) in map {
                    let Some(score) = value.as_f64() else { continue };
                    if name == "confidence" {
                        confidence = score as f32;
                    } else {
                        traits.insert(name, score as f32);
                    }
                }
                (traits, confidence)
            }
        };

        PersonalityProfile {
            traits: traits
                .into_iter()
                .map(|(name, score)| (name, clamp_f32(score, 0.0, 1.0)))
                .collect(),
            confidence: clamp_f32(confidence, 0.0, 1.0),
            received_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aggregated_and_wrapped_shapes_parse() {
        let aggregated: PersonalityPayload =
            serde_json::from_value(json!({ "traits": { "patience": 0.2 }, "confidence": 0.9 })).unwrap();
        let profile = aggregated.into_profile();
        assert_eq!(profile.traits["patience"], 0.2);
        assert_eq!(profile.confidence, 0.9);

        let wrapped: PersonalityPayload =
            serde_json::from_value(json!({ "personality": { "traits": { "risk": 1.4 } } })).unwrap();
        let profile = wrapped.into_profile();
        assert_eq!(profile.traits["risk"], 1.0);
        assert_eq!(profile.confidence, 0.0);
    }

    #[test]
    fn raw_scores_skip_non_numeric_entries() {
        let raw: PersonalityPayload = serde_json::from_value(json!({
            "aggression": -0.5,
            "label": "bold",
            "confidence": 0.6
        }))
        .unwrap();
        let profile = raw.into_profile();
        assert_eq!(profile.traits.len(), 1);
        assert_eq!(profile.traits["aggression"], 0.0);
        assert_eq!(profile.confidence, 0.6);
    }
}
