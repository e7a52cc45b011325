use serde::{Deserialize, Serialize};

/// Categorical outcome of a verification. Serialized in the upper-case wire
/// form consumed by catalogue frontends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Authentic,
    Suspicious,
    Counterfeit,
}

impl Verdict {
    pub fn from_confidence(confidence: f64, authentic: f64, suspicious: f64) -> Self {
        if confidence >= authentic {
            Verdict::Authentic
        } else if confidence >= suspicious {
            Verdict::Suspicious
        } else {
            Verdict::Counterfeit
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentMethod {
    Perspective,
    Affine,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub moire: f64,
    pub color: f64,
    pub correlation: f64,
    pub gradient: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub moire: f64,
    pub color: f64,
    pub correlation: f64,
    pub gradient: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            moire: 0.40,
            color: 0.30,
            correlation: 0.20,
            gradient: 0.10,
        }
    }
}

impl ScoreWeights {
    pub fn combine(&self, scores: &SubScores) -> f64 {
        self.moire * scores.moire
            + self.color * scores.color
            + self.correlation * scores.correlation
            + self.gradient * scores.gradient
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verdict: Verdict,
    pub confidence: f64,
    pub scores: SubScores,
    pub weights: ScoreWeights,
    pub markers_found: u32,
    pub alignment_method: AlignmentMethod,
    pub pattern_found: bool,
}

impl VerificationReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_thresholds() {
        assert_eq!(
            Verdict::from_confidence(0.70, 0.70, 0.50),
            Verdict::Authentic
        );
        assert_eq!(
            Verdict::from_confidence(0.69, 0.70, 0.50),
            Verdict::Suspicious
        );
        assert_eq!(
            Verdict::from_confidence(0.50, 0.70, 0.50),
            Verdict::Suspicious
        );
        assert_eq!(
            Verdict::from_confidence(0.49, 0.70, 0.50),
            Verdict::Counterfeit
        );
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ScoreWeights::default();
        let sum = w.moire + w.color + w.correlation + w.gradient;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_wire_form() {
        let report = VerificationReport {
            verdict: Verdict::Authentic,
            confidence: 0.97,
            scores: SubScores {
                moire: 1.0,
                color: 0.95,
                correlation: 1.0,
                gradient: 0.9,
            },
            weights: ScoreWeights::default(),
            markers_found: 4,
            alignment_method: AlignmentMethod::Perspective,
            pattern_found: true,
        };

        let json = report.to_json().unwrap();
        assert!(json.contains("\"AUTHENTIC\""));
        assert!(json.contains("\"perspective\""));
        assert!(json.contains("\"markers_found\": 4"));
    }

    #[test]
    fn test_combine_is_the_weighted_sum() {
        let scores = SubScores {
            moire: 0.5,
            color: 0.5,
            correlation: 0.5,
            gradient: 0.5,
        };
        let confidence = ScoreWeights::default().combine(&scores);
        assert!((confidence - 0.5).abs() < 1e-9);
    }
}
