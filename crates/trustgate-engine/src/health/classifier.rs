use trustgate_core::settings::TenantSettings;
use trustgate_core::types::{HealthAssessment, HealthSnapshot, HealthStatus};

/// Lowest score still considered healthy.
pub const HEALTHY_MIN_SCORE: f64 = 70.0;
/// Lowest score still considered degraded.
pub const DEGRADED_MIN_SCORE: f64 = 40.0;

/// Map a score to a status using the fixed thresholds.
///
/// Scores are clamped to [0, 100]. A missing or NaN score is `Unknown`.
pub fn classify_score(score: Option<f64>) -> HealthStatus {
    let Some(score) = score.filter(|s| !s.is_nan()) else {
        return HealthStatus::Unknown;
    };
    let score = score.clamp(0.0, 100.0);
    if score >= HEALTHY_MIN_SCORE {
        HealthStatus::Healthy
    } else if score >= DEGRADED_MIN_SCORE {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

/// Health classifier.
///
/// Issues are advisory and never change the status, unless critical issue
/// markers are configured: any issue containing a marker (case-insensitive)
/// demotes the status to `Critical`.
#[derive(Debug, Clone, Default)]
pub struct HealthClassifier {
    critical_markers: Vec<String>,
}

impl HealthClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_critical_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            critical_markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn from_settings(settings: &TenantSettings) -> Self {
        Self::with_critical_markers(&settings.critical_issue_markers)
    }

    pub fn classify(&self, score: Option<f64>, issues: &[String]) -> HealthStatus {
        if self.has_critical_issue(issues) {
            return HealthStatus::Critical;
        }
        classify_score(score)
    }

    pub fn assess(&self, snapshot: &HealthSnapshot) -> HealthAssessment {
        HealthAssessment {
            status: self.classify(snapshot.score, &snapshot.issues),
            score: snapshot.score.filter(|s| !s.is_nan()).map(|s| s.clamp(0.0, 100.0)),
            issues: snapshot.issues.clone(),
        }
    }

    fn has_critical_issue(&self, issues: &[String]) -> bool {
        if self.critical_markers.is_empty() {
            return false;
        }
        issues.iter().any(|issue| {
            let issue = issue.to_lowercase();
            self.critical_markers.iter().any(|m| issue.contains(m))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_bands() {
        for s in [70.0, 70.5, 85.0, 100.0] {
            assert_eq!(classify_score(Some(s)), HealthStatus::Healthy, "score {s}");
        }
        for s in [40.0, 55.0, 69.99] {
            assert_eq!(classify_score(Some(s)), HealthStatus::Degraded, "score {s}");
        }
        for s in [0.0, 25.0, 39.99] {
            assert_eq!(classify_score(Some(s)), HealthStatus::Unhealthy, "score {s}");
        }
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(classify_score(Some(140.0)), HealthStatus::Healthy);
        assert_eq!(classify_score(Some(-3.0)), HealthStatus::Unhealthy);
    }

    #[test]
    fn missing_score_is_unknown() {
        assert_eq!(classify_score(None), HealthStatus::Unknown);
        assert_eq!(classify_score(Some(f64::NAN)), HealthStatus::Unknown);
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = HealthClassifier::new();
        let issues = vec!["pixel firing late".to_string()];
        for s in 0..=100 {
            let score = Some(f64::from(s));
            let first = classifier.classify(score, &issues);
            let second = classifier.classify(score, &issues);
            assert_eq!(first, second);
            assert_eq!(first, classify_score(score));
        }
    }

    #[test]
    fn issues_are_advisory_by_default() {
        let classifier = HealthClassifier::new();
        let issues = vec!["conversion API errors".to_string()];
        assert_eq!(classifier.classify(Some(92.0), &issues), HealthStatus::Healthy);

        let assessment = classifier.assess(&HealthSnapshot::new(Some(92.0), issues.clone()));
        assert_eq!(assessment.status, HealthStatus::Healthy);
        assert_eq!(assessment.issues, issues);
    }

    #[test]
    fn critical_marker_demotes() {
        let classifier = HealthClassifier::with_critical_markers(["Tracking Outage"]);
        let issues = vec!["tracking outage on checkout".to_string()];
        assert_eq!(classifier.classify(Some(95.0), &issues), HealthStatus::Critical);
        assert_eq!(classifier.classify(Some(95.0), &[]), HealthStatus::Healthy);
    }

    #[test]
    fn blank_markers_are_ignored() {
        let classifier = HealthClassifier::with_critical_markers(["", "  "]);
        let issues = vec!["anything".to_string()];
        assert_eq!(classifier.classify(Some(80.0), &issues), HealthStatus::Healthy);
    }

    #[test]
    fn assessment_clamps_score() {
        let assessment = HealthClassifier::new().assess(&HealthSnapshot::scored(120.0));
        assert_eq!(assessment.score, Some(100.0));
    }
}
