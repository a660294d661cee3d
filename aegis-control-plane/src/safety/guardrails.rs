//! # Guardrails Service
//!
//! Composes the local detectors ([`crate::safety::detectors`]) with an
//! external [`ContentPolicySink`], producing one [`SafetyVerdict`] per
//! direction (input/output) of a request.

use std::time::Instant;

use crate::config::{RedactionMode, SafetyConfig};
use crate::external::ContentPolicySink;
use crate::model::{SafetyVerdict, Severity, Span, Violation, ViolationType};
use crate::safety::detectors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Input,
    Output,
}

pub struct GuardrailsService<S: ContentPolicySink> {
    config: SafetyConfig,
    sink: S,
}

impl<S: ContentPolicySink> GuardrailsService<S> {
    pub fn new(config: SafetyConfig, sink: S) -> Self {
        Self { config, sink }
    }

    pub async fn check_input(&self, text: &str, domain: &str, request_id: &str) -> SafetyVerdict {
        self.check(text, Source::Input, domain, request_id).await
    }

    pub async fn check_output(&self, text: &str, domain: &str, request_id: &str) -> SafetyVerdict {
        self.check(text, Source::Output, domain, request_id).await
    }

    async fn check(&self, text: &str, source: Source, domain: &str, request_id: &str) -> SafetyVerdict {
        let start = Instant::now();
        let local = self.run_local_detectors(text);

        if !local.allowed && self.config.block_on_violation {
            return SafetyVerdict {
                processing_ms: start.elapsed().as_millis() as u64,
                ..local
            };
        }

        let remote = self
            .sink
            .check(text, source, domain, request_id)
            .await
            .unwrap_or_else(|e| {
                let mut verdict = SafetyVerdict::allow();
                verdict.allowed = !self.config.strict_mode;
                verdict.violations.push(Violation {
                    violation_type: ViolationType::SystemError,
                    severity: Severity::Critical,
                    confidence: 1.0,
                    details: format!("content policy sink error: {e}"),
                    span: None,
                });
                verdict
            });

        let mut merged = local.merge(remote);
        merged.processing_ms = start.elapsed().as_millis() as u64;

        if merged.modified.is_none() && !merged.violations.is_empty() {
            merged.modified = Some(self.fallback_redact(text));
        }

        merged
    }

    fn run_local_detectors(&self, text: &str) -> SafetyVerdict {
        let mut violations = Vec::new();
        let mut applied = Vec::new();

        if self.config.enable_pii {
            violations.extend(detectors::pii_violations(text));
            applied.push("pii".to_string());
        }
        if self.config.enable_toxicity {
            violations.extend(detectors::toxicity_violations(text));
            applied.push("toxicity".to_string());
        }
        if self.config.enable_prompt_injection {
            violations.extend(detectors::prompt_injection_violations(text));
            applied.push("prompt_injection".to_string());
        }

        let confidence = violations
            .iter()
            .map(|v| v.confidence)
            .fold(1.0_f64, f64::min);

        let has_blocking_violation = violations
            .iter()
            .any(|v| v.confidence >= self.config.confidence_threshold);

        let modified = if has_blocking_violation && self.config.enable_pii {
            Some(self.fallback_redact(text))
        } else {
            None
        };

        SafetyVerdict {
            allowed: !has_blocking_violation,
            confidence,
            violations,
            modified,
            processing_ms: 0,
            applied,
        }
    }

    /// Architectural "bedrock usage" policy: when enabled, requests that the
    /// router delegate to a different provider whenever this direction's
    /// verdict carries any violation. Never blocks by itself — the caller
    /// only records the signal.
    pub fn bedrock_delegation_requested(&self, verdict: &SafetyVerdict) -> bool {
        self.config.enable_bedrock_guardrails && !verdict.violations.is_empty()
    }

    fn fallback_redact(&self, text: &str) -> String {
        let mode = match self.config.redaction_mode {
            RedactionMode::Mask => detectors::RedactionMode::Mask,
            RedactionMode::Remove => detectors::RedactionMode::Remove,
            RedactionMode::Replace => detectors::RedactionMode::Replace,
        };
        detectors::redact_pii(text, mode)
    }
}

/// Offsets a `Span` by a fixed amount; used when stitching redacted spans
/// from multiple detectors back into a single modified string.
pub fn shift_span(span: Span, delta: isize) -> Span {
    let apply = |v: usize| (v as isize + delta).max(0) as usize;
    Span { start: apply(span.start), end: apply(span.end) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::NoopContentPolicySink;

    fn service() -> GuardrailsService<NoopContentPolicySink> {
        GuardrailsService::new(SafetyConfig::default(), NoopContentPolicySink)
    }

    #[tokio::test]
    async fn pii_in_prompt_blocks_and_redacts() {
        let svc = service();
        let verdict = svc
            .check_input("My email is john@example.com, analyze", "culinary", "req-1")
            .await;
        assert!(!verdict.allowed);
        assert!(verdict.violations.iter().any(|v| v.violation_type == ViolationType::Pii));
        assert!(verdict.modified.is_some());
        assert!(!verdict.modified.unwrap().contains('@'));
    }

    #[tokio::test]
    async fn toxic_output_is_blocked() {
        let svc = service();
        let verdict = svc
            .check_output("This restaurant is fucking terrible", "culinary", "req-2")
            .await;
        assert!(!verdict.allowed);
        assert!(verdict
            .violations
            .iter()
            .any(|v| matches!(v.violation_type, ViolationType::Toxicity | ViolationType::HateSpeech)));
    }

    #[tokio::test]
    async fn clean_text_is_allowed() {
        let svc = service();
        let verdict = svc.check_input("What is the best way to cook rice?", "culinary", "req-3").await;
        assert!(verdict.allowed);
        assert!(verdict.violations.is_empty());
    }
}
