// src/notify/mod.rs
pub mod email;

use crate::ralph::RunResult;

/// Human-readable digest of one run, for outbound notification.
#[derive(Debug, Clone)]
pub struct RunDigest {
    pub subject: String,
    pub body: String,
}

impl RunDigest {
    pub fn from_result(result: &RunResult) -> Self {
        let subject = format!(
            "Blog run: {} (score {:.2}, {} cents)",
            result.status.as_str(),
            result.final_quality_score,
            result.total_cost_cents
        );

        let mut lines = vec![
            format!("Status:      {}", result.status.as_str()),
            format!("Quality:     {:.2}", result.final_quality_score),
            format!("Iterations:  {}", result.iteration_count),
            format!("Cost:        {} cents", result.total_cost_cents),
            format!("Post ID:     {}", result.post_id),
        ];
        if let Some(strategy) = result.strategy {
            lines.push(format!("Strategy:    {}", strategy.as_str()));
        }
        if let Some(reason) = &result.strategy_reason {
            lines.push(format!("Why:         {reason}"));
        }
        if let Some(reason) = &result.failure_reason {
            lines.push(format!("Note:        {reason}"));
        }
        if !result.source_summaries.is_empty() {
            lines.push(String::new());
            lines.push("Sources:".to_string());
            for summary in &result.source_summaries {
                lines.push(format!("  - {summary}"));
            }
        }

        Self {
            subject,
            body: lines.join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ralph::RunStatus;
    use uuid::Uuid;

    #[test]
    fn digest_carries_status_score_and_sources() {
        let result = RunResult {
            post_id: Uuid::nil(),
            status: RunStatus::Published,
            final_quality_score: 0.88,
            iteration_count: 2,
            total_cost_cents: 37,
            failure_reason: None,
            strategy: Some(crate::strategy::ContentStrategy::Thematic),
            strategy_reason: Some("two items share a theme".into()),
            source_summaries: vec!["[rss] Tariff news - https://example.com".into()],
        };
        let digest = RunDigest::from_result(&result);
        assert!(digest.subject.contains("published"));
        assert!(digest.subject.contains("0.88"));
        assert!(digest.body.contains("thematic"));
        assert!(digest.body.contains("Tariff news"));
    }
}
