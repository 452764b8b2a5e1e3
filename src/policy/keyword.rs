//! Offline policy generator driven by keyword rules.
//!
//! Used when no policy service is configured. Each rule that matches the
//! lower-cased query contributes its mutations; rules are evaluated in a
//! fixed order so the resulting policy is deterministic.

use async_trait::async_trait;
use tracing::{debug, info};

use super::types::GraphContext;
use super::PolicyGenerator;
use crate::engine::{Mutation, Policy, TradeOff};
use crate::error::{PolicyServiceError, PolicyServiceResult};

struct KeywordRule {
    slug: &'static str,
    keywords: &'static [&'static str],
    reason: &'static str,
    mutations: fn() -> Vec<Mutation>,
}

const RULES: &[KeywordRule] = &[
    KeywordRule {
        slug: "transport",
        keywords: &["vehicle", "transport"],
        reason: "Vehicle emission control and transport restriction are the most effective AQI levers.",
        mutations: transport_mutations,
    },
    KeywordRule {
        slug: "power",
        keywords: &["coal", "power generation"],
        reason: "Coal and power generation controls further reduce particulate pollution.",
        mutations: power_mutations,
    },
];

fn transport_mutations() -> Vec<Mutation> {
    vec![
        Mutation::DisableNode {
            node_id: "transport".to_string(),
            reason: "Restrict transport activity".to_string(),
        },
        Mutation::ReduceEdgeWeight {
            source: "transport".to_string(),
            target: "vehicle-emissions".to_string(),
            new_weight: 0.3,
            reason: "Tighter vehicle emission standards".to_string(),
        },
    ]
}

fn power_mutations() -> Vec<Mutation> {
    vec![Mutation::ReduceEdgeWeight {
        source: "generation".to_string(),
        target: "power-generation".to_string(),
        new_weight: 0.4,
        reason: "Phase down coal-fired generation".to_string(),
    }]
}

/// Rule-based [`PolicyGenerator`] that needs no network access.
#[derive(Debug, Clone, Default)]
pub struct KeywordPolicyGenerator;

impl KeywordPolicyGenerator {
    /// Create a keyword generator.
    pub fn new() -> Self {
        Self
    }

    /// Build a policy from the rules matching `research_query`.
    pub fn policy_for(&self, research_query: &str) -> PolicyServiceResult<Policy> {
        let text = research_query.to_lowercase();
        let matched: Vec<&KeywordRule> = RULES
            .iter()
            .filter(|rule| rule.keywords.iter().any(|k| text.contains(k)))
            .collect();

        if matched.is_empty() {
            return Err(PolicyServiceError::MalformedResponse {
                message: format!("no keyword rule matches query '{}'", research_query),
            });
        }

        let slugs: Vec<&str> = matched.iter().map(|r| r.slug).collect();
        let mut policy = Policy::new(
            format!("keyword-{}", slugs.join("-")),
            format!("Keyword policy ({})", slugs.join(", ")),
        )
        .with_description(
            matched
                .iter()
                .map(|r| r.reason)
                .collect::<Vec<_>>()
                .join(" "),
        );

        for rule in &matched {
            for mutation in (rule.mutations)() {
                policy = policy.with_mutation(mutation);
            }
        }
        policy.trade_offs = vec![TradeOff::general(
            "Derived from keyword rules; magnitudes are not research-calibrated",
        )];
        policy.estimated_impacts.confidence = 0.5;

        Ok(policy)
    }
}

#[async_trait]
impl PolicyGenerator for KeywordPolicyGenerator {
    async fn generate(
        &self,
        research_query: &str,
        context: &GraphContext,
    ) -> PolicyServiceResult<Policy> {
        let policy = self.policy_for(research_query)?;

        let issues = policy.check_against(context);
        if !issues.is_empty() {
            debug!(policy = %policy.id, issues = ?issues, "Keyword policy does not fit graph");
        }

        info!(
            policy = %policy.id,
            mutations = policy.mutations.len(),
            "Keyword policy generated"
        );
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::baseline::baseline_graph;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transport_query() {
        let policy = KeywordPolicyGenerator::new()
            .policy_for("How did Beijing cut Vehicle emissions?")
            .unwrap();

        assert_eq!(policy.id, "keyword-transport");
        assert_eq!(policy.mutations, transport_mutations());
    }

    #[test]
    fn test_combined_query_keeps_rule_order() {
        let policy = KeywordPolicyGenerator::new()
            .policy_for("coal power generation and transport")
            .unwrap();

        assert_eq!(policy.id, "keyword-transport-power");
        assert_eq!(policy.mutations.len(), 3);
        assert_eq!(policy.mutations[2], power_mutations()[0]);
    }

    #[test]
    fn test_unmatched_query() {
        let err = KeywordPolicyGenerator::new()
            .policy_for("urban tree canopy")
            .unwrap_err();
        assert!(matches!(err, PolicyServiceError::MalformedResponse { .. }));
    }

    #[test]
    fn test_generate_via_trait() {
        let context = GraphContext::from_graph(&baseline_graph());
        let policy = tokio_test::block_on(
            KeywordPolicyGenerator::new().generate("coal plants", &context),
        )
        .unwrap();

        assert_eq!(policy.id, "keyword-power");
        assert!(policy.check_against(&context).is_empty());
    }
}
