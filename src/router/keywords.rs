//! Keyword routing rules
//!
//! Checked in table order; the first rule with a matching keyword wins.
//! The order is the priority contract: a message mentioning both "explain"
//! and "quiz" goes to the Socratic agent.

use crate::agent::AgentIdentity;

#[derive(Debug)]
pub struct KeywordRule {
    pub agent: AgentIdentity,
    /// Lowercase; matched as substrings
    pub keywords: &'static [&'static str],
}

impl KeywordRule {
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

pub const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        agent: AgentIdentity::SocraticDialogue,
        keywords: &["explain", "teach me", "feynman", "understand"],
    },
    KeywordRule {
        agent: AgentIdentity::Assessment,
        keywords: &["quiz", "test", "assess", "check my"],
    },
    KeywordRule {
        agent: AgentIdentity::Coach,
        keywords: &["motivation", "struggling", "help me", "stuck", "tired"],
    },
    KeywordRule {
        agent: AgentIdentity::Curriculum,
        keywords: &["plan", "path", "curriculum", "schedule", "roadmap"],
    },
    KeywordRule {
        agent: AgentIdentity::Scout,
        keywords: &[
            "content",
            "article",
            "read",
            "recommend reading",
            "what should i read",
        ],
    },
    KeywordRule {
        agent: AgentIdentity::DrillSergeant,
        keywords: &["practice", "drill", "exercise", "project", "hands-on", "weak"],
    },
];

/// First agent whose keywords appear in the message (case-insensitive)
pub fn match_keywords(message: &str) -> Option<AgentIdentity> {
    let lowered = message.to_lowercase();
    KEYWORD_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.agent)
}
