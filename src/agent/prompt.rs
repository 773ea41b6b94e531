//! Prompt context for agents that talk to an LLM
//!
//! Renders an [`AgentContext`] into a sliding window of chat messages and
//! a system prompt that states what is already known, so agents do not
//! re-ask settled questions.

use super::AgentContext;
use crate::llm::{ChatMessage, ChatRole};
use crate::state_machine::TurnRole;
use std::fmt::Write as _;

pub const DEFAULT_HISTORY_WINDOW: usize = 10;
const HISTORY_TEXT_MAX_CHARS: usize = 200;

/// Truncate to at most `max` characters, appending `...` when cut
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Compact one-line view of the learning context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSummary {
    pub primary_goal: Option<String>,
    pub current_focus: Option<String>,
    pub learning_style: Option<String>,
    pub background: Option<String>,
    pub recent_topics: Vec<String>,
    pub onboarding_complete: bool,
    pub path_created: bool,
}

impl ContextSummary {
    pub fn from_context(ctx: &AgentContext) -> Self {
        let learning = &ctx.learning;
        Self {
            primary_goal: learning.primary_goal.clone(),
            current_focus: learning.current_focus.clone(),
            learning_style: learning.preferences.get("learning_style").cloned(),
            background: learning
                .constraints
                .get("background")
                .or_else(|| learning.constraints.get("programming_background"))
                .cloned(),
            recent_topics: learning.recent_topics.iter().take(5).cloned().collect(),
            onboarding_complete: learning.onboarding_complete,
            path_created: !learning.learning_path.is_empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(goal) = &self.primary_goal {
            parts.push(format!("Goal: {goal}"));
        }
        if let Some(focus) = &self.current_focus {
            parts.push(format!("Focus: {focus}"));
        }
        if let Some(style) = &self.learning_style {
            parts.push(format!("Style: {style}"));
        }
        if let Some(background) = &self.background {
            parts.push(format!("Background: {background}"));
        }
        if !self.recent_topics.is_empty() {
            let recent: Vec<&str> = self.recent_topics.iter().take(3).map(String::as_str).collect();
            parts.push(format!("Recent: {}", recent.join(", ")));
        }
        let mut status = Vec::new();
        if self.onboarding_complete {
            status.push("onboarding done");
        }
        if self.path_created {
            status.push("path created");
        }
        if !status.is_empty() {
            parts.push(format!("Status: {}", status.join(", ")));
        }

        if parts.is_empty() {
            "New user, no context yet".to_string()
        } else {
            parts.join(" | ")
        }
    }
}

/// Builds LLM inputs from an agent context
pub struct PromptBuilder<'a> {
    ctx: &'a AgentContext,
    window: usize,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(ctx: &'a AgentContext) -> Self {
        Self {
            ctx,
            window: DEFAULT_HISTORY_WINDOW,
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn summary(&self) -> ContextSummary {
        ContextSummary::from_context(self.ctx)
    }

    /// Windowed history plus the current message, alternating roles.
    ///
    /// System turns are dropped, consecutive same-role turns are merged,
    /// and a leading assistant turn gets a placeholder user turn before it.
    pub fn build_messages(&self, current: &str) -> Vec<ChatMessage> {
        let start = self.ctx.history.len().saturating_sub(self.window);
        let mut messages: Vec<ChatMessage> = Vec::new();

        for turn in &self.ctx.history[start..] {
            let role = match turn.role {
                TurnRole::User => ChatRole::User,
                TurnRole::Assistant => ChatRole::Assistant,
                TurnRole::System => continue,
            };
            push_merged(&mut messages, role, &turn.text);
        }

        let summary = self.summary();
        let current = if summary.is_empty() {
            current.to_string()
        } else {
            format!("[Context: {}]\n\n{current}", summary.to_text())
        };
        push_merged(&mut messages, ChatRole::User, &current);

        if messages.first().is_some_and(|m| m.role == ChatRole::Assistant) {
            messages.insert(0, ChatMessage::user("[Starting conversation]"));
        }
        messages
    }

    /// Recent history as plain text, one turn per line
    pub fn history_text(&self, max_entries: Option<usize>) -> String {
        let n = max_entries.unwrap_or(self.window);
        let start = self.ctx.history.len().saturating_sub(n);
        self.ctx.history[start..]
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    TurnRole::User => "USER",
                    TurnRole::Assistant => "ASSISTANT",
                    TurnRole::System => "SYSTEM",
                };
                let text = truncate_chars(&turn.text, HISTORY_TEXT_MAX_CHARS);
                match turn.agent {
                    Some(agent) => format!("{role} ({agent}): {text}"),
                    None => format!("{role}: {text}"),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Established facts, phrased to stop an agent re-asking them
    pub fn what_we_know(&self) -> String {
        let summary = self.summary();
        let mut facts = Vec::new();
        if let Some(goal) = &summary.primary_goal {
            facts.push(format!("- User's goal: {goal}"));
        }
        if let Some(style) = &summary.learning_style {
            facts.push(format!("- Prefers: {style} learning"));
        }
        if let Some(background) = &summary.background {
            facts.push(format!("- Background: {background}"));
        }
        if summary.onboarding_complete {
            facts.push("- Onboarding is COMPLETE - don't re-ask setup questions".to_string());
        }
        if summary.path_created {
            facts.push("- Learning path already created".to_string());
        }

        if facts.is_empty() {
            "Nothing established yet - this may be a new conversation.".to_string()
        } else {
            format!("What we already know:\n{}", facts.join("\n"))
        }
    }

    /// The agent's base prompt with known facts, handoff, and discoveries
    pub fn system_prompt(&self, base: &str) -> String {
        let mut prompt = format!("{base}\n\nIMPORTANT CONTEXT:\n{}\n", self.what_we_know());
        if let Some(section) = self.handoff_section() {
            prompt.push_str(&section);
            prompt.push('\n');
        }
        if let Some(section) = self.discoveries_section() {
            prompt.push_str(&section);
            prompt.push('\n');
        }
        if let Some(note) = &self.ctx.transition {
            let _ = writeln!(prompt, "\nThe user was just transferred from the {} agent.", note.from.display_name());
        }
        prompt.push_str(
            "CRITICAL: Do NOT re-ask questions that have already been answered.\n\
             Continue the conversation naturally based on what's established above.\n\
             If gaps were identified by a previous agent, prioritize addressing those gaps.",
        );
        prompt
    }

    fn handoff_section(&self) -> Option<String> {
        let handoff = self.ctx.handoff.as_ref()?;
        let mut parts = vec![
            format!(
                "\nHANDOFF FROM {}:",
                handoff.from_agent.display_name().to_uppercase()
            ),
            format!("Summary: {}", handoff.summary),
        ];
        if !handoff.gaps_identified.is_empty() {
            parts.push(format!("Gaps to address: {}", join_first(&handoff.gaps_identified, 5, ", ")));
        }
        if !handoff.suggested_next_steps.is_empty() {
            parts.push(format!(
                "Suggested actions: {}",
                join_first(&handoff.suggested_next_steps, 3, "; ")
            ));
        }
        if !handoff.proficiency_observations.is_empty() {
            let observed: Vec<String> = handoff
                .proficiency_observations
                .iter()
                .take(5)
                .map(|(topic, level)| format!("{topic}: {:.0}%", level * 100.0))
                .collect();
            parts.push(format!("Proficiency observations: {}", observed.join(", ")));
        }
        if !handoff.key_points.is_empty() {
            parts.push(format!("Key points: {}", join_first(&handoff.key_points, 3, "; ")));
        }
        if !handoff.topics_covered.is_empty() {
            parts.push(format!("Topics covered: {}", join_first(&handoff.topics_covered, 5, ", ")));
        }
        Some(parts.join("\n"))
    }

    fn discoveries_section(&self) -> Option<String> {
        let d = &self.ctx.discoveries;
        if d.is_empty() {
            return None;
        }
        let mut parts = vec!["\nWHAT OTHER AGENTS HAVE LEARNED:".to_string()];
        if !d.needs_support.is_empty() {
            parts.push(format!("Needs support in: {}", join_first(&d.needs_support, 5, ", ")));
        }
        if !d.strengths.is_empty() {
            parts.push(format!("Strong in: {}", join_first(&d.strengths, 5, ", ")));
        }
        if !d.misconceptions.is_empty() {
            let items: Vec<String> = d
                .misconceptions
                .iter()
                .take(3)
                .map(|m| format!("{}: {}", m.topic, m.misconception))
                .collect();
            parts.push(format!("Misconceptions to address: {}", items.join("; ")));
        }
        if !d.learning_observations.is_empty() {
            let items: Vec<&str> = d
                .learning_observations
                .iter()
                .take(3)
                .map(|o| o.observation.as_str())
                .collect();
            parts.push(format!("Learning style notes: {}", items.join("; ")));
        }
        (parts.len() > 1).then(|| parts.join("\n"))
    }
}

fn join_first(items: &[String], n: usize, sep: &str) -> String {
    items.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(sep)
}

fn push_merged(messages: &mut Vec<ChatMessage>, role: ChatRole, text: &str) {
    match messages.last_mut() {
        Some(last) if last.role == role => {
            last.content.push_str("\n\n");
            last.content.push_str(text);
        }
        _ => messages.push(ChatMessage {
            role,
            content: text.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentIdentity;
    use crate::learning::{AgentDiscoveries, HandoffContext};
    use crate::state_machine::DialogueTurn;
    use uuid::Uuid;

    fn ctx() -> AgentContext {
        AgentContext::new(Uuid::new_v4(), AgentIdentity::Coach)
    }

    #[test]
    fn test_empty_summary_text() {
        assert_eq!(ContextSummary::default().to_text(), "New user, no context yet");
    }

    #[test]
    fn test_summary_text_joins_parts() {
        let mut c = ctx();
        c.learning.set_primary_goal("learn rust");
        c.learning.set_current_focus("traits");
        c.learning.set_preference("learning_style", "hands-on");
        c.learning.onboarding_complete = true;
        assert_eq!(
            ContextSummary::from_context(&c).to_text(),
            "Goal: learn rust | Focus: traits | Style: hands-on | Recent: traits | Status: onboarding done"
        );
    }

    #[test]
    fn test_build_messages_merges_and_skips_system() {
        let mut c = ctx();
        c.history = vec![
            DialogueTurn::assistant("Welcome!", AgentIdentity::Coach),
            DialogueTurn::system("Transitioned from coach to scout"),
            DialogueTurn::assistant("I'm the scout.", AgentIdentity::Scout),
            DialogueTurn::user("hi"),
        ];
        let messages = PromptBuilder::new(&c).build_messages("find me an article");

        assert_eq!(messages[0], ChatMessage::user("[Starting conversation]"));
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, "Welcome!\n\nI'm the scout.");
        assert_eq!(messages[2].role, ChatRole::User);
        assert_eq!(messages[2].content, "hi\n\nfind me an article");
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn test_build_messages_prefixes_context() {
        let mut c = ctx();
        c.learning.set_primary_goal("statistics");
        let messages = PromptBuilder::new(&c).build_messages("hello");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.starts_with("[Context: Goal: statistics]"));
        assert!(messages[0].content.ends_with("hello"));
    }

    #[test]
    fn test_window_limits_history() {
        let mut c = ctx();
        for i in 0..30 {
            c.history.push(DialogueTurn::user(format!("u{i}")));
            c.history.push(DialogueTurn::assistant(format!("a{i}"), AgentIdentity::Coach));
        }
        let messages = PromptBuilder::new(&c).with_window(4).build_messages("now");
        // u28 a28 u29 a29 + now
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].content, "u28");
    }

    #[test]
    fn test_system_prompt_sections() {
        let mut c = ctx();
        c.handoff = Some(
            HandoffContext::new(AgentIdentity::Assessment, "Quiz on joins")
                .with_gaps(["outer joins", "null handling"])
                .with_proficiency("joins", 0.4),
        );
        c.discoveries = AgentDiscoveries::misconception(
            AgentIdentity::SocraticDialogue,
            "joins",
            "thinks LEFT JOIN filters rows",
        )
        .with_strength("select queries");

        let prompt = PromptBuilder::new(&c).system_prompt("You are a coach.");
        assert!(prompt.starts_with("You are a coach."));
        assert!(prompt.contains("Nothing established yet"));
        assert!(prompt.contains("HANDOFF FROM ASSESSMENT:"));
        assert!(prompt.contains("Gaps to address: outer joins, null handling"));
        assert!(prompt.contains("joins: 40%"));
        assert!(prompt.contains("Strong in: select queries"));
        assert!(prompt.contains("Misconceptions to address: joins: thinks LEFT JOIN filters rows"));
        assert!(prompt.contains("Do NOT re-ask"));
    }

    #[test]
    fn test_history_text_truncates() {
        let mut c = ctx();
        c.history.push(DialogueTurn::assistant("x".repeat(300), AgentIdentity::Scout));
        let text = PromptBuilder::new(&c).history_text(None);
        assert!(text.starts_with("ASSISTANT (scout): "));
        assert!(text.ends_with("..."));
        assert_eq!(text.chars().count(), "ASSISTANT (scout): ".len() + 203);
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }
}
