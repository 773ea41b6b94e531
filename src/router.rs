//! Message routing
//!
//! Pure decision of which agent answers a message. Rules apply in order
//! and the first match wins:
//!
//! 1. Menu selection: the trimmed message equals a live menu number
//! 2. Ambiguous short input with a pending suggested agent
//! 3. An active dialogue mode
//! 4. Keyword match
//! 5. LLM classification (done by the caller)
//!
//! Menus and suggestions are single-use: any message that does not
//! consume them clears them before rule 3.

mod classifier;
mod keywords;

#[cfg(test)]
mod proptests;

pub use classifier::{parse_classification, ClassificationError, IntentClassifier};
pub use keywords::{match_keywords, KeywordRule, KEYWORD_RULES};

use crate::agent::AgentIdentity;
use crate::state_machine::RoutingContext;

/// Bare acknowledgements that carry no routing intent of their own
const ACKNOWLEDGEMENTS: &[&str] = &["ok", "okay", "yes", "yep", "no", "nope", "y", "n", "sure", "go"];
const ACKNOWLEDGEMENT_MAX_CHARS: usize = 4;

/// Which rule produced a routing decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingRule {
    MenuSelection,
    PendingSuggestion,
    Mode,
    /// Unmatched digits with nothing pending stay with the current agent
    Continuation,
    Keyword,
    Classifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Route {
        agent: AgentIdentity,
        rule: RoutingRule,
    },
    /// No deterministic rule matched; ask the classifier
    Classify,
}

fn is_numeric(input: &str) -> bool {
    !input.is_empty() && input.chars().all(|c| c.is_ascii_digit())
}

/// Purely numeric, or a short bare acknowledgement
pub fn is_ambiguous(input: &str) -> bool {
    let input = input.trim();
    if input.is_empty() {
        return false;
    }
    if is_numeric(input) {
        return true;
    }
    let lowered = input.to_lowercase();
    lowered.chars().count() <= ACKNOWLEDGEMENT_MAX_CHARS && ACKNOWLEDGEMENTS.contains(&lowered.as_str())
}

/// Decide the target agent and update the single-use routing hints.
///
/// A menu selection stashes the option's action in
/// `routing.selected_action`.
pub fn route(routing: &mut RoutingContext, current: AgentIdentity, message: &str) -> RouteDecision {
    let input = message.trim();

    if let Some(option) = routing.menu_option(input).cloned() {
        routing.clear_stale_hints();
        routing.selected_action = option.action;
        return RouteDecision::Route {
            agent: option.target,
            rule: RoutingRule::MenuSelection,
        };
    }

    let ambiguous = is_ambiguous(input);
    if ambiguous {
        if let Some(agent) = routing.pending_agent.take() {
            routing.clear_stale_hints();
            return RouteDecision::Route {
                agent,
                rule: RoutingRule::PendingSuggestion,
            };
        }
    }

    routing.clear_stale_hints();

    if let Some(mode) = &routing.mode {
        return RouteDecision::Route {
            agent: mode.owner(),
            rule: RoutingRule::Mode,
        };
    }

    // Digits that missed the menu are never keyword-matched or classified
    if is_numeric(input) {
        return RouteDecision::Route {
            agent: current,
            rule: RoutingRule::Continuation,
        };
    }

    match match_keywords(input) {
        Some(agent) => RouteDecision::Route {
            agent,
            rule: RoutingRule::Keyword,
        },
        None => RouteDecision::Classify,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{DialogueMode, MenuOption};

    fn decided(decision: RouteDecision) -> (AgentIdentity, RoutingRule) {
        match decision {
            RouteDecision::Route { agent, rule } => (agent, rule),
            RouteDecision::Classify => panic!("expected a decision"),
        }
    }

    #[test]
    fn test_ambiguity() {
        for input in ["1", " 42 ", "ok", "OK", "okay", "y", "Nope", "go"] {
            assert!(is_ambiguous(input), "{input:?}");
        }
        for input in ["", "ok then", "yes please", "1a", "sure thing", "hello"] {
            assert!(!is_ambiguous(input), "{input:?}");
        }
    }

    #[test]
    fn test_menu_selection_routes_and_clears() {
        let mut routing = RoutingContext::default();
        routing.set_menu(vec![
            MenuOption::new("1", "Plan", AgentIdentity::Curriculum).with_action("generate_path"),
            MenuOption::new("2", "Quiz", AgentIdentity::Assessment).with_action("quiz"),
        ]);
        routing.pending_agent = Some(AgentIdentity::Scout);

        let (agent, rule) = decided(route(&mut routing, AgentIdentity::Coach, " 2 "));
        assert_eq!(agent, AgentIdentity::Assessment);
        assert_eq!(rule, RoutingRule::MenuSelection);
        assert_eq!(routing.selected_action.as_deref(), Some("quiz"));
        assert!(routing.menu.is_empty());
        assert!(routing.pending_agent.is_none());
    }

    #[test]
    fn test_menu_beats_mode_and_keywords() {
        let mut routing = RoutingContext::default();
        routing.mode = Some(DialogueMode::Explanation {
            topic: "recursion".to_string(),
        });
        routing.set_menu(vec![MenuOption::new("1", "Quiz", AgentIdentity::Assessment)]);
        let (agent, _) = decided(route(&mut routing, AgentIdentity::SocraticDialogue, "1"));
        assert_eq!(agent, AgentIdentity::Assessment);
    }

    #[test]
    fn test_acknowledgement_follows_pending_suggestion() {
        let mut routing = RoutingContext::default();
        routing.pending_agent = Some(AgentIdentity::Scout);
        let (agent, rule) = decided(route(&mut routing, AgentIdentity::Coach, "ok"));
        assert_eq!(agent, AgentIdentity::Scout);
        assert_eq!(rule, RoutingRule::PendingSuggestion);
        assert!(routing.pending_agent.is_none());
    }

    #[test]
    fn test_unmatched_number_uses_pending_not_keywords() {
        let mut routing = RoutingContext::default();
        routing.set_menu(vec![MenuOption::new("1", "Plan", AgentIdentity::Curriculum)]);
        routing.pending_agent = Some(AgentIdentity::DrillSergeant);

        let (agent, rule) = decided(route(&mut routing, AgentIdentity::Coach, "7"));
        assert_eq!(agent, AgentIdentity::DrillSergeant);
        assert_eq!(rule, RoutingRule::PendingSuggestion);
        assert!(routing.menu.is_empty());
    }

    #[test]
    fn test_unmatched_number_without_pending_stays_put() {
        let mut routing = RoutingContext::default();
        routing.set_menu(vec![MenuOption::new("1", "Plan", AgentIdentity::Curriculum)]);
        let (agent, rule) = decided(route(&mut routing, AgentIdentity::Assessment, "5"));
        assert_eq!(agent, AgentIdentity::Assessment);
        assert_eq!(rule, RoutingRule::Continuation);
        assert!(routing.menu.is_empty());
    }

    #[test]
    fn test_explicit_message_clears_stale_hints() {
        let mut routing = RoutingContext::default();
        routing.set_menu(vec![MenuOption::new("1", "Plan", AgentIdentity::Curriculum)]);
        routing.pending_agent = Some(AgentIdentity::Scout);

        let (agent, rule) = decided(route(&mut routing, AgentIdentity::Coach, "quiz me on joins"));
        assert_eq!(agent, AgentIdentity::Assessment);
        assert_eq!(rule, RoutingRule::Keyword);
        assert!(routing.menu.is_empty());
        assert!(routing.pending_agent.is_none());
    }

    #[test]
    fn test_mode_pins_routing() {
        let mut routing = RoutingContext::default();
        routing.mode = Some(DialogueMode::Quiz {
            topics: vec!["sql".to_string()],
            question_count: 3,
        });
        let (agent, rule) = decided(route(&mut routing, AgentIdentity::Coach, "explain joins"));
        assert_eq!(agent, AgentIdentity::Assessment);
        assert_eq!(rule, RoutingRule::Mode);

        // Stale hints are gone even when a mode decides
        routing.pending_agent = Some(AgentIdentity::Scout);
        route(&mut routing, AgentIdentity::Assessment, "B");
        assert!(routing.pending_agent.is_none());
    }

    #[test]
    fn test_acknowledgement_without_pending_falls_through() {
        let mut routing = RoutingContext::default();
        assert_eq!(
            route(&mut routing, AgentIdentity::Assessment, "yes"),
            RouteDecision::Classify
        );
        assert_eq!(route(&mut routing, AgentIdentity::Assessment, "sure"), RouteDecision::Classify);
    }

    #[test]
    fn test_no_rule_needs_classifier() {
        let mut routing = RoutingContext::default();
        assert_eq!(
            route(&mut routing, AgentIdentity::Coach, "hello there"),
            RouteDecision::Classify
        );
    }
}
