//! Property-based tests for routing and the shared learning records

use super::*;
use crate::learning::{clamp_unit, SharedLearningContext, RECENT_TOPICS_CAPACITY};
use crate::state_machine::{DialogueMode, MenuOption};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_agent() -> impl Strategy<Value = AgentIdentity> {
    prop::sample::select(AgentIdentity::ALL.to_vec())
}

fn arb_mode() -> impl Strategy<Value = Option<DialogueMode>> {
    prop_oneof![
        Just(None),
        "[a-z]{1,10}".prop_map(|topic| Some(DialogueMode::Explanation { topic })),
        (prop::collection::vec("[a-z]{1,8}", 1..3), 1u32..10)
            .prop_map(|(topics, question_count)| Some(DialogueMode::Quiz {
                topics,
                question_count
            })),
    ]
}

fn arb_menu() -> impl Strategy<Value = Vec<MenuOption>> {
    prop::collection::vec(arb_agent(), 0..5).prop_map(|targets| {
        targets
            .into_iter()
            .enumerate()
            .map(|(i, target)| MenuOption::new((i + 1).to_string(), "option", target))
            .collect()
    })
}

fn arb_routing() -> impl Strategy<Value = RoutingContext> {
    (arb_menu(), prop::option::of(arb_agent()), arb_mode()).prop_map(|(menu, pending, mode)| {
        let mut routing = RoutingContext::default();
        routing.set_menu(menu);
        routing.pending_agent = pending;
        routing.mode = mode;
        routing
    })
}

fn arb_message() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{1,2}",
        Just("ok".to_string()),
        Just("quiz me".to_string()),
        Just("explain joins".to_string()),
        "[a-z ]{1,30}",
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_route_is_deterministic(
        routing in arb_routing(),
        current in arb_agent(),
        message in arb_message()
    ) {
        let mut a = routing.clone();
        let mut b = routing;
        prop_assert_eq!(route(&mut a, current, &message), route(&mut b, current, &message));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_menu_and_suggestion_never_survive_a_message(
        routing in arb_routing(),
        current in arb_agent(),
        message in arb_message()
    ) {
        let mut routing = routing;
        route(&mut routing, current, &message);
        prop_assert!(routing.menu.is_empty());
        prop_assert!(routing.pending_agent.is_none());
    }

    #[test]
    fn prop_menu_number_routes_to_its_target(menu in arb_menu(), current in arb_agent(), pick in 0usize..5) {
        prop_assume!(pick < menu.len());
        let expected = menu[pick].target;
        let mut routing = RoutingContext::default();
        routing.set_menu(menu);
        let decision = route(&mut routing, current, &(pick + 1).to_string());
        prop_assert_eq!(
            decision,
            RouteDecision::Route { agent: expected, rule: RoutingRule::MenuSelection }
        );
    }

    #[test]
    fn prop_mode_owner_wins_without_menu_or_pending(
        mode in arb_mode(),
        current in arb_agent(),
        message in "[a-z ]{1,30}"
    ) {
        let Some(mode) = mode else { return Ok(()); };
        let owner = mode.owner();
        let mut routing = RoutingContext { mode: Some(mode), ..RoutingContext::default() };
        prop_assert_eq!(
            route(&mut routing, current, &message),
            RouteDecision::Route { agent: owner, rule: RoutingRule::Mode }
        );
    }

    #[test]
    fn prop_clamp_unit_in_range(value in any::<f64>()) {
        let clamped = clamp_unit(value);
        prop_assert!((0.0..=1.0).contains(&clamped));
    }

    #[test]
    fn prop_proficiency_always_in_range(levels in prop::collection::vec(("[a-c]", -5.0f64..5.0), 0..20)) {
        let mut ctx = SharedLearningContext::default();
        for (topic, level) in levels {
            ctx.set_proficiency(topic, level);
        }
        prop_assert!(ctx.proficiency_levels.values().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn prop_recent_topics_bounded_and_unique(topics in prop::collection::vec("[a-m]{1,2}", 0..40)) {
        let mut ctx = SharedLearningContext::default();
        for topic in &topics {
            ctx.push_recent_topic(topic.clone());
        }
        prop_assert!(ctx.recent_topics.len() <= RECENT_TOPICS_CAPACITY);
        let mut seen = std::collections::HashSet::new();
        prop_assert!(ctx.recent_topics.iter().all(|t| seen.insert(t.clone())));
        if let Some(last) = topics.last() {
            prop_assert_eq!(ctx.recent_topics.front(), Some(last));
        }
    }
}
