//! Per-agent onboarding question flows
//!
//! An agent that needs setup asks its fixed questions one at a time. Each
//! answer is written to a field of the shared learning context, and the
//! flow is complete only once every question has an answer.

use super::context::ContextPatch;
use crate::agent::AgentIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an onboarding answer lands in the shared learning context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextTarget {
    PrimaryGoal,
    CurrentFocus,
    Gap,
    Constraint(&'static str),
    Preference(&'static str),
}

impl ContextTarget {
    pub fn patch(self, answer: &str) -> ContextPatch {
        match self {
            ContextTarget::PrimaryGoal => ContextPatch::primary_goal(answer),
            ContextTarget::CurrentFocus => ContextPatch::current_focus(answer),
            ContextTarget::Gap => ContextPatch::gap(answer),
            ContextTarget::Constraint(key) => ContextPatch::constraint(key, answer),
            ContextTarget::Preference(key) => ContextPatch::preference(key, answer),
        }
    }

    /// Whether the answer names the topic later questions refer to
    fn names_topic(self) -> bool {
        matches!(self, ContextTarget::PrimaryGoal | ContextTarget::CurrentFocus)
    }
}

#[derive(Debug)]
pub struct OnboardingQuestion {
    pub key: &'static str,
    /// May contain a `{topic}` placeholder
    pub text: &'static str,
    pub target: ContextTarget,
}

impl OnboardingQuestion {
    pub fn render(&self, topic: Option<&str>) -> String {
        self.text.replace("{topic}", topic.unwrap_or("this"))
    }
}

const COACH_QUESTIONS: &[OnboardingQuestion] = &[
    OnboardingQuestion {
        key: "learning_topic",
        text: "What would you like to learn?",
        target: ContextTarget::PrimaryGoal,
    },
    OnboardingQuestion {
        key: "motivation",
        text: "That's a great choice! Why is learning {topic} important to you?",
        target: ContextTarget::Constraint("motivation"),
    },
    OnboardingQuestion {
        key: "success_criteria",
        text: "How will you know when you've succeeded? What does mastery of {topic} look like for you?",
        target: ContextTarget::Constraint("success_criteria"),
    },
];

const CURRICULUM_QUESTIONS: &[OnboardingQuestion] = &[
    OnboardingQuestion {
        key: "motivation",
        text: "What's driving your interest in {topic}? (career change, job enhancement, personal project, or academic?)",
        target: ContextTarget::Constraint("motivation"),
    },
    OnboardingQuestion {
        key: "timeline",
        text: "How much time can you dedicate weekly, and when do you want to reach your goal?",
        target: ContextTarget::Constraint("timeline"),
    },
    OnboardingQuestion {
        key: "programming",
        text: "What's your programming experience? (Python, other languages, or complete beginner?)",
        target: ContextTarget::Constraint("programming_background"),
    },
    OnboardingQuestion {
        key: "math",
        text: "How comfortable are you with math? (statistics, linear algebra, calculus - or beginner level?)",
        target: ContextTarget::Constraint("math_background"),
    },
    OnboardingQuestion {
        key: "style",
        text: "Last question - do you prefer hands-on projects, theory-first learning, or a mix of both?",
        target: ContextTarget::Preference("learning_style"),
    },
];

const ASSESSMENT_QUESTIONS: &[OnboardingQuestion] = &[
    OnboardingQuestion {
        key: "quiz_topic",
        text: "What topic should I quiz you on?",
        target: ContextTarget::CurrentFocus,
    },
    OnboardingQuestion {
        key: "question_count",
        text: "How many questions would you like? (e.g., 3, 5, 10)",
        target: ContextTarget::Preference("quiz_length"),
    },
    OnboardingQuestion {
        key: "focus_area",
        text: "Any specific areas of {topic} you'd like to focus on? (or say 'general' for a broad quiz)",
        target: ContextTarget::Preference("quiz_focus"),
    },
];

const DRILL_QUESTIONS: &[OnboardingQuestion] = &[
    OnboardingQuestion {
        key: "practice_topic",
        text: "What topic would you like to practice?",
        target: ContextTarget::CurrentFocus,
    },
    OnboardingQuestion {
        key: "time_available",
        text: "How much time do you have right now? (e.g., 5 min, 15 min, 30 min)",
        target: ContextTarget::Constraint("available_minutes"),
    },
    OnboardingQuestion {
        key: "weak_areas",
        text: "Any specific areas of {topic} that feel weak or confusing?",
        target: ContextTarget::Gap,
    },
];

/// The ordered setup questions for an agent; empty when it needs none
pub fn question_set(agent: AgentIdentity) -> &'static [OnboardingQuestion] {
    match agent {
        AgentIdentity::Coach => COACH_QUESTIONS,
        AgentIdentity::Curriculum => CURRICULUM_QUESTIONS,
        AgentIdentity::Assessment => ASSESSMENT_QUESTIONS,
        AgentIdentity::DrillSergeant => DRILL_QUESTIONS,
        AgentIdentity::SocraticDialogue | AgentIdentity::Scout => &[],
    }
}

/// Progress through one agent's onboarding for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingState {
    pub agent: AgentIdentity,
    /// Answers keyed by question key
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    /// Key of the question awaiting an answer
    #[serde(default)]
    pub current_question: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    is_complete: bool,
    pub started_at: DateTime<Utc>,
}

impl OnboardingState {
    pub fn new(agent: AgentIdentity) -> Self {
        Self {
            agent,
            answers: BTreeMap::new(),
            current_question: None,
            topic: None,
            is_complete: question_set(agent).is_empty(),
            started_at: Utc::now(),
        }
    }

    pub fn questions(&self) -> &'static [OnboardingQuestion] {
        question_set(self.agent)
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// First question without an answer
    pub fn next_unanswered(&self) -> Option<&'static OnboardingQuestion> {
        self.questions()
            .iter()
            .find(|q| !self.answers.contains_key(q.key))
    }

    /// Move to the next unanswered question and return its rendered text
    pub fn ask_next(&mut self) -> Option<String> {
        let next = self.next_unanswered();
        self.current_question = next.map(|q| q.key.to_string());
        next.map(|q| q.render(self.topic.as_deref()))
    }

    /// Record the answer to the pending question.
    ///
    /// Returns the question that was answered, or `None` when no question
    /// was pending.
    pub fn record_answer(&mut self, answer: &str) -> Option<&'static OnboardingQuestion> {
        let key = self.current_question.take()?;
        let question = self.questions().iter().find(|q| q.key == key)?;
        let answer = answer.trim().to_string();
        if question.target.names_topic() && self.topic.is_none() {
            self.topic = Some(answer.clone());
        }
        self.answers.insert(key, answer);
        self.is_complete = self.next_unanswered().is_none();
        Some(question)
    }
}
