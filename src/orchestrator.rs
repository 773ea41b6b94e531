//! Turn orchestration
//!
//! Loads a user's conversation state, routes the message, invokes the
//! chosen agent with an assembled context, and records the exchange.
//!
//! Ordinary turns do an unlocked read-modify-write on a cloned state, so
//! overlapping turns from one user are last-writer-wins. Store failures
//! degrade to the in-process cache and never fail a turn; agent failures
//! propagate and leave the prior state untouched.

mod context;
mod extract;

pub use extract::{ContextExtractor, ContextField, ContextUpdate, ExtractionError, DEFAULT_MIN_CONFIDENCE};

use crate::agent::prompt::DEFAULT_HISTORY_WINDOW;
use crate::agent::{Agent, AgentContext, AgentIdentity, AgentResponse};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::learning::{AgentDiscoveries, LearningContextService, SharedLearningContext};
use crate::profile::ProfileSource;
use crate::router::{self, IntentClassifier, RouteDecision, RoutingRule};
use crate::state_machine::{
    apply_response, ConversationState, DialogueMode, DialogueTurn, TransitionNote, TurnOutcome,
};
use crate::store::ConversationStore;
use context::take_agent_context;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Turns of history the classifier sees
const CLASSIFIER_HISTORY: usize = 5;
const DEFAULT_TRANSITION_MESSAGE: &str = "Let me help you with that.";

pub struct Orchestrator {
    agents: HashMap<AgentIdentity, Arc<dyn Agent>>,
    classifier: IntentClassifier,
    learning: Arc<dyn LearningContextService>,
    profiles: Arc<dyn ProfileSource>,
    /// Durable store; `None` keeps state in process only
    store: Option<ConversationStore>,
    cache: RwLock<HashMap<Uuid, ConversationState>>,
    extractor: Option<Arc<ContextExtractor>>,
    history_window: usize,
}

impl Orchestrator {
    pub fn new(
        classifier: IntentClassifier,
        learning: Arc<dyn LearningContextService>,
        profiles: Arc<dyn ProfileSource>,
    ) -> Self {
        Self {
            agents: HashMap::new(),
            classifier,
            learning,
            profiles,
            store: None,
            cache: RwLock::new(HashMap::new()),
            extractor: None,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: ConversationStore) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<ContextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    #[must_use]
    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Arc<dyn Agent>>) -> Self {
        for agent in agents {
            self.register_agent(agent);
        }
        self
    }

    /// Register an agent, replacing any with the same identity
    pub fn register_agent(&mut self, agent: Arc<dyn Agent>) {
        let identity = agent.identity();
        if self.agents.insert(identity, agent).is_some() {
            tracing::debug!(agent = %identity, "Replaced registered agent");
        }
    }

    /// Registered identities, in canonical order
    pub fn available_agents(&self) -> Vec<AgentIdentity> {
        AgentIdentity::ALL
            .into_iter()
            .filter(|a| self.agents.contains_key(a))
            .collect()
    }

    // ========================================================================
    // Turns
    // ========================================================================

    /// Route a message to the right agent and record the exchange
    pub async fn route_message(
        &self,
        user_id: Uuid,
        message: &str,
        session_id: Option<Uuid>,
    ) -> OrchestratorResult<AgentResponse> {
        let mut state = self.load_or_create(user_id, session_id).await;

        let (target, rule) = match router::route(&mut state.routing, state.current_agent, message) {
            RouteDecision::Route { agent, rule } => (agent, rule),
            RouteDecision::Classify => {
                let agent = self
                    .classifier
                    .classify(message, state.recent_turns(CLASSIFIER_HISTORY))
                    .await;
                (agent, RoutingRule::Classifier)
            }
        };

        let agent = self.agent_or_coach(target)?;
        let identity = agent.identity();
        tracing::info!(user_id = %user_id, agent = %identity, rule = ?rule, "Routed message");

        state.current_agent = identity;
        let ctx = self.agent_context(&mut state, identity).await;
        let response = agent.respond(&ctx, message).await?;

        state.record_exchange(message, &response.text, identity);
        self.spawn_extraction(user_id, message);
        self.finish_turn(state, &response).await;
        Ok(response)
    }

    /// Send a message to a specific agent, bypassing the router
    pub async fn force_agent(
        &self,
        user_id: Uuid,
        agent: AgentIdentity,
        message: &str,
        session_id: Option<Uuid>,
    ) -> OrchestratorResult<AgentResponse> {
        let handler = self.registered(agent)?;
        let mut state = self.load_or_create(user_id, session_id).await;
        state.current_agent = agent;
        tracing::info!(user_id = %user_id, agent = %agent, "Forced agent");

        let ctx = self.agent_context(&mut state, agent).await;
        let response = handler.respond(&ctx, message).await?;

        state.record_exchange(message, &response.text, agent);
        self.finish_turn(state, &response).await;
        Ok(response)
    }

    /// Hand a live conversation to another agent
    pub async fn transition_to(
        &self,
        user_id: Uuid,
        agent: AgentIdentity,
        message: Option<&str>,
    ) -> OrchestratorResult<AgentResponse> {
        let handler = self.registered(agent)?;
        let mut state = self
            .load_state(user_id)
            .await
            .ok_or(OrchestratorError::NoActiveConversation(user_id))?;

        let from = state.current_agent;
        state.current_agent = agent;
        state.routing.transition = Some(TransitionNote {
            from,
            message: message.map(str::to_string),
        });
        tracing::info!(user_id = %user_id, from = %from, to = %agent, "Transitioning");

        let ctx = self.agent_context(&mut state, agent).await;
        let response = handler
            .respond(&ctx, message.unwrap_or(DEFAULT_TRANSITION_MESSAGE))
            .await?;

        state.push_turn(DialogueTurn::system(format!(
            "Transitioned from {from} to {agent}"
        )));
        state.push_turn(DialogueTurn::assistant(response.text.clone(), agent));
        self.finish_turn(state, &response).await;
        Ok(response)
    }

    /// Start an explain-it-back dialogue; routing stays with the Socratic
    /// agent until the mode ends.
    pub async fn start_explanation_dialogue(
        &self,
        user_id: Uuid,
        topic: &str,
        session_id: Option<Uuid>,
    ) -> OrchestratorResult<AgentResponse> {
        self.start_mode(
            user_id,
            session_id,
            DialogueMode::Explanation {
                topic: topic.to_string(),
            },
            "start_dialogue",
            &format!("I want to explain {topic}"),
            format!("Started explanation dialogue on: {topic}"),
        )
        .await
    }

    /// Start a quiz; routing stays with the assessment agent until the
    /// mode ends.
    pub async fn start_quiz(
        &self,
        user_id: Uuid,
        topics: Vec<String>,
        question_count: u32,
        session_id: Option<Uuid>,
    ) -> OrchestratorResult<AgentResponse> {
        let note = format!("Started quiz on: {}", topics.join(", "));
        self.start_mode(
            user_id,
            session_id,
            DialogueMode::Quiz {
                topics,
                question_count,
            },
            "generate_quiz",
            "Start quiz",
            note,
        )
        .await
    }

    async fn start_mode(
        &self,
        user_id: Uuid,
        session_id: Option<Uuid>,
        mode: DialogueMode,
        action: &str,
        opening: &str,
        note: String,
    ) -> OrchestratorResult<AgentResponse> {
        let owner = mode.owner();
        let handler = self.registered(owner)?;
        let mut state = self.load_or_create(user_id, session_id).await;
        state.current_agent = owner;
        state.routing.clear_stale_hints();
        state.routing.mode = Some(mode);
        state.routing.selected_action = Some(action.to_string());
        tracing::info!(user_id = %user_id, agent = %owner, action, "Starting mode");

        let ctx = self.agent_context(&mut state, owner).await;
        let response = handler.respond(&ctx, opening).await?;

        state.push_turn(DialogueTurn::system(note));
        state.push_turn(DialogueTurn::assistant(response.text.clone(), owner));
        self.finish_turn(state, &response).await;
        Ok(response)
    }

    /// Clear the active mode. Returns whether one was active.
    pub async fn end_mode(&self, user_id: Uuid) -> bool {
        let Some(mut state) = self.load_state(user_id).await else {
            return false;
        };
        let Some(mode) = state.routing.mode.take() else {
            return false;
        };
        tracing::info!(user_id = %user_id, agent = %mode.owner(), "Ended mode");
        self.save_state(&state).await;
        true
    }

    /// Classify a message without routing it
    pub async fn classify_intent(
        &self,
        message: &str,
        state: Option<&ConversationState>,
    ) -> AgentIdentity {
        let history = state.map_or(&[][..], |s| s.recent_turns(CLASSIFIER_HISTORY));
        self.classifier.classify(message, history).await
    }

    // ========================================================================
    // State access
    // ========================================================================

    pub async fn get_conversation_state(&self, user_id: Uuid) -> Option<ConversationState> {
        self.load_state(user_id).await
    }

    /// Forget the conversation. Idempotent.
    pub async fn reset_conversation(&self, user_id: Uuid) {
        self.delete_state(user_id).await;
        tracing::info!(user_id = %user_id, "Conversation reset");
    }

    /// Atomically transform a live conversation state.
    ///
    /// Uses the store's advisory lock when durable persistence is on, and
    /// the cache's write lock otherwise.
    pub async fn update_state_locked<R, F>(&self, user_id: Uuid, transform: F) -> OrchestratorResult<R>
    where
        F: FnOnce(&mut ConversationState) -> R + Send,
        R: Send,
    {
        let Some(store) = &self.store else {
            let mut cache = self.cache.write().await;
            let state = cache
                .get_mut(&user_id)
                .ok_or(OrchestratorError::NoActiveConversation(user_id))?;
            return Ok(transform(state));
        };

        let update = store.get_and_update(user_id, transform).await?;
        if !update.lock_acquired {
            return Err(OrchestratorError::LockNotAcquired(user_id));
        }
        match (update.result, update.state) {
            (Some(result), Some(state)) => {
                self.cache.write().await.insert(user_id, state);
                Ok(result)
            }
            _ => Err(OrchestratorError::NoActiveConversation(user_id)),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn registered(&self, agent: AgentIdentity) -> OrchestratorResult<Arc<dyn Agent>> {
        self.agents
            .get(&agent)
            .cloned()
            .ok_or(OrchestratorError::UnknownAgent(agent))
    }

    fn agent_or_coach(&self, target: AgentIdentity) -> OrchestratorResult<Arc<dyn Agent>> {
        if let Some(agent) = self.agents.get(&target) {
            return Ok(Arc::clone(agent));
        }
        tracing::warn!(agent = %target, "Agent not registered, falling back to coach");
        self.registered(AgentIdentity::Coach)
    }

    async fn agent_context(&self, state: &mut ConversationState, agent: AgentIdentity) -> AgentContext {
        let user_id = state.user_id;
        let learning = match self.learning.get_context(user_id).await {
            Ok(learning) => learning,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Learning context unavailable");
                SharedLearningContext::default()
            }
        };
        let discoveries = match self.learning.get_discoveries(user_id).await {
            Ok(discoveries) => discoveries,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Discoveries unavailable");
                AgentDiscoveries::default()
            }
        };
        take_agent_context(state, agent, learning, discoveries, self.history_window)
    }

    /// Fold the reply into state, record side effects, then save or delete
    async fn finish_turn(&self, mut state: ConversationState, response: &AgentResponse) {
        let user_id = state.user_id;

        for action in &response.actions {
            tracing::info!(user_id = %user_id, agent = %action.agent, action = %action.action, "Agent action");
        }

        if let Some(delta) = response.discoveries.clone().filter(|d| !d.is_empty()) {
            if let Err(e) = self.learning.append_discoveries(user_id, delta).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to record discoveries");
            }
        }

        match apply_response(&mut state, response) {
            TurnOutcome::End => {
                tracing::info!(user_id = %user_id, agent = %response.agent, "Conversation ended");
                self.delete_state(user_id).await;
            }
            TurnOutcome::Persist => self.save_state(&state).await,
        }
    }

    /// Infer learning-context updates in the background
    fn spawn_extraction(&self, user_id: Uuid, message: &str) {
        let Some(extractor) = &self.extractor else {
            return;
        };
        let extractor = Arc::clone(extractor);
        let message = message.to_string();
        tokio::spawn(async move {
            let applied = extractor.extract_and_apply(user_id, &message).await;
            if !applied.is_empty() {
                tracing::info!(user_id = %user_id, fields = ?applied, "Learned from message");
            }
        });
    }

    async fn load_or_create(&self, user_id: Uuid, session_id: Option<Uuid>) -> ConversationState {
        if let Some(mut state) = self.load_state(user_id).await {
            if session_id.is_some() {
                state.session_id = session_id;
            }
            return state;
        }

        self.seed_learning_context(user_id).await;
        tracing::info!(user_id = %user_id, "Starting conversation");
        ConversationState::new(user_id, session_id)
    }

    /// Copy profile facts into an empty learning context
    async fn seed_learning_context(&self, user_id: Uuid) {
        match self.learning.get_context(user_id).await {
            Ok(ctx) if ctx.primary_goal.is_some() => return,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Cannot seed learning context");
                return;
            }
        }
        let profile = match self.profiles.profile(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Profile unavailable");
                return;
            }
        };
        match self.learning.seed_from_profile(user_id, &profile).await {
            Ok(true) => tracing::info!(user_id = %user_id, "Seeded learning context from profile"),
            Ok(false) => {}
            Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Failed to seed learning context"),
        }
    }

    async fn load_state(&self, user_id: Uuid) -> Option<ConversationState> {
        if let Some(store) = &self.store {
            match store.get(user_id).await {
                Ok(Some(state)) => {
                    self.cache.write().await.insert(user_id, state.clone());
                    return Some(state);
                }
                Ok(None) => {
                    self.cache.write().await.remove(&user_id);
                    return None;
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "State store unavailable, using cache");
                }
            }
        }
        self.cache.read().await.get(&user_id).cloned()
    }

    async fn save_state(&self, state: &ConversationState) {
        self.cache
            .write()
            .await
            .insert(state.user_id, state.clone());
        if let Some(store) = &self.store {
            if let Err(e) = store.set(state).await {
                tracing::warn!(user_id = %state.user_id, error = %e, "Failed to persist state");
            }
        }
    }

    async fn delete_state(&self, user_id: Uuid) {
        self.cache.write().await.remove(&user_id);
        if let Some(store) = &self.store {
            if let Err(e) = store.delete(user_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to delete state");
            }
        }
    }
}
