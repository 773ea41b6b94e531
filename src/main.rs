//! Tutor Relay - interactive front end for the routing core
//!
//! Reads messages from stdin, routes each to the right agent, and prints
//! the reply. Slash commands drive the explicit orchestrator operations.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tutor_relay::agent::{AgentIdentity, AgentResponse, PersonaAgent};
use tutor_relay::config::RelayConfig;
use tutor_relay::db::Database;
use tutor_relay::learning::{DatabaseLearningService, LearningContextService};
use tutor_relay::llm::LlmConfig;
use tutor_relay::orchestrator::{ContextExtractor, Orchestrator};
use tutor_relay::profile::{NoProfiles, ProfileSource, StaticProfiles};
use tutor_relay::router::IntentClassifier;
use tutor_relay::store::{ConversationStore, DatabaseStateStore};
use uuid::Uuid;

const HELP: &str = "\
Commands:
  /agent <name> <message>   send a message to a specific agent
  /switch <name>            hand the conversation to another agent
  /explain <topic>          start an explanation dialogue
  /quiz <topic>[,topic...]  start a five-question quiz
  /done                     end the current dialogue or quiz
  /state                    print the conversation state
  /reset                    forget the conversation
  /quit                     exit";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tutor_relay=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("TUTOR_LOG_JSON").is_ok() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_response(response: &AgentResponse) {
    println!("[{}] {}", response.agent.display_name(), response.text);
    for option in &response.menu {
        println!("  {}. {}", option.number, option.label);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = RelayConfig::from_env();
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let completion = LlmConfig::from_env().build()?;
    tracing::info!(model = %completion.model_id(), "Completion service ready");

    let learning: Arc<dyn LearningContextService> = Arc::new(DatabaseLearningService::new(db.clone()));
    let profiles: Arc<dyn ProfileSource> = match std::env::var("TUTOR_PROFILE_PATH") {
        Ok(path) => {
            let profiles = StaticProfiles::from_json_file(&path)?;
            tracing::info!(path = %path, count = profiles.len(), "Loaded profiles");
            Arc::new(profiles)
        }
        Err(_) => Arc::new(NoProfiles),
    };

    let extractor = ContextExtractor::new(Arc::clone(&completion), Arc::clone(&learning))?
        .with_min_confidence(config.extraction_min_confidence);
    let agents = PersonaAgent::full_roster(&completion, &learning);

    let mut orchestrator = Orchestrator::new(IntentClassifier::new(Arc::clone(&completion)), learning, profiles)
        .with_agents(agents)
        .with_extractor(Arc::new(extractor))
        .with_history_window(config.history_window);
    if config.persistence_enabled {
        tracing::info!(ttl_secs = config.state_ttl.as_secs(), "Durable conversation state enabled");
        orchestrator = orchestrator.with_store(
            ConversationStore::new(Arc::new(DatabaseStateStore::new(db)))
                .with_state_ttl(config.state_ttl)
                .with_lock_policy(config.lock_policy),
        );
    }

    let user_id = match std::env::var("TUTOR_USER_ID") {
        Ok(raw) => raw.parse::<Uuid>()?,
        Err(_) => Uuid::new_v4(),
    };
    let session_id = Some(Uuid::new_v4());
    tracing::info!(user_id = %user_id, "Session started");
    println!("Tutor Relay. Type a message, or /help.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.strip_prefix('/') {
            Some(cmd) => cmd.split_once(' ').map_or((cmd, ""), |(c, r)| (c, r.trim())),
            None => ("", line),
        };

        let result = match command {
            "" => orchestrator.route_message(user_id, rest, session_id).await,
            "quit" | "exit" => break,
            "help" => {
                println!("{HELP}");
                continue;
            }
            "reset" => {
                orchestrator.reset_conversation(user_id).await;
                println!("Conversation reset.");
                continue;
            }
            "state" => {
                match orchestrator.get_conversation_state(user_id).await {
                    Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                    None => println!("No active conversation."),
                }
                continue;
            }
            "done" => {
                if orchestrator.end_mode(user_id).await {
                    println!("Mode ended.");
                } else {
                    println!("No active mode.");
                }
                continue;
            }
            "explain" if !rest.is_empty() => {
                orchestrator
                    .start_explanation_dialogue(user_id, rest, session_id)
                    .await
            }
            "quiz" if !rest.is_empty() => {
                let topics = rest
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
                orchestrator.start_quiz(user_id, topics, 5, session_id).await
            }
            "agent" | "switch" => {
                let (name, message) = rest.split_once(' ').unwrap_or((rest, ""));
                let agent = match name.parse::<AgentIdentity>() {
                    Ok(agent) => agent,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                if command == "agent" {
                    orchestrator
                        .force_agent(user_id, agent, message.trim(), session_id)
                        .await
                } else {
                    orchestrator
                        .transition_to(user_id, agent, Some(message.trim()).filter(|m| !m.is_empty()))
                        .await
                }
            }
            _ => {
                println!("{HELP}");
                continue;
            }
        };

        match result {
            Ok(response) => print_response(&response),
            Err(e) => {
                tracing::error!(error = %e, "Turn failed");
                println!("Error: {e}");
            }
        }
    }

    Ok(())
}
