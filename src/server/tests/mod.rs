pub mod handlers;
pub mod integration;
pub mod services;

use crate::bridge::{BridgeExecutor, SessionRegistry, TaskBridge};
use crate::card::{build_agent_card, AgentCardConfig};
use crate::provider::{ScriptStep, ScriptedProvider};
use crate::server::executor::AgentExecutor;
use std::sync::Arc;
use std::time::Duration;

/// Executor backed by a scripted provider replaying `script` on every turn.
pub(crate) fn scripted_executor(script: Vec<ScriptStep>) -> Arc<dyn AgentExecutor> {
    let provider = Arc::new(ScriptedProvider::new(script));
    let bridge = Arc::new(TaskBridge::new(provider, Arc::new(SessionRegistry::default())));
    Arc::new(BridgeExecutor::new(bridge))
}

/// Like [`scripted_executor`], but each step arrives `delay` after the previous one.
pub(crate) fn slow_executor(script: Vec<ScriptStep>, delay: Duration) -> Arc<dyn AgentExecutor> {
    let provider = Arc::new(ScriptedProvider::new(script).with_step_delay(delay));
    let bridge = Arc::new(TaskBridge::new(provider, Arc::new(SessionRegistry::default())));
    Arc::new(BridgeExecutor::new(bridge))
}

pub(crate) fn failing_executor(message: &str) -> Arc<dyn AgentExecutor> {
    let provider = Arc::new(ScriptedProvider::failing(message));
    let bridge = Arc::new(TaskBridge::new(provider, Arc::new(SessionRegistry::default())));
    Arc::new(BridgeExecutor::new(bridge))
}

pub(crate) fn two_url_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::working("calling scrape_url"),
        ScriptStep::working("scrape_url returned"),
        ScriptStep::reply("a.test says hello. b.test says goodbye."),
    ]
}

pub(crate) fn test_card(public_url: &str) -> crate::types::AgentCard {
    build_agent_card(&AgentCardConfig::default(), public_url)
}
