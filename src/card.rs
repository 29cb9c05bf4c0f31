use crate::types::{AgentCapabilities, AgentCard, AgentProvider, AgentSkill};
use serde::{Deserialize, Serialize};

fn text_modes() -> Vec<String> {
    vec!["text".to_string()]
}

/// Agent card settings, the `[agent]` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCardConfig {
    pub name: String,
    pub description: String,
    pub version: String,
    pub streaming: bool,
    pub input_modes: Vec<String>,
    pub output_modes: Vec<String>,
    pub provider_organization: Option<String>,
    pub documentation_url: Option<String>,
    pub skills: Vec<AgentSkill>,
}

impl Default for AgentCardConfig {
    fn default() -> Self {
        Self {
            name: "MultiURLBrowser".to_string(),
            description: "Agent designed to efficiently scrape specified content from multiple URLs or single URL provided by the user.".to_string(),
            version: "1.0.0".to_string(),
            streaming: true,
            input_modes: text_modes(),
            output_modes: text_modes(),
            provider_organization: None,
            documentation_url: None,
            skills: vec![default_skill()],
        }
    }
}

fn default_skill() -> AgentSkill {
    AgentSkill {
        id: "MultiURLBrowser".to_string(),
        name: "MultiURLBrowser_Agent".to_string(),
        description: "Agent to scrape content from the URLs specified by the user.".to_string(),
        tags: ["multi-url", "browser", "scraper", "web"]
            .iter()
            .map(|t| t.to_string())
            .collect(),
        examples: vec![
            "Scrape the URL: https://medium.com/@neeraj_agrawal/an-ai-travel-agent-in-action-a-detailed-look-at-how-two-agents-plan-a-trip-86a1735368e1".to_string(),
            "Extract data from: https://www.example.com/page1 and https://www.example.com/page2".to_string(),
        ],
        input_modes: None,
        output_modes: None,
    }
}

/// Builds the card advertised at `/.well-known/agent.json`.
pub fn build_agent_card(config: &AgentCardConfig, public_url: &str) -> AgentCard {
    AgentCard {
        name: config.name.clone(),
        description: config.description.clone(),
        url: public_url.to_string(),
        version: config.version.clone(),
        provider: config.provider_organization.as_ref().map(|organization| AgentProvider {
            organization: organization.clone(),
            url: None,
        }),
        documentation_url: config.documentation_url.clone(),
        capabilities: AgentCapabilities {
            streaming: config.streaming,
            ..AgentCapabilities::default()
        },
        default_input_modes: config.input_modes.clone(),
        default_output_modes: config.output_modes.clone(),
        skills: config.skills.clone(),
    }
}
