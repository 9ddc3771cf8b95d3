// SPDX-License-Identifier: MIT

//! Node factory - constructs nodes from definitions
//!
//! Each node `kind` has a params struct deserialized from the definition's
//! `params` value. Shared collaborators (model, tools, prompter) come from
//! `NodeServices`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::adk::error::{ModelError, WorkflowError};
use crate::adk::model::gemini::GeminiModel;
use crate::adk::model::openai::OpenAIModel;
use crate::adk::model::{Model, Provider};
use crate::waypoint::config::Config;
use crate::waypoint::nodes::summary::{RESEARCH_TEMPLATE, SUMMARY_FALLBACK, TRAVEL_TEMPLATE};
use crate::waypoint::nodes::{
    ClassifyNode, CurrencyNode, ExtractNode, ExtractionSchema, FieldPrompter, FillMissingNode,
    HotelEstimateNode, ItineraryNode, NoPrompter, PersistNode, ResearchNode, SummaryNode,
    ToolNode, TopicRule,
};
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::registry::ToolRegistry;
use crate::waypoint::workflow::types::NodeDefinition;

/// Node kinds the factory knows
pub const NODE_KINDS: &[&str] = &[
    "extract",
    "fill_missing",
    "classify",
    "tool",
    "hotel_estimate",
    "currency",
    "itinerary",
    "research",
    "summarize",
    "persist",
];

/// Collaborators handed to every node the factory builds
#[derive(Clone)]
pub struct NodeServices {
    pub config: Arc<Config>,
    /// `None` when no provider is configured; model-backed kinds then fail to build
    pub model: Option<Arc<dyn Model>>,
    pub tools: ToolRegistry,
    pub prompter: Arc<dyn FieldPrompter>,
}

impl NodeServices {
    pub fn new(config: Arc<Config>, model: Option<Arc<dyn Model>>, tools: ToolRegistry) -> Self {
        Self {
            config,
            model,
            tools,
            prompter: Arc::new(NoPrompter),
        }
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn FieldPrompter>) -> Self {
        self.prompter = prompter;
        self
    }
}

/// Create the model named by overrides or configuration.
///
/// Provider precedence: explicit override, `MODEL_PROVIDER`, inference from
/// the model name, then Groq. The model name falls back to the provider's
/// default.
pub fn create_model(
    config: &Config,
    client: reqwest::Client,
    provider: Option<&str>,
    model_name: Option<&str>,
) -> Result<Arc<dyn Model>, ModelError> {
    let model_name = model_name
        .map(str::to_string)
        .or_else(|| config.model_name.clone());

    let provider = match provider.map(str::to_string).or_else(|| config.model_provider.clone()) {
        Some(p) => p.parse::<Provider>()?,
        None => model_name
            .as_deref()
            .map(Provider::infer_from_model)
            .unwrap_or(Provider::Groq),
    };
    let model_name = model_name.unwrap_or_else(|| provider.default_model().to_string());

    log::debug!("Using provider '{}' with model '{}'", provider, model_name);

    match provider {
        Provider::OpenAI => Ok(Arc::new(OpenAIModel::new(
            client,
            provider,
            model_name,
            config.openai.api_key.clone(),
            config.openai.base_url.clone(),
        )?)),
        Provider::Groq => Ok(Arc::new(OpenAIModel::new(
            client,
            provider,
            model_name,
            config.groq.api_key.clone(),
            config.groq.base_url.clone(),
        )?)),
        Provider::Gemini => Ok(Arc::new(GeminiModel::new(
            client,
            model_name,
            config.gemini.api_key.clone(),
            config.gemini.base_url.clone(),
        )?)),
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ExtractParams {
    schema: ExtractionSchema,
    fields: Vec<String>,
    uppercase: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldSpec {
    Name(String),
    Labeled { field: String, label: Option<String> },
}

impl FieldSpec {
    fn into_pair(self) -> (String, String) {
        match self {
            FieldSpec::Name(field) => {
                let label = default_label(&field);
                (field, label)
            }
            FieldSpec::Labeled { field, label } => {
                let label = label.unwrap_or_else(|| default_label(&field));
                (field, label)
            }
        }
    }
}

/// `start_date` -> `Start Date`
fn default_label(field: &str) -> String {
    field
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct FillMissingParams {
    fields: Vec<FieldSpec>,
    required: bool,
}

#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
enum ClassifyModeParam {
    #[default]
    Keywords,
    Model,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ClassifyParams {
    mode: ClassifyModeParam,
    rules: Vec<TopicRule>,
    default: Option<String>,
    keep_existing: bool,
    source: Option<String>,
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolParams {
    tool: String,
    output: String,
    /// tool argument -> state path
    #[serde(default)]
    args: BTreeMap<String, String>,
    #[serde(default)]
    static_args: Map<String, Value>,
    extract: Option<String>,
    fallback: Option<Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct HotelParams {
    nightly_rate: Option<f64>,
    default_nights: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct CurrencyParams {
    home_currency: Option<String>,
    tool: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ItineraryParams {
    source: Option<String>,
    max_days: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResearchParams {
    domain: String,
    instruction: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SummarizeParams {
    template: String,
    select_by: Option<String>,
    templates: HashMap<String, String>,
    fallback: Option<String>,
    output: Option<String>,
}

impl Default for SummarizeParams {
    fn default() -> Self {
        Self {
            template: "builtin:research".to_string(),
            select_by: None,
            templates: HashMap::new(),
            fallback: Some(SUMMARY_FALLBACK.to_string()),
            output: None,
        }
    }
}

/// `builtin:travel` and `builtin:research` name the bundled templates
fn resolve_template(template: &str) -> String {
    match template.trim() {
        "builtin:travel" => TRAVEL_TEMPLATE.to_string(),
        "builtin:research" => RESEARCH_TEMPLATE.to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PersistParams {
    prefix: String,
    output_dir: Option<PathBuf>,
    persist: bool,
}

impl Default for PersistParams {
    fn default() -> Self {
        Self {
            prefix: "summary".to_string(),
            output_dir: None,
            persist: true,
        }
    }
}

/// Factory for creating nodes from definitions
pub struct NodeFactory {
    services: NodeServices,
}

impl NodeFactory {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &NodeServices {
        &self.services
    }

    /// Build a node from a NodeDefinition
    pub fn build(&self, def: &NodeDefinition) -> Result<Arc<dyn Node>, WorkflowError> {
        log::debug!("Building node '{}' of kind '{}'", def.id, def.kind);
        let id = def.id.clone();
        let config = &self.services.config;

        let node: Arc<dyn Node> = match def.kind.as_str() {
            "extract" => {
                let p: ExtractParams = params(def)?;
                let mut node =
                    ExtractNode::new(id, self.model(def)?, p.schema).with_fields(p.fields);
                if let Some(uppercase) = p.uppercase {
                    node = node.with_uppercase(uppercase);
                }
                Arc::new(node)
            }
            "fill_missing" => {
                let p: FillMissingParams = params(def)?;
                let fields = p.fields.into_iter().map(FieldSpec::into_pair).collect();
                Arc::new(
                    FillMissingNode::new(id, fields, self.services.prompter.clone())
                        .required(p.required),
                )
            }
            "classify" => {
                let p: ClassifyParams = params(def)?;
                let rules = if p.rules.is_empty() {
                    ClassifyNode::default_rules()
                } else {
                    p.rules
                };
                let mut node = match p.mode {
                    ClassifyModeParam::Keywords => ClassifyNode::keywords(id, rules),
                    ClassifyModeParam::Model => ClassifyNode::model(id, self.model(def)?, rules),
                }
                .with_default(p.default)
                .keep_existing(p.keep_existing);
                if let Some(source) = p.source {
                    node = node.source(source);
                }
                if let Some(output) = p.output {
                    node = node.output_key(output);
                }
                Arc::new(node)
            }
            "tool" => {
                let p: ToolParams = params(def)?;
                let mut node = ToolNode::new(id, self.services.tools.clone(), p.tool, p.output)
                    .extract(p.extract)
                    .fallback(p.fallback);
                for (arg, path) in p.args {
                    node = node.arg(arg, path);
                }
                for (arg, value) in p.static_args {
                    node = node.static_arg(arg, value);
                }
                Arc::new(node)
            }
            "hotel_estimate" => {
                let p: HotelParams = params(def)?;
                let rate = p.nightly_rate.unwrap_or(config.nightly_rate);
                if !(rate.is_finite() && rate >= 0.0) {
                    return Err(invalid(def, "nightly_rate must be a non-negative number"));
                }
                Arc::new(HotelEstimateNode::new(
                    id,
                    rate,
                    p.default_nights.unwrap_or(config.default_nights),
                ))
            }
            "currency" => {
                let p: CurrencyParams = params(def)?;
                let home = p.home_currency.unwrap_or_else(|| config.home_currency.clone());
                let mut node = CurrencyNode::new(id, self.services.tools.clone(), &home);
                if let Some(tool) = p.tool {
                    node = node.with_tool(tool);
                }
                Arc::new(node)
            }
            "itinerary" => {
                let p: ItineraryParams = params(def)?;
                let mut node = ItineraryNode::new(id).max_days(p.max_days);
                if let Some(source) = p.source {
                    node = node.source(source);
                }
                Arc::new(node)
            }
            "research" => {
                let p: ResearchParams = params(def)?;
                if p.domain.trim().is_empty() {
                    return Err(invalid(def, "domain must not be empty"));
                }
                let mut node = ResearchNode::new(id, self.model(def)?, &p.domain);
                if let Some(instruction) = p.instruction {
                    node = node.with_instruction(instruction);
                }
                Arc::new(node)
            }
            "summarize" => {
                let p: SummarizeParams = params(def)?;
                let mut node = SummaryNode::new(id, self.model(def)?, resolve_template(&p.template))
                    .fallback(p.fallback);
                if let Some(field) = p.select_by {
                    node = node.select_by(field);
                }
                for (key, template) in &p.templates {
                    node = node.template_for(key, resolve_template(template));
                }
                if let Some(output) = p.output {
                    node = node.output_key(output);
                }
                Arc::new(node)
            }
            "persist" => {
                let p: PersistParams = params(def)?;
                let dir = p.output_dir.unwrap_or_else(|| config.output_dir.clone());
                Arc::new(PersistNode::new(id, dir, &p.prefix).persist(p.persist))
            }
            other => {
                return Err(WorkflowError::UnknownNodeKind {
                    node: def.id.clone(),
                    kind: other.to_string(),
                })
            }
        };
        Ok(node)
    }

    fn model(&self, def: &NodeDefinition) -> Result<Arc<dyn Model>, WorkflowError> {
        self.services.model.clone().ok_or_else(|| {
            invalid(
                def,
                "this node kind needs a model; configure MODEL_PROVIDER and its API key",
            )
        })
    }
}

/// Deserialize `params`; absent params read as an empty map
fn params<T: DeserializeOwned>(def: &NodeDefinition) -> Result<T, WorkflowError> {
    let value = match &def.params {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| invalid(def, e.to_string()))
}

fn invalid(def: &NodeDefinition, message: impl Into<String>) -> WorkflowError {
    WorkflowError::InvalidParams {
        node: def.id.clone(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::nodes::testing::ScriptedModel;
    use crate::waypoint::workflow::node::OnError;
    use serde_json::json;

    fn def(id: &str, kind: &str, params: Value) -> NodeDefinition {
        NodeDefinition {
            id: id.to_string(),
            kind: kind.to_string(),
            params,
            on_error: OnError::Continue,
        }
    }

    fn factory(with_model: bool) -> NodeFactory {
        let model: Option<Arc<dyn Model>> = if with_model {
            Some(Arc::new(ScriptedModel::new(vec![])))
        } else {
            None
        };
        NodeFactory::new(NodeServices::new(
            Arc::new(Config::default()),
            model,
            ToolRegistry::new(),
        ))
    }

    #[test]
    fn test_builds_every_kind() {
        let f = factory(true);
        let defs = vec![
            def("extract", "extract", json!({"schema": "trip"})),
            def(
                "fill",
                "fill_missing",
                json!({"fields": ["city", {"field": "month", "label": "Travel month"}]}),
            ),
            def("router", "classify", Value::Null),
            def(
                "weather",
                "tool",
                json!({"tool": "weather_forecast", "output": "weather", "args": {"city": "city"}}),
            ),
            def("hotel", "hotel_estimate", json!({"nightly_rate": 80.0})),
            def("currency", "currency", json!({"home_currency": "EUR"})),
            def("itinerary", "itinerary", Value::Null),
            def("research", "research", json!({"domain": "medical"})),
            def(
                "summarize",
                "summarize",
                json!({"template": "builtin:travel", "select_by": "topic"}),
            ),
            def("output", "persist", json!({"prefix": "travel"})),
        ];
        assert_eq!(defs.len(), NODE_KINDS.len());
        for d in &defs {
            let node = f.build(d).unwrap();
            assert_eq!(node.name(), d.id);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = factory(false).build(&def("x", "teleport", Value::Null)).err().unwrap();
        assert!(matches!(err, WorkflowError::UnknownNodeKind { kind, .. } if kind == "teleport"));
    }

    #[test]
    fn test_bad_params() {
        let f = factory(true);
        let err = f
            .build(&def("w", "tool", json!({"output": "weather"})))
            .err()
            .unwrap();
        assert!(matches!(err, WorkflowError::InvalidParams { node, .. } if node == "w"));

        let err = f
            .build(&def("h", "hotel_estimate", json!({"nightly_rate": -1.0})))
            .err()
            .unwrap();
        assert!(err.to_string().contains("nightly_rate"));

        assert!(f
            .build(&def("h", "hotel_estimate", json!({"nightly": 1})))
            .is_err());
    }

    #[test]
    fn test_model_kinds_need_a_model() {
        let err = factory(false)
            .build(&def("r", "research", json!({"domain": "financial"})))
            .err()
            .unwrap();
        assert!(err.to_string().contains("needs a model"));

        // keyword classification does not
        assert!(factory(false).build(&def("c", "classify", Value::Null)).is_ok());
    }

    #[test]
    fn test_default_label() {
        assert_eq!(default_label("start_date"), "Start Date");
        assert_eq!(default_label("city"), "City");
    }

    #[test]
    fn test_create_model_provider_selection() {
        let mut config = Config::default();
        config.groq.api_key = Some("gsk".to_string());
        let model = create_model(&config, reqwest::Client::new(), None, None).unwrap();
        assert_eq!(model.model_name(), Provider::Groq.default_model());

        config.gemini.api_key = Some("g".to_string());
        let model =
            create_model(&config, reqwest::Client::new(), None, Some("gemini-2.0-flash")).unwrap();
        assert_eq!(model.model_name(), "gemini-2.0-flash");

        let err = create_model(&config, reqwest::Client::new(), Some("openai"), None)
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::ApiKeyMissing(_)));

        let err = create_model(&config, reqwest::Client::new(), Some("anthropic"), None)
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::UnsupportedProvider(_)));
    }
}
