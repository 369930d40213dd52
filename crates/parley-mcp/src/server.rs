//! MCP tool front-end for the decision-cycle engine.
//!
//! Every tool is a thin wrapper around one engine operation, with plain JSON
//! argument and result shapes. When a [`ProxyClient`] is configured, every
//! call is forwarded verbatim to the remote server instead of executing
//! locally.

use parley_engine::{
    ConsensusEvaluator, DecisionCycleOrchestrator, ExecutionMode, MachineDefinition, Session,
    SharedStore, SpecialistRegistry, SpecialistRole, SpecialistSpec, TransitionExecutor,
    TransitionRecord, WebhookTarget,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ServerHandler,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::loader::load_machine;
use crate::proxy::ProxyClient;

/// MCP request for the run_session tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RunSessionRequest {
    #[schemars(description = "Path to the machine definition JSON file")]
    machine_file: String,
}

/// MCP request for the run_session_from_definition tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RunSessionFromDefinitionRequest {
    #[schemars(
        description = "Machine definition object: machineName, initialState, defaultState, states"
    )]
    machine: serde_json::Value,
}

/// MCP request for the create_session tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CreateSessionRequest {
    #[schemars(
        description = "Machine definition object: machineName, initialState, defaultState, states"
    )]
    machine: serde_json::Value,
}

/// MCP request for the get_session tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetSessionRequest {
    #[schemars(description = "The session ID to retrieve")]
    session_id: String,
}

/// MCP request for the get_sessions tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetSessionsRequest {}

/// MCP request for the register_proposer and register_voter tools
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RegisterSpecialistRequest {
    #[schemars(description = "Unique specialist id")]
    specialist_id: String,
    #[schemars(description = "Machine the specialist participates in")]
    machine_name: String,
    #[schemars(description = "Webhook URL resolving this specialist's answers")]
    webhook_url: Option<String>,
    #[schemars(description = "Name of the secret authenticating webhook calls")]
    webhook_token_name: Option<String>,
    #[schemars(description = "Model reference resolving this specialist's answers")]
    model_id: Option<String>,
    #[schemars(description = "Voting weight (default: 1.0)")]
    weight: Option<f64>,
}

/// MCP request for the execute_transition tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ExecuteTransitionRequest {
    #[schemars(description = "Session to transition")]
    session_id: String,
    #[schemars(description = "Transition name from the current state's table")]
    transition_name: String,
    #[schemars(description = "Target state the transition must map to")]
    to_state: String,
    #[schemars(description = "Reasoning recorded in the session history")]
    reasoning: Option<String>,
}

/// MCP request for the evaluate_consensus tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct EvaluateConsensusRequest {
    #[schemars(description = "Session whose proposals and votes to evaluate")]
    session_id: String,
}

/// Response for the run_session tools
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    session_id: Uuid,
    machine_name: String,
    initial_state: String,
    goal_state: String,
    final_state: String,
    history: Vec<TransitionRecord>,
}

impl From<Session> for RunSummary {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.session_id,
            machine_name: session.machine_name,
            initial_state: session.machine.initial_state,
            goal_state: session.machine.default_state,
            final_state: session.current_state,
            history: session.history,
        }
    }
}

/// Response for the create_session tool
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionSummary {
    session_id: Uuid,
    machine_name: String,
    current_state: String,
    initial_state: String,
    default_state: String,
}

/// Response for the register tools
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpecialistSummary {
    specialist_id: String,
    role: SpecialistRole,
    machine_name: String,
    weight: f64,
}

/// Response for the execute_transition tool
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransitionSummary {
    session_id: Uuid,
    current_state: String,
    history: Vec<TransitionRecord>,
}

pub struct ParleyServer {
    store: SharedStore,
    orchestrator: DecisionCycleOrchestrator,
    registry: SpecialistRegistry,
    executor: TransitionExecutor,
    consensus: ConsensusEvaluator,
    proxy: Option<ProxyClient>,
    tool_router: ToolRouter<Self>,
}

impl ParleyServer {
    pub fn new(store: SharedStore, proxy: Option<ProxyClient>) -> Self {
        Self {
            orchestrator: DecisionCycleOrchestrator::new(store.clone()),
            registry: SpecialistRegistry::new(store.clone()),
            executor: TransitionExecutor::new(store.clone()),
            consensus: ConsensusEvaluator::new(store.clone()),
            proxy,
            store,
            tool_router: Self::tool_router(),
        }
    }

    /// Local store, exposed for embedding and tests.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Dispatch a tool call by name, for transports carrying raw JSON
    /// arguments instead of going through the MCP router.
    pub(crate) async fn dispatch_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, String> {
        fn parse<T: serde::de::DeserializeOwned>(
            arguments: serde_json::Value,
        ) -> Result<Parameters<T>, String> {
            serde_json::from_value(arguments)
                .map(Parameters)
                .map_err(|e| format!("Invalid arguments: {e}"))
        }

        match name {
            "run_session" => self.run_session(parse(arguments)?).await,
            "run_session_from_definition" => {
                self.run_session_from_definition(parse(arguments)?).await
            }
            "create_session" => self.create_session(parse(arguments)?).await,
            "get_session" => self.get_session(parse(arguments)?).await,
            "get_sessions" => self.get_sessions(parse(arguments)?).await,
            "register_proposer" => self.register_proposer(parse(arguments)?).await,
            "register_voter" => self.register_voter(parse(arguments)?).await,
            "execute_transition" => self.execute_transition(parse(arguments)?).await,
            "evaluate_consensus" => self.evaluate_consensus(parse(arguments)?).await,
            _ => Err(format!("Unknown tool: {name}")),
        }
    }

    async fn forward(&self, name: &str, arguments: serde_json::Value) -> Option<Result<String, String>> {
        let proxy = self.proxy.as_ref()?;
        Some(
            proxy
                .call_tool(name, arguments)
                .await
                .map_err(|e| format!("{e:#}")),
        )
    }

    fn parse_machine(&self, machine: serde_json::Value) -> Result<MachineDefinition, String> {
        serde_json::from_value(machine).map_err(|e| format!("Invalid machine definition: {e}"))
    }

    fn parse_session_id(&self, session_id: &str) -> Result<Uuid, String> {
        Uuid::parse_str(session_id).map_err(|e| format!("Invalid session id: {e}"))
    }

    fn execution_mode(&self, req: &RegisterSpecialistRequest) -> Result<ExecutionMode, String> {
        match (&req.webhook_url, &req.model_id) {
            (Some(url), None) => Ok(ExecutionMode::Webhook(WebhookTarget {
                url: url.clone(),
                token_name: req.webhook_token_name.clone(),
            })),
            (None, Some(model)) => Ok(ExecutionMode::ModelRef(model.clone())),
            _ => Err(
                "Exactly one execution mode must be specified: webhook_url or model_id".to_string(),
            ),
        }
    }

    fn register(
        &self,
        req: RegisterSpecialistRequest,
        role: SpecialistRole,
    ) -> Result<String, String> {
        let mode = self.execution_mode(&req)?;
        let mut spec = SpecialistSpec::external(req.specialist_id, req.machine_name, role, mode);
        if let Some(weight) = req.weight {
            spec = spec.with_weight(weight);
        }
        let specialist = self.registry.register(spec).map_err(|e| e.to_string())?;
        to_pretty(&SpecialistSummary {
            specialist_id: specialist.id,
            role: specialist.role,
            machine_name: specialist.machine_name,
            weight: specialist.weight,
        })
    }
}

fn to_pretty<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

#[tool_router]
impl ParleyServer {
    #[tool(
        description = "Run a complete session from a machine definition file path. The session loops through decision cycles until it reaches the default state."
    )]
    async fn run_session(
        &self,
        Parameters(req): Parameters<RunSessionRequest>,
    ) -> Result<String, String> {
        if let Some(result) = self
            .forward(
                "run_session",
                serde_json::json!({ "machine_file": req.machine_file }),
            )
            .await
        {
            return result;
        }

        let machine = load_machine(&req.machine_file).map_err(|e| format!("{e:#}"))?;
        let session = self
            .orchestrator
            .run_session(machine)
            .await
            .map_err(|e| e.to_string())?;
        to_pretty(&RunSummary::from(session))
    }

    #[tool(
        description = "Run a complete session from a machine definition object. The session loops through decision cycles until it reaches the default state."
    )]
    async fn run_session_from_definition(
        &self,
        Parameters(req): Parameters<RunSessionFromDefinitionRequest>,
    ) -> Result<String, String> {
        if let Some(result) = self
            .forward(
                "run_session_from_definition",
                serde_json::json!({ "machine": req.machine }),
            )
            .await
        {
            return result;
        }

        let machine = self.parse_machine(req.machine)?;
        let session = self
            .orchestrator
            .run_session(machine)
            .await
            .map_err(|e| e.to_string())?;
        to_pretty(&RunSummary::from(session))
    }

    #[tool(description = "Create a new session from a machine definition")]
    async fn create_session(
        &self,
        Parameters(req): Parameters<CreateSessionRequest>,
    ) -> Result<String, String> {
        if let Some(result) = self
            .forward("create_session", serde_json::json!({ "machine": req.machine }))
            .await
        {
            return result;
        }

        let machine = self.parse_machine(req.machine)?;
        let session = self
            .store
            .create_session(machine)
            .map_err(|e| e.to_string())?;
        to_pretty(&SessionSummary {
            session_id: session.session_id,
            machine_name: session.machine_name,
            current_state: session.current_state,
            initial_state: session.machine.initial_state,
            default_state: session.machine.default_state,
        })
    }

    #[tool(description = "Get a session by its session ID")]
    async fn get_session(
        &self,
        Parameters(req): Parameters<GetSessionRequest>,
    ) -> Result<String, String> {
        if let Some(result) = self
            .forward(
                "get_session",
                serde_json::json!({ "session_id": req.session_id }),
            )
            .await
        {
            return result;
        }

        let session_id = self.parse_session_id(&req.session_id)?;
        let session = self
            .store
            .get_session(session_id)
            .map_err(|e| e.to_string())?;
        to_pretty(&session)
    }

    #[tool(description = "Get all active sessions")]
    async fn get_sessions(
        &self,
        Parameters(_req): Parameters<GetSessionsRequest>,
    ) -> Result<String, String> {
        if let Some(result) = self.forward("get_sessions", serde_json::json!({})).await {
            return result;
        }

        let sessions = self.store.list_sessions().map_err(|e| e.to_string())?;
        to_pretty(&sessions)
    }

    #[tool(
        description = "Register a proposer specialist for a machine. The specialist is resolved through a webhook URL or a model reference."
    )]
    async fn register_proposer(
        &self,
        Parameters(req): Parameters<RegisterSpecialistRequest>,
    ) -> Result<String, String> {
        if let Some(result) = self
            .forward(
                "register_proposer",
                serde_json::to_value(&RegisterArgs::from(&req)).map_err(|e| e.to_string())?,
            )
            .await
        {
            return result;
        }

        self.register(req, SpecialistRole::Proposer)
    }

    #[tool(
        description = "Register a voter specialist for a machine. The specialist is resolved through a webhook URL or a model reference."
    )]
    async fn register_voter(
        &self,
        Parameters(req): Parameters<RegisterSpecialistRequest>,
    ) -> Result<String, String> {
        if let Some(result) = self
            .forward(
                "register_voter",
                serde_json::to_value(&RegisterArgs::from(&req)).map_err(|e| e.to_string())?,
            )
            .await
        {
            return result;
        }

        self.register(req, SpecialistRole::Voter)
    }

    #[tool(description = "Execute a transition in a session")]
    async fn execute_transition(
        &self,
        Parameters(req): Parameters<ExecuteTransitionRequest>,
    ) -> Result<String, String> {
        if let Some(result) = self
            .forward(
                "execute_transition",
                serde_json::json!({
                    "session_id": req.session_id,
                    "transition_name": req.transition_name,
                    "to_state": req.to_state,
                    "reasoning": req.reasoning,
                }),
            )
            .await
        {
            return result;
        }

        let session_id = self.parse_session_id(&req.session_id)?;
        let session = self
            .executor
            .execute(session_id, &req.transition_name, &req.to_state, req.reasoning)
            .map_err(|e| e.to_string())?;
        to_pretty(&TransitionSummary {
            session_id: session.session_id,
            current_state: session.current_state,
            history: session.history,
        })
    }

    #[tool(description = "Evaluate consensus for proposals in a session")]
    async fn evaluate_consensus(
        &self,
        Parameters(req): Parameters<EvaluateConsensusRequest>,
    ) -> Result<String, String> {
        if let Some(result) = self
            .forward(
                "evaluate_consensus",
                serde_json::json!({ "session_id": req.session_id }),
            )
            .await
        {
            return result;
        }

        let session_id = self.parse_session_id(&req.session_id)?;
        let result = self
            .consensus
            .evaluate(session_id)
            .map_err(|e| e.to_string())?;
        to_pretty(&result)
    }
}

/// Serializable mirror of [`RegisterSpecialistRequest`] for forwarding.
#[derive(Serialize)]
struct RegisterArgs<'a> {
    specialist_id: &'a str,
    machine_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_token_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
}

impl<'a> From<&'a RegisterSpecialistRequest> for RegisterArgs<'a> {
    fn from(req: &'a RegisterSpecialistRequest) -> Self {
        Self {
            specialist_id: &req.specialist_id,
            machine_name: &req.machine_name,
            webhook_url: req.webhook_url.as_deref(),
            webhook_token_name: req.webhook_token_name.as_deref(),
            model_id: req.model_id.as_deref(),
            weight: req.weight,
        }
    }
}

#[tool_handler]
impl ServerHandler for ParleyServer {
    fn get_info(&self) -> ServerInfo {
        let mut instructions = "MCP server coordinating specialists deliberating over \
            finite-state machine sessions.\n\
            - run_session / run_session_from_definition: run decision cycles until the goal state\n\
            - create_session, get_session, get_sessions: session lifecycle\n\
            - register_proposer, register_voter: specialist registry\n\
            - execute_transition, evaluate_consensus: manual cycle steps"
            .to_string();
        if let Some(proxy) = &self.proxy {
            instructions.push_str(&format!(
                "\n\nAll tool calls are forwarded to the remote server at {}.",
                proxy.base_url()
            ));
        }

        ServerInfo {
            instructions: Some(instructions),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use parley_engine::DeliberationStore;

    use super::*;

    fn local_server() -> ParleyServer {
        ParleyServer::new(DeliberationStore::new().shared(), None)
    }

    fn two_state() -> serde_json::Value {
        serde_json::json!({
            "machineName": "two-state",
            "initialState": "pending",
            "defaultState": "done",
            "states": {
                "pending": { "transitions": { "complete": "done" } },
                "done": {}
            }
        })
    }

    #[tokio::test]
    async fn test_run_session_from_definition() {
        let server = local_server();
        let text = server
            .run_session_from_definition(Parameters(RunSessionFromDefinitionRequest {
                machine: two_state(),
            }))
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["machineName"], "two-state");
        assert_eq!(value["initialState"], "pending");
        assert_eq!(value["goalState"], "done");
        assert_eq!(value["finalState"], "done");
        assert_eq!(value["history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let server = local_server();
        let created = server
            .create_session(Parameters(CreateSessionRequest {
                machine: two_state(),
            }))
            .await
            .unwrap();
        let created: serde_json::Value = serde_json::from_str(&created).unwrap();
        assert_eq!(created["currentState"], "pending");

        let fetched = server
            .get_session(Parameters(GetSessionRequest {
                session_id: created["sessionId"].as_str().unwrap().to_string(),
            }))
            .await
            .unwrap();
        let fetched: serde_json::Value = serde_json::from_str(&fetched).unwrap();
        assert_eq!(fetched["currentState"], "pending");
        assert_eq!(fetched["machineName"], "two-state");
    }

    #[tokio::test]
    async fn test_get_session_rejects_bad_id() {
        let server = local_server();
        let err = server
            .get_session(Parameters(GetSessionRequest {
                session_id: "not-a-uuid".into(),
            }))
            .await
            .unwrap_err();
        assert!(err.starts_with("Invalid session id"));
    }

    #[tokio::test]
    async fn test_get_sessions_empty() {
        let server = local_server();
        let text = server
            .get_sessions(Parameters(GetSessionsRequest {}))
            .await
            .unwrap();
        assert_eq!(text.trim(), "[]");
    }

    #[tokio::test]
    async fn test_register_requires_exactly_one_mode() {
        let server = local_server();

        let neither = server
            .register_proposer(Parameters(RegisterSpecialistRequest {
                specialist_id: "sp-1".into(),
                machine_name: "two-state".into(),
                webhook_url: None,
                webhook_token_name: None,
                model_id: None,
                weight: None,
            }))
            .await
            .unwrap_err();
        assert!(neither.contains("Exactly one execution mode"));

        let both = server
            .register_voter(Parameters(RegisterSpecialistRequest {
                specialist_id: "v-1".into(),
                machine_name: "two-state".into(),
                webhook_url: Some("https://example.test/vote".into()),
                webhook_token_name: None,
                model_id: Some("gpt-test".into()),
                weight: None,
            }))
            .await
            .unwrap_err();
        assert!(both.contains("Exactly one execution mode"));
    }

    #[tokio::test]
    async fn test_register_voter_with_weight() {
        let server = local_server();
        let text = server
            .register_voter(Parameters(RegisterSpecialistRequest {
                specialist_id: "senior".into(),
                machine_name: "two-state".into(),
                webhook_url: None,
                webhook_token_name: None,
                model_id: Some("gpt-test".into()),
                weight: Some(2.5),
            }))
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["role"], "voter");
        assert_eq!(value["weight"], 2.5);
        assert_eq!(
            server.store().get_specialist("senior").unwrap().weight,
            2.5
        );
    }

    #[tokio::test]
    async fn test_execute_transition_and_evaluate_consensus() {
        let server = local_server();
        let machine: MachineDefinition = serde_json::from_value(two_state()).unwrap();
        let session = server.store().create_session(machine).unwrap();

        let verdict = server
            .evaluate_consensus(Parameters(EvaluateConsensusRequest {
                session_id: session.session_id.to_string(),
            }))
            .await
            .unwrap();
        let verdict: serde_json::Value = serde_json::from_str(&verdict).unwrap();
        assert_eq!(verdict["consensusReached"], false);

        let text = server
            .execute_transition(Parameters(ExecuteTransitionRequest {
                session_id: session.session_id.to_string(),
                transition_name: "complete".into(),
                to_state: "done".into(),
                reasoning: Some("manual step".into()),
            }))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["currentState"], "done");
        assert_eq!(value["history"][0]["reasoning"], "manual step");
    }
}
