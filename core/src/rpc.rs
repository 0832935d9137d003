//! JSON-RPC 2.0 boundary over the query service.
//!
//! One request object in, one response object out. Transports (stdio
//! lines, TCP lines) live in the server binary; this module only maps
//! requests to `QueryService` calls and errors to JSON-RPC codes.

use crate::{
    account_view::AccountView,
    error::LedgerError,
    query::{QueryService, DEFAULT_SUSPICIOUS_MAX_ROWS, DEFAULT_SUSPICIOUS_MIN_AMOUNT},
    types::{Step, TxId},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const SERVER_ERROR: i64 = -32000;
pub const STORE_UNAVAILABLE: i64 = -32003;
pub const NOT_FOUND: i64 = -32004;

const DEFAULT_CANDIDATE_LIMIT: usize = 20;
const DEFAULT_ACCOUNT_LIMIT: usize = 500;
/// KPI window bounds used when a caller gives only one of them.
const DEFAULT_KPI_STEP_FROM: Step = 1;
const DEFAULT_KPI_STEP_TO: Step = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl From<LedgerError> for RpcError {
    fn from(err: LedgerError) -> Self {
        let code = match &err {
            LedgerError::NotFound { .. } => NOT_FOUND,
            LedgerError::Validation { .. } => INVALID_PARAMS,
            LedgerError::StoreUnavailable(_) => STORE_UNAVAILABLE,
            _ => SERVER_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0".into(), id, result: Some(result), error: None }
    }

    pub fn err(id: Value, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".into(), id, result: None, error: Some(error) }
    }

    /// Error code carried by the response, if it failed.
    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|e| e.code)
    }
}

// ── Tool arguments ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TransactionArgs {
    id: TxId,
}

#[derive(Deserialize)]
struct AccountArgs {
    name: String,
}

#[derive(Deserialize)]
struct KpiArgs {
    name: String,
    step_from: Option<Step>,
    step_to: Option<Step>,
}

#[derive(Deserialize)]
struct CandidateArgs {
    min_score: Option<f64>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SuspiciousArgs {
    name: String,
    min_amount: Option<f64>,
    max_rows: Option<usize>,
}

#[derive(Deserialize)]
struct AccountListArgs {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ToolCall {
    #[serde(alias = "tool")]
    name: String,
    #[serde(default, alias = "params")]
    arguments: Value,
}

#[derive(Deserialize)]
struct ResourceRead {
    #[serde(alias = "resource")]
    uri: String,
}

/// Parse one line and dispatch it. Always yields a response.
pub fn handle_line(service: &QueryService, line: &str) -> RpcResponse {
    match serde_json::from_str::<RpcRequest>(line) {
        Ok(req) => dispatch(service, req),
        Err(e) => {
            log::warn!("rpc: unparseable request: {e}");
            RpcResponse::err(Value::Null, RpcError::new(PARSE_ERROR, format!("invalid json: {e}")))
        }
    }
}

pub fn dispatch(service: &QueryService, req: RpcRequest) -> RpcResponse {
    log::debug!("rpc: {} {}", req.method, req.params);
    let outcome = match req.method.as_str() {
        "initialize" => Ok(json!({
            "server": "paysim-ledger",
            "version": env!("CARGO_PKG_VERSION"),
            "time": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        })),
        "tools/list" => Ok(json!({ "tools": tool_descriptors() })),
        "tools/call" => parse::<ToolCall>(req.params).and_then(|call| {
            call_tool(service, &call.name, call.arguments)
        }),
        "resources/read" => {
            parse::<ResourceRead>(req.params).and_then(|r| read_resource(service, &r.uri))
        }
        other => Err(RpcError::new(METHOD_NOT_FOUND, format!("unknown method: {other}"))),
    };
    match outcome {
        Ok(result) => RpcResponse::ok(req.id, result),
        Err(error) => {
            log::warn!("rpc: {} failed: {}", req.method, error.message);
            RpcResponse::err(req.id, error)
        }
    }
}

fn call_tool(service: &QueryService, name: &str, args: Value) -> Result<Value, RpcError> {
    match name {
        "get_transaction" => {
            let a: TransactionArgs = parse(args)?;
            to_value(service.get_transaction(a.id)?)
        }
        "get_account_kpi" => {
            let a: KpiArgs = parse(args)?;
            let view = match (a.step_from, a.step_to) {
                (None, None) => service.get_account_kpi(&a.name)?,
                (from, to) => service.get_account_kpi_in_window(
                    &a.name,
                    from.unwrap_or(DEFAULT_KPI_STEP_FROM),
                    to.unwrap_or(DEFAULT_KPI_STEP_TO),
                )?,
            };
            Ok(account_kpi(&view))
        }
        "list_fraud_candidates" => {
            let a: CandidateArgs = parse(args)?;
            let min_score = a
                .min_score
                .unwrap_or(service.engine().config().decision_threshold);
            let limit = a.limit.unwrap_or(DEFAULT_CANDIDATE_LIMIT);
            let candidates = service.list_fraud_candidates(min_score, limit)?;
            Ok(json!({
                "min_score": min_score,
                "limit": limit,
                "candidates": candidates,
            }))
        }
        "score_transaction" => {
            let a: TransactionArgs = parse(args)?;
            to_value(service.score_transaction(a.id)?)
        }
        "detect_suspicious" => {
            let a: SuspiciousArgs = parse(args)?;
            let min_amount = a.min_amount.unwrap_or(DEFAULT_SUSPICIOUS_MIN_AMOUNT);
            let max_rows = a.max_rows.unwrap_or(DEFAULT_SUSPICIOUS_MAX_ROWS);
            let matches = service.detect_suspicious(&a.name, min_amount, max_rows)?;
            Ok(json!({
                "name": a.name,
                "min_amount": min_amount,
                "max_rows": max_rows,
                "matches": matches,
            }))
        }
        "suggest_detection_params" => {
            let a: AccountArgs = parse(args)?;
            to_value(service.suggest_detection_params(&a.name)?)
        }
        "ledger_overview" => to_value(service.ledger_overview()?),
        "list_accounts" => {
            let a: AccountListArgs = parse(args)?;
            let accounts = service.list_accounts(a.limit.unwrap_or(DEFAULT_ACCOUNT_LIMIT))?;
            Ok(json!({ "accounts": accounts }))
        }
        "evaluate" => to_value(service.evaluate()?),
        other => Err(RpcError::new(METHOD_NOT_FOUND, format!("unknown tool: {other}"))),
    }
}

fn read_resource(service: &QueryService, uri: &str) -> Result<Value, RpcError> {
    if let Some(name) = uri.strip_prefix("account/") {
        return Ok(account_kpi(&service.get_account_kpi(name)?));
    }
    if let Some(raw) = uri.strip_prefix("transaction/") {
        let id: TxId = raw.parse().map_err(|_| {
            RpcError::new(INVALID_PARAMS, format!("transaction id is not an integer: '{raw}'"))
        })?;
        return to_value(service.get_transaction(id)?);
    }
    Err(RpcError::new(INVALID_PARAMS, format!("unknown resource: {uri}")))
}

/// Account KPIs as returned by both the tool and the `account/<id>` resource.
fn account_kpi(view: &AccountView) -> Value {
    json!({
        "view": view,
        "average_outgoing": view.average_outgoing(),
        "average_incoming": view.average_incoming(),
    })
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    // Tools without arguments may receive `null`.
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params)
        .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid params: {e}")))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(SERVER_ERROR, e.to_string()))
}

fn tool_descriptors() -> Value {
    json!([
        {
            "name": "get_transaction",
            "description": "Fetch one ledger transaction by id.",
            "inputSchema": {
                "type": "object",
                "properties": { "id": { "type": "integer" } },
                "required": ["id"],
            },
        },
        {
            "name": "get_account_kpi",
            "description": "Account aggregates (counts, totals, inconsistencies, counterparties). Giving step_from or step_to restricts them to that window; a missing bound defaults to 1 or 200.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "step_from": { "type": "integer" },
                    "step_to": { "type": "integer" },
                },
                "required": ["name"],
            },
        },
        {
            "name": "list_fraud_candidates",
            "description": "Highest-scoring transactions under the heuristic rules.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "min_score": { "type": "number" },
                    "limit": { "type": "integer" },
                },
            },
        },
        {
            "name": "score_transaction",
            "description": "Rule verdict for one transaction.",
            "inputSchema": {
                "type": "object",
                "properties": { "id": { "type": "integer" } },
                "required": ["id"],
            },
        },
        {
            "name": "detect_suspicious",
            "description": "Large outgoing TRANSFER / CASH_OUT transactions of an account.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "min_amount": { "type": "number" },
                    "max_rows": { "type": "integer" },
                },
                "required": ["name"],
            },
        },
        {
            "name": "suggest_detection_params",
            "description": "Proposed min_amount for detect_suspicious.",
            "inputSchema": {
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"],
            },
        },
        {
            "name": "ledger_overview",
            "description": "Ledger-wide counts, step range and type mix.",
            "inputSchema": { "type": "object", "properties": {} },
        },
        {
            "name": "list_accounts",
            "description": "Account names seen in the ledger.",
            "inputSchema": {
                "type": "object",
                "properties": { "limit": { "type": "integer" } },
            },
        },
        {
            "name": "evaluate",
            "description": "Confusion matrix of flagged verdicts against labelled fraud.",
            "inputSchema": { "type": "object", "properties": {} },
        },
    ])
}
