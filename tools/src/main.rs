//! paysim-server: JSON-RPC front end for the PaySim ledger scoring engine.
//!
//! Usage:
//!   paysim-server --db paysim.db --csv data/paysim_small.csv --max-rows 50000
//!   paysim-server --synthetic 5000 --seed 42 --listen 127.0.0.1:8765
//!   paysim-server --db paysim.db --config rules.json --set decision_threshold=0.6 --demo
//!
//! With --listen the server answers HTTP `POST /rpc`, one JSON-RPC request
//! per body. Without --listen or --demo, requests are read from stdin one
//! JSON object per line and answered on stdout the same way.

mod http;

use anyhow::Result;
use paysim_core::{
    config::RuleConfig,
    loader::{load_csv_path, load_sample, LoadOptions},
    query::QueryService,
    rpc::{handle_line, RpcResponse},
    store::LedgerStore,
};
use serde_json::json;
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let seed = parse_arg(&args, "--seed", 42u64)?;
    let synthetic = parse_arg(&args, "--synthetic", 0usize)?;
    let demo = args.iter().any(|a| a == "--demo");

    let config = build_config(&args)?;

    // For :memory: use a shared-cache URI so every connection (one per HTTP
    // request) sees the same in-memory ledger.
    let db_effective: String = if db == ":memory:" {
        format!("file:paysim_{}?mode=memory&cache=shared", std::process::id())
    } else {
        db.to_string()
    };
    let store = LedgerStore::open(&db_effective)?;
    store.migrate()?;

    if let Some(csv) = flag_value(&args, "--csv") {
        let opts = LoadOptions {
            max_rows: flag_value(&args, "--max-rows")
                .map(|v| v.parse::<usize>())
                .transpose()
                .map_err(|e| anyhow::anyhow!("--max-rows: {e}"))?,
            reduce: args.iter().any(|a| a == "--reduce"),
        };
        let report = load_csv_path(&store, csv, &opts)?;
        log::info!("ingestion: {report:?}");
    } else if synthetic > 0 {
        let report = load_sample(&store, seed, synthetic)?;
        log::info!("ingestion: {report:?}");
    }

    // The loading connection keeps a shared in-memory ledger alive.
    let service = QueryService::new(store.reopen()?, config.clone())?;

    if demo {
        run_demo(&service)?;
    } else if let Some(addr) = flag_value(&args, "--listen") {
        let state = Arc::new(http::HttpState { db: db_effective, config });
        tokio::runtime::Runtime::new()?.block_on(http::serve(addr, state))?;
    } else {
        serve_stdio(&service)?;
    }
    drop(store);
    Ok(())
}

fn build_config(args: &[String]) -> Result<RuleConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => RuleConfig::load(path)?,
        None => RuleConfig::default(),
    };
    for assignment in args.windows(2).filter(|w| w[0] == "--set").map(|w| w[1].as_str()) {
        config.apply_override(assignment)?;
    }
    log::info!("rule config: {config:?}");
    Ok(config)
}

fn serve_stdio(service: &QueryService) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    serve_lines(service, stdin.lock(), &mut stdout)
}

fn serve_lines<R: BufRead, W: Write>(service: &QueryService, mut input: R, output: &mut W) -> Result<()> {
    let mut buffer = String::new();
    loop {
        buffer.clear();
        let bytes_read = input.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }
        let response = handle_line(service, &buffer);
        writeln!(output, "{}", serde_json::to_string(&response)?)?;
        output.flush()?;
    }
    Ok(())
}

/// Walk through the standard call sequence against the loaded ledger.
fn run_demo(service: &QueryService) -> Result<()> {
    let picks = service.list_fraud_candidates(0.0, 1)?;
    let Some(pick) = picks.first() else {
        println!("ledger is empty: load data with --csv or --synthetic first");
        return Ok(());
    };
    let name = pick.transaction.name_orig.clone();
    let tx_id = pick.transaction.id;
    println!("(demo picks) name={name} tx_id={tx_id}\n");

    let steps = [
        ("initialize", json!({})),
        ("tools/list", json!({})),
        ("resources/read", json!({ "uri": format!("account/{name}") })),
        ("resources/read", json!({ "uri": format!("transaction/{tx_id}") })),
        ("tools/call", json!({ "name": "get_account_kpi", "arguments": { "name": name } })),
        (
            "tools/call",
            json!({ "name": "detect_suspicious", "arguments": { "name": name, "min_amount": 200000, "max_rows": 10 } }),
        ),
        ("tools/call", json!({ "name": "list_fraud_candidates", "arguments": { "limit": 5 } })),
    ];
    for (i, (method, params)) in steps.into_iter().enumerate() {
        let request = json!({ "jsonrpc": "2.0", "id": i + 1, "method": method, "params": params });
        let response: RpcResponse = handle_line(service, &request.to_string());
        println!("{}) {method}", i + 1);
        println!("{}\n", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// Value of `flag`, or `default` when absent. A malformed value is an error.
fn parse_arg<T>(args: &[String], flag: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match flag_value(args, flag) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{flag}: cannot parse '{raw}': {e}")),
        None => Ok(default),
    }
}
