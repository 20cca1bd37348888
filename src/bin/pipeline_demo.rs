// Runs a scripted workload through the full pipeline against the in-memory
// driver and prints what reached the store versus what the caches absorbed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;
use mapperust::plugin::Properties;
use mapperust::{
    Configuration, DatabaseError, ExecutorType, Interceptor, Invocation, MappedStatement,
    MapperDefinition, MemoryDriver, Parameter, PluginRegistry, ReturnKind, SessionFactory,
    Settings, Signature, SqlCommandType, StatementResult, StaticSqlSource, Value,
};

/// Statement pipeline demo
#[derive(Parser, Debug)]
#[command(name = "pipeline_demo")]
#[command(about = "Runs a cached read/write workload against the in-memory driver", long_about = None)]
struct Args {
    /// Settings file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Executor type: simple, reuse or batch
    #[arg(short, long)]
    executor: Option<String>,

    /// Number of sessions to run
    #[arg(short, long, default_value_t = 20)]
    rounds: usize,

    /// Accounts loaded into the store
    #[arg(short, long, default_value_t = 10)]
    accounts: i64,

    /// Every n-th session writes
    #[arg(short, long, default_value_t = 5)]
    write_every: usize,

    /// Disable the shared cache tier
    #[arg(long)]
    no_cache: bool,
}

const FIND_BY_ID: &str = "SELECT * FROM accounts WHERE id = ?";
const FIND_ALL: &str = "SELECT * FROM accounts";
const DEPOSIT: &str = "UPDATE accounts SET balance = ? WHERE id = ?";

/// Counts intercepted calls per signature
struct CallCounter {
    counts: Arc<Mutex<BTreeMap<String, u64>>>,
    targets: Vec<String>,
}

impl Interceptor for CallCounter {
    fn name(&self) -> &str {
        "call-counter"
    }

    fn intercepts(&self, signature: &Signature) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|t| t == signature.target.as_str())
    }

    fn set_properties(&mut self, properties: &Properties) {
        if let Some(targets) = properties.get("targets").and_then(serde_json::Value::as_array) {
            self.targets = targets
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
        }
    }

    fn intercept(&self, invocation: &mut Invocation<'_>) -> Result<StatementResult, DatabaseError> {
        *self.counts.lock().entry(invocation.signature().to_string()).or_default() += 1;
        invocation.proceed()
    }
}

fn parse_executor(name: &str) -> Result<ExecutorType, Box<dyn std::error::Error>> {
    match name.to_ascii_lowercase().as_str() {
        "simple" => Ok(ExecutorType::Simple),
        "reuse" => Ok(ExecutorType::Reuse),
        "batch" => Ok(ExecutorType::Batch),
        other => Err(format!("unknown executor type '{other}'").into()),
    }
}

fn driver(accounts: i64) -> Result<MemoryDriver, DatabaseError> {
    let driver = MemoryDriver::new();
    driver.create_table("accounts", &["id", "owner", "balance"]);
    for id in 1..=accounts {
        driver.insert_row(
            "accounts",
            vec![Value::Integer(id), Value::from(format!("owner-{id}")), Value::Integer(100)],
        )?;
    }
    driver.select_by(FIND_BY_ID, "accounts", "id");
    driver.select_all(FIND_ALL, "accounts");
    driver.update_by(DEPOSIT, "accounts", "balance", "id");
    Ok(driver)
}

fn configuration(settings: Settings) -> Result<Configuration, DatabaseError> {
    let mut configuration = Configuration::new(settings);
    let cache = configuration.namespace_cache("account");
    let statements = [
        ("account.findById", SqlCommandType::Select, FIND_BY_ID, vec!["id"]),
        ("account.findAll", SqlCommandType::Select, FIND_ALL, vec![]),
        ("account.deposit", SqlCommandType::Update, DEPOSIT, vec!["balance", "id"]),
    ];
    for (id, command, sql, mappings) in statements {
        let source = Arc::new(StaticSqlSource::new(sql).with_mappings(mappings));
        configuration.add_mapped_statement(
            MappedStatement::builder(id, command, source)
                .cache(Arc::clone(&cache))
                .build(),
        )?;
    }
    configuration.add_mapper(
        MapperDefinition::new("account")
            .method("findById", "findById", ReturnKind::One)
            .method("findAll", "findAll", ReturnKind::Many)
            .method_with_params("deposit", "deposit", ReturnKind::Affected, &["balance", "id"]),
    );
    Ok(configuration)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // Priority: CLI args > ENV > config file > defaults
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(executor) = &args.executor {
        settings.default_executor_type = parse_executor(executor)?;
    }
    if args.no_cache {
        settings.cache_enabled = false;
    }

    let counts = Arc::new(Mutex::new(BTreeMap::new()));
    let mut plugins = PluginRegistry::new();
    plugins.register(CallCounter {
        counts: Arc::clone(&counts),
        targets: Vec::new(),
    });
    plugins.configure(
        "call-counter",
        &Properties::from([("targets".to_string(), serde_json::json!(["session", "mapper"]))]),
    )?;

    let driver = driver(args.accounts)?;
    let mut configuration = configuration(settings)?;
    configuration.set_plugins(plugins);
    let factory = SessionFactory::new(configuration, Arc::new(driver.clone()));
    let mapper = factory.configuration().mapper("account")?;

    let mut issued_reads = 0u64;
    for round in 0..args.rounds {
        let mut session = factory.open_session();
        let id = (round as i64 % args.accounts.max(1)) + 1;

        for _ in 0..3 {
            session.select_one("account.findById", id)?;
            issued_reads += 1;
        }
        mapper.call(&mut session, "findAll", vec![])?;
        issued_reads += 1;

        if args.write_every > 0 && round % args.write_every == args.write_every - 1 {
            let balance = Value::Integer(100 + round as i64);
            mapper.call(&mut session, "deposit", vec![balance, Value::Integer(id)])?;
            let flushed = session.flush_statements()?;
            if !flushed.is_empty() {
                tracing::info!(operations = flushed.len(), "flushed batch");
            }
        }
        session.commit()?;
        session.close()?;
    }

    let stats = driver.stats();
    let store_reads = (driver.executions_of(FIND_BY_ID) + driver.executions_of(FIND_ALL)) as u64;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![Cell::new("metric"), Cell::new("value")]);
    table.add_row(vec![Cell::new("reads issued"), Cell::new(issued_reads)]);
    table.add_row(vec![Cell::new("reads reaching store"), Cell::new(store_reads)]);
    table.add_row(vec![Cell::new("reads served by caches"), Cell::new(issued_reads.saturating_sub(store_reads))]);
    table.add_row(vec![Cell::new("store executions"), Cell::new(stats.executions)]);
    table.add_row(vec![Cell::new("prepares"), Cell::new(stats.prepares)]);
    table.add_row(vec![Cell::new("connections"), Cell::new(stats.connections)]);
    table.add_row(vec![Cell::new("commits"), Cell::new(stats.commits)]);
    table.add_row(vec![Cell::new("rollbacks"), Cell::new(stats.rollbacks)]);
    if let Some(cache) = factory.configuration().cache("account") {
        table.add_row(vec![Cell::new("shared cache entries"), Cell::new(cache.size())]);
    }
    println!("{table}");

    let mut calls = Table::new();
    calls.load_preset(UTF8_FULL);
    calls.set_header(vec![Cell::new("intercepted call"), Cell::new("count")]);
    for (signature, count) in counts.lock().iter() {
        calls.add_row(vec![Cell::new(signature), Cell::new(count)]);
    }
    println!("{calls}");

    let mut session = factory.open_session();
    let total: i64 = session
        .select_list("account.findAll", Parameter::None)?
        .iter()
        .filter_map(|row| row.column("balance").and_then(Value::as_int))
        .sum();
    println!("total balance: {total}");
    Ok(())
}
