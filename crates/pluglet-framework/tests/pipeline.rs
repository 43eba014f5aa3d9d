use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use pluglet_core::{
    BoxError, Lifecycle, MemoryConfigRepository, Payload, PluginConfig, PluginDomain,
    PlugletFactory,
};
use pluglet_framework::{
    ChainResult, Link, LogCollector, LogLevel, LogRecord, Multicast, MulticastError, Next,
    Pipeline, PipelineError, Resolver, SecurityExchange, SecurityRequest, StandardBody, Storage,
    UnresolvedPolicy, broadcaster_pipeline, noop_terminal, predicate_pipeline, storage_pipeline,
    strategy_pipeline,
};
use pluglet_macros::ControlSchema;
use serde::Deserialize;

/// Tags of destroyed test plugins, one entry per destroy call.
static DESTROYED: LazyLock<Mutex<Vec<String>>> = LazyLock::new(|| Mutex::new(Vec::new()));

fn destroyed(tag: &str) -> usize {
    DESTROYED.lock().iter().filter(|t| *t == tag).count()
}

// ─── Test domain ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct Trace {
    visited: Mutex<Vec<String>>,
}

trait Step: Lifecycle + Link<Trace> {}

impl<T: Lifecycle + Link<Trace>> Step for T {}

fn erase_step<T: Step + 'static>(step: Box<T>) -> Box<dyn Step> {
    step
}

#[derive(Deserialize, ControlSchema)]
struct Mark {
    #[control(kind = "text", required)]
    tag: String,
}

impl Lifecycle for Mark {
    fn destroy(&self) {
        DESTROYED.lock().push(self.tag.clone());
    }
}

#[async_trait]
impl Link<Trace> for Mark {
    async fn execute(&self, exchange: Arc<Trace>, next: Next<Trace>) -> ChainResult {
        exchange.visited.lock().push(self.tag.clone());
        next.run(exchange).await
    }
}

fn step_pipeline(policy: UnresolvedPolicy) -> Pipeline<dyn Step> {
    let resolver = Resolver::new(PluginDomain::Filter, Arc::new(PlugletFactory::new()))
        .register::<Mark>("mark", "Mark", erase_step);
    Pipeline::new(Arc::new(resolver), policy)
}

fn record(
    id: &str,
    tenant: &str,
    domain: PluginDomain,
    type_code: &str,
    params: &str,
    priority: i32,
) -> PluginConfig {
    PluginConfig {
        id: id.into(),
        tenant_code: tenant.into(),
        domain,
        type_code: type_code.into(),
        name: format!("plugin {id}"),
        params: params.into(),
        priority,
        enabled: true,
    }
}

fn mark(id: &str, tenant: &str, tag: &str, priority: i32) -> PluginConfig {
    record(id, tenant, PluginDomain::Filter, "mark", &format!(r#"{{"tag":"{tag}"}}"#), priority)
}

async fn visit(pipeline: &Pipeline<dyn Step>, tenant: &str) -> Vec<String> {
    let trace = Arc::new(Trace::default());
    pipeline
        .snapshot(tenant)
        .chain(noop_terminal())
        .execute(Arc::clone(&trace))
        .await
        .unwrap();
    let visited = trace.visited.lock().clone();
    visited
}

// ─── Refresh ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_runs_in_priority_order() {
    let pipeline = step_pipeline(UnresolvedPolicy::SkipAndLog);
    let repository = MemoryConfigRepository::new(vec![
        mark("3", "master", "order-c", 10),
        mark("1", "master", "order-a", 0),
        mark("2", "master", "order-b", 0),
        mark("4", "other", "order-x", 0),
    ]);

    let report = pipeline.refresh(&repository).await.unwrap();
    assert_eq!(report.tenants, 2);
    assert_eq!(report.created, 4);

    assert_eq!(visit(&pipeline, "master").await, vec!["order-a", "order-b", "order-c"]);
    assert_eq!(visit(&pipeline, "other").await, vec!["order-x"]);
    assert!(visit(&pipeline, "unknown").await.is_empty());
}

#[tokio::test]
async fn disabled_and_foreign_domain_records_are_ignored() {
    let pipeline = step_pipeline(UnresolvedPolicy::SkipAndLog);
    let mut disabled = mark("1", "master", "ignored-a", 0);
    disabled.enabled = false;
    let mut foreign = mark("2", "master", "ignored-b", 0);
    foreign.domain = PluginDomain::Storage;
    let repository =
        MemoryConfigRepository::new(vec![disabled, foreign, mark("3", "master", "ignored-c", 0)]);

    pipeline.refresh(&repository).await.unwrap();
    assert_eq!(visit(&pipeline, "master").await, vec!["ignored-c"]);
}

#[tokio::test]
async fn unchanged_records_keep_their_instances() {
    let pipeline = step_pipeline(UnresolvedPolicy::SkipAndLog);
    let repository = MemoryConfigRepository::new(vec![
        mark("1", "master", "reuse-a", 0),
        mark("2", "master", "reuse-b", 1),
    ]);
    pipeline.refresh(&repository).await.unwrap();
    let before = pipeline.snapshot("master");

    let report = pipeline.refresh(&repository).await.unwrap();
    assert_eq!((report.created, report.reused), (0, 2));
    assert!(Arc::ptr_eq(&before, &pipeline.snapshot("master")));

    repository.upsert(mark("2", "master", "reuse-b2", 1));
    let report = pipeline.refresh(&repository).await.unwrap();
    assert_eq!((report.created, report.reused), (1, 1));

    let after = pipeline.snapshot("master");
    assert!(Arc::ptr_eq(before.find("1").unwrap(), after.find("1").unwrap()));
    assert_eq!(destroyed("reuse-a"), 0);

    drop(before);
    assert_eq!(destroyed("reuse-b"), 1);
    assert_eq!(destroyed("reuse-b2"), 0);
}

#[tokio::test]
async fn in_flight_snapshot_outlives_refresh() {
    let pipeline = step_pipeline(UnresolvedPolicy::SkipAndLog);
    let repository = MemoryConfigRepository::new(vec![mark("1", "master", "inflight-old", 0)]);
    pipeline.refresh(&repository).await.unwrap();

    let held = pipeline.snapshot("master");
    repository.replace(vec![mark("1", "master", "inflight-new", 0)]);
    pipeline.refresh(&repository).await.unwrap();

    assert_eq!(destroyed("inflight-old"), 0);
    let trace = Arc::new(Trace::default());
    held.chain(noop_terminal()).execute(Arc::clone(&trace)).await.unwrap();
    assert_eq!(*trace.visited.lock(), vec!["inflight-old"]);
    assert_eq!(visit(&pipeline, "master").await, vec!["inflight-new"]);

    drop(held);
    assert_eq!(destroyed("inflight-old"), 1);
}

#[tokio::test]
async fn removed_tenants_are_dropped() {
    let pipeline = step_pipeline(UnresolvedPolicy::SkipAndLog);
    let repository = MemoryConfigRepository::new(vec![
        mark("1", "master", "drop-a", 0),
        mark("2", "other", "drop-b", 0),
    ]);
    pipeline.refresh(&repository).await.unwrap();
    assert_eq!(pipeline.tenants(), vec!["master", "other"]);

    repository.remove("2");
    pipeline.refresh(&repository).await.unwrap();
    assert_eq!(pipeline.tenants(), vec!["master"]);
    assert_eq!(destroyed("drop-b"), 1);

    pipeline.clear();
    assert!(pipeline.tenants().is_empty());
    assert_eq!(destroyed("drop-a"), 1);
}

#[tokio::test]
async fn skip_and_log_leaves_out_broken_records() {
    let pipeline = step_pipeline(UnresolvedPolicy::SkipAndLog);
    let repository = MemoryConfigRepository::new(vec![
        mark("1", "master", "skip-a", 0),
        record("2", "master", PluginDomain::Filter, "webhook", "{}", 1),
        record("3", "master", PluginDomain::Filter, "mark", "{}", 2),
        record("4", "master", PluginDomain::Filter, "mark", "[1, 2]", 3),
    ]);

    let report = pipeline.refresh(&repository).await.unwrap();
    assert_eq!((report.created, report.skipped), (1, 3));
    assert_eq!(visit(&pipeline, "master").await, vec!["skip-a"]);
}

#[tokio::test]
async fn fail_fast_keeps_previous_snapshots() {
    let pipeline = step_pipeline(UnresolvedPolicy::FailFast);
    let repository = MemoryConfigRepository::new(vec![mark("1", "master", "fast-a", 0)]);
    pipeline.refresh(&repository).await.unwrap();

    repository.upsert(record("2", "master", PluginDomain::Filter, "webhook", "{}", 1));
    let err = pipeline.refresh(&repository).await.unwrap_err();
    assert!(matches!(err, PipelineError::Plugin { ref tenant, .. } if tenant == "master"));
    assert_eq!(visit(&pipeline, "master").await, vec!["fast-a"]);
}

#[tokio::test]
async fn load_tenant_touches_only_that_tenant() {
    let pipeline = step_pipeline(UnresolvedPolicy::SkipAndLog);
    let repository = MemoryConfigRepository::new(vec![mark("1", "master", "load-a", 0)]);
    pipeline.refresh(&repository).await.unwrap();

    pipeline
        .load_tenant("other", vec![mark("2", "other", "load-b", 0)])
        .await
        .unwrap();
    assert_eq!(visit(&pipeline, "master").await, vec!["load-a"]);
    assert_eq!(visit(&pipeline, "other").await, vec!["load-b"]);
}

// ─── Domains ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn strategy_pipeline_fails_fast_on_invalid_params() {
    let factory = Arc::new(PlugletFactory::new());
    let pipeline = strategy_pipeline(factory);
    let repository = MemoryConfigRepository::new(vec![record(
        "1",
        "master",
        PluginDomain::Strategy,
        "password",
        r#"{"min": 40}"#,
        0,
    )]);

    let err = pipeline.refresh(&repository).await.unwrap_err();
    assert!(err.to_string().contains("type=password"), "{err}");
}

#[tokio::test]
async fn strategies_publish_attributes() {
    use pluglet_framework::builtin::strategy::attributes::{oauth, session};

    let factory = Arc::new(PlugletFactory::new());
    let pipeline = strategy_pipeline(factory);
    let repository = MemoryConfigRepository::new(vec![
        record("1", "master", PluginDomain::Strategy, "session", r#"{"timeout": 5}"#, 0),
        record("2", "master", PluginDomain::Strategy, "oauth", r#"{"auto_granting": "true"}"#, 1),
    ]);
    pipeline.refresh(&repository).await.unwrap();

    let exchange = Arc::new(SecurityExchange::new(
        "master",
        SecurityRequest::new(http::Method::GET, "https://sso.example.com/"),
    ));
    pipeline
        .snapshot("master")
        .chain(noop_terminal())
        .execute(Arc::clone(&exchange))
        .await
        .unwrap();

    assert_eq!(exchange.attribute(&session::TIMEOUT).as_secs(), 300);
    assert!(exchange.attribute(&oauth::AUTO_GRANTING));
    assert!(exchange.attribute(&oauth::ENABLED));
}

static STORED: LazyLock<Mutex<HashMap<String, usize>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Deserialize, ControlSchema)]
struct CountingStorage {
    #[control(kind = "text", required)]
    tag: String,
    #[control(kind = "checkbox", default = "false")]
    broken: bool,
}

impl Lifecycle for CountingStorage {}

#[async_trait]
impl Storage for CountingStorage {
    async fn store(&self, records: &[LogRecord]) -> Result<(), BoxError> {
        if self.broken {
            return Err("disk full".into());
        }
        *STORED.lock().entry(self.tag.clone()).or_default() += records.len();
        Ok(())
    }
}

#[tokio::test]
async fn collector_filters_then_stores() {
    let factory = Arc::new(PlugletFactory::new());
    let predicates = Arc::new(predicate_pipeline(Arc::clone(&factory)));
    let storage_resolver = pluglet_framework::storage_resolver(Arc::clone(&factory))
        .register::<CountingStorage>(
            "counting",
            "Counting",
            pluglet_framework::domain::storage::erase_storage,
        );
    let storages = Arc::new(Pipeline::new(
        Arc::new(storage_resolver),
        UnresolvedPolicy::SkipAndLog,
    ));

    let levels = r#"{"levels": ["warn", "error"]}"#;
    predicates
        .load_tenant(
            "master",
            vec![record("1", "master", PluginDomain::Predicate, "level", levels, 0)],
        )
        .await
        .unwrap();
    let (healthy, broken) = (r#"{"tag": "collect"}"#, r#"{"tag": "x", "broken": true}"#);
    storages
        .load_tenant(
            "master",
            vec![
                record("2", "master", PluginDomain::Storage, "counting", healthy, 0),
                record("3", "master", PluginDomain::Storage, "counting", broken, 1),
            ],
        )
        .await
        .unwrap();

    let collector = LogCollector::new(predicates, storages);
    let records = vec![
        LogRecord::new("master", LogLevel::Info, "app", "started"),
        LogRecord::new("master", LogLevel::Warn, "app", "slow"),
        LogRecord::new("master", LogLevel::Error, "db", "lost connection"),
    ];
    let report = collector.collect("master", records).await;

    assert_eq!((report.accepted, report.rejected, report.failed), (2, 1, 1));
    assert_eq!(STORED.lock().get("collect"), Some(&2));
}

#[tokio::test]
async fn default_storage_pipeline_loads_memory_storage() {
    let pipeline = storage_pipeline(Arc::new(PlugletFactory::new()));
    pipeline
        .load_tenant(
            "master",
            vec![record("1", "master", PluginDomain::Storage, "memory", "", 0)],
        )
        .await
        .unwrap();
    assert_eq!(pipeline.snapshot("master").len(), 1);
}

#[tokio::test]
async fn multicast_routes_by_id() {
    let pipeline = Arc::new(broadcaster_pipeline(Arc::new(PlugletFactory::new())));
    pipeline
        .load_tenant(
            "master",
            vec![record(
                "9",
                "master",
                PluginDomain::Broadcaster,
                "log",
                r#"{"level": "warn"}"#,
                0,
            )],
        )
        .await
        .unwrap();
    let multicast = Multicast::new(pipeline);

    let standard = StandardBody {
        subject: "Maintenance".into(),
        content: "Tonight at 22:00".into(),
        recipients: vec![],
    };
    multicast.publish_standard("master", "9", standard).await.unwrap();
    multicast
        .publish(
            "master",
            "9",
            Payload::new(serde_json::json!({"title": "hi", "content": "there"})),
        )
        .await
        .unwrap();

    let err = multicast
        .publish("master", "10", Payload::new(serde_json::json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, MulticastError::NotFound { .. }));
}
