use async_trait::async_trait;
use event_di::{
    AsyncContextManager, AsyncYielded, BoxError, CacheRegistry, ContextData, ContextManager,
    Depends, EventRef, LifecycleManager, Provider, ResourceGenerator, Resolver, Scope,
    SenderEvent, Target, Value, Yielded,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn event() -> EventRef {
    Arc::new(SenderEvent::from_user(123))
}

/// Generator provider logging `setup:<name>` on open and `teardown:<name>` on close.
fn logged_generator(name: &'static str, log: &Log) -> Arc<Provider> {
    let log = log.clone();
    Provider::generator(name, move |_| {
        log.lock().unwrap().push(format!("setup:{name}"));
        let log = log.clone();
        Ok(Yielded::new(name.to_string(), move || {
            log.lock().unwrap().push(format!("teardown:{name}"));
            Ok(())
        }))
    })
    .build()
}

struct Transaction {
    log: Log,
    fail_on_exit: bool,
}

impl ContextManager for Transaction {
    fn enter(&mut self) -> Result<Value, BoxError> {
        self.log.lock().unwrap().push("begin".into());
        Ok(Value::new("tx".to_string()))
    }

    fn exit(self: Box<Self>) -> Result<(), BoxError> {
        self.log.lock().unwrap().push("commit".into());
        if self.fail_on_exit {
            return Err("commit failed".into());
        }
        Ok(())
    }
}

struct PoolLease {
    log: Log,
}

#[async_trait]
impl AsyncContextManager for PoolLease {
    async fn enter(&mut self) -> Result<Value, BoxError> {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push("acquire".into());
        Ok(Value::new(7u32))
    }

    async fn exit(self: Box<Self>) -> Result<(), BoxError> {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push("release".into());
        Ok(())
    }
}

/// Generator whose open step fails after the provider body ran.
struct BrokenStart;

impl ResourceGenerator for BrokenStart {
    fn start(&mut self) -> Result<Option<Value>, BoxError> {
        Err("could not open".into())
    }

    fn close(self: Box<Self>) -> Result<(), BoxError> {
        unreachable!("a generator that failed to start is never registered")
    }
}

#[tokio::test]
async fn test_generator_teardown_runs_after_handler() {
    let log = new_log();
    let get_session = logged_generator("session", &log);
    let handler = Target::new("handler").depends("session", Depends::on(&get_session));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    let resolved = resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();

    assert_eq!(*resolved["session"].downcast::<String>().unwrap(), "session");
    assert_eq!(entries(&log), vec!["setup:session"]);
    assert_eq!(lifecycle.len(), 1);

    let report = lifecycle.teardown_all().await;
    assert!(report.is_clean());
    assert_eq!(report.closed, 1);
    assert_eq!(entries(&log), vec!["setup:session", "teardown:session"]);
}

#[tokio::test]
async fn test_teardown_runs_exactly_once() {
    let log = new_log();
    let get_session = logged_generator("session", &log);
    let handler = Target::new("handler").depends("session", Depends::on(&get_session));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();

    let first = lifecycle.teardown_all().await;
    let second = lifecycle.teardown_all().await;
    assert_eq!(first.processed(), 1);
    assert_eq!(second.processed(), 0);
    drop(lifecycle);

    let teardowns = entries(&log).iter().filter(|e| e.starts_with("teardown")).count();
    assert_eq!(teardowns, 1);
}

#[tokio::test]
async fn test_nested_resources_close_in_reverse_order() {
    let log = new_log();
    let get_conn = logged_generator("conn", &log);
    let inner_log = log.clone();
    let get_repo = Provider::generator("repo", move |args| {
        let conn = args.required::<String>("conn")?;
        inner_log.lock().unwrap().push(format!("setup:repo({conn})"));
        let log = inner_log.clone();
        Ok(Yielded::new("repo".to_string(), move || {
            log.lock().unwrap().push("teardown:repo".into());
            Ok(())
        }))
    })
    .depends("conn", Depends::on(&get_conn))
    .build();
    let get_cache = logged_generator("cache", &log);

    let handler = Target::new("handler")
        .depends("repo", Depends::on(&get_repo))
        .depends("cache", Depends::on(&get_cache));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();
    let _ = lifecycle.teardown_all().await;

    assert_eq!(
        entries(&log),
        vec![
            "setup:conn",
            "setup:repo(conn)",
            "setup:cache",
            "teardown:cache",
            "teardown:repo",
            "teardown:conn",
        ]
    );
}

#[tokio::test]
async fn test_partial_failure_still_cleans_up_earlier_siblings() {
    let log = new_log();
    let get_session = logged_generator("session", &log);
    let get_broken = Provider::value("get_broken", |_| -> Result<u8, _> { Err("boom".into()) }).build();

    let handler = Target::new("handler")
        .depends("session", Depends::on(&get_session))
        .depends("broken", Depends::on(&get_broken));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    let err = resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap_err();
    assert_eq!(err.provider(), Some("get_broken"));

    let report = lifecycle.teardown_all().await;
    assert_eq!(report.closed, 1);
    assert_eq!(entries(&log), vec!["setup:session", "teardown:session"]);
}

#[tokio::test]
async fn test_failed_start_registers_nothing() {
    let get_broken = Provider::generator("get_broken", |_| Ok(BrokenStart)).build();
    let handler = Target::new("handler").depends("broken", Depends::on(&get_broken));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    let err = resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Provider get_broken failed: could not open");
    assert!(lifecycle.is_empty());
}

#[tokio::test]
async fn test_generator_without_value_resolves_to_empty() {
    let starts = Arc::new(AtomicUsize::new(0));
    let counter = starts.clone();
    let get_nothing = Provider::generator("get_nothing", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Yielded::nothing())
    })
    .build();
    let get_ok = Provider::value("get_ok", |_| Ok(1u8)).build();
    let handler = Target::new("handler")
        .depends("nothing", Depends::on(&get_nothing))
        .depends("ok", Depends::on(&get_ok));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    let resolved = resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();

    assert!(resolved["nothing"].is_empty());
    assert_eq!(*resolved["ok"].downcast::<u8>().unwrap(), 1);
    assert!(lifecycle.is_empty());

    // Not cached: the next cycle runs the generator again
    let mut lifecycle = LifecycleManager::new();
    let resolved = resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();
    assert!(resolved["nothing"].is_empty());
    assert_eq!(starts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_async_generator_without_value_resolves_to_empty() {
    let get_nothing = Provider::async_generator("get_nothing", |_| Ok(AsyncYielded::nothing())).build();
    let handler = Target::new("handler").depends("nothing", Depends::on(&get_nothing));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    let resolved = resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();

    assert!(resolved["nothing"].is_empty());
    assert!(lifecycle.is_empty());
}

#[tokio::test]
async fn test_context_managers() {
    let log = new_log();
    let tx_log = log.clone();
    let get_tx = Provider::context_manager("get_tx", move |_| {
        Ok(Transaction { log: tx_log.clone(), fail_on_exit: false })
    })
    .build();
    let lease_log = log.clone();
    let get_lease = Provider::async_context_manager("get_lease", move |_| {
        Ok(PoolLease { log: lease_log.clone() })
    })
    .build();

    let handler = Target::new("handler")
        .depends("tx", Depends::on(&get_tx))
        .depends("lease", Depends::on(&get_lease));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    let resolved = resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();
    assert_eq!(*resolved["tx"].downcast::<String>().unwrap(), "tx");
    assert_eq!(*resolved["lease"].downcast::<u32>().unwrap(), 7);

    let report = lifecycle.teardown_all().await;
    assert!(report.is_clean());
    assert_eq!(entries(&log), vec!["begin", "acquire", "release", "commit"]);
}

#[tokio::test]
async fn test_async_generator() {
    let log = new_log();
    let gen_log = log.clone();
    let get_stream = Provider::async_generator("get_stream", move |_| {
        let log = gen_log.clone();
        Ok(AsyncYielded::new("stream".to_string(), move || async move {
            tokio::task::yield_now().await;
            log.lock().unwrap().push("closed".into());
            Ok(())
        }))
    })
    .build();
    let handler = Target::new("handler").depends("stream", Depends::on(&get_stream));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();
    assert!(entries(&log).is_empty());

    let report = lifecycle.teardown_all().await;
    assert!(report.is_clean());
    assert_eq!(entries(&log), vec!["closed"]);
}

#[tokio::test]
async fn test_teardown_errors_are_aggregated_not_raised() {
    let log = new_log();
    let first_log = log.clone();
    let get_tx = Provider::context_manager("get_tx", move |_| {
        Ok(Transaction { log: first_log.clone(), fail_on_exit: true })
    })
    .build();
    let get_flaky = Provider::generator("get_flaky", |_| {
        Ok(Yielded::new((), || Err("flush failed".into())))
    })
    .build();
    let get_session = logged_generator("session", &log);

    let handler = Target::new("handler")
        .depends("tx", Depends::on(&get_tx))
        .depends("flaky", Depends::on(&get_flaky))
        .depends("session", Depends::on(&get_session));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();

    let report = lifecycle.teardown_all().await;
    assert_eq!(report.closed, 1);
    assert_eq!(report.failures.len(), 2);
    // Every handle was attempted despite the failures
    assert_eq!(entries(&log), vec!["begin", "setup:session", "teardown:session", "commit"]);

    let err = report.into_error().unwrap();
    let message = err.to_string();
    assert!(message.starts_with("Cleanup completed with 2 errors: "), "{message}");
    assert!(message.contains("get_flaky@user_123: flush failed"), "{message}");
    assert!(message.contains("get_tx@user_123: commit failed"), "{message}");
}

#[tokio::test]
async fn test_cached_resource_is_opened_once_per_key() {
    let log = new_log();
    let get_session = logged_generator("session", &log);
    let handler = Target::new("handler")
        .depends("a", Depends::on(&get_session))
        .depends("b", Depends::on(&get_session));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    let resolved = resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();
    assert!(resolved["a"].ptr_eq(&resolved["b"]));
    assert_eq!(lifecycle.len(), 1);

    let _ = lifecycle.teardown_all().await;
    assert_eq!(entries(&log), vec!["setup:session", "teardown:session"]);
}

#[tokio::test]
async fn test_transient_resource_registered_twice_is_finalized_twice() {
    let log = new_log();
    let get_buffer = logged_generator("buffer", &log);
    let handler = Target::new("handler")
        .depends("a", Depends::new(get_buffer.clone(), Scope::Transient))
        .depends("b", Depends::new(get_buffer.clone(), Scope::Transient));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let mut lifecycle = LifecycleManager::new();
    resolver
        .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
        .await
        .unwrap();
    assert_eq!(lifecycle.len(), 2);

    let report = lifecycle.teardown_all().await;
    assert_eq!(report.closed, 2);
    let teardowns = entries(&log).iter().filter(|e| *e == "teardown:buffer").count();
    assert_eq!(teardowns, 2);
}

#[test]
fn test_dropped_manager_finalizes_sync_resources() {
    let log = new_log();
    let get_session = logged_generator("session", &log);
    let handler = Target::new("handler").depends("session", Depends::on(&get_session));
    let resolver = Resolver::new(Arc::new(CacheRegistry::new()));

    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime.block_on(async {
        let mut lifecycle = LifecycleManager::new();
        resolver
            .resolve_all(&handler, &event(), &ContextData::new(), &mut lifecycle)
            .await
            .unwrap();
        // lifecycle dropped here without teardown_all
    });

    assert_eq!(entries(&log), vec!["setup:session", "teardown:session"]);
}
