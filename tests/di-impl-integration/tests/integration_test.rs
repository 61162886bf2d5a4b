//! 组件注册表的集成测试

use di_abstractions::{
    Completion, ComponentBuilder, ComponentRegistry, ComponentSelector, ComponentValue,
    RegistryStats,
};
use di_impl::ComponentRegistryImpl;
use infrastructure_common::{DependencyError, RegistryConfig};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

fn text(value: &ComponentValue) -> &str {
    value
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| value.downcast_ref::<&str>().copied())
        .expect("component value should be a string")
}

fn texts(values: &[ComponentValue]) -> Vec<&str> {
    values.iter().map(text).collect()
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// 与原组件库测试套件相同的一组组件
fn fixture() -> anyhow::Result<ComponentRegistryImpl> {
    let registry = ComponentRegistryImpl::new();
    registry.register("sync", ComponentBuilder::sync(|_| "sync".to_string()))?;
    registry.register_with_dependencies(
        "sync-dep",
        vec!["sync".to_string()],
        ComponentBuilder::sync(|deps| format!("{}-dep", text(&deps[0]))),
    )?;
    registry.register(
        "async",
        ComponentBuilder::asynchronous(|_, done| done.complete("async".to_string())),
    )?;
    registry.register_with_dependencies(
        "async-dep",
        vec!["async".to_string()],
        ComponentBuilder::asynchronous(|deps, done| {
            let value = format!("{}-dep", text(&deps[0]));
            done.complete(value);
        }),
    )?;
    registry.register_with_dependencies(
        "both-dep",
        vec!["sync-dep".to_string(), "async-dep".to_string()],
        ComponentBuilder::asynchronous(|deps, done| {
            let value = format!("{}|{}", text(&deps[0]), text(&deps[1]));
            done.complete(value);
        }),
    )?;
    Ok(registry)
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capture_warnings() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

#[test]
fn test_is_registered() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    assert!(!registry.is_registered("is-registered"));

    registry.register("is-registered", ComponentBuilder::value("is-registered"))?;

    assert!(registry.is_registered("is-registered"));
    assert!(!registry.is_registered("is-NOT-registered"));
    Ok(())
}

#[test]
fn test_duplicate_registration_is_rejected() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    registry.register("foo", ComponentBuilder::value("foo"))?;

    let result = registry.register("foo", ComponentBuilder::value("other"));

    assert!(matches!(result, Err(DependencyError::AlreadyRegistered { .. })));
    assert_eq!(registry.registered_names(), vec!["foo".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_unregistered_name_fails_before_any_build() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    registry.register(
        "a",
        ComponentBuilder::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            "a"
        }),
    )?;

    let done = Arc::new(AtomicUsize::new(0));
    let done_counter = Arc::clone(&done);
    let result = registry.resolve_with(
        ComponentSelector::from(["a", "x"]),
        Box::new(move |_| {
            done_counter.fetch_add(1, Ordering::SeqCst);
        }),
        None,
    );

    assert!(matches!(
        result,
        Err(DependencyError::ComponentNotRegistered { ref name }) if name == "x"
    ));
    settle().await;
    assert_eq!(done.load(Ordering::SeqCst), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(registry.stats().idle, 1);
    Ok(())
}

#[tokio::test]
async fn test_constant_component_resolves_asynchronously_once() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    registry.register("a", ComponentBuilder::value(42_i32))?;

    for _ in 0..2 {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (tx, rx) = oneshot::channel();
        registry.resolve_with(
            "a".into(),
            Box::new(move |values| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(values);
            }),
            None,
        )?;

        // 即使组件已解析，回调也不会在 resolve_with 返回前执行
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let values = rx.await?;
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].downcast_ref::<i32>(), Some(&42));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
    Ok(())
}

#[tokio::test]
async fn test_sync_builder_with_dependency() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    registry.register("base", ComponentBuilder::sync(|_| "x".to_string()))?;
    registry.register_with_dependencies(
        "derived",
        vec!["base".to_string()],
        ComponentBuilder::sync(|deps| format!("{}-d", text(&deps[0]))),
    )?;

    let values = registry.resolve("derived".into()).await?;

    assert_eq!(texts(&values), vec!["x-d"]);
    assert!(registry.is_resolved("base"));
    assert!(registry.is_resolved("derived"));
    Ok(())
}

#[tokio::test]
async fn test_async_builder_matches_sync_from_caller_view() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    registry.register(
        "async",
        ComponentBuilder::asynchronous(|_, done| done.complete("y".to_string())),
    )?;

    let value = registry.resolve_as::<String>("async").await?;
    assert_eq!(value.as_str(), "y");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_mixed_dependencies_resolve_regardless_of_finish_order() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    registry.register(
        "base",
        ComponentBuilder::future(|_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            "x".to_string()
        }),
    )?;
    registry.register(
        "async",
        ComponentBuilder::asynchronous(|_, done| done.complete("async".to_string())),
    )?;
    registry.register_with_dependencies(
        "both",
        vec!["base".to_string(), "async".to_string()],
        ComponentBuilder::asynchronous(|deps, done| {
            let value = format!("{}|{}", text(&deps[0]), text(&deps[1]));
            done.complete(value);
        }),
    )?;

    let value = registry.resolve_as::<String>("both").await?;
    assert_eq!(value.as_str(), "x|async");
    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_build_once() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    registry.register(
        "service",
        ComponentBuilder::future(move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            "service".to_string()
        }),
    )?;

    let (first, second) = tokio::join!(
        registry.resolve("service".into()),
        registry.resolve("service".into()),
    );
    let (first, second) = (first?, second?);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first[0], &second[0]));

    let third = registry.resolve_one("service").await?;
    assert!(Arc::ptr_eq(&first[0], &third));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_shared_dependency_builds_once() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    registry.register(
        "base",
        ComponentBuilder::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            "base".to_string()
        }),
    )?;
    for name in ["left", "right"] {
        registry.register_with_dependencies(
            name,
            vec!["base".to_string()],
            ComponentBuilder::sync(move |deps| format!("{}:{}", name, text(&deps[0]))),
        )?;
    }

    let values = registry.resolve(["left", "right", "base"].into()).await?;

    assert_eq!(texts(&values), vec!["left:base", "right:base", "base"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_wildcard_snapshots_registry_at_call_time() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    registry.register("first", ComponentBuilder::value("first"))?;
    registry.register("second", ComponentBuilder::value("second"))?;

    let (tx, rx) = oneshot::channel();
    registry.resolve_with(
        "*".into(),
        Box::new(move |values| {
            let _ = tx.send(values);
        }),
        None,
    )?;
    registry.register("late", ComponentBuilder::value("late"))?;

    let values = rx.await?;
    assert_eq!(texts(&values), vec!["first", "second"]);
    assert!(!registry.is_resolved("late"));
    Ok(())
}

#[tokio::test]
async fn test_full_fixture_resolves_every_component() -> anyhow::Result<()> {
    let registry = fixture()?;

    let values = registry.resolve(["sync", "async"].into()).await?;
    assert_eq!(texts(&values), vec!["sync", "async"]);

    assert_eq!(text(&registry.resolve_one("sync-dep").await?), "sync-dep");
    assert_eq!(text(&registry.resolve_one("async-dep").await?), "async-dep");
    assert_eq!(
        text(&registry.resolve_one("both-dep").await?),
        "sync-dep|async-dep"
    );

    let all = registry.resolve(ComponentSelector::All).await?;
    assert_eq!(
        texts(&all),
        vec!["sync", "sync-dep", "async", "async-dep", "sync-dep|async-dep"]
    );
    assert_eq!(
        registry.stats(),
        RegistryStats {
            registered: 5,
            resolved: 5,
            ..RegistryStats::default()
        }
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_progress_reports_each_component_before_completion() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    registry.register("a", ComponentBuilder::value("a"))?;
    for (name, delay) in [("b", 10), ("c", 20)] {
        registry.register(
            name,
            ComponentBuilder::future(move |_| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                name
            }),
        )?;
    }

    let progress = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&progress);
    let (tx, rx) = oneshot::channel();
    registry.resolve_with(
        ["c", "a", "b"].into(),
        Box::new(move |values| {
            let _ = tx.send(values);
        }),
        Some(Arc::new(move |name: &str| {
            seen.lock().unwrap().push(name.to_string());
        })),
    )?;

    let values = rx.await?;
    assert_eq!(texts(&values), vec!["c", "a", "b"]);
    assert_eq!(*progress.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_cycle_fails_fast_without_building() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    registry.register_with_dependencies(
        "chicken",
        vec!["egg".to_string()],
        ComponentBuilder::value("chicken"),
    )?;
    registry.register_with_dependencies(
        "egg",
        vec!["chicken".to_string()],
        ComponentBuilder::value("egg"),
    )?;

    let result = registry.resolve("chicken".into()).await;

    match result {
        Err(DependencyError::CircularDependency { dependency_chain }) => {
            assert_eq!(dependency_chain, "chicken -> egg -> chicken");
        }
        other => panic!("expected circular dependency, got {other:?}"),
    }
    assert_eq!(registry.stats().idle, 2);
    Ok(())
}

#[tokio::test]
async fn test_cycle_hangs_when_detection_disabled() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::with_config(
        RegistryConfig::default().with_circular_dependency_detection(false),
    );
    registry.register_with_dependencies(
        "chicken",
        vec!["egg".to_string()],
        ComponentBuilder::value("chicken"),
    )?;
    registry.register_with_dependencies(
        "egg",
        vec!["chicken".to_string()],
        ComponentBuilder::value("egg"),
    )?;

    let result =
        tokio::time::timeout(Duration::from_millis(50), registry.resolve("chicken".into())).await;

    assert!(result.is_err(), "cyclic resolution should never complete");
    assert_eq!(registry.stats().building, 2);
    Ok(())
}

#[tokio::test]
async fn test_dropped_completion_never_resolves() -> anyhow::Result<()> {
    let (logs, _guard) = capture_warnings();
    let registry = ComponentRegistryImpl::new();
    registry.register("lost", ComponentBuilder::asynchronous(|_, done| drop(done)))?;

    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    registry.resolve_with(
        "lost".into(),
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        None,
    )?;
    settle().await;

    assert_eq!(done.load(Ordering::SeqCst), 0);
    assert_eq!(registry.stats().building, 1);
    assert!(logs.contents().contains("lost"));
    Ok(())
}

#[tokio::test]
async fn test_panicking_builder_leaves_component_building() -> anyhow::Result<()> {
    let registry = ComponentRegistryImpl::new();
    registry.register(
        "boom",
        ComponentBuilder::sync(|_| -> String { panic!("builder failure") }),
    )?;

    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    registry.resolve_with(
        "boom".into(),
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        None,
    )?;
    settle().await;

    assert_eq!(done.load(Ordering::SeqCst), 0);
    assert!(!registry.is_resolved("boom"));
    assert_eq!(registry.stats().building, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_logs_but_does_not_cancel() -> anyhow::Result<()> {
    let (logs, _guard) = capture_warnings();
    let registry = ComponentRegistryImpl::with_config(
        RegistryConfig::default().with_watchdog_timeout(Duration::from_secs(1)),
    );
    registry.register("fast", ComponentBuilder::value("fast"))?;
    registry.register(
        "slow",
        ComponentBuilder::future(|_| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            "slow"
        }),
    )?;

    let values = registry.resolve(["fast", "slow"].into()).await?;

    assert_eq!(texts(&values), vec!["fast", "slow"]);
    let output = logs.contents();
    assert!(output.contains("看门狗"), "watchdog should have logged: {output}");
    assert!(output.contains("\"slow\""));
    assert!(!output.contains("\"fast\""));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_is_cancelled_on_completion() -> anyhow::Result<()> {
    let (logs, _guard) = capture_warnings();
    let registry = ComponentRegistryImpl::with_config(
        RegistryConfig::default().with_watchdog_timeout(Duration::from_secs(1)),
    );
    registry.register("fast", ComponentBuilder::value("fast"))?;

    registry.resolve("fast".into()).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(!logs.contents().contains("看门狗"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_logs_once_for_a_stalled_dependency_chain() -> anyhow::Result<()> {
    let (logs, _guard) = capture_warnings();
    let registry = ComponentRegistryImpl::with_config(
        RegistryConfig::default().with_watchdog_timeout(Duration::from_secs(1)),
    );
    let parked: Arc<Mutex<Option<Completion>>> = Arc::new(Mutex::new(None));
    let holder = Arc::clone(&parked);
    registry.register(
        "leaf",
        ComponentBuilder::asynchronous(move |_, done| {
            *holder.lock().unwrap() = Some(done);
        }),
    )?;
    registry.register_with_dependencies(
        "mid",
        vec!["leaf".to_string()],
        ComponentBuilder::sync(|_| "mid"),
    )?;
    registry.register_with_dependencies(
        "top",
        vec!["mid".to_string()],
        ComponentBuilder::sync(|_| "top"),
    )?;

    registry.resolve_with("top".into(), Box::new(|_| {}), None)?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    let output = logs.contents();
    assert_eq!(output.matches("看门狗").count(), 1, "{output}");
    assert!(output.contains("\"top\""));
    assert!(!output.contains("\"mid\""));
    assert!(parked.lock().unwrap().is_some());
    Ok(())
}
