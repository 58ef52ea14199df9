//! End-to-end lifecycle tests: events, shutdown and cancellation
//!
//! A context is built, wired, shared with async tasks and closed, the way an
//! application would use it.

use std::sync::Arc;
use std::time::Duration;

use beanwire_common::logging;
use beanwire_core::*;
use parking_lot::Mutex;

#[derive(Default)]
struct Clock {
    ticks: Mutex<u64>,
}

impl Component for Clock {}

impl Clock {
    fn tick(&self) -> u64 {
        let mut ticks = self.ticks.lock();
        *ticks += 1;
        *ticks
    }
}

#[derive(Default)]
struct Scheduler {
    clock: Autowired<Clock>,
    interval_ms: Property<u64>,
}

impl Component for Scheduler {
    fn autowire(&self, injector: &mut Injector<'_>) -> ContextResult<()> {
        injector.autowire("clock", &self.clock, "")?;
        injector.value("interval_ms", &self.interval_ms, "${scheduler.interval:=5}")?;
        Ok(())
    }
}

fn build_context() -> Context {
    logging::init_for_tests();

    let ctx = Context::new();
    ctx.register_bean(Clock::default()).unwrap();
    ctx.register_bean(Scheduler::default()).unwrap();
    ctx
}

#[test]
fn test_events_are_emitted_in_order() {
    let events: Arc<Mutex<Vec<ContextEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let ctx = build_context();

    let sink = events.clone();
    ctx.subscribe(move |event| sink.lock().push(event));

    ctx.auto_wire_beans().unwrap();
    ctx.close();
    // a second close is a no-op
    ctx.close();

    assert_eq!(
        *events.lock(),
        vec![
            ContextEvent::ResolveStart,
            ContextEvent::ResolveEnd,
            ContextEvent::AutoWireStart,
            ContextEvent::AutoWireEnd,
            ContextEvent::CloseStart,
            ContextEvent::CloseEnd,
        ]
    );
}

#[test]
fn test_listeners_may_query_the_context() {
    let ctx = Arc::new(build_context());
    let seen: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));

    let weak = Arc::downgrade(&ctx);
    let sink = seen.clone();
    ctx.subscribe(move |event| {
        if event == ContextEvent::AutoWireEnd {
            if let Some(ctx) = weak.upgrade() {
                let found = ctx.get_bean::<Scheduler>().ok().flatten().is_some();
                *sink.lock() = Some(found);
            }
        }
    });

    ctx.auto_wire_beans().unwrap();
    assert_eq!(*seen.lock(), Some(true));
}

#[test]
fn test_failed_autowire_stops_before_autowire_end() {
    let events: Arc<Mutex<Vec<ContextEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let ctx = Context::new();
    ctx.register_bean(Scheduler::default()).unwrap();

    let sink = events.clone();
    ctx.subscribe(move |event| sink.lock().push(event));

    let error = ctx.auto_wire_beans().unwrap_err();
    assert!(matches!(error.root_cause(), ContextError::BeanNotFound { .. }));
    assert_eq!(
        *events.lock(),
        vec![
            ContextEvent::ResolveStart,
            ContextEvent::ResolveEnd,
            ContextEvent::AutoWireStart,
        ]
    );
}

#[tokio::test]
async fn test_close_cancels_background_tasks() {
    let ctx = Arc::new(build_context());
    ctx.auto_wire_beans().unwrap();

    let scheduler = ctx.get_bean::<Scheduler>().unwrap().unwrap();
    let token = ctx.cancellation_token();

    let worker = tokio::spawn(async move {
        let clock = scheduler.clock.get().unwrap();
        let interval = Duration::from_millis(scheduler.interval_ms.get_or(5));
        let mut last = 0;
        loop {
            tokio::select! {
                _ = token.cancelled() => break last,
                _ = tokio::time::sleep(interval) => last = clock.tick(),
            }
        }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    ctx.close();

    let ticks = tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker should stop after close")
        .unwrap();
    assert!(ticks >= 1);
    assert!(ctx.is_closed());
}

#[tokio::test]
async fn test_context_is_shared_across_tasks() {
    let ctx = Arc::new(build_context());
    ctx.auto_wire_beans().unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            let clock = ctx.get_bean::<Clock>().unwrap().unwrap();
            clock.tick()
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results.sort_unstable();
    assert_eq!(results, (1..=8).collect::<Vec<u64>>());
}
