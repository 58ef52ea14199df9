//! Unit tests for context registration rules and lookup preconditions
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use beanwire_core::*;

#[derive(Debug)]
struct TestService {
    value: i32,
}

impl Component for TestService {}

trait Named: Component {
    fn label(&self) -> String;
}

impl Named for TestService {
    fn label(&self) -> String {
        format!("service-{}", self.value)
    }
}

#[test]
fn test_register_and_get_bean() {
    let ctx = Context::new();
    ctx.register_bean(TestService { value: 42 }).unwrap();
    ctx.auto_wire_beans().unwrap();

    let first = ctx.get_bean::<TestService>().unwrap().unwrap();
    let second = ctx.get_bean::<TestService>().unwrap().unwrap();

    // beans are singletons
    assert_eq!(first.value, 42);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_duplicate_type_and_name_rejected() {
    let ctx = Context::new();
    ctx.register_bean(TestService { value: 1 }).unwrap();

    let error = ctx.register_bean(TestService { value: 2 }).unwrap_err();
    match error {
        ContextError::DuplicateBean { bean_id, caller } => {
            assert!(bean_id.ends_with("TestService:TestService"));
            assert!(caller.contains("unit_tests.rs"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // same type, different name is fine
    ctx.register_name_bean("other", TestService { value: 2 }).unwrap();
}

#[test]
fn test_registration_frozen_after_autowire() {
    let ctx = Context::new();
    ctx.auto_wire_beans().unwrap();

    assert!(matches!(
        ctx.register_bean(TestService { value: 1 }),
        Err(ContextError::RegistrationFrozen { .. })
    ));
    assert!(matches!(
        implements!(ctx, TestService => dyn Named),
        Err(ContextError::RegistrationFrozen { .. })
    ));
}

#[test]
fn test_autowire_runs_once() {
    let inits = Arc::new(AtomicUsize::new(0));
    let ctx = Context::new();
    let counter = inits.clone();
    ctx.register(BeanBuilder::object(Arc::new(TestService { value: 1 })).init(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
    .unwrap();

    assert!(!ctx.is_wired());
    ctx.auto_wire_beans().unwrap();
    assert!(ctx.is_wired());
    assert!(matches!(ctx.auto_wire_beans(), Err(ContextError::AlreadyWired)));
    assert_eq!(inits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lookups_before_autowire_fail() {
    let ctx = Context::new();
    ctx.register_bean(TestService { value: 1 }).unwrap();

    assert!(matches!(
        ctx.get_bean::<TestService>(),
        Err(ContextError::NotYetWired { operation: "get_bean" })
    ));
    assert!(matches!(
        ctx.find_bean_by_type::<TestService>(),
        Err(ContextError::NotYetWired { operation: "find_bean" })
    ));
    assert!(matches!(
        ctx.collect_beans::<TestService>(),
        Err(ContextError::NotYetWired { operation: "collect_beans" })
    ));
    assert!(matches!(
        ctx.wire_bean(&Arc::new(TestService { value: 2 })),
        Err(ContextError::NotYetWired { operation: "wire_bean" })
    ));
}

#[test]
fn test_missing_bean_lookup_is_none() {
    let ctx = Context::new();
    ctx.auto_wire_beans().unwrap();

    assert!(ctx.get_bean::<TestService>().unwrap().is_none());
    assert!(ctx.find_bean("TestService").unwrap().is_none());
    assert!(ctx.collect_beans::<TestService>().unwrap().is_empty());
}

#[test]
fn test_find_bean_by_selector_forms() {
    let ctx = Context::new();
    ctx.register_name_bean("svc", TestService { value: 7 }).unwrap();
    ctx.auto_wire_beans().unwrap();

    for selector in ["svc", "TestService:svc", "unit_tests::TestService:svc", "TestService:"] {
        let snapshot = ctx.find_bean(selector).unwrap();
        assert!(snapshot.is_some(), "selector {selector} should match");
    }
    assert!(ctx.find_bean("Other:svc").unwrap().is_none());

    let snapshot = ctx.find_bean("svc").unwrap().unwrap();
    assert_eq!(snapshot.name, "svc");
    assert_eq!(snapshot.bean_type, BeanType::of::<TestService>());
    assert_eq!(snapshot.status, BeanStatus::Wired);
    assert!(snapshot.description.starts_with("object bean \""));
    assert_eq!(snapshot.downcast::<TestService>().unwrap().value, 7);
}

#[test]
fn test_interface_lookup_through_declared_cast() {
    let ctx = Context::new();
    implements!(ctx, TestService => dyn Named).unwrap();
    ctx.register(BeanBuilder::object(Arc::new(TestService { value: 3 })).export::<dyn Named>())
        .unwrap();
    ctx.auto_wire_beans().unwrap();

    let named = ctx.get_bean::<dyn Named>().unwrap().unwrap();
    assert_eq!(named.label(), "service-3");

    let all = ctx.collect_beans::<dyn Named>().unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn test_context_config_is_applied() {
    let ctx = Context::with_config(ContextConfig {
        sort: true,
        allow_private_access: true,
        profile: Some("test".to_string()),
    });

    assert!(ctx.config().sort);
    assert!(ctx.allow_private_access());
    assert_eq!(ctx.profile().as_deref(), Some("test"));

    ctx.set_profile("prod");
    assert_eq!(ctx.profile().as_deref(), Some("prod"));
}

#[test]
fn test_properties_on_context() {
    let ctx = Context::new();
    assert!(ctx.property("app.name").is_none());
    ctx.set_property("app.name", "beanwire");
    assert_eq!(ctx.property("app.name").as_deref(), Some("beanwire"));
}

#[test]
fn test_error_messages() {
    let error = ContextError::NotYetWired {
        operation: "get_bean",
    };
    assert_eq!(
        error.to_string(),
        "get_bean() must be called after auto_wire_beans()"
    );

    let error = ContextError::BeanNotFound {
        selector: "db".to_string(),
        field: "Repo.db".to_string(),
        bean_type: "Database".to_string(),
    };
    assert!(error.to_string().contains("can't find bean"));
}
