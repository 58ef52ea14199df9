//! Property-based tests for disambiguation, ordering and selector parsing

use std::collections::BTreeSet;
use std::sync::Arc;

use beanwire_core::*;
use parking_lot::Mutex;
use proptest::prelude::*;

#[derive(Debug)]
struct Candidate {
    index: usize,
}

impl Component for Candidate {}

#[derive(Default)]
struct Consumer {
    candidate: Autowired<Candidate>,
}

impl Component for Consumer {
    fn autowire(&self, injector: &mut Injector<'_>) -> ContextResult<()> {
        injector.autowire("candidate", &self.candidate, "")?;
        Ok(())
    }
}

trait Plugin: Component {
    fn id(&self) -> usize;
}

impl Plugin for Candidate {
    fn id(&self) -> usize {
        self.index
    }
}

fn arb_bean_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,11}"
}

proptest! {
    /// Exactly one primary always wins, wherever it was registered
    #[test]
    fn test_single_primary_always_selected(count in 1usize..8, primary in 0usize..8) {
        let primary = primary % count;
        let ctx = Context::new();
        for index in 0..count {
            let mut builder = BeanBuilder::object(Arc::new(Candidate { index }))
                .name(format!("candidate{index}"));
            if index == primary {
                builder = builder.primary();
            }
            ctx.register(builder).unwrap();
        }
        ctx.register_bean(Consumer::default()).unwrap();

        ctx.auto_wire_beans().unwrap();

        let consumer = ctx.get_bean::<Consumer>().unwrap().unwrap();
        prop_assert_eq!(consumer.candidate.get().unwrap().index, primary);
    }

    /// Without a primary, more than one candidate is always ambiguous
    #[test]
    fn test_no_primary_is_ambiguous(count in 2usize..8) {
        let ctx = Context::new();
        for index in 0..count {
            ctx.register_name_bean(format!("candidate{index}"), Candidate { index }).unwrap();
        }
        ctx.register_bean(Consumer::default()).unwrap();

        let error = ctx.auto_wire_beans().unwrap_err();
        match error.root_cause() {
            ContextError::AmbiguousBean { candidates, .. } => {
                prop_assert_eq!(candidates.len(), count);
            }
            other => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    /// With sorting enabled, beans are wired in bean id order
    #[test]
    fn test_sorted_wiring_order(names in prop::collection::btree_set(arb_bean_name(), 1..10)) {
        let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let ctx = Context::new();
        ctx.set_sort(true);

        // register in reverse so registration order never matches by accident
        for name in names.iter().rev() {
            let sink = order.clone();
            let recorded = name.clone();
            ctx.register(
                BeanBuilder::object(Arc::new(Candidate { index: 0 }))
                    .name(name.clone())
                    .init(move |_| {
                        sink.lock().push(recorded.clone());
                        Ok(())
                    }),
            )
            .unwrap();
        }

        ctx.auto_wire_beans().unwrap();

        let expected: Vec<String> = names.into_iter().collect();
        prop_assert_eq!(order.lock().clone(), expected);
    }

    /// Every exported bean is collected exactly once
    #[test]
    fn test_collect_returns_every_plugin(count in 0usize..12) {
        let ctx = Context::new();
        implements!(ctx, Candidate => dyn Plugin).unwrap();
        for index in 0..count {
            ctx.register(
                BeanBuilder::object(Arc::new(Candidate { index }))
                    .name(format!("plugin{index}"))
                    .export::<dyn Plugin>(),
            )
            .unwrap();
        }

        ctx.auto_wire_beans().unwrap();

        let plugins = ctx.collect_beans::<dyn Plugin>().unwrap();
        let ids: BTreeSet<usize> = plugins.iter().map(|p| p.id()).collect();
        prop_assert_eq!(plugins.len(), count);
        prop_assert_eq!(ids, (0..count).collect::<BTreeSet<_>>());
    }

    /// Selectors split into an optional type, a name and the nullable marker
    #[test]
    fn test_selector_parts(
        type_path in prop::collection::vec("[A-Za-z][A-Za-z0-9_]{0,8}", 0..4),
        name in arb_bean_name(),
        nullable in any::<bool>(),
    ) {
        let type_name = type_path.join("::");
        let mut text = if type_name.is_empty() {
            name.clone()
        } else {
            format!("{type_name}:{name}")
        };
        if nullable {
            text.push(NULLABLE_MARKER);
        }

        let selector = BeanSelector::parse(&text);
        prop_assert_eq!(&selector.type_name, &type_name);
        prop_assert_eq!(&selector.bean_name, &name);
        prop_assert_eq!(selector.nullable, nullable);
        prop_assert_eq!(selector.to_string(), text);
    }
}
