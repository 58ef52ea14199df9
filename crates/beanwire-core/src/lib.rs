//! Object-graph resolution engine for beanwire
//!
//! A [`Context`] collects bean definitions (pre-built objects, constructor
//! closures and methods of other beans), decides which of them are eligible,
//! then wires the whole graph once: dependencies are constructed first,
//! ambiguous matches are settled by primary beans, and illegal cycles are
//! reported with the full wiring path.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use beanwire_core::{implements, Autowired, Component, Context, ContextResult, Injector};
//!
//! trait Greeter: Component {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Component for English {}
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! #[derive(Default)]
//! struct App {
//!     greeter: Autowired<dyn Greeter>,
//! }
//!
//! impl Component for App {
//!     fn autowire(&self, injector: &mut Injector<'_>) -> ContextResult<()> {
//!         injector.autowire("greeter", &self.greeter, "")?;
//!         Ok(())
//!     }
//! }
//!
//! let ctx = Context::new();
//! implements!(ctx, English => dyn Greeter).unwrap();
//! ctx.register(beanwire_core::BeanBuilder::object(Arc::new(English)).export::<dyn Greeter>())
//!     .unwrap();
//! ctx.register_bean(App::default()).unwrap();
//! ctx.auto_wire_beans().unwrap();
//!
//! let app = ctx.get_bean::<App>().unwrap().unwrap();
//! assert_eq!(app.greeter.get().unwrap().greet(), "hello");
//! ```

mod assembly;
mod cache;
mod cast;
mod component;
mod condition;
mod config;
mod context;
mod definition;
mod error;
mod injector;
mod properties;
mod registration;
mod types;
mod wiring;

pub use cache::BeanCache;
pub use cast::{CastFn, Implementations};
pub use component::{Autowired, Collected, Component, FactoryOutput, Field, Property};
pub use condition::{
    Condition, ConditionContext, FnCondition, OnBean, OnMissingBean, OnProfile, OnProperty,
};
pub use config::{ContextConfig, ENV_PREFIX};
pub use context::{Context, ContextEvent, ContextListener};
pub use definition::{
    BeanBuilder, BeanDefinition, BeanHandle, BeanKey, BeanSnapshot, BeanStatus, ParentSelector,
    ProviderKind,
};
pub use error::{BoxError, ContextError, ContextResult};
pub use injector::Injector;
pub use properties::{BindRequest, Properties, PropertyBinder};
pub use registration::{
    list_discovered_registrations, register_discovered_beans, BeanRegistration, DEFAULT_PRIORITY,
};
pub use types::{
    short_type_name, BeanSelector, BeanType, BeanValue, COLLECTION_MARKER, NULLABLE_MARKER,
};
pub use wiring::{trace_observer, WiringEvent, WiringFrame, WiringObserver, WiringStack};

/// Re-exported for `inventory::submit!` in downstream crates
pub use inventory;
