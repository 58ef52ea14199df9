//! Bean definitions and the builder used to declare them

use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;

use crate::cast::{erase_cast, CastFn};
use crate::component::{Component, FactoryOutput};
use crate::condition::{Condition, ConditionContext, FnCondition, OnBean, OnMissingBean, OnProfile, OnProperty};
use crate::error::{BoxError, ContextError, ContextResult};
use crate::injector::Injector;
use crate::types::{BeanSelector, BeanType, BeanValue};

/// Index of a definition in its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BeanHandle(pub(crate) usize);

impl BeanHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Unique key of a registered bean: type plus name
pub type BeanKey = (BeanType, String);

/// Lifecycle state of a definition.
///
/// Moves forward only: `Default -> Resolving -> Resolved -> Wiring -> Wired`,
/// or to `Deleted` when an eligibility check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeanStatus {
    Default,
    Resolving,
    Resolved,
    Wiring,
    Wired,
    Deleted,
}

/// How a bean's instance is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Object,
    Constructor,
    Method,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Object => "object",
            ProviderKind::Constructor => "constructor",
            ProviderKind::Method => "method",
        })
    }
}

pub(crate) type AutowireFn =
    Arc<dyn Fn(&BeanValue, &mut Injector<'_>) -> ContextResult<()> + Send + Sync>;
pub(crate) type FactoryFn =
    Arc<dyn Fn(&mut Injector<'_>) -> Result<Option<BeanValue>, BoxError> + Send + Sync>;
pub(crate) type MethodFn =
    Arc<dyn Fn(&BeanValue, &mut Injector<'_>) -> Result<Option<BeanValue>, BoxError> + Send + Sync>;
pub(crate) type LifecycleFn = Arc<dyn Fn(&BeanValue) -> Result<(), BoxError> + Send + Sync>;

fn factory_fn<F>(f: F) -> FactoryFn
where
    F: Fn(&mut Injector<'_>) -> Result<Option<BeanValue>, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn method_fn<F>(f: F) -> MethodFn
where
    F: Fn(&BeanValue, &mut Injector<'_>) -> Result<Option<BeanValue>, BoxError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

fn lifecycle_fn<T, F>(f: F) -> LifecycleFn
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(move |value: &BeanValue| match value.downcast::<T>() {
        Some(bean) => f(&bean),
        None => Err(Box::new(ContextError::InvalidTarget {
            target: value.bean_type().to_string(),
            message: format!("expected {}", std::any::type_name::<T>()),
        })),
    })
}

/// Field wiring entry point for a bean of type `T`
pub(crate) fn autowire_component<T: ?Sized + Component>(
    value: &BeanValue,
    injector: &mut Injector<'_>,
) -> ContextResult<()> {
    match value.downcast::<T>() {
        Some(bean) => bean.autowire(injector),
        None => Err(ContextError::InvalidTarget {
            target: value.bean_type().to_string(),
            message: format!("expected {}", std::any::type_name::<T>()),
        }),
    }
}

pub(crate) fn autowire_fn<T: ?Sized + Component>() -> AutowireFn {
    Arc::new(autowire_component::<T>)
}

/// Selects the parent of a method bean
#[derive(Debug, Clone)]
pub enum ParentSelector {
    /// A definition returned by registration
    Handle(BeanHandle),
    /// A bean selector, `[typeName:]beanName`
    Id(String),
    /// The single bean of exactly this type
    Type(BeanType),
}

impl ParentSelector {
    pub fn of<P: ?Sized + 'static>() -> Self {
        ParentSelector::Type(BeanType::of::<P>())
    }
}

impl fmt::Display for ParentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentSelector::Handle(handle) => write!(f, "#{}", handle.0),
            ParentSelector::Id(id) => f.write_str(id),
            ParentSelector::Type(bean_type) => write!(f, "{}", bean_type),
        }
    }
}

impl From<BeanHandle> for ParentSelector {
    fn from(handle: BeanHandle) -> Self {
        ParentSelector::Handle(handle)
    }
}

impl From<&str> for ParentSelector {
    fn from(selector: &str) -> Self {
        ParentSelector::Id(selector.to_string())
    }
}

impl From<String> for ParentSelector {
    fn from(selector: String) -> Self {
        ParentSelector::Id(selector)
    }
}

impl From<BeanType> for ParentSelector {
    fn from(bean_type: BeanType) -> Self {
        ParentSelector::Type(bean_type)
    }
}

#[derive(Clone)]
pub(crate) enum MethodParent {
    Pending(ParentSelector),
    Resolved(BeanHandle),
}

#[derive(Clone)]
pub(crate) enum Provider {
    Object {
        value: BeanValue,
        autowire: AutowireFn,
    },
    Constructor {
        factory: FactoryFn,
        autowire: AutowireFn,
        value: Option<BeanValue>,
    },
    Method {
        parent: MethodParent,
        parent_type: BeanType,
        method: String,
        invoke: MethodFn,
        autowire: AutowireFn,
        value: Option<BeanValue>,
    },
}

impl Provider {
    pub(crate) fn kind(&self) -> ProviderKind {
        match self {
            Provider::Object { .. } => ProviderKind::Object,
            Provider::Constructor { .. } => ProviderKind::Constructor,
            Provider::Method { .. } => ProviderKind::Method,
        }
    }

    pub(crate) fn value(&self) -> Option<&BeanValue> {
        match self {
            Provider::Object { value, .. } => Some(value),
            Provider::Constructor { value, .. } | Provider::Method { value, .. } => value.as_ref(),
        }
    }
}

/// A registered bean: its type, name, provider and lifecycle state
pub struct BeanDefinition {
    pub(crate) bean_type: BeanType,
    pub(crate) name: String,
    pub(crate) provider: Provider,
    pub(crate) status: BeanStatus,
    pub(crate) primary: bool,
    pub(crate) depends_on: Vec<String>,
    pub(crate) exports: Vec<BeanType>,
    pub(crate) conditions: Vec<Arc<dyn Condition>>,
    pub(crate) init: Option<LifecycleFn>,
    pub(crate) destroy: Option<LifecycleFn>,
    pub(crate) location: &'static Location<'static>,
    /// Whether the definition occupies its key in the bean map
    pub(crate) registered: bool,
}

impl BeanDefinition {
    pub fn bean_type(&self) -> BeanType {
        self.bean_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualified identifier, `fullTypeName:name`
    pub fn bean_id(&self) -> String {
        format!("{}:{}", self.bean_type.name(), self.name)
    }

    pub fn status(&self) -> BeanStatus {
        self.status
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Declaration site, `file:line`
    pub fn caller(&self) -> String {
        format!("{}:{}", self.location.file(), self.location.line())
    }

    pub fn description(&self) -> String {
        format!("{} bean \"{}\" {}", self.kind(), self.bean_id(), self.caller())
    }

    pub fn value(&self) -> Option<&BeanValue> {
        self.provider.value()
    }

    pub(crate) fn key(&self) -> BeanKey {
        (self.bean_type, self.name.clone())
    }

    /// Empty type and bean names match anything
    pub fn matches(&self, selector: &BeanSelector) -> bool {
        (selector.type_name.is_empty() || self.bean_type.is_named(&selector.type_name))
            && (selector.bean_name.is_empty() || selector.bean_name == self.name)
    }

    pub(crate) fn snapshot(&self, handle: BeanHandle) -> BeanSnapshot {
        BeanSnapshot {
            handle,
            bean_id: self.bean_id(),
            name: self.name.clone(),
            bean_type: self.bean_type,
            kind: self.kind(),
            status: self.status,
            primary: self.primary,
            description: self.description(),
            value: self.value().cloned(),
        }
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("bean_id", &self.bean_id())
            .field("kind", &self.kind())
            .field("status", &self.status)
            .field("primary", &self.primary)
            .field("depends_on", &self.depends_on)
            .field("exports", &self.exports)
            .field("caller", &self.caller())
            .finish()
    }
}

/// Read-only view of a definition
#[derive(Debug, Clone)]
pub struct BeanSnapshot {
    pub handle: BeanHandle,
    pub bean_id: String,
    pub name: String,
    pub bean_type: BeanType,
    pub kind: ProviderKind,
    pub status: BeanStatus,
    pub primary: bool,
    pub description: String,
    pub value: Option<BeanValue>,
}

impl BeanSnapshot {
    pub fn is_wired(&self) -> bool {
        self.status == BeanStatus::Wired
    }

    /// The bean instance as `T`, if constructed and of that exact type
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.value.as_ref().and_then(|value| value.downcast::<T>())
    }
}

/// Declares a bean of type `T` before handing it to
/// [`Context::register`](crate::Context::register).
///
/// ```ignore
/// ctx.register(
///     BeanBuilder::constructor(|injector| -> ContextResult<Arc<OrderService>> {
///         Ok(Arc::new(OrderService::new(injector.bean::<dyn Repository>("")?)))
///     })
///     .name("orders")
///     .primary()
///     .export::<dyn Service>(),
/// )?;
/// ```
pub struct BeanBuilder<T: ?Sized> {
    name: Option<String>,
    provider: Provider,
    primary: bool,
    depends_on: Vec<String>,
    exports: Vec<BeanType>,
    casts: Vec<(BeanType, CastFn)>,
    conditions: Vec<Arc<dyn Condition>>,
    init: Option<LifecycleFn>,
    destroy: Option<LifecycleFn>,
    location: &'static Location<'static>,
    _bean: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Component> BeanBuilder<T> {
    /// An already constructed instance
    #[track_caller]
    pub fn object(value: Arc<T>) -> Self {
        Self::with_provider(Provider::Object {
            value: BeanValue::new(value),
            autowire: autowire_fn::<T>(),
        })
    }

    /// A constructor invoked once during wiring
    #[track_caller]
    pub fn constructor<F, O>(factory: F) -> Self
    where
        F: Fn(&mut Injector<'_>) -> O + Send + Sync + 'static,
        O: FactoryOutput<Bean = T>,
    {
        let factory = factory_fn(move |injector| {
            factory(injector)
                .into_bean()
                .map(|bean| bean.map(BeanValue::new))
        });
        Self::with_provider(Provider::Constructor {
            factory,
            autowire: autowire_fn::<T>(),
            value: None,
        })
    }

    /// A method invoked on a wired parent bean.
    ///
    /// `method` names the operation for diagnostics.
    #[track_caller]
    pub fn method<P, F, O>(parent: impl Into<ParentSelector>, method: &str, f: F) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<P>, &mut Injector<'_>) -> O + Send + Sync + 'static,
        O: FactoryOutput<Bean = T>,
    {
        let invoke = method_fn(move |parent: &BeanValue, injector| {
            let parent = parent.downcast::<P>().ok_or_else(|| -> BoxError {
                Box::new(ContextError::InvalidTarget {
                    target: parent.bean_type().to_string(),
                    message: format!("parent is not a {}", std::any::type_name::<P>()),
                })
            })?;
            f(parent, injector)
                .into_bean()
                .map(|bean| bean.map(BeanValue::new))
        });
        Self::with_provider(Provider::Method {
            parent: MethodParent::Pending(parent.into()),
            parent_type: BeanType::of::<P>(),
            method: method.to_string(),
            invoke,
            autowire: autowire_fn::<T>(),
            value: None,
        })
    }

    #[track_caller]
    fn with_provider(provider: Provider) -> Self {
        Self {
            name: None,
            provider,
            primary: false,
            depends_on: Vec::new(),
            exports: Vec::new(),
            casts: Vec::new(),
            conditions: Vec::new(),
            init: None,
            destroy: None,
            location: Location::caller(),
            _bean: PhantomData,
        }
    }

    /// Explicit name; defaults to the short type name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Prefer this bean when several candidates match
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Wire the bean matching `selector` first
    pub fn depends_on(mut self, selector: impl Into<String>) -> Self {
        self.depends_on.push(selector.into());
        self
    }

    /// Also index this bean under `I`. The cast must be declared on the
    /// context, otherwise resolution fails with an export mismatch.
    pub fn export<I: ?Sized + 'static>(mut self) -> Self {
        self.exports.push(BeanType::of::<I>());
        self
    }

    /// Index this bean under `I`, declaring the cast at the same time
    pub fn export_as<I, F>(mut self, caster: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let export = BeanType::of::<I>();
        self.casts.push((export, erase_cast::<T, I, F>(caster)));
        self.exports.push(export);
        self
    }

    pub fn condition(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    pub fn condition_fn<F>(self, f: F) -> Self
    where
        F: Fn(&mut ConditionContext<'_>) -> ContextResult<bool> + Send + Sync + 'static,
    {
        self.condition(FnCondition::new(f))
    }

    /// Only eligible when `profile` is active
    pub fn on_profile(self, profile: impl Into<String>) -> Self {
        self.condition(OnProfile::new(profile))
    }

    /// Only eligible when the property `key` is set
    pub fn on_property(self, key: impl Into<String>) -> Self {
        self.condition(OnProperty::present(key))
    }

    /// Only eligible when the property `key` equals `value`
    pub fn on_property_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition(OnProperty::equals(key, value))
    }

    pub fn on_bean(self, selector: impl Into<String>) -> Self {
        self.condition(OnBean::new(selector))
    }

    pub fn on_missing_bean(self, selector: impl Into<String>) -> Self {
        self.condition(OnMissingBean::new(selector))
    }

    /// Run after the bean and its fields are wired
    pub fn init<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.init = Some(lifecycle_fn::<T, F>(f));
        self
    }

    /// Run when the context closes
    pub fn destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.destroy = Some(lifecycle_fn::<T, F>(f));
        self
    }

    pub(crate) fn build(self) -> (BeanDefinition, Vec<(BeanType, CastFn)>) {
        let definition = BeanDefinition {
            bean_type: BeanType::of::<T>(),
            name: self
                .name
                .unwrap_or_else(|| BeanType::of::<T>().short_name()),
            provider: self.provider,
            status: BeanStatus::Default,
            primary: self.primary,
            depends_on: self.depends_on,
            exports: self.exports,
            conditions: self.conditions,
            init: self.init,
            destroy: self.destroy,
            location: self.location,
            registered: false,
        };
        (definition, self.casts)
    }
}

impl<T: ?Sized> fmt::Debug for BeanBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanBuilder")
            .field("type", &std::any::type_name::<T>())
            .field("name", &self.name)
            .field("kind", &self.provider.kind())
            .field("primary", &self.primary)
            .finish()
    }
}
