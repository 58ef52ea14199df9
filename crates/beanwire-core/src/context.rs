//! The application context: bean registry, autowire pass and lookups

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use beanwire_common::format_error;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assembly::BeanAssembly;
use crate::cache::BeanCache;
use crate::cast::Implementations;
use crate::component::{Component, FactoryOutput};
use crate::condition::ConditionContext;
use crate::config::ContextConfig;
use crate::definition::{
    autowire_fn, BeanBuilder, BeanDefinition, BeanHandle, BeanKey, BeanSnapshot, BeanStatus,
    LifecycleFn, MethodParent, ParentSelector, Provider,
};
use crate::error::{ContextError, ContextResult};
use crate::injector::{Assembly, Host, Injector, Lookup};
use crate::properties::{Properties, PropertyBinder};
use crate::types::{nullable_selector, BeanSelector, BeanType, BeanValue};
use crate::wiring::WiringObserver;

/// Lifecycle notifications emitted by a [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextEvent {
    ResolveStart,
    ResolveEnd,
    AutoWireStart,
    AutoWireEnd,
    CloseStart,
    CloseEnd,
}

/// Subscriber for [`ContextEvent`]s
pub type ContextListener = Arc<dyn Fn(ContextEvent) + Send + Sync>;

/// Everything guarded by the context lock
#[derive(Default)]
pub(crate) struct ContextState {
    pub(crate) definitions: Vec<BeanDefinition>,
    pub(crate) bean_map: HashMap<BeanKey, BeanHandle>,
    pub(crate) pending_methods: Vec<BeanHandle>,
    pub(crate) cache: BeanCache,
    pub(crate) implementations: Implementations,
    pub(crate) properties: Properties,
    pub(crate) binder: Option<Arc<dyn PropertyBinder>>,
    pub(crate) config: ContextConfig,
    pub(crate) auto_wired: bool,
    pub(crate) wired_order: Vec<BeanHandle>,
}

impl ContextState {
    pub(crate) fn definition(&self, handle: BeanHandle) -> ContextResult<&BeanDefinition> {
        self.definitions
            .get(handle.0)
            .ok_or_else(|| ContextError::InvalidState {
                bean_id: format!("#{}", handle.0),
                message: "is not a registered bean".to_string(),
            })
    }

    /// Registered definitions that have not been deleted, in registration order
    fn live_handles(&self) -> Vec<BeanHandle> {
        self.definitions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.registered && d.status != BeanStatus::Deleted)
            .map(|(index, _)| BeanHandle(index))
            .collect()
    }

    pub(crate) fn descriptions(&self, handles: &[BeanHandle]) -> Vec<String> {
        handles
            .iter()
            .map(|handle| self.definitions[handle.0].description())
            .collect()
    }

    fn insert_key(&mut self, handle: BeanHandle) -> ContextResult<()> {
        let definition = &self.definitions[handle.0];
        let key = definition.key();
        if self.bean_map.contains_key(&key) {
            return Err(ContextError::DuplicateBean {
                bean_id: definition.bean_id(),
                caller: definition.caller(),
            });
        }
        self.bean_map.insert(key, handle);
        self.definitions[handle.0].registered = true;
        Ok(())
    }

    fn delete(&mut self, handle: BeanHandle) {
        let definition = &mut self.definitions[handle.0];
        definition.status = BeanStatus::Deleted;
        if definition.registered {
            definition.registered = false;
            let key = definition.key();
            self.bean_map.remove(&key);
        }
        debug!(bean = %self.definitions[handle.0].bean_id(), "deleted bean");
    }

    /// Bind every pending method bean to its parent and register it
    fn finalize_methods(&mut self) -> ContextResult<()> {
        for handle in std::mem::take(&mut self.pending_methods) {
            let selector = match &self.definitions[handle.0].provider {
                Provider::Method {
                    parent: MethodParent::Pending(selector),
                    ..
                } => selector.clone(),
                _ => continue,
            };

            let parents: Vec<BeanHandle> = match &selector {
                ParentSelector::Handle(parent) => {
                    self.definition(*parent)?;
                    vec![*parent]
                }
                ParentSelector::Id(id) => {
                    let parsed = BeanSelector::parse(id);
                    self.registered_where(|d| d.matches(&parsed))
                }
                ParentSelector::Type(bean_type) => {
                    self.registered_where(|d| d.bean_type == *bean_type)
                }
            };

            let parent = match parents.as_slice() {
                [parent] => *parent,
                [] => {
                    return Err(ContextError::BeanNotFound {
                        selector: selector.to_string(),
                        field: format!("parent of {}", self.definitions[handle.0].description()),
                        bean_type: String::new(),
                    });
                }
                _ => {
                    return Err(ContextError::AmbiguousBean {
                        selector: selector.to_string(),
                        field: format!("parent of {}", self.definitions[handle.0].description()),
                        bean_type: String::new(),
                        candidates: self.descriptions(&parents),
                    });
                }
            };

            if let Provider::Method { parent: slot, .. } = &mut self.definitions[handle.0].provider {
                *slot = MethodParent::Resolved(parent);
            }
            self.insert_key(handle)?;
        }
        Ok(())
    }

    fn registered_where<P>(&self, predicate: P) -> Vec<BeanHandle>
    where
        P: Fn(&BeanDefinition) -> bool,
    {
        self.definitions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.registered && predicate(d))
            .map(|(index, _)| BeanHandle(index))
            .collect()
    }

    /// Decide whether a bean can be instantiated and cache it if so
    pub(crate) fn resolve_bean(&mut self, handle: BeanHandle) -> ContextResult<()> {
        if self.definitions[handle.0].status != BeanStatus::Default {
            return Ok(());
        }
        self.definitions[handle.0].status = BeanStatus::Resolving;

        if let Provider::Method {
            parent: MethodParent::Resolved(parent),
            ..
        } = self.definitions[handle.0].provider
        {
            self.resolve_bean(parent)?;
            if self.definitions[parent.0].status == BeanStatus::Deleted {
                self.delete(handle);
                return Ok(());
            }
        }

        let conditions = self.definitions[handle.0].conditions.clone();
        for condition in conditions {
            if !condition.matches(&mut ConditionContext::new(self))? {
                self.delete(handle);
                return Ok(());
            }
        }

        let definition = &self.definitions[handle.0];
        let bean_type = definition.bean_type;
        let bean_id = definition.bean_id();
        let exports = definition.exports.clone();

        self.cache.store(bean_type, handle, &bean_id);
        for export in exports {
            if !self.implementations.assignable(bean_type, export) {
                return Err(ContextError::ExportMismatch {
                    bean: self.definitions[handle.0].description(),
                    export: export.to_string(),
                });
            }
            self.cache.store(export, handle, &bean_id);
        }

        self.definitions[handle.0].status = BeanStatus::Resolved;
        Ok(())
    }

    /// Registered beans matching `predicate`, resolved on demand.
    /// Beans in the middle of resolution are skipped.
    fn find_definitions<P>(&mut self, predicate: P) -> ContextResult<Vec<BeanHandle>>
    where
        P: Fn(&BeanDefinition, &Implementations) -> bool,
    {
        let matched: Vec<BeanHandle> = self
            .definitions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.registered && predicate(d, &self.implementations))
            .map(|(index, _)| BeanHandle(index))
            .collect();

        let mut result = Vec::new();
        for handle in matched {
            if self.definitions[handle.0].status == BeanStatus::Resolving {
                continue;
            }
            self.resolve_bean(handle)?;
            if self.definitions[handle.0].status != BeanStatus::Deleted {
                result.push(handle);
            }
        }
        Ok(result)
    }

    fn unique(&self, selector: &str, handles: Vec<BeanHandle>) -> ContextResult<Option<BeanHandle>> {
        match handles.as_slice() {
            [] => Ok(None),
            [handle] => Ok(Some(*handle)),
            _ => Err(ContextError::AmbiguousBean {
                selector: selector.to_string(),
                field: String::new(),
                bean_type: String::new(),
                candidates: self.descriptions(&handles),
            }),
        }
    }

    /// The single live bean matching `selector`
    pub(crate) fn find_definition(&mut self, selector: &str) -> ContextResult<Option<BeanHandle>> {
        let parsed = BeanSelector::parse(selector);
        let handles = self.find_definitions(|d, _| d.matches(&parsed))?;
        self.unique(selector, handles)
    }

    fn find_definition_by_type(&mut self, target: BeanType) -> ContextResult<Option<BeanHandle>> {
        let handles = self.find_definitions(|d, implementations| {
            implementations.assignable(d.bean_type, target)
        })?;
        self.unique(target.name(), handles)
    }
}

/// The container.
///
/// Register beans, run [`auto_wire_beans`](Context::auto_wire_beans) once,
/// then look beans up. All methods take `&self`; the registry lives behind a
/// read-write lock so a wired context can be shared across threads.
///
/// Init callbacks run while the context lock is held and must not call back
/// into the context. Destroy callbacks and event listeners run without it.
pub struct Context {
    state: RwLock<ContextState>,
    listeners: RwLock<Vec<ContextListener>>,
    cancel: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let state = ContextState {
            config,
            ..ContextState::default()
        };
        Self {
            state: RwLock::new(state),
            listeners: RwLock::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(ContextEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    fn emit(&self, event: ContextEvent) {
        let listeners = self.listeners.read().clone();
        debug!(event = ?event, listeners = listeners.len(), "context event");
        for listener in listeners {
            listener(event);
        }
    }

    pub fn config(&self) -> ContextConfig {
        self.state.read().config.clone()
    }

    pub fn profile(&self) -> Option<String> {
        self.state.read().config.profile.clone()
    }

    pub fn set_profile(&self, profile: impl Into<String>) {
        self.state.write().config.profile = Some(profile.into());
    }

    pub fn allow_private_access(&self) -> bool {
        self.state.read().config.allow_private_access
    }

    pub fn set_allow_private_access(&self, allow: bool) {
        self.state.write().config.allow_private_access = allow;
    }

    /// Wire in bean id order during the autowire pass
    pub fn set_sort(&self, sort: bool) {
        self.state.write().config.sort = sort;
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.state.read().properties.get(key).map(str::to_string)
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.write().properties.set(key, value);
    }

    /// Merge properties from a TOML, YAML or JSON file
    pub fn load_properties(&self, path: &Path) -> ContextResult<usize> {
        self.state.write().properties.load_file(path)
    }

    /// Replace the default property binder
    pub fn set_property_binder(&self, binder: Arc<dyn PropertyBinder>) {
        self.state.write().binder = Some(binder);
    }

    /// Declare that `C` may be injected where `I` is requested.
    /// See also the [`implements!`](crate::implements) macro.
    pub fn declare_implementation<C, I, F>(&self, caster: F) -> ContextResult<()>
    where
        C: ?Sized + Send + Sync + 'static,
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
    {
        let mut state = self.state.write();
        if state.auto_wired {
            return Err(ContextError::RegistrationFrozen {
                bean_id: format!(
                    "{} => {}",
                    std::any::type_name::<C>(),
                    std::any::type_name::<I>()
                ),
            });
        }
        state.implementations.declare::<C, I, F>(caster);
        Ok(())
    }

    /// Register a bean declared with a [`BeanBuilder`]
    pub fn register<T: ?Sized + Component>(&self, builder: BeanBuilder<T>) -> ContextResult<BeanHandle> {
        let (definition, casts) = builder.build();
        let bean_id = definition.bean_id();

        let mut state = self.state.write();
        if state.auto_wired {
            return Err(ContextError::RegistrationFrozen { bean_id });
        }

        let handle = BeanHandle(state.definitions.len());
        let bean_type = definition.bean_type;
        let kind = definition.kind();
        let pending = matches!(
            definition.provider,
            Provider::Method {
                parent: MethodParent::Pending(_),
                ..
            }
        );

        state.definitions.push(definition);
        if pending {
            state.pending_methods.push(handle);
        } else if let Err(e) = state.insert_key(handle) {
            state.definitions.pop();
            return Err(e);
        }

        for (export, cast) in casts {
            state.implementations.insert(bean_type, export, cast);
        }

        debug!(bean = %bean_id, kind = %kind, "registered bean");
        Ok(handle)
    }

    /// Register an instance under its short type name
    #[track_caller]
    pub fn register_bean<T: Component>(&self, bean: T) -> ContextResult<BeanHandle> {
        self.register(BeanBuilder::object(Arc::new(bean)))
    }

    #[track_caller]
    pub fn register_name_bean<T: Component>(
        &self,
        name: impl Into<String>,
        bean: T,
    ) -> ContextResult<BeanHandle> {
        self.register(BeanBuilder::object(Arc::new(bean)).name(name))
    }

    /// Register a constructor bean
    #[track_caller]
    pub fn register_bean_fn<T, F, O>(&self, factory: F) -> ContextResult<BeanHandle>
    where
        T: ?Sized + Component,
        F: Fn(&mut Injector<'_>) -> O + Send + Sync + 'static,
        O: FactoryOutput<Bean = T>,
    {
        self.register(BeanBuilder::constructor(factory))
    }

    /// Register a bean produced by a method of a parent bean
    #[track_caller]
    pub fn register_method_bean<T, P, F, O>(
        &self,
        parent: impl Into<ParentSelector>,
        method: &str,
        f: F,
    ) -> ContextResult<BeanHandle>
    where
        T: ?Sized + Component,
        P: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<P>, &mut Injector<'_>) -> O + Send + Sync + 'static,
        O: FactoryOutput<Bean = T>,
    {
        self.register(BeanBuilder::method(parent, method, f))
    }

    pub fn is_wired(&self) -> bool {
        self.state.read().auto_wired
    }

    /// Resolve and wire every registered bean. Runs once per context.
    pub fn auto_wire_beans(&self) -> ContextResult<()> {
        self.auto_wire_beans_observed(Vec::new())
    }

    /// [`auto_wire_beans`](Self::auto_wire_beans) with wiring observers
    pub fn auto_wire_beans_observed(&self, observers: Vec<WiringObserver>) -> ContextResult<()> {
        {
            let mut state = self.state.write();
            if state.auto_wired {
                return Err(ContextError::AlreadyWired);
            }
            // a failed pass still leaves the context frozen
            state.auto_wired = true;
            state.finalize_methods()?;
            info!(beans = state.bean_map.len(), "starting autowire");
        }

        self.emit(ContextEvent::ResolveStart);
        {
            let mut state = self.state.write();
            for handle in state.live_handles() {
                if let Err(e) = state.resolve_bean(handle) {
                    error!(error = %format_error(&e), "bean resolution failed");
                    return Err(e);
                }
            }
        }
        self.emit(ContextEvent::ResolveEnd);

        self.emit(ContextEvent::AutoWireStart);
        let wired = {
            let mut state = self.state.write();
            let mut order = state.live_handles();
            if state.config.sort {
                order.sort_by_key(|handle| state.definitions[handle.0].bean_id());
            }

            let mut assembly = BeanAssembly::new(&mut state, observers);
            for handle in &order {
                if let Err(e) = assembly.wire_definition(*handle, false) {
                    let path = assembly.path();
                    error!(error = %format_error(&e), "autowire failed ↩\n{}", path);
                    return Err(e.with_path(path));
                }
            }
            order.len()
        };
        self.emit(ContextEvent::AutoWireEnd);

        info!(beans = wired, "autowire finished");
        Ok(())
    }

    fn check_wired(state: &ContextState, operation: &'static str) -> ContextResult<()> {
        if !state.auto_wired {
            return Err(ContextError::NotYetWired { operation });
        }
        Ok(())
    }

    /// The single bean assignable to `T`; `None` when there is none
    pub fn get_bean<T>(&self) -> ContextResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_bean_observed::<T>("", Vec::new())
    }

    /// The single bean assignable to `T` matching `selector`
    pub fn get_bean_by_name<T>(&self, selector: &str) -> ContextResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_bean_observed::<T>(selector, Vec::new())
    }

    /// Lookups are always nullable: a missing bean is `Ok(None)`, while
    /// ambiguity is still an error.
    pub fn get_bean_observed<T>(
        &self,
        selector: &str,
        observers: Vec<WiringObserver>,
    ) -> ContextResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut state = self.state.write();
        Self::check_wired(&state, "get_bean")?;

        let selector = nullable_selector(selector);
        let parsed = BeanSelector::parse(&selector);
        let mut assembly = BeanAssembly::new(&mut state, observers);
        let value = assembly
            .bean_value(Lookup {
                target: BeanType::of::<T>(),
                selector: &parsed,
                raw: &selector,
                field: "",
                exclude: None,
            })
            .map_err(|e| e.with_path(assembly.path()))?;

        Ok(value.and_then(|value| value.downcast::<T>()))
    }

    /// Find a bean definition by selector without wiring it
    pub fn find_bean(&self, selector: &str) -> ContextResult<Option<BeanSnapshot>> {
        let mut state = self.state.write();
        Self::check_wired(&state, "find_bean")?;
        let handle = state.find_definition(selector)?;
        Ok(handle.map(|handle| state.definitions[handle.0].snapshot(handle)))
    }

    /// Find the definition whose type is assignable to `T`
    pub fn find_bean_by_type<T: ?Sized + 'static>(&self) -> ContextResult<Option<BeanSnapshot>> {
        let mut state = self.state.write();
        Self::check_wired(&state, "find_bean")?;
        let handle = state.find_definition_by_type(BeanType::of::<T>())?;
        Ok(handle.map(|handle| state.definitions[handle.0].snapshot(handle)))
    }

    /// Every bean assignable to `T`: sequence beans first, then singletons
    pub fn collect_beans<T>(&self) -> ContextResult<Vec<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.collect_beans_observed::<T>(Vec::new())
    }

    pub fn collect_beans_observed<T>(&self, observers: Vec<WiringObserver>) -> ContextResult<Vec<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut state = self.state.write();
        Self::check_wired(&state, "collect_beans")?;

        let mut assembly = BeanAssembly::new(&mut state, observers);
        let result = {
            let host = Host::new("Context", None, String::new());
            let mut injector = Injector::new(&mut assembly, host, false);
            injector.beans::<T>()
        };
        result.map_err(|e| e.with_path(assembly.path()))
    }

    /// Wire an object that is not registered in the context
    #[track_caller]
    pub fn wire_bean<T: Component>(&self, bean: &Arc<T>) -> ContextResult<()> {
        let location = std::panic::Location::caller();
        let caller = format!("{}:{}", location.file(), location.line());

        let mut state = self.state.write();
        Self::check_wired(&state, "wire_bean")?;

        let value = BeanValue::new(bean.clone());
        let mut assembly = BeanAssembly::new(&mut state, Vec::new());
        assembly
            .wire_external(&value, &autowire_fn::<T>(), &caller)
            .map_err(|e| e.with_path(assembly.path()))
    }

    /// Snapshots of every registered, non-deleted definition
    pub fn get_bean_definitions(&self) -> Vec<BeanSnapshot> {
        let state = self.state.read();
        state
            .definitions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.registered)
            .map(|(index, d)| d.snapshot(BeanHandle(index)))
            .collect()
    }

    /// Run destroy callbacks in reverse wiring order, then cancel the
    /// context token. Later calls do nothing.
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }

        self.emit(ContextEvent::CloseStart);

        let callbacks: Vec<(String, LifecycleFn, BeanValue)> = {
            let state = self.state.read();
            state
                .wired_order
                .iter()
                .rev()
                .filter_map(|handle| {
                    let definition = &state.definitions[handle.0];
                    let destroy = definition.destroy.clone()?;
                    let value = definition.value()?.clone();
                    Some((definition.description(), destroy, value))
                })
                .collect()
        };

        for (bean, destroy, value) in callbacks {
            if let Err(source) = destroy(&value) {
                let e = ContextError::Lifecycle { bean, source };
                warn!(error = %format_error(&e), "destroy callback failed");
            }
        }

        self.cancel.cancel();
        self.emit(ContextEvent::CloseEnd);
        info!("context closed");
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled by [`close`](Self::close)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Context")
            .field("beans", &state.bean_map.len())
            .field("auto_wired", &state.auto_wired)
            .field("config", &state.config)
            .field("closed", &self.cancel.is_cancelled())
            .finish()
    }
}
