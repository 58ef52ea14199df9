//! Bean assembly: one wiring session over the context state
//!
//! A session owns its [`WiringStack`] and borrows the context state
//! exclusively, so concurrent lookups on a shared context are serialised by
//! the context lock and never observe each other's stacks.

use tracing::trace;

use crate::context::ContextState;
use crate::definition::{AutowireFn, BeanHandle, BeanStatus, MethodParent, Provider, ProviderKind};
use crate::error::{BoxError, ContextError, ContextResult};
use crate::injector::{Assembly, Host, Injector, Lookup};
use crate::properties::{BindRequest, PropertyBinder};
use crate::types::{BeanType, BeanValue};
use crate::wiring::{WiringFrame, WiringObserver, WiringStack};

pub(crate) struct BeanAssembly<'s> {
    state: &'s mut ContextState,
    stack: WiringStack,
}

impl<'s> BeanAssembly<'s> {
    pub(crate) fn new(state: &'s mut ContextState, observers: Vec<WiringObserver>) -> Self {
        Self {
            state,
            stack: WiringStack::new(observers),
        }
    }

    /// Wiring path at this point, empty when the stack is empty
    pub(crate) fn path(&self) -> String {
        self.stack.path()
    }

    /// Wire one definition and everything it depends on.
    ///
    /// On error the stack is left as it was at the failure, so the caller
    /// can attach [`path`](Self::path) to the error.
    pub(crate) fn wire_definition(
        &mut self,
        handle: BeanHandle,
        only_autowire: bool,
    ) -> ContextResult<()> {
        let (frame, status, kind) = {
            let definition = self.state.definition(handle)?;
            let frame = WiringFrame {
                bean_id: definition.bean_id(),
                description: definition.description(),
            };
            (frame, definition.status, definition.kind())
        };

        match status {
            BeanStatus::Deleted => {
                return Err(ContextError::InvalidState {
                    bean_id: frame.bean_id,
                    message: "has been deleted".to_string(),
                });
            }
            BeanStatus::Wired => return Ok(()),
            _ => {}
        }

        let bean_id = frame.bean_id.clone();
        let description = frame.description.clone();
        self.stack.push(frame);

        if status == BeanStatus::Wiring {
            if kind == ProviderKind::Object {
                // the instance exists; its fields may still be unset
                trace!(bean = %bean_id, "tolerated circular reference");
                self.stack.pop();
                return Ok(());
            }
            return Err(ContextError::CircularDependency {
                bean_id,
                path: self.stack.path(),
            });
        }

        self.state.definitions[handle.0].status = BeanStatus::Wiring;

        let depends_on = self.state.definitions[handle.0].depends_on.clone();
        for selector in &depends_on {
            let dependency = self.state.find_definition(selector)?.ok_or_else(|| {
                ContextError::BeanNotFound {
                    selector: selector.clone(),
                    field: format!("{} depends on", bean_id),
                    bean_type: String::new(),
                }
            })?;
            self.wire_definition(dependency, false)?;
        }

        let caller = self.state.definitions[handle.0].caller();
        let provider = self.state.definitions[handle.0].provider.clone();
        match provider {
            Provider::Object { value, autowire } => {
                self.wire_value(&value, &autowire, only_autowire, &caller)?;
            }
            Provider::Constructor {
                factory, autowire, ..
            } => {
                let bean_type = self.state.definitions[handle.0].bean_type;
                let produced = {
                    let host = Host::new(bean_type.name(), None, caller.clone());
                    let mut injector = Injector::new(self, host, false);
                    factory(&mut injector)
                };
                let value = self.store_produced(handle, &description, produced)?;
                self.wire_delegate(&value, &autowire, &caller)?;
            }
            Provider::Method {
                parent,
                parent_type,
                method,
                invoke,
                autowire,
                ..
            } => {
                let parent = match parent {
                    MethodParent::Resolved(parent) => parent,
                    MethodParent::Pending(selector) => {
                        return Err(ContextError::InvalidState {
                            bean_id,
                            message: format!("parent bean \"{}\" was never resolved", selector),
                        });
                    }
                };
                self.wire_definition(parent, false)?;

                let parent_value = self.parent_value(parent, parent_type)?;
                let bean_type = self.state.definitions[handle.0].bean_type;
                let produced = {
                    let host = Host::new(bean_type.name(), None, caller.clone());
                    let mut injector = Injector::new(self, host, false);
                    invoke(&parent_value, &mut injector)
                };
                trace!(bean = %bean_id, method = %method, "invoked method bean");
                let value = self.store_produced(handle, &description, produced)?;
                self.wire_delegate(&value, &autowire, &caller)?;
            }
        }

        let init = self.state.definitions[handle.0].init.clone();
        if let Some(init) = init {
            let value = self.state.definitions[handle.0].value().cloned();
            if let Some(value) = value {
                init(&value).map_err(|source| ContextError::Lifecycle {
                    bean: description.clone(),
                    source,
                })?;
            }
        }

        self.stack.pop();
        self.state.definitions[handle.0].status = BeanStatus::Wired;
        self.state.wired_order.push(handle);
        Ok(())
    }

    /// Wire an object that is not registered in the context
    pub(crate) fn wire_external(
        &mut self,
        value: &BeanValue,
        autowire: &AutowireFn,
        caller: &str,
    ) -> ContextResult<()> {
        let bean_id = format!("{}:{}", value.bean_type().name(), value.bean_type().short_name());
        self.stack.push(WiringFrame {
            description: format!("object bean \"{}\" {}", bean_id, caller),
            bean_id,
        });
        self.wire_value(value, autowire, false, caller)?;
        self.stack.pop();
        Ok(())
    }

    fn wire_value(
        &mut self,
        value: &BeanValue,
        autowire: &AutowireFn,
        only_autowire: bool,
        caller: &str,
    ) -> ContextResult<()> {
        let host = Host::new(
            value.bean_type().name(),
            Some(value.address()),
            caller.to_string(),
        );
        let mut injector = Injector::new(self, host, only_autowire);
        autowire(value, &mut injector)
    }

    /// Wire the fields of a value produced by a constructor or method
    fn wire_delegate(
        &mut self,
        value: &BeanValue,
        autowire: &AutowireFn,
        caller: &str,
    ) -> ContextResult<()> {
        self.stack.push(WiringFrame {
            bean_id: value.bean_type().name().to_string(),
            description: format!("{} value {}", value.bean_type(), caller),
        });
        self.wire_value(value, autowire, false, caller)?;
        self.stack.pop();
        Ok(())
    }

    fn store_produced(
        &mut self,
        handle: BeanHandle,
        description: &str,
        produced: Result<Option<BeanValue>, BoxError>,
    ) -> ContextResult<BeanValue> {
        let value = produced
            .map_err(|error| ContextError::from_factory(description.to_string(), error))?
            .ok_or_else(|| ContextError::NilBean {
                bean: description.to_string(),
            })?;

        match &mut self.state.definitions[handle.0].provider {
            Provider::Constructor { value: slot, .. } | Provider::Method { value: slot, .. } => {
                *slot = Some(value.clone());
            }
            Provider::Object { .. } => {}
        }
        Ok(value)
    }

    fn parent_value(&self, parent: BeanHandle, parent_type: BeanType) -> ContextResult<BeanValue> {
        let definition = self.state.definition(parent)?;
        let value = definition
            .value()
            .ok_or_else(|| ContextError::InvalidState {
                bean_id: definition.bean_id(),
                message: "parent bean has no value".to_string(),
            })?;
        self.state
            .implementations
            .cast(value, parent_type)
            .ok_or_else(|| ContextError::InvalidTarget {
                target: definition.description(),
                message: format!("parent can't be used as {}", parent_type),
            })
    }

    fn wired_value(&mut self, handle: BeanHandle, target: BeanType) -> ContextResult<BeanValue> {
        self.wire_definition(handle, false)?;
        let definition = self.state.definition(handle)?;
        let value = definition
            .value()
            .ok_or_else(|| ContextError::InvalidState {
                bean_id: definition.bean_id(),
                message: "has no value".to_string(),
            })?;
        self.state
            .implementations
            .cast(value, target)
            .ok_or_else(|| ContextError::InvalidTarget {
                target: target.to_string(),
                message: format!("{} can't be assigned", definition.description()),
            })
    }
}

impl Assembly for BeanAssembly<'_> {
    fn bean_value(&mut self, lookup: Lookup<'_>) -> ContextResult<Option<BeanValue>> {
        let cached = self.state.cache.get(lookup.target).to_vec();

        let found: Vec<BeanHandle> = cached
            .into_iter()
            .filter(|handle| {
                let definition = &self.state.definitions[handle.0];
                let is_self = match (lookup.exclude, definition.value()) {
                    (Some(address), Some(value)) => value.address() == address,
                    _ => false,
                };
                definition.status != BeanStatus::Deleted
                    && !is_self
                    && self
                        .state
                        .implementations
                        .assignable(definition.bean_type, lookup.target)
                    && definition.matches(lookup.selector)
            })
            .collect();

        if found.is_empty() {
            if lookup.selector.nullable {
                return Ok(None);
            }
            return Err(ContextError::BeanNotFound {
                selector: lookup.raw.to_string(),
                field: lookup.field.to_string(),
                bean_type: lookup.target.to_string(),
            });
        }

        let primaries: Vec<BeanHandle> = found
            .iter()
            .copied()
            .filter(|handle| self.state.definitions[handle.0].primary)
            .collect();

        let chosen = match primaries.len() {
            0 if found.len() > 1 => {
                return Err(ContextError::AmbiguousBean {
                    selector: lookup.raw.to_string(),
                    field: lookup.field.to_string(),
                    bean_type: lookup.target.to_string(),
                    candidates: self.state.descriptions(&found),
                });
            }
            0 => found[0],
            1 => primaries[0],
            _ => {
                return Err(ContextError::AmbiguousPrimary {
                    selector: lookup.raw.to_string(),
                    field: lookup.field.to_string(),
                    bean_type: lookup.target.to_string(),
                    candidates: self.state.descriptions(&primaries),
                });
            }
        };

        self.wired_value(chosen, lookup.target).map(Some)
    }

    fn collect_values(
        &mut self,
        sequence: BeanType,
        element: BeanType,
    ) -> ContextResult<Vec<BeanValue>> {
        let mut values = Vec::new();

        for handle in self.state.cache.get(sequence).to_vec() {
            values.push(self.wired_value(handle, sequence)?);
        }

        for handle in self.state.cache.get(element).to_vec() {
            values.push(self.wired_value(handle, element)?);
        }

        Ok(values)
    }

    fn bind_text(&mut self, request: &BindRequest<'_>) -> ContextResult<String> {
        match &self.state.binder {
            Some(binder) => binder.bind(request),
            None => self.state.properties.bind(request),
        }
    }

    fn push_frame(&mut self, frame: WiringFrame) {
        self.stack.push(frame);
    }

    fn pop_frame(&mut self) {
        self.stack.pop();
    }

    fn allow_private_access(&self) -> bool {
        self.state.config.allow_private_access
    }
}
