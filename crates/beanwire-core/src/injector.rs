//! The injection handle given to components and factories

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::component::{Autowired, Collected, Component, Field, Property};
use crate::error::{ContextError, ContextResult};
use crate::properties::BindRequest;
use crate::types::{nullable_selector, short_type_name, BeanSelector, BeanType, BeanValue};
use crate::wiring::WiringFrame;

/// A single-bean lookup issued by an injector
pub(crate) struct Lookup<'l> {
    pub target: BeanType,
    pub selector: &'l BeanSelector,
    pub raw: &'l str,
    pub field: &'l str,
    /// Address of the value being injected into; never injected into itself
    pub exclude: Option<usize>,
}

/// Operations an injector needs from the wiring session behind it
pub(crate) trait Assembly {
    /// Disambiguate, wire and return the single bean for `lookup`, cast to
    /// its target type. `Ok(None)` only for nullable selectors.
    fn bean_value(&mut self, lookup: Lookup<'_>) -> ContextResult<Option<BeanValue>>;

    /// Wired sequence beans of type `sequence`, then wired singletons cast
    /// to `element`, both in cache order
    fn collect_values(
        &mut self,
        sequence: BeanType,
        element: BeanType,
    ) -> ContextResult<Vec<BeanValue>>;

    fn bind_text(&mut self, request: &BindRequest<'_>) -> ContextResult<String>;

    fn push_frame(&mut self, frame: WiringFrame);

    fn pop_frame(&mut self);

    fn allow_private_access(&self) -> bool;
}

/// The value an injector wires into
#[derive(Debug, Clone)]
pub(crate) struct Host {
    pub type_name: String,
    pub address: Option<usize>,
    pub caller: String,
}

impl Host {
    pub(crate) fn new(type_name: &str, address: Option<usize>, caller: String) -> Self {
        Self {
            type_name: short_type_name(type_name),
            address,
            caller,
        }
    }
}

/// Injects beans and properties into one component or factory call.
///
/// Every slot method is a no-op on a slot that is already filled, so wiring
/// the same value twice is harmless.
pub struct Injector<'a> {
    assembly: &'a mut dyn Assembly,
    host: Host,
    only_autowire: bool,
    arguments: usize,
}

impl<'a> Injector<'a> {
    pub(crate) fn new(assembly: &'a mut dyn Assembly, host: Host, only_autowire: bool) -> Self {
        Self {
            assembly,
            host,
            only_autowire,
            arguments: 0,
        }
    }

    /// Short type name of the value being wired
    pub fn host(&self) -> &str {
        &self.host.type_name
    }

    /// Whether value binding is skipped for this component
    pub fn only_autowire(&self) -> bool {
        self.only_autowire
    }

    /// Inject the single bean matching `selector` into `slot`.
    ///
    /// Returns `false` when a nullable selector matched nothing.
    pub fn autowire<'f, T>(
        &mut self,
        field: impl Into<Field<'f>>,
        slot: &Autowired<T>,
        selector: &str,
    ) -> ContextResult<bool>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let field = field.into();
        let path = self.field_path(field.name);
        self.check_access(&field, &path)?;

        if slot.is_wired() {
            return Ok(true);
        }

        let parsed = BeanSelector::parse(selector);
        if parsed.is_collection() {
            return Err(ContextError::InvalidTarget {
                target: path,
                message: format!("collection selector \"{}\" on a single-bean field", selector),
            });
        }

        let exclude = self.host.address;
        match self.lookup::<T>(&parsed, selector, &path, exclude)? {
            Some(bean) => {
                slot.fill(bean);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Inject every bean assignable to `T` into `slot`.
    ///
    /// `selector` must be `"[]"`, or `"[]?"` to accept an empty result.
    pub fn collect<'f, T>(
        &mut self,
        field: impl Into<Field<'f>>,
        slot: &Collected<T>,
        selector: &str,
    ) -> ContextResult<bool>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let field = field.into();
        let path = self.field_path(field.name);
        self.check_access(&field, &path)?;

        let parsed = BeanSelector::parse(selector);
        if !parsed.is_collection() {
            return Err(ContextError::InvalidTarget {
                target: path,
                message: format!("collection field requires \"[]\", got \"{}\"", selector),
            });
        }

        if slot.is_wired() {
            return Ok(true);
        }

        let beans = self.gather::<T>()?;
        if beans.is_empty() {
            if parsed.nullable {
                return Ok(false);
            }
            return Err(ContextError::BeanNotFound {
                selector: selector.to_string(),
                field: path,
                bean_type: std::any::type_name::<Vec<Arc<T>>>().to_string(),
            });
        }

        slot.fill(beans);
        Ok(true)
    }

    /// Bind a property tag into `slot`; skipped for autowire-only components
    pub fn value<'f, T>(
        &mut self,
        field: impl Into<Field<'f>>,
        slot: &Property<T>,
        tag: &str,
    ) -> ContextResult<bool>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.bind_value(field.into(), slot, tag, None)
    }

    /// Like [`value`](Self::value), with a fallback for a missing key
    pub fn value_or<'f, T>(
        &mut self,
        field: impl Into<Field<'f>>,
        slot: &Property<T>,
        tag: &str,
        default: &str,
    ) -> ContextResult<bool>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.bind_value(field.into(), slot, tag, Some(default))
    }

    /// Wire a component embedded in the host
    pub fn nested<'f, T>(&mut self, field: impl Into<Field<'f>>, value: &T) -> ContextResult<()>
    where
        T: ?Sized + Component,
    {
        self.wire_field(field.into(), value, false)
    }

    /// Wire an embedded component whose values were bound as a whole;
    /// only its bean slots are injected
    pub fn nested_autowire_only<'f, T>(
        &mut self,
        field: impl Into<Field<'f>>,
        value: &T,
    ) -> ContextResult<()>
    where
        T: ?Sized + Component,
    {
        self.wire_field(field.into(), value, true)
    }

    /// Wire one element of a sequence bean
    pub fn element<T>(&mut self, index: usize, element: &Arc<T>) -> ContextResult<()>
    where
        T: ?Sized + Component,
    {
        let path = format!("{}[{}]", self.host.type_name, index);
        let frame = WiringFrame {
            bean_id: path.clone(),
            description: format!("{} element {} {}", std::any::type_name::<T>(), path, self.host.caller),
        };
        let address = Arc::as_ptr(element) as *const () as usize;
        self.wire_child(frame, element.as_ref(), address, false)
    }

    /// Resolve a required bean, typically a factory argument
    pub fn bean<T>(&mut self, selector: &str) -> ContextResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let path = self.next_argument();
        let parsed = BeanSelector::parse(selector);
        self.lookup::<T>(&parsed, selector, &path, None)?
            .ok_or_else(|| ContextError::BeanNotFound {
                selector: selector.to_string(),
                field: path,
                bean_type: std::any::type_name::<T>().to_string(),
            })
    }

    /// Resolve an optional bean; the selector is treated as nullable
    pub fn find_bean<T>(&mut self, selector: &str) -> ContextResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let path = self.next_argument();
        let selector = nullable_selector(selector);
        let parsed = BeanSelector::parse(&selector);
        self.lookup::<T>(&parsed, &selector, &path, None)
    }

    /// Every bean assignable to `T`, possibly none
    pub fn beans<T>(&mut self) -> ContextResult<Vec<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.gather::<T>()
    }

    /// Bind and parse a property tag
    pub fn property<T>(&mut self, tag: &str) -> ContextResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let path = self.next_argument();
        let text = self.assembly.bind_text(&BindRequest {
            target_type: std::any::type_name::<T>(),
            field_path: &path,
            tag,
            allow_private: self.assembly.allow_private_access(),
            default: None,
        })?;
        parse_property(&text, &path)
    }

    fn bind_value<T>(
        &mut self,
        field: Field<'_>,
        slot: &Property<T>,
        tag: &str,
        default: Option<&str>,
    ) -> ContextResult<bool>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if self.only_autowire {
            return Ok(false);
        }

        let path = self.field_path(field.name);
        self.check_access(&field, &path)?;

        if slot.is_bound() {
            return Ok(true);
        }

        let text = self.assembly.bind_text(&BindRequest {
            target_type: std::any::type_name::<T>(),
            field_path: &path,
            tag,
            allow_private: self.assembly.allow_private_access(),
            default,
        })?;
        slot.fill(parse_property(&text, &path)?);
        Ok(true)
    }

    fn wire_field<T>(&mut self, field: Field<'_>, value: &T, only_autowire: bool) -> ContextResult<()>
    where
        T: ?Sized + Component,
    {
        let path = self.field_path(field.name);
        self.check_access(&field, &path)?;

        let frame = WiringFrame {
            bean_id: path.clone(),
            description: format!("{} field: {} {}", std::any::type_name::<T>(), path, self.host.caller),
        };
        let address = value as *const T as *const () as usize;
        self.wire_child(frame, value, address, only_autowire)
    }

    fn wire_child<T>(
        &mut self,
        frame: WiringFrame,
        value: &T,
        address: usize,
        only_autowire: bool,
    ) -> ContextResult<()>
    where
        T: ?Sized + Component,
    {
        self.assembly.push_frame(frame);
        let host = Host::new(
            std::any::type_name::<T>(),
            Some(address),
            self.host.caller.clone(),
        );
        let mut child = Injector::new(&mut *self.assembly, host, only_autowire);
        value.autowire(&mut child)?;
        self.assembly.pop_frame();
        Ok(())
    }

    fn lookup<T>(
        &mut self,
        selector: &BeanSelector,
        raw: &str,
        field: &str,
        exclude: Option<usize>,
    ) -> ContextResult<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let value = self.assembly.bean_value(Lookup {
            target: BeanType::of::<T>(),
            selector,
            raw,
            field,
            exclude,
        })?;

        match value {
            None => Ok(None),
            Some(value) => value.downcast::<T>().map(Some).ok_or_else(|| {
                ContextError::InvalidTarget {
                    target: field.to_string(),
                    message: format!(
                        "{} can't be assigned to {}",
                        value.bean_type(),
                        std::any::type_name::<T>()
                    ),
                }
            }),
        }
    }

    fn gather<T>(&mut self) -> ContextResult<Vec<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let sequence = BeanType::of::<Vec<Arc<T>>>();
        let values = self
            .assembly
            .collect_values(sequence, BeanType::of::<T>())?;

        let mut beans = Vec::new();
        for value in values {
            if value.bean_type() == sequence {
                if let Some(elements) = value.downcast::<Vec<Arc<T>>>() {
                    beans.extend(elements.iter().cloned());
                }
            } else if let Some(bean) = value.downcast::<T>() {
                beans.push(bean);
            }
        }
        Ok(beans)
    }

    fn field_path(&self, field: &str) -> String {
        format!("{}.{}", self.host.type_name, field)
    }

    fn next_argument(&mut self) -> String {
        let path = format!("{}(arg {})", self.host.type_name, self.arguments);
        self.arguments += 1;
        path
    }

    fn check_access(&self, field: &Field<'_>, path: &str) -> ContextResult<()> {
        if field.private && !self.assembly.allow_private_access() {
            return Err(ContextError::InvalidTarget {
                target: path.to_string(),
                message: "private field requires allow_private_access".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Injector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("host", &self.host)
            .field("only_autowire", &self.only_autowire)
            .finish()
    }
}

fn parse_property<T>(text: &str, path: &str) -> ContextResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    Property::<T>::parse(text).map_err(|message| ContextError::Bind {
        field: path.to_string(),
        message: format!(
            "can't parse \"{}\" as {}: {}",
            text,
            std::any::type_name::<T>(),
            message
        ),
    })
}
