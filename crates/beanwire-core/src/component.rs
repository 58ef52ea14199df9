//! Components and their injection slots
//!
//! A bean type opts into field injection by implementing [`Component`] and
//! wiring its slots in [`Component::autowire`]:
//!
//! ```ignore
//! struct OrderService {
//!     repo: Autowired<dyn Repository>,
//!     handlers: Collected<dyn Handler>,
//!     timeout: Property<u64>,
//! }
//!
//! impl Component for OrderService {
//!     fn autowire(&self, injector: &mut Injector<'_>) -> ContextResult<()> {
//!         injector.value("timeout", &self.timeout, "${order.timeout:=30}")?;
//!         injector.autowire("repo", &self.repo, "")?;
//!         injector.collect("handlers", &self.handlers, "[]?")?;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Slots are write-once cells, so beans stay shared behind `Arc` while the
//! container fills them, and two object beans may reference each other.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{BoxError, ContextResult};
use crate::injector::Injector;

/// A type the container can manage as a bean.
///
/// Interface traits should declare `Component` as a supertrait so that a
/// `dyn Interface` bean forwards field wiring to its concrete type.
pub trait Component: Send + Sync + 'static {
    /// Inject this component's fields. The default injects nothing.
    fn autowire(&self, _injector: &mut Injector<'_>) -> ContextResult<()> {
        Ok(())
    }
}

/// Sequence beans wire every element.
impl<T: ?Sized + Component> Component for Vec<Arc<T>> {
    fn autowire(&self, injector: &mut Injector<'_>) -> ContextResult<()> {
        for (index, element) in self.iter().enumerate() {
            injector.element(index, element)?;
        }
        Ok(())
    }
}

macro_rules! plain_components {
    ($($ty:ty),+ $(,)?) => {
        $(impl Component for $ty {})+
    };
}

plain_components!(String, bool, i32, i64, u16, u32, u64, usize, f64);

/// Single-bean injection slot
pub struct Autowired<T: ?Sized> {
    cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Autowired<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// A slot filled up front; the container leaves it untouched
    pub fn with(value: Arc<T>) -> Self {
        Self {
            cell: OnceCell::with_value(value),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_wired(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns `false` if the slot already held a value
    pub(crate) fn fill(&self, value: Arc<T>) -> bool {
        self.cell.set(value).is_ok()
    }
}

impl<T: ?Sized> Default for Autowired<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Autowired<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Autowired")
            .field("type", &std::any::type_name::<T>())
            .field("wired", &self.is_wired())
            .finish()
    }
}

/// Collection injection slot
pub struct Collected<T: ?Sized> {
    cell: OnceCell<Vec<Arc<T>>>,
}

impl<T: ?Sized> Collected<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Collected beans; empty until wired
    pub fn as_slice(&self) -> &[Arc<T>] {
        self.cell.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn is_wired(&self) -> bool {
        self.cell.get().is_some()
    }

    pub(crate) fn fill(&self, values: Vec<Arc<T>>) -> bool {
        self.cell.set(values).is_ok()
    }
}

impl<T: ?Sized> Default for Collected<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Collected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collected")
            .field("type", &std::any::type_name::<T>())
            .field("len", &self.len())
            .finish()
    }
}

/// Value-binding slot filled from the property binder
pub struct Property<T> {
    cell: OnceCell<T>,
}

impl<T> Property<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_bound(&self) -> bool {
        self.cell.get().is_some()
    }

    pub(crate) fn fill(&self, value: T) -> bool {
        self.cell.set(value).is_ok()
    }
}

impl<T: Clone> Property<T> {
    /// Bound value, or `default` when unbound
    pub fn get_or(&self, default: T) -> T {
        self.cell.get().cloned().unwrap_or(default)
    }
}

impl<T: FromStr> Property<T> {
    pub(crate) fn parse(text: &str) -> Result<T, String>
    where
        T::Err: fmt::Display,
    {
        text.trim().parse::<T>().map_err(|e| e.to_string())
    }
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property").field(&self.cell.get()).finish()
    }
}

/// Name and visibility of an injected field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'f> {
    pub name: &'f str,
    pub private: bool,
}

impl<'f> Field<'f> {
    pub fn public(name: &'f str) -> Self {
        Self {
            name,
            private: false,
        }
    }

    /// A private field; injecting it requires `allow_private_access`
    pub fn private(name: &'f str) -> Self {
        Self {
            name,
            private: true,
        }
    }
}

impl<'f> From<&'f str> for Field<'f> {
    fn from(name: &'f str) -> Self {
        Field::public(name)
    }
}

/// Return value of a constructor or method bean.
///
/// Mirrors the one-or-two value convention: a bare handle, an optional handle
/// where `None` is a nil bean, and the fallible forms of both.
pub trait FactoryOutput {
    type Bean: ?Sized + Component;

    fn into_bean(self) -> Result<Option<Arc<Self::Bean>>, BoxError>;
}

impl<T: ?Sized + Component> FactoryOutput for Arc<T> {
    type Bean = T;

    fn into_bean(self) -> Result<Option<Arc<T>>, BoxError> {
        Ok(Some(self))
    }
}

impl<T: ?Sized + Component> FactoryOutput for Option<Arc<T>> {
    type Bean = T;

    fn into_bean(self) -> Result<Option<Arc<T>>, BoxError> {
        Ok(self)
    }
}

impl<T, E> FactoryOutput for Result<Arc<T>, E>
where
    T: ?Sized + Component,
    E: Into<BoxError>,
{
    type Bean = T;

    fn into_bean(self) -> Result<Option<Arc<T>>, BoxError> {
        self.map(Some).map_err(Into::into)
    }
}

impl<T, E> FactoryOutput for Result<Option<Arc<T>>, E>
where
    T: ?Sized + Component,
    E: Into<BoxError>,
{
    type Bean = T;

    fn into_bean(self) -> Result<Option<Arc<T>>, BoxError> {
        self.map_err(Into::into)
    }
}
