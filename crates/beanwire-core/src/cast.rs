//! Declared implementations of interface types
//!
//! Rust has no runtime assignability check between a concrete type and a
//! trait object, so every `concrete -> dyn Interface` relation the container
//! may need is declared once and stored here as a cast function.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{BeanType, BeanValue};

/// Type-erased cast from one bean value to another bean type
pub type CastFn = Arc<dyn Fn(&BeanValue) -> Option<BeanValue> + Send + Sync>;

/// Erase a typed caster into a [`CastFn`]
pub(crate) fn erase_cast<C, I, F>(caster: F) -> CastFn
where
    C: ?Sized + Send + Sync + 'static,
    I: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
{
    Arc::new(move |value: &BeanValue| {
        value
            .downcast::<C>()
            .map(|concrete| BeanValue::new(caster(concrete)))
    })
}

/// Table of declared `(from, to)` casts
#[derive(Clone, Default)]
pub struct Implementations {
    casts: HashMap<(TypeId, TypeId), CastFn>,
}

impl Implementations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `C` can be used wherever `I` is requested.
    ///
    /// The caster is normally the identity closure `|bean| bean`, relying on
    /// unsized coercion from `Arc<C>` to `Arc<dyn Trait>`.
    pub fn declare<C, I, F>(&mut self, caster: F)
    where
        C: ?Sized + Send + Sync + 'static,
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
    {
        self.casts
            .insert((TypeId::of::<C>(), TypeId::of::<I>()), erase_cast(caster));
    }

    /// Insert an already erased cast
    pub(crate) fn insert(&mut self, from: BeanType, to: BeanType, cast: CastFn) {
        self.casts.insert((from.id(), to.id()), cast);
    }

    /// Whether a value of type `from` can be injected where `to` is expected
    pub fn assignable(&self, from: BeanType, to: BeanType) -> bool {
        from == to || self.casts.contains_key(&(from.id(), to.id()))
    }

    /// Convert `value` to `target`; `None` when no cast is declared
    pub fn cast(&self, value: &BeanValue, target: BeanType) -> Option<BeanValue> {
        if value.bean_type() == target {
            return Some(value.clone());
        }
        self.casts
            .get(&(value.bean_type().id(), target.id()))
            .and_then(|cast| cast(value))
    }

    /// Cast straight to a typed handle
    pub fn cast_to<T: ?Sized + 'static>(&self, value: &BeanValue) -> Option<Arc<T>> {
        self.cast(value, BeanType::of::<T>())
            .and_then(|cast| cast.downcast::<T>())
    }

    pub fn len(&self) -> usize {
        self.casts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.casts.is_empty()
    }
}

impl fmt::Debug for Implementations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementations")
            .field("casts", &self.casts.len())
            .finish()
    }
}

/// Declare interface implementations on a [`Context`](crate::Context).
///
/// ```ignore
/// implements!(ctx, SqlRepo => dyn Repository, SqlRepo => dyn Health)?;
/// ```
#[macro_export]
macro_rules! implements {
    ($ctx:expr, $($concrete:ty => $interface:ty),+ $(,)?) => {{
        let mut result: $crate::ContextResult<()> = Ok(());
        $(
            if result.is_ok() {
                result = $ctx.declare_implementation::<$concrete, $interface, _>(
                    |bean: ::std::sync::Arc<$concrete>| -> ::std::sync::Arc<$interface> { bean },
                );
            }
        )+
        result
    }};
}
