//! Link-time bean registration using the inventory crate
//!
//! A crate declares its beans next to their types with `inventory::submit!`;
//! every linked submission is discovered at runtime and applied to a context
//! before the autowire pass.
//!
//! ```rust,ignore
//! use beanwire_core::{BeanRegistration, Context};
//!
//! inventory::submit! {
//!     BeanRegistration::new("storage", |ctx| {
//!         ctx.register_bean(StorageManager::default())?;
//!         Ok(())
//!     })
//! }
//!
//! let ctx = Context::new();
//! beanwire_core::register_discovered_beans(&ctx)?;
//! ctx.auto_wire_beans()?;
//! ```

use tracing::{debug, info};

use crate::context::Context;
use crate::error::ContextResult;

/// Default priority of a [`BeanRegistration`]
pub const DEFAULT_PRIORITY: u32 = 100;

/// A group of bean registrations collected through inventory
pub struct BeanRegistration {
    /// Name of the bean group, used in diagnostics
    pub name: &'static str,

    /// Registers the group's beans with the context
    pub register_fn: fn(&Context) -> ContextResult<()>,

    /// Lower values run first
    pub priority: u32,
}

impl BeanRegistration {
    pub const fn new(name: &'static str, register_fn: fn(&Context) -> ContextResult<()>) -> Self {
        Self {
            name,
            register_fn,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub const fn with_priority(
        name: &'static str,
        register_fn: fn(&Context) -> ContextResult<()>,
        priority: u32,
    ) -> Self {
        Self {
            name,
            register_fn,
            priority,
        }
    }
}

inventory::collect!(BeanRegistration);

/// Apply every discovered registration to `ctx` in priority order.
///
/// Registrations with equal priority run in name order so the result does not
/// depend on link order. Returns the number of groups applied.
pub fn register_discovered_beans(ctx: &Context) -> ContextResult<usize> {
    let mut registrations: Vec<&BeanRegistration> =
        inventory::iter::<BeanRegistration>().collect();
    registrations.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(b.name)));

    info!(count = registrations.len(), "discovered bean registrations");

    for registration in &registrations {
        debug!(
            group = registration.name,
            priority = registration.priority,
            "applying bean registration"
        );
        (registration.register_fn)(ctx)?;
    }

    Ok(registrations.len())
}

/// Names of all discovered registrations
pub fn list_discovered_registrations() -> Vec<&'static str> {
    inventory::iter::<BeanRegistration>()
        .map(|r| r.name)
        .collect()
}
