//! Conditional registration
//!
//! Every condition attached to a bean must match during resolution, otherwise
//! the bean is deleted before wiring starts.

use std::fmt;

use crate::context::ContextState;
use crate::error::ContextResult;

/// Eligibility check evaluated once per bean while resolving
pub trait Condition: Send + Sync {
    fn matches(&self, ctx: &mut ConditionContext<'_>) -> ContextResult<bool>;
}

/// View of the context offered to conditions
pub struct ConditionContext<'a> {
    state: &'a mut ContextState,
}

impl<'a> ConditionContext<'a> {
    pub(crate) fn new(state: &'a mut ContextState) -> Self {
        Self { state }
    }

    /// Active profile, if any
    pub fn profile(&self) -> Option<&str> {
        self.state.config.profile.as_deref()
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.state.properties.get(key)
    }

    /// Whether exactly one live bean matches `selector`.
    ///
    /// Resolves candidate beans on demand. Beans currently being resolved
    /// are skipped.
    pub fn has_bean(&mut self, selector: &str) -> ContextResult<bool> {
        Ok(self.state.find_definition(selector)?.is_some())
    }
}

impl fmt::Debug for ConditionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionContext")
            .field("profile", &self.profile())
            .finish()
    }
}

/// Matches when the given profile is active
#[derive(Debug, Clone)]
pub struct OnProfile {
    profile: String,
}

impl OnProfile {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }
}

impl Condition for OnProfile {
    fn matches(&self, ctx: &mut ConditionContext<'_>) -> ContextResult<bool> {
        Ok(ctx.profile() == Some(self.profile.as_str()))
    }
}

/// Matches when a property is set, optionally to a given value
#[derive(Debug, Clone)]
pub struct OnProperty {
    key: String,
    expected: Option<String>,
}

impl OnProperty {
    pub fn present(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            expected: None,
        }
    }

    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            expected: Some(value.into()),
        }
    }
}

impl Condition for OnProperty {
    fn matches(&self, ctx: &mut ConditionContext<'_>) -> ContextResult<bool> {
        Ok(match (ctx.property(&self.key), &self.expected) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        })
    }
}

/// Matches when a bean matching the selector exists
#[derive(Debug, Clone)]
pub struct OnBean {
    selector: String,
}

impl OnBean {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

impl Condition for OnBean {
    fn matches(&self, ctx: &mut ConditionContext<'_>) -> ContextResult<bool> {
        ctx.has_bean(&self.selector)
    }
}

/// Matches when no bean matches the selector
#[derive(Debug, Clone)]
pub struct OnMissingBean {
    selector: String,
}

impl OnMissingBean {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

impl Condition for OnMissingBean {
    fn matches(&self, ctx: &mut ConditionContext<'_>) -> ContextResult<bool> {
        Ok(!ctx.has_bean(&self.selector)?)
    }
}

type ConditionFn = Box<dyn Fn(&mut ConditionContext<'_>) -> ContextResult<bool> + Send + Sync>;

/// Closure condition
pub struct FnCondition {
    f: ConditionFn,
}

impl FnCondition {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut ConditionContext<'_>) -> ContextResult<bool> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

impl Condition for FnCondition {
    fn matches(&self, ctx: &mut ConditionContext<'_>) -> ContextResult<bool> {
        (self.f)(ctx)
    }
}

impl fmt::Debug for FnCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCondition")
    }
}
