//! Context settings

use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::ContextResult;

/// Environment prefix read by [`ContextConfig::load`], e.g. `BEANWIRE_PROFILE`
pub const ENV_PREFIX: &str = "BEANWIRE";

/// Settings applied to a [`Context`](crate::Context)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Wire beans in bean id order instead of registration order
    pub sort: bool,
    /// Allow injection into fields declared private
    pub allow_private_access: bool,
    /// Active profile consulted by profile conditions
    pub profile: Option<String>,
}

impl ContextConfig {
    /// Load from an optional file, overridden by `BEANWIRE_*` variables
    pub fn load(path: Option<&Path>) -> ContextResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
