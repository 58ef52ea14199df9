//! Property storage and value binding

use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, File, Value, ValueKind};
use tracing::debug;

use crate::error::{ContextError, ContextResult};

/// One value-binding request for a field
#[derive(Debug, Clone, Copy)]
pub struct BindRequest<'r> {
    /// Type name of the field being bound
    pub target_type: &'r str,
    /// `Host.field`
    pub field_path: &'r str,
    /// `${key}`, `${key:=default}` or a literal
    pub tag: &'r str,
    pub allow_private: bool,
    /// Used when the tag names a missing key without its own default
    pub default: Option<&'r str>,
}

/// Resolves value-binding tags to text
pub trait PropertyBinder: Send + Sync {
    fn bind(&self, request: &BindRequest<'_>) -> ContextResult<String>;
}

/// Flat `key -> value` property map.
///
/// Nested tables loaded from files are flattened to dotted keys, arrays to
/// `key[index]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge a TOML, YAML or JSON file; returns the number of keys read
    pub fn load_file(&mut self, path: &Path) -> ContextResult<usize> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?;
        let root: config::Map<String, Value> = config.try_deserialize()?;

        let mut flat = BTreeMap::new();
        for (key, value) in root {
            flatten(key, value, &mut flat)?;
        }

        let count = flat.len();
        self.values.extend(flat);
        debug!(path = %path.display(), count, "loaded properties");
        Ok(count)
    }

    /// Resolve a tag: `${key}`, `${key:=default}` or a literal
    pub fn resolve(&self, tag: &str, default: Option<&str>) -> Result<String, String> {
        let tag = tag.trim();
        let expression = match tag.strip_prefix("${").and_then(|t| t.strip_suffix('}')) {
            Some(expression) => expression,
            None => return Ok(tag.to_string()),
        };

        let (key, inline_default) = match expression.split_once(":=") {
            Some((key, value)) => (key.trim(), Some(value)),
            None => (expression.trim(), None),
        };

        if key.is_empty() {
            return Err(format!("empty property key in \"{}\"", tag));
        }

        match self.get(key).or(inline_default).or(default) {
            Some(value) => Ok(value.to_string()),
            None => Err(format!("property \"{}\" not found", key)),
        }
    }
}

impl PropertyBinder for Properties {
    fn bind(&self, request: &BindRequest<'_>) -> ContextResult<String> {
        self.resolve(request.tag, request.default)
            .map_err(|message| ContextError::Bind {
                field: request.field_path.to_string(),
                message,
            })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        for (key, value) in iter {
            properties.set(key, value);
        }
        properties
    }
}

fn flatten(
    key: String,
    value: Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), config::ConfigError> {
    match &value.kind {
        ValueKind::Table(_) => {
            for (child, child_value) in value.into_table()? {
                flatten(format!("{}.{}", key, child), child_value, out)?;
            }
        }
        ValueKind::Array(_) => {
            for (index, item) in value.into_array()?.into_iter().enumerate() {
                flatten(format!("{}[{}]", key, index), item, out)?;
            }
        }
        ValueKind::Nil => {}
        _ => {
            out.insert(key, value.into_string()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn request<'r>(tag: &'r str) -> BindRequest<'r> {
        BindRequest {
            target_type: "u32",
            field_path: "Server.port",
            tag,
            allow_private: false,
            default: None,
        }
    }

    #[test]
    fn test_resolve_tags() {
        let properties: Properties = [("server.port", "8080")].into_iter().collect();

        assert_eq!(properties.resolve("${server.port}", None), Ok("8080".to_string()));
        assert_eq!(properties.resolve("${server.host:=localhost}", None), Ok("localhost".to_string()));
        assert_eq!(properties.resolve("${server.port:=1}", None), Ok("8080".to_string()));
        assert_eq!(properties.resolve("literal", None), Ok("literal".to_string()));
        assert_eq!(properties.resolve("${missing}", Some("x")), Ok("x".to_string()));
        assert!(properties.resolve("${missing}", None).is_err());
        assert!(properties.resolve("${}", None).is_err());
    }

    #[test]
    fn test_bind_reports_field() {
        let properties = Properties::new();
        let error = properties.bind(&request("${server.port}")).unwrap_err();
        match error {
            ContextError::Bind { field, message } => {
                assert_eq!(field, "Server.port");
                assert!(message.contains("server.port"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_file_flattens_tables() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "name = \"demo\"\n[server]\nport = 9090\nsecure = true\nhosts = [\"a\", \"b\"]"
        )
        .unwrap();

        let mut properties = Properties::new();
        let count = properties.load_file(file.path()).unwrap();

        assert_eq!(count, 5);
        assert_eq!(properties.get("name"), Some("demo"));
        assert_eq!(properties.get("server.port"), Some("9090"));
        assert_eq!(properties.get("server.secure"), Some("true"));
        assert_eq!(properties.get("server.hosts[1]"), Some("b"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let mut properties = Properties::new();
        let result = properties.load_file(Path::new("/nonexistent/beanwire.toml"));
        assert!(matches!(result, Err(ContextError::Config(_))));
    }
}
