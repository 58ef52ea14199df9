//! Runtime type descriptors, type-erased bean values and selectors

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime descriptor of a bean type.
///
/// Works for concrete types and for trait objects (`dyn Trait`), the latter
/// standing in for abstract interface types.
#[derive(Clone, Copy)]
pub struct BeanType {
    id: TypeId,
    name: &'static str,
}

impl BeanType {
    /// Descriptor of `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type path, e.g. `my_app::repo::SqlRepo`
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with every module path stripped, e.g. `Vec<Arc<SqlRepo>>`
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }

    /// Whether `type_name` names this type, by full or short name
    pub fn is_named(&self, type_name: &str) -> bool {
        type_name == self.name || type_name == self.short_name()
    }
}

impl PartialEq for BeanType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BeanType {}

impl Hash for BeanType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Strip module paths from every path segment of a type name.
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut token = String::new();
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            token.clear();
        } else if c.is_alphanumeric() || c == '_' {
            token.push(c);
        } else {
            out.push_str(&token);
            token.clear();
            out.push(c);
        }
    }
    out.push_str(&token);
    out
}

/// A shared, type-erased bean instance.
///
/// Holds an `Arc<T>` for any `T: ?Sized`, so trait-object beans
/// (`Arc<dyn Service>`) and concrete beans share one representation.
#[derive(Clone)]
pub struct BeanValue {
    inner: Arc<dyn Any + Send + Sync>,
    address: usize,
    bean_type: BeanType,
}

impl BeanValue {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        let address = Arc::as_ptr(&value) as *const () as usize;
        Self {
            inner: Arc::new(value) as Arc<dyn Any + Send + Sync>,
            address,
            bean_type: BeanType::of::<T>(),
        }
    }

    /// The held `Arc<T>`, if this value was created from one
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.inner.downcast_ref::<Arc<T>>().cloned()
    }

    pub fn bean_type(&self) -> BeanType {
        self.bean_type
    }

    /// Address of the pointee; equal for every handle to the same instance
    pub fn address(&self) -> usize {
        self.address
    }

    pub fn same_instance(&self, other: &BeanValue) -> bool {
        self.address == other.address
    }
}

impl fmt::Debug for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanValue")
            .field("type", &self.bean_type)
            .field("address", &format_args!("{:#x}", self.address))
            .finish()
    }
}

/// Bean name marking collection injection
pub const COLLECTION_MARKER: &str = "[]";

/// Suffix marking a nullable selector
pub const NULLABLE_MARKER: char = '?';

/// A parsed bean selector: `[typeName:]beanName[?]`.
///
/// The type/name separator is the last single `:` that is not part of a
/// `::` path separator, so full Rust paths can be used as type names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BeanSelector {
    pub type_name: String,
    pub bean_name: String,
    pub nullable: bool,
}

impl BeanSelector {
    pub fn parse(selector: &str) -> Self {
        let (type_name, bean_name) = match find_separator(selector) {
            Some(index) => (&selector[..index], &selector[index + 1..]),
            None => ("", selector),
        };

        let (bean_name, nullable) = match bean_name.strip_suffix(NULLABLE_MARKER) {
            Some(stripped) => (stripped, true),
            None => (bean_name, false),
        };

        Self {
            type_name: type_name.trim().to_string(),
            bean_name: bean_name.trim().to_string(),
            nullable,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.bean_name == COLLECTION_MARKER
    }
}

impl fmt::Display for BeanSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.type_name.is_empty() {
            write!(f, "{}:", self.type_name)?;
        }
        f.write_str(&self.bean_name)?;
        if self.nullable {
            write!(f, "{}", NULLABLE_MARKER)?;
        }
        Ok(())
    }
}

fn find_separator(selector: &str) -> Option<usize> {
    let bytes = selector.as_bytes();
    (0..bytes.len()).rev().find(|&i| {
        bytes[i] == b':'
            && (i == 0 || bytes[i - 1] != b':')
            && (i + 1 == bytes.len() || bytes[i + 1] != b':')
    })
}

/// Append the nullable marker unless already present
pub(crate) fn nullable_selector(selector: &str) -> String {
    if selector.ends_with(NULLABLE_MARKER) {
        selector.to_string()
    } else {
        format!("{}{}", selector, NULLABLE_MARKER)
    }
}
