//! Configuration and property files driving a wired context

use std::io::Write;
use std::sync::Arc;

use beanwire_core::*;
use tempfile::NamedTempFile;

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[derive(Default)]
struct HttpSettings {
    port: Property<u16>,
    first_host: Property<String>,
    tls: Property<bool>,
}

impl Component for HttpSettings {
    fn autowire(&self, injector: &mut Injector<'_>) -> ContextResult<()> {
        injector.value("port", &self.port, "${http.port}")?;
        injector.value("first_host", &self.first_host, "${http.hosts[0]}")?;
        injector.value_or("tls", &self.tls, "${http.tls}", "false")?;
        Ok(())
    }
}

struct Endpoint {
    url: String,
}

impl Component for Endpoint {}

#[test]
fn test_properties_file_feeds_value_binding() {
    let file = toml_file("[http]\nport = 8443\nhosts = [\"api.local\", \"backup.local\"]\n");

    let ctx = Context::new();
    let loaded = ctx.load_properties(file.path()).unwrap();
    assert_eq!(loaded, 3);

    ctx.register_bean(HttpSettings::default()).unwrap();
    ctx.register_bean_fn(|injector| -> ContextResult<Arc<Endpoint>> {
        let settings = injector.bean::<HttpSettings>("")?;
        let scheme = if settings.tls.get_or(false) { "https" } else { "http" };
        let host = settings.first_host.get().cloned().unwrap_or_default();
        Ok(Arc::new(Endpoint {
            url: format!("{}://{}:{}", scheme, host, settings.port.get_or(0)),
        }))
    })
    .unwrap();

    ctx.auto_wire_beans().unwrap();

    let endpoint = ctx.get_bean::<Endpoint>().unwrap().unwrap();
    assert_eq!(endpoint.url, "http://api.local:8443");
}

#[test]
fn test_context_config_file_enables_profile() {
    let file = toml_file("profile = \"staging\"\nsort = true\n");
    let config = ContextConfig::load(Some(file.path())).unwrap();

    let ctx = Context::with_config(config);
    ctx.register(
        BeanBuilder::object(Arc::new(Endpoint {
            url: "https://staging".to_string(),
        }))
        .name("staging")
        .on_profile("staging"),
    )
    .unwrap();
    ctx.register(
        BeanBuilder::object(Arc::new(Endpoint {
            url: "https://prod".to_string(),
        }))
        .name("prod")
        .on_profile("prod"),
    )
    .unwrap();

    ctx.auto_wire_beans().unwrap();

    let endpoint = ctx.get_bean::<Endpoint>().unwrap().unwrap();
    assert_eq!(endpoint.url, "https://staging");
}

#[test]
fn test_malformed_properties_file_is_reported() {
    let file = toml_file("[http\nport = ");
    let ctx = Context::new();

    let error = ctx.load_properties(file.path()).unwrap_err();
    assert!(matches!(error, ContextError::Config(_)));
}

struct Registered;

impl Component for Registered {}

inventory::submit! {
    BeanRegistration::new("configuration_files", |ctx| {
        ctx.register_name_bean("registered", Registered)?;
        Ok(())
    })
}

#[test]
fn test_discovered_registrations_are_applied() {
    assert!(list_discovered_registrations().contains(&"configuration_files"));

    let ctx = Context::new();
    register_discovered_beans(&ctx).unwrap();
    ctx.auto_wire_beans().unwrap();

    assert!(ctx.find_bean("registered").unwrap().is_some());
}
