//! # Component Registry
//!
//! Maps names to constructors so a run can select its scheme and transport
//! at runtime without depending on concrete types. There is one independent
//! registry per [`Category`]: a writer named `udp` and a scheme named `udp`
//! never collide.
//!
//! The process-wide registries returned by [`writers`], [`readers`] and
//! [`schemes`] are created on first use and live for the rest of the
//! process. [`register_builtins`] is the explicit startup step that fills
//! them; it must run before the first `create` call.
//!
//! Registering a name twice within one category fails with
//! [`RegistryError::DuplicateType`] and keeps the first constructor.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::RegistryError;
use crate::scheme::{Scheme, SimpleScheme, StreamingScheme};
use crate::transport::{Reader, TcpReader, TcpWriter, UdpReader, UdpWriter, Writer};

/// Independent namespaces of registered components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Writer,
    Reader,
    Scheme,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Writer => write!(f, "writer"),
            Category::Reader => write!(f, "reader"),
            Category::Scheme => write!(f, "scheme"),
        }
    }
}

/// Zero-argument constructor producing a fresh, uninitialized instance.
pub type Constructor<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

/// Name → constructor mapping for one category.
pub struct Registry<T: ?Sized> {
    category: Category,
    entries: RwLock<HashMap<String, Constructor<T>>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn register<F>(&self, name: &str, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        let mut entries = self.entries.write();
        if entries.contains_key(name) {
            return Err(RegistryError::DuplicateType {
                category: self.category,
                name: name.to_string(),
            });
        }
        entries.insert(name.to_string(), Box::new(constructor));
        debug!("Registered {} type '{}'", self.category, name);
        Ok(())
    }

    pub fn create(&self, name: &str) -> Result<Box<T>, RegistryError> {
        let entries = self.entries.read();
        let constructor = entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownType {
                category: self.category,
                name: name.to_string(),
            })?;
        Ok(constructor())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("category", &self.category)
            .field("names", &self.names())
            .finish()
    }
}

/// Process-wide writer registry.
pub fn writers() -> &'static Registry<dyn Writer> {
    static WRITERS: OnceLock<Registry<dyn Writer>> = OnceLock::new();
    WRITERS.get_or_init(|| Registry::new(Category::Writer))
}

/// Process-wide reader registry.
pub fn readers() -> &'static Registry<dyn Reader> {
    static READERS: OnceLock<Registry<dyn Reader>> = OnceLock::new();
    READERS.get_or_init(|| Registry::new(Category::Reader))
}

/// Process-wide scheme registry.
pub fn schemes() -> &'static Registry<dyn Scheme> {
    static SCHEMES: OnceLock<Registry<dyn Scheme>> = OnceLock::new();
    SCHEMES.get_or_init(|| Registry::new(Category::Scheme))
}

/// Register the built-in schemes and transports into the process-wide
/// registries. Calling it again returns the outcome of the first call.
pub fn register_builtins() -> Result<(), RegistryError> {
    static BUILTINS: OnceLock<Result<(), RegistryError>> = OnceLock::new();
    BUILTINS
        .get_or_init(|| register_builtins_into(writers(), readers(), schemes()))
        .clone()
}

/// Register the built-in schemes and transports into the given registries.
pub fn register_builtins_into(
    writers: &Registry<dyn Writer>,
    readers: &Registry<dyn Reader>,
    schemes: &Registry<dyn Scheme>,
) -> Result<(), RegistryError> {
    writers.register("udp", || Box::new(UdpWriter::new()))?;
    readers.register("udp", || Box::new(UdpReader::new()))?;

    writers.register("tcp", || Box::new(TcpWriter::new()))?;
    readers.register("tcp", || Box::new(TcpReader::new()))?;

    schemes.register("simple", || Box::new(SimpleScheme::new()))?;
    schemes.register("streaming", || Box::new(StreamingScheme::new()))?;

    Ok(())
}
