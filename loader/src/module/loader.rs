//! Native artefact loading.
//!
//! Loads an artefact into the running process with `libloading` and builds
//! its symbol table by parsing the binary with `object`. Loaded artefacts
//! are never unloaded: entry points handed out by a unit stay valid for the
//! lifetime of the process.

use super::EntryFn;
use crate::artefact::error::ArtefactError;
use crate::artefact::module_name::ModuleName;
use camino::{Utf8Path, Utf8PathBuf};
use libloading::Library;
use log::{debug, trace};
use object::{BinaryFormat, Object, ObjectSymbol, SymbolKind};
use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::mem::ManuallyDrop;

/// Errors raised while loading an artefact.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The artefact filename does not yield a module name.
    #[error("cannot derive module name from {path}: {source}")]
    ModuleName {
        /// Artefact path.
        path: Utf8PathBuf,
        /// Validation failure.
        source: ArtefactError,
    },

    /// The artefact could not be read.
    #[error("failed to read artefact {path}: {source}")]
    Read {
        /// Artefact path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The artefact is not a recognised binary.
    #[error("artefact {path} is not a loadable binary: {reason}")]
    Malformed {
        /// Artefact path.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The platform loader rejected the artefact.
    #[error("failed to load artefact {path}: {reason}")]
    Rejected {
        /// Artefact path.
        path: Utf8PathBuf,
        /// Platform loader message.
        reason: String,
    },
}

/// A loaded artefact as seen by entry resolution.
pub trait LoadedUnit {
    /// Name of the module the artefact provides.
    fn module_name(&self) -> &str;

    /// Exported callable names in symbol table order.
    fn exports(&self) -> &[String];

    /// Look up `name` in the symbol table.
    ///
    /// Returns `None` for names that are not exported callables.
    fn lookup(&self, name: &str) -> Option<EntryFn>;

    /// Look up `name` as a raw native symbol on an independent handle.
    ///
    /// Returns `None` for names the artefact does not define itself.
    fn foreign_lookup(&self, name: &str) -> Option<EntryFn>;

    /// Exported names not starting with `_`, in table order.
    fn public_callables(&self) -> Vec<String> {
        self.exports()
            .iter()
            .filter(|name| !name.starts_with('_'))
            .cloned()
            .collect()
    }
}

/// Loads artefacts into the running process.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleLoader {
    /// Load the artefact at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] when the file is unreadable, malformed, or
    /// rejected by the platform loader.
    fn load(&self, path: &Utf8Path) -> Result<Box<dyn LoadedUnit>, LoadError>;
}

/// Production loader backed by the platform dynamic linker.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeModuleLoader;

impl ModuleLoader for NativeModuleLoader {
    fn load(&self, path: &Utf8Path) -> Result<Box<dyn LoadedUnit>, LoadError> {
        Ok(Box::new(LoadedArtefact::open(path)?))
    }
}

/// An artefact loaded with `libloading`.
pub struct LoadedArtefact {
    module_name: ModuleName,
    path: Utf8PathBuf,
    symbols: SymbolTable,
    library: ManuallyDrop<Library>,
    foreign: OnceCell<Option<ManuallyDrop<Library>>>,
}

impl LoadedArtefact {
    /// Load the artefact at `path` and enumerate its exported functions.
    ///
    /// # Errors
    ///
    /// See [`ModuleLoader::load`].
    pub fn open(path: &Utf8Path) -> Result<Self, LoadError> {
        let module_name = ModuleName::from_filename(path.file_name().unwrap_or_default())
            .map_err(|source| LoadError::ModuleName {
                path: path.to_owned(),
                source,
            })?;

        let data = std::fs::read(path).map_err(|source| LoadError::Read {
            path: path.to_owned(),
            source,
        })?;
        let symbols = SymbolTable::read(&data).map_err(|e| LoadError::Malformed {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        debug!(
            "{path} exports {} callables and defines {} symbols",
            symbols.functions.len(),
            symbols.defined.len()
        );
        trace!("exports of {path}: {:?}", symbols.functions);

        // SAFETY: loading runs the artefact's initialisers. The artefact is
        // trusted by configuration; nothing else can be checked here.
        let library = unsafe { Library::new(path.as_std_path()) }.map_err(|e| {
            LoadError::Rejected {
                path: path.to_owned(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            module_name,
            path: path.to_owned(),
            symbols,
            library: ManuallyDrop::new(library),
            foreign: OnceCell::new(),
        })
    }

    /// Return the artefact path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn foreign_library(&self) -> Option<&Library> {
        self.foreign
            .get_or_init(|| {
                // SAFETY: same artefact as `self.library`, already initialised.
                match unsafe { Library::new(self.path.as_std_path()) } {
                    Ok(library) => Some(ManuallyDrop::new(library)),
                    Err(e) => {
                        debug!("foreign handle for {} unavailable: {e}", self.path);
                        None
                    }
                }
            })
            .as_deref()
    }
}

impl LoadedUnit for LoadedArtefact {
    fn module_name(&self) -> &str {
        self.module_name.as_str()
    }

    fn exports(&self) -> &[String] {
        &self.symbols.functions
    }

    fn lookup(&self, name: &str) -> Option<EntryFn> {
        if !self.symbols.functions.iter().any(|export| export == name) {
            return None;
        }
        symbol(&self.library, name)
    }

    fn foreign_lookup(&self, name: &str) -> Option<EntryFn> {
        // The handle also reaches the artefact's dependencies.
        if !self.symbols.defines(name) {
            trace!("{name} is not defined by {}", self.path);
            return None;
        }
        symbol(self.foreign_library()?, name)
    }
}

fn symbol(library: &Library, name: &str) -> Option<EntryFn> {
    // SAFETY: exported entry points share the `EntryFn` signature. The
    // library is never unloaded, so the pointer outlives the `Symbol`.
    match unsafe { library.get::<EntryFn>(name.as_bytes()) } {
        Ok(symbol) => Some(*symbol),
        Err(e) => {
            trace!("symbol {name} not found: {e}");
            None
        }
    }
}

/// Symbols an artefact defines, read from its binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    /// Exported function names in symbol table order.
    pub functions: Vec<String>,
    /// Every symbol the artefact defines itself, of any kind.
    pub defined: BTreeSet<String>,
}

impl SymbolTable {
    /// Parse the symbol table of the binary in `data`.
    ///
    /// Functions are the dynamic symbols of text kind that are global
    /// definitions when present, otherwise the export table. Mach-O leading
    /// underscores are stripped and duplicates dropped. Imports are never
    /// recorded as defined.
    ///
    /// # Errors
    ///
    /// Returns the parser error when `data` is not a supported binary format.
    pub fn read(data: &[u8]) -> Result<Self, object::Error> {
        let file = object::File::parse(data)?;
        let mach_o = file.format() == BinaryFormat::MachO;
        let native = |name: &str| match (mach_o, name.strip_prefix('_')) {
            (true, Some(stripped)) => stripped.to_owned(),
            _ => name.to_owned(),
        };

        let mut raw_functions = Vec::new();
        let mut defined = BTreeSet::new();
        for sym in file.dynamic_symbols().filter(|sym| sym.is_definition()) {
            let Ok(name) = sym.name() else { continue };
            if sym.kind() == SymbolKind::Text && sym.is_global() {
                raw_functions.push(name.to_owned());
            }
            defined.insert(native(name));
        }

        let exports: Vec<String> = file
            .exports()?
            .iter()
            .filter_map(|export| std::str::from_utf8(export.name()).ok().map(str::to_owned))
            .collect();
        defined.extend(exports.iter().map(|name| native(name)));
        if raw_functions.is_empty() {
            raw_functions = exports;
        }

        let mut functions = Vec::with_capacity(raw_functions.len());
        for name in raw_functions.iter().map(|name| native(name)) {
            if !name.is_empty() && !functions.contains(&name) {
                functions.push(name);
            }
        }
        defined.remove("");
        Ok(Self { functions, defined })
    }

    /// Whether the artefact itself defines `name`.
    #[must_use]
    pub fn defines(&self, name: &str) -> bool {
        self.defined.contains(name)
    }
}
