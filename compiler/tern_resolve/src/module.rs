//! Module-level context consulted during resolution.
//!
//! The host (package loader, out of scope here) fills one `ModuleEnv`
//! per compilation: declared function signatures, constants, nominal
//! type definitions, and the names of importable modules for qualified
//! lookup.

use rustc_hash::{FxHashMap, FxHashSet};
use tern_ir::{Name, Value};
use tern_types::{NominalTable, TypeId};

/// What the resolver needs to know about a callable declaration.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FunctionInfo {
    /// The declared function or method type.
    pub ty: TypeId,
    /// Whether any `requires` clauses exist (drives precondition splicing).
    pub has_precondition: bool,
    /// Whether any `ensures` clauses exist.
    pub has_postcondition: bool,
}

/// Lookup context for one module compilation.
#[derive(Default)]
pub struct ModuleEnv {
    /// Functions and methods visible by bare name, including imported
    /// ones registered under their qualified name.
    functions: FxHashMap<Name, FunctionInfo>,
    /// Module constants.
    constants: FxHashMap<Name, TypeId>,
    /// Evaluated constant values, where the host knows them; the
    /// resolver inlines these as literals.
    constant_values: FxHashMap<Name, Value>,
    /// Named types.
    pub nominals: NominalTable,
    /// Known module names; `(module, item)` pairs resolve through
    /// `qualified`.
    modules: FxHashSet<Name>,
    /// Qualified item lookup: `(module, item) -> functions key`.
    qualified: FxHashMap<(Name, Name), Name>,
}

impl ModuleEnv {
    pub fn new() -> Self {
        Self::default()
    }

    // === Registration (host side) ===

    pub fn declare_function(&mut self, name: Name, info: FunctionInfo) {
        self.functions.insert(name, info);
    }

    pub fn declare_constant(&mut self, name: Name, ty: TypeId) {
        self.constants.insert(name, ty);
    }

    /// Register an evaluated constant value for inlining.
    pub fn declare_constant_value(&mut self, name: Name, value: Value) {
        self.constant_values.insert(name, value);
    }

    pub fn declare_module(&mut self, module: Name) {
        self.modules.insert(module);
    }

    /// Make `module::item` callable; `key` must already be registered as
    /// a function.
    pub fn declare_qualified(&mut self, module: Name, item: Name, key: Name) {
        self.modules.insert(module);
        self.qualified.insert((module, item), key);
    }

    // === Lookup (resolver side) ===

    pub fn function(&self, name: Name) -> Option<FunctionInfo> {
        self.functions.get(&name).copied()
    }

    pub fn constant(&self, name: Name) -> Option<TypeId> {
        self.constants.get(&name).copied()
    }

    pub fn constant_value(&self, name: Name) -> Option<&Value> {
        self.constant_values.get(&name)
    }

    pub fn is_module(&self, name: Name) -> bool {
        self.modules.contains(&name)
    }

    /// Resolve `module::item` to the key it is registered under.
    pub fn qualified_function(&self, module: Name, item: Name) -> Option<(Name, FunctionInfo)> {
        let key = *self.qualified.get(&(module, item))?;
        self.functions.get(&key).map(|&info| (key, info))
    }
}
