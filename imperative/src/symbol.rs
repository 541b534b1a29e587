use std::{cmp::Ordering, collections::HashMap, fmt::Display, rc::Rc};

use itertools::Itertools;

use crate::surface::Stm;

// The built-in types. Each one is registered as a type symbol in the global scope,
// and two types are the same exactly when they have the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Boolean,
    String,
}

impl Ty {
    pub const BUILTINS: [Ty; 3] = [Ty::Int, Ty::Boolean, Ty::String];

    pub fn name(&self) -> &'static str {
        match self {
            Ty::Int => "INT",
            Ty::Boolean => "BOOLEAN",
            Ty::String => "STRING",
        }
    }
}

// runtime values, one for each type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn ty(&self) -> Ty {
        match self {
            Value::Int(_) => Ty::Int,
            Value::Bool(_) => Ty::Boolean,
            Value::Str(_) => Ty::String,
        }
    }

    // native ordering between two values of the same type
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(i1), Value::Int(i2)) => Some(i1.cmp(i2)),
            (Value::Bool(b1), Value::Bool(b2)) => Some(b1.cmp(b2)),
            (Value::Str(s1), Value::Str(s2)) => Some(s1.cmp(s2)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarSymbol {
    pub name: String,
    pub ty: Ty,
    pub value: Option<Value>,
}

impl VarSymbol {
    pub fn new(name: &str, ty: Ty) -> VarSymbol {
        VarSymbol {
            name: name.to_string(),
            ty,
            value: None,
        }
    }

    // the same variable, now holding a value
    pub fn with_value(&self, value: Value) -> VarSymbol {
        VarSymbol {
            value: Some(value),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureSymbol {
    pub name: String,
    pub params: Vec<VarSymbol>,
    pub body: Rc<Vec<Stm>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Type(Ty),
    Var(VarSymbol),
    Procedure(ProcedureSymbol),
}

// Index of a table in a `Scopes` arena. A table refers to its enclosing table
// by index, so it never owns its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone)]
pub struct ScopedSymbolTable {
    pub scope_name: String,
    pub scope_level: usize,
    pub enclosing_scope: Option<ScopeId>,
    symbols: HashMap<String, Symbol>,
}

impl ScopedSymbolTable {
    pub fn new(
        scope_name: String,
        scope_level: usize,
        enclosing_scope: Option<ScopeId>,
    ) -> ScopedSymbolTable {
        ScopedSymbolTable {
            scope_name,
            scope_level,
            enclosing_scope,
            symbols: HashMap::new(),
        }
    }

    // Adds a symbol to this scope only. Checking for duplicates is left to the caller.
    pub fn insert(&mut self, name: &str, symbol: Symbol) {
        self.symbols.insert(name.to_string(), symbol);
    }

    // shallow lookup
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }
}

// An arena of scoped symbol tables. Table 0 is always the global scope.
#[derive(Debug, Clone)]
pub struct Scopes {
    tables: Vec<ScopedSymbolTable>,
}

impl Scopes {
    // a fresh arena holding only the global scope, seeded with the built-in types
    pub fn global() -> Scopes {
        let mut global = ScopedSymbolTable::new("global".to_string(), 0, None);
        for ty in Ty::BUILTINS {
            global.insert(ty.name(), Symbol::Type(ty));
        }

        Scopes {
            tables: vec![global],
        }
    }

    pub fn table(&self, scope: ScopeId) -> &ScopedSymbolTable {
        &self.tables[scope.0]
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    // create a new scope nested inside `parent`
    pub fn enter(&mut self, parent: ScopeId, header: &str) -> ScopeId {
        let enclosing = self.table(parent);
        let table = ScopedSymbolTable::new(
            format!("{}<-{}", enclosing.scope_name, header),
            enclosing.scope_level + 1,
            Some(parent),
        );

        self.tables.push(table);
        ScopeId(self.tables.len() - 1)
    }

    // Discard `scope`, along with every scope created after it. Scopes are
    // created and discarded in a nested fashion at runtime, so this only ever
    // removes scopes that are no longer reachable.
    pub fn exit(&mut self, scope: ScopeId) {
        if scope != ScopeId::GLOBAL {
            self.tables.truncate(scope.0);
        }
    }

    pub fn insert(&mut self, scope: ScopeId, name: &str, symbol: Symbol) {
        self.tables[scope.0].insert(name, symbol);
    }

    // The scope that binds `name`, searching outwards from `scope`.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);

        while let Some(id) = current {
            let table = self.table(id);
            if table.contains(name) {
                return Some(id);
            }
            current = table.enclosing_scope;
        }

        None
    }

    // the scope `distance` levels out from `scope`, stopping at the global scope
    pub fn ancestor(&self, scope: ScopeId, distance: usize) -> ScopeId {
        let mut current = scope;

        for _ in 0..distance {
            match self.table(current).enclosing_scope {
                Some(parent) => current = parent,
                None => break,
            }
        }

        current
    }

    pub fn lookup(&self, scope: ScopeId, name: &str, deep: bool) -> Option<&Symbol> {
        if deep {
            self.resolve(scope, name)
                .and_then(|id| self.table(id).get(name))
        } else {
            self.table(scope).get(name)
        }
    }

    // Rebind `name` in whichever scope owns it, or in `scope` itself if none does.
    pub fn update(&mut self, scope: ScopeId, name: &str, symbol: Symbol) {
        let owner = self.resolve(scope, name).unwrap_or(scope);
        self.insert(owner, name, symbol);
    }

    pub fn into_tables(self) -> Vec<ScopedSymbolTable> {
        self.tables
    }
}

impl Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name().fmt(f)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => i.fmt(f),
            Value::Bool(b) => b.fmt(f),
            Value::Str(s) => s.fmt(f),
        }
    }
}

impl Display for VarSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(Value::Str(s)) => write!(f, "<{} : {} = {:?}>", self.name, self.ty, s),
            Some(value) => write!(f, "<{} : {} = {}>", self.name, self.ty, value),
            None => write!(f, "<{} : {}>", self.name, self.ty),
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Type(ty) => write!(f, "<type {}>", ty),
            Symbol::Var(var) => var.fmt(f),
            Symbol::Procedure(procedure) => write!(
                f,
                "<proc {}({})>",
                procedure.name,
                procedure.params
                    .iter()
                    .map(|param| format!("{} : {}", param.name, param.ty))
                    .join(", ")
            ),
        }
    }
}

impl Display for ScopedSymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SCOPE (SCOPED SYMBOL TABLE)")?;
        writeln!(f, "Scope name: {}", self.scope_name)?;
        writeln!(f, "Scope level: {}", self.scope_level)?;
        match &self.enclosing_scope {
            Some(ScopeId(index)) => writeln!(f, "Enclosing scope: #{}", index)?,
            None => writeln!(f, "Enclosing scope: none")?,
        }
        writeln!(f, "Contents:")?;
        for (name, symbol) in self.symbols.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
            writeln!(f, "{:>8}: {}", name, symbol)?;
        }

        Ok(())
    }
}
