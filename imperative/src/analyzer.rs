// Static analysis: builds the nested scopes of a program and type checks it,
// stopping at the first error.

use std::collections::HashMap;

use log::{debug, trace};

use crate::error::SemanticError;
use crate::surface::{Binder, Exp, ExpData, Param, Program, Stm, StmData};
use crate::symbol::{ProcedureSymbol, ScopeId, ScopedSymbolTable, Scopes, Symbol, Ty, VarSymbol};
use crate::util::Location;

pub struct Analyzer<'a> {
    program: &'a Program,

    // every table created so far, in creation order
    scopes: Scopes,

    // the innermost scope of the statement being checked
    current: ScopeId,

    resolutions: Resolutions,
}

// For every use of a name, how many scopes out from the use its binding was found.
// The interpreter looks names up through these.
pub type Resolutions = HashMap<Location, usize>;

pub struct Analysis {
    pub tables: Vec<ScopedSymbolTable>,
    pub resolutions: Resolutions,
}

// check that a type is the one that was required
fn equate_ty(location: &Location, found: Ty, expected: Ty) -> Result<(), SemanticError> {
    if found == expected {
        Ok(())
    } else {
        Err(SemanticError::TypeMismatch {
            location: location.clone(),
            expected,
            found,
        })
    }
}

impl<'a> Analyzer<'a> {
    pub fn new(program: &'a Program) -> Analyzer<'a> {
        Analyzer {
            program,
            scopes: Scopes::global(),
            current: ScopeId::GLOBAL,
            resolutions: Resolutions::new(),
        }
    }

    // Check the whole program, returning every scoped symbol table that was created
    // along with where each name use was resolved.
    pub fn build(mut self) -> Result<Analysis, SemanticError> {
        let program = self.program;
        self.check_stms(&program.stms)?;

        debug!(
            "analysis finished with {} scopes and {} resolved names",
            self.scopes.len(),
            self.resolutions.len()
        );
        Ok(Analysis {
            tables: self.scopes.into_tables(),
            resolutions: self.resolutions,
        })
    }

    // Run `f` inside a fresh child of the current scope. The current scope is
    // restored whether or not `f` succeeds.
    fn in_scope<T>(
        &mut self,
        header: &str,
        f: impl FnOnce(&mut Self) -> Result<T, SemanticError>,
    ) -> Result<T, SemanticError> {
        let enclosing = self.current;
        self.current = self.scopes.enter(enclosing, header);
        trace!("entering scope {}", self.scopes.table(self.current).scope_name);

        let result = f(self);

        trace!("leaving scope {}", self.scopes.table(self.current).scope_name);
        self.current = enclosing;
        result
    }

    fn check_stms(&mut self, stms: &[Stm]) -> Result<(), SemanticError> {
        for stm in stms {
            self.check_stm(stm)?;
        }

        Ok(())
    }

    fn check_stm(&mut self, stm: &Stm) -> Result<(), SemanticError> {
        match &stm.data {
            StmData::VarDecl { id, ty } => {
                self.check_undeclared(id, false)?;
                let ty = self.elab_ty(ty)?;

                debug!("declaring {} : {} in {}", id.data, ty, self.scope_name());
                self.scopes
                    .insert(self.current, &id.data, Symbol::Var(VarSymbol::new(&id.data, ty)));

                Ok(())
            }
            StmData::Assign { id, exp } => {
                let var_ty = self.lookup_var(&id.location, &id.data)?.ty;
                let exp_ty = self.infer_exp(exp)?;

                equate_ty(&exp.location, exp_ty, var_ty)
            }
            StmData::Input { id } => self.lookup_var(&id.location, &id.data).map(|_| ()),
            StmData::Print { exp } => self.infer_exp(exp).map(|_| ()),
            StmData::If { cond, stms } => {
                equate_ty(&cond.location, self.infer_exp(cond)?, Ty::Boolean)?;

                self.in_scope("if", |analyzer| analyzer.check_stms(stms))
            }
            StmData::While { cond, stms } => {
                equate_ty(&cond.location, self.infer_exp(cond)?, Ty::Boolean)?;

                self.in_scope("while", |analyzer| analyzer.check_stms(stms))
            }
            StmData::Block { stms } => self.in_scope("block", |analyzer| analyzer.check_stms(stms)),
            StmData::ProcedureDecl { name, params, stms } => {
                // a procedure may not reuse any name that is already visible
                self.check_undeclared(name, true)?;

                let mut param_symbols = Vec::with_capacity(params.len());
                for param in params {
                    param_symbols.push(VarSymbol::new(&param.id.data, self.elab_ty(&param.ty)?));
                }

                // registered before the body is checked, so the body may call itself
                debug!("declaring procedure {} in {}", name.data, self.scope_name());
                self.scopes.insert(
                    self.current,
                    &name.data,
                    Symbol::Procedure(ProcedureSymbol {
                        name: name.data.clone(),
                        params: param_symbols.clone(),
                        body: stms.clone(),
                    }),
                );

                self.in_scope(&format!("proc:{}", name.data), |analyzer| {
                    for (param, symbol) in params.iter().zip(param_symbols) {
                        analyzer.check_param(param, symbol)?;
                    }

                    analyzer.check_stms(stms)
                })
            }
            StmData::ProcedureCall { name, args } => {
                let params = match self.resolve_use(&name.location, &name.data) {
                    Some(Symbol::Procedure(procedure)) => procedure.params.clone(),
                    Some(_) => {
                        return Err(SemanticError::NotCallable {
                            location: name.location.clone(),
                            name: name.data.clone(),
                        })
                    }
                    None => {
                        return Err(SemanticError::UndeclaredProcedure {
                            location: name.location.clone(),
                            name: name.data.clone(),
                        })
                    }
                };

                if params.len() != args.len() {
                    return Err(SemanticError::ArityMismatch {
                        location: stm.location.clone(),
                        name: name.data.clone(),
                        expected: params.len(),
                        found: args.len(),
                    });
                }

                for (arg, param) in args.iter().zip(&params) {
                    equate_ty(&arg.location, self.infer_exp(arg)?, param.ty)?;
                }

                Ok(())
            }
        }
    }

    // bind a parameter, whose type was elaborated where the procedure was declared
    fn check_param(&mut self, param: &Param, symbol: VarSymbol) -> Result<(), SemanticError> {
        self.check_undeclared(&param.id, false)?;
        self.scopes
            .insert(self.current, &param.id.data, Symbol::Var(symbol));

        Ok(())
    }

    // Fail if the name is already declared, either in the current scope itself or,
    // when `deep`, in any scope that encloses it.
    fn check_undeclared(&self, binder: &Binder, deep: bool) -> Result<(), SemanticError> {
        match self.scopes.lookup(self.current, &binder.data, deep) {
            Some(_) => Err(SemanticError::DuplicateDeclaration {
                location: binder.location.clone(),
                name: binder.data.clone(),
            }),
            None => Ok(()),
        }
    }

    // Deep lookup of a name use, recording how far out its binding was found.
    fn resolve_use(&mut self, location: &Location, name: &str) -> Option<&Symbol> {
        let owner = self.scopes.resolve(self.current, name)?;
        let distance =
            self.scopes.table(self.current).scope_level - self.scopes.table(owner).scope_level;

        trace!("{} at {}..{} resolved {} scopes out", name, location.start, location.end, distance);
        self.resolutions.insert(location.clone(), distance);
        self.scopes.table(owner).get(name)
    }

    // resolve a type name to one of the type symbols in scope
    fn elab_ty(&mut self, ty: &Binder) -> Result<Ty, SemanticError> {
        match self.resolve_use(&ty.location, &ty.data) {
            Some(Symbol::Type(ty)) => Ok(*ty),
            _ => Err(SemanticError::UnknownType {
                location: ty.location.clone(),
                name: ty.data.clone(),
            }),
        }
    }

    fn lookup_var(&mut self, location: &Location, name: &str) -> Result<&VarSymbol, SemanticError> {
        match self.resolve_use(location, name) {
            Some(Symbol::Var(var)) => Ok(var),
            Some(_) => Err(SemanticError::NotAVariable {
                location: location.clone(),
                name: name.to_string(),
            }),
            None => Err(SemanticError::UndeclaredIdentifier {
                location: location.clone(),
                name: name.to_string(),
            }),
        }
    }

    // the static type of an expression
    fn infer_exp(&mut self, exp: &Exp) -> Result<Ty, SemanticError> {
        match &exp.data {
            ExpData::Name { name } => Ok(self.lookup_var(&exp.location, name)?.ty),
            ExpData::BoolLit { .. } => Ok(Ty::Boolean),
            ExpData::IntLit { .. } => Ok(Ty::Int),
            ExpData::StrLit { .. } => Ok(Ty::String),

            // prefix operators take on the type of their operand
            ExpData::Prefix { exp, .. } => self.infer_exp(exp),

            ExpData::Infix { op, exp1, exp2 } => {
                let ty1 = self.infer_exp(exp1)?;
                let ty2 = self.infer_exp(exp2)?;

                if op.is_arithmetic() {
                    equate_ty(&exp1.location, ty1, Ty::Int)?;
                    equate_ty(&exp2.location, ty2, Ty::Int)?;

                    Ok(Ty::Int)
                } else {
                    // TODO: only allow ordering comparisons between INT or STRING operands
                    equate_ty(&exp2.location, ty2, ty1)?;

                    Ok(Ty::Boolean)
                }
            }
        }
    }

    fn scope_name(&self) -> &str {
        &self.scopes.table(self.current).scope_name
    }
}
