// A tree-walking interpreter. Programs are analysed before they are run, and the
// runtime scopes follow the same nesting as the static ones: if, while and block
// bodies and procedure calls each get a scope that is discarded when they finish.

use std::io::{BufRead, Write};

use itertools::Itertools;
use log::{debug, trace};

use crate::analyzer::{Analyzer, Resolutions};
use crate::error::{Error, RuntimeError, SemanticError};
use crate::surface::{Binder, Exp, ExpData, InfixOp, PrefixOp, Program, Stm, StmData};
use crate::symbol::{ProcedureSymbol, ScopeId, ScopedSymbolTable, Scopes, Symbol, Ty, Value, VarSymbol};
use crate::util::Location;

// how many procedure calls may be in progress at once
pub const MAX_CALL_DEPTH: usize = 64;

pub struct Interpreter<'a, R, W> {
    program: &'a Program,

    // the runtime symbol store, which only holds scopes that are still live
    scopes: Scopes,
    current: ScopeId,

    // where the analyzer found each name, filled in before the program runs
    resolutions: Resolutions,
    depth: usize,

    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Interpreter<'a, R, W> {
    pub fn new(program: &'a Program, input: R, output: W) -> Interpreter<'a, R, W> {
        Interpreter {
            program,
            scopes: Scopes::global(),
            current: ScopeId::GLOBAL,
            resolutions: Resolutions::new(),
            depth: 0,
            input,
            output,
        }
    }

    // Check the program, then run it. Nothing is run if the check fails.
    pub fn interpret(&mut self) -> Result<(), Error> {
        self.resolutions = Analyzer::new(self.program).build()?.resolutions;

        let program = self.program;
        self.exec_stms(&program.stms)
    }

    // the global scope, holding the final values of global variables once the program has run
    pub fn globals(&self) -> &ScopedSymbolTable {
        self.scopes.table(ScopeId::GLOBAL)
    }

    pub fn into_output(self) -> W {
        self.output
    }

    // Run `f` in a new scope nested inside `parent`, then discard that scope and
    // return to the scope we started in.
    fn within<T>(
        &mut self,
        parent: ScopeId,
        header: &str,
        f: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let caller = self.current;
        let scope = self.scopes.enter(parent, header);
        self.current = scope;
        trace!("entering scope {}", self.scopes.table(scope).scope_name);

        let result = f(self);

        self.scopes.exit(scope);
        self.current = caller;
        result
    }

    fn exec_stms(&mut self, stms: &[Stm]) -> Result<(), Error> {
        for stm in stms {
            self.exec_stm(stm)?;
        }

        Ok(())
    }

    fn exec_stm(&mut self, stm: &Stm) -> Result<(), Error> {
        match &stm.data {
            StmData::VarDecl { id, ty } => {
                let ty = self.lookup_ty(ty)?;
                self.scopes
                    .insert(self.current, &id.data, Symbol::Var(VarSymbol::new(&id.data, ty)));

                Ok(())
            }
            StmData::Assign { id, exp } => {
                let value = self.eval(exp)?;
                let (owner, var) = self.lookup_var(&id.location, &id.data)?;
                let var = var.with_value(value);
                self.scopes.update(owner, &id.data, Symbol::Var(var));

                Ok(())
            }
            StmData::Input { id } => {
                let (owner, var) = self.lookup_var(&id.location, &id.data)?;
                let var = var.clone();
                let value = self.read_value(&stm.location, &var)?;
                self.scopes
                    .update(owner, &id.data, Symbol::Var(var.with_value(value)));

                Ok(())
            }
            StmData::Print { exp } => {
                let value = self.eval(exp)?;
                writeln!(self.output, "{}", value).map_err(|source| RuntimeError::Io {
                    location: stm.location.clone(),
                    source,
                })?;

                Ok(())
            }
            StmData::If { cond, stms } => {
                if self.eval_cond(cond)? {
                    self.within(self.current, "if", |interpreter| interpreter.exec_stms(stms))?;
                }

                Ok(())
            }
            StmData::While { cond, stms } => {
                // each iteration gets a fresh scope for the body
                while self.eval_cond(cond)? {
                    self.within(self.current, "while", |interpreter| {
                        interpreter.exec_stms(stms)
                    })?;
                }

                Ok(())
            }
            StmData::Block { stms } => {
                self.within(self.current, "block", |interpreter| interpreter.exec_stms(stms))
            }
            StmData::ProcedureDecl { name, params, stms } => {
                let mut param_symbols = Vec::with_capacity(params.len());
                for param in params {
                    param_symbols.push(VarSymbol::new(&param.id.data, self.lookup_ty(&param.ty)?));
                }

                self.scopes.insert(
                    self.current,
                    &name.data,
                    Symbol::Procedure(ProcedureSymbol {
                        name: name.data.clone(),
                        params: param_symbols,
                        body: stms.clone(),
                    }),
                );

                Ok(())
            }
            StmData::ProcedureCall { name, args } => {
                let (declared_in, procedure) = self.lookup_procedure(name)?;

                if procedure.params.len() != args.len() {
                    return Err(SemanticError::ArityMismatch {
                        location: stm.location.clone(),
                        name: name.data.clone(),
                        expected: procedure.params.len(),
                        found: args.len(),
                    }
                    .into());
                }

                // arguments are evaluated in the caller's scope, left to right
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }

                if self.depth == MAX_CALL_DEPTH {
                    return Err(RuntimeError::RecursionLimit {
                        location: stm.location.clone(),
                        name: name.data.clone(),
                        limit: MAX_CALL_DEPTH,
                    }
                    .into());
                }

                debug!("calling {}({})", procedure.name, values.iter().join(", "));

                // the callee scope hangs off the scope the procedure was declared in,
                // not the caller's scope
                self.depth += 1;
                let result = self.within(declared_in, &format!("proc:{}", name.data), |interpreter| {
                    for (param, value) in procedure.params.iter().zip(values) {
                        interpreter.scopes.insert(
                            interpreter.current,
                            &param.name,
                            Symbol::Var(param.with_value(value)),
                        );
                    }

                    interpreter.exec_stms(&procedure.body)
                });
                self.depth -= 1;

                result
            }
        }
    }

    // Read one line of input and convert it to a value of the variable's type.
    fn read_value(&mut self, location: &Location, var: &VarSymbol) -> Result<Value, Error> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|source| RuntimeError::Io {
                location: location.clone(),
                source,
            })?;

        if read == 0 {
            return Err(RuntimeError::UnexpectedEndOfInput {
                location: location.clone(),
                name: var.name.clone(),
            }
            .into());
        }

        let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
        trace!("read {:?} into {}", line, var.name);

        let invalid = || RuntimeError::InvalidInputValue {
            location: location.clone(),
            name: var.name.clone(),
            ty: var.ty,
            input: line.to_string(),
        };

        let value = match var.ty {
            Ty::Int => Value::Int(line.trim().parse().map_err(|_| invalid())?),
            Ty::Boolean => match line {
                "True" | "true" | "T" | "t" => Value::Bool(true),
                "False" | "false" | "F" | "f" => Value::Bool(false),
                _ => return Err(invalid().into()),
            },
            Ty::String => Value::Str(line.to_string()),
        };

        Ok(value)
    }

    fn eval_cond(&self, cond: &Exp) -> Result<bool, Error> {
        match self.eval(cond)? {
            Value::Bool(b) => Ok(b),
            value => Err(SemanticError::TypeMismatch {
                location: cond.location.clone(),
                expected: Ty::Boolean,
                found: value.ty(),
            }
            .into()),
        }
    }

    fn eval(&self, exp: &Exp) -> Result<Value, Error> {
        match &exp.data {
            ExpData::Name { name } => match &self.lookup_var(&exp.location, name)?.1.value {
                Some(value) => Ok(value.clone()),
                None => Err(RuntimeError::UninitializedVariable {
                    location: exp.location.clone(),
                    name: name.clone(),
                }
                .into()),
            },
            ExpData::BoolLit { b } => Ok(Value::Bool(*b)),
            ExpData::IntLit { i } => Ok(Value::Int(*i)),
            ExpData::StrLit { s } => Ok(Value::Str(s.clone())),
            ExpData::Prefix { op, exp: operand } => {
                let value = self.eval(operand)?;

                match (op, value) {
                    (PrefixOp::Plus, Value::Int(i)) => Ok(Value::Int(i)),
                    (PrefixOp::Minus, Value::Int(i)) => checked(&exp.location, i.checked_neg()),
                    (PrefixOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (op, value) => Err(RuntimeError::InvalidOperand {
                        location: exp.location.clone(),
                        op: op.to_string(),
                        value: value.to_string(),
                    }
                    .into()),
                }
            }
            ExpData::Infix { op, exp1, exp2 } => {
                let value1 = self.eval(exp1)?;
                let value2 = self.eval(exp2)?;

                eval_infix(&exp.location, *op, &value1, &value2)
            }
        }
    }

    // The symbol a name use refers to, looked up as many scopes out as the analyzer
    // found it, along with the scope that holds it.
    fn lookup(&self, location: &Location, name: &str) -> Option<(ScopeId, &Symbol)> {
        let distance = *self.resolutions.get(location)?;
        let owner = self.scopes.ancestor(self.current, distance);

        self.scopes
            .lookup(owner, name, false)
            .map(|symbol| (owner, symbol))
    }

    fn lookup_ty(&self, ty: &Binder) -> Result<Ty, Error> {
        match self.lookup(&ty.location, &ty.data) {
            Some((_, Symbol::Type(ty))) => Ok(*ty),
            _ => Err(SemanticError::UnknownType {
                location: ty.location.clone(),
                name: ty.data.clone(),
            }
            .into()),
        }
    }

    fn lookup_var(&self, location: &Location, name: &str) -> Result<(ScopeId, &VarSymbol), Error> {
        match self.lookup(location, name) {
            Some((owner, Symbol::Var(var))) => Ok((owner, var)),
            Some(_) => Err(SemanticError::NotAVariable {
                location: location.clone(),
                name: name.to_string(),
            }
            .into()),
            None => Err(SemanticError::UndeclaredIdentifier {
                location: location.clone(),
                name: name.to_string(),
            }
            .into()),
        }
    }

    // the procedure bound to a name, along with the scope it was declared in
    fn lookup_procedure(&self, name: &Binder) -> Result<(ScopeId, ProcedureSymbol), Error> {
        match self.lookup(&name.location, &name.data) {
            Some((declared_in, Symbol::Procedure(procedure))) => Ok((declared_in, procedure.clone())),
            Some(_) => Err(SemanticError::NotCallable {
                location: name.location.clone(),
                name: name.data.clone(),
            }
            .into()),
            None => Err(SemanticError::UndeclaredProcedure {
                location: name.location.clone(),
                name: name.data.clone(),
            }
            .into()),
        }
    }
}

fn checked(location: &Location, result: Option<i64>) -> Result<Value, Error> {
    result.map(Value::Int).ok_or_else(|| {
        RuntimeError::Overflow {
            location: location.clone(),
        }
        .into()
    })
}

fn eval_infix(location: &Location, op: InfixOp, value1: &Value, value2: &Value) -> Result<Value, Error> {
    match (op, value1, value2) {
        (InfixOp::Sum, Value::Int(i1), Value::Int(i2)) => checked(location, i1.checked_add(*i2)),
        (InfixOp::Sub, Value::Int(i1), Value::Int(i2)) => checked(location, i1.checked_sub(*i2)),
        (InfixOp::Mul, Value::Int(i1), Value::Int(i2)) => checked(location, i1.checked_mul(*i2)),
        (InfixOp::Div, Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivisionByZero {
            location: location.clone(),
        }
        .into()),
        (InfixOp::Div, Value::Int(i1), Value::Int(i2)) => checked(location, i1.checked_div(*i2)),

        (InfixOp::Equals, _, _) => Ok(Value::Bool(value1 == value2)),
        (InfixOp::NotEquals, _, _) => Ok(Value::Bool(value1 != value2)),

        (
            InfixOp::GreaterThan | InfixOp::GreaterOrEqual | InfixOp::LessThan | InfixOp::LessOrEqual,
            _,
            _,
        ) => match value1.compare(value2) {
            Some(ordering) => Ok(Value::Bool(match op {
                InfixOp::GreaterThan => ordering.is_gt(),
                InfixOp::GreaterOrEqual => ordering.is_ge(),
                InfixOp::LessThan => ordering.is_lt(),
                _ => ordering.is_le(),
            })),
            None => Err(invalid_operands(location, op, value1, value2)),
        },

        _ => Err(invalid_operands(location, op, value1, value2)),
    }
}

fn invalid_operands(location: &Location, op: InfixOp, value1: &Value, value2: &Value) -> Error {
    RuntimeError::InvalidOperand {
        location: location.clone(),
        op: op.to_string(),
        value: format!("{} and {}", value1, value2),
    }
    .into()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parse::parse;

    fn run(code: &str, input: &str) -> Result<String, Error> {
        let _ = env_logger::builder().is_test(true).try_init();

        let program = parse(code)?;
        let mut output = Vec::new();
        Interpreter::new(&program, input.as_bytes(), &mut output).interpret()?;

        Ok(String::from_utf8(output).unwrap())
    }

    // Tests that "var x : INT; x := 3 + 4; print x;" prints "7"
    #[test]
    fn test_print_sum() {
        assert_eq!(run("var x : INT; x := 3 + 4; print x;", "").unwrap(), "7\n");
    }

    #[test]
    fn test_print_comparison() {
        assert_eq!(
            run("var b : BOOLEAN; b := 3 > 4; print b;", "").unwrap(),
            "false\n"
        );
    }

    #[test]
    fn test_input_string() {
        assert_eq!(
            run("var s : STRING; input s; print s;", "hi\n").unwrap(),
            "hi\n"
        );
    }

    #[test]
    fn test_input_int() {
        assert_eq!(
            run("var n : INT; input n; print n * 2;", " 21 \n").unwrap(),
            "42\n"
        );
        assert!(matches!(
            run("var n : INT; input n;", "abc\n"),
            Err(Error::Runtime(RuntimeError::InvalidInputValue { ty: Ty::Int, .. }))
        ));
    }

    #[test]
    fn test_input_boolean() {
        assert_eq!(
            run(
                "var a : BOOLEAN; var b : BOOLEAN; input a; input b; print a; print b;",
                "t\nFalse\n"
            )
            .unwrap(),
            "true\nfalse\n"
        );
        insta::assert_snapshot!(
            run("var a : BOOLEAN; input a;", "yes\n").unwrap_err(),
            @r#"invalid BOOLEAN value for 'a': "yes""#
        );
        // the accepted spellings are case sensitive
        assert!(run("var a : BOOLEAN; input a;", "TRUE\n").is_err());
    }

    #[test]
    fn test_input_exhausted() {
        assert!(matches!(
            run("var s : STRING; input s;", ""),
            Err(Error::Runtime(RuntimeError::UnexpectedEndOfInput { .. }))
        ));
    }

    // Tests that the condition is re-evaluated after every run of the body
    #[test]
    fn test_while() {
        assert_eq!(
            run(
                "var i : INT; i := 0; while i < 3 { print i; i := i + 1; }",
                ""
            )
            .unwrap(),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_if() {
        assert_eq!(
            run(
                "if 1 == 2 { print \"no\"; } if not (1 == 2) { print \"yes\"; }",
                ""
            )
            .unwrap(),
            "yes\n"
        );
    }

    // Tests that a shadowing declaration only lasts as long as its block
    #[test]
    fn test_runtime_shadowing() {
        assert_eq!(
            run(
                "
                var x : INT;
                x := 1;
                {
                    var x : STRING;
                    x := \"inner\";
                    print x;
                }
                print x;
                ",
                ""
            )
            .unwrap(),
            "inner\n1\n"
        );
    }

    // Tests that declarations in a loop body start over on every iteration
    #[test]
    fn test_loop_body_scope_is_fresh() {
        let result = run(
            "
            var i : INT;
            i := 0;
            while i < 2 {
                var t : INT;
                if i == 1 { print t; }
                t := i;
                i := i + 1;
            }
            ",
            "",
        );

        assert!(matches!(
            result,
            Err(Error::Runtime(RuntimeError::UninitializedVariable { name, .. })) if name == "t"
        ));
    }

    #[test]
    fn test_procedure_call() {
        assert_eq!(run("proc p(a : INT) { print a; } p(5);", "").unwrap(), "5\n");
    }

    // Tests that procedures can update variables from the scope they were declared in
    #[test]
    fn test_procedure_updates_global() {
        assert_eq!(
            run(
                "
                var total : INT;
                total := 0;
                proc add(n : INT) { total := total + n; }
                add(2);
                add(3);
                print total;
                ",
                ""
            )
            .unwrap(),
            "5\n"
        );
    }

    #[test]
    fn test_recursion() {
        assert_eq!(
            run(
                "
                proc countdown(n : INT) {
                    if n > 0 { print n; countdown(n - 1); }
                }
                countdown(3);
                ",
                ""
            )
            .unwrap(),
            "3\n2\n1\n"
        );
    }

    // Tests that a procedure sees the variables where it was declared, not where it was called
    #[test]
    fn test_lexical_scope() {
        assert_eq!(
            run(
                "
                var x : STRING;
                x := \"outer\";
                proc show() { print x; }
                {
                    var x : STRING;
                    x := \"inner\";
                    show();
                }
                ",
                ""
            )
            .unwrap(),
            "outer\n"
        );
    }

    // Tests that a declaration made after a procedure, in the scope the procedure was
    // declared in, does not capture the names in its body
    #[test]
    fn test_later_declaration_does_not_capture() {
        assert_eq!(
            run(
                "
                var x : INT;
                x := 0;
                {
                    proc p() { x := 5; }
                    var x : STRING;
                    x := \"s\";
                    p();
                    print x;
                    print x == \"s\";
                }
                print x;
                ",
                ""
            )
            .unwrap(),
            "s\ntrue\n5\n"
        );
    }

    #[test]
    fn test_recursion_limit() {
        assert!(matches!(
            run("proc f() { f(); } f();", ""),
            Err(Error::Runtime(RuntimeError::RecursionLimit { name, limit, .. }))
                if name == "f" && limit == MAX_CALL_DEPTH
        ));

        // recursion just inside the limit still runs
        let code = format!(
            "
            var n : INT;
            proc down(k : INT) {{ n := k; if k > 1 {{ down(k - 1); }} }}
            down({});
            print n;
            ",
            MAX_CALL_DEPTH
        );
        assert_eq!(run(&code, "").unwrap(), "1\n");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            run(
                "print 7 / 2; print -7 / 2; print 2 * (3 - 5); print +4;",
                ""
            )
            .unwrap(),
            "3\n-3\n-4\n4\n"
        );
        insta::assert_snapshot!(run("print 1 / 0;", "").unwrap_err(), @"division by zero");
        insta::assert_snapshot!(
            run("print 9223372036854775807 + 1;", "").unwrap_err(),
            @"integer overflow"
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            run(
                "print \"a\" < \"b\"; print \"x\" == \"x\"; print false < true; print 2 >= 3; print 1 != 1;",
                ""
            )
            .unwrap(),
            "true\ntrue\ntrue\nfalse\nfalse\n"
        );
    }

    // Tests that a prefix operator on a value of the wrong kind fails when it is run
    #[test]
    fn test_invalid_operand() {
        insta::assert_snapshot!(
            run("var b : BOOLEAN; b := -true;", "").unwrap_err(),
            @"operator '-' cannot be applied to true"
        );
    }

    #[test]
    fn test_uninitialized() {
        insta::assert_snapshot!(
            run("var x : INT; print x;", "").unwrap_err(),
            @"variable 'x' used before being assigned a value"
        );
    }

    // Tests that nothing is run when the program fails analysis
    #[test]
    fn test_analysis_gate() {
        let program = parse("print 1; y := 2;").unwrap();
        let mut output = Vec::new();
        let result = Interpreter::new(&program, "".as_bytes(), &mut output).interpret();

        assert!(matches!(
            result,
            Err(Error::Semantic(SemanticError::UndeclaredIdentifier { .. }))
        ));
        assert!(output.is_empty());
    }

    // Tests that output written before a runtime error is kept
    #[test]
    fn test_output_before_failure() {
        let program = parse("print 1; var x : INT; input x; print x;").unwrap();
        let mut output = Vec::new();
        let result = Interpreter::new(&program, "abc\n".as_bytes(), &mut output).interpret();

        assert!(result.is_err());
        assert_eq!(output, b"1\n");
    }

    #[test]
    fn test_final_state() {
        let program = parse("var x : INT; x := 3 + 4; { var y : INT; y := 1; }").unwrap();
        let mut interpreter = Interpreter::new(&program, "".as_bytes(), Vec::new());
        interpreter.interpret().unwrap();

        assert_eq!(
            interpreter.globals().get("x"),
            Some(&Symbol::Var(
                VarSymbol::new("x", Ty::Int).with_value(Value::Int(7))
            ))
        );
        assert_eq!(interpreter.globals().get("y"), None);
        assert!(interpreter.into_output().is_empty());
    }
}
