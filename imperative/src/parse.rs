use std::rc::Rc;

use peg::ParseLiteral;
use thiserror::Error;

use crate::surface::{
    self, Binder, Exp, ExpData, InfixOp, Param, PrefixOp, Program, Stm, StmData,
};
use crate::util::{Located, Location};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub start: usize,
    pub end: usize,
    pub message: String,
}

impl ParseError {
    pub fn location(&self) -> Location {
        Location::new(self.start, self.end)
    }
}

pub fn parse(string: &str) -> Result<Program, ParseError> {
    parser::program(string).map_err(|e| ParseError {
        start: e.location.offset,
        end: (e.location.offset + 1).min(string.len()),
        message: format!("expected {}", e.expected),
    })
}

peg::parser! {
    grammar parser() for str {
        pub rule program() -> Program
            = _ stms:spaced_stm()* { Program { stms } }

        rule spaced_stm() -> Stm = stm:stm() _ { stm }

        pub rule stm() -> Stm = located(<stm_data()>)
        rule stm_data() -> StmData
            = kw("var") _ id:binder() _ ":" _ ty:binder() _ ";"
                { StmData::VarDecl { id, ty } }
            / kw("input") _ id:binder() _ ";"
                { StmData::Input { id } }
            / kw("print") _ exp:exp() _ ";"
                { StmData::Print { exp } }
            / kw("if") _ cond:exp() _ stms:block()
                { StmData::If { cond, stms } }
            / kw("while") _ cond:exp() _ stms:block()
                { StmData::While { cond, stms } }
            / kw("proc") _ name:binder() _ "(" _ params:list(<param()>, <",">) _ ")" _ stms:block()
                { StmData::ProcedureDecl { name, params, stms: Rc::new(stms) } }
            / stms:block()
                { StmData::Block { stms } }
            / name:binder() _ "(" _ args:list(<exp()>, <",">) _ ")" _ ";"
                { StmData::ProcedureCall { name, args } }
            / id:binder() _ ":=" _ exp:exp() _ ";"
                { StmData::Assign { id, exp } }

        rule block() -> Vec<Stm>
            = "{" _ stms:spaced_stm()* "}" { stms }

        rule param() -> Param
            = id:binder() _ ":" _ ty:binder() { Param { id, ty } }

        pub rule exp() -> Exp = precedence!{
            exp1:(@) _ "==" _ exp2:@ { surface::infix(InfixOp::Equals, exp1, exp2) }
            exp1:(@) _ "!=" _ exp2:@ { surface::infix(InfixOp::NotEquals, exp1, exp2) }
            exp1:(@) _ ">=" _ exp2:@ { surface::infix(InfixOp::GreaterOrEqual, exp1, exp2) }
            exp1:(@) _ ">" _ exp2:@ { surface::infix(InfixOp::GreaterThan, exp1, exp2) }
            exp1:(@) _ "<=" _ exp2:@ { surface::infix(InfixOp::LessOrEqual, exp1, exp2) }
            exp1:(@) _ "<" _ exp2:@ { surface::infix(InfixOp::LessThan, exp1, exp2) }
            --
            exp1:(@) _ "+" _ exp2:@ { surface::infix(InfixOp::Sum, exp1, exp2) }
            exp1:(@) _ "-" _ exp2:@ { surface::infix(InfixOp::Sub, exp1, exp2) }
            --
            exp1:(@) _ "*" _ exp2:@ { surface::infix(InfixOp::Mul, exp1, exp2) }
            exp1:(@) _ "/" _ exp2:@ { surface::infix(InfixOp::Div, exp1, exp2) }
            --
            start:position!() "+" _ exp:@
                { surface::prefix(Location::new(start, exp.location.end), PrefixOp::Plus, exp) }
            start:position!() "-" _ exp:@
                { surface::prefix(Location::new(start, exp.location.end), PrefixOp::Minus, exp) }
            start:position!() kw("not") _ exp:@
                { surface::prefix(Location::new(start, exp.location.end), PrefixOp::Not, exp) }
            --
            exp:located(<atom_data()>) { exp }
            "(" _ exp:exp() _ ")" { exp }
        }

        rule atom_data() -> ExpData
            = kw("true") { ExpData::BoolLit { b: true } }
            / kw("false") { ExpData::BoolLit { b: false } }
            / i:int_lit() { ExpData::IntLit { i } }
            / s:str_lit() { ExpData::StrLit { s } }
            / name:name() { ExpData::Name { name } }

        rule int_lit() -> i64
            = n:$(['0'..='9']+) {? n.parse().or(Err("integer literal")) }

        rule str_lit() -> String
            = "\"" s:$([^ '"']*) "\"" { s.to_string() }

        //

        rule keyword()
            = kw("var") / kw("input") / kw("print") / kw("if") / kw("while")
            / kw("proc") / kw("true") / kw("false") / kw("not")

        rule kw(k: &'static str)
            = ##parse_string_literal(k) !name_char()

        rule name_char() = ['a'..='z' | 'A'..='Z' | '_' | '0'..='9']

        rule name() -> String
            = quiet!{ !keyword() s:$(['a'..='z' | 'A'..='Z' | '_'] name_char()*) { s.to_string() } }
            / expected!("identifier")

        rule binder() -> Binder = located(<name()>)

        //

        rule located<T>(tr: rule<T>) -> Located<T>
            = start:position!() t:tr() end:position!() { Located::new(Location::new(start, end), t) }

        rule list<T>(tr: rule<T>, sepr: rule<()>) -> Vec<T>
            = v:(t:tr() ** (_ sepr() _) {t}) { v }

        //

        rule comment() = "//" [^ '\n']*
        rule whitespace() = quiet!{ ([' ' | '\n' | '\t' | '\r'] / comment())* }
        rule _ = whitespace()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse_exp(code: &str) -> Exp {
        parser::exp(code).unwrap()
    }

    #[test]
    fn test_program_statements() {
        let program = parse(
            "
            var x : INT;
            x := 3 + 4;
            print x;
            ",
        )
        .unwrap();

        assert_eq!(program.stms.len(), 3);
        assert!(matches!(
            &program.stms[0].data,
            StmData::VarDecl { id, ty } if id.data == "x" && ty.data == "INT"
        ));
        assert!(matches!(&program.stms[1].data, StmData::Assign { .. }));
        assert!(matches!(&program.stms[2].data, StmData::Print { .. }));
    }

    // Tests that multiplication binds tighter than addition, and comparison looser than both
    // "1 + 2 * 3 > 4" parses as "(1 + (2 * 3)) > 4"
    #[test]
    fn test_precedence() {
        let exp = parse_exp("1 + 2 * 3 > 4");

        match exp.data {
            ExpData::Infix {
                op: InfixOp::GreaterThan,
                exp1,
                ..
            } => match &exp1.data {
                ExpData::Infix {
                    op: InfixOp::Sum,
                    exp2,
                    ..
                } => assert!(matches!(
                    exp2.data,
                    ExpData::Infix {
                        op: InfixOp::Mul,
                        ..
                    }
                )),
                _ => panic!("expected a sum"),
            },
            _ => panic!("expected a comparison"),
        }
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let exp = parse_exp("10 - 3 - 2");

        match exp.data {
            ExpData::Infix {
                op: InfixOp::Sub,
                exp1,
                exp2,
            } => {
                assert!(matches!(
                    exp1.data,
                    ExpData::Infix {
                        op: InfixOp::Sub,
                        ..
                    }
                ));
                assert_eq!(exp2.data, ExpData::IntLit { i: 2 });
            }
            _ => panic!("expected a subtraction"),
        }
    }

    #[test]
    fn test_locations() {
        let exp = parse_exp("x + 12");

        assert_eq!(exp.location, Location::new(0, 6));
        match exp.data {
            ExpData::Infix { exp1, exp2, .. } => {
                assert_eq!(exp1.location, Location::new(0, 1));
                assert_eq!(exp2.location, Location::new(4, 6));
            }
            _ => panic!("expected an infix expression"),
        }
    }

    #[test]
    fn test_prefix_operators() {
        assert!(matches!(
            parse_exp("not true").data,
            ExpData::Prefix {
                op: PrefixOp::Not,
                ..
            }
        ));
        assert!(matches!(
            parse_exp("-x").data,
            ExpData::Prefix {
                op: PrefixOp::Minus,
                ..
            }
        ));
    }

    #[test]
    fn test_keywords_are_not_names() {
        assert_eq!(parse_exp("notice").data, ExpData::Name { name: "notice".to_string() });
        assert!(parser::exp("while").is_err());
    }

    // Tests that a keyword only matches when it is not the start of a longer name
    #[test]
    fn test_keyword_boundaries() {
        let program = parse("variable := 1; printer := 2; print printer;").unwrap();

        assert!(matches!(
            &program.stms[0].data,
            StmData::Assign { id, .. } if id.data == "variable"
        ));
        assert!(matches!(
            &program.stms[1].data,
            StmData::Assign { id, .. } if id.data == "printer"
        ));
        assert!(matches!(&program.stms[2].data, StmData::Print { .. }));
    }

    #[test]
    fn test_procedures_and_blocks() {
        let program = parse(
            "
            proc p(a : INT, b : STRING) {
                print a;
            }
            // call it
            p(5, \"five\");
            { var y : BOOLEAN; }
            ",
        )
        .unwrap();

        match &program.stms[0].data {
            StmData::ProcedureDecl { name, params, stms } => {
                assert_eq!(name.data, "p");
                assert_eq!(params.len(), 2);
                assert_eq!(params[1].ty.data, "STRING");
                assert_eq!(stms.len(), 1);
            }
            _ => panic!("expected a procedure declaration"),
        }
        assert!(matches!(
            &program.stms[1].data,
            StmData::ProcedureCall { args, .. } if args.len() == 2
        ));
        assert!(matches!(&program.stms[2].data, StmData::Block { stms } if stms.len() == 1));
    }

    #[test]
    fn test_parse_error() {
        let error = parse("var x INT;").unwrap_err();

        assert_eq!(error.start, 6);
        assert!(error.message.starts_with("expected"));
    }
}
