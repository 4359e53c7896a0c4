//! Análisis sintáctico.
//!
//! Descenso recursivo sobre un [`TokenStream`], construyendo el árbol
//! directamente en la arena de la compilación. Además de la forma, el parser
//! aplica las pocas reglas estáticas del lenguaje: los números de línea son
//! únicos, los destinos de GOTO/GOSUB son numerales simples que nombran una
//! línea declarada y un cero literal nunca es divisor. La existencia de los
//! destinos es la única verificación diferida; ocurre al final del programa.
//!
//! Las cadenas de operadores se construyen de forma iterativa. Solamente los
//! paréntesis y las sentencias tras `THEN` recurren, y su anidamiento está
//! acotado por [`MAX_NESTING`].

use std::collections::HashSet;
use thiserror::Error;

use crate::{
    arena::{ArenaError, Id},
    ast::*,
    error::Diagnostics,
    lex::{Keyword, Token, TokenStream},
    source::Located,
};

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error("Expected an expression, found {0}")]
    ExpectedExpr(Token),

    #[error("Expected `)`, found {0}")]
    MissingCloseParen(Token),

    #[error("Expected `THEN`, found {0}")]
    MissingThen(Token),

    #[error("Expected `=` in assignment, found {0}")]
    MissingAssign(Token),

    #[error("Invalid variable name `{0}`, variables are single upper-case letters")]
    InvalidVariable(String),

    #[error("Expected a variable, found {0}")]
    ExpectedVariable(Token),

    #[error("Expected a relational operator, found {0}")]
    ExpectedRelop(Token),

    #[error("Target of `{0}` must be a constant line number")]
    NonConstantTarget(Keyword),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Line number {0} is already declared")]
    DuplicateLine(String),

    #[error("`{keyword}` to undeclared line {target}")]
    UndeclaredTarget { keyword: Keyword, target: String },

    #[error("Empty argument list for `{0}`")]
    EmptyList(Keyword),

    #[error("Expected a statement, found {0}")]
    ExpectedStatement(Token),

    #[error("Missing statement after `THEN`")]
    EmptyThen,

    #[error("Expected end of line, found {0}")]
    ExpectedLineEnd(Token),

    #[error("Nesting exceeds {MAX_NESTING} levels")]
    TooDeep,
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserWarning {
    #[error("Statement `{0}` is not implemented and will be ignored")]
    NotImplemented(Keyword),

    #[error("Relational operator `><` is not implemented, treated as `<>`")]
    CrazyRelop,
}

pub type Parse<T> = Result<T, Located<ParserError>>;

/// Límite de anidamiento entre paréntesis y sentencias `THEN`.
pub const MAX_NESTING: u32 = 64;

/// Analiza un programa completo. Los nodos se cargan a un presupuesto de
/// `arena_capacity` bytes.
pub fn parse(
    tokens: Vec<Located<Token>>,
    arena_capacity: usize,
    diagnostics: &mut Diagnostics,
) -> Parse<Program> {
    let parser = Parser {
        tokens: TokenStream::new(tokens),
        nodes: Nodes::new(arena_capacity),
        last_line: 1,
        depth: 0,
        declared: HashSet::new(),
        pending: Vec::new(),
        seen: HashSet::new(),
        variables: Vec::new(),
        diagnostics,
    };

    parser.program()
}

struct Parser<'d> {
    tokens: TokenStream,
    nodes: Nodes,
    last_line: u32,
    depth: u32,

    /// Números de línea declarados, normalizados.
    declared: HashSet<String>,

    /// Destinos de GOTO/GOSUB, ubicados en la línea que los referencia.
    pending: Vec<Located<(Keyword, Num)>>,

    seen: HashSet<Var>,
    variables: Vec<Var>,
    diagnostics: &'d mut Diagnostics,
}

impl Parser<'_> {
    fn program(mut self) -> Parse<Program> {
        let mut lines = Vec::new();
        while let Some(token) = self.peek(0) {
            match token {
                Token::LineEnd => {
                    self.next();
                }

                _ => lines.push(self.line()?),
            }
        }

        self.check_correct_goto()?;

        Ok(Program {
            nodes: self.nodes,
            lines,
            variables: self.variables,
        })
    }

    fn line(&mut self) -> Parse<Line> {
        let source_line = self.tokens.peek(0).map_or(self.last_line, Located::line);

        let number = match self.peek(0) {
            Some(Token::Numeral(digits)) => {
                let number = Num::new(digits.clone());
                self.next();
                Some(number)
            }

            _ => None,
        };

        if let Some(number) = &number {
            if !self.declared.insert(number.normalized().to_owned()) {
                return self.fail(ParserError::DuplicateLine(number.to_string()));
            }
        }

        let stat = self.stat()?;
        match self.next().into_inner() {
            Token::LineEnd => Ok(Line {
                number,
                stat,
                source_line,
            }),

            token => self.fail(ParserError::ExpectedLineEnd(token)),
        }
    }

    fn stat(&mut self) -> Parse<Id<Stat>> {
        let (line, token) = self.next().split();
        let keyword = match token {
            Token::Keyword(keyword) => keyword,
            token => return self.fail(ParserError::ExpectedStatement(token)),
        };

        let stat = match keyword {
            Keyword::Print => Stat::Print(self.expr_list()?),
            Keyword::Input => Stat::Input(self.var_list()?),
            Keyword::Goto => Stat::Goto(self.target(Keyword::Goto, line)?),
            Keyword::Gosub => Stat::Gosub(self.target(Keyword::Gosub, line)?),
            Keyword::Return => Stat::Return,
            Keyword::End => Stat::End,

            Keyword::If => {
                let lhs = self.expr()?;
                let relop = self.relop()?;
                let rhs = self.expr()?;

                match self.next().into_inner() {
                    Token::Keyword(Keyword::Then) => (),
                    token => return self.fail(ParserError::MissingThen(token)),
                }

                if let None | Some(Token::LineEnd) = self.peek(0) {
                    return self.fail(ParserError::EmptyThen);
                }

                let then = self.nested(Self::stat)?;
                Stat::If {
                    lhs,
                    relop,
                    rhs,
                    then,
                }
            }

            Keyword::Let => {
                let var = self.var()?;
                match self.next().into_inner() {
                    Token::Equal => (),
                    token => return self.fail(ParserError::MissingAssign(token)),
                }

                let expr = self.expr()?;
                if self.seen.insert(var) {
                    self.variables.push(var);
                }

                Stat::Let { var, expr }
            }

            Keyword::Clear | Keyword::List | Keyword::Run => {
                let warning = ParserWarning::NotImplemented(keyword);
                self.diagnostics.warn(Located::at(warning, line));

                match keyword {
                    Keyword::Clear => Stat::Clear,
                    Keyword::List => Stat::List,
                    _ => Stat::Run,
                }
            }

            Keyword::Then => {
                return self.fail(ParserError::ExpectedStatement(Token::Keyword(keyword)))
            }
        };

        self.alloc(stat)
    }

    fn target(&mut self, keyword: Keyword, line: u32) -> Parse<Target> {
        let expr = self.expr()?;
        match self.nodes.constant(expr).cloned() {
            Some(number) => {
                self.pending
                    .push(Located::at((keyword, number.clone()), line));

                Ok(Target { expr, line: number })
            }

            None => self.fail(ParserError::NonConstantTarget(keyword)),
        }
    }

    fn expr_list(&mut self) -> Parse<ExprList> {
        if let None | Some(Token::LineEnd) = self.peek(0) {
            return self.fail(ParserError::EmptyList(Keyword::Print));
        }

        let mut items = Vec::new();
        loop {
            let item = match self.peek(0) {
                Some(Token::Str(string)) => {
                    let item = PrintItem::Str(string.clone());
                    self.next();
                    item
                }

                _ => PrintItem::Expr(self.expr()?),
            };

            items.push(item);
            if !self.comma() {
                break Ok(ExprList(items));
            }
        }
    }

    fn var_list(&mut self) -> Parse<VarList> {
        if let None | Some(Token::LineEnd) = self.peek(0) {
            return self.fail(ParserError::EmptyList(Keyword::Input));
        }

        let mut vars = vec![self.var()?];
        while self.comma() {
            vars.push(self.var()?);
        }

        Ok(VarList(vars))
    }

    fn relop(&mut self) -> Parse<Relop> {
        let (relop, width) = match (self.peek(0), self.peek(1)) {
            (Some(Token::Less), Some(Token::Greater)) => (Relop::Ne, 2),
            (Some(Token::Less), Some(Token::Equal)) => (Relop::Lte, 2),
            (Some(Token::Less), _) => (Relop::Lt, 1),
            (Some(Token::Greater), Some(Token::Equal)) => (Relop::Gte, 2),
            (Some(Token::Greater), Some(Token::Less)) => (Relop::Crazy, 2),
            (Some(Token::Greater), _) => (Relop::Gt, 1),
            (Some(Token::Equal), _) => (Relop::Eq, 1),

            _ => {
                let token = self.next().into_inner();
                return self.fail(ParserError::ExpectedRelop(token));
            }
        };

        for _ in 0..width {
            self.next();
        }

        if relop == Relop::Crazy {
            let warning = Located::at(ParserWarning::CrazyRelop, self.last_line);
            self.diagnostics.warn(warning);
        }

        Ok(relop)
    }

    /// Cadena aditiva. Solo el primer término puede llevar signo.
    fn expr(&mut self) -> Parse<Id<Expr>> {
        let sign = match self.peek(0) {
            Some(Token::Plus) => Some(Sign::Plus),
            Some(Token::Minus) => Some(Sign::Minus),
            _ => None,
        };

        if sign.is_some() {
            self.next();
        }

        let first = self.term(sign)?;
        let mut body = Sum::Term(first);

        loop {
            let op = match self.peek(0) {
                Some(Token::Plus) => AddOp::Add,
                Some(Token::Minus) => AddOp::Sub,
                _ => break,
            };

            self.next();
            let rhs = self.term(None)?;
            body = Sum::Op(self.alloc(TermOp { lhs: body, rhs, op })?);
        }

        self.alloc(Expr { body })
    }

    /// Cadena multiplicativa.
    fn term(&mut self, sign: Option<Sign>) -> Parse<Id<Term>> {
        let first = self.factor()?;
        let mut body = Product::Factor(first);

        loop {
            let op = match self.peek(0) {
                Some(Token::Times) => MulOp::Mul,
                Some(Token::Slash) => MulOp::Div,
                _ => break,
            };

            self.next();
            let rhs = self.factor()?;

            if let (MulOp::Div, Factor::Num(divisor)) = (op, &self.nodes[rhs]) {
                if divisor.is_zero() {
                    return self.fail(ParserError::DivisionByZero);
                }
            }

            body = Product::Op(self.alloc(FactorOp { lhs: body, rhs, op })?);
        }

        self.alloc(Term { body, sign })
    }

    fn factor(&mut self) -> Parse<Id<Factor>> {
        let factor = match self.next().into_inner() {
            Token::Id(name) => Factor::Var(self.var_name(name)?),
            Token::Numeral(digits) => Factor::Num(Num::new(digits)),

            Token::OpenParen => {
                let inner = self.nested(Self::expr)?;
                match self.next().into_inner() {
                    Token::CloseParen => Factor::Paren(inner),
                    token => return self.fail(ParserError::MissingCloseParen(token)),
                }
            }

            token => return self.fail(ParserError::ExpectedExpr(token)),
        };

        self.alloc(factor)
    }

    fn var(&mut self) -> Parse<Var> {
        match self.next().into_inner() {
            Token::Id(name) => self.var_name(name),
            token => self.fail(ParserError::ExpectedVariable(token)),
        }
    }

    fn var_name(&self, name: String) -> Parse<Var> {
        match Var::new(&name) {
            Some(var) => Ok(var),
            None => self.fail(ParserError::InvalidVariable(name)),
        }
    }

    fn comma(&mut self) -> bool {
        let found = matches!(self.peek(0), Some(Token::Comma));
        if found {
            self.next();
        }

        found
    }

    /// Todo GOTO/GOSUB debe nombrar una línea declarada. Los fallos se reportan
    /// en la línea que hace la referencia.
    fn check_correct_goto(&self) -> Parse<()> {
        for target in &self.pending {
            let (keyword, number) = target.val();
            if !self.declared.contains(number.normalized()) {
                let error = ParserError::UndeclaredTarget {
                    keyword: *keyword,
                    target: number.to_string(),
                };

                return Err(Located::at(error, target.line()));
            }
        }

        Ok(())
    }

    fn nested<T>(&mut self, parse: fn(&mut Self) -> Parse<T>) -> Parse<T> {
        if self.depth >= MAX_NESTING {
            return self.fail(ParserError::TooDeep);
        }

        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;

        result
    }

    fn alloc<T: Node>(&mut self, node: T) -> Parse<Id<T>> {
        let line = self.last_line;
        self.nodes
            .alloc(node)
            .map_err(|error| Located::at(error.into(), line))
    }

    fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.peek(offset).map(Located::val)
    }

    /// Después del final de la entrada, se comporta como si siguiera un fin de línea.
    fn next(&mut self) -> Located<Token> {
        match self.tokens.consume() {
            Some(token) => {
                self.last_line = token.line();
                token
            }

            None => Located::at(Token::LineEnd, self.last_line),
        }
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Located::at(error, self.last_line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize;

    fn parse_str(source: &str, capacity: usize) -> (Parse<Program>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = tokenize(source, &mut diagnostics).expect("source should lex");
        let result = parse(tokens, capacity, &mut diagnostics);

        (result, diagnostics)
    }

    fn program(source: &str) -> Program {
        match parse_str(source, 1 << 20).0 {
            Ok(program) => program,
            Err(error) => panic!("unexpected parse failure: {}", error),
        }
    }

    fn error(source: &str) -> Located<ParserError> {
        match parse_str(source, 1 << 20).0 {
            Ok(_) => panic!("parse should have failed"),
            Err(error) => error,
        }
    }

    fn let_expr(program: &Program, index: usize) -> &Expr {
        match &program.nodes[program.lines[index].stat] {
            Stat::Let { expr, .. } => &program.nodes[*expr],
            other => panic!("expected LET, found {:?}", other),
        }
    }

    #[test]
    fn chains_lean_left() {
        let program = program("LET A = 1 - 2 - 3\n");
        let nodes = &program.nodes;

        let outer = match let_expr(&program, 0).body {
            Sum::Op(op) => &nodes[op],
            Sum::Term(_) => panic!("expected an operator chain"),
        };

        assert_eq!(outer.op, AddOp::Sub);
        assert!(matches!(outer.lhs, Sum::Op(_)));
    }

    #[test]
    fn products_bind_tighter() {
        let program = program("LET A = 2 + 3 * 4\n");
        let nodes = &program.nodes;

        let sum = match let_expr(&program, 0).body {
            Sum::Op(op) => &nodes[op],
            Sum::Term(_) => panic!("expected a sum"),
        };

        assert!(matches!(sum.lhs, Sum::Term(_)));
        assert!(matches!(nodes[sum.rhs].body, Product::Op(_)));
    }

    #[test]
    fn sign_only_on_first_term() {
        let program = program("LET A = -1 + 2\n");
        let first = match let_expr(&program, 0).body {
            Sum::Op(op) => match program.nodes[op].lhs {
                Sum::Term(term) => &program.nodes[term],
                Sum::Op(_) => panic!("expected a single term"),
            },

            Sum::Term(_) => panic!("expected a sum"),
        };
        assert_eq!(first.sign, Some(Sign::Minus));

        let error = error("LET A = 1 + -2\n");
        assert_eq!(error.val(), &ParserError::ExpectedExpr(Token::Minus));
    }

    #[test]
    fn literal_division_by_zero() {
        let error = error("10 PRINT 5\n20 LET A = 7 / 000\n");
        assert_eq!(error, Located::at(ParserError::DivisionByZero, 2));

        // Solo se verifica un divisor literal simple
        program("LET A = 7 / (0)\nLET B = 7 / A\n");
    }

    #[test]
    fn targets_must_be_constant() {
        let error = error("10 GOTO 5 + 5\n");
        assert_eq!(error.val(), &ParserError::NonConstantTarget(Keyword::Goto));

        let error = self::error("10 GOSUB (10)\n");
        assert_eq!(error.val(), &ParserError::NonConstantTarget(Keyword::Gosub));
    }

    #[test]
    fn duplicate_line_numbers() {
        let error = error("10 END\n20 END\n010 END\n");
        assert_eq!(
            error,
            Located::at(ParserError::DuplicateLine("010".into()), 3)
        );
    }

    #[test]
    fn undeclared_target_cites_reference() {
        let error = error("10 GOTO 30\n20 GOSUB 10\n40 END\n");
        assert_eq!(
            error,
            Located::at(
                ParserError::UndeclaredTarget {
                    keyword: Keyword::Goto,
                    target: "30".into(),
                },
                1
            )
        );
    }

    #[test]
    fn forward_and_normalized_targets() {
        let program = program("10 GOTO 0030\n20 END\n30 GOSUB 10\n");
        assert_eq!(program.lines.len(), 3);
    }

    #[test]
    fn relational_operators() {
        let source = "IF A = B THEN END\nIF A <> B THEN END\nIF A < B THEN END\n\
                      IF A <= B THEN END\nIF A > B THEN END\nIF A >= B THEN END\n";

        let program = program(source);
        let relops: Vec<_> = program
            .lines
            .iter()
            .map(|line| match &program.nodes[line.stat] {
                Stat::If { relop, .. } => *relop,
                other => panic!("expected IF, found {:?}", other),
            })
            .collect();

        use Relop::*;
        assert_eq!(relops, vec![Eq, Ne, Lt, Lte, Gt, Gte]);
    }

    #[test]
    fn crazy_relop_warns() {
        let (result, diagnostics) = parse_str("10 IF A >< B THEN END\n", 1 << 20);
        assert!(result.is_ok());

        let warnings: Vec<_> = diagnostics.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line(), 1);
    }

    #[test]
    fn if_requires_then_and_statement() {
        let error = error("IF 1 < 2 GOTO 10\n");
        assert_eq!(
            error.val(),
            &ParserError::MissingThen(Token::Keyword(Keyword::Goto))
        );

        assert_eq!(self::error("IF 1 < 2 THEN\n").val(), &ParserError::EmptyThen);
        assert_eq!(
            self::error("IF 1 2 THEN END\n").val(),
            &ParserError::ExpectedRelop(Token::Numeral("2".into()))
        );
    }

    #[test]
    fn unimplemented_statements_warn() {
        let (result, diagnostics) = parse_str("CLEAR\nLIST\n\nRUN\n", 1 << 20);
        assert!(result.is_ok());

        let lines: Vec<_> = diagnostics.warnings().map(|report| report.line()).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn empty_lists() {
        assert_eq!(
            error("PRINT\n").val(),
            &ParserError::EmptyList(Keyword::Print)
        );
        assert_eq!(
            error("INPUT ' nothing\n").val(),
            &ParserError::EmptyList(Keyword::Input)
        );
        assert_eq!(
            error("PRINT 1,\n").val(),
            &ParserError::ExpectedExpr(Token::LineEnd)
        );
    }

    #[test]
    fn variable_rules() {
        assert_eq!(
            error("LET AB = 1\n").val(),
            &ParserError::InvalidVariable("AB".into())
        );
        assert_eq!(
            error("LET A 1\n").val(),
            &ParserError::MissingAssign(Token::Numeral("1".into()))
        );
        assert_eq!(
            error("INPUT A, 5\n").val(),
            &ParserError::ExpectedVariable(Token::Numeral("5".into()))
        );

        let program = program("LET B = 1\nLET A = 2\nLET B = 3\nINPUT C\n");
        assert_eq!(
            program.variables,
            vec![Var::new("B").unwrap(), Var::new("A").unwrap()]
        );
    }

    #[test]
    fn statement_shape() {
        assert_eq!(
            error("10 (1)\n").val(),
            &ParserError::ExpectedStatement(Token::OpenParen)
        );
        assert_eq!(
            error("END 5\n").val(),
            &ParserError::ExpectedLineEnd(Token::Numeral("5".into()))
        );
        assert_eq!(
            error("PRINT (1 + 2\n").val(),
            &ParserError::MissingCloseParen(Token::LineEnd)
        );
    }

    #[test]
    fn blank_and_comment_lines() {
        let program = program("\n' header\n10 PRINT \"A\"\n\n20 END ' done\n");
        let lines: Vec<_> = program.lines.iter().map(|line| line.source_line).collect();
        assert_eq!(lines, vec![3, 5]);
    }

    #[test]
    fn arena_exhaustion_is_fatal() {
        let (result, _) = parse_str("LET A = 1 + 2 + 3 + 4 + 5\n", 64);
        match result {
            Err(error) => assert!(matches!(error.val(), ParserError::Arena(_))),
            Ok(_) => panic!("arena should have been exhausted"),
        }
    }

    #[test]
    fn nesting_is_bounded() {
        let depth = MAX_NESTING as usize;

        let fits = format!("PRINT {}1{}\n", "(".repeat(depth), ")".repeat(depth));
        program(&fits);

        let parens = format!("PRINT {}1{}\n", "(".repeat(depth + 1), ")".repeat(depth + 1));
        assert_eq!(error(&parens).val(), &ParserError::TooDeep);

        let ifs = format!("{}END\n", "IF 1 = 1 THEN ".repeat(depth + 1));
        assert_eq!(error(&ifs).val(), &ParserError::TooDeep);

        let deep = format!("PRINT {}1{}\n", "(".repeat(100_000), ")".repeat(100_000));
        assert_eq!(error(&deep).val(), &ParserError::TooDeep);
    }
}
