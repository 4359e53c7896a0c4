//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto fuente en
//! tokens, cada uno asociado a la línea donde inició. Los espacios en blanco
//! y los comentarios se descartan. Los terminadores de línea son significativos
//! en este lenguaje y se emiten como [`Token::LineEnd`]: uno por cada salto
//! de línea físico, más uno al final siempre que se haya producido algún token.
//!
//! # Contenido de un token
//! Las palabras clave y la puntuación no incluyen lexemas. Los identificadores
//! incluyen su texto original, los numerales sus dígitos tal cual (la conversión
//! se difiere hasta generación de código) y las cadenas su contenido decodificado.
//!
//! # Reglas importantes del lenguaje
//! - Las palabras clave son mayúsculas y se distinguen de forma case-sensitive;
//!   cualquier otra secuencia alfabética es un identificador.
//! - Los comentarios van desde `'` hasta el final de la línea.
//! - Las cadenas se delimitan con `"` y aceptan `\n` y `\t`; una barra
//!   invertida antes de cualquier otro carácter produce ese mismo carácter.
//!
//! # Errores
//! Los caracteres inesperados se reportan como advertencias y se omiten. El
//! único error léxico fatal es una cadena literal que nunca termina.

use crate::{
    error::Diagnostics,
    source::Located,
};
use std::{
    fmt::{self, Display},
    iter::Peekable,
    mem,
    str::{Chars, FromStr},
};

use thiserror::Error;

/// Error léxico fatal.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexerError {
    /// Se alcanzó el final de la entrada dentro de una cadena literal.
    #[error("Unterminated string literal")]
    UnterminatedString,
}

/// Condición léxica recuperable.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexerWarning {
    /// Carácter desconocido o inesperado en la entrada, se omite.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Palabra clave.
    Keyword(Keyword),

    /// Identificador. Solo una letra mayúscula es una variable válida, pero
    /// eso lo decide el parser.
    Id(String),

    /// Dígitos de una constante entera.
    Numeral(String),

    /// Cadena literal decodificada.
    Str(String),

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `>`
    Greater,

    /// `<`
    Less,

    /// `=`
    Equal,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `,`
    Comma,

    /// Fin de una línea de código fuente.
    LineEnd,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            Id(id) => write!(fmt, "identifier `{}`", id),
            Numeral(digits) => write!(fmt, "literal `{}`", digits),
            Str(string) => write!(fmt, "string {:?}", string),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            Greater => fmt.write_str("`>`"),
            Less => fmt.write_str("`<`"),
            Equal => fmt.write_str("`=`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            Comma => fmt.write_str("`,`"),
            LineEnd => fmt.write_str("end of line"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    Print,
    If,
    Then,
    Goto,
    Input,
    Let,
    Gosub,
    Return,
    Clear,
    List,
    Run,
    End,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("PRINT",  Keyword::Print),
    ("IF",     Keyword::If),
    ("THEN",   Keyword::Then),
    ("GOTO",   Keyword::Goto),
    ("INPUT",  Keyword::Input),
    ("LET",    Keyword::Let),
    ("GOSUB",  Keyword::Gosub),
    ("RETURN", Keyword::Return),
    ("CLEAR",  Keyword::Clear),
    ("LIST",   Keyword::List),
    ("RUN",    Keyword::Run),
    ("END",    Keyword::End),
];

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == *self)
            .map(|&(name, _)| name)
            .unwrap_or("?");

        fmt.write_str(name)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados del lexer.
///
/// La salida del lexer, así como su siguiente estado, se define por la
/// combinación de su estado actual y el siguiente carácter de entrada.
pub struct Lexer<'a, 'd> {
    source: Peekable<Chars<'a>>,
    state: State,
    line: u32,
    start: u32,
    emitted: bool,
    finished: bool,
    diagnostics: &'d mut Diagnostics,
}

/// Estados posibles del lexer.
enum State {
    /// Antes del inicio de un token.
    Start,

    /// Siempre emite el token incluido, luego regresa a [`State::Start`].
    /// El carácter que completó el token ya fue consumido.
    Complete(Token),

    /// Comentario de línea, termina justo antes de `'\n'`.
    Comment,

    /// Secuencia de dígitos.
    Numeral(String),

    /// Secuencia de letras, ya sea palabra clave o identificador.
    Word(String),

    /// Dentro de una cadena literal.
    Str(String),

    /// Justo después de una barra invertida dentro de una cadena literal.
    Escape(String),
}

impl<'a, 'd> Lexer<'a, 'd> {
    /// Crea un lexer en su estado inicial. Las advertencias van a `diagnostics`.
    pub fn new(source: &'a str, diagnostics: &'d mut Diagnostics) -> Self {
        Lexer {
            source: source.chars().peekable(),
            state: State::Start,
            line: 1,
            start: 1,
            emitted: false,
            finished: false,
            diagnostics,
        }
    }

    /// Reduce la entrada completa a una secuencia de tokens, o al primer error
    /// fatal encontrado.
    pub fn try_exhaustive(self) -> Result<Vec<Located<Token>>, Located<LexerError>> {
        self.collect()
    }

    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use {State::*, Token::*};

        loop {
            let next_char = self.source.peek().copied();

            // El inicio del token sigue al cursor hasta una frontera de token
            if let Start = self.state {
                self.start = self.line;
            }

            match (&mut self.state, next_char) {
                (Start, None) => return Ok(None),

                // Tokens triviales
                (Start, Some('\n')) => self.state = Complete(LineEnd),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('>')) => self.state = Complete(Greater),
                (Start, Some('<')) => self.state = Complete(Less),
                (Start, Some('=')) => self.state = Complete(Equal),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('/')) => self.state = Complete(Slash),
                (Start, Some(',')) => self.state = Complete(Comma),

                (Start, Some('\'')) => self.state = Comment,
                (Start, Some('"')) => self.state = State::Str(String::new()),
                (Start, Some(c)) if c.is_ascii_alphabetic() => self.state = Word(c.to_string()),
                (Start, Some(c)) if c.is_ascii_digit() => self.state = State::Numeral(c.to_string()),

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_whitespace() => (),
                (Start, Some(c)) => self
                    .diagnostics
                    .warn(Located::at(LexerWarning::BadChar(c), self.line)),

                // Emisión retardada, aquí no se consume nada
                (Complete(token), _) => break Ok(Some(mem::replace(token, LineEnd))),

                // El salto de línea que termina un comentario sigue siendo un token
                (Comment, Some('\n')) | (Comment, None) => {
                    self.state = Start;
                    continue;
                }
                (Comment, Some(_)) => (),

                (State::Numeral(digits), Some(c)) if c.is_ascii_digit() => digits.push(c),
                (State::Numeral(digits), _) => break Ok(Some(Token::Numeral(mem::take(digits)))),

                (Word(word), Some(c)) if c.is_ascii_alphabetic() => word.push(c),
                (Word(word), _) => {
                    break Ok(Some(match word.parse() {
                        Ok(keyword) => Token::Keyword(keyword),
                        Err(()) => Id(mem::take(word)),
                    }))
                }

                (State::Str(_) | Escape(_), None) => break Err(LexerError::UnterminatedString),

                (State::Str(text), Some('"')) => {
                    let text = mem::take(text);
                    self.state = Complete(Token::Str(text));
                }
                (State::Str(text), Some('\\')) => {
                    let text = mem::take(text);
                    self.state = Escape(text);
                }
                (State::Str(text), Some(c)) => text.push(c),

                (Escape(text), Some(c)) => {
                    let mut text = mem::take(text);
                    text.push(match c {
                        'n' => '\n',
                        't' => '\t',
                        c => c,
                    });

                    self.state = State::Str(text);
                }
            }

            // Si no hubo un `continue` o `break` explícito, el carácter de
            // lookahead se consume aquí
            if let Some('\n') = self.source.next() {
                self.line += 1;
            }
        }
    }
}

impl Iterator for Lexer<'_, '_> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.lex() {
            Ok(Some(token)) => {
                self.state = State::Start;
                self.emitted = true;
                Some(Ok(Located::at(token, self.start)))
            }

            Ok(None) => {
                self.finished = true;
                if self.emitted {
                    Some(Ok(Located::at(Token::LineEnd, self.line)))
                } else {
                    None
                }
            }

            Err(error) => {
                self.finished = true;
                Some(Err(Located::at(error, self.start)))
            }
        }
    }
}

/// Punto de entrada para la fase léxica completa.
pub fn tokenize(
    source: &str,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Located<Token>>, Located<LexerError>> {
    Lexer::new(source, diagnostics).try_exhaustive()
}

/// Cursor hacia adelante sobre una secuencia de tokens, con lookahead acotado.
pub struct TokenStream {
    tokens: Vec<Located<Token>>,
    index: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Located<Token>>) -> Self {
        TokenStream { tokens, index: 0 }
    }

    /// Observa `offset` tokens más allá del cursor sin avanzar.
    pub fn peek(&self, offset: usize) -> Option<&Located<Token>> {
        self.tokens.get(self.index + offset)
    }

    /// Avanza, retornando el token actual.
    pub fn consume(&mut self) -> Option<Located<Token>> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }

        token
    }
}
