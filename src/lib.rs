//! Compilador para un dialecto de Tiny BASIC.
//!
//! # Front end
//! Todo programa proviene de un único archivo fuente. Este se descompone
//! primero en tokens en [`lex`]. El flujo de tokens se organiza en un
//! árbol sintáctico alojado en arena por descenso recursivo en [`parse`],
//! que además aplica las reglas estáticas del lenguaje. [`semantic`] recorre
//! el árbol una vez y lo reduce a la máquina de pila descrita en [`ir`],
//! con lo cual concluyen las fases independientes del objetivo.
//!
//! # Back end
//! A partir de aquí el compilador deja de ser agnóstico del sistema objetivo.
//! El ensamblador se emite a través de [`target`], donde cada arquitectura
//! define sus propios frames, convenciones de llamada y selección de instrucciones.
//! El ensamblado y enlazado del ejecutable final se delegan a las
//! herramientas del sistema anfitrión en [`link`].
//!
//! # Diagnósticos
//! Las condiciones recuperables se acumulan en un [`error::Diagnostics`]
//! que recorre todas las fases. El primer error fatal termina la compilación
//! y se retorna junto a la línea de código fuente donde se detectó.

#[macro_use]
mod macros;

pub mod arena;
pub mod ast;
pub mod error;
pub mod ir;
pub mod lex;
pub mod link;
pub mod parse;
pub mod semantic;
pub mod source;

mod arch;
mod codegen;

use thiserror::Error;

use crate::{
    arena::DEFAULT_ARENA_CAPACITY,
    error::Diagnostics,
    lex::LexerError,
    parse::ParserError,
    semantic::SemanticError,
    source::{Located, Source},
};

/// Emisión de código.
///
/// Reexporta suficientes elementos internos de generación de código
/// para traducir IR a la arquitectura nativa.
pub mod target {
    pub use crate::codegen::{emit, label_symbol};
}

/// Parámetros de compilación.
#[derive(Clone, Debug)]
pub struct Options {
    /// Presupuesto en bytes de la arena del árbol sintáctico.
    pub arena_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            arena_capacity: DEFAULT_ARENA_CAPACITY,
        }
    }
}

/// Error fatal de cualquier fase del front end.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

pub type Compile<T> = Result<T, Located<CompileError>>;

/// Analiza léxica y sintácticamente un programa.
pub fn parse_source(
    source: &Source,
    options: &Options,
    diagnostics: &mut Diagnostics,
) -> Compile<ast::Program> {
    let tokens = lex::tokenize(source.text(), diagnostics).map_err(widen)?;
    parse::parse(tokens, options.arena_capacity, diagnostics).map_err(widen)
}

/// Ejecuta todas las fases independientes del objetivo.
pub fn compile(
    source: &Source,
    options: &Options,
    diagnostics: &mut Diagnostics,
) -> Compile<ir::Program> {
    parse_source(source, options, diagnostics)?
        .lower()
        .map_err(widen)
}

fn widen<E: Into<CompileError>>(error: Located<E>) -> Located<CompileError> {
    error.map(Into::into)
}
