//! Diagnósticos en dos niveles.
//!
//! Las advertencias son recuperables: se registran en un [`Diagnostics`]
//! que se pasa al lexer y al parser, y la compilación continúa. Los
//! errores fatales viajan como `Err(Located<E>)` y terminan la compilación
//! en el punto donde se detectan; el driver registra el que recibe para
//! que ambos niveles se muestren en conjunto.

use crate::source::{Located, Source};
use std::{
    error::Error,
    fmt::{self, Display},
};

/// Gravedad de un reporte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => fmt.write_str("warning"),
            Severity::Error => fmt.write_str("error"),
        }
    }
}

/// Un diagnóstico individual, a mostrarse después.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    severity: Severity,
    line: u32,
    message: String,
}

impl Report {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Colector de errores de una compilación.
#[derive(Default, Debug)]
pub struct Diagnostics {
    reports: Vec<Report>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Registra una condición recuperable.
    pub fn warn<E: Error>(&mut self, warning: Located<E>) {
        self.push(Severity::Warning, warning);
    }

    /// Registra el error que abortó la compilación.
    pub fn fatal<E: Error>(&mut self, error: Located<E>) {
        self.push(Severity::Error, error);
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Report> {
        self.reports
            .iter()
            .filter(|report| report.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.reports
            .iter()
            .any(|report| report.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Asocia los reportes con el programa al que se refieren, para mostrarlos.
    pub fn render<'a>(&'a self, source: &'a Source) -> Rendered<'a> {
        Rendered {
            diagnostics: self,
            source,
        }
    }

    fn push<E: Error>(&mut self, severity: Severity, error: Located<E>) {
        let (line, error) = error.split();
        self.reports.push(Report {
            severity,
            line,
            message: error.to_string(),
        });
    }
}

/// Vista imprimible de un [`Diagnostics`] contra su código fuente.
pub struct Rendered<'a> {
    diagnostics: &'a Diagnostics,
    source: &'a Source,
}

impl Display for Rendered<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Rendered {
            diagnostics,
            source,
        } = self;

        for report in &diagnostics.reports {
            writeln!(fmt, "{}: {}", report.severity, report.message)?;
            writeln!(fmt, " --> {}:{}", source.name(), report.line)?;

            let digits = report.line.to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            source.with_line(report.line, |line| {
                writeln!(fmt, "{:>digits$} | {}", report.line, line, digits = digits)
            })?;

            writeln!(fmt, "{:digits$} |", "", digits = digits)?;
            writeln!(fmt)?;
        }

        let errors = diagnostics
            .reports
            .iter()
            .filter(|report| report.severity == Severity::Error)
            .count();

        match errors {
            0 => Ok(()),
            1 => writeln!(fmt, "Build failed with 1 error"),
            _ => writeln!(fmt, "Build failed with {} errors", errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("something odd")]
    struct Odd;

    #[test]
    fn renders_offending_line() {
        let source = Source::new("prog.bas", "10 LET A=1\n20 PRINT A\n");
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(Located::at(Odd, 2));

        let rendered = diagnostics.render(&source).to_string();
        assert_eq!(
            rendered,
            "warning: something odd\n --> prog.bas:2\n  |\n2 | 20 PRINT A\n  |\n\n"
        );
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn fatal_adds_summary() {
        let source = Source::new("prog.bas", "10 GOTO 99\n");
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(Located::at(Odd, 1));
        diagnostics.fatal(Located::at(Odd, 1));

        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.warnings().count(), 1);

        let rendered = diagnostics.render(&source).to_string();
        assert!(rendered.starts_with("warning: something odd"));
        assert!(rendered.contains("error: something odd"));
        assert!(rendered.ends_with("Build failed with 1 error\n"));
    }
}
