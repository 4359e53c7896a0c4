//! Texto fuente y rastreo de líneas.
//!
//! Cada token, error y advertencia que el compilador produce se asocia
//! a la línea (a partir de 1) del programa fuente donde se originó. Los
//! programas de este lenguaje están orientados a líneas, por lo cual un
//! número de línea basta para señalar la sentencia problemática.

use std::{
    fmt::{self, Display},
    io::{self, Read},
};

/// Un objeto cualquiera con una línea original asociada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<T> {
    line: u32,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la línea de origen, a partir de 1.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Descarta la línea y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone en línea y valor.
    pub fn split(self) -> (u32, T) {
        (self.line, self.value)
    }

    /// Construye a partir de un valor y una línea.
    pub fn at(value: T, line: u32) -> Self {
        Located { value, line }
    }

    /// Transforma el valor con la misma línea.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            line: self.line,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T: Display> Display for Located<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "line {}: {}", self.line, self.value)
    }
}

/// Un programa fuente con nombre.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    /// Construye a partir de un nombre de origen (usualmente una ruta) y el texto completo.
    pub fn new<N, T>(name: N, text: T) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Source {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Lee un programa completo desde un flujo de entrada.
    pub fn read<R, N>(mut reader: R, name: N) -> io::Result<Self>
    where
        R: Read,
        N: Into<String>,
    {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        Ok(Source::new(name, text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Invoca a `callback` con el texto de una línea, sin su terminador.
    /// Las líneas posteriores al final del programa se leen vacías.
    pub fn with_line<F, R>(&self, line: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let text = (line as usize)
            .checked_sub(1)
            .and_then(|index| self.text.lines().nth(index))
            .unwrap_or("");

        callback(text.trim_end_matches('\r'))
    }
}
