macro_rules! emit {
    ($emitter:expr, $opcode:expr) => {
        writeln!($emitter.cx().text(), "\t{}", $opcode)
    };

    ($emitter:expr, $opcode:expr, $($format:tt)*) => {{
        write!($emitter.cx().text(), "\t{:8}", $opcode)?;
        writeln!($emitter.cx().text(), $($format)*)
    }};
}
