// Intvboot Config API
// Keyboard binding file parsing and binding table compilation

pub mod compiler;
pub mod parser;

pub use compiler::{compile, Binding, BindingCompiler, BindingError, EventBindingTable};
pub use parser::{parse_line, tokenize, Command, DslErrorKind, Keyword, MAX_FIELD_LEN};
