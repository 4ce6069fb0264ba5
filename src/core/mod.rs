//! Script pipeline: types, lexing, parsing, the command registry and the
//! template engine.

pub mod ast;
pub mod lexer;
pub mod log;
pub mod parser;
pub mod registry;
pub mod settings;
pub mod template;
pub mod types;
