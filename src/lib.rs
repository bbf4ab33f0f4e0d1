/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The module resolver loads every file reachable through `use` directives
/// and merges them into a single program with mangled names.
pub mod module;

/// The type checker verifies the soundness of the types of a merged program.
pub mod type_checker;

/// The code generators lower a checked program into C or x86-64 assembly.
pub mod codegen;

pub mod ast;
pub mod driver;
pub mod error;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt {
        pub mod tree;
    }
    #[cfg(test)]
    pub(crate) mod test_utils;
}

pub use driver::{compile, compile_with, Output};
pub use error::{Error, Result};
