use crate::{codegen, module, parser, token::Spanned, type_checker};

/// Any failure of the compilation pipeline. The first error aborts the
/// whole compilation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}:{error:#}")]
    Syntax {
        path: String,
        error: Spanned<parser::Error>,
    },
    #[error(transparent)]
    Module(#[from] module::Error),
    #[error("{0:#}")]
    Type(Spanned<type_checker::Error>),
    #[error("{0:#}")]
    Generation(Spanned<codegen::Error>),
}

// Not `#[from]`: the wrapped errors are already rendered in full by the
// `Display` impls above, and exposing them as sources would print them twice
// in error chains.
impl From<Spanned<type_checker::Error>> for Error {
    fn from(error: Spanned<type_checker::Error>) -> Self {
        Error::Type(error)
    }
}

impl From<Spanned<codegen::Error>> for Error {
    fn from(error: Spanned<codegen::Error>) -> Self {
        Error::Generation(error)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
