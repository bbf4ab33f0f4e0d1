use tracing::{debug, instrument};

use crate::{
    codegen::{self, Emit},
    module::{FsLoader, ModuleResolver, SourceLoader},
    type_checker, Result,
};

/// The text produced by a successful compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    /// Assembly or C source, depending on the requested [`Emit`].
    pub code: String,
    /// C prototypes of every function defined by the program.
    pub header: String,
}

/// Compiles the program rooted at `entry`, reading modules from the file
/// system.
pub fn compile(entry: &str, emit: Emit) -> Result<Output> {
    compile_with(FsLoader, entry, emit)
}

/// Compiles the program rooted at `entry`, reading modules through `loader`.
///
/// Stages run in order (resolve, check, entry point, generate) and the first
/// failing stage aborts the compilation.
#[instrument(skip(loader))]
pub fn compile_with(loader: impl SourceLoader, entry: &str, emit: Emit) -> Result<Output> {
    let program = ModuleResolver::new(loader).load(entry)?;

    type_checker::check(&program)?;
    type_checker::check_entry_point(&program)?;
    debug!("program is well typed");

    let code = codegen::generate(&program, emit)?;
    let header = codegen::generate_header(&program);
    Ok(Output { code, header })
}
