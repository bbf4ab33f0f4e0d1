use std::{
    collections::{HashMap, HashSet},
    fs, io,
    path::Path,
};

use tracing::{debug, instrument, trace};

use crate::{
    ast::{Block, Expr, ExprKind, FunctionDecl, Program, Stmt, StmtKind, TopLevel},
    parser,
    token::Token,
};

/// Where module sources come from.
pub trait SourceLoader {
    fn load(&self, path: &str) -> io::Result<String>;
}

/// Reads paths exactly as written. Relative paths are therefore resolved
/// against the working directory of the process, not against the file which
/// contains the `use` directive.
#[derive(Copy, Clone, Debug, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// Serves sources from memory, keyed by the exact path string.
#[derive(Clone, Debug, Default)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> MemoryLoader {
        MemoryLoader::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, src: impl Into<String>) {
        self.files.insert(path.into(), src.into());
    }

    #[must_use]
    pub fn with(mut self, path: impl Into<String>, src: impl Into<String>) -> MemoryLoader {
        self.insert(path, src);
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such module in memory"))
    }
}

impl<L: SourceLoader + ?Sized> SourceLoader for &L {
    fn load(&self, path: &str) -> io::Result<String> {
        (**self).load(path)
    }
}

/// Loads the entry file from the file system and merges every module it
/// (transitively) uses.
pub fn load(entry: &str) -> crate::Result<Program> {
    ModuleResolver::new(FsLoader).load(entry)
}

pub struct ModuleResolver<L> {
    loader: L,
    visited: HashSet<String>,
    tokens: Vec<Token>,
}

impl<L: SourceLoader> ModuleResolver<L> {
    pub fn new(loader: L) -> ModuleResolver<L> {
        ModuleResolver {
            loader,
            visited: HashSet::new(),
            tokens: Vec::with_capacity(crate::lexer::SUGGESTED_TOKENS_CAPACITY),
        }
    }

    #[instrument(skip(self))]
    pub fn load(mut self, entry: &str) -> crate::Result<Program> {
        let mut decls = Vec::new();
        self.load_recursive(entry, true, &mut decls)?;
        debug!(modules = self.visited.len(), decls = decls.len(), "resolved modules");
        Ok(Program { decls })
    }

    fn load_recursive(
        &mut self,
        path: &str,
        is_entry: bool,
        merged: &mut Vec<TopLevel>,
    ) -> crate::Result<()> {
        // A path is merged at most once, which also bounds cyclic graphs.
        if !self.visited.insert(path.to_owned()) {
            trace!(path, "module already loaded, skipping");
            return Ok(());
        }

        let src = self
            .loader
            .load(path)
            .map_err(|source| Error::from_io(path, source))?;

        self.tokens.clear();
        let program = parser::parse_program(&src, &mut self.tokens).map_err(|error| {
            crate::Error::Syntax {
                path: path.to_owned(),
                error,
            }
        })?;

        let module = module_name(path);
        debug!(path, module, decls = program.decls.len(), "loaded module");

        let locals: HashSet<String> = program
            .functions()
            .filter(|function| !function.is_extern)
            .map(|function| function.name.clone())
            .collect();

        for decl in program.decls {
            match decl {
                TopLevel::Use(use_decl) => self.load_recursive(&use_decl.path, false, merged)?,
                TopLevel::Function(mut function) => {
                    if !is_entry && !function.is_extern {
                        mangle_function(&mut function, module, &locals);
                    }
                    merged.push(TopLevel::Function(function));
                }
                global @ TopLevel::Global(_) => merged.push(global),
            }
        }
        Ok(())
    }
}

/// The module name of a path is its file name without the extension.
pub fn module_name(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(path)
}

pub fn mangle(module: &str, name: &str) -> String {
    format!("{module}__{name}")
}

fn mangle_function(function: &mut FunctionDecl, module: &str, locals: &HashSet<String>) {
    trace!(module, function = %function.name, "mangling");
    function.name = mangle(module, &function.name);
    if let Some(body) = &mut function.body {
        Mangler { module, locals }.block(body);
    }
}

/// Rewrites unqualified calls to functions of the same module.
struct Mangler<'a> {
    module: &'a str,
    locals: &'a HashSet<String>,
}

impl Mangler<'_> {
    fn block(&self, block: &mut Block) {
        for stmt in &mut block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::VarDecl(decl) => {
                if let Some(initializer) = &mut decl.initializer {
                    self.expr(initializer);
                }
            }
            StmtKind::Assign { target, value } => {
                self.expr(target);
                self.expr(value);
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.expr(condition);
                self.block(then_block);
                if let Some(else_block) = else_block {
                    self.block(else_block);
                }
            }
            StmtKind::While { condition, body } => {
                self.expr(condition);
                self.block(body);
            }
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Block(block) => self.block(block),
        }
    }

    fn expr(&self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Literal(_) | ExprKind::String(_) | ExprKind::Variable(_) => {}
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Call {
                callee,
                module,
                args,
            } => {
                if module.is_none() && self.locals.contains(callee.as_str()) {
                    *callee = mangle(self.module, callee);
                }
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Index { base, index } => {
                self.expr(base);
                self.expr(index);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("module `{path}` not found")]
    NotFound { path: String },
    #[error("failed to read module `{path}`")]
    Unreadable {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    fn from_io(path: &str, source: io::Error) -> Error {
        let path = path.to_owned();
        if source.kind() == io::ErrorKind::NotFound {
            Error::NotFound { path }
        } else {
            Error::Unreadable { path, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::util::fmt::tree;

    fn resolve(loader: &MemoryLoader, entry: &str) -> crate::Result<Program> {
        ModuleResolver::new(loader).load(entry)
    }

    fn names(program: &Program) -> Vec<&str> {
        program.functions().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_mangles_non_entry_functions_and_their_local_calls() {
        let loader = MemoryLoader::new()
            .with(
                "main.az",
                indoc! {r#"
                    !use "m.az";
                    int main() { return f@m(); }
                "#},
            )
            .with(
                "m.az",
                indoc! {"
                    extern int abs(int x);
                    int helper() { return 1; }
                    int f() {
                        if (true) { return helper() + abs(helper()); }
                        return f@m();
                    }
                "},
            );

        let program = resolve(&loader, "main.az").unwrap();
        assert_eq!(names(&program), ["abs", "m__helper", "m__f", "main"]);
        assert_eq!(
            tree::print_program_string(&program),
            indoc! {"
                extern int abs(int x)
                function int m__helper()
                  return
                    int 1
                function int m__f()
                  if
                    bool true
                    return
                      binary +
                        call m__helper
                        call abs
                          call m__helper
                  return
                    call f@m
                function int main()
                  return
                    call f@m
            "}
        );
    }

    #[test]
    fn test_cyclic_modules_are_merged_once() {
        let loader = MemoryLoader::new()
            .with("main.az", "!use \"a.az\";\nint main() { return 0; }")
            .with("a.az", "!use \"b.az\";\nint fa() { return fb@b(); }")
            .with("b.az", "!use \"a.az\";\n!use \"b.az\";\nint fb() { return 1; }");

        let program = resolve(&loader, "main.az").unwrap();
        assert_eq!(names(&program), ["b__fb", "a__fa", "main"]);
        assert!(program.decls.iter().all(|decl| !matches!(decl, TopLevel::Use(_))));
    }

    #[test]
    fn test_module_name_is_file_stem() {
        assert_eq!(module_name("lib/strings.az"), "strings");
        assert_eq!(module_name("/abs/path/io.az"), "io");
        assert_eq!(module_name("noext"), "noext");

        let loader = MemoryLoader::new()
            .with("main.az", "!use \"lib/util.az\";\nint main() { return 0; }")
            .with("lib/util.az", "int one() { return 1; }");
        let program = resolve(&loader, "main.az").unwrap();
        assert_eq!(names(&program), ["util__one", "main"]);
    }

    #[test]
    fn test_globals_are_kept_unmangled() {
        let loader = MemoryLoader::new()
            .with("main.az", "!use \"g.az\";\nint main() { return limit; }")
            .with("g.az", "int limit = 10;");
        let program = resolve(&loader, "main.az").unwrap();
        assert_eq!(program.globals().map(|g| g.name.as_str()).collect::<Vec<_>>(), ["limit"]);
    }

    #[test]
    fn test_missing_module() {
        let loader = MemoryLoader::new().with("main.az", "!use \"gone.az\";");
        let err = resolve(&loader, "main.az").unwrap_err();
        assert_eq!(err.to_string(), "module `gone.az` not found");
    }

    #[test]
    fn test_syntax_error_names_the_file() {
        let loader = MemoryLoader::new()
            .with("main.az", "!use \"bad.az\";")
            .with("bad.az", "int f() {\n    return 1\n}");
        let err = resolve(&loader, "main.az").unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad.az:3:1: expected token Semicolon, but got RBrace"
        );
    }

    #[test]
    fn test_fs_loader_reads_absolute_use_paths() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib.az");
        std::fs::write(&lib, "int one() { return 1; }").unwrap();
        let main = dir.path().join("main.az");
        std::fs::write(
            &main,
            format!("!use {:?};\nint main() {{ return one@lib(); }}", lib.to_str().unwrap()),
        )
        .unwrap();

        let program = load(main.to_str().unwrap()).unwrap();
        assert_eq!(names(&program), ["lib__one", "main"]);
    }

    #[test]
    fn test_use_paths_are_relative_to_the_working_directory() {
        // The module sits next to the entry file, but is looked up in the
        // working directory of the process.
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sibling_of_entry.az"), "int one() { return 1; }").unwrap();
        let main = dir.path().join("main.az");
        std::fs::write(&main, "!use \"sibling_of_entry.az\";\nint main() { return 0; }").unwrap();

        let err = load(main.to_str().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "module `sibling_of_entry.az` not found");
    }
}
