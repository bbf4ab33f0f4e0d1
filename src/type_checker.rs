use std::collections::HashMap;

use tracing::{debug, instrument, trace};

use crate::{
    ast::{
        BinaryOperator, Block, Expr, ExprKind, FunctionDecl, Literal, Program, Stmt, StmtKind,
        UnaryOperator, VarDecl,
    },
    module::mangle,
    token::{Pos, Spanned},
    types::{well_known, BaseType, Type},
};

pub type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Checks the types of the whole (merged) program, failing on the first
/// violation.
#[instrument(skip_all)]
pub fn check(program: &Program) -> Result<()> {
    Checker::new().check_program(program)
}

/// Checks that the program defines a `main` function which returns `int`.
pub fn check_entry_point(program: &Program) -> Result<()> {
    let main = program
        .functions()
        .find(|function| function.name == well_known::MAIN && !function.is_extern);
    let Some(main) = main else {
        return Err(Pos::new(1, 1).wrap(Error::MissingMain));
    };
    if main.return_ty != Type::INT {
        return Err(main.pos.wrap(Error::MainReturnType {
            actual: main.return_ty,
        }));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Signature {
    return_ty: Type,
    params: Vec<Type>,
    is_extern: bool,
}

#[derive(Clone, Debug)]
enum Symbol {
    Variable(Type),
    Function(Signature),
}

/// The stack of lexical scopes, innermost last.
#[derive(Default)]
struct Scopes {
    frames: Vec<HashMap<String, Symbol>>,
}

impl Scopes {
    fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    /// Declares in the innermost scope. Returns false if the name is already
    /// declared there.
    fn declare(&mut self, name: &str, symbol: Symbol) -> bool {
        let frame = self.frames.last_mut().expect("at least the global scope");
        if frame.contains_key(name) {
            return false;
        }
        frame.insert(name.to_owned(), symbol);
        true
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    fn lookup_innermost(&self, name: &str) -> Option<&Symbol> {
        self.frames.last().and_then(|frame| frame.get(name))
    }
}

struct Checker {
    scopes: Scopes,
    return_ty: Type,
    /// Whether any `return` was seen in the current function. This is not a
    /// reachability analysis.
    found_return: bool,
}

impl Checker {
    fn new() -> Checker {
        let mut scopes = Scopes::default();
        scopes.push();
        Checker {
            scopes,
            return_ty: Type::NORE,
            found_return: false,
        }
    }

    fn check_program(mut self, program: &Program) -> Result<()> {
        for function in program.functions() {
            self.declare_function(function)?;
        }
        for global in program.globals() {
            self.var_decl(global)?;
        }
        for function in program.functions() {
            if let Some(body) = &function.body {
                self.function(function, body)?;
            }
        }
        debug!(
            functions = program.functions().count(),
            globals = program.globals().count(),
            "program is well typed"
        );
        Ok(())
    }

    fn declare_function(&mut self, function: &FunctionDecl) -> Result<()> {
        for param in &function.params {
            if param.ty.base == BaseType::Nore {
                return Err(function.pos.wrap(Error::NoreVariable {
                    name: param.name.clone(),
                    ty: param.ty,
                }));
            }
        }
        let signature = Signature {
            return_ty: function.return_ty,
            params: function.param_types(),
            is_extern: function.is_extern,
        };

        // The same extern may be imported by several modules.
        if let Some(Symbol::Function(other)) = self.scopes.lookup_innermost(&function.name) {
            if other.is_extern && *other == signature {
                return Ok(());
            }
        }
        if !self
            .scopes
            .declare(&function.name, Symbol::Function(signature))
        {
            return Err(function.pos.wrap(Error::Redeclared {
                name: function.name.clone(),
            }));
        }
        Ok(())
    }

    fn function(&mut self, function: &FunctionDecl, body: &Block) -> Result<()> {
        trace!(function = %function.name, "checking function");
        self.scopes.push();
        for param in &function.params {
            if !self.scopes.declare(&param.name, Symbol::Variable(param.ty)) {
                return Err(function.pos.wrap(Error::Redeclared {
                    name: param.name.clone(),
                }));
            }
        }

        self.return_ty = function.return_ty;
        self.found_return = false;
        self.block(body)?;
        self.scopes.pop();

        if !self.return_ty.is_nore() && !self.found_return {
            return Err(function.pos.wrap(Error::MissingReturn {
                name: function.name.clone(),
            }));
        }
        Ok(())
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        self.scopes.push();
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::VarDecl(decl) => self.var_decl(decl),
            StmtKind::Assign { target, value } => self.assign(target, value),
            StmtKind::Return(value) => self.return_stmt(stmt.pos, value.as_ref()),
            StmtKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.condition(condition)?;
                self.block(then_block)?;
                if let Some(else_block) = else_block {
                    self.block(else_block)?;
                }
                Ok(())
            }
            StmtKind::While { condition, body } => {
                self.condition(condition)?;
                self.block(body)
            }
            StmtKind::Expr(expr) => self.expr(expr).map(drop),
            StmtKind::Block(block) => self.block(block),
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) -> Result<()> {
        if decl.ty.base == BaseType::Nore {
            return Err(decl.pos.wrap(Error::NoreVariable {
                name: decl.name.clone(),
                ty: decl.ty,
            }));
        }

        if decl.is_array() {
            if decl.ty != Type::CHAR.array() {
                return Err(decl.pos.wrap(Error::UnsupportedArray { ty: decl.ty }));
            }
            if decl.initializer.is_some() {
                return Err(decl.pos.wrap(Error::ArrayInitializer {
                    name: decl.name.clone(),
                }));
            }
        } else {
            let Some(initializer) = &decl.initializer else {
                return Err(decl.pos.wrap(Error::MissingInitializer {
                    name: decl.name.clone(),
                }));
            };
            let actual = self.expr(initializer)?;
            expect_compatible(initializer, actual, decl.ty)?;
        }

        if !self.scopes.declare(&decl.name, Symbol::Variable(decl.ty)) {
            return Err(decl.pos.wrap(Error::Redeclared {
                name: decl.name.clone(),
            }));
        }
        Ok(())
    }

    fn assign(&self, target: &Expr, value: &Expr) -> Result<()> {
        if !matches!(target.kind, ExprKind::Variable(_) | ExprKind::Index { .. }) {
            return Err(target.pos.wrap(Error::InvalidAssignTarget));
        }
        let target_ty = self.expr(target)?;
        if target_ty.is_array {
            return Err(target.pos.wrap(Error::InvalidAssignTarget));
        }
        let value_ty = self.expr(value)?;
        expect_compatible(value, value_ty, target_ty)
    }

    fn return_stmt(&mut self, pos: Pos, value: Option<&Expr>) -> Result<()> {
        self.found_return = true;
        match (value, self.return_ty.is_nore()) {
            (Some(_), true) => Err(pos.wrap(Error::ValueInNoreReturn)),
            (None, false) => Err(pos.wrap(Error::MissingReturnValue {
                expected: self.return_ty,
            })),
            (Some(value), false) => {
                let actual = self.expr(value)?;
                expect_compatible(value, actual, self.return_ty)
            }
            (None, true) => Ok(()),
        }
    }

    fn condition(&self, condition: &Expr) -> Result<()> {
        let actual = self.expr(condition)?;
        if actual != Type::BOOL {
            return Err(condition.pos.wrap(Error::NonBoolCondition { actual }));
        }
        Ok(())
    }

    fn expr(&self, expr: &Expr) -> Result<Type> {
        let pos = expr.pos;
        let ty = match &expr.kind {
            ExprKind::Literal(Literal::Int(_)) => Type::INT,
            ExprKind::Literal(Literal::Bool(_)) => Type::BOOL,
            ExprKind::Literal(Literal::Char(_)) => Type::CHAR,
            ExprKind::String(_) => Type::STRING,
            ExprKind::Variable(name) => match self.scopes.lookup(name) {
                Some(Symbol::Variable(ty)) => *ty,
                Some(Symbol::Function(_)) => {
                    return Err(pos.wrap(Error::NotAVariable { name: name.clone() }));
                }
                None => return Err(pos.wrap(Error::Undeclared { name: name.clone() })),
            },
            ExprKind::Unary {
                op: UnaryOperator::Neg,
                operand,
            } => {
                let ty = self.expr(operand)?;
                if ty != Type::INT {
                    return Err(pos.wrap(Error::InvalidNegation { ty }));
                }
                Type::INT
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.expr(lhs)?;
                let rhs_ty = self.expr(rhs)?;
                let invalid = || {
                    pos.wrap(Error::InvalidOperands {
                        op: *op,
                        lhs: lhs_ty,
                        rhs: rhs_ty,
                    })
                };
                // `nore` has no value to compare, even against itself.
                if lhs_ty.is_nore()
                    || rhs_ty.is_nore()
                    || !lhs_ty.is_mutually_compatible(rhs_ty)
                {
                    return Err(invalid());
                }
                if op.is_arithmetic() {
                    let is_numeric_base = matches!(lhs_ty.base, BaseType::Int | BaseType::Char);
                    if !lhs_ty.is_scalar() || !is_numeric_base {
                        return Err(invalid());
                    }
                    Type::INT
                } else {
                    Type::BOOL
                }
            }
            ExprKind::Call {
                callee,
                module,
                args,
            } => self.call(pos, callee, module.as_deref(), args)?,
            ExprKind::Index { base, index } => {
                let base_ty = self.expr(base)?;
                if !base_ty.is_indexable() {
                    return Err(base.pos.wrap(Error::NotIndexable { ty: base_ty }));
                }
                let index_ty = self.expr(index)?;
                if index_ty != Type::INT {
                    return Err(index.pos.wrap(Error::NonIntIndex { actual: index_ty }));
                }
                base_ty.element()
            }
        };
        Ok(ty)
    }

    fn call(&self, pos: Pos, callee: &str, module: Option<&str>, args: &[Expr]) -> Result<Type> {
        let name = match module {
            Some(module) => mangle(module, callee),
            None => callee.to_owned(),
        };

        let signature = match self.scopes.lookup(&name) {
            Some(Symbol::Function(signature)) => signature,
            Some(Symbol::Variable(_)) => return Err(pos.wrap(Error::NotAFunction { name })),
            None if is_print(callee, module) => return self.print(pos, args),
            None => return Err(pos.wrap(Error::UndeclaredFunction { name })),
        };

        if args.len() != signature.params.len() {
            return Err(pos.wrap(Error::Arity {
                name,
                expected: signature.params.len(),
                actual: args.len(),
            }));
        }
        for (position, (arg, &param)) in args.iter().zip(&signature.params).enumerate() {
            let actual = self.expr(arg)?;
            if !actual.is_passable_to(param) {
                return Err(arg.pos.wrap(Error::ArgumentMismatch {
                    name,
                    position: position + 1,
                    expected: param,
                    actual,
                }));
            }
            check_char_range(arg, param)?;
        }
        Ok(signature.return_ty)
    }

    fn print(&self, pos: Pos, args: &[Expr]) -> Result<Type> {
        let [arg] = args else {
            return Err(pos.wrap(Error::PrintArity { actual: args.len() }));
        };
        let ty = self.expr(arg)?;
        if !is_printable(ty) {
            return Err(arg.pos.wrap(Error::NotPrintable { ty }));
        }
        Ok(Type::NORE)
    }
}

pub fn is_print(callee: &str, module: Option<&str>) -> bool {
    module == Some(well_known::PRINT_MODULE) && callee == well_known::PRINT_FUNCTION
}

pub fn is_printable(ty: Type) -> bool {
    ty.is_string() || (ty.is_scalar() && ty.base != BaseType::Nore)
}

fn expect_compatible(value: &Expr, actual: Type, expected: Type) -> Result<()> {
    if !actual.is_compatible_with(expected) {
        return Err(value.pos.wrap(Error::Mismatch { expected, actual }));
    }
    check_char_range(value, expected)
}

/// An integer literal stored into a `char` must fit in ASCII. Other integer
/// expressions are not checked.
fn check_char_range(value: &Expr, target: Type) -> Result<()> {
    if target != Type::CHAR {
        return Ok(());
    }
    match int_literal(value) {
        Some(literal) if !(0..=127).contains(&literal) => {
            Err(value.pos.wrap(Error::CharOutOfRange { value: literal }))
        }
        _ => Ok(()),
    }
}

/// Folds an integer literal, possibly negated.
fn int_literal(expr: &Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::Literal(Literal::Int(value)) => Some(*value),
        ExprKind::Unary {
            op: UnaryOperator::Neg,
            operand,
        } => int_literal(operand).map(i64::wrapping_neg),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("undeclared identifier `{name}`")]
    Undeclared { name: String },
    #[error("undeclared function `{name}`")]
    UndeclaredFunction { name: String },
    #[error("`{name}` is already declared in this scope")]
    Redeclared { name: String },
    #[error("`{name}` is a function, not a variable")]
    NotAVariable { name: String },
    #[error("`{name}` is not a function")]
    NotAFunction { name: String },
    #[error("mismatched types: expected `{expected}`, found `{actual}`")]
    Mismatch { expected: Type, actual: Type },
    #[error("function `{name}` expects {expected} argument(s), found {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("argument {position} of `{name}` expects `{expected}`, found `{actual}`")]
    ArgumentMismatch {
        name: String,
        position: usize,
        expected: Type,
        actual: Type,
    },
    #[error("cannot apply `{op}` to `{lhs}` and `{rhs}`")]
    InvalidOperands {
        op: BinaryOperator,
        lhs: Type,
        rhs: Type,
    },
    #[error("cannot negate `{ty}`")]
    InvalidNegation { ty: Type },
    #[error("condition must be `bool`, found `{actual}`")]
    NonBoolCondition { actual: Type },
    #[error("cannot index into a value of type `{ty}`")]
    NotIndexable { ty: Type },
    #[error("index must be `int`, found `{actual}`")]
    NonIntIndex { actual: Type },
    #[error("only `char` arrays are supported, found `{ty}`")]
    UnsupportedArray { ty: Type },
    #[error("array `{name}` cannot have an initializer")]
    ArrayInitializer { name: String },
    #[error("variable `{name}` must be initialized")]
    MissingInitializer { name: String },
    #[error("`{name}` cannot have type `{ty}`")]
    NoreVariable { name: String, ty: Type },
    #[error("character literal value {value} is out of [0, 127]")]
    CharOutOfRange { value: i64 },
    #[error("invalid assignment target")]
    InvalidAssignTarget,
    #[error("nore function cannot return a value")]
    ValueInNoreReturn,
    #[error("expected a return value of type `{expected}`")]
    MissingReturnValue { expected: Type },
    #[error("function `{name}` must return a value")]
    MissingReturn { name: String },
    #[error("`out@io` takes exactly one argument, found {actual}")]
    PrintArity { actual: usize },
    #[error("cannot print a value of type `{ty}`")]
    NotPrintable { ty: Type },
    #[error("no `main` function found")]
    MissingMain,
    #[error("`main` must return `int`, found `{actual}`")]
    MainReturnType { actual: Type },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser, util::test_utils::tree_tests};

    fn entry_point(src: &str) -> std::result::Result<(), String> {
        let program = parser::parse_program(src, &mut Vec::new()).unwrap();
        check_entry_point(&program).map_err(|e| format!("{e:#}"))
    }

    #[test]
    fn test_entry_point() {
        assert_eq!(entry_point("int main() { return 0; }"), Ok(()));
        assert_eq!(
            entry_point("int start() { return 0; }"),
            Err("1:1: no `main` function found".into())
        );
        assert_eq!(
            entry_point("extern int main();"),
            Err("1:1: no `main` function found".into())
        );
        assert_eq!(
            entry_point("int x = 1;\nnore main() { return; }"),
            Err("2:1: `main` must return `int`, found `nore`".into())
        );
    }

    tree_tests!(
        use checker;

        fn test_block_scope_ends_with_block() {
            let program = "
                int main() {
                    bool b = true;
                    if (b) { int x = 1; }
                    x = 2;
                    return 0;
                }
            ";
            let expected_errors = &["4:5: undeclared identifier `x`"];
        }

        fn test_redeclaration_in_same_scope() {
            let program = "
                int main() {
                    int a = 1;
                    int a = 2;
                    return a;
                }
            ";
            let expected_errors = &["3:5: `a` is already declared in this scope"];
        }

        fn test_shadowing_in_nested_scopes() {
            let program = "
                int a = 1;
                int f(int a) {
                    int a = 2;
                    {
                        bool a = true;
                    }
                    while (a > 0) {
                        char a = 'x';
                    }
                    return a;
                }
                int main() { return f(a); }
            ";
            let expected_errors = &[];
        }

        fn test_duplicate_parameter() {
            let program = "int f(int a, bool a) { return 1; }";
            let expected_errors = &["1:1: `a` is already declared in this scope"];
        }

        fn test_arithmetic_on_bool() {
            let program = "
                int main() {
                    bool a = true;
                    int b = a + 1;
                    return b;
                }
            ";
            let expected_errors = &["3:13: cannot apply `+` to `bool` and `int`"];
        }

        fn test_nore_operands() {
            let program = "
                nore log() { return; }
                int main() {
                    bool b = log() == log();
                    return 0;
                }
            ";
            let expected_errors = &["3:14: cannot apply `==` to `nore` and `nore`"];
        }

        fn test_arithmetic_typing() {
            let program = "
                int a = 1 + 2;
                i64 wide = 7;
                char c = 'a' + 1;
                int main() {
                    int r = a * 2 % 3 - -a;
                    bool same = c == 'b';
                    bool widened = a < wide;
                    int mixed = c + a;
                    return r;
                }
            ";
            let expected_errors = &[];
        }

        fn test_arithmetic_requires_int_or_char_lhs() {
            let program = "
                i64 wide = 7;
                int main() {
                    int r = wide + 1;
                    return r;
                }
            ";
            let expected_errors = &["3:13: cannot apply `+` to `i64` and `int`"];
        }

        fn test_negation_requires_int() {
            let program = "bool b = -true;";
            let expected_errors = &["1:10: cannot negate `bool`"];
        }

        fn test_narrowing_is_rejected() {
            let program = "
                i64 big = 1;
                int small = big;
            ";
            let expected_errors = &["2:13: mismatched types: expected `int`, found `i64`"];
        }

        fn test_call_arity() {
            let program = "
                int add(int a, int b) { return a + b; }
                int main() { return add(1); }
            ";
            let expected_errors = &["2:21: function `add` expects 2 argument(s), found 1"];
        }

        fn test_array_decay_at_call_boundary() {
            let program = "
                int count(char* s) { return 0; }
                int count_ints(int* p) { return 0; }
                int main() {
                    char buf[8];
                    count(buf);
                    count_ints(buf);
                    return 0;
                }
            ";
            let expected_errors = &["6:16: argument 1 of `count_ints` expects `int*`, found `char[]`"];
        }

        fn test_forward_and_mutual_calls() {
            let program = "
                int main() { return even(10); }
                int even(int n) { if (n == 0) { return 1; } return odd(n - 1); }
                int odd(int n) { if (n == 0) { return 0; } return even(n - 1); }
            ";
            let expected_errors = &[];
        }

        fn test_undeclared_function() {
            let program = "int main() { return g(); }";
            let expected_errors = &["1:21: undeclared function `g`"];
        }

        fn test_calling_a_variable() {
            let program = "int g = 1;\nint main() { return g(); }";
            let expected_errors = &["2:21: `g` is not a function"];
        }

        fn test_qualified_call_resolves_mangled_name() {
            let program = "
                int m__f() { return 1; }
                int main() { return f@m() + f@n(); }
            ";
            let expected_errors = &["2:29: undeclared function `n__f`"];
        }

        fn test_char_literal_range() {
            let program = "char c = 200;";
            let expected_errors = &["1:10: character literal value 200 is out of [0, 127]"];
        }

        fn test_char_negative_literal() {
            let program = "char c = -1;";
            let expected_errors = &["1:10: character literal value -1 is out of [0, 127]"];
        }

        fn test_char_range_on_assignment() {
            let program = "
                int main() {
                    char c = 'a';
                    c = 65;
                    c = 300;
                    return 0;
                }
            ";
            let expected_errors = &["4:9: character literal value 300 is out of [0, 127]"];
        }

        fn test_non_bool_condition() {
            let program = "
                int main() {
                    if (1) { return 1; }
                    return 0;
                }
            ";
            let expected_errors = &["2:9: condition must be `bool`, found `int`"];
        }

        fn test_while_condition() {
            let program = "
                int main() {
                    int i = 0;
                    while (i) { i = i - 1; }
                    return 0;
                }
            ";
            let expected_errors = &["3:12: condition must be `bool`, found `int`"];
        }

        fn test_missing_return() {
            let program = "int f() { int x = 1; }";
            let expected_errors = &["1:1: function `f` must return a value"];
        }

        fn test_any_return_satisfies_the_function() {
            let program = "int f(bool b) { if (b) { return 1; } }";
            let expected_errors = &[];
        }

        fn test_return_type_mismatch() {
            let program = "int f() { return true; }";
            let expected_errors = &["1:18: mismatched types: expected `int`, found `bool`"];
        }

        fn test_indexing() {
            let program = "
                int main() {
                    char buf[4];
                    buf[0] = 'a';
                    char* s = \"hi\";
                    char c = buf[1];
                    c = s[0];
                    int x = 1;
                    x[0] = 1;
                    return 0;
                }
            ";
            let expected_errors = &["8:5: cannot index into a value of type `int`"];
        }

        fn test_index_must_be_int() {
            let program = "
                int main() {
                    char buf[4];
                    buf[true] = 'a';
                    return 0;
                }
            ";
            let expected_errors = &["3:9: index must be `int`, found `bool`"];
        }

        fn test_arrays_are_char_only() {
            let program = "int nums[4];";
            let expected_errors = &["1:1: only `char` arrays are supported, found `int[]`"];
        }

        fn test_array_cannot_be_assigned() {
            let program = "
                int main() {
                    char a[4];
                    char b[4];
                    a = b;
                    return 0;
                }
            ";
            let expected_errors = &["4:5: invalid assignment target"];
        }

        fn test_call_is_not_assignable() {
            let program = "
                int f() { return 1; }
                int main() {
                    f() = 2;
                    return 0;
                }
            ";
            let expected_errors = &["3:5: invalid assignment target"];
        }

        fn test_missing_initializer() {
            let program = "int main() { int x; return 0; }";
            let expected_errors = &["1:14: variable `x` must be initialized"];
        }

        fn test_nore_variable() {
            let program = "nore x = 1;";
            let expected_errors = &["1:1: `x` cannot have type `nore`"];
        }

        fn test_nore_call_has_no_value() {
            let program = "
                nore log() { return; }
                int main() {
                    int x = log();
                    return x;
                }
            ";
            let expected_errors = &["3:13: mismatched types: expected `int`, found `nore`"];
        }

        fn test_print() {
            let program = "
                int main() {
                    char buf[2];
                    out@io(1);
                    out@io(true);
                    out@io('c');
                    out@io(\"hi\");
                    out@io(buf);
                    return 0;
                }
            ";
            let expected_errors = &[];
        }

        fn test_print_arity() {
            let program = "int main() { out@io(1, 2); return 0; }";
            let expected_errors = &["1:14: `out@io` takes exactly one argument, found 2"];
        }

        fn test_print_nore() {
            let program = "
                nore log() { return; }
                int main() {
                    out@io(log());
                    return 0;
                }
            ";
            let expected_errors = &["3:12: cannot print a value of type `nore`"];
        }

        fn test_user_defined_print_takes_precedence() {
            let program = "
                nore io__out(int a, int b) { return; }
                int main() {
                    out@io(1, 2);
                    return 0;
                }
            ";
            let expected_errors = &[];
        }

        fn test_repeated_identical_extern() {
            let program = "
                extern int puts(char* s);
                extern int puts(char* s);
                int main() { return puts(\"x\"); }
            ";
            let expected_errors = &[];
        }

        fn test_conflicting_extern() {
            let program = "
                extern int puts(char* s);
                extern int puts(int s);
            ";
            let expected_errors = &["2:1: `puts` is already declared in this scope"];
        }

        fn test_global_clashes_with_function() {
            let program = "
                int f() { return 1; }
                int f = 2;
            ";
            let expected_errors = &["2:1: `f` is already declared in this scope"];
        }
    );
}
