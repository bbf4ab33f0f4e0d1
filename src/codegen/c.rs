use std::fmt::Write;

use crate::{
    ast::{
        Block, Expr, ExprKind, FunctionDecl, Literal, Program, Stmt, StmtKind, UnaryOperator,
        VarDecl,
    },
    codegen::{eval_const, Error, Result},
    module::mangle,
    token::Pos,
    types::{well_known, BaseType, Type},
};

const INDENT: &str = "    ";

const INCLUDES: &str = "#include <stdint.h>\n#include <stdbool.h>\n";

/// `out@io` dispatches on the static type of its argument.
///
/// Only `printf` is declared so that externs of other stdio functions do not
/// clash with the prototypes of a full `<stdio.h>`.
const PRINT_PRELUDE: &str = r#"int printf(const char* format, ...);

static inline void az_out_int(long long value) { printf("%lld\n", value); }
static inline void az_out_char(char value) { printf("%c\n", value); }
static inline void az_out_str(const char* value) { printf("%s\n", value); }
#define io__out(x) _Generic((x), \
    char*: az_out_str, \
    char: az_out_char, \
    default: az_out_int)(x)
"#;

/// Names an emitted C translation unit can't use as identifiers: C11
/// keywords, the macros and typedefs of the included headers and the
/// helpers of the print prelude.
static RESERVED: phf::Set<&'static str> = phf::phf_set! {
    "auto", "break", "case", "char", "const", "continue", "default", "do",
    "double", "else", "enum", "extern", "float", "for", "goto", "if",
    "inline", "int", "long", "register", "restrict", "return", "short",
    "signed", "sizeof", "static", "struct", "switch", "typedef", "union",
    "unsigned", "void", "volatile", "while",
    "_Alignas", "_Alignof", "_Atomic", "_Bool", "_Complex", "_Generic",
    "_Imaginary", "_Noreturn", "_Static_assert", "_Thread_local",
    "bool", "true", "false", "__bool_true_false_are_defined",
    "int8_t", "int16_t", "int32_t", "int64_t",
    "uint8_t", "uint16_t", "uint32_t", "uint64_t",
    "intptr_t", "uintptr_t", "intmax_t", "uintmax_t",
    "printf", "az_out_int", "az_out_char", "az_out_str",
};

/// Emits C source. Declarations go to the header stream and definitions to
/// the body stream; the two are concatenated at the end.
pub struct Generator {
    header: String,
    body: String,
    indent: usize,
}

impl Generator {
    pub fn new() -> Generator {
        Generator {
            header: String::with_capacity(1024),
            body: String::with_capacity(4096),
            indent: 0,
        }
    }

    pub fn generate(mut self, program: &Program) -> Result<String> {
        self.header.push_str(INCLUDES);
        let defines_print = program
            .functions()
            .any(|function| function.name == well_known::PRINT);
        if !defines_print {
            self.header.push_str(PRINT_PRELUDE);
        }

        let (externs, defined): (Vec<_>, Vec<_>) =
            program.functions().partition(|function| function.is_extern);
        if !externs.is_empty() {
            self.header.push('\n');
            for function in externs {
                check_signature(function)?;
                self.header.push_str(&format!("{};\n", prototype(function)));
            }
        }
        if !defined.is_empty() {
            self.header.push('\n');
            for function in &defined {
                check_signature(function)?;
                self.header.push_str(&format!("{};\n", prototype(function)));
            }
        }

        let mut globals = program.globals().peekable();
        if globals.peek().is_some() {
            self.body.push('\n');
        }
        for global in globals {
            self.g_global(global)?;
        }
        for function in defined {
            if let Some(body) = &function.body {
                self.g_function(function, body)?;
            }
        }

        self.header.push_str(&self.body);
        Ok(self.header)
    }

    fn g_global(&mut self, global: &VarDecl) -> Result<()> {
        check_name(&global.name, global.pos)?;
        // File scope initializers must be constant.
        if let Some(initializer) = &global.initializer {
            if !matches!(initializer.kind, ExprKind::String(_)) {
                eval_const(&global.name, initializer)?;
            }
        }
        let decl = var_decl(global);
        self.body.push_str(&decl);
        self.body.push('\n');
        Ok(())
    }

    fn g_function(&mut self, function: &FunctionDecl, body: &Block) -> Result<()> {
        self.body.push('\n');
        self.body.push_str(&format!("{} {{\n", prototype(function)));
        self.indented(|this| this.g_stmts(body))?;
        self.body.push_str("}\n");
        Ok(())
    }

    fn g_stmts(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.stmts {
            self.g_stmt(stmt)?;
        }
        Ok(())
    }

    fn g_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::VarDecl(decl) => {
                check_name(&decl.name, decl.pos)?;
                self.line(var_decl(decl));
            }
            StmtKind::Assign { target, value } => {
                self.line(format!("{} = {};", expr(target), expr(value)));
            }
            StmtKind::Return(Some(value)) => self.line(format!("return {};", expr(value))),
            StmtKind::Return(None) => self.line("return;"),
            StmtKind::If { .. } => {
                self.start_line();
                self.g_if(stmt)?;
                self.body.push('\n');
            }
            StmtKind::While { condition, body } => {
                self.line(format!("while ({}) {{", expr(condition)));
                self.indented(|this| this.g_stmts(body))?;
                self.line("}");
            }
            StmtKind::Expr(e) => self.line(format!("{};", expr(e))),
            StmtKind::Block(block) => {
                self.line("{");
                self.indented(|this| this.g_stmts(block))?;
                self.line("}");
            }
        }
        Ok(())
    }

    /// Writes an `if` starting at the current column, without the trailing
    /// line break, so that `else if` chains stay flat.
    fn g_if(&mut self, stmt: &Stmt) -> Result<()> {
        let StmtKind::If {
            condition,
            then_block,
            else_block,
        } = &stmt.kind
        else {
            unreachable!("not an if statement");
        };
        self.body.push_str(&format!("if ({}) {{\n", expr(condition)));
        self.indented(|this| this.g_stmts(then_block))?;
        self.start_line();
        self.body.push('}');

        let Some(else_block) = else_block else {
            return Ok(());
        };
        if let [nested @ Stmt {
            kind: StmtKind::If { .. },
            ..
        }] = else_block.stmts.as_slice()
        {
            self.body.push_str(" else ");
            self.g_if(nested)?;
        } else {
            self.body.push_str(" else {\n");
            self.indented(|this| this.g_stmts(else_block))?;
            self.start_line();
            self.body.push('}');
        }
        Ok(())
    }

    fn line(&mut self, line: impl AsRef<str>) {
        self.start_line();
        self.body.push_str(line.as_ref());
        self.body.push('\n');
    }

    fn start_line(&mut self) {
        for _ in 0..self.indent {
            self.body.push_str(INDENT);
        }
    }

    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.indent += 1;
        let res = f(self);
        self.indent -= 1;
        res
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders C prototypes for every function the program defines.
pub fn generate_header(program: &Program) -> String {
    let mut header = String::from("#ifndef AZ_PROGRAM_H\n#define AZ_PROGRAM_H\n\n");
    header.push_str(INCLUDES);
    header.push('\n');
    for function in program.functions().filter(|function| !function.is_extern) {
        header.push_str(&format!("{};\n", prototype(function)));
    }
    header.push_str("\n#endif\n");
    header
}

pub fn c_type(ty: Type) -> String {
    let base = match ty.base {
        BaseType::Int => "int",
        BaseType::Bool => "bool",
        BaseType::Char => "char",
        BaseType::Nore => "void",
        BaseType::I8 => "int8_t",
        BaseType::I16 => "int16_t",
        BaseType::I32 => "int32_t",
        BaseType::I64 => "int64_t",
        BaseType::U8 => "uint8_t",
        BaseType::U16 => "uint16_t",
        BaseType::U32 => "uint32_t",
        BaseType::U64 => "uint64_t",
    };
    if ty.is_pointer {
        format!("{base}*")
    } else {
        base.to_owned()
    }
}

fn check_name(name: &str, pos: Pos) -> Result<()> {
    if RESERVED.contains(name) {
        return Err(pos.wrap(Error::ReservedIdentifier {
            name: name.to_owned(),
        }));
    }
    Ok(())
}

fn check_signature(function: &FunctionDecl) -> Result<()> {
    check_name(&function.name, function.pos)?;
    function
        .params
        .iter()
        .try_for_each(|param| check_name(&param.name, function.pos))
}

fn prototype(function: &FunctionDecl) -> String {
    let mut out = format!("{} {}(", c_type(function.return_ty), function.name);
    if function.params.is_empty() {
        out.push_str("void");
    }
    for (idx, param) in function.params.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        write!(out, "{} {}", c_type(param.ty), param.name)
            .expect("writing to a String never fails");
    }
    out.push(')');
    out
}

fn var_decl(decl: &VarDecl) -> String {
    let ty = c_type(decl.ty);
    match (decl.array_size, &decl.initializer) {
        (Some(size), _) => format!("{ty} {}[{size}];", decl.name),
        (None, Some(initializer)) => format!("{ty} {} = {};", decl.name, expr(initializer)),
        (None, None) => format!("{ty} {};", decl.name),
    }
}

fn expr(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Literal(Literal::Int(int)) => int.to_string(),
        ExprKind::Literal(Literal::Bool(bool)) => bool.to_string(),
        // Character constants are `int` in C.
        ExprKind::Literal(Literal::Char(char)) => format!("((char){})", char_literal(*char)),
        ExprKind::String(s) => format!("\"{}\"", escape(s)),
        ExprKind::Variable(name) => name.clone(),
        ExprKind::Unary {
            op: UnaryOperator::Neg,
            operand,
        } => format!("(-{})", expr(operand)),
        ExprKind::Binary { op, lhs, rhs } => format!("({} {op} {})", expr(lhs), expr(rhs)),
        ExprKind::Call {
            callee,
            module,
            args,
        } => {
            let name = match module {
                Some(module) => mangle(module, callee),
                None => callee.clone(),
            };
            let args: Vec<_> = args.iter().map(expr).collect();
            format!("{name}({})", args.join(", "))
        }
        ExprKind::Index { base, index } => format!("{}[{}]", expr(base), expr(index)),
    }
}

fn char_literal(c: char) -> String {
    match c {
        '\'' => r"'\''".to_owned(),
        '\\' => r"'\\'".to_owned(),
        '\n' => r"'\n'".to_owned(),
        '\t' => r"'\t'".to_owned(),
        '\r' => r"'\r'".to_owned(),
        '\0' => r"'\0'".to_owned(),
        ' '..='~' => format!("'{c}'"),
        _ => u32::from(c).to_string(),
    }
}

fn escape(s: &str) -> String {
    let mut buf = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'"' => buf.push_str("\\\""),
            b'\\' => buf.push_str("\\\\"),
            b'\n' => buf.push_str("\\n"),
            b'\t' => buf.push_str("\\t"),
            b'\r' => buf.push_str("\\r"),
            0x20..=0x7e => buf.push(char::from(byte)),
            _ => write!(buf, "\\{byte:03o}").expect("writing to a String never fails"),
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser;

    fn parse(src: &str) -> Program {
        parser::parse_program(src, &mut Vec::new()).unwrap()
    }

    fn generate(src: &str) -> String {
        Generator::new().generate(&parse(src)).unwrap()
    }

    #[test]
    fn test_program() {
        let src = indoc! {r#"
            extern int abs(int x);
            int limit = 2 * 3;
            char buf[8];
            int add(int a, int b) { return a + b; }
            int main() {
                char c = 'a';
                buf[0] = c;
                if (add(1, 2) == 3) {
                    out@io("ok");
                } else if (limit > 5) {
                    out@io(limit);
                } else {
                    out@io(abs(-3));
                }
                while (limit > 0) { limit = limit - 1; }
                { i64 wide = 1; }
                return add@m(1, 2);
            }
        "#};
        let expected = indoc! {r#"
            #include <stdint.h>
            #include <stdbool.h>
            int printf(const char* format, ...);

            static inline void az_out_int(long long value) { printf("%lld\n", value); }
            static inline void az_out_char(char value) { printf("%c\n", value); }
            static inline void az_out_str(const char* value) { printf("%s\n", value); }
            #define io__out(x) _Generic((x), \
                char*: az_out_str, \
                char: az_out_char, \
                default: az_out_int)(x)

            int abs(int x);

            int add(int a, int b);
            int main(void);

            int limit = (2 * 3);
            char buf[8];

            int add(int a, int b) {
                return (a + b);
            }

            int main(void) {
                char c = ((char)'a');
                buf[0] = c;
                if ((add(1, 2) == 3)) {
                    io__out("ok");
                } else if ((limit > 5)) {
                    io__out(limit);
                } else {
                    io__out(abs((-3)));
                }
                while ((limit > 0)) {
                    limit = (limit - 1);
                }
                {
                    int64_t wide = 1;
                }
                return m__add(1, 2);
            }
        "#};
        assert_eq!(generate(src), expected);
    }

    #[test]
    fn test_user_defined_print_replaces_prelude() {
        let src = "nore io__out(int x) { return; }\nint main() { out@io(1); return 0; }";
        let expected = indoc! {"
            #include <stdint.h>
            #include <stdbool.h>

            void io__out(int x);
            int main(void);

            void io__out(int x) {
                return;
            }

            int main(void) {
                io__out(1);
                return 0;
            }
        "};
        assert_eq!(generate(src), expected);
    }

    #[test]
    fn test_pointers_and_literals() {
        let src = indoc! {r#"
            char* name = "say \"hi\"\n";
            nore show(char* s, i64 n, bool b) {
                char q = '\'';
                char nl = '\n';
                return;
            }
        "#};
        let c = generate(src);
        assert!(c.contains("char* name = \"say \\\"hi\\\"\\n\";\n"));
        assert!(c.contains("void show(char* s, int64_t n, bool b) {\n"));
        assert!(c.contains("    char q = ((char)'\\'');\n"));
        assert!(c.contains("    char nl = ((char)'\\n');\n"));
    }

    #[test]
    fn test_non_constant_global() {
        let program = parse("int f() { return 1; }\nint x = f();");
        let err = Generator::new().generate(&program).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "2:9: global `x` must be initialized with a constant expression"
        );
    }

    #[test]
    fn test_stdio_externs() {
        let src = "extern int puts(char* s);\nextern int putchar(int c);\nint main() { puts(\"hi\"); return 0; }";
        let c = generate(src);
        assert!(!c.contains("<stdio.h>"));
        assert!(c.contains("int printf(const char* format, ...);\n"));
        assert!(c.contains("\nint puts(char* s);\nint putchar(int c);\n"));
    }

    #[test]
    fn test_reserved_identifiers() {
        let cases = [
            ("int main() { int double = 1; return double; }", "1:14: `double`"),
            ("int static;\nint main() { return 0; }", "1:1: `static`"),
            ("int az_out_int() { return 1; }", "1:1: `az_out_int`"),
            ("nore f(int float) { return; }", "1:1: `float`"),
            ("extern int printf(char* long);", "1:1: `printf`"),
            ("int main() { while (true) { bool int8_t = false; } return 0; }", "1:29: `int8_t`"),
        ];
        for (src, prefix) in cases {
            let program = parse(src);
            let err = Generator::new().generate(&program).unwrap_err();
            assert_eq!(
                format!("{err:#}"),
                format!("{prefix} is reserved in C and can't be used as an identifier"),
                "input: {src:?}"
            );
        }
    }

    #[test]
    fn test_header() {
        let program = parse("extern int abs(int x);\nint add(int a, int b) { return a + b; }\nint main() { return 0; }");
        let expected = indoc! {"
            #ifndef AZ_PROGRAM_H
            #define AZ_PROGRAM_H

            #include <stdint.h>
            #include <stdbool.h>

            int add(int a, int b);
            int main(void);

            #endif
        "};
        assert_eq!(generate_header(&program), expected);
    }
}
