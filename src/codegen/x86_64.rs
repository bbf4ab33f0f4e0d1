use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt::{Display, Write},
    format_args as f,
    marker::PhantomData,
};

use tracing::trace;

use crate::{
    ast::{
        BinaryOperator, Block, Expr, ExprKind, FunctionDecl, Literal, Program, Stmt, StmtKind,
        UnaryOperator, VarDecl,
    },
    codegen::{eval_const, unsupported, x86_64_env, Error, Result},
    token::Pos,
    type_checker::is_print,
    types::{well_known, Type},
};

/// System V integer argument registers, in order.
const ARG_REGISTERS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Every local, whatever its type, takes one slot.
const SLOT_SIZE: u32 = 8;

/// Emits GNU assembler source, in Intel syntax.
///
/// Every expression leaves its value in `rax`. Binary operators save the
/// left operand on the stack while the right one is evaluated, which stands
/// in for register allocation.
pub struct Generator<E> {
    text: String,
    /// Instructions of the function being generated. Buffered since the
    /// frame size is only known at the end of the function.
    body: String,
    data: String,
    strings: Vec<Box<str>>,
    string_labels: HashMap<Box<str>, usize>,
    formats: BTreeSet<Format>,
    globals: HashMap<String, Type>,
    /// Names of the functions the program defines.
    functions: HashSet<String>,
    scopes: Vec<HashMap<String, Slot>>,
    frame_size: u32,
    next_label: usize,
    epilogue: String,
    _env: PhantomData<E>,
}

#[derive(Copy, Clone)]
struct Slot {
    offset: u32,
    ty: Type,
}

impl<E> Generator<E>
where
    E: x86_64_env::Env,
{
    pub fn new() -> Generator<E> {
        Generator {
            text: String::with_capacity(4096),
            body: String::with_capacity(1024),
            data: String::new(),
            strings: Vec::new(),
            string_labels: HashMap::new(),
            formats: BTreeSet::new(),
            globals: HashMap::new(),
            functions: HashSet::new(),
            scopes: Vec::new(),
            frame_size: 0,
            next_label: 0,
            epilogue: String::new(),
            _env: PhantomData,
        }
    }

    pub fn generate(mut self, program: &Program) -> Result<String> {
        self.functions = program
            .functions()
            .filter(|function| !function.is_extern)
            .map(|function| function.name.clone())
            .collect();

        for global in program.globals() {
            self.g_global(global)?;
        }
        for function in program.functions() {
            if let Some(body) = &function.body {
                self.g_function(function, body)?;
            }
        }
        Ok(self.finish())
    }
}

/// Declarations.
impl<E> Generator<E>
where
    E: x86_64_env::Env,
{
    fn g_global(&mut self, global: &VarDecl) -> Result<()> {
        if global.is_array() {
            return Err(unsupported(global.pos, "array globals"));
        }
        let value = match &global.initializer {
            Some(Expr {
                kind: ExprKind::String(s),
                ..
            }) => self.pool_string(s),
            Some(initializer) => eval_const(&global.name, initializer)?.to_string(),
            None => "0".to_owned(),
        };
        emit_label(&mut self.data, f!("glob_{}", global.name));
        emit(&mut self.data, f!(".quad {value}"));
        self.globals.insert(global.name.clone(), global.ty);
        Ok(())
    }

    fn g_function(&mut self, function: &FunctionDecl, body: &Block) -> Result<()> {
        trace!(function = %function.name, "generating function");
        if function.params.len() > ARG_REGISTERS.len() {
            return Err(unsupported(
                function.pos,
                "functions with more than six parameters",
            ));
        }

        self.body.clear();
        self.frame_size = 0;
        self.scopes = vec![HashMap::new()];
        self.epilogue = format!("{}{}_epilogue", E::PRIVATE_LABEL_PREFIX, function.name);

        for (param, register) in function.params.iter().zip(ARG_REGISTERS) {
            let offset = self.alloc(&param.name, param.ty);
            self.out(f!("mov {}, {register}", local(offset)));
        }
        self.g_block(body)?;

        let symbol = format!("{}{}", E::SYMBOL_PREFIX, function.name);
        let text = &mut self.text;
        text.push_str(&format!(".global {symbol}\n"));
        emit_label(text, &symbol);
        emit(text, "push rbp");
        emit(text, "mov rbp, rsp");
        if self.frame_size > 0 {
            emit(text, f!("sub rsp, {}", align16(self.frame_size)));
        }
        text.push_str(&self.body);
        // Falling off the end returns zero.
        emit(text, "xor eax, eax");
        emit_label(text, &self.epilogue);
        emit(text, "mov rsp, rbp");
        emit(text, "pop rbp");
        emit(text, "ret");
        text.push('\n');
        Ok(())
    }
}

/// Statements.
impl<E> Generator<E>
where
    E: x86_64_env::Env,
{
    fn g_block(&mut self, block: &Block) -> Result<()> {
        self.scopes.push(HashMap::new());
        for stmt in &block.stmts {
            self.g_stmt(stmt)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn g_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::VarDecl(decl) => {
                if decl.is_array() {
                    return Err(unsupported(decl.pos, "arrays"));
                }
                match &decl.initializer {
                    Some(initializer) => self.g_expr(initializer)?,
                    None => self.out("xor eax, eax"),
                }
                if decl.ty == Type::BOOL {
                    self.normalize_bool();
                }
                let offset = self.alloc(&decl.name, decl.ty);
                self.out(f!("mov {}, rax", local(offset)));
            }
            StmtKind::Assign { target, value } => {
                let ExprKind::Variable(name) = &target.kind else {
                    return Err(unsupported(target.pos, "indexing"));
                };
                let (place, ty) = self.place(name, target.pos)?;
                self.g_expr(value)?;
                if ty == Type::BOOL {
                    self.normalize_bool();
                }
                self.out(f!("mov {place}, rax"));
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.g_expr(value)?;
                }
                emit(&mut self.body, f!("jmp {}", self.epilogue));
            }
            StmtKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let id = self.fresh_id();
                let else_label = Self::label("else", id);
                let end_label = Self::label("end", id);

                self.g_expr(condition)?;
                self.out("cmp rax, 0");
                if let Some(else_block) = else_block {
                    self.out(f!("je {else_label}"));
                    self.g_block(then_block)?;
                    self.out(f!("jmp {end_label}"));
                    emit_label(&mut self.body, &else_label);
                    self.g_block(else_block)?;
                } else {
                    self.out(f!("je {end_label}"));
                    self.g_block(then_block)?;
                }
                emit_label(&mut self.body, &end_label);
            }
            StmtKind::While { condition, body } => {
                let id = self.fresh_id();
                let start_label = Self::label("while", id);
                let end_label = Self::label("end", id);

                emit_label(&mut self.body, &start_label);
                self.g_expr(condition)?;
                self.out("cmp rax, 0");
                self.out(f!("je {end_label}"));
                self.g_block(body)?;
                self.out(f!("jmp {start_label}"));
                emit_label(&mut self.body, &end_label);
            }
            StmtKind::Expr(expr) => self.g_expr(expr)?,
            StmtKind::Block(block) => self.g_block(block)?,
        }
        Ok(())
    }

    fn normalize_bool(&mut self) {
        self.out("cmp rax, 0");
        self.out("setne al");
        self.out("movzx eax, al");
    }
}

/// Expressions.
impl<E> Generator<E>
where
    E: x86_64_env::Env,
{
    fn g_expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Literal(Literal::Int(int)) => self.out(f!("mov rax, {int}")),
            ExprKind::Literal(Literal::Bool(bool)) => self.out(f!("mov rax, {}", u8::from(*bool))),
            ExprKind::Literal(Literal::Char(char)) => {
                self.out(f!("mov rax, {}", u32::from(*char)));
            }
            ExprKind::String(s) => {
                let label = self.pool_string(s);
                self.out(f!("lea rax, [rip + {label}]"));
            }
            ExprKind::Variable(name) => {
                let (place, _) = self.place(name, expr.pos)?;
                self.out(f!("mov rax, {place}"));
            }
            ExprKind::Unary {
                op: UnaryOperator::Neg,
                operand,
            } => {
                self.g_expr(operand)?;
                self.out("neg rax");
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.g_expr(lhs)?;
                self.out("push rax");
                self.g_expr(rhs)?;
                self.out("mov rcx, rax");
                self.out("pop rax");
                self.g_binary_op(*op);
            }
            ExprKind::Call {
                callee,
                module,
                args,
            } => {
                let is_builtin_print = is_print(callee, module.as_deref())
                    && !self.functions.contains(well_known::PRINT);
                if !is_builtin_print {
                    return Err(unsupported(expr.pos, "calls other than `out@io`"));
                }
                self.g_print(expr.pos, args)?;
            }
            ExprKind::Index { .. } => return Err(unsupported(expr.pos, "indexing")),
        }
        Ok(())
    }

    /// Combines `rax` (left) and `rcx` (right) into `rax`.
    fn g_binary_op(&mut self, op: BinaryOperator) {
        let set = match op {
            BinaryOperator::Add => return self.out("add rax, rcx"),
            BinaryOperator::Sub => return self.out("sub rax, rcx"),
            BinaryOperator::Mul => return self.out("imul rax, rcx"),
            BinaryOperator::Div | BinaryOperator::Rem => {
                self.out("cqo");
                self.out("idiv rcx");
                if op == BinaryOperator::Rem {
                    self.out("mov rax, rdx");
                }
                return;
            }
            BinaryOperator::Eq => "sete",
            BinaryOperator::Ne => "setne",
            BinaryOperator::Lt => "setl",
            BinaryOperator::Gt => "setg",
            BinaryOperator::Le => "setle",
            BinaryOperator::Ge => "setge",
        };
        self.out("cmp rax, rcx");
        self.out(f!("{set} al"));
        self.out("movzx eax, al");
    }

    fn g_print(&mut self, pos: Pos, args: &[Expr]) -> Result<()> {
        let [arg] = args else {
            return Err(unsupported(pos, "multi-argument print"));
        };
        let format = Format::of(self.type_of(arg));
        self.formats.insert(format);

        self.g_expr(arg)?;
        self.out("mov rsi, rax");
        self.out(f!(
            "lea rdi, [rip + {}{}]",
            E::PRIVATE_LABEL_PREFIX,
            format.label()
        ));
        // Variadic calls take the number of vector registers in `al`.
        self.out("xor eax, eax");
        self.out(f!("call {}", E::PRINTF));
        Ok(())
    }

    /// The static type of an expression, as needed to pick a print format.
    fn type_of(&self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Literal(Literal::Int(_)) | ExprKind::Unary { .. } => Type::INT,
            ExprKind::Literal(Literal::Bool(_)) => Type::BOOL,
            ExprKind::Literal(Literal::Char(_)) => Type::CHAR,
            ExprKind::String(_) => Type::STRING,
            ExprKind::Variable(name) => self.lookup(name).map_or(Type::INT, |(_, ty)| ty),
            ExprKind::Binary { op, .. } if op.is_arithmetic() => Type::INT,
            ExprKind::Binary { .. } => Type::BOOL,
            ExprKind::Call { .. } => Type::NORE,
            ExprKind::Index { base, .. } => self.type_of(base).element(),
        }
    }
}

/// Utility functions.
impl<E> Generator<E>
where
    E: x86_64_env::Env,
{
    /// Prints an instruction into the current function.
    fn out(&mut self, f: impl Display) {
        emit(&mut self.body, f);
    }

    fn alloc(&mut self, name: &str, ty: Type) -> u32 {
        self.frame_size += SLOT_SIZE;
        let offset = self.frame_size;
        let scope = self.scopes.last_mut().expect("function scope");
        scope.insert(name.to_owned(), Slot { offset, ty });
        offset
    }

    fn lookup(&self, name: &str) -> Option<(String, Type)> {
        let local_slot = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name));
        if let Some(slot) = local_slot {
            return Some((local(slot.offset), slot.ty));
        }
        self.globals
            .get(name)
            .map(|ty| (format!("QWORD PTR [rip + glob_{name}]"), *ty))
    }

    /// Resolves a variable into its memory operand.
    fn place(&self, name: &str, pos: Pos) -> Result<(String, Type)> {
        self.lookup(name).ok_or_else(|| {
            pos.wrap(Error::Unsupported {
                feature: "unresolved variables",
            })
        })
    }

    /// Returns the label of the pooled string.
    fn pool_string(&mut self, s: &str) -> String {
        let id = match self.string_labels.get(s) {
            Some(&id) => id,
            None => {
                let id = self.strings.len();
                self.strings.push(s.into());
                self.string_labels.insert(s.into(), id);
                id
            }
        };
        format!("{}str{id}", E::PRIVATE_LABEL_PREFIX)
    }

    fn fresh_id(&mut self) -> usize {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    fn label(kind: &str, id: usize) -> String {
        format!("{}{kind}{id}", E::PRIVATE_LABEL_PREFIX)
    }

    fn finish(self) -> String {
        let mut out = String::with_capacity(self.text.len() + self.data.len() + 512);
        out.push_str(E::GLOBAL_PROLOGUE);
        out.push('\n');

        out.push_str(&format!(".section {}\n", E::SECTION_TEXT));
        out.push_str(&self.text);

        if !self.formats.is_empty() || !self.strings.is_empty() {
            out.push_str(&format!(".section {}\n", E::SECTION_READ_ONLY_DATA));
            for format in &self.formats {
                emit_label(&mut out, f!("{}{}", E::PRIVATE_LABEL_PREFIX, format.label()));
                emit(&mut out, f!(".asciz \"{}\"", format.template()));
            }
            for (id, s) in self.strings.iter().enumerate() {
                emit_label(&mut out, f!("{}str{id}", E::PRIVATE_LABEL_PREFIX));
                emit(&mut out, f!(".asciz \"{}\"", escape(s)));
            }
            out.push('\n');
        }

        if !self.data.is_empty() {
            out.push_str(&format!(".section {}\n", E::SECTION_DATA));
            out.push_str(&self.data);
        }

        let len = out.trim_end().len();
        out.truncate(len);
        out.push('\n');
        out
    }
}

impl<E> Default for Generator<E>
where
    E: x86_64_env::Env,
{
    fn default() -> Self {
        Self::new()
    }
}

/// The `printf` templates, one per printable kind of value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Format {
    Int,
    Str,
    Char,
}

impl Format {
    fn of(ty: Type) -> Format {
        if ty.is_string() {
            Format::Str
        } else if ty == Type::CHAR {
            Format::Char
        } else {
            Format::Int
        }
    }

    fn label(self) -> &'static str {
        match self {
            Format::Int => "fmt_int",
            Format::Str => "fmt_str",
            Format::Char => "fmt_char",
        }
    }

    fn template(self) -> &'static str {
        match self {
            Format::Int => r"%ld\n",
            Format::Str => r"%s\n",
            Format::Char => r"%c\n",
        }
    }
}

fn local(offset: u32) -> String {
    format!("QWORD PTR [rbp - {offset}]")
}

fn align16(n: u32) -> u32 {
    (n + 15) & !15
}

/// Prints an indented line.
fn emit(buf: &mut String, f: impl Display) {
    writeln!(buf, "    {f}").expect("writing to a String never fails");
}

fn emit_label(buf: &mut String, label: impl Display) {
    writeln!(buf, "{label}:").expect("writing to a String never fails");
}

/// Escapes a string for an `.asciz` directive.
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
            _ => {
                write!(buf, "\\{byte:03o}").expect("writing to a String never fails");
            }
        }
    }
    buf
}
