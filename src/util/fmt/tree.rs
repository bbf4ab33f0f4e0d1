use std::io::Write;

use crate::ast::*;

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string(expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(w: &mut impl Write, program: &Program) -> std::io::Result<()> {
    for decl in &program.decls {
        match decl {
            TopLevel::Function(function) => print_function(w, function)?,
            TopLevel::Use(UseDecl { path, .. }) => writeln!(w, "use {path:?}")?,
            TopLevel::Global(global) => {
                write!(w, "global ")?;
                print_var_decl(w, 0, global)?;
            }
        }
    }
    Ok(())
}

fn print_function(w: &mut impl Write, function: &FunctionDecl) -> std::io::Result<()> {
    if function.is_extern {
        write!(w, "extern ")?;
    } else {
        write!(w, "function ")?;
    }
    write!(w, "{} {}(", function.return_ty, function.name)?;
    for (idx, param) in function.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{} {}", param.ty, param.name)?;
    }
    writeln!(w, ")")?;
    if let Some(body) = &function.body {
        print_stmts(w, 1, body)?;
    }
    Ok(())
}

fn print_var_decl(w: &mut impl Write, i: usize, decl: &VarDecl) -> std::io::Result<()> {
    write!(w, "{} {}", decl.ty, decl.name)?;
    if let Some(size) = decl.array_size {
        write!(w, "[{size}]")?;
    }
    writeln!(w)?;
    if let Some(initializer) = &decl.initializer {
        print_expr(w, i + 1, initializer)?;
    }
    Ok(())
}

fn print_stmts(w: &mut impl Write, i: usize, block: &Block) -> std::io::Result<()> {
    for stmt in &block.stmts {
        print_stmt(w, i, stmt)?;
    }
    Ok(())
}

pub fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    if let StmtKind::Expr(expr) = &stmt.kind {
        return print_expr(w, i, expr);
    }
    sp(w, i)?;
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            write!(w, "decl ")?;
            print_var_decl(w, i, decl)?;
        }
        StmtKind::Assign { target, value } => {
            writeln!(w, "assign")?;
            print_expr(w, i + 1, target)?;
            print_expr(w, i + 1, value)?;
        }
        StmtKind::Return(value) => {
            writeln!(w, "return")?;
            if let Some(value) = value {
                print_expr(w, i + 1, value)?;
            }
        }
        StmtKind::If {
            condition,
            then_block,
            else_block,
        } => {
            writeln!(w, "if")?;
            print_expr(w, i + 1, condition)?;
            print_stmts(w, i + 1, then_block)?;
            if let Some(else_block) = else_block {
                sp(w, i)?;
                writeln!(w, "else")?;
                print_stmts(w, i + 1, else_block)?;
            }
        }
        StmtKind::While { condition, body } => {
            writeln!(w, "while")?;
            print_expr(w, i + 1, condition)?;
            print_stmts(w, i + 1, body)?;
        }
        StmtKind::Block(block) => {
            writeln!(w, "block")?;
            print_stmts(w, i + 1, block)?;
        }
        StmtKind::Expr(_) => unreachable!(),
    }
    Ok(())
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    sp(w, i)?;
    match &expr.kind {
        ExprKind::Literal(Literal::Int(val)) => writeln!(w, "int {val}")?,
        ExprKind::Literal(Literal::Bool(val)) => writeln!(w, "bool {val}")?,
        ExprKind::Literal(Literal::Char(val)) => writeln!(w, "char {val:?}")?,
        ExprKind::String(val) => writeln!(w, "string {val:?}")?,
        ExprKind::Variable(name) => writeln!(w, "var {name}")?,
        ExprKind::Unary {
            op: UnaryOperator::Neg,
            operand,
        } => {
            writeln!(w, "neg")?;
            print_expr(w, i + 1, operand)?;
        }
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op}")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        ExprKind::Call {
            callee,
            module,
            args,
        } => {
            write!(w, "call {callee}")?;
            if let Some(module) = module {
                write!(w, "@{module}")?;
            }
            writeln!(w)?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
        ExprKind::Index { base, index } => {
            writeln!(w, "index")?;
            print_expr(w, i + 1, base)?;
            print_expr(w, i + 1, index)?;
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
