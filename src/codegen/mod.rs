use tracing::{debug, instrument};

use crate::{
    ast::{BinaryOperator, Expr, ExprKind, Literal, Program, UnaryOperator},
    codegen::x86_64::Generator,
    token::{Pos, Spanned},
};

pub mod c;
pub mod x86_64;
pub mod x86_64_env;

pub use c::generate_header;

pub type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Lowers a checked program into the text of the requested backend.
#[instrument(skip(program))]
pub fn generate(program: &Program, emit: Emit) -> Result<String> {
    type DarwinGenerator = Generator<x86_64_env::Darwin>;
    type LinuxGenerator = Generator<x86_64_env::Linux>;

    let code = match emit {
        Emit::C => c::Generator::new().generate(program)?,
        Emit::Asm(Target::x86_64_darwin) => DarwinGenerator::new().generate(program)?,
        Emit::Asm(Target::x86_64_linux) => LinuxGenerator::new().generate(program)?,
    };
    debug!(bytes = code.len(), "generated code");
    Ok(code)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Emit {
    /// Structured C source.
    C,
    /// GNU assembler source, in Intel syntax.
    Asm(Target),
}

impl Emit {
    /// The conventional file extension of the emitted text.
    pub const fn extension(&self) -> &'static str {
        match self {
            Emit::C => "c",
            Emit::Asm(_) => "s",
        }
    }
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    x86_64_darwin,
    x86_64_linux,
}

impl Target {
    pub const ALL: &[Target] = &[Target::x86_64_darwin, Target::x86_64_linux];
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::x86_64_darwin => f.write_str("x86_64_darwin"),
            Target::x86_64_linux => f.write_str("x86_64_linux"),
        }
    }
}

/// Evaluates a global initializer at compile time.
///
/// Only literals and operators over them are constant. Booleans and
/// characters evaluate to their integer representation.
pub(crate) fn eval_const(name: &str, expr: &Expr) -> Result<i64> {
    let value = match &expr.kind {
        ExprKind::Literal(Literal::Int(value)) => *value,
        ExprKind::Literal(Literal::Bool(value)) => i64::from(*value),
        ExprKind::Literal(Literal::Char(value)) => i64::from(u32::from(*value)),
        ExprKind::Unary {
            op: UnaryOperator::Neg,
            operand,
        } => eval_const(name, operand)?.wrapping_neg(),
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs = eval_const(name, lhs)?;
            let rhs = eval_const(name, rhs)?;
            match op {
                BinaryOperator::Add => lhs.wrapping_add(rhs),
                BinaryOperator::Sub => lhs.wrapping_sub(rhs),
                BinaryOperator::Mul => lhs.wrapping_mul(rhs),
                BinaryOperator::Div | BinaryOperator::Rem if rhs == 0 => {
                    return Err(expr.pos.wrap(Error::ConstDivisionByZero));
                }
                BinaryOperator::Div => lhs.wrapping_div(rhs),
                BinaryOperator::Rem => lhs.wrapping_rem(rhs),
                BinaryOperator::Eq => i64::from(lhs == rhs),
                BinaryOperator::Ne => i64::from(lhs != rhs),
                BinaryOperator::Lt => i64::from(lhs < rhs),
                BinaryOperator::Gt => i64::from(lhs > rhs),
                BinaryOperator::Le => i64::from(lhs <= rhs),
                BinaryOperator::Ge => i64::from(lhs >= rhs),
            }
        }
        ExprKind::String(_)
        | ExprKind::Variable(_)
        | ExprKind::Call { .. }
        | ExprKind::Index { .. } => {
            return Err(expr.pos.wrap(Error::NonConstantGlobal {
                name: name.to_owned(),
            }));
        }
    };
    Ok(value)
}

/// Builds an [`Error::Unsupported`] error for the given position.
pub(crate) fn unsupported(pos: Pos, feature: &'static str) -> Spanned<Error> {
    pos.wrap(Error::Unsupported { feature })
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("the assembly backend does not support {feature}")]
    Unsupported { feature: &'static str },
    #[error("global `{name}` must be initialized with a constant expression")]
    NonConstantGlobal { name: String },
    #[error("division by zero in constant expression")]
    ConstDivisionByZero,
    #[error("`{name}` is reserved in C and can't be used as an identifier")]
    ReservedIdentifier { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn eval(src: &str) -> std::result::Result<i64, String> {
        let expr = parser::parse_expr(src, &mut Vec::new()).unwrap();
        eval_const("g", &expr).map_err(|e| format!("{e:#}"))
    }

    #[test]
    fn test_eval_const() {
        assert_eq!(eval("1 + 2 * 3"), Ok(7));
        assert_eq!(eval("-(10 - 4) / 4"), Ok(-1));
        assert_eq!(eval("17 % 5"), Ok(2));
        assert_eq!(eval("'a' + 1"), Ok(98));
        assert_eq!(eval("1 < 2"), Ok(1));
        assert_eq!(eval("true"), Ok(1));
        assert_eq!(
            eval("1 + x"),
            Err("1:5: global `g` must be initialized with a constant expression".into())
        );
        assert_eq!(
            eval("1 / (2 - 2)"),
            Err("1:1: division by zero in constant expression".into())
        );
    }

    #[test]
    fn test_extension() {
        assert_eq!(Emit::C.extension(), "c");
        for &target in Target::ALL {
            assert_eq!(Emit::Asm(target).extension(), "s");
        }
    }
}
