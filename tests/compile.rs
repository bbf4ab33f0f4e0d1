use az::{
    codegen::{Emit, Target},
    compile, compile_with,
    module::MemoryLoader,
    Error,
};
use indoc::indoc;
use pretty_assertions::assert_eq;

const LINUX: Emit = Emit::Asm(Target::x86_64_linux);

fn error_string(loader: &MemoryLoader, entry: &str, emit: Emit) -> String {
    compile_with(loader, entry, emit).unwrap_err().to_string()
}

#[test]
fn test_multi_module_c() {
    let loader = MemoryLoader::new()
        .with(
            "main.az",
            indoc! {r#"
                !use "math.az";
                int main() {
                    out@io(square@math(7));
                    return 0;
                }
            "#},
        )
        .with("math.az", "int square(int x) { return x * x; }\n");

    let output = compile_with(&loader, "main.az", Emit::C).unwrap();
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

        int math__square(int x);
        int main(void);

        int math__square(int x) {
            return (x * x);
        }

        int main(void) {
            io__out(math__square(7));
            return 0;
        }
    "#};
    assert_eq!(output.code, expected);

    let header = indoc! {"
        #ifndef AZ_PROGRAM_H
        #define AZ_PROGRAM_H

        #include <stdint.h>
        #include <stdbool.h>

        int math__square(int x);
        int main(void);

        #endif
    "};
    assert_eq!(output.header, header);
}

#[test]
fn test_asm_single_module() {
    let loader = MemoryLoader::new().with(
        "main.az",
        indoc! {r#"
            int main() {
                int n = 5;
                int acc = 1;
                while (n > 1) {
                    acc = acc * n;
                    n = n - 1;
                }
                out@io(acc);
                out@io("bye");
                return 0;
            }
        "#},
    );

    let code = compile_with(&loader, "main.az", LINUX).unwrap().code;
    assert!(code.starts_with(".intel_syntax noprefix\n"));
    assert!(code.contains(".global main\nmain:\n"));
    assert!(code.contains("    sub rsp, 16\n"));
    assert!(code.contains("    imul rax, rcx\n"));
    assert!(code.contains("    call printf@PLT\n"));
    assert!(code.contains(".Lstr0:\n    .asciz \"bye\"\n"));

    let darwin = compile_with(&loader, "main.az", Emit::Asm(Target::x86_64_darwin))
        .unwrap()
        .code;
    assert!(darwin.contains(".global _main\n_main:\n"));
    assert!(darwin.contains("    call _printf\n"));
}

#[test]
fn test_errors_abort_compilation() {
    let loader = MemoryLoader::new()
        .with("syntax.az", "int main() {\n  return 0\n}\n")
        .with("types.az", "int main() {\n  return true;\n}\n")
        .with("nore_main.az", "nore main() {\n  return;\n}\n")
        .with("uses_missing.az", "!use \"nowhere.az\";\nint main() { return 0; }\n")
        .with("global.az", "int g = f();\nint f() { return 1; }\nint main() { return g; }\n")
        .with("call.az", "int f() { return 1; }\nint main() { return f(); }\n")
        .with("reserved.az", "int main() {\n  int double = 1;\n  return double;\n}\n");

    assert_eq!(
        error_string(&loader, "syntax.az", Emit::C),
        "syntax.az:3:1: expected token Semicolon, but got RBrace"
    );
    assert_eq!(
        error_string(&loader, "types.az", Emit::C),
        "2:10: mismatched types: expected `int`, found `bool`"
    );
    assert_eq!(
        error_string(&loader, "nore_main.az", Emit::C),
        "1:1: `main` must return `int`, found `nore`"
    );
    assert_eq!(
        error_string(&loader, "uses_missing.az", Emit::C),
        "module `nowhere.az` not found"
    );
    assert_eq!(
        error_string(&loader, "global.az", Emit::C),
        "1:9: global `g` must be initialized with a constant expression"
    );
    assert_eq!(
        error_string(&loader, "reserved.az", Emit::C),
        "2:3: `double` is reserved in C and can't be used as an identifier"
    );
    assert!(matches!(
        compile_with(&loader, "call.az", LINUX),
        Err(Error::Generation(_))
    ));
}

#[test]
fn test_demos() {
    // Integration tests run from the package root, which is where the demo
    // `use` paths are relative to.
    let hello = compile("demos/hello.az", LINUX).unwrap();
    assert!(hello.code.contains(".asciz \"hello, world\""));

    let multi = compile("demos/multi/main.az", Emit::C).unwrap();
    assert!(multi.code.contains("int math__sum_squares(int n) {"));
    assert!(multi.code.contains("total = (total + math__square(i));"));
    assert!(multi.code.contains("io__out(math__gcd(84, 36));"));

    let cycle = compile("demos/cycle/a.az", Emit::C).unwrap();
    assert!(cycle.code.contains("return (b__pong((n - 1)) + 1);"));
    assert!(cycle.code.contains("io__out(b__ping(4));"));

    let big = compile("demos/big.az", Emit::C).unwrap();
    assert!(big.code.contains("char line[64];"));
    assert!(big.header.contains("int main(void);"));
}
