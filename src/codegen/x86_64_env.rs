/// Differences between the assemblers and ABIs of each supported platform.
pub trait Env {
    /// Prepended to every function symbol.
    const SYMBOL_PREFIX: &str;
    /// Prefix of labels that never reach the symbol table.
    const PRIVATE_LABEL_PREFIX: &str;

    const GLOBAL_PROLOGUE: &str;

    const SECTION_TEXT: &str;
    const SECTION_READ_ONLY_DATA: &str;
    const SECTION_DATA: &str;

    /// Operand of the `call` instruction which reaches libc's `printf`.
    const PRINTF: &str;
}

impl Env for Darwin {
    const SYMBOL_PREFIX: &str = "_";
    const PRIVATE_LABEL_PREFIX: &str = "L";

    const GLOBAL_PROLOGUE: &str = ".intel_syntax noprefix\n";

    const SECTION_TEXT: &str = "__TEXT,__text,regular,pure_instructions";
    const SECTION_READ_ONLY_DATA: &str = "__TEXT,__const";
    const SECTION_DATA: &str = "__DATA,__data";

    const PRINTF: &str = "_printf";
}

impl Env for Linux {
    const SYMBOL_PREFIX: &str = "";
    const PRIVATE_LABEL_PREFIX: &str = ".L";

    const GLOBAL_PROLOGUE: &str = concat!(
        ".intel_syntax noprefix\n",
        ".section .note.GNU-stack,\"\",@progbits\n",
    );

    const SECTION_TEXT: &str = ".text";
    const SECTION_READ_ONLY_DATA: &str = ".rodata";
    const SECTION_DATA: &str = ".data";

    const PRINTF: &str = "printf@PLT";
}

pub struct Darwin;

pub struct Linux;
