#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum Target {
    x86_64_darwin,
    x86_64_linux,
    #[clap(skip)]
    None,
}

impl TryFrom<Target> for az::codegen::Target {
    type Error = ();

    fn try_from(value: Target) -> Result<Self, ()> {
        match value {
            Target::x86_64_darwin => Ok(az::codegen::Target::x86_64_darwin),
            Target::x86_64_linux => Ok(az::codegen::Target::x86_64_linux),
            Target::None => Err(()),
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "x86_64", target_os = "macos"))] {
        pub const DEFAULT_TARGET: Target = Target::x86_64_darwin;
    } else if #[cfg(all(target_arch = "x86_64", target_os = "linux"))] {
        pub const DEFAULT_TARGET: Target = Target::x86_64_linux;
    } else {
        pub const DEFAULT_TARGET: Target = Target::None;
    }
}

/// What the compiler writes out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum EmitKind {
    Asm,
    C,
}
