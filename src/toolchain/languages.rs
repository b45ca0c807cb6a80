//! Built-in language table.
//!
//! Each supported language has a [`LanguageSpec`] with its compiler search
//! order, extension tables, default linker preference and the minimal program
//! used to validate a freshly discovered compiler.

/// Static description of a language kiln knows how to enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageSpec {
    /// Language name as written in `Kiln.toml`
    pub name: &'static str,

    /// Environment variable naming the compiler
    pub env_var: &'static str,

    /// Compiler names searched on PATH, in order
    pub candidates: &'static [&'static str],

    /// Source extensions claimed by the language
    pub source_extensions: &'static [&'static str],

    /// Extensions never compiled as sources
    pub ignore_extensions: &'static [&'static str],

    /// Object file extension
    pub output_extension: &'static str,

    /// Default linker preference
    pub linker_preference: i64,

    /// Flags for building shared libraries
    pub shared_library_flags: &'static [&'static str],

    /// Program used to validate the compiler: (file name, contents)
    pub test_source: Option<(&'static str, &'static str)>,
}

/// Pseudo-language that enables nothing.
pub const NONE: &str = "NONE";

#[cfg(windows)]
const OBJ: &str = ".obj";
#[cfg(not(windows))]
const OBJ: &str = ".o";

#[cfg(windows)]
const PIC_FLAGS: &[&str] = &[];
#[cfg(not(windows))]
const PIC_FLAGS: &[&str] = &["-fPIC"];

const C_IGNORE: &[&str] = &["h", "H", "o", "O", "obj", "OBJ", "def", "DEF", "rc", "RC"];

/// Every language kiln can enable.
pub const LANGUAGES: &[LanguageSpec] = &[
    LanguageSpec {
        name: "C",
        env_var: "CC",
        candidates: &["cc", "gcc", "clang", "cl"],
        source_extensions: &["c", "m"],
        ignore_extensions: C_IGNORE,
        output_extension: OBJ,
        linker_preference: 10,
        shared_library_flags: PIC_FLAGS,
        test_source: Some(("main.c", "int main(void) { return 0; }\n")),
    },
    LanguageSpec {
        name: "CXX",
        env_var: "CXX",
        candidates: &["c++", "g++", "clang++", "cl"],
        source_extensions: &["C", "M", "c++", "cc", "cpp", "cxx", "mm", "CPP"],
        ignore_extensions: &["inl", "h", "hpp", "HPP", "H", "o", "O", "obj", "OBJ", "def", "DEF", "rc", "RC"],
        output_extension: OBJ,
        linker_preference: 30,
        shared_library_flags: PIC_FLAGS,
        test_source: Some(("main.cpp", "int main() { return 0; }\n")),
    },
    LanguageSpec {
        name: "Fortran",
        env_var: "FC",
        candidates: &["gfortran", "flang", "ifort", "f95"],
        source_extensions: &["f", "F", "fpp", "FPP", "f77", "F77", "f90", "F90", "for", "For", "FOR", "f95", "F95"],
        ignore_extensions: &["mod", "MOD", "o", "O", "obj", "OBJ"],
        output_extension: OBJ,
        linker_preference: 20,
        shared_library_flags: PIC_FLAGS,
        test_source: Some(("main.f90", "program main\nend program main\n")),
    },
    LanguageSpec {
        name: "ASM",
        env_var: "ASM",
        candidates: &["as", "cc", "gcc", "clang"],
        source_extensions: &["s", "S", "asm"],
        ignore_extensions: &["o", "O", "obj", "OBJ"],
        output_extension: OBJ,
        linker_preference: 0,
        shared_library_flags: &[],
        test_source: None,
    },
];

/// Look up a language by name.
pub fn lookup(name: &str) -> Option<&'static LanguageSpec> {
    LANGUAGES.iter().find(|l| l.name == name)
}

/// Names of every known language, for error messages.
pub fn known_names() -> Vec<&'static str> {
    LANGUAGES.iter().map(|l| l.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let c = lookup("C").unwrap();
        assert_eq!(c.env_var, "CC");
        assert!(c.source_extensions.contains(&"c"));
        assert!(lookup("COBOL").is_none());
        assert!(lookup("c").is_none());
    }

    #[test]
    fn test_cxx_prefers_linking_over_c() {
        let c = lookup("C").unwrap();
        let cxx = lookup("CXX").unwrap();
        let fortran = lookup("Fortran").unwrap();
        assert!(cxx.linker_preference > fortran.linker_preference);
        assert!(fortran.linker_preference > c.linker_preference);
    }

    #[test]
    fn test_extension_tables_do_not_overlap() {
        for lang in LANGUAGES {
            for ext in lang.source_extensions {
                assert!(!lang.ignore_extensions.contains(ext), "{} {}", lang.name, ext);
            }
        }
    }
}
