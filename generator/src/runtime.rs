use crate::tree::RuntimeFile;

pub const FUZZLIB_NAME: &str = "fuzzlib.php";

const FUZZLIB: &str = include_str!("php/fuzzlib.php");

/// Support files that every generated program requires.
pub fn runtime_files() -> Vec<RuntimeFile> {
    vec![RuntimeFile {
        name: FUZZLIB_NAME,
        contents: FUZZLIB,
    }]
}
