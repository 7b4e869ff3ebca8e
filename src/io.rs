use std::path::{Path, PathBuf};

/// File lookup used by the linker's texture fallback and by the program compiler.
pub trait FileSystem {
    /// Resolve `name` to an existing file, or `None` when nothing matches.
    fn find_file(&self, name: &str) -> Option<PathBuf>;
}

/// Expands variables embedded in annotation strings before any file lookup.
///
/// The substitution syntax belongs to the host; the session only calls `parse`.
pub trait VariableParser {
    fn parse(&self, input: &str) -> String;
}

/// Identity parser, for hosts without variable substitution.
#[derive(Debug, Default, Clone, Copy)]
pub struct Verbatim;

impl VariableParser for Verbatim {
    fn parse(&self, input: &str) -> String {
        input.to_string()
    }
}

/// Looks a name up as given (absolute or relative to the working directory), then
/// relative to each search path in order.
#[derive(Debug, Clone, Default)]
pub struct SearchPathFileSystem {
    roots: Vec<PathBuf>,
}

impl SearchPathFileSystem {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl FileSystem for SearchPathFileSystem {
    fn find_file(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }

        let direct = Path::new(name);
        if direct.is_absolute() {
            return direct.is_file().then(|| direct.to_path_buf());
        }

        self.roots
            .iter()
            .map(|root| root.join(direct))
            .find(|candidate| candidate.is_file())
            .or_else(|| direct.is_file().then(|| direct.to_path_buf()))
    }
}

pub(crate) fn load_binary(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|err| format!("Failed to read {:?}: {}", path, err))
}

pub(crate) fn load_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|err| format!("Failed to read {:?}: {}", path, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wgpu-effects-io-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn search_paths_are_tried_in_order() {
        let first = scratch_dir("first");
        let second = scratch_dir("second");
        std::fs::write(second.join("noise.png"), b"x").unwrap();
        std::fs::write(first.join("only_first.txt"), b"x").unwrap();

        let fs = SearchPathFileSystem::new(vec![first.clone(), second.clone()]);

        assert_eq!(fs.find_file("noise.png"), Some(second.join("noise.png")));
        assert_eq!(
            fs.find_file("only_first.txt"),
            Some(first.join("only_first.txt"))
        );
        assert_eq!(fs.find_file("missing.png"), None);
        assert_eq!(fs.find_file(""), None);
    }

    #[test]
    fn verbatim_parser_is_identity() {
        assert_eq!(Verbatim.parse("$(textures)/a.png"), "$(textures)/a.png");
    }
}
