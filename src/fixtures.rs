#[cfg(test)]
pub mod test {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    pub const BASIC_YAML: &str = "foo:\n  bar: 1\n  baz: 2\n";

    pub const BASIC2_YAML: &str = "foo:\n  baz: 3\n  qux: 4\n";

    pub const FLATTEN_YAML: &str = "foo:\n  bar: 1\n  baz: 2\ntar: test\nvar: variation\n";

    /// Flat keys of every leaf type the parser derives flags for.
    pub const ARGUMENTS_YAML: &str = "\
foo: test
bar: 1234
var: true
rate: 0.5
";

    /// Nested sections, lists and metadata, exercising the write-back walk.
    pub const ARGUMENTS_COMPLEX_YAML: &str = "\
model:
  name: resnet
  depth: 50
  dropout: 0.1
  pretrained: false
optimizer:
  type: sgd
  params:
    lr: 0.01
    momentum: 0.9
milestones: [30, 60, 90]
tags: []
notes: ~
_version: 5
";

    /// Clears the active configuration on creation and on drop, so a failing
    /// test cannot leak its instance into the next one on the same thread.
    pub struct RegistryGuard;

    impl RegistryGuard {
        pub fn new() -> Self {
            crate::registry::clear();
            Self
        }
    }

    impl Drop for RegistryGuard {
        fn drop(&mut self) {
            crate::registry::clear();
        }
    }

    /// Write `content` at `relative` inside `dir`, creating parent directories.
    pub fn write_fixture(dir: &TempDir, relative: &str, content: &str) -> PathBuf {
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn fixtures_are_valid_yaml() {
        for body in [
            BASIC_YAML,
            BASIC2_YAML,
            FLATTEN_YAML,
            ARGUMENTS_YAML,
            ARGUMENTS_COMPLEX_YAML,
        ] {
            let parsed: serde_yaml::Mapping = serde_yaml::from_str(body).unwrap();
            assert!(!parsed.is_empty());
        }
    }
}
