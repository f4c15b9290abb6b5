pub use std::path::{Path, PathBuf};

pub struct Boilerplate {
    // Canonical path to this repository's root.
    pub repo_root: PathBuf,
    // Canonical path to the repository's protobuf sources.
    pub proto_root: PathBuf,
    // The './src' directory of the current crate.
    pub src_dir: PathBuf,
    // The protobuf descriptor path.
    pub descriptor_path: PathBuf,
}

impl Boilerplate {
    pub fn create() -> Self {
        let repo_root = std::fs::canonicalize(
            std::env::current_dir()
                .expect("resolving current dir")
                .join("../../"),
        )
        .expect("canonical repo root path");
        let proto_root = repo_root.join("proto");
        let src_dir = Path::new(&std::env::var("CARGO_MANIFEST_DIR").unwrap()).join("src");

        // Descriptors written by prost, which may be read by later build steps.
        let descriptor_path =
            Path::new(&std::env::var("OUT_DIR").unwrap()).join("proto_descriptor.bin");

        Self {
            repo_root,
            proto_root,
            src_dir,
            descriptor_path,
        }
    }

    pub fn proto_include(&self) -> Vec<&Path> {
        vec![&self.proto_root]
    }

    pub fn resolve_sqlflow_targets(&self) -> Vec<PathBuf> {
        let targets = vec![self.proto_root.join("sqlflow.proto")];
        Self::rerun_if_changed(&targets);
        targets
    }

    fn rerun_if_changed(targets: &[PathBuf]) {
        for path in targets.iter() {
            println!("cargo:rerun-if-changed={}", path.display());
        }
        // Emitting explicit paths drops the default behavior of watching
        // for changes to files in the crate root, which we also want:
        // See https://doc.rust-lang.org/cargo/reference/build-scripts.html#rerun-if-changed
        println!("cargo:rerun-if-changed=.");
    }
}
