#[cfg(feature = "generate")]
fn main() {
    let b = proto_build::Boilerplate::create();
    let proto_build = b.resolve_sqlflow_targets();

    prost_build::Config::new()
        .out_dir(&b.src_dir)
        .file_descriptor_set_path(&b.descriptor_path)
        .type_attribute(".", "#[derive(serde::Serialize, serde::Deserialize)]")
        .type_attribute(".", "#[serde(rename_all = \"camelCase\")]")
        .compile_protos(&proto_build, &b.proto_include())
        .expect("failed to compile protobuf");
}

#[cfg(not(feature = "generate"))]
fn main() {}
