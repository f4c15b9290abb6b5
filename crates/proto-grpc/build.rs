#[cfg(feature = "generate")]
fn main() {
    let b = proto_build::Boilerplate::create();
    let proto_build = b.resolve_sqlflow_targets();

    tonic_build::configure()
        .out_dir(&b.src_dir)
        .build_client(true)
        .build_server(true)
        .client_mod_attribute("sqlflow", "#[cfg(feature = \"sqlflow_client\")]")
        .extern_path(".sqlflow", "::proto_sqlflow::sqlflow")
        .server_mod_attribute("sqlflow", "#[cfg(feature = \"sqlflow_server\")]")
        .compile_protos(&proto_build, &b.proto_include())
        .expect("tonic build failed");
}

#[cfg(not(feature = "generate"))]
fn main() {}
