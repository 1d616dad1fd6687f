fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The generated code under src/generated/ is committed so ordinary
    // builds do not need protoc. Set MT5_BRIDGE_REGEN_PROTO=1 after
    // editing proto/mt5.proto to refresh it.
    if std::env::var_os("MT5_BRIDGE_REGEN_PROTO").is_some() {
        tonic_build::configure()
            .build_server(true)
            .build_client(false)
            .out_dir("src/generated")
            .compile(&["../../proto/mt5.proto"], &["../../proto"])?;
    }

    println!("cargo:rerun-if-changed=../../proto/mt5.proto");
    Ok(())
}
