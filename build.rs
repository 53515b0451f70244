fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR")?);

    // Compile proto files with file descriptor for reflection
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/proto")
        .file_descriptor_set_path(out_dir.join("market_descriptor.bin"))
        .compile_protos(&["proto/items.proto", "proto/health.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/");
    println!("cargo:rerun-if-changed=migrations/");

    Ok(())
}
