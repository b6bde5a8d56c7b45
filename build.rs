use std::io::Result;

fn main() -> Result<()> {
    std::env::set_var(
        "PROTOC",
        protoc_bin_vendored::protoc_bin_path().expect("bundled protoc binary"),
    );
    prost_build::compile_protos(
        &["proto/fileformat.proto", "proto/osmformat.proto"],
        &["proto/"],
    )?;
    Ok(())
}
