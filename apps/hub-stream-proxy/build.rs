//! Build Script for Hub Stream Proxy
//!
//! The generated protobuf stubs are checked in under
//! `src/infrastructure/grpc/proto/`. Set `HUB_STREAM_PROXY_REGENERATE_PROTO=1`
//! to rebuild them from `packages/proto` (requires `protoc` in PATH).

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=HUB_STREAM_PROXY_REGENERATE_PROTO");

    if std::env::var("HUB_STREAM_PROXY_REGENERATE_PROTO").as_deref() != Ok("1") {
        return Ok(());
    }

    let proto_root = "../../packages/proto";
    let protos = [
        "../../packages/proto/hubstream/proxy/v1/proxy.proto",
        "../../packages/proto/hubstream/unistream/v1/unistream.proto",
        "../../packages/proto/hubstream/unistream/v2/unistream.proto",
    ];

    for proto in &protos {
        println!("cargo:rerun-if-changed={proto}");
    }

    if !std::path::Path::new(protos[0]).exists() {
        println!("cargo:warning=Proto sources not found, keeping checked-in stubs");
        return Ok(());
    }

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/infrastructure/grpc/proto")
        .compile_protos(&protos, &[proto_root])?;

    Ok(())
}
