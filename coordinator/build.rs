fn main() {
    #[cfg(feature = "regen-proto")]
    {
        let proto_file = "../proto/fl_round.proto";
        let proto_dir = "../proto";

        // Rerun if proto file changes
        println!("cargo:rerun-if-changed={}", proto_file);

        tonic_build::configure()
            .build_server(true)
            .build_client(true)
            .bytes(["."])
            .out_dir("src/proto")
            .compile_protos(&[proto_file], &[proto_dir])
            .expect("Failed to compile fl_round.proto");
    }
}
