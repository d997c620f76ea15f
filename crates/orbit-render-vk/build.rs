use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());
    let dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap()).join("shaders");

    // Vertex layout must match orbit_assets::Vertex:
    //   - binding 0, location 0: R32G32B32_SFLOAT (pos)
    //   - binding 0, location 1: R32G32_SFLOAT (uv)
    let stages = [
        ("mesh.vert", shaderc::ShaderKind::Vertex),
        ("mesh.frag", shaderc::ShaderKind::Fragment),
    ];

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for (name, kind) in stages {
        let path = dir.join(name);
        let src = fs::read_to_string(&path).unwrap();
        let spv = comp
            .compile_into_spirv(&src, kind, name, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8()).unwrap();
        println!("cargo:rerun-if-changed={}", path.display());
    }

    println!("cargo:rerun-if-changed=build.rs");
}
