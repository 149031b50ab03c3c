use std::path::{Path, PathBuf};

use anyhow::Context;
use mesh_tools_lib::{load_mesh, load_mesh_with_format, Format};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let mut path: Option<PathBuf> = None;
    let mut format: Option<Format> = None;
    let mut json = false;
    let mut tree = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--format" => {
                match args.get(i + 1).map(|s| s.as_str()) {
                    Some("obj") => format = Some(Format::Obj),
                    Some("md2") => format = Some(Format::Md2),
                    Some("md5mesh") => format = Some(Format::Md5Mesh),
                    Some("md5anim") => format = Some(Format::Md5Anim),
                    Some(other) => {
                        eprintln!(
                            "Unknown format '{}', expected obj, md2, md5mesh or md5anim",
                            other
                        );
                        std::process::exit(1);
                    }
                    None => {
                        eprintln!("--format requires a value");
                        std::process::exit(1);
                    }
                }
                i += 2;
            }
            "--json" => {
                json = true;
                i += 1;
            }
            "--tree" => {
                tree = true;
                i += 1;
            }
            other if other.starts_with("--") => {
                eprintln!("Unknown flag '{}'", other);
                std::process::exit(1);
            }
            other => {
                if path.is_some() {
                    eprintln!("Only one input file at a time");
                    std::process::exit(1);
                }
                path = Some(PathBuf::from(other));
                i += 1;
            }
        }
    }

    let path = match path {
        Some(path) => path,
        None => usage(),
    };

    if let Err(err) = run(&path, format, json, tree) {
        eprintln!("mesh_inspect failed: {:?}", err);
        std::process::exit(1);
    }
}

fn run(path: &Path, format: Option<Format>, json: bool, tree: bool) -> anyhow::Result<()> {
    let mesh = match format {
        Some(format) => load_mesh_with_format(path, format),
        None => load_mesh(path),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    let summary = mesh.summarize();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.name);
        println!("  positions: {}", summary.position_count);
        println!("  texcoords: {}", summary.texcoord_count);
        println!("  normals:   {}", summary.normal_count);
        println!(
            "  faces:     {} in {} group(s)",
            summary.face_count, summary.group_count
        );
        println!("  materials: {}", summary.material_count);
        if summary.has_skeleton {
            println!(
                "  joints:    {} (depth {})",
                summary.joint_count, summary.skeleton_depth
            );
        }
        for warning in &summary.warnings {
            eprintln!("warning: {}", warning);
        }
    }

    if tree {
        match &mesh.skeleton {
            Some(skeleton) => skeleton
                .print_joint_tree()
                .context("printing the joint tree")?,
            None => eprintln!("{} has no skeleton", path.display()),
        }
    }

    Ok(())
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  mesh_inspect <file> [--format obj|md2|md5mesh|md5anim] [--json] [--tree]");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  mesh_inspect models/crate.obj");
    eprintln!("  mesh_inspect frames.bin --format md2 --json");
    eprintln!("  mesh_inspect walk.md5anim --tree");
    std::process::exit(1);
}
