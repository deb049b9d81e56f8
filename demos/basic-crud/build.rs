use std::path::Path;

fn main() {
    let schema = "data/schema.yaml";
    println!("cargo:rerun-if-changed={schema}");

    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let out = Path::new(&out_dir).join("docrepo_generated.rs");
    match docrepo_codegen::generate_from_schema(schema, &out) {
        Ok(notes) => {
            for note in notes {
                println!("cargo:warning={note}");
            }
        }
        Err(e) => panic!("docrepo code generation failed: {e}"),
    }
}
