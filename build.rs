use std::io::Result;

fn main() -> Result<()> {
    prost_build::compile_protos(&["src/dialogue_tree.proto"], &["src/"])?;

    Ok(())
}
