use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::BIN_NAME;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory, relative to the workspace root
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(&args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let cmd = herald::command();
    write_page(&cmd, &out_dir.join(format!("{BIN_NAME}.1")))?;
    for sub in cmd.get_subcommands() {
        let page = out_dir.join(format!("{BIN_NAME}-{}.1", sub.get_name()));
        write_page(sub, &page)?;
    }
    Ok(())
}

fn write_page(cmd: &clap::Command, path: &Path) -> Result<(), String> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut buffer)
        .map_err(|e| format!("render {}: {e}", cmd.get_name()))?;
    fs::write(path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
