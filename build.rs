use clap::Shell;
use std::path::PathBuf;

#[path = "src/cli.rs"]
mod cli;

fn main() {
    let mut cli = cli::generate_cli();
    let mut out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR not set"));
    let _ = out_dir.pop();
    let _ = out_dir.pop();
    let _ = out_dir.pop();

    cli.gen_completions("chain-analyzer", Shell::Bash, &out_dir);
    cli.gen_completions("chain-analyzer", Shell::Fish, out_dir);
}
