//! `jbs` entry point: run a file, evaluate a snippet, or start the REPL.

fn main() {
    std::process::exit(jiaobenscript::cli::run_cli());
}
