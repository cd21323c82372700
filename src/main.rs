use gesturectl::{cli, logging};

fn main() -> anyhow::Result<()> {
    let debug = std::env::args().any(|a| a == "--debug");
    logging::init(debug);
    cli::run()
}
