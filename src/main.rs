use vault_pki_keys::cli::{handle_command, Cli};

#[tokio::main]
async fn main() {
    use clap::Parser;
    let cli = Cli::parse();

    if let Err(e) = handle_command(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
