use clap::Parser;
use conduit::cli::{
    capabilities, handle_completions, handle_config_init, handle_config_validate, load_config,
    providers, submit, Cli, Commands, ConfigCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => conduit::cli::serve::run_serve(args).await,
        Commands::Providers(args) => load_config(&args.config)
            .and_then(|config| providers::handle_providers(&args, &config))
            .map(|output| println!("{}", output)),
        Commands::Capabilities(args) => load_config(&args.config)
            .and_then(|config| capabilities::handle_capabilities(&args, &config))
            .map(|output| println!("{}", output)),
        Commands::Submit(args) => match load_config(&args.config) {
            Ok(config) => submit::handle_submit(&args, &config)
                .await
                .map(|output| println!("{}", output)),
            Err(e) => Err(e),
        },
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
            ConfigCommands::Validate(args) => {
                handle_config_validate(&args).map(|output| println!("{}", output))
            }
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
