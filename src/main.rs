use clap::Parser as _;
use homewhiz_tools::commands;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(clap::Parser)]
#[clap(version, about, author)]
enum Commands {
    Controls(commands::controls::Args),
    Decode(commands::decode::Args),
    Monitor(commands::monitor::Args),
    Encode(commands::encode::Args),
}

fn end<E: std::error::Error>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            1
        }
    });
}

fn main() {
    let filter_description = std::env::var("HOMEWHIZ_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = match filter_description.parse::<tracing_subscriber::filter::Targets>() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("error: HOMEWHIZ_LOG is not a valid filter: {e}");
            std::process::exit(2);
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    match Commands::parse() {
        Commands::Controls(args) => end(commands::controls::run(args)),
        Commands::Decode(args) => end(commands::decode::run(args)),
        Commands::Monitor(args) => end(commands::monitor::run(args)),
        Commands::Encode(args) => end(commands::encode::run(args)),
    }
}
