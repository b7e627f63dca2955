mod commands;
mod emitter;
mod terminal;

use commands::{CommandLine, Commands, discover, interfaces, ranges, run};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose);
    print::banner();

    match commands.command {
        Commands::Discover(args) => {
            print::header("getting ready for discovery");
            discover::discover(args).await
        }
        Commands::Run(args) => run::run(args).await,
        Commands::Ranges(args) => ranges::ranges(args),
        Commands::Interfaces { class } => {
            interfaces::interfaces(class);
            Ok(())
        }
    }
}
