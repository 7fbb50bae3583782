//! List the users registered on a terminal.

use anyhow::Context;
use clap::Parser;
use zkgate::terminal::{Terminal, UserCatalog};

#[derive(Parser)]
#[command(about = "List users registered on a ZKTeco terminal")]
struct Args {
    /// Address of the device, e.g. 192.168.1.201:4370
    #[arg(long, env = "ZK_ADDRESS", default_value = "192.168.1.201:4370")]
    host: String,

    /// Only list users whose name contains this text
    #[arg(long, default_value = "")]
    name: String,

    /// Enable protocol-level frame dumps
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    zkgate::logging::init(args.verbose);

    let mut terminal = Terminal::new(&args.host);
    terminal
        .connect()
        .await
        .with_context(|| format!("connecting to {}", args.host))?;

    let mut catalog = UserCatalog::new(&mut terminal);
    let users = catalog.find_by_name(&args.name).await?;

    for user in &users {
        println!("ID:   {}", user.user_id);
        println!("SN:   {}", user.serial);
        println!("Name: {}", user.name);
        println!("Card: {}", user.card_no);
        println!("=============");
    }
    println!("{} user(s)", users.len());

    terminal.disconnect().await?;

    Ok(())
}
