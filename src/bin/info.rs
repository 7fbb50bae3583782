//! Query basic information from a terminal over the binary protocol.

use anyhow::Context;
use clap::Parser;
use zkgate::terminal::Terminal;

#[derive(Parser)]
#[command(about = "Print version, identity and clock of a ZKTeco terminal")]
struct Args {
    /// Address of the device, e.g. 192.168.1.201:4370
    #[arg(long, env = "ZK_ADDRESS", default_value = "192.168.1.201:4370")]
    host: String,

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

    println!("Version:     {}", terminal.get_version().await?);
    println!("Serial No:   {}", terminal.get_info("~SerialNumber").await?);
    println!("Platform:    {}", terminal.get_info("~Platform").await?);
    println!("DeviceName:  {}", terminal.get_info("~DeviceName").await?);
    println!("Device Time: {}", terminal.get_time().await?);

    terminal.disconnect().await?;

    Ok(())
}
