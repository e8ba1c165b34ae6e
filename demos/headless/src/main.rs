//! Headless client: logs in, enters the game, asks who is online, then
//! prints server text until interrupted. With `--servers` it only lists
//! what the metaservers know.
//!
//! ```text
//! ASHFIRE_SERVER=localhost ASHFIRE_ACCOUNT=me ASHFIRE_PASSWORD=pw \
//!     ASHFIRE_CHARACTER=Ash cargo run -p headless [config.json]
//! cargo run -p headless -- --servers [config.json]
//! ```

use std::time::Duration;

use ashfire::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info");

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let list_servers = args.first().is_some_and(|a| a == "--servers");
    if list_servers {
        args.remove(0);
    }
    let mut config = match args.first() {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    config.apply_env();

    if list_servers {
        let servers = fetch_servers(&config.metaservers, config.metaserver_timeout()).await;
        for server in &servers {
            println!(
                "{:<40} {:>4} players  {}  {}",
                server.address(),
                server.num_players,
                server.version,
                server.text_comment
            );
        }
        eprintln!("{} servers", servers.len());
        return Ok(());
    }
    eprintln!("connecting to {} as {}", config.server, config.account);

    let client = Client::join(config, JsonCodec).await?;
    let stage = client.wait_for(Stage::is_playing, Duration::from_secs(30)).await;
    if !stage.is_playing() {
        eprintln!("not in the game: {stage}");
        client.shutdown().await;
        return Ok(());
    }

    client.issue(StandardCommand::Who)?;

    let mut poll = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => {
                let (lines, done) = client.with_world_mut(|w| (w.drain_messages(), w.take_completed()));
                for line in lines {
                    println!("{}", line.message);
                }
                for query in done {
                    println!("--- {} ---\n{}", query.command, query.text);
                }
                let stage = client.stage();
                if stage.is_ended() {
                    eprintln!("{stage}");
                    break;
                }
            }
        }
    }

    tracing::info!("shutting down");
    client.shutdown().await;
    Ok(())
}
