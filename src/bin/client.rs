//! driftsync client: mirror a local directory onto a server

use clap::Parser;
use driftsync::cli::{init_tracing, ClientArgs};
use driftsync::service::SyncClient;
use driftsync::vfs::LocalFilesystem;
use driftsync::watch::{spawn_watcher, watch_loop};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ClientArgs::parse();
    init_tracing(args.verbose, args.json);

    anyhow::ensure!(
        args.target_dir.is_dir(),
        "target directory {} does not exist",
        args.target_dir.display()
    );

    let config = args.to_config();
    config.validate()?;
    tracing::info!(
        dir = %args.target_dir.display(),
        address = %config.address,
        block_size = config.block_size,
        watch = args.watch,
        "starting client"
    );

    let fs = LocalFilesystem::new(&args.target_dir);
    let mut client = SyncClient::new(config.clone(), fs);
    client.dial().await?;

    client.sync_cycle().await?;

    if args.watch {
        let (_watcher, mut events) = spawn_watcher(&args.target_dir, config.debounce())?;
        let (done_tx, _done_rx) = mpsc::unbounded_channel();

        tokio::select! {
            result = watch_loop(&mut client, &mut events, done_tx) => result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
            }
        }
    }

    client.close();
    Ok(())
}
