//! driftsync server: keep a directory in sync with a client

use clap::Parser;
use driftsync::cli::{init_tracing, ServerArgs};
use driftsync::service::SyncServer;
use driftsync::vfs::LocalFilesystem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
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
        "starting server"
    );

    let fs = LocalFilesystem::new(&args.target_dir);
    let server = SyncServer::new(config, fs);

    let runner = server.clone();
    let mut serving = tokio::spawn(async move { runner.serve().await });

    tokio::select! {
        result = &mut serving => result??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping server");
            server.stop();
            serving.await??;
        }
    }

    Ok(())
}
