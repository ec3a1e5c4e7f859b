//! Federated Learning test client
//!
//! Walks through one round against a running `fl-server`: checks in, saves the
//! checkpoint if selected, sends it straight back as an update with a weight,
//! prints the reconnection time, and removes the local copy.
//!
//! # Usage
//!
//! ```bash
//! fl-client alice
//! fl-client bob --weight 296 --server http://10.0.0.5:50051
//! ```

use std::path::PathBuf;

use clap::Parser;
use futures::StreamExt;
use tokio::fs::File;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fl_coordinator::proto::fl_round_client::FlRoundClient;
use fl_coordinator::proto::{self, FlData};
use round_core::session::{CheckInRequest, ServerMessage, UpdateMessage};
use round_core::transfer::{read_chunks, ChunkAssembler, DEFAULT_CHUNK_SIZE};

/// Federated Learning test client
#[derive(Parser, Debug)]
#[command(name = "fl-client")]
#[command(about = "Runs one check-in and update against an FL round server")]
struct Args {
    /// Name sent with the check-in
    #[arg(default_value = "Me")]
    name: String,

    /// Server endpoint
    #[arg(short, long, default_value = "http://localhost:50051")]
    server: String,

    /// Where the downloaded checkpoint is stored
    #[arg(short, long, default_value = "./data/fl_checkpoint")]
    file: PathBuf,

    /// Weight reported with the update
    #[arg(short, long, default_value = "1")]
    weight: i64,

    /// Upload chunk size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut client = FlRoundClient::connect(args.server.clone()).await?;

    if let Some(secs) = download(&mut client, &args).await? {
        tracing::info!("Not selected. Reconnection time: {}", secs);
        return Ok(());
    }

    let secs = upload(&mut client, &args).await?;
    tracing::info!("Reconnection time: {}", secs);

    tokio::fs::remove_file(&args.file).await?;
    Ok(())
}

/// Checks in and saves the checkpoint. Returns the reconnection time if the
/// server turned the client away instead.
async fn download(
    client: &mut FlRoundClient<tonic::transport::Channel>,
    args: &Args,
) -> Result<Option<u64>, Box<dyn std::error::Error>> {
    let hello: proto::CheckInRequest = CheckInRequest {
        name: args.name.clone(),
    }
    .into();
    let mut inbound = client
        .check_in(tokio_stream::iter(vec![hello]))
        .await?
        .into_inner();

    if let Some(parent) = args.file.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut assembler = ChunkAssembler::new(File::create(&args.file).await?);

    while let Some(data) = inbound.next().await {
        match ServerMessage::try_from(data?)? {
            ServerMessage::Checkpoint(chunk) => assembler.append(&chunk).await?,
            ServerMessage::ReconnectAfter(secs) => {
                drop(assembler);
                tokio::fs::remove_file(&args.file).await?;
                return Ok(Some(secs));
            }
        }
    }

    let (_, stats) = assembler.finish().await?;
    tracing::info!(
        "Received checkpoint: {} bytes in {} chunks -> {}",
        stats.bytes,
        stats.chunks,
        args.file.display()
    );
    Ok(None)
}

/// Sends the saved checkpoint back as an update and returns the reconnection
/// time from the reply.
async fn upload(
    client: &mut FlRoundClient<tonic::transport::Channel>,
    args: &Args,
) -> Result<u64, Box<dyn std::error::Error>> {
    let file = File::open(&args.file).await?;
    let mut chunks = read_chunks(file, args.chunk_size);
    let weight = args.weight;

    let (tx, rx) = mpsc::channel::<FlData>(4);
    let producer = tokio::spawn(async move {
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => {
                    if tx.send(UpdateMessage::CheckpointUpdate(chunk).into()).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    // Closing without a weight makes the server drop the upload.
                    tracing::error!("Failed to read checkpoint: {}", e);
                    return;
                }
            }
        }
        let _ = tx.send(UpdateMessage::CheckpointWeight(weight).into()).await;
    });

    let reply = client.update(ReceiverStream::new(rx)).await?.into_inner();
    producer.await?;

    match ServerMessage::try_from(reply)? {
        ServerMessage::ReconnectAfter(secs) => Ok(secs),
        ServerMessage::Checkpoint(_) => Err("server replied with checkpoint data".into()),
    }
}
