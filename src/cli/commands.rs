//! Command handlers for the gridstream CLI

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{info, warn};

use crate::app::{ClientId, JobInstance, ReadOutcome, Tag};
use crate::config::AppConfig;
use crate::constants::{follow, streams};

use super::args::RunArgs;

/// Client identity used by the stdout follower
const STDOUT_CLIENT: ClientId = ClientId(1);
/// Client identity used by the stderr follower
const STDERR_CLIENT: ClientId = ClientId(2);

/// Run a command with its output cached and followed
pub async fn handle_run(args: RunArgs, config: AppConfig) -> Result<()> {
    let instance_dir = match args.instance_dir {
        Some(dir) => dir,
        None => {
            let root = match &config.streams.instance_root {
                Some(root) => root.clone(),
                None => std::env::current_dir().context("cannot determine working directory")?,
            };
            root.join(format!("gridstream-{}", std::process::id()))
        }
    };

    let instance = Arc::new(JobInstance::new(&instance_dir, config.to_reader_config()));
    instance.register_stream(streams::STDOUT).await?;
    instance.register_stream(streams::STDERR).await?;

    let program = &args.command[0];
    info!("Running '{}' under {}", program, instance_dir.display());

    let mut child = Command::new(program)
        .args(&args.command[1..])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn '{}'", program))?;

    let child_stdout = child.stdout.take().context("child stdout not captured")?;
    let child_stderr = child.stderr.take().context("child stderr not captured")?;

    instance.start_stream(streams::STDOUT, child_stdout).await?;
    instance.start_stream(streams::STDERR, child_stderr).await?;

    // Follow both streams the way a remote client would: repeated reads
    // at the next offset, each suspending until data arrives or the
    // stream ends.
    let followers = if args.no_follow {
        Vec::new()
    } else {
        vec![
            tokio::spawn(follow_stream(
                Arc::clone(&instance),
                streams::STDOUT.to_string(),
                STDOUT_CLIENT,
                tokio::io::stdout(),
            )),
            tokio::spawn(follow_stream(
                Arc::clone(&instance),
                streams::STDERR.to_string(),
                STDERR_CLIENT,
                tokio::io::stderr(),
            )),
        ]
    };

    let status = child.wait().await.context("waiting for child failed")?;
    instance
        .set_exit_status(status.code().unwrap_or(-1))
        .await?;

    for joined in join_all(followers).await {
        if let Err(e) = joined.context("follower task panicked")? {
            warn!("Stream follower stopped early: {}", e);
        }
    }

    // Read the exit status back through the gate, as a grid client would.
    let outcome = instance
        .read_exit_status(STDOUT_CLIENT, 0, follow::FOLLOW_READ_COUNT)
        .await?;
    let rendered = String::from_utf8_lossy(outcome.bytes()).to_string();
    println!("exit status: {}", rendered);

    if !args.keep_cache {
        instance.delete().await?;
    } else {
        info!("Cached streams kept under {}", instance_dir.display());
    }

    Ok(())
}

/// Follow one stream to EOF, echoing each chunk to a local sink
async fn follow_stream<W>(
    instance: Arc<JobInstance>,
    name: String,
    client: ClientId,
    mut sink: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut offset: u64 = 0;
    let mut tag: u16 = 0;

    loop {
        let outcome = instance
            .read_stream(&name, client, Tag(tag), offset, follow::FOLLOW_READ_COUNT)
            .await
            .with_context(|| format!("reading stream '{}' at offset {}", name, offset))?;
        tag = tag.wrapping_add(1);

        match outcome {
            ReadOutcome::Data(bytes) => {
                offset += bytes.len() as u64;
                sink.write_all(&bytes)
                    .await
                    .context("writing to local sink")?;
                sink.flush().await.context("flushing local sink")?;
            }
            ReadOutcome::Eof => {
                info!("Stream '{}' ended after {} bytes", name, offset);
                return Ok(());
            }
        }
    }
}
