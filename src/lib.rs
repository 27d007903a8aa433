pub mod common;
pub mod config;
pub mod dataset;
pub mod eval;
pub mod logging;
pub mod message;
pub mod model;
pub mod train;
pub mod training_stream;
pub mod utils;

pub(crate) const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";

use crate::common::*;

/// Runs a full training session: data stream, blocking training worker and
/// event logging worker, joined until the epoch loop completes or one of
/// them fails.
pub async fn start(config: config::Config) -> Result<()> {
    let start_time = Local::now();
    let log_dir = config
        .logging
        .log_dir
        .join(format!("{}", start_time.format(FILE_STRFTIME)));
    let checkpoint_dir = log_dir.join("checkpoints");
    let sample_dir = log_dir.join("samples");

    tokio::fs::create_dir_all(&checkpoint_dir).await?;

    let config = ArcRef::new(Arc::new(config));
    let (train_tx, train_rx) = tokio::sync::mpsc::channel(2);
    let (log_tx, log_rx) = tokio::sync::mpsc::channel(1);

    // data stream to channel worker
    let data_fut = {
        let config = config.clone();

        tokio::task::spawn(async move {
            let mut stream =
                training_stream::training_stream(&config.dataset, &config.train).await?;

            while let Some(msg) = stream.next().await.transpose()? {
                let result = train_tx.send(msg).await;
                if result.is_err() {
                    break;
                }
            }

            Fallible::Ok(())
        })
        .map(|result| Fallible::Ok(result??))
    };

    // training worker
    let train_fut = {
        let config = config.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            train::training_worker(config, checkpoint_dir, sample_dir, train_rx, log_tx)
        })
        .map(|result| Fallible::Ok(result??))
    };

    // event logging worker
    let log_fut = {
        let log_dir = log_dir.clone();

        tokio::task::spawn(logging::logging_worker(log_dir, log_rx))
            .map(|result| Fallible::Ok(result??))
    };

    futures::try_join!(data_fut, train_fut, log_fut)?;

    Ok(())
}
