use crate::{common::*, message as msg};
use tfrecord::EventWriterInit;

pub async fn logging_worker(
    log_dir: impl AsRef<Path>,
    mut log_rx: mpsc::Receiver<msg::LogMessage>,
) -> Result<()> {
    let event_dir = log_dir.as_ref().join("events");
    tokio::fs::create_dir_all(&event_dir).await?;

    let mut event_writer = {
        let event_path_prefix = event_dir
            .join("image-flow")
            .into_os_string()
            .into_string()
            .unwrap();

        EventWriterInit::default()
            .from_prefix_async(event_path_prefix, None)
            .await?
    };

    loop {
        let msg = match log_rx.recv().await {
            Some(msg) => msg,
            None => break,
        };

        match msg {
            msg::LogMessage::Loss {
                step,
                epoch: _,
                learning_rate,
                log,
            } => {
                let step = step as i64;
                let msg::LossLog {
                    discriminator_loss,
                    generator_loss,
                    score_real,
                    score_fake_before,
                    score_fake_after,
                } = log;

                event_writer
                    .write_scalar_async("loss/discriminator", step, discriminator_loss as f32)
                    .await?;
                event_writer
                    .write_scalar_async("loss/generator", step, generator_loss as f32)
                    .await?;
                event_writer
                    .write_scalar_async("score/real", step, score_real as f32)
                    .await?;
                event_writer
                    .write_scalar_async("score/fake_before_step", step, score_fake_before as f32)
                    .await?;
                event_writer
                    .write_scalar_async("score/fake_after_step", step, score_fake_after as f32)
                    .await?;
                event_writer
                    .write_scalar_async("params/learning_rate", step, learning_rate as f32)
                    .await?;
            }
            msg::LogMessage::Image { step, samples } => {
                let step = step as i64;
                // the grid is stored as u8, the event format wants float batches in [0, 1]
                let samples = (samples.to_kind(Kind::Float) / 255.0).unsqueeze(0);

                event_writer
                    .write_image_list_async("samples", step, samples)
                    .await?;
            }
        }
    }

    Ok(())
}
