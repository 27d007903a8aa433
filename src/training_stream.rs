use crate::{
    common::*,
    config,
    dataset::{self, Dataset, DatasetInit},
    message as msg,
};

/// Epoch-major stream of shuffled image batches. Decoding runs on a
/// configurable number of parallel workers while batch order is preserved,
/// so epoch boundaries stay intact.
pub async fn training_stream(
    dataset_cfg: &config::Dataset,
    train_cfg: &config::Training,
) -> Result<impl Stream<Item = Result<msg::TrainingMessage>>> {
    let image_size = dataset_cfg.image_size.get();
    let batch_size = train_cfg.batch_size.get();
    let epochs = train_cfg.epochs.get();
    let workers = train_cfg.data_workers.map(NonZeroUsize::get);

    let dataset: Arc<Dataset> = Arc::new(
        DatasetInit {
            dir: &dataset_cfg.dataset_dir,
        }
        .load()?,
    );
    ensure!(
        dataset.batches_per_epoch(batch_size) > 0,
        "dataset has {} images, fewer than one batch of {}",
        dataset.len(),
        batch_size
    );

    let stream = stream::iter(0..epochs)
        .flat_map(move |epoch| {
            let batches = dataset.shuffled_batches(batch_size);
            stream::iter(
                batches
                    .into_iter()
                    .enumerate()
                    .map(move |(batch_index, paths)| (epoch, batch_index, paths)),
            )
        })
        .map(Fallible::Ok)
        .try_par_then(workers, move |(epoch, batch_index, paths)| async move {
            let images: Vec<_> = paths
                .iter()
                .map(|path| dataset::load_image(path, image_size))
                .try_collect()?;
            let image_batch = Tensor::stack(&images, 0);

            Fallible::Ok(msg::TrainingMessage {
                epoch,
                batch_index,
                image_batch,
            })
        });

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn training_stream_test() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("image-flow-stream-{}", std::process::id()));
        fs::create_dir_all(&dir)?;

        let image = Tensor::zeros(&[3, 16, 16], (Kind::Uint8, Device::Cpu));
        for index in 0..4 {
            vision::image::save(&image, dir.join(format!("{}.png", index)))?;
        }

        let dataset_cfg = config::Dataset {
            dataset_dir: dir.clone(),
            image_size: NonZeroUsize::new(16).unwrap(),
            image_dim: NonZeroUsize::new(3).unwrap(),
        };
        let train_cfg = config::Training {
            batch_size: NonZeroUsize::new(2).unwrap(),
            epochs: NonZeroUsize::new(2).unwrap(),
            critic_steps: NonZeroUsize::new(1).unwrap(),
            learning_rate: r64(1e-4),
            adam_beta1: r64(0.5),
            loss: config::GanLoss::Standard,
            gradient_penalty: None,
            data_workers: Some(NonZeroUsize::new(2).unwrap()),
            device: Device::Cpu,
        };

        let stream = training_stream(&dataset_cfg, &train_cfg).await?;
        let messages: Vec<_> = stream.collect().await;

        // 2 epochs x 2 batches, in epoch-major order
        ensure!(messages.len() == 4);
        for (index, msg) in messages.into_iter().enumerate() {
            let msg = msg?;
            ensure!(msg.epoch == index / 2);
            ensure!(msg.batch_index == index % 2);
            ensure!(msg.image_batch.size() == vec![2, 3, 16, 16]);
        }

        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
