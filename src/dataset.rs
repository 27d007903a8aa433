use crate::common::*;

#[derive(Debug, Clone)]
pub struct DatasetInit<P>
where
    P: AsRef<Path>,
{
    pub dir: P,
}

impl<P> DatasetInit<P>
where
    P: AsRef<Path>,
{
    pub fn load(self) -> Result<Dataset> {
        let dir = self.dir.as_ref().to_owned();
        ensure!(dir.is_dir(), "'{}' is not a directory", dir.display());

        let mut image_paths: Vec<PathBuf> = ["png", "jpg", "jpeg"]
            .iter()
            .map(|ext| -> Result<_> {
                let pattern = format!("{}/**/*.{}", dir.display(), ext);
                let paths: Vec<_> = glob::glob(&pattern)?.try_collect()?;
                Ok(paths)
            })
            .flatten_ok()
            .try_collect()?;
        image_paths.sort();

        ensure!(
            !image_paths.is_empty(),
            "no images found under '{}'",
            dir.display()
        );
        info!("{} images in dataset", image_paths.len());

        Ok(Dataset { dir, image_paths })
    }
}

#[derive(Debug)]
pub struct Dataset {
    dir: PathBuf,
    image_paths: Vec<PathBuf>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }

    /// Shuffled full batches of image paths for one epoch. A ragged tail
    /// smaller than `batch_size` is dropped.
    pub fn shuffled_batches(&self, batch_size: usize) -> Vec<Vec<PathBuf>> {
        let mut paths = self.image_paths.clone();
        paths.shuffle(&mut rand::thread_rng());

        paths
            .chunks_exact(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    pub fn batches_per_epoch(&self, batch_size: usize) -> usize {
        self.image_paths.len() / batch_size
    }
}

/// Loads an image, resizes the short side to `image_size`, center-crops to a
/// square and normalizes pixel values to `[-1, 1]`.
pub fn load_image(path: impl AsRef<Path>, image_size: usize) -> Result<Tensor> {
    let path = path.as_ref();
    let size = image_size as i64;

    let image = vision::image::load(path)
        .with_context(|| format!("unable to load image '{}'", path.display()))?;
    let (channels, height, width) = image.size3()?;
    ensure!(
        channels == 3,
        "expect a 3-channel image, but '{}' has {} channels",
        path.display(),
        channels
    );

    let (new_height, new_width) = if height <= width {
        (size, (width * size + height - 1) / height)
    } else {
        ((height * size + width - 1) / width, size)
    };
    let image = vision::image::resize(&image, new_width, new_height)?;

    let top = (new_height - size) / 2;
    let left = (new_width - size) / 2;
    let image = image.narrow(1, top, size).narrow(2, left, size);

    // mean 0.5, std 0.5 per channel
    Ok(image.to_kind(Kind::Float) / 127.5 - 1.0)
}
