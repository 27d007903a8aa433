use crate::common::*;

/// Tiles a batch of images into a single grid image, `nrow` images per row.
pub fn make_grid(images: &Tensor, nrow: i64) -> Result<Tensor> {
    let (batch_size, _c, _h, _w) = images.size4()?;
    ensure!(nrow > 0, "nrow must be positive");
    ensure!(
        batch_size % nrow == 0,
        "batch size {} is not divisible by nrow {}",
        batch_size,
        nrow
    );

    let rows: Vec<_> = (0..batch_size / nrow)
        .map(|row| {
            let cells: Vec<_> = (0..nrow)
                .map(|col| images.select(0, row * nrow + col))
                .collect();
            Tensor::cat(&cells, 2)
        })
        .collect();

    Ok(Tensor::cat(&rows, 1))
}

/// Maps generator output in `[-1, 1]` back to `u8` pixel values.
pub fn denormalize(image: &Tensor) -> Tensor {
    ((image * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).to_kind(Kind::Uint8)
}

#[derive(Debug)]
pub struct RateCounter {
    interval: Duration,
    count: f64,
    since: Instant,
}

impl RateCounter {
    pub fn with_second_interval() -> Self {
        Self {
            interval: Duration::from_secs(1),
            count: 0.0,
            since: Instant::now(),
        }
    }

    pub fn add(&mut self, count: f64) {
        self.count += count;
    }

    pub fn rate(&mut self) -> Option<f64> {
        let elapsed = self.since.elapsed();
        if elapsed >= self.interval {
            let rate = self.count / elapsed.as_secs_f64();
            self.count = 0.0;
            self.since = Instant::now();
            Some(rate)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_grid_test() -> Result<()> {
        let images = Tensor::rand(&[16, 3, 8, 8], FLOAT_CPU);
        let grid = make_grid(&images, 4)?;
        ensure!(
            grid.size() == vec![3, 32, 32],
            "incorrect grid shape {:?}",
            grid.size()
        );

        ensure!(make_grid(&images, 5).is_err());
        Ok(())
    }

    #[test]
    fn denormalize_test() -> Result<()> {
        let image = Tensor::of_slice(&[-1.0f32, 0.0, 1.0]).view([3, 1, 1]);
        let pixels = denormalize(&image);
        ensure!(pixels.kind() == Kind::Uint8);
        ensure!(Vec::<i64>::from(&pixels.view([3]).to_kind(Kind::Int64)) == vec![0, 127, 255]);
        Ok(())
    }
}
