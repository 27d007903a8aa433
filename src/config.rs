use crate::common::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dataset: Dataset,
    pub model: Model,
    pub train: Training,
    pub logging: Logging,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = json5::from_str(
            &fs::read_to_string(path)
                .with_context(|| format!("unable to read config file '{}'", path.display()))?,
        )?;
        ensure!(
            config.dataset.image_size.get().is_power_of_two() && config.dataset.image_size.get() >= 8,
            "image_size must be a power of two and at least 8, but get {}",
            config.dataset.image_size
        );
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub dataset_dir: PathBuf,
    pub image_size: NonZeroUsize,
    pub image_dim: NonZeroUsize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub latent_dim: NonZeroUsize,
    pub generator_channels: NonZeroUsize,
    pub discriminator_channels: NonZeroUsize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Training {
    pub batch_size: NonZeroUsize,
    pub epochs: NonZeroUsize,
    pub critic_steps: NonZeroUsize,
    pub learning_rate: R64,
    pub adam_beta1: R64,
    pub loss: GanLoss,
    /// Gradient penalty coefficient. The penalty term is disabled when absent.
    #[serde(default)]
    pub gradient_penalty: Option<R64>,
    #[serde(default)]
    pub data_workers: Option<NonZeroUsize>,
    #[serde(with = "tch_serde::serde_device", default = "default_device")]
    pub device: Device,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub log_dir: PathBuf,
    #[serde(default = "default_log_steps")]
    pub log_steps: NonZeroUsize,
    #[serde(default = "default_save_checkpoint_epochs")]
    pub save_checkpoint_epochs: NonZeroUsize,
    #[serde(default)]
    pub save_image_steps: Option<NonZeroUsize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GanLoss {
    Standard,
    Relativistic,
}

fn default_device() -> Device {
    Device::cuda_if_available()
}

fn default_log_steps() -> NonZeroUsize {
    NonZeroUsize::new(50).unwrap()
}

fn default_save_checkpoint_epochs() -> NonZeroUsize {
    NonZeroUsize::new(5).unwrap()
}
