pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use chrono::Local;
pub use futures::{
    future::FutureExt as _,
    stream::{self, Stream, StreamExt as _},
};
pub use itertools::{izip, Itertools as _};
pub use noisy_float::prelude::*;
pub use owning_ref::ArcRef;
pub use par_stream::prelude::*;
pub use rand::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    fs, iter,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
pub use tch::{
    kind::FLOAT_CPU,
    nn::{self, ModuleT as _, OptimizerConfig as _},
    vision, Device, Kind, Reduction, Tensor,
};
pub use tch_tensor_like::TensorLike;
pub use tokio::sync::mpsc;
pub use tracing::{info, warn};

pub type Fallible<T> = Result<T>;
