pub mod cli;
pub mod codec;
pub mod error;
pub mod group;
pub mod kv;
pub mod metrics;
pub mod nonce;
pub mod pipeline;
pub mod store;
pub mod transform;

pub use error::{Error, Result};
pub use group::Grouper;
pub use nonce::Nonce;
pub use pipeline::Pipeline;
pub use store::Record;
pub use transform::{run_stage, Stage, Transform};
