use crate::plugin::stage::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    /// A handler returned an error (or panicked) in a stage whose policy
    /// propagates handler failures to the pipeline.
    #[error("{stage} handler '{name}' failed")]
    Execution {
        stage: Stage,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PluginError>;
