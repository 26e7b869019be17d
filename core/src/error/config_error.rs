use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not readable: {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error in {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("env var invalid: {key}={value}")]
    EnvInvalid { key: String, value: String },

    #[error("cannot determine {0} directory")]
    NoDir(&'static str),
}
