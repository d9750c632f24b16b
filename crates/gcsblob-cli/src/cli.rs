use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gcsblob_core::SignedMethod;

#[derive(Parser)]
#[command(name = "gcsblob", about = "Blob storage on Google Cloud Storage", version)]
pub struct Cli {
    /// TOML configuration file; `GCSBLOB_*` environment variables override it.
    #[arg(short, long, global = true, default_value = "config/gcsblob.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the configured bucket if it does not exist
    Init,
    /// Upload a local file to a blob
    Put {
        uri: String,
        file: PathBuf,
        /// Overrides the type guessed from the blob name
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download a blob to a file, or to stdout
    Get { uri: String, out: Option<PathBuf> },
    /// Delete a blob, or every blob under a container uri
    Delete { uri: String },
    /// Print file information for a blob
    Info { uri: String },
    /// Print a signed URL for a blob
    Sign {
        uri: String,
        #[arg(long, value_enum, default_value = "get")]
        method: MethodArg,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Publish a content event through the configured publisher
    Event {
        kind: String,
        content_link: String,
        #[arg(long)]
        content_id: Option<i64>,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum MethodArg {
    Get,
    Put,
}

impl From<MethodArg> for SignedMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Get => SignedMethod::Get,
            MethodArg::Put => SignedMethod::Put,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sign_defaults_to_get() {
        let cli = Cli::parse_from(["gcsblob", "sign", "https://cms.local/media/a.png"]);
        match cli.command {
            Command::Sign { method, .. } => {
                assert_eq!(SignedMethod::from(method), SignedMethod::Get)
            }
            _ => panic!("expected sign"),
        }
        assert_eq!(cli.config, PathBuf::from("config/gcsblob.toml"));
    }

    #[test]
    fn put_with_config_after_subcommand() {
        let cli = Cli::parse_from([
            "gcsblob",
            "put",
            "https://cms.local/media/a.png",
            "a.png",
            "--config",
            "local.toml",
        ]);
        assert!(matches!(cli.command, Command::Put { .. }));
        assert_eq!(cli.config, PathBuf::from("local.toml"));
    }
}
