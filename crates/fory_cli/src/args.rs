//! CLI args

use std::{fmt::Display, path::PathBuf};

use clap::{Parser, Subcommand};

/// Inspect and exercise the fory wire format
#[derive(Parser)]
pub(crate) struct CliArgs {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Encode a name the way type metadata carries it.
    MetaString {
        value: String,

        /// Which kind of name this is. Each kind has its own special characters.
        #[clap(short, long)]
        #[clap(default_value_t = NameKind::Field)]
        kind: NameKind,
    },

    /// Print the 128-bit MurmurHash3 of a string.
    Hash {
        value: String,

        #[clap(short, long)]
        #[clap(default_value_t = fory::defaults::DEFAULT_HASH_SEED)]
        seed: u64,
    },

    /// Print the variable-length encoding of an integer.
    Varint {
        #[clap(allow_hyphen_values = true)]
        value: i64,

        /// Bit budget of the codec.
        #[clap(short, long)]
        #[clap(default_value_t = VarintWidth::W64)]
        width: VarintWidth,

        /// Zigzag-encode the value first.
        #[clap(long)]
        signed: bool,
    },

    /// Report the structure of a serialized message.
    Inspect {
        file: PathBuf,

        /// The message carries embedded schemas and a meta section.
        #[clap(short, long)]
        compatible: bool,

        /// The message was written without the cross-language header.
        #[clap(long)]
        no_xlang: bool,

        /// The message has no top-level reference flag.
        #[clap(long)]
        no_ref_flag: bool,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum NameKind {
    Field,
    Type,
    Namespace,
}

impl Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum VarintWidth {
    #[clap(name = "32")]
    W32,
    #[clap(name = "36")]
    W36,
    #[clap(name = "64")]
    W64,
}

impl Display for VarintWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits = match self {
            Self::W32 => 32,
            Self::W36 => 36,
            Self::W64 => 64,
        };
        write!(f, "{}", bits)
    }
}
