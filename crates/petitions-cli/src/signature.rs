//! # Signature Subcommand
//!
//! Feeds signature events from the signature collaborator into the
//! aggregate count.

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};

use petitions_core::{PetitionId, Timestamp};
use petitions_state::SignatureKind;
use petitions_store::{PetitionService, PetitionStore};

use crate::print_petition;

/// Arguments for the `petitions signature` subcommand.
#[derive(Args, Debug)]
pub struct SignatureArgs {
    #[command(subcommand)]
    pub command: SignatureCommand,
}

/// Who signed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Creator,
    Sponsor,
    Public,
}

impl From<KindArg> for SignatureKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Creator => SignatureKind::Creator,
            KindArg::Sponsor => SignatureKind::Sponsor,
            KindArg::Public => SignatureKind::Public,
        }
    }
}

/// Signature subcommands.
#[derive(Subcommand, Debug)]
pub enum SignatureCommand {
    /// Count validated signatures.
    Validate {
        /// Petition identifier.
        #[arg(long)]
        id: PetitionId,
        /// Who signed.
        #[arg(long, value_enum, default_value = "public")]
        kind: KindArg,
        /// Number of signatures of this kind to count at once.
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Uncount one signature found to be invalid.
    Invalidate {
        /// Petition identifier.
        #[arg(long)]
        id: PetitionId,
    },
}

/// Execute the signature subcommand.
pub async fn run_signature<S: PetitionStore>(
    args: &SignatureArgs,
    svc: &PetitionService<S>,
    now: Timestamp,
) -> Result<u8> {
    let petition = match &args.command {
        SignatureCommand::Validate { id, kind, count } => {
            svc.signatures_validated(*id, *count, (*kind).into(), now)
                .await?
        }
        SignatureCommand::Invalidate { id } => svc.signature_invalidated(*id, now).await?,
    };
    print_petition(&petition)?;
    Ok(0)
}
