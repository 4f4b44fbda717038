//! # Moderate Subcommand
//!
//! Applies a moderator decision: approve, reject, restore, flag, or park
//! as dormant. Rejection codes are validated by the lifecycle engine.

use anyhow::Result;
use clap::Args;

use petitions_core::{PetitionId, Timestamp};
use petitions_state::{ModerationAction, ModerationParams};
use petitions_store::{PetitionService, PetitionStore};

use crate::print_petition;

/// Arguments for the `petitions moderate` subcommand.
#[derive(Args, Debug)]
pub struct ModerateArgs {
    /// Petition identifier.
    #[arg(long)]
    pub id: PetitionId,

    /// approve, reject, restore, flag, or dormant.
    #[arg(long)]
    pub action: ModerationAction,

    /// Rejection code (required with `reject`), e.g. duplicate, offensive.
    #[arg(long)]
    pub code: Option<String>,

    /// Free-text rejection details.
    #[arg(long)]
    pub details: Option<String>,
}

impl ModerateArgs {
    fn params(&self) -> ModerationParams {
        ModerationParams {
            moderation: Some(self.action),
            rejection_code: self.code.clone(),
            rejection_details: self.details.clone(),
        }
    }
}

/// Execute the moderate subcommand.
pub async fn run_moderate<S: PetitionStore>(
    args: &ModerateArgs,
    svc: &PetitionService<S>,
    now: Timestamp,
) -> Result<u8> {
    let petition = svc.moderate(args.id, &args.params(), now).await?;
    print_petition(&petition)?;
    Ok(0)
}
