//! # Petition Subcommand
//!
//! Administration of individual petitions.
//!
//! ## Subcommands
//!
//! - `create` — Create a pending petition.
//! - `show` — Print a petition.
//! - `reject` — Reject an unpublished petition.
//! - `close`, `close-early`, `stop`, `extend`, `remove` — Closure.
//! - `debate`, `debate-outcome`, `respond` — Debate and response.
//! - `checkout`, `release` — Moderator edit lock.
//! - `anonymize` — Scrub one petition's personal data.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};

use petitions_core::{ModeratorId, PetitionId, Timestamp};
use petitions_state::{CreatorContact, RejectionCode};
use petitions_store::{PetitionService, PetitionStore};

use crate::print_petition;

/// Arguments for the `petitions petition` subcommand.
#[derive(Args, Debug)]
pub struct PetitionArgs {
    #[command(subcommand)]
    pub command: PetitionCommand,
}

/// Petition subcommands.
#[derive(Subcommand, Debug)]
pub enum PetitionCommand {
    /// Create a new petition in the pending state.
    Create {
        /// What the petition asks for.
        #[arg(long)]
        action: String,
        /// Why.
        #[arg(long, default_value = "")]
        background: String,
        /// Creator's name.
        #[arg(long, requires = "creator_email")]
        creator_name: Option<String>,
        /// Creator's email address.
        #[arg(long, requires = "creator_name")]
        creator_email: Option<String>,
        /// Creator's postcode.
        #[arg(long)]
        postcode: Option<String>,
    },

    /// Print a petition as JSON.
    Show {
        #[arg(long)]
        id: PetitionId,
    },

    /// Reject a petition that has not been published.
    Reject {
        #[arg(long)]
        id: PetitionId,
        /// Rejection code, e.g. duplicate, irrelevant, offensive.
        #[arg(long)]
        code: RejectionCode,
        #[arg(long)]
        details: Option<String>,
    },

    /// Close an open petition if its deadline has passed.
    Close {
        #[arg(long)]
        id: PetitionId,
    },

    /// Close an open petition now.
    CloseEarly {
        #[arg(long)]
        id: PetitionId,
    },

    /// Stop a petition that has not been moderated.
    Stop {
        #[arg(long)]
        id: PetitionId,
    },

    /// Extend the deadline by one day.
    Extend {
        #[arg(long)]
        id: PetitionId,
    },

    /// Take down a closed petition.
    Remove {
        #[arg(long)]
        id: PetitionId,
    },

    /// Set the debate date, or clear it when no date is given.
    Debate {
        #[arg(long)]
        id: PetitionId,
        /// Debate date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Record whether parliament debated the petition.
    DebateOutcome {
        #[arg(long)]
        id: PetitionId,
        /// Record that the petition was not debated.
        #[arg(long)]
        not_debated: bool,
    },

    /// Record the government response.
    Respond {
        #[arg(long)]
        id: PetitionId,
    },

    /// Take the moderator edit lock.
    Checkout {
        #[arg(long)]
        id: PetitionId,
        #[arg(long)]
        moderator: ModeratorId,
        /// Take the lock even if another moderator holds it.
        #[arg(long)]
        force: bool,
    },

    /// Release the moderator edit lock.
    Release {
        #[arg(long)]
        id: PetitionId,
        #[arg(long)]
        moderator: ModeratorId,
    },

    /// Anonymize a petition that ended long enough ago.
    Anonymize {
        #[arg(long)]
        id: PetitionId,
    },
}

/// Execute the petition subcommand.
pub async fn run_petition<S: PetitionStore>(
    args: &PetitionArgs,
    svc: &PetitionService<S>,
    now: Timestamp,
) -> Result<u8> {
    let petition = match &args.command {
        PetitionCommand::Create {
            action,
            background,
            creator_name,
            creator_email,
            postcode,
        } => {
            let creator = match (creator_name, creator_email) {
                (Some(name), Some(email)) => Some(CreatorContact {
                    name: name.clone(),
                    email: email.clone(),
                    postcode: postcode.clone(),
                }),
                _ => None,
            };
            svc.create(action.as_str(), background.as_str(), creator, now)
                .await?
        }
        PetitionCommand::Show { id } => svc.get(*id).await?,
        PetitionCommand::Reject { id, code, details } => {
            svc.reject(*id, *code, details.clone(), now).await?
        }
        PetitionCommand::Close { id } => svc.close(*id, now).await?,
        PetitionCommand::CloseEarly { id } => svc.close_early(*id, now).await?,
        PetitionCommand::Stop { id } => svc.stop(*id, now).await?,
        PetitionCommand::Extend { id } => svc.extend_deadline(*id, now).await?,
        PetitionCommand::Remove { id } => svc.remove(*id, now).await?,
        PetitionCommand::Debate { id, date } => svc.schedule_debate(*id, *date, now).await?,
        PetitionCommand::DebateOutcome { id, not_debated } => {
            svc.record_debate_outcome(*id, !*not_debated, now).await?
        }
        PetitionCommand::Respond { id } => svc.record_government_response(*id, now).await?,
        PetitionCommand::Checkout {
            id,
            moderator,
            force,
        } => {
            let taken = if *force {
                svc.force_checkout(*id, *moderator, now).await?
            } else {
                svc.checkout(*id, *moderator, now).await?
            };
            if !taken {
                eprintln!("{id} is locked by another moderator");
                return Ok(1);
            }
            svc.get(*id).await?
        }
        PetitionCommand::Release { id, moderator } => {
            if !svc.release(*id, *moderator, now).await? {
                eprintln!("{id} is not locked by {moderator}");
                return Ok(1);
            }
            svc.get(*id).await?
        }
        PetitionCommand::Anonymize { id } => {
            if !svc.anonymize(*id, now).await? {
                tracing::info!(petition_id = %id, "already anonymized");
            }
            svc.get(*id).await?
        }
    };
    print_petition(&petition)?;
    Ok(0)
}
