//! End-to-end runs of CLI commands against a snapshot file.

use clap::Parser;

use petitions_cli::source::{load_snapshot, Source};
use petitions_cli::Command;
use petitions_core::{SiteSettings, Timestamp};
use petitions_state::{Petition, PetitionState};
use petitions_store::MemoryStore;

#[derive(Parser, Debug)]
struct TestCli {
    #[command(subcommand)]
    command: Command,
}

fn command(args: &[&str]) -> Command {
    let argv = std::iter::once("petitions").chain(args.iter().copied());
    TestCli::try_parse_from(argv).unwrap().command
}

fn at(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn settings() -> SiteSettings {
    SiteSettings {
        threshold_for_moderation: 2,
        ..SiteSettings::default()
    }
}

fn only_petition(source: &Source) -> Petition {
    let Source::Snapshot(path) = source else {
        panic!("snapshot source expected");
    };
    let mut petitions = load_snapshot(path).unwrap().snapshot();
    assert_eq!(petitions.len(), 1);
    petitions.remove(0)
}

#[tokio::test]
async fn petition_moves_from_creation_to_closed() {
    let dir = tempfile::tempdir().unwrap();
    let source = Source::Snapshot(dir.path().join("petitions.json"));
    let opened = at("2017-04-01T12:00:00Z");

    let create = command(&["petition", "create", "--action", "Fund libraries"]);
    assert_eq!(petitions_cli::run(&create, &source, settings(), opened).await.unwrap(), 0);
    let id = only_petition(&source).id.to_string();

    let creator = command(&["signature", "validate", "--id", &id, "--kind", "creator"]);
    petitions_cli::run(&creator, &source, settings(), opened).await.unwrap();
    let sponsor = command(&["signature", "validate", "--id", &id, "--kind", "sponsor"]);
    petitions_cli::run(&sponsor, &source, settings(), opened).await.unwrap();
    assert_eq!(only_petition(&source).state, PetitionState::Sponsored);

    let approve = command(&["moderate", "--id", &id, "--action", "approve"]);
    petitions_cli::run(&approve, &source, settings(), opened).await.unwrap();
    assert_eq!(only_petition(&source).state, PetitionState::Open);

    let sweep = command(&["sweep", "close"]);
    petitions_cli::run(&sweep, &source, settings(), at("2017-10-01T23:59:59.998Z"))
        .await
        .unwrap();
    assert_eq!(only_petition(&source).state, PetitionState::Open);

    petitions_cli::run(&sweep, &source, settings(), at("2017-10-02T00:00:00Z"))
        .await
        .unwrap();
    let closed = only_petition(&source);
    assert_eq!(closed.state, PetitionState::Closed);
    assert_eq!(closed.closed_at, Some(at("2017-10-01T23:59:59.999Z")));
}

#[tokio::test]
async fn failed_command_leaves_snapshot_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("petitions.json");
    let now = at("2017-04-01T12:00:00Z");
    let p = Petition::new("a", "b", None, now);
    petitions_cli::source::save_snapshot(&path, &MemoryStore::load([p.clone()])).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let source = Source::Snapshot(path.clone());
    let remove = command(&["petition", "remove", "--id", &p.id.to_string()]);
    assert!(petitions_cli::run(&remove, &source, settings(), now).await.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[tokio::test]
async fn checkout_held_by_other_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("petitions.json");
    let now = at("2017-04-01T12:00:00Z");
    let p = Petition::new("a", "b", None, now);
    petitions_cli::source::save_snapshot(&path, &MemoryStore::load([p.clone()])).unwrap();
    let source = Source::Snapshot(path);
    let id = p.id.to_string();

    let mine = "11111111-1111-4111-8111-111111111111";
    let theirs = "22222222-2222-4222-8222-222222222222";
    let take = command(&["petition", "checkout", "--id", &id, "--moderator", mine]);
    assert_eq!(petitions_cli::run(&take, &source, settings(), now).await.unwrap(), 0);
    let steal = command(&["petition", "checkout", "--id", &id, "--moderator", theirs]);
    assert_eq!(petitions_cli::run(&steal, &source, settings(), now).await.unwrap(), 1);
    let force = command(&["petition", "checkout", "--id", &id, "--moderator", theirs, "--force"]);
    assert_eq!(petitions_cli::run(&force, &source, settings(), now).await.unwrap(), 0);
}
