//! End-to-end tests: ingestion, resolution and snapshot reads over one
//! in-process log.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use shifumi_engine::{
    ChoiceIngestor, EngineConfig, ErrorKind, IngestError, LogBackedRepository,
    ResolveOutcome, RoundResolver, SnapshotLookup, SnapshotReader, Submission,
};
use shifumi_log::{
    CANARY_KEY, EventLog, LogError, LogReader, MemoryLog, MemoryReader, Record,
    StartFrom,
};
use shifumi_monitor::BackoffPolicy;
use shifumi_protocol::{
    Choice, ChoiceRequest, Codec, JsonCodec, PlayerChoice, PlayerSlot,
    SessionId,
};
use shifumi_session::{
    ChoiceApplied, InMemorySessionRepository, Session, SessionError,
    SessionStatus,
};
use tokio::sync::watch;

// =========================================================================
// Harness
// =========================================================================

/// Both services over one log. Choice events are resolved one at a time
/// with [`Harness::resolve_next`] so tests control interleaving.
struct Harness {
    log: Arc<MemoryLog>,
    ingestor: ChoiceIngestor<MemoryLog>,
    resolver: RoundResolver<InMemorySessionRepository, MemoryLog>,
    reader: SnapshotReader<MemoryLog>,
    choices: MemoryReader,
}

impl Harness {
    async fn new() -> Self {
        let log = Arc::new(MemoryLog::new());
        let config = EngineConfig::default();
        for topic in config.topics() {
            log.create_topic(&topic).await.unwrap();
        }
        let choices = log
            .reader(
                &config.choice_topic,
                StartFrom::Group(config.resolver_group.clone()),
            )
            .await
            .unwrap();
        Self {
            ingestor: ChoiceIngestor::new(Arc::clone(&log), &config),
            resolver: RoundResolver::new(
                InMemorySessionRepository::new(),
                Arc::clone(&log),
                config.clone(),
            ),
            reader: SnapshotReader::new(Arc::clone(&log), &config),
            log,
            choices,
        }
    }

    async fn submit(
        &self,
        session: &str,
        slot: &str,
        choice: &str,
    ) -> Result<Submission, IngestError> {
        let request = ChoiceRequest::new(choice).session(session).player(slot);
        self.ingestor.submit(&request).await
    }

    /// Resolves the next pending choice event.
    async fn resolve_next(&mut self) -> ResolveOutcome {
        let record = self.choices.next().await.unwrap().unwrap();
        self.resolver.handle_record(&record).await.unwrap()
    }

    /// Submits and immediately resolves.
    async fn play(&mut self, session: &str, slot: &str, choice: &str) -> Submission {
        let submission = self.submit(session, slot, choice).await.unwrap();
        self.resolve_next().await;
        submission
    }

    /// Plays one full round: slot 1 first, then slot 2 joining.
    async fn play_round(&mut self, session: &str, p1: &str, p2: &str) {
        self.play(session, "1", p1).await;
        self.play(session, "", p2).await;
    }

    async fn snapshot(&self, session: &SessionId) -> Session {
        match self.reader.lookup(session).await.unwrap() {
            SnapshotLookup::Found(session) => session,
            other => panic!("expected a snapshot, got {other:?}"),
        }
    }

    fn snapshot_count(&self) -> usize {
        self.log.records("game-results").len()
    }
}

/// Starts a session with slot 1 playing `choice`, resolved.
async fn start_session(h: &mut Harness, choice: &str) -> SessionId {
    let submission = h.play("", "", choice).await;
    submission.session_id
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn test_first_submission_creates_session_as_player_one() {
    let mut h = Harness::new().await;

    let submission = h.submit("", "", "rock").await.unwrap();
    assert_eq!(submission.slot, PlayerSlot::One);
    assert_eq!(submission.session_id.as_str().len(), 10);
    assert!(submission.created_session);

    let response = submission.response();
    assert_eq!(response.player_id, PlayerSlot::One);
    assert_eq!(response.status, "Choice submitted successfully");

    let outcome = h.resolve_next().await;
    assert_eq!(
        outcome,
        ResolveOutcome::Applied(ChoiceApplied::Recorded {
            slot: PlayerSlot::One,
            round: 1
        })
    );

    let session = h.snapshot(&submission.session_id).await;
    assert!(session.player1_has_played);
    assert!(!session.player2_has_played);
    assert_eq!(session.current_round, 1);
    assert_eq!(session.version, 1);
}

#[tokio::test]
async fn test_rock_beats_scissors_advances_round() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;

    let joined = h.play(id.as_str(), "", "scissors").await;
    assert_eq!(joined.slot, PlayerSlot::Two);

    let session = h.snapshot(&id).await;
    assert_eq!(session.player1_wins, 1);
    assert_eq!(session.player2_wins, 0);
    assert_eq!(session.current_round, 2);
    assert!(!session.player1_has_played);
    assert!(!session.player2_has_played);
    assert_eq!(session.rounds[0].result, "Player 1 wins: rock beats scissors");
    assert_eq!(session.rounds.len(), 2);
}

#[tokio::test]
async fn test_third_win_finishes_without_advancing() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;
    h.play(id.as_str(), "", "scissors").await;
    h.play_round(id.as_str(), "rock", "scissors").await;
    h.play_round(id.as_str(), "rock", "scissors").await;

    let session = h.snapshot(&id).await;
    assert_eq!(session.status, SessionStatus::Finished);
    assert_eq!(session.winner, Some(PlayerSlot::One));
    assert_eq!(session.player1_wins, 3);
    assert_eq!(session.current_round, 3);
    assert_eq!(session.rounds.len(), 3);
}

#[tokio::test]
async fn test_submit_to_finished_session_reports_winner() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "paper").await;
    h.play(id.as_str(), "", "rock").await;
    h.play_round(id.as_str(), "paper", "rock").await;
    h.play_round(id.as_str(), "paper", "rock").await;

    let err = h.submit(id.as_str(), "2", "rock").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), "Game has already finished. Player 1 won!");

    let err = h.submit(id.as_str(), "", "rock").await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::GameFinished {
            winner: Some(PlayerSlot::One),
            ..
        }
    ));
}

#[tokio::test]
async fn test_matching_choices_count_a_draw() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "paper").await;
    h.play(id.as_str(), "", "paper").await;

    let session = h.snapshot(&id).await;
    assert_eq!(session.draws, 1);
    assert_eq!(session.player1_wins, 0);
    assert_eq!(session.player2_wins, 0);
    assert_eq!(session.current_round, 2);
    assert_eq!(session.rounds[0].result, "Draw: both chose paper");
}

#[tokio::test]
async fn test_second_player_can_win_the_match() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "scissors").await;
    h.play(id.as_str(), "2", "rock").await;
    h.play_round(id.as_str(), "paper", "scissors").await;
    h.play_round(id.as_str(), "rock", "rock").await;
    h.play_round(id.as_str(), "rock", "paper").await;

    let session = h.snapshot(&id).await;
    assert_eq!(session.status, SessionStatus::Finished);
    assert_eq!(session.winner, Some(PlayerSlot::Two));
    assert_eq!(session.player2_wins, 3);
    assert_eq!(session.draws, 1);
    assert_eq!(session.current_round, 4);
}

// =========================================================================
// Ingest rejections
// =========================================================================

#[tokio::test]
async fn test_slot_cannot_submit_twice_in_one_round() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;

    let err = h.submit(id.as_str(), "1", "paper").await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::AlreadyPlayed {
            slot: PlayerSlot::One,
            round: 1,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_invalid_choice_rejected_before_any_lookup() {
    let h = Harness::new().await;
    for choice in ["lizard", "", "Rock"] {
        let err = h.submit("", "", choice).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(h.log.records("player-choices").is_empty());
}

#[tokio::test]
async fn test_slot_without_session_rejected() {
    let h = Harness::new().await;
    let err = h.submit("", "1", "rock").await.unwrap_err();
    assert!(matches!(err, IngestError::SlotWithoutSession));
}

#[tokio::test]
async fn test_unknown_session_returns_not_found() {
    let h = Harness::new().await;
    let err = h.submit("nosuchgame", "", "rock").await.unwrap_err();
    assert!(matches!(err, IngestError::SessionNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_join_before_first_snapshot_returns_unavailable() {
    let mut h = Harness::new().await;
    let created = h.submit("", "", "rock").await.unwrap();
    let id = created.session_id;

    // The creating choice is on the log but nothing has resolved it yet.
    let err = h.submit(id.as_str(), "", "paper").await.unwrap_err();
    assert!(matches!(err, IngestError::SessionUnavailable(_)));
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(h.log.records("player-choices").len(), 1);

    h.resolve_next().await;
    let joined = h.submit(id.as_str(), "", "paper").await.unwrap();
    assert_eq!(joined.slot, PlayerSlot::Two);
}

#[tokio::test]
async fn test_unknown_session_with_other_choices_logged_returns_not_found() {
    let mut h = Harness::new().await;
    start_session(&mut h, "rock").await;
    let err = h.submit("nosuchgame", "", "rock").await.unwrap_err();
    assert!(matches!(err, IngestError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_second_player_before_first_is_rejected() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;
    h.play(id.as_str(), "", "rock").await;

    // Round 2: nobody has played yet.
    let err = h.submit(id.as_str(), "", "paper").await.unwrap_err();
    assert!(matches!(err, IngestError::WaitingForFirstPlayer(_)));
}

#[tokio::test]
async fn test_invalid_slot_rejected() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;
    let err = h.submit(id.as_str(), "3", "paper").await.unwrap_err();
    assert!(matches!(err, IngestError::InvalidPlayerSlot(_)));
}

#[tokio::test]
async fn test_offline_log_surfaces_infrastructure_error() {
    let h = Harness::new().await;
    h.log.set_available(false);
    let err = h.submit("", "", "rock").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
}

// =========================================================================
// Resolver behaviour
// =========================================================================

#[tokio::test]
async fn test_racing_second_players_resolve_first_and_ignore_second() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;

    // Both validate against the same snapshot and are both accepted.
    let a = h.submit(id.as_str(), "", "scissors").await.unwrap();
    let b = h.submit(id.as_str(), "", "paper").await.unwrap();
    assert_eq!(a.slot, PlayerSlot::Two);
    assert_eq!(b.slot, PlayerSlot::Two);

    let first = h.resolve_next().await;
    assert!(matches!(
        first,
        ResolveOutcome::Applied(ChoiceApplied::RoundResolved { round: 1, .. })
    ));
    let second = h.resolve_next().await;
    assert_eq!(
        second,
        ResolveOutcome::Ignored(SessionError::StaleRound { current: 2, got: 1 })
    );

    let session = h.snapshot(&id).await;
    assert_eq!(session.player1_wins, 1);
    assert_eq!(session.current_round, 2);
}

#[tokio::test]
async fn test_choice_for_finished_session_republishes_unchanged() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;
    h.play(id.as_str(), "", "scissors").await;
    h.play_round(id.as_str(), "rock", "scissors").await;
    h.play_round(id.as_str(), "rock", "scissors").await;
    let finished = h.snapshot(&id).await;
    let published = h.snapshot_count();

    let late = PlayerChoice {
        slot: PlayerSlot::Two,
        session_id: id.clone(),
        choice: Choice::Rock,
        round_number: 3,
        is_session_init: false,
    };
    let outcome = h.resolver.apply(&late).await.unwrap();

    assert!(matches!(
        outcome,
        ResolveOutcome::Ignored(SessionError::GameFinished { .. })
    ));
    assert_eq!(h.snapshot_count(), published + 1);
    assert_eq!(h.snapshot(&id).await, finished);
}

#[tokio::test]
async fn test_every_choice_publishes_a_snapshot() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;
    assert_eq!(h.snapshot_count(), 1);

    h.play(id.as_str(), "", "paper").await;
    assert_eq!(h.snapshot_count(), 2);

    let session = h.snapshot(&id).await;
    assert_eq!(session.player2_wins, 1);
    assert_eq!(session.version, 2);
}

#[tokio::test]
async fn test_choice_for_unseen_session_creates_it() {
    let h = Harness::new().await;
    let choice = PlayerChoice {
        slot: PlayerSlot::Two,
        session_id: SessionId::from("fromelsewh"),
        choice: Choice::Paper,
        round_number: 1,
        is_session_init: false,
    };

    let outcome = h.resolver.apply(&choice).await.unwrap();

    assert!(matches!(outcome, ResolveOutcome::Applied(_)));
    let session = h.snapshot(&choice.session_id).await;
    assert!(session.player2_has_played);
    assert!(!session.player1_has_played);
}

#[tokio::test]
async fn test_reapplying_after_failed_publish_republishes_stored_session() {
    let mut h = Harness::new().await;
    let created = h.submit("", "", "rock").await.unwrap();
    let record = h.choices.next().await.unwrap().unwrap();

    // The swap lands but the snapshot append fails.
    h.log.set_available(false);
    assert!(h.resolver.handle_record(&record).await.is_err());
    h.log.set_available(true);
    assert_eq!(h.snapshot_count(), 0);

    let retried = h.resolver.handle_record(&record).await.unwrap();
    assert_eq!(
        retried,
        ResolveOutcome::Ignored(SessionError::AlreadyPlayed {
            slot: PlayerSlot::One,
            round: 1
        })
    );
    assert_eq!(h.snapshot_count(), 1);
    let session = h.snapshot(&created.session_id).await;
    assert!(session.player1_has_played);
    assert_eq!(session.version, 1);
}

#[tokio::test]
async fn test_canary_and_malformed_records_are_skipped() {
    let h = Harness::new().await;
    let canary = Record {
        topic: "player-choices".into(),
        offset: 0,
        key: CANARY_KEY.to_vec(),
        value: b"availability probe".to_vec(),
    };
    assert_eq!(
        h.resolver.handle_record(&canary).await.unwrap(),
        ResolveOutcome::Skipped
    );

    let garbage = Record {
        topic: "player-choices".into(),
        offset: 1,
        key: b"abc".to_vec(),
        value: b"{not json".to_vec(),
    };
    let result = h.resolver.handle_record(&garbage).await;
    assert!(matches!(result, Err(shifumi_engine::EngineError::Protocol(_))));
    assert_eq!(h.snapshot_count(), 0);
}

// =========================================================================
// Snapshot reader
// =========================================================================

/// A log whose offset queries never answer.
struct StalledLog(MemoryLog);

impl EventLog for StalledLog {
    type Reader = MemoryReader;

    async fn create_topic(&self, topic: &str) -> Result<(), LogError> {
        self.0.create_topic(topic).await
    }

    async fn append(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<u64, LogError> {
        self.0.append(topic, key, value).await
    }

    async fn end_offset(&self, _topic: &str) -> Result<u64, LogError> {
        std::future::pending().await
    }

    async fn reader(
        &self,
        topic: &str,
        start: StartFrom,
    ) -> Result<MemoryReader, LogError> {
        self.0.reader(topic, start).await
    }
}

#[tokio::test]
async fn test_lookup_empty_topic_is_absent() {
    let log = Arc::new(MemoryLog::new());
    log.create_topic("game-results").await.unwrap();
    let reader = SnapshotReader::new(log, &EngineConfig::default());

    let lookup = reader.lookup(&SessionId::from("abc")).await.unwrap();
    assert_eq!(lookup, SnapshotLookup::Absent);
}

#[tokio::test]
async fn test_lookup_picks_highest_version_and_skips_garbage() {
    let log = Arc::new(MemoryLog::new());
    let mut newer = Session::new(SessionId::from("abc"));
    newer.version = 5;
    let mut older = newer.clone();
    older.version = 3;
    let other = Session::new(SessionId::from("xyz"));

    for session in [&newer, &other] {
        let payload = JsonCodec.encode(session).unwrap();
        log.append("game-results", session.session_id.as_bytes(), &payload)
            .await
            .unwrap();
    }
    log.append("game-results", b"abc", b"garbage").await.unwrap();
    let payload = JsonCodec.encode(&older).unwrap();
    log.append("game-results", b"abc", &payload).await.unwrap();

    let reader = SnapshotReader::new(Arc::clone(&log), &EngineConfig::default());
    let found = reader
        .lookup(&SessionId::from("abc"))
        .await
        .unwrap()
        .into_session()
        .unwrap();
    assert_eq!(found.version, 5);
}

#[tokio::test(start_paused = true)]
async fn test_lookup_past_deadline_times_out() {
    let log = Arc::new(StalledLog(MemoryLog::new()));
    let config = EngineConfig::default().with_read_deadline(Duration::from_secs(5));
    let reader = SnapshotReader::new(Arc::clone(&log), &config);

    let started = tokio::time::Instant::now();
    let lookup = reader.lookup(&SessionId::from("abc")).await.unwrap();

    assert_eq!(lookup, SnapshotLookup::TimedOut);
    assert_eq!(started.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_submit_past_deadline_returns_unavailable() {
    let log = Arc::new(StalledLog(MemoryLog::new()));
    let ingestor = ChoiceIngestor::new(log, &EngineConfig::default());

    let request = ChoiceRequest::new("rock").session("abcdefghij");
    let err = ingestor.submit(&request).await.unwrap_err();

    assert!(matches!(err, IngestError::SessionUnavailable(_)));
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}

#[tokio::test]
async fn test_lookup_offline_log_is_an_error() {
    let log = Arc::new(MemoryLog::new());
    log.create_topic("game-results").await.unwrap();
    log.set_available(false);
    let reader = SnapshotReader::new(log, &EngineConfig::default());

    assert!(reader.lookup(&SessionId::from("abc")).await.is_err());
}

// =========================================================================
// Recovery and the consumer loop
// =========================================================================

#[tokio::test]
async fn test_restarted_resolver_continues_from_snapshot_log() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;
    h.play(id.as_str(), "", "scissors").await;

    // A new resolver process: empty cache, same log.
    let config = EngineConfig::default();
    let restarted = RoundResolver::new(
        LogBackedRepository::new(Arc::clone(&h.log), &config),
        Arc::clone(&h.log),
        config,
    );
    let choice = PlayerChoice {
        slot: PlayerSlot::One,
        session_id: id.clone(),
        choice: Choice::Paper,
        round_number: 2,
        is_session_init: false,
    };
    restarted.apply(&choice).await.unwrap();

    let session = h.snapshot(&id).await;
    assert_eq!(session.player1_wins, 1);
    assert_eq!(session.current_round, 2);
    assert!(session.player1_has_played);
    assert_eq!(session.version, 3);
    assert_eq!(restarted.repository().cached(), 1);
}

async fn wait_for_snapshots(log: &MemoryLog, count: usize) {
    for _ in 0..200 {
        if log.records("game-results").len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} snapshots");
}

#[tokio::test]
async fn test_run_resolves_appended_choices_until_shutdown() {
    let log = Arc::new(MemoryLog::new());
    let config = EngineConfig::default();
    for topic in config.topics() {
        log.create_topic(&topic).await.unwrap();
    }
    let resolver = Arc::new(RoundResolver::new(
        InMemorySessionRepository::new(),
        Arc::clone(&log),
        config.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = {
        let resolver = Arc::clone(&resolver);
        tokio::spawn(async move { resolver.run(shutdown_rx).await })
    };

    let ingestor = ChoiceIngestor::new(Arc::clone(&log), &config);
    log.append("player-choices", CANARY_KEY, b"probe").await.unwrap();
    let first = ingestor.submit(&ChoiceRequest::new("rock")).await.unwrap();
    wait_for_snapshots(&log, 1).await;

    let join = ChoiceRequest::new("scissors").session(first.session_id.as_str());
    ingestor.submit(&join).await.unwrap();
    wait_for_snapshots(&log, 2).await;

    shutdown_tx.send_replace(true);
    task.await.unwrap().unwrap();

    let reader = SnapshotReader::new(Arc::clone(&log), &config);
    let session = reader
        .lookup(&first.session_id)
        .await
        .unwrap()
        .into_session()
        .unwrap();
    assert_eq!(session.player1_wins, 1);
    assert_eq!(resolver.repository().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_retries_until_log_comes_online() {
    let log = Arc::new(MemoryLog::new());
    let mut config = EngineConfig::default();
    config.reconnect =
        BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(1));
    log.set_available(false);

    let resolver = RoundResolver::new(
        InMemorySessionRepository::new(),
        Arc::clone(&log),
        config.clone(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move { resolver.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_secs(7)).await;
    log.set_available(true);

    let choice = PlayerChoice {
        slot: PlayerSlot::One,
        session_id: SessionId::from("abcdefghij"),
        choice: Choice::Rock,
        round_number: 1,
        is_session_init: true,
    };
    let payload = JsonCodec.encode(&choice).unwrap();
    log.append("player-choices", b"abcdefghij", &payload)
        .await
        .unwrap();
    wait_for_snapshots(&log, 1).await;

    shutdown_tx.send_replace(true);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_run_returns_when_log_closes() {
    let log = Arc::new(MemoryLog::new());
    let resolver = RoundResolver::new(
        InMemorySessionRepository::new(),
        Arc::clone(&log),
        EngineConfig::default(),
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move { resolver.run(shutdown_rx).await });

    log.close();
    task.await.unwrap().unwrap();
}

/// A log whose first offset query fails.
struct FlakyLog {
    inner: MemoryLog,
    tripped: AtomicBool,
}

impl FlakyLog {
    fn new(inner: MemoryLog) -> Self {
        Self {
            inner,
            tripped: AtomicBool::new(false),
        }
    }

    fn tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}

impl EventLog for FlakyLog {
    type Reader = MemoryReader;

    async fn create_topic(&self, topic: &str) -> Result<(), LogError> {
        self.inner.create_topic(topic).await
    }

    async fn append(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<u64, LogError> {
        self.inner.append(topic, key, value).await
    }

    async fn end_offset(&self, topic: &str) -> Result<u64, LogError> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(LogError::Unavailable("transient failure".into()));
        }
        self.inner.end_offset(topic).await
    }

    async fn reader(
        &self,
        topic: &str,
        start: StartFrom,
    ) -> Result<MemoryReader, LogError> {
        self.inner.reader(topic, start).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_run_retries_record_after_transient_failure() {
    let mut h = Harness::new().await;
    let id = start_session(&mut h, "rock").await;
    h.submit(id.as_str(), "", "scissors").await.unwrap();
    assert_eq!(h.snapshot_count(), 1);

    // A restarted resolver whose first snapshot recovery fails.
    let mut config = EngineConfig::default();
    config.reconnect =
        BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(1));
    let log = Arc::new(FlakyLog::new(MemoryLog::clone(&h.log)));
    let resolver = RoundResolver::new(
        LogBackedRepository::new(Arc::clone(&log), &config),
        Arc::clone(&log),
        config,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move { resolver.run(shutdown_rx).await });

    wait_for_snapshots(&h.log, 2).await;
    shutdown_tx.send_replace(true);
    task.await.unwrap().unwrap();

    assert!(log.tripped());
    let session = h.snapshot(&id).await;
    assert_eq!(session.player1_wins, 1);
    assert_eq!(session.current_round, 2);
    assert!(!session.player2_has_played);
}
