//! # Draw Controller
//!
//! The operator-facing facade over the whole raffle workflow. It owns
//! the synchronizer, the draw engine, the reveal sequencer and both
//! coordinators, exposes the operator actions with their pre- and
//! postconditions, and publishes an observable state snapshot on a
//! watch channel for the surrounding UI layer.
//!
//! ## Concurrency discipline:
//!
//! - Every draw is made against a snapshot of the pool taken at draw
//!   start; live feed updates never alter an in-flight reveal.
//! - A busy flag rejects duplicate submissions while a store operation
//!   or reveal animation is pending, mirroring a disabled button.
//! - Abandoning an unconfirmed batch (`close_draw_modal`) mutates no
//!   persisted state; only explicit confirm or redraw do.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::config::DrawConfig;
use crate::core::commit::CommitCoordinator;
use crate::core::engine::{DrawEngine, RandomSource};
use crate::core::redraw::RedrawCoordinator;
use crate::core::sequencer::{DrawingState, RevealSequencer};
use crate::core::synchronizer::{PoolSnapshot, PoolSynchronizer};
use crate::errors::DrawError;
use crate::models::Attendee;
use crate::store::DocumentStore;

/// The observable state published to the UI layer after every change.
#[derive(Debug, Clone)]
pub struct DrawSnapshot {
    pub drawing_state: DrawingState,
    pub current_winner: Option<Attendee>,
    pub batch_winners: Vec<Attendee>,
    pub current_batch_index: usize,
    pub eligible_pool_size: usize,
    pub prize_remaining: Option<u32>,
    /// True while a redraw request awaits the operator's confirmation.
    pub pending_redraw: bool,
}

impl Default for DrawSnapshot {
    fn default() -> Self {
        Self {
            drawing_state: DrawingState::Idle,
            current_winner: None,
            batch_winners: Vec::new(),
            current_batch_index: 0,
            eligible_pool_size: 0,
            prize_remaining: None,
            pending_redraw: false,
        }
    }
}

struct Inner {
    engine: DrawEngine,
    sequencer: RevealSequencer,
    selected_prize: Option<String>,
    quantity: u32,
    /// The pool/prize snapshot the current batch was drawn from,
    /// replaced wholesale on every sync.
    pool: PoolSnapshot,
    pending_redraw: bool,
}

/// Clears the busy flag when an action finishes, success or failure.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DrawController<S: DocumentStore> {
    synchronizer: Arc<PoolSynchronizer<S>>,
    commit: CommitCoordinator<S>,
    redraw: RedrawCoordinator<S>,
    config: Arc<DrawConfig>,
    inner: Mutex<Inner>,
    busy: AtomicBool,
    state_tx: watch::Sender<DrawSnapshot>,
}

impl<S: DocumentStore> DrawController<S> {
    pub fn new(store: Arc<S>, config: DrawConfig, rng: Box<dyn RandomSource>) -> Self {
        let config = Arc::new(config);
        let (state_tx, _) = watch::channel(DrawSnapshot::default());
        Self {
            synchronizer: Arc::new(PoolSynchronizer::new(Arc::clone(&store), Arc::clone(&config))),
            commit: CommitCoordinator::new(Arc::clone(&store), Arc::clone(&config)),
            redraw: RedrawCoordinator::new(store, Arc::clone(&config)),
            config,
            inner: Mutex::new(Inner {
                engine: DrawEngine::new(rng),
                sequencer: RevealSequencer::new(),
                selected_prize: None,
                quantity: 1,
                pool: PoolSnapshot::default(),
                pending_redraw: false,
            }),
            busy: AtomicBool::new(false),
            state_tx,
        }
    }

    /// The synchronizer, for callers that want the push-based pool feed.
    pub fn synchronizer(&self) -> &Arc<PoolSynchronizer<S>> {
        &self.synchronizer
    }

    /// Subscribes to state snapshots.
    pub fn watch_state(&self) -> watch::Receiver<DrawSnapshot> {
        self.state_tx.subscribe()
    }

    fn acquire_busy(&self) -> Result<BusyGuard<'_>, DrawError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(DrawError::Busy);
        }
        Ok(BusyGuard(&self.busy))
    }

    fn publish(&self, inner: &Inner) {
        let snapshot = DrawSnapshot {
            drawing_state: inner.sequencer.state(),
            current_winner: inner.sequencer.current_winner().cloned(),
            batch_winners: inner.sequencer.batch().to_vec(),
            current_batch_index: inner.sequencer.current_index(),
            eligible_pool_size: inner.pool.attendees.len(),
            prize_remaining: inner.pool.prize.as_ref().map(|p| p.remaining),
            pending_redraw: inner.pending_redraw,
        };
        let _ = self.state_tx.send(snapshot);
    }

    /// Selects the prize to draw for and synchronizes the pool against
    /// it. Rejected while a batch is active.
    pub async fn select_prize(&self, prize_id: &str) -> Result<PoolSnapshot, DrawError> {
        let mut inner = self.inner.lock().await;
        if matches!(
            inner.sequencer.state(),
            DrawingState::Drawing | DrawingState::Revealed
        ) {
            return Err(DrawError::InvalidTransition(
                "cannot change the prize while a batch is active",
            ));
        }
        let snapshot = self.synchronizer.sync(Some(prize_id)).await?;
        inner.selected_prize = Some(prize_id.to_string());
        inner.pool = snapshot.clone();
        self.publish(&inner);
        Ok(snapshot)
    }

    /// Sets how many winners the next draw should request.
    pub async fn set_draw_quantity(&self, quantity: u32) -> Result<(), DrawError> {
        if quantity == 0 {
            return Err(DrawError::EmptyPoolOrOutOfStock);
        }
        let mut inner = self.inner.lock().await;
        if matches!(
            inner.sequencer.state(),
            DrawingState::Drawing | DrawingState::Revealed
        ) {
            return Err(DrawError::InvalidTransition(
                "cannot change the quantity while a batch is active",
            ));
        }
        inner.quantity = quantity;
        Ok(())
    }

    /// Draws a fresh batch and runs the first winner's reveal. Returns
    /// the animation name sequence, whose last entry is the true winner.
    pub async fn start_draw(&self) -> Result<Vec<String>, DrawError> {
        let _busy = self.acquire_busy()?;
        let mut inner = self.inner.lock().await;
        if inner.sequencer.state() != DrawingState::Idle {
            return Err(DrawError::InvalidTransition(
                "a draw can only start from the idle state",
            ));
        }
        self.run_draw(&mut inner).await
    }

    /// Shared draw routine: fresh sync, snapshot, selection, reveal.
    async fn run_draw(&self, inner: &mut Inner) -> Result<Vec<String>, DrawError> {
        let prize_id = inner
            .selected_prize
            .clone()
            .ok_or(DrawError::InvalidTransition("no prize selected"))?;

        // Fresh authoritative state; the draw operates on this snapshot
        // for its whole lifetime, regardless of live feed churn.
        let snapshot = self.synchronizer.sync(Some(&prize_id)).await?;
        inner.pool = snapshot;
        let prize = inner
            .pool
            .prize
            .clone()
            .ok_or_else(|| DrawError::SyncReadFailure(format!("prize '{}' not found", prize_id)))?;

        let batch = inner
            .engine
            .draw(&inner.pool.attendees, &prize, inner.quantity)?;
        inner.sequencer.begin(batch)?;
        self.publish(inner);

        self.finish_reveal(inner).await
    }

    /// Time-gates the Drawing -> Revealed transition and builds the
    /// cosmetic name shuffle. The winner was fixed before this runs.
    async fn finish_reveal(&self, inner: &mut Inner) -> Result<Vec<String>, DrawError> {
        tokio::time::sleep(self.config.reveal_duration()).await;

        let winner = inner.sequencer.mark_revealed()?.clone();
        let names = inner.engine.reveal_sequence(
            &inner.pool.attendees,
            &winner,
            self.config.reveal_sequence_len,
        );
        self.publish(inner);
        Ok(names)
    }

    /// Advances to the next winner of the batch and runs their reveal.
    pub async fn next_winner(&self) -> Result<Vec<String>, DrawError> {
        let _busy = self.acquire_busy()?;
        let mut inner = self.inner.lock().await;
        inner.sequencer.advance()?;
        self.publish(&inner);
        self.finish_reveal(&mut inner).await
    }

    /// Commits the full revealed batch atomically and re-synchronizes
    /// the pool so subsequent draws never see the committed winners.
    pub async fn confirm_winners(&self) -> Result<(), DrawError> {
        let _busy = self.acquire_busy()?;
        let mut inner = self.inner.lock().await;
        if inner.sequencer.state() != DrawingState::Revealed {
            return Err(DrawError::InvalidTransition(
                "confirmation requires a revealed batch",
            ));
        }
        let prize_id = inner
            .selected_prize
            .clone()
            .ok_or(DrawError::InvalidTransition("no prize selected"))?;
        let batch = inner.sequencer.batch().to_vec();

        self.commit.commit(&batch, &prize_id).await?;
        inner.sequencer.confirm()?;
        inner.pending_redraw = false;

        match self.synchronizer.sync(Some(&prize_id)).await {
            Ok(snapshot) => inner.pool = snapshot,
            // The commit itself succeeded; a failed refresh only delays
            // the next pool view.
            Err(e) => log::warn!("Post-commit pool refresh failed: {}", e),
        }
        self.publish(&inner);
        Ok(())
    }

    /// Stages a redraw of the full batch, pending operator confirmation.
    /// No persisted state changes yet.
    pub async fn request_redraw(&self) -> Result<(), DrawError> {
        let mut inner = self.inner.lock().await;
        if inner.sequencer.state() != DrawingState::Revealed {
            return Err(DrawError::InvalidTransition(
                "a redraw can only be requested from a revealed batch",
            ));
        }
        inner.pending_redraw = true;
        self.publish(&inner);
        Ok(())
    }

    /// Withdraws a staged redraw request, returning to the revealed
    /// winner untouched.
    pub async fn cancel_redraw(&self) -> Result<(), DrawError> {
        let mut inner = self.inner.lock().await;
        if !inner.pending_redraw {
            return Err(DrawError::InvalidTransition("no redraw is pending"));
        }
        inner.pending_redraw = false;
        self.publish(&inner);
        Ok(())
    }

    /// Executes a staged redraw: the batch is permanently disqualified,
    /// the pool is re-synchronized, and a fresh draw starts automatically
    /// with the same prize and requested count (capped by whatever the
    /// new pool and stock support).
    pub async fn confirm_redraw(&self) -> Result<Vec<String>, DrawError> {
        let _busy = self.acquire_busy()?;
        let mut inner = self.inner.lock().await;
        if !inner.pending_redraw {
            return Err(DrawError::InvalidTransition("no redraw is pending"));
        }
        let batch = inner.sequencer.batch().to_vec();

        self.redraw.redraw(&batch).await?;
        inner.pending_redraw = false;
        inner.sequencer.reset();

        // Optimistic local removal first, then a wholesale replacement
        // from the authoritative read inside run_draw. The provisional
        // view is never merged with the fresh one.
        inner
            .pool
            .attendees
            .retain(|a| !batch.iter().any(|b| b.id == a.id));
        self.publish(&inner);

        let result = self.run_draw(&mut inner).await;
        if result.is_err() {
            // The disqualification stands; only the automatic follow-up
            // draw failed. Land back in idle with a fresh pool view.
            self.publish(&inner);
        }
        result
    }

    /// Abandons the current batch without mutating any persisted state
    /// and returns to idle.
    pub async fn close_draw_modal(&self) -> Result<(), DrawError> {
        let mut inner = self.inner.lock().await;
        inner.pending_redraw = false;
        inner.sequencer.reset();
        self.publish(&inner);
        Ok(())
    }

    /// Starts a new batch after a confirmed one, with the current prize
    /// and quantity.
    pub async fn draw_again(&self) -> Result<Vec<String>, DrawError> {
        let _busy = self.acquire_busy()?;
        let mut inner = self.inner.lock().await;
        if inner.sequencer.state() != DrawingState::Confirmed {
            return Err(DrawError::InvalidTransition(
                "drawing again requires a confirmed batch",
            ));
        }
        inner.sequencer.reset();
        self.run_draw(&mut inner).await
    }
}
