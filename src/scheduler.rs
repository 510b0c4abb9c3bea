//! Polling loop over instrument x timeframe
//!
//! ```text
//!   Running --pass done--> Sleeping --interval elapsed--> Running
//!      |                      |
//!      +------shutdown--------+-----------> Stopped
//! ```
//!
//! Pairs are analysed one after another on the calling task. A pair whose
//! analysis errors or panics is logged and skipped. A panic elsewhere in a
//! pass (delivery, bookkeeping) is caught here and followed by the recovery
//! delay instead of the poll interval. Shutdown is observed before each
//! pass, between pairs and while sleeping, never in the middle of a fetch or
//! send.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    analysis::{analyze, AnalysisSettings},
    detectors::PatternDetector,
    candle::{CandleSeries, Timeframe},
    dedup::SignalDeduplicator,
    notifier::Notifier,
    signal::Signal,
    source::Watch,
    Result,
};

/// Wall-clock source for cooldown bookkeeping
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Sleeping,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Candles requested per fetch
    pub fetch_limit: usize,
    /// Pause after a completed pass
    pub poll_interval: Duration,
    /// Pause after a pass that blew up
    pub recovery_delay: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            fetch_limit: 500,
            poll_interval: Duration::from_secs(60),
            recovery_delay: Duration::from_secs(10),
        }
    }
}

/// Counters for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pairs: usize,
    pub failed_pairs: usize,
    pub signals: usize,
    pub sent: usize,
    pub suppressed: usize,
    pub send_failures: usize,
    /// Stopped before every pair was analysed
    pub interrupted: bool,
}

pub struct Scheduler {
    watches: Vec<Watch>,
    timeframes: Vec<Timeframe>,
    analysis: AnalysisSettings,
    settings: SchedulerSettings,
    notifier: Arc<dyn Notifier>,
    dedup: SignalDeduplicator,
    clock: Arc<dyn Clock>,
    state: LoopState,
}

impl Scheduler {
    /// A fresh scheduler is `Running`: its first pass starts without delay.
    pub fn new(watches: Vec<Watch>, timeframes: Vec<Timeframe>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            watches,
            timeframes,
            analysis: AnalysisSettings::default(),
            settings: SchedulerSettings::default(),
            notifier,
            dedup: SignalDeduplicator::default(),
            clock: Arc::new(SystemClock),
            state: LoopState::Running,
        }
    }

    pub fn with_analysis(mut self, analysis: AnalysisSettings) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_dedup(mut self, dedup: SignalDeduplicator) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[inline]
    pub fn dedup(&self) -> &SignalDeduplicator {
        &self.dedup
    }

    #[inline]
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Analyse every pair once and forward eligible signals
    pub async fn run_pass(&mut self) -> PassReport {
        self.pass(None).await
    }

    /// One guarded pass. Returns how long to sleep before the next one.
    pub async fn step(&mut self) -> Duration {
        self.guarded_pass(None).await
    }

    /// Run until `shutdown` carries `true`
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            instruments = self.watches.len(),
            timeframes = self.timeframes.len(),
            periods = ?self.analysis.periods,
            poll_interval = ?self.settings.poll_interval,
            "Scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            let delay = self.guarded_pass(Some(&shutdown)).await;
            if *shutdown.borrow() {
                break;
            }

            self.state = LoopState::Sleeping;
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {}
                changed = shutdown.changed() => {
                    // Sender gone: nobody can stop us early any more
                    if changed.is_err() {
                        (&mut sleep).await;
                    }
                }
            }
        }

        self.state = LoopState::Stopped;
        info!("Scheduler stopped");
    }

    async fn guarded_pass(&mut self, shutdown: Option<&watch::Receiver<bool>>) -> Duration {
        self.state = LoopState::Running;
        match AssertUnwindSafe(self.pass(shutdown)).catch_unwind().await {
            Ok(report) => {
                debug!(
                    pairs = report.pairs,
                    failed = report.failed_pairs,
                    signals = report.signals,
                    sent = report.sent,
                    suppressed = report.suppressed,
                    send_failures = report.send_failures,
                    interrupted = report.interrupted,
                    "Pass complete"
                );
                self.settings.poll_interval
            }
            Err(payload) => {
                error!(
                    panic = %panic_message(payload.as_ref()),
                    retry_in = ?self.settings.recovery_delay,
                    "Main loop error"
                );
                self.settings.recovery_delay
            }
        }
    }

    /// Pairs run in order. A stop request is honoured between pairs; a pair
    /// already fetched is finished, sends included.
    async fn pass(&mut self, shutdown: Option<&watch::Receiver<bool>>) -> PassReport {
        let mut report = PassReport::default();
        let watches = self.watches.clone();
        let timeframes = self.timeframes.clone();

        'pairs: for watch in &watches {
            for &timeframe in &timeframes {
                if shutdown.is_some_and(|rx| *rx.borrow()) {
                    report.interrupted = true;
                    info!(done = report.pairs, "Shutdown requested, ending pass early");
                    break 'pairs;
                }

                report.pairs += 1;
                let outcome = AssertUnwindSafe(self.analyze_pair(watch, timeframe))
                    .catch_unwind()
                    .await;
                let signals = match outcome {
                    Ok(Ok(signals)) => signals,
                    Ok(Err(e)) => {
                        report.failed_pairs += 1;
                        if e.is_data_error() {
                            warn!(
                                instrument = %watch.instrument,
                                timeframe = %timeframe,
                                source = watch.source.name(),
                                error = %e,
                                "Analysis failed, skipping pair"
                            );
                        } else {
                            error!(
                                instrument = %watch.instrument,
                                timeframe = %timeframe,
                                source = watch.source.name(),
                                error = %e,
                                "Unexpected analysis error, skipping pair"
                            );
                        }
                        continue;
                    }
                    Err(payload) => {
                        report.failed_pairs += 1;
                        error!(
                            instrument = %watch.instrument,
                            timeframe = %timeframe,
                            source = watch.source.name(),
                            panic = %panic_message(payload.as_ref()),
                            "Analysis panicked, skipping pair"
                        );
                        continue;
                    }
                };

                report.signals += signals.len();
                for signal in signals {
                    self.dispatch(signal, &mut report).await;
                }
            }
        }

        report
    }

    async fn analyze_pair(&self, watch: &Watch, timeframe: Timeframe) -> Result<Vec<Signal>> {
        let candles = watch
            .source
            .fetch(&watch.instrument, timeframe, self.settings.fetch_limit)
            .await?;
        let series = CandleSeries::new(candles)?;
        analyze(&watch.instrument, timeframe, &series, &self.analysis)
    }

    async fn dispatch(&mut self, signal: Signal, report: &mut PassReport) {
        let key = signal.key();
        let now = self.clock.now();
        if !self.dedup.should_emit(&key, now) {
            report.suppressed += 1;
            debug!(%key, "Suppressed by cooldown");
            return;
        }

        if self.notifier.send(&signal.message).await {
            report.sent += 1;
            info!(
                %key,
                pattern = self.analysis.detector.name(),
                price = signal.price,
                ema = signal.ema_value,
                candle = %signal.candle_open_time,
                "Sent signal"
            );
            self.dedup.mark_sent(key, now);
        } else {
            report.send_failures += 1;
            warn!(%key, "Failed to send notification, will retry next pass");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{candle::Candle, source::MarketDataSource, SignalError};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataSource for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<Candle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SignalError::Malformed("boom".into()))
        }
    }

    /// Flat base, then a bullish engulfing on the closed candle
    struct Engulfing;

    #[async_trait]
    impl MarketDataSource for Engulfing {
        fn name(&self) -> &str {
            "engulfing"
        }

        async fn fetch(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<Candle>> {
            let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
            let mut candles: Vec<Candle> = (0..20)
                .map(|i| Candle::new(start + chrono::Duration::minutes(5 * i), 100.0, 100.5, 99.5, 100.0, 1.0))
                .collect();
            for (i, (o, h, l, c)) in [
                (100.2, 100.3, 99.6, 99.8),
                (99.7, 100.6, 99.5, 100.4),
                (100.4, 100.5, 100.3, 100.45),
            ]
            .into_iter()
            .enumerate()
            {
                let t = start + chrono::Duration::minutes(5 * (20 + i as i64));
                candles.push(Candle::new(t, o, h, l, c, 1.0));
            }
            Ok(candles)
        }
    }

    struct Panicking;

    #[async_trait]
    impl MarketDataSource for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn fetch(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<Candle>> {
            panic!("provider exploded");
        }
    }

    struct Silent;

    #[async_trait]
    impl Notifier for Silent {
        async fn send(&self, _: &str) -> bool {
            true
        }
    }

    /// Asks the loop to stop, then panics while delivering
    struct Exploding {
        stop: watch::Sender<bool>,
    }

    #[async_trait]
    impl Notifier for Exploding {
        async fn send(&self, _: &str) -> bool {
            let _ = self.stop.send(true);
            panic!("notifier exploded");
        }
    }

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            fetch_limit: 500,
            poll_interval: Duration::from_secs(3600),
            recovery_delay: Duration::from_secs(7),
        }
    }

    #[tokio::test]
    async fn test_failing_pairs_do_not_abort_pass() {
        let source = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let mut scheduler = Scheduler::new(
            vec![Watch::new("A", source.clone()), Watch::new("B", source.clone())],
            vec![Timeframe::M5, Timeframe::H1],
            Arc::new(Silent),
        );

        let report = scheduler.run_pass().await;
        assert_eq!(report.pairs, 4);
        assert_eq!(report.failed_pairs, 4);
        assert!(!report.interrupted);
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_step_uses_poll_interval() {
        let source = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let mut scheduler = Scheduler::new(vec![Watch::new("A", source)], vec![Timeframe::M5], Arc::new(Silent))
            .with_settings(settings());
        assert_eq!(scheduler.step().await, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_panicking_pair_is_skipped() {
        let mut scheduler = Scheduler::new(
            vec![Watch::new("A", Arc::new(Panicking)), Watch::new("B", Arc::new(Engulfing))],
            vec![Timeframe::M5],
            Arc::new(Silent),
        )
        .with_settings(settings());

        let report = scheduler.run_pass().await;
        assert_eq!(report.pairs, 2);
        assert_eq!(report.failed_pairs, 1);
        assert_eq!(report.sent, 2);

        // Contained per pair, so the pass itself completed
        assert_eq!(scheduler.step().await, Duration::from_secs(3600));
    }

    fn exploding_scheduler() -> (Scheduler, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let scheduler = Scheduler::new(
            vec![Watch::new("A", Arc::new(Engulfing))],
            vec![Timeframe::M5],
            Arc::new(Exploding { stop: tx }),
        )
        .with_settings(settings());
        (scheduler, rx)
    }

    #[tokio::test]
    async fn test_panic_in_pass_uses_recovery_delay() {
        let (mut scheduler, _rx) = exploding_scheduler();
        assert_eq!(scheduler.step().await, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_loop_survives_panic_and_stops() {
        let (mut scheduler, rx) = exploding_scheduler();
        scheduler.run(rx).await;
        assert_eq!(scheduler.state(), LoopState::Stopped);
        assert!(scheduler.dedup().is_empty());
    }

    #[tokio::test]
    async fn test_stop_before_first_pass() {
        let source = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let mut scheduler = Scheduler::new(vec![Watch::new("A", source.clone())], vec![Timeframe::M5], Arc::new(Silent));
        assert_eq!(scheduler.state(), LoopState::Running);
        scheduler.run(rx).await;

        assert_eq!(scheduler.state(), LoopState::Stopped);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    /// Confirms delivery and asks the loop to stop
    struct Stopper {
        stop: watch::Sender<bool>,
    }

    #[async_trait]
    impl Notifier for Stopper {
        async fn send(&self, _: &str) -> bool {
            let _ = self.stop.send(true);
            true
        }
    }

    #[tokio::test]
    async fn test_stop_between_pairs() {
        let (tx, rx) = watch::channel(false);
        let second = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let mut scheduler = Scheduler::new(
            vec![Watch::new("A", Arc::new(Engulfing)), Watch::new("B", second.clone())],
            vec![Timeframe::M5],
            Arc::new(Stopper { stop: tx }),
        );

        // Pair A finishes its sends; pair B is never fetched
        let report = scheduler.pass(Some(&rx)).await;
        assert!(report.interrupted);
        assert_eq!(report.pairs, 1);
        assert_eq!(report.sent, 2);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);

        // Without a shutdown handle a pass always runs to completion
        let report = scheduler.run_pass().await;
        assert!(!report.interrupted);
        assert_eq!(report.pairs, 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
