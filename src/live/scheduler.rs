use crate::data::gateway::QuoteGateway;
use crate::domain::{LiveQuote, Ticker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Host context the polling cadence adapts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Foreground,
    Background,
}

/// Polling cadence per visibility state. The interval is recomputed from
/// the current visibility at every scheduling decision, never cached
/// across decisions.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub foreground: Duration,
    pub background: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            foreground: Duration::from_secs(15),
            background: Duration::from_secs(45),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self, visibility: Visibility) -> Duration {
        match visibility {
            Visibility::Foreground => self.foreground,
            Visibility::Background => self.background,
        }
    }
}

/// Handle to one running quote subscription.
///
/// Subscribers read the latest distinct quote from [`quotes`]; the
/// scheduler only publishes when the `(timestamp, close)` pair changes, so
/// downstream recomputation is driven by real ticks.
///
/// [`quotes`]: QuoteSubscription::quotes
pub struct QuoteSubscription {
    pub quotes: watch::Receiver<Option<LiveQuote>>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl QuoteSubscription {
    /// Cancel the subscription: the pending sleep is abandoned and the task
    /// exits at its next suspension point. An in-flight fetch result is
    /// dropped without emission. Dropping the subscription has the same
    /// effect, since the task also exits when the stop channel closes.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the polling task to finish after [`stop`].
    ///
    /// [`stop`]: QuoteSubscription::stop
    pub async fn stopped(self) {
        self.stop();
        let _ = self.task.await;
    }
}

/// Adaptive live-quote poller. One instance per ticker subscription; a
/// ticker switch stops the old subscription and starts a fresh one, so no
/// scheduling state is shared across tickers.
pub struct QuoteScheduler<G> {
    gateway: Arc<G>,
    config: SchedulerConfig,
}

impl<G: QuoteGateway + 'static> QuoteScheduler<G> {
    pub fn new(gateway: Arc<G>, config: SchedulerConfig) -> Self {
        QuoteScheduler { gateway, config }
    }

    /// Start polling `ticker` and return the subscription handle.
    ///
    /// Fetches are strictly sequential: the loop awaits each gateway call
    /// before sleeping, so overlapping fetches for one ticker cannot
    /// happen. Gateway errors and empty responses are skipped ticks; the
    /// loop only ends on cancellation.
    pub fn start(
        &self,
        ticker: Ticker,
        visibility: watch::Receiver<Visibility>,
    ) -> QuoteSubscription {
        let (quote_tx, quote_rx) = watch::channel(None);
        let (stop_tx, stop_rx) = watch::channel(false);
        let gateway = Arc::clone(&self.gateway);
        let config = self.config.clone();

        let task = tokio::spawn(run_loop(
            gateway, ticker, config, visibility, stop_rx, quote_tx,
        ));

        QuoteSubscription {
            quotes: quote_rx,
            stop_tx,
            task,
        }
    }
}

async fn run_loop<G: QuoteGateway>(
    gateway: Arc<G>,
    ticker: Ticker,
    config: SchedulerConfig,
    mut visibility: watch::Receiver<Visibility>,
    mut stop: watch::Receiver<bool>,
    quotes: watch::Sender<Option<LiveQuote>>,
) {
    let mut last_emitted: Option<(i64, f64)> = None;

    loop {
        match gateway.latest_quote(&ticker).await {
            Ok(Some(quote)) => {
                let key = (quote.timestamp, quote.close);
                if last_emitted != Some(key) {
                    last_emitted = Some(key);
                    if quotes.send(Some(quote)).is_err() {
                        // all subscribers gone
                        return;
                    }
                } else {
                    debug!(ticker = %ticker, "duplicate tick suppressed");
                }
            }
            Ok(None) => debug!(ticker = %ticker, "no usable quote this cycle"),
            Err(e) => warn!(ticker = %ticker, error = %e, "quote fetch failed, will retry"),
        }

        if *stop.borrow() {
            return;
        }

        // Sleep under the cadence for the current visibility. A visibility
        // change abandons the pending sleep and restarts it under the new
        // cadence rather than waiting out the old timer.
        let mut vis_closed = false;
        loop {
            let wait = config.interval(*visibility.borrow());
            tokio::select! {
                _ = tokio::time::sleep(wait) => break,
                changed = visibility.changed(), if !vis_closed => {
                    if changed.is_err() {
                        vis_closed = true;
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use chrono::NaiveDate;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{advance, timeout};

    fn ticker() -> Ticker {
        Ticker::new("ASML.AS").unwrap()
    }

    fn quote(ts: i64, close: f64) -> LiveQuote {
        LiveQuote {
            ticker: ticker(),
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            timestamp: ts,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    /// Gateway scripted with one response per fetch; the last entry
    /// repeats once the script runs out.
    struct ScriptedGateway {
        script: Mutex<Vec<Result<Option<LiveQuote>, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(script: Vec<Result<Option<LiveQuote>, String>>) -> Arc<Self> {
            Arc::new(ScriptedGateway {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl QuoteGateway for ScriptedGateway {
        fn latest_quote(
            &self,
            _ticker: &Ticker,
        ) -> impl Future<Output = Result<Option<LiveQuote>, ForecastError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            };
            async move { next.map_err(ForecastError::Upstream) }
        }
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            foreground: Duration::from_secs(15),
            background: Duration::from_secs(45),
        }
    }

    async fn next_emission(
        rx: &mut watch::Receiver<Option<LiveQuote>>,
    ) -> Option<LiveQuote> {
        timeout(Duration::from_secs(300), rx.changed())
            .await
            .expect("no emission before timeout")
            .expect("scheduler dropped the channel");
        rx.borrow_and_update().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_distinct_tick_is_emitted() {
        let gateway = ScriptedGateway::new(vec![Ok(Some(quote(1, 680.0)))]);
        let scheduler = QuoteScheduler::new(Arc::clone(&gateway), test_config());
        let (_vis_tx, vis_rx) = watch::channel(Visibility::Foreground);
        let mut sub = scheduler.start(ticker(), vis_rx);

        let emitted = next_emission(&mut sub.quotes).await.unwrap();
        assert_eq!(emitted.close, 680.0);
        sub.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_ticks_emit_once() {
        let gateway = ScriptedGateway::new(vec![Ok(Some(quote(1, 680.0)))]);
        let scheduler = QuoteScheduler::new(Arc::clone(&gateway), test_config());
        let (_vis_tx, vis_rx) = watch::channel(Visibility::Foreground);
        let mut sub = scheduler.start(ticker(), vis_rx);

        next_emission(&mut sub.quotes).await.unwrap();

        // several more cycles of the same tick: no further emission
        for _ in 0..4 {
            advance(Duration::from_secs(16)).await;
        }
        assert!(gateway.calls() >= 4);
        assert!(!sub.quotes.has_changed().unwrap());
        sub.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_close_emits_again() {
        let gateway = ScriptedGateway::new(vec![
            Ok(Some(quote(1, 680.0))),
            Ok(Some(quote(2, 681.5))),
        ]);
        let scheduler = QuoteScheduler::new(Arc::clone(&gateway), test_config());
        let (_vis_tx, vis_rx) = watch::channel(Visibility::Foreground);
        let mut sub = scheduler.start(ticker(), vis_rx);

        let first = next_emission(&mut sub.quotes).await.unwrap();
        assert_eq!(first.close, 680.0);
        let second = next_emission(&mut sub.quotes).await.unwrap();
        assert_eq!(second.close, 681.5);
        sub.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_cycles_do_not_stop_polling() {
        let gateway = ScriptedGateway::new(vec![
            Err("HTTP 502".to_string()),
            Ok(None),
            Ok(Some(quote(5, 683.0))),
        ]);
        let scheduler = QuoteScheduler::new(Arc::clone(&gateway), test_config());
        let (_vis_tx, vis_rx) = watch::channel(Visibility::Foreground);
        let mut sub = scheduler.start(ticker(), vis_rx);

        let emitted = next_emission(&mut sub.quotes).await.unwrap();
        assert_eq!(emitted.close, 683.0);
        assert!(gateway.calls() >= 3);
        sub.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_cadence_is_slower() {
        let gateway = ScriptedGateway::new(vec![Ok(None)]);
        let scheduler = QuoteScheduler::new(Arc::clone(&gateway), test_config());
        let (_vis_tx, vis_rx) = watch::channel(Visibility::Background);
        let sub = scheduler.start(ticker(), vis_rx);

        // give the task its first fetch
        advance(Duration::from_millis(1)).await;
        assert_eq!(gateway.calls(), 1);

        // a foreground interval elapses without a second fetch
        advance(Duration::from_secs(20)).await;
        assert_eq!(gateway.calls(), 1);

        advance(Duration::from_secs(30)).await;
        assert_eq!(gateway.calls(), 2);
        sub.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_change_reschedules_immediately() {
        let gateway = ScriptedGateway::new(vec![Ok(None)]);
        let scheduler = QuoteScheduler::new(Arc::clone(&gateway), test_config());
        let (vis_tx, vis_rx) = watch::channel(Visibility::Background);
        let sub = scheduler.start(ticker(), vis_rx);

        advance(Duration::from_millis(1)).await;
        assert_eq!(gateway.calls(), 1);

        // 10s into a 45s background wait, the host becomes visible: the
        // next fetch must land within the 15s foreground window (t=25),
        // well before the stale 45s timer would have fired
        advance(Duration::from_secs(10)).await;
        vis_tx.send(Visibility::Foreground).unwrap();
        advance(Duration::from_secs(16)).await;
        assert_eq!(gateway.calls(), 2);
        sub.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_suppresses_further_fetches() {
        let gateway = ScriptedGateway::new(vec![Ok(Some(quote(1, 680.0)))]);
        let scheduler = QuoteScheduler::new(Arc::clone(&gateway), test_config());
        let (_vis_tx, vis_rx) = watch::channel(Visibility::Foreground);
        let sub = scheduler.start(ticker(), vis_rx);

        advance(Duration::from_millis(1)).await;
        let calls_at_stop = gateway.calls();
        sub.stopped().await;

        advance(Duration::from_secs(120)).await;
        assert_eq!(gateway.calls(), calls_at_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_the_task() {
        let gateway = ScriptedGateway::new(vec![Ok(None)]);
        let scheduler = QuoteScheduler::new(Arc::clone(&gateway), test_config());
        let (_vis_tx, vis_rx) = watch::channel(Visibility::Foreground);
        let sub = scheduler.start(ticker(), vis_rx);

        advance(Duration::from_millis(1)).await;
        let calls_before = gateway.calls();
        drop(sub);

        advance(Duration::from_secs(120)).await;
        assert_eq!(gateway.calls(), calls_before);
    }

    #[test]
    fn test_cadence_is_pure_in_visibility() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval(Visibility::Foreground), Duration::from_secs(15));
        assert_eq!(config.interval(Visibility::Background), Duration::from_secs(45));
    }
}
