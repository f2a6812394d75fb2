//! Receive loop and per-message dispatch

use super::commands::Command;
use super::quote::QuoteResponder;
use super::supervisor::{SupervisorStats, TaskSupervisor};
use crate::error::{BotError, Result};
use crate::slack::{BotIdentity, Inbox, Message, ReplySink};
use futures::Stream;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::{self, Message as Frame};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reply to mentions that carry no stock command
pub const FALLBACK_REPLY: &str = "Dude i can only answer about stocks";

/// What the dispatcher did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not addressed to the bot
    Ignored,
    /// Answered with [`FALLBACK_REPLY`]
    Fallback { reply_id: u64 },
    /// Quote lookup handed to the supervisor
    QuoteQueued { symbol: String },
}

/// Routes inbound messages to replies
pub struct Dispatcher {
    mention: String,
    sink: Arc<dyn ReplySink>,
    responder: Arc<QuoteResponder>,
    supervisor: TaskSupervisor,
}

impl Dispatcher {
    pub fn new(
        identity: &BotIdentity,
        sink: Arc<dyn ReplySink>,
        responder: Arc<QuoteResponder>,
        supervisor: TaskSupervisor,
    ) -> Self {
        Self {
            mention: identity.mention_token(),
            sink,
            responder,
            supervisor,
        }
    }

    /// Handle one message
    ///
    /// Stock commands return as soon as the lookup is queued; the fallback
    /// reply is sent before returning.
    pub async fn dispatch(&mut self, message: Message) -> Result<Dispatch> {
        self.supervisor.reap();

        let Some(command) = Command::parse(&message, &self.mention) else {
            return Ok(Dispatch::Ignored);
        };

        match command {
            Command::Stock { symbol } => {
                debug!(%symbol, channel = %message.channel, "Queueing quote lookup");
                let responder = Arc::clone(&self.responder);
                let job_symbol = symbol.clone();
                self.supervisor.spawn(format!("quote:{symbol}"), async move {
                    responder.respond(message, job_symbol).await
                });
                Ok(Dispatch::QuoteQueued { symbol })
            }
            Command::Unsupported => {
                let reply_id = self.sink.send(message.reply(FALLBACK_REPLY)).await?;
                Ok(Dispatch::Fallback { reply_id })
            }
        }
    }

    /// Run the receive loop until the inbox closes or `shutdown` fires
    ///
    /// Decode and reply failures are logged and the loop keeps going. Jobs
    /// still running when the loop ends are cancelled. Only a shutdown
    /// request returns `Ok`; losing the socket is reported as an error.
    pub async fn run<S>(
        mut self,
        inbox: &mut Inbox<S>,
        shutdown: CancellationToken,
    ) -> Result<SupervisorStats>
    where
        S: Stream<Item = std::result::Result<Frame, tungstenite::Error>> + Unpin,
    {
        let exit = loop {
            let next = tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, leaving receive loop");
                    break Ok(());
                }
                next = inbox.receive() => next,
            };

            match next {
                None => {
                    error!("Connection closed by peer");
                    break Err(BotError::ConnectionClosed);
                }
                Some(Err(e @ BotError::WebSocketError(_))) => {
                    error!("Connection lost: {}", e);
                    break Err(e);
                }
                Some(Err(e)) => warn!("Failed to read message: {}", e),
                Some(Ok(message)) => {
                    if let Err(e) = self.dispatch(message).await {
                        warn!("Failed to reply: {}", e);
                    }
                }
            }
        };

        let stats = self.supervisor.shutdown().await;
        info!(?stats, "Receive loop stopped");
        exit.map(|()| stats)
    }

    /// Wait for queued lookups to finish
    pub async fn wait_idle(&mut self) {
        self.supervisor.wait_idle().await;
    }

    pub fn stats(&self) -> SupervisorStats {
        self.supervisor.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        DateRange, MockQuoteSource, QuoteLookup, QuotePoint, QuoteSeries, QuoteSource,
    };
    use crate::bot::quote::tests::RecordingSink;
    use async_trait::async_trait;
    use futures::{StreamExt, stream};
    use mockall::predicate::eq;
    use std::time::Duration;

    const FB_REPLY: &str = "Current Price 186.500 Price for last month :2024-01-01  was : 180.200";

    fn identity() -> BotIdentity {
        BotIdentity {
            id: "U123".to_string(),
            name: None,
        }
    }

    fn fb_source() -> MockQuoteSource {
        let mut source = MockQuoteSource::new();
        source.expect_lookup().returning(|symbol, _| {
            if symbol == "FB" {
                Ok(QuoteLookup::Found(QuoteSeries {
                    symbol: symbol.to_string(),
                    points: vec![
                        QuotePoint::new("2024-02-01", 186.5),
                        QuotePoint::new("2024-01-01", 180.2),
                    ],
                }))
            } else {
                Ok(QuoteLookup::NotFound { status: 404 })
            }
        });
        source
    }

    fn dispatcher(source: MockQuoteSource, sink: Arc<RecordingSink>) -> Dispatcher {
        let responder = Arc::new(QuoteResponder::new(Arc::new(source), sink.clone()));
        Dispatcher::new(
            &identity(),
            sink,
            responder,
            TaskSupervisor::new(4, CancellationToken::new()),
        )
    }

    /// Lookup that never answers
    struct HungSource;

    #[async_trait]
    impl QuoteSource for HungSource {
        async fn lookup(&self, _symbol: &str, _range: DateRange) -> Result<QuoteLookup> {
            std::future::pending().await
        }
    }

    async fn wait_for_replies(sink: &RecordingSink, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while sink.texts().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("replies did not arrive in time");
    }

    fn frame(json: &str) -> std::result::Result<Frame, tungstenite::Error> {
        Ok(Frame::Text(json.to_string().into()))
    }

    #[tokio::test]
    async fn test_unaddressed_message_gets_no_reply() {
        let sink = Arc::new(RecordingSink::default());
        let mut source = MockQuoteSource::new();
        source.expect_lookup().never();
        let mut dispatcher = dispatcher(source, sink.clone());

        let outcome = dispatcher.dispatch(Message::new("C1", "hello")).await.unwrap();
        dispatcher.wait_idle().await;

        assert_eq!(outcome, Dispatch::Ignored);
        assert!(sink.texts().is_empty());
    }

    #[tokio::test]
    async fn test_mention_without_command_gets_fallback() {
        let sink = Arc::new(RecordingSink::default());
        let mut source = MockQuoteSource::new();
        source.expect_lookup().never();
        let mut dispatcher = dispatcher(source, sink.clone());

        let outcome = dispatcher
            .dispatch(Message::new("C1", "<@U123> hi"))
            .await
            .unwrap();

        assert_eq!(outcome, Dispatch::Fallback { reply_id: 1 });
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, FALLBACK_REPLY);
        assert_eq!(sent[0].channel, "C1");
    }

    #[tokio::test]
    async fn test_stock_command_queues_lookup() {
        let sink = Arc::new(RecordingSink::default());
        let mut source = MockQuoteSource::new();
        source
            .expect_lookup()
            .with(eq("FB"), eq(DateRange::last_month()))
            .times(1)
            .returning(|symbol, _| {
                Ok(QuoteLookup::Found(QuoteSeries {
                    symbol: symbol.to_string(),
                    points: vec![
                        QuotePoint::new("2024-02-01", 186.5),
                        QuotePoint::new("2024-01-01", 180.2),
                    ],
                }))
            });
        let mut dispatcher = dispatcher(source, sink.clone());

        let outcome = dispatcher
            .dispatch(Message::new("C7", "<@U123> stock: FB "))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Dispatch::QuoteQueued {
                symbol: "FB".to_string()
            }
        );

        dispatcher.wait_idle().await;
        assert_eq!(sink.texts(), vec![FB_REPLY.to_string()]);
        assert_eq!(dispatcher.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_fallback_send_failure_is_reported() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let mut dispatcher = dispatcher(MockQuoteSource::new(), sink);

        tokio_test::assert_err!(dispatcher.dispatch(Message::new("C1", "<@U123> hi")).await);
    }

    #[tokio::test]
    async fn test_hung_lookup_does_not_block_dispatch() {
        let sink = Arc::new(RecordingSink::default());
        let responder = Arc::new(QuoteResponder::new(Arc::new(HungSource), sink.clone()));
        let mut dispatcher = Dispatcher::new(
            &identity(),
            sink.clone(),
            responder,
            TaskSupervisor::new(1, CancellationToken::new()),
        );

        for symbol in ["FB", "AAPL"] {
            let outcome = dispatcher
                .dispatch(Message::new("C1", format!("<@U123> stock: {symbol}")))
                .await
                .unwrap();
            assert_eq!(
                outcome,
                Dispatch::QuoteQueued {
                    symbol: symbol.to_string()
                }
            );
        }
        // Let the first lookup take the only permit
        tokio::task::yield_now().await;

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.dispatch(Message::new("C1", "<@U123> hi")),
        )
        .await
        .expect("dispatch blocked behind a hung lookup")
        .unwrap();

        assert_eq!(outcome, Dispatch::Fallback { reply_id: 1 });
        assert_eq!(sink.texts(), vec![FALLBACK_REPLY.to_string()]);
        assert_eq!(dispatcher.stats().spawned, 2);
        assert_eq!(dispatcher.stats().finished(), 0);
    }

    #[tokio::test]
    async fn test_run_loop_survives_bad_frames() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(fb_source(), sink.clone());

        let frames = vec![
            frame(r#"{"type":"hello"}"#),
            frame("{not json"),
            frame(r#"{"type":"message","channel":"C1","text":"just chatting"}"#),
            frame(r#"{"type":"message","channel":"C1","text":null}"#),
            frame(r#"{"type":"message","channel":"C1","text":"<@U123> hi"}"#),
            frame(r#"{"type":"message","channel":"C1","text":"<@U123> stock: NOPE"}"#),
        ];
        let mut inbox = Inbox::new(stream::iter(frames).chain(stream::pending()));

        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        let watched = sink.clone();
        let (result, ()) = tokio::join!(dispatcher.run(&mut inbox, shutdown), async move {
            wait_for_replies(&watched, 2).await;
            stop.cancel();
        });

        let stats = result.unwrap();
        assert_eq!(stats.spawned, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(
            sink.texts(),
            vec![
                FALLBACK_REPLY.to_string(),
                "Quote NOPE does not exist".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_run_reports_transport_failure() {
        let sink = Arc::new(RecordingSink::default());
        let mut source = MockQuoteSource::new();
        source.expect_lookup().never();
        let dispatcher = dispatcher(source, sink.clone());

        let frames = vec![
            Err(tungstenite::Error::ConnectionClosed),
            frame(r#"{"type":"message","channel":"C1","text":"<@U123> hi"}"#),
        ];
        let mut inbox = Inbox::new(stream::iter(frames));

        let result = dispatcher.run(&mut inbox, CancellationToken::new()).await;
        assert!(matches!(result, Err(BotError::WebSocketError(_))));
        assert!(sink.texts().is_empty());
    }

    #[tokio::test]
    async fn test_run_reports_peer_close() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(MockQuoteSource::new(), sink.clone());

        let frames = vec![
            frame(r#"{"type":"message","channel":"C1","text":"<@U123> hi"}"#),
            Ok(Frame::Close(None)),
        ];
        let mut inbox = Inbox::new(stream::iter(frames));

        let result = dispatcher.run(&mut inbox, CancellationToken::new()).await;
        assert!(matches!(result, Err(BotError::ConnectionClosed)));
        assert_eq!(sink.texts(), vec![FALLBACK_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let sink = Arc::new(RecordingSink::default());
        let mut source = MockQuoteSource::new();
        source.expect_lookup().never();
        let dispatcher = dispatcher(source, sink.clone());

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut inbox =
            Inbox::new(stream::pending::<std::result::Result<Frame, tungstenite::Error>>());

        let stats = tokio_test::assert_ok!(dispatcher.run(&mut inbox, shutdown).await);
        assert_eq!(stats, SupervisorStats::default());
        assert!(sink.texts().is_empty());
    }
}
