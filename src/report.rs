//! Last-resort handling for errors escaping plugins.
//!
//! Every failure is logged.  The user who triggered it gets a generic notice, and the owner
//! gets the full report by DM.  Reporting never fails: problems while reporting are only
//! logged at debug level so a broken connection can't cause a loop of error reports.

use crate::{helper::error_embed, tasks::BackgroundTasks};
use anyhow::Result;
use serenity::{
    all::{
        ChannelId, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, CreateMessage, Http, InteractionId, MessageId, UserId,
    },
    builder::Builder,
};
use std::{
    backtrace::{Backtrace, BacktraceStatus},
    io::ErrorKind,
    sync::Arc,
};

pub const INTERNAL_ERROR_NOTICE: &str = "An internal error has occurred. The bot owner has been \
                                         notified and will likely fix the issue soon.";

/// Discord caps message size, so the owner report is sent this many lines at a time.
pub const OWNER_CHUNK_LINES: usize = 20;
/// Longest message Discord accepts, in characters
pub const MESSAGE_CHAR_LIMIT: usize = 2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    /// Only the user who triggered the action can see it
    Ephemeral,
}

/// Where an action came from, and so where to answer it
#[derive(Clone, Debug)]
pub struct Origin {
    pub target: ReplyTarget,
    pub visibility: Visibility,
}

#[derive(Clone, Debug)]
pub enum ReplyTarget {
    Message {
        channel_id: ChannelId,
        message_id: MessageId,
    },
    Interaction {
        id: InteractionId,
        token: String,
    },
}

impl Origin {
    pub fn message(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            target: ReplyTarget::Message {
                channel_id,
                message_id,
            },
            visibility: Visibility::Public,
        }
    }

    pub fn interaction(id: InteractionId, token: &str, visibility: Visibility) -> Self {
        Self {
            target: ReplyTarget::Interaction {
                id,
                token: token.to_owned(),
            },
            visibility,
        }
    }
}

/// Outgoing side of error reporting
#[serenity::async_trait]
pub trait Courier: Send + Sync {
    /// Answer `origin` with an error embed, in the origin's visibility
    async fn reply(&self, origin: &Origin, notice: &str) -> Result<()>;
    async fn message_owner(&self, content: &str) -> Result<()>;
}

/// Courier backed by the Discord HTTP API
pub struct DiscordCourier {
    http: Arc<Http>,
    owner: UserId,
}

impl DiscordCourier {
    pub fn new(http: Arc<Http>, owner: UserId) -> Self {
        Self { http, owner }
    }
}

#[serenity::async_trait]
impl Courier for DiscordCourier {
    async fn reply(&self, origin: &Origin, notice: &str) -> Result<()> {
        let embed = error_embed(notice);
        let ephemeral = origin.visibility == Visibility::Ephemeral;

        match &origin.target {
            ReplyTarget::Message {
                channel_id,
                message_id,
            } => {
                let message = CreateMessage::new()
                    .embed(embed)
                    .reference_message((*channel_id, *message_id));
                channel_id.send_message(self.http.as_ref(), message).await?;
            }
            ReplyTarget::Interaction { id, token } => {
                let response = CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .embed(embed.clone())
                        .ephemeral(ephemeral),
                );
                // Fails if the interaction was already acknowledged, e.g. deferred.
                if response
                    .execute(self.http.as_ref(), (*id, token.as_str()))
                    .await
                    .is_err()
                {
                    CreateInteractionResponseFollowup::new()
                        .embed(embed)
                        .ephemeral(ephemeral)
                        .execute(self.http.as_ref(), (None, token.as_str()))
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn message_owner(&self, content: &str) -> Result<()> {
        self.owner
            .direct_message(self.http.as_ref(), CreateMessage::new().content(content))
            .await?;
        Ok(())
    }
}

/// A failure on its way through the pipeline
pub struct ErrorReport {
    pub error: anyhow::Error,
    pub origin: Option<Origin>,
    /// Where the report was made, if the error carries no backtrace of its own
    reported_at: Option<Backtrace>,
}

impl ErrorReport {
    pub fn new(error: anyhow::Error, origin: Option<Origin>) -> Self {
        let reported_at = match error.backtrace().status() {
            BacktraceStatus::Captured => None,
            _ => Some(Backtrace::force_capture()),
        };
        Self {
            error,
            origin,
            reported_at,
        }
    }

    /// The peer hung up.  Nothing to fix, so not worth a stack dump.
    pub fn is_transient(&self) -> bool {
        self.error.chain().any(|cause| {
            if let Some(e) = cause.downcast_ref::<std::io::Error>() {
                return is_disconnect(e.kind());
            }
            if let Some(serenity::Error::Io(e)) = cause.downcast_ref::<serenity::Error>() {
                return is_disconnect(e.kind());
            }
            if let Some(e) = cause.downcast_ref::<reqwest::Error>() {
                return e.is_connect() || e.is_timeout();
            }
            false
        })
    }

    /// Error message, causes and a stack backtrace
    pub fn traceback(&self) -> String {
        match &self.reported_at {
            Some(backtrace) => format!("{:?}\n\nStack backtrace:\n{}", self.error, backtrace),
            None => format!("{:?}", self.error),
        }
    }

    /// What goes in the log.  One line for transient errors, the whole traceback otherwise.
    pub fn log_line(&self) -> String {
        if self.is_transient() {
            format!("Connection lost: {:#}", self.error)
        } else {
            format!("An error occurred: {}", self.traceback())
        }
    }

    /// Full report for the owner
    pub fn owner_message(&self) -> String {
        let origin = match self.origin.as_ref().map(|o| &o.target) {
            Some(ReplyTarget::Message {
                channel_id,
                message_id,
            }) => format!("message {} in <#{}>", message_id, channel_id),
            Some(ReplyTarget::Interaction { id, .. }) => format!("interaction {}", id),
            None => "an event".to_owned(),
        };

        format!("Error while handling {}:\n{}", origin, self.traceback())
    }
}

pub struct ErrorPipeline {
    courier: Arc<dyn Courier>,
    tasks: Arc<BackgroundTasks>,
}

impl ErrorPipeline {
    pub fn new(courier: Arc<dyn Courier>, tasks: Arc<BackgroundTasks>) -> Self {
        Self { courier, tasks }
    }

    pub fn courier(&self) -> &Arc<dyn Courier> {
        &self.courier
    }

    pub async fn handle(&self, error: anyhow::Error, origin: Option<Origin>) {
        let report = ErrorReport::new(error, origin);
        log::error!("{}", report.log_line());

        if let Some(origin) = &report.origin {
            if let Err(e) = self.courier.reply(origin, INTERNAL_ERROR_NOTICE).await {
                log::debug!("Could not send error notice: {:#}", e);
            }
        }

        if report.is_transient() {
            return;
        }

        let courier = self.courier.clone();
        let content = report.owner_message();
        self.tasks
            .spawn(async move {
                notify_owner(courier.as_ref(), &content, OWNER_CHUNK_LINES).await;
            })
            .await;
    }
}

/// Split `content` into groups of at most `lines` lines
pub fn line_split(content: &str, lines: usize) -> Vec<Vec<&str>> {
    let all: Vec<&str> = content.lines().collect();
    all.chunks(lines.max(1)).map(<[&str]>::to_vec).collect()
}

/// Owner messages for `content`: `lines` lines each, with any group still longer than
/// `max_chars` characters cut into pieces of `max_chars`.
pub fn owner_chunks(content: &str, lines: usize, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut messages = Vec::new();

    for group in line_split(content, lines) {
        let message = group.join("\n");
        if message.chars().count() <= max_chars {
            messages.push(message);
            continue;
        }

        let chars: Vec<char> = message.chars().collect();
        messages.extend(chars.chunks(max_chars).map(|piece| piece.iter().collect::<String>()));
    }

    messages
}

/// DM `content` to the owner in chunks.  Gives up at the first failed message.
pub async fn notify_owner(courier: &dyn Courier, content: &str, lines: usize) {
    for chunk in owner_chunks(content, lines, MESSAGE_CHAR_LIMIT) {
        if let Err(e) = courier.message_owner(&chunk).await {
            log::debug!("Could not message owner: {:#}", e);
            return;
        }
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCourier {
        replies: Mutex<Vec<(Visibility, String)>>,
        owner: Mutex<Vec<String>>,
        owner_unreachable: bool,
    }

    #[serenity::async_trait]
    impl Courier for RecordingCourier {
        async fn reply(&self, origin: &Origin, notice: &str) -> Result<()> {
            self.replies
                .lock()
                .unwrap()
                .push((origin.visibility, notice.to_owned()));
            Ok(())
        }

        async fn message_owner(&self, content: &str) -> Result<()> {
            if self.owner_unreachable {
                return Err(anyhow!("cannot DM owner"));
            }
            self.owner.lock().unwrap().push(content.to_owned());
            Ok(())
        }
    }

    static RECORDS: Mutex<Vec<String>> = Mutex::new(Vec::new());

    /// Keeps every log record so tests can count what the pipeline wrote
    struct CaptureLogger;

    impl log::Log for CaptureLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            RECORDS.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;

    fn capture_logs() {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);
    }

    /// Records mentioning `marker`.  Tests share the logger, so each uses its own marker.
    fn logged(marker: &str) -> Vec<String> {
        RECORDS
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.contains(marker))
            .cloned()
            .collect()
    }

    fn pipeline(courier: Arc<RecordingCourier>) -> (ErrorPipeline, Arc<BackgroundTasks>) {
        let tasks = Arc::new(BackgroundTasks::new());
        (ErrorPipeline::new(courier, tasks.clone()), tasks)
    }

    fn disconnect() -> anyhow::Error {
        anyhow::Error::new(std::io::Error::from(ErrorKind::ConnectionReset))
            .context("Could not send message")
    }

    #[test]
    fn disconnects_are_transient() {
        assert!(ErrorReport::new(disconnect(), None).is_transient());
        assert!(!ErrorReport::new(anyhow!("boom"), None).is_transient());
        let not_found = anyhow::Error::new(std::io::Error::from(ErrorKind::NotFound));
        assert!(!ErrorReport::new(not_found, None).is_transient());
    }

    #[test]
    fn transient_log_line_has_no_stack() {
        let line = ErrorReport::new(disconnect(), None).log_line();
        assert_eq!(line.lines().count(), 1);
        assert!(!line.contains("Caused by"));
        assert!(!line.contains("backtrace"));
    }

    #[test]
    fn generic_log_line_has_causes() {
        let error = anyhow!("inner").context("outer");
        let line = ErrorReport::new(error, None).log_line();
        assert!(line.contains("outer"));
        assert!(line.contains("Caused by"));
        assert!(line.contains("inner"));
    }

    #[test]
    fn generic_log_line_has_stack() {
        let line = ErrorReport::new(anyhow!("boom"), None).log_line();
        assert!(line.contains("Stack backtrace"));
        assert!(line.lines().count() > 1);
    }

    #[tokio::test]
    async fn transient_error_is_logged_once_without_stack() {
        capture_logs();
        let courier = Arc::new(RecordingCourier::default());
        let (pipeline, tasks) = pipeline(courier.clone());
        let error = anyhow::Error::new(std::io::Error::from(ErrorKind::BrokenPipe))
            .context("gateway went away 7f3a");

        pipeline.handle(error, None).await;
        tasks.join_all().await;

        let records = logged("gateway went away 7f3a");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lines().count(), 1);
        assert!(!records[0].contains("Stack backtrace"));
    }

    #[tokio::test]
    async fn generic_error_is_logged_once_with_stack() {
        capture_logs();
        let courier = Arc::new(RecordingCourier::default());
        let (pipeline, tasks) = pipeline(courier.clone());

        pipeline.handle(anyhow!("database on fire 91c2"), None).await;
        tasks.join_all().await;

        let records = logged("database on fire 91c2");
        assert_eq!(records.len(), 1);
        assert!(records[0].contains("Stack backtrace"));
    }

    #[tokio::test]
    async fn transient_without_origin_is_silent() {
        let courier = Arc::new(RecordingCourier::default());
        let (pipeline, tasks) = pipeline(courier.clone());

        pipeline.handle(disconnect(), None).await;
        tasks.join_all().await;

        assert!(courier.replies.lock().unwrap().is_empty());
        assert!(courier.owner.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reply_keeps_public_visibility() {
        let courier = Arc::new(RecordingCourier::default());
        let (pipeline, tasks) = pipeline(courier.clone());
        let origin = Origin::message(ChannelId::new(1), MessageId::new(2));

        pipeline.handle(anyhow!("boom"), Some(origin)).await;
        tasks.join_all().await;

        let replies = courier.replies.lock().unwrap();
        assert_eq!(
            *replies,
            vec![(Visibility::Public, INTERNAL_ERROR_NOTICE.to_owned())]
        );
        let owner = courier.owner.lock().unwrap();
        assert!(owner.concat().contains("boom"));
    }

    #[tokio::test]
    async fn reply_keeps_ephemeral_visibility() {
        let courier = Arc::new(RecordingCourier::default());
        let (pipeline, tasks) = pipeline(courier.clone());
        let origin = Origin::interaction(InteractionId::new(3), "token", Visibility::Ephemeral);

        pipeline.handle(anyhow!("boom"), Some(origin)).await;
        tasks.join_all().await;

        let replies = courier.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, Visibility::Ephemeral);
    }

    #[tokio::test]
    async fn unreachable_owner_is_swallowed() {
        let courier = Arc::new(RecordingCourier {
            owner_unreachable: true,
            ..Default::default()
        });
        let (pipeline, tasks) = pipeline(courier.clone());

        pipeline.handle(anyhow!("boom"), None).await;
        tasks.join_all().await;

        assert!(courier.owner.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_report_is_chunked() {
        let courier = RecordingCourier::default();
        let content: Vec<String> = (0..45).map(|i| format!("line {}", i)).collect();
        let content = content.join("\n");

        notify_owner(&courier, &content, 20).await;

        let sent = courier.owner.lock().unwrap();
        assert_eq!(sent.len(), 3);
        let sizes: Vec<usize> = sent.iter().map(|m| m.lines().count()).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_eq!(sent.join("\n"), content);
    }

    #[test]
    fn long_lines_are_cut_to_message_limit() {
        let content = format!("short\n{}", "x".repeat(4500));
        let chunks = owner_chunks(&content, 20, MESSAGE_CHAR_LIMIT);

        assert_eq!(chunks.len(), 3);
        assert!(chunks
            .iter()
            .all(|chunk| chunk.chars().count() <= MESSAGE_CHAR_LIMIT));
        assert_eq!(chunks.concat(), content);
    }

    #[test]
    fn short_groups_are_not_cut() {
        let chunks = owner_chunks("a\nb\nc", 2, MESSAGE_CHAR_LIMIT);
        assert_eq!(chunks, vec!["a\nb".to_owned(), "c".to_owned()]);
    }

    #[test]
    fn line_split_of_nothing() {
        assert!(line_split("", 20).is_empty());
    }
}
