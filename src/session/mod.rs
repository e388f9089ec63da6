//! # Conversation Module
//!
//! Transport-independent dialogue that collects a stage, a register and a
//! template, then answers with the generated archive. A chat adapter turns
//! its updates into [`Incoming`] events and delivers the returned [`Reply`]
//! values.
use crate::document;
use crate::error::RustyCoverError;
use crate::pipeline::Artifact;
use crate::pipeline::Pipeline;
use crate::spreadsheet;
use crate::stage::Stage;
use crate::table::Table;
use tracing::error;
use tracing::info;

mod store;

pub use store::MemorySessionStore;
pub use store::SessionStore;

/// Chat or user identifier.
pub type SessionId = i64;

const GREETING: &str = "Здравствуйте! Я подготовлю титульные листы по реестру документов. Выберите стадию: ПД или РД.";
const HELP: &str = "1. Выберите стадию документации: ПД или РД.\n\
                    2. Отправьте реестр документов в формате .xlsx.\n\
                    3. Отправьте шаблон титульного листа в формате .docx.\n\
                    В ответ придёт архив с документом для каждой строки реестра.\n\
                    /cancel начинает заново.";
const CHOOSE_STAGE: &str = "Выберите стадию: ПД или РД.";
const SEND_TABLE: &str = "Отправьте реестр документов в формате .xlsx.";
const SEND_TEMPLATE: &str = "Реестр принят. Отправьте шаблон титульного листа в формате .docx.";
const WRONG_TABLE: &str = "Нужен файл реестра с расширением .xlsx.";
const WRONG_TEMPLATE: &str = "Нужен шаблон с расширением .docx.";
const NOT_STARTED: &str = "Отправьте /start, чтобы начать.";
const CANCELLED: &str = "Отменено. Выберите стадию: ПД или РД.";
const FAILURE: &str = "Не удалось обработать файлы. Проверьте реестр и шаблон и выберите стадию заново.";

/// Where a session is in the dialogue.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SessionState {
    #[default]
    AwaitingStage,
    AwaitingTable {
        stage: Stage,
    },
    AwaitingTemplate {
        stage: Stage,
        table: Table,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Cancel,
}

impl Command {
    /// Parses `/start`, `/help` and `/cancel`, with or without a `@bot` suffix.
    pub fn parse(text: &str) -> Option<Command> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Incoming {
    Command(Command),
    Text(String),
    Document { file_name: String, bytes: Vec<u8> },
}

impl Incoming {
    /// Classifies a text message as a command or plain text.
    pub fn from_text(text: &str) -> Incoming {
        match Command::parse(text) {
            Some(command) => Incoming::Command(command),
            None => Incoming::Text(text.to_owned()),
        }
    }
}

#[derive(Debug)]
pub enum Reply {
    Text(String),
    /// Prompt shown with one button per stage
    StageKeyboard(String),
    Archive(Artifact),
}

impl Reply {
    fn text(text: &str) -> Reply {
        Reply::Text(text.to_owned())
    }

    fn stage_keyboard(text: &str) -> Reply {
        Reply::StageKeyboard(text.to_owned())
    }

    /// Button labels of the stage keyboard.
    pub fn stage_buttons() -> [&'static str; 2] {
        Stage::ALL.map(|stage| stage.as_str())
    }
}

/// Drives every session through the dialogue.
pub struct Conversation<S: SessionStore> {
    pipeline: Pipeline,
    store: S,
}

impl<S: SessionStore> Conversation<S> {
    pub fn new(pipeline: Pipeline, store: S) -> Self {
        Conversation { pipeline, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handles one event of `session` and returns what to send back.
    pub fn handle(&self, session: SessionId, incoming: Incoming) -> Vec<Reply> {
        let state = self.store.take(session);
        let (next, replies) = self.transition(session, state, incoming);
        if let Some(state) = next {
            self.store.put(session, state);
        }
        replies
    }

    fn transition(
        &self,
        session: SessionId,
        state: Option<SessionState>,
        incoming: Incoming,
    ) -> (Option<SessionState>, Vec<Reply>) {
        let step = match (state, incoming) {
            (_, Incoming::Command(Command::Start)) => {
                return (Some(SessionState::AwaitingStage), vec![Reply::stage_keyboard(GREETING)]);
            }
            (_, Incoming::Command(Command::Cancel)) => {
                info!(session, "session cancelled");
                return (Some(SessionState::AwaitingStage), vec![Reply::stage_keyboard(CANCELLED)]);
            }
            (state, Incoming::Command(Command::Help)) => return (state, vec![Reply::text(HELP)]),
            (None, _) => return (None, vec![Reply::text(NOT_STARTED)]),
            (Some(state), incoming) => (state, incoming),
        };

        match step {
            (SessionState::AwaitingStage, Incoming::Text(text)) => match Stage::parse(&text) {
                Ok(stage) => {
                    info!(session, stage = %stage, "stage selected");
                    (Some(SessionState::AwaitingTable { stage }), vec![Reply::text(SEND_TABLE)])
                }
                Err(_) => (Some(SessionState::AwaitingStage), vec![Reply::stage_keyboard(CHOOSE_STAGE)]),
            },
            (SessionState::AwaitingStage, _) => (Some(SessionState::AwaitingStage), vec![Reply::stage_keyboard(CHOOSE_STAGE)]),

            (SessionState::AwaitingTable { stage }, Incoming::Document { file_name, bytes })
                if spreadsheet::is_supported(&file_name) =>
            {
                match self.pipeline.read_table(&file_name, bytes) {
                    Ok(table) => {
                        info!(session, file = %file_name, rows = table.len(), "register received");
                        (Some(SessionState::AwaitingTemplate { stage, table }), vec![Reply::text(SEND_TEMPLATE)])
                    }
                    Err(error) => self.fail(session, error),
                }
            }
            (state @ SessionState::AwaitingTable { .. }, _) => (Some(state), vec![Reply::text(WRONG_TABLE)]),

            (SessionState::AwaitingTemplate { stage, table }, Incoming::Document { file_name, bytes })
                if document::is_supported(&file_name) =>
            {
                match self.pipeline.generate(stage, &table, &bytes) {
                    Ok(artifact) => {
                        let report = artifact.report();
                        let mut summary = format!("Готово. Документов: {}.", report.documents.len());
                        if !report.skipped.is_empty() {
                            let rows: Vec<String> = report.skipped.iter().map(|failure| failure.row.to_string()).collect();
                            summary.push_str(&format!(" Пропущены строки: {}.", rows.join(", ")));
                        }
                        info!(session, file = %file_name, documents = report.documents.len(), "archive ready");
                        (
                            Some(SessionState::AwaitingStage),
                            vec![Reply::Archive(artifact), Reply::stage_keyboard(&summary)],
                        )
                    }
                    Err(error) => self.fail(session, error),
                }
            }
            (state @ SessionState::AwaitingTemplate { .. }, _) => (Some(state), vec![Reply::text(WRONG_TEMPLATE)]),
        }
    }

    fn fail(&self, session: SessionId, error: RustyCoverError) -> (Option<SessionState>, Vec<Reply>) {
        error!(session, error = %error, "request failed");
        (Some(SessionState::AwaitingStage), vec![Reply::stage_keyboard(FAILURE)])
    }
}
