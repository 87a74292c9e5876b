use ratatui::widgets::ListState;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::client::ApiClient;
use crate::config::Config;
use crate::stream::StreamEvent;
use crate::tui::AppEvent;

/// Starter prompts shown on the welcome screen; the number keys send
/// them directly.
pub const SUGGESTIONS: [&str; 4] = [
    "Explain cloud security in simple terms",
    "What are the best cybersecurity practices?",
    "What is phishing and how do I prevent it?",
    "Give me tips on protecting personal data",
];

const NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Reply placeholder while the first record is awaited.
    Pending,
    /// Accumulated assistant text (or the user's message).
    Text(String),
    /// Withheld by the safety layer; shown as a warning, not a failure.
    Blocked(String),
    /// Request failed; shown inline in place of the reply.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

/// Transient toast, dismissed by the tick timer.
#[derive(Debug)]
pub struct Notice {
    pub text: String,
    pub expires_at: Instant,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Conversation state
    pub messages: Vec<ChatMessage>,
    pub streaming: bool,

    // Model state
    pub selected_model: String,
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Transient notices
    pub notices: Vec<Notice>,

    // Chat viewport (updated during render, used for scroll calculations)
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub chat_total_lines: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for the typing ellipsis

    pub client: ApiClient,
    events_tx: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(client: ApiClient, selected_model: String, events_tx: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            messages: Vec::new(),
            streaming: false,

            selected_model,
            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            notices: Vec::new(),

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_total_lines: 0,

            animation_frame: 0,

            client,
            events_tx,
        }
    }

    /// Send the current input. Ignored while a response is streaming or
    /// when the trimmed input is empty; both the flag and the entries are
    /// untouched in that case.
    pub fn submit(&mut self) {
        let message = self.input.trim().to_string();
        if message.is_empty() || self.streaming {
            return;
        }

        self.input.clear();
        self.cursor = 0;

        self.begin_exchange(&message);
        self.client.spawn_chat(message, self.events_tx.clone());
    }

    /// Pre-fill the input with a suggestion and send it immediately.
    pub fn submit_suggestion(&mut self, text: &str) {
        if self.streaming {
            return;
        }
        self.input = text.to_string();
        self.cursor = self.input.chars().count();
        self.submit();
    }

    /// Append the user entry and the pending reply placeholder, and take
    /// the streaming gate. The network side is the caller's business;
    /// stream events are applied through [`App::apply_stream_event`].
    pub fn begin_exchange(&mut self, message: &str) {
        debug!(model = %self.selected_model, "starting exchange");
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            content: MessageContent::Text(message.to_string()),
        });
        self.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: MessageContent::Pending,
        });
        self.streaming = true;
        self.scroll_chat_to_bottom();
    }

    /// The reply entry of the exchange in flight, if it still exists.
    /// New-chat may have cleared the view while the stream keeps going;
    /// late records then have nowhere to land and are dropped.
    fn streaming_reply_mut(&mut self) -> Option<&mut ChatMessage> {
        if !self.streaming {
            return None;
        }
        self.messages
            .last_mut()
            .filter(|message| message.role == ChatRole::Assistant)
    }

    pub fn apply_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Token(token) => {
                if let Some(reply) = self.streaming_reply_mut() {
                    match &mut reply.content {
                        MessageContent::Text(text) => text.push_str(&token),
                        MessageContent::Pending => reply.content = MessageContent::Text(token),
                        // A terminal record already replaced this reply
                        _ => return,
                    }
                    self.scroll_chat_to_bottom();
                }
            }
            StreamEvent::Blocked(message) => {
                if let Some(reply) = self.streaming_reply_mut() {
                    reply.content = MessageContent::Blocked(message);
                    self.scroll_chat_to_bottom();
                }
            }
            StreamEvent::Error(error) => {
                if let Some(reply) = self.streaming_reply_mut() {
                    reply.content = MessageContent::Failed(error);
                    self.scroll_chat_to_bottom();
                }
            }
            StreamEvent::Done => {}
        }
    }

    /// Release the streaming gate. Runs on every exit path of the request
    /// task, so sending always comes back, whatever the stream did.
    pub fn finish_stream(&mut self) {
        if let Some(reply) = self.streaming_reply_mut() {
            // Stream ended before any record arrived; nothing to show
            if reply.content == MessageContent::Pending {
                reply.content = MessageContent::Text(String::new());
            }
        }
        self.streaming = false;
    }

    /// Clear the conversation back to the welcome state.
    pub fn new_chat(&mut self) {
        self.messages.clear();
        self.chat_scroll = 0;
        self.chat_total_lines = 0;
    }

    // Model picker methods
    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i).cloned() {
                self.selected_model = model.clone();
                self.show_model_picker = false;
                // Save to config
                let _ = Config::save_default_model(&self.selected_model);
                self.notify(format!("Model changed to {model}"));
            }
        }
    }

    /// Show a transient notice; the tick timer dismisses it.
    pub fn notify(&mut self, text: String) {
        self.notices.push(Notice {
            text,
            expires_at: Instant::now() + NOTICE_TTL,
        });
    }

    /// Advance the typing animation and expire notices (called by Tick).
    pub fn tick(&mut self) {
        if self.streaming {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        let now = Instant::now();
        self.notices.retain(|notice| notice.expires_at > now);
    }

    // Chat scrolling
    pub fn scroll_down(&mut self) {
        if self.chat_scroll < self.chat_total_lines.saturating_sub(self.chat_height) {
            self.chat_scroll = self.chat_scroll.saturating_add(1);
        }
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    /// Scroll so the latest entry is visible. Uses the wrap width from the
    /// last render to estimate line counts.
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for message in &self.messages {
            total_lines += 1; // Role line ("You" or "Assistant")
            match &message.content {
                MessageContent::Pending => total_lines += 1,
                MessageContent::Text(text)
                | MessageContent::Blocked(text)
                | MessageContent::Failed(text) => {
                    if text.is_empty() {
                        total_lines += 1;
                    }
                    for line in text.lines() {
                        // Use character count, not byte length, for proper UTF-8 handling
                        let char_count = line.chars().count();
                        if char_count == 0 {
                            total_lines += 1; // Empty line still takes one line
                        } else {
                            total_lines += ((char_count / wrap_width) + 1) as u16;
                        }
                    }
                }
            }
            total_lines += 1; // Blank line after message
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn test_app() -> (App, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = unbounded_channel();
        // Nothing listens on port 1, so any spawned request fails fast
        let client = ApiClient::new("http://127.0.0.1:1").expect("client");
        (App::new(client, "llama3.2".to_string(), tx), rx)
    }

    fn last_content(app: &App) -> &MessageContent {
        &app.messages.last().expect("expected a message").content
    }

    #[tokio::test]
    async fn test_empty_input_is_not_submitted() {
        let (mut app, _rx) = test_app();
        app.input = "   \n ".to_string();
        app.submit();
        assert!(app.messages.is_empty());
        assert!(!app.streaming);
        // The whitespace input is left alone
        assert_eq!(app.input, "   \n ");
    }

    #[tokio::test]
    async fn test_submit_while_streaming_is_ignored() {
        let (mut app, _rx) = test_app();
        app.input = "first".to_string();
        app.submit();
        assert_eq!(app.messages.len(), 2);
        assert!(app.streaming);

        app.input = "second".to_string();
        app.submit();
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.input, "second");
    }

    #[test]
    fn test_token_stream_accumulates() {
        let (mut app, _rx) = test_app();
        app.begin_exchange("hi");
        assert_eq!(last_content(&app), &MessageContent::Pending);

        app.apply_stream_event(StreamEvent::Token("Hel".to_string()));
        app.apply_stream_event(StreamEvent::Token("lo".to_string()));
        app.apply_stream_event(StreamEvent::Done);
        app.finish_stream();

        assert_eq!(last_content(&app), &MessageContent::Text("Hello".to_string()));
        assert!(!app.streaming);
    }

    #[test]
    fn test_blocked_record_replaces_reply() {
        let (mut app, _rx) = test_app();
        app.begin_exchange("hi");
        app.apply_stream_event(StreamEvent::Blocked("Not allowed".to_string()));
        // A straggler token after the rejection changes nothing
        app.apply_stream_event(StreamEvent::Token("leak".to_string()));
        app.finish_stream();

        assert_eq!(
            last_content(&app),
            &MessageContent::Blocked("Not allowed".to_string())
        );
        assert!(!app.streaming);
    }

    #[test]
    fn test_error_record_replaces_reply() {
        let (mut app, _rx) = test_app();
        app.begin_exchange("hi");
        app.apply_stream_event(StreamEvent::Token("par".to_string()));
        app.apply_stream_event(StreamEvent::Error("backend down".to_string()));
        app.finish_stream();

        assert_eq!(
            last_content(&app),
            &MessageContent::Failed("backend down".to_string())
        );
    }

    #[test]
    fn test_stream_end_without_done_is_clean() {
        let (mut app, _rx) = test_app();
        app.begin_exchange("hi");
        app.apply_stream_event(StreamEvent::Token("partial".to_string()));
        app.finish_stream();

        assert_eq!(
            last_content(&app),
            &MessageContent::Text("partial".to_string())
        );
        assert!(!app.streaming);
    }

    #[tokio::test]
    async fn test_request_failure_shows_inline_error() {
        let (mut app, mut rx) = test_app();
        app.input = "hello".to_string();
        app.submit();

        // Drain the request task's events the way the main loop would
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::Stream(stream_event) => app.apply_stream_event(stream_event),
                AppEvent::StreamClosed => {
                    app.finish_stream();
                    break;
                }
                _ => {}
            }
        }

        assert!(matches!(last_content(&app), MessageContent::Failed(_)));
        assert!(!app.streaming);
        // And sending works again
        app.input = "retry".to_string();
        app.submit();
        assert_eq!(app.messages.len(), 4);
    }

    #[test]
    fn test_new_chat_restores_welcome_state() {
        let (mut app, _rx) = test_app();
        app.begin_exchange("hi");
        app.apply_stream_event(StreamEvent::Token("Hello".to_string()));
        app.finish_stream();
        app.begin_exchange("more");
        app.finish_stream();
        assert_eq!(app.messages.len(), 4);

        app.new_chat();
        assert!(app.messages.is_empty());
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn test_new_chat_during_stream_drops_late_tokens() {
        let (mut app, _rx) = test_app();
        app.begin_exchange("hi");
        app.new_chat();
        assert!(app.streaming); // gate stays until the stream closes

        app.apply_stream_event(StreamEvent::Token("late".to_string()));
        assert!(app.messages.is_empty());

        app.finish_stream();
        assert!(!app.streaming);
    }

    #[test]
    fn test_select_model_notifies() {
        let (mut app, _rx) = test_app();
        app.available_models = vec!["llama3.2".to_string(), "mistral".to_string()];
        app.model_picker_state.select(Some(1));
        app.show_model_picker = true;

        app.select_model();

        assert_eq!(app.selected_model, "mistral");
        assert!(!app.show_model_picker);
        assert_eq!(app.notices.len(), 1);
        assert!(app.notices[0].text.contains("mistral"));
    }

    #[test]
    fn test_notices_expire_on_tick() {
        let (mut app, _rx) = test_app();
        app.notices.push(Notice {
            text: "old".to_string(),
            expires_at: Instant::now(),
        });
        app.notify("fresh".to_string());

        app.tick();

        assert_eq!(app.notices.len(), 1);
        assert_eq!(app.notices[0].text, "fresh");
    }

    #[test]
    fn test_animation_only_advances_while_streaming() {
        let (mut app, _rx) = test_app();
        app.tick();
        assert_eq!(app.animation_frame, 0);

        app.begin_exchange("hi");
        app.tick();
        assert_eq!(app.animation_frame, 1);
    }
}
