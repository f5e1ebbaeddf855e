//! Terminal driver for one feedback widget session
//!
//! Mounts a conversation against the configured backend and relays stdin
//! lines as user messages. `/start`, `/clear`, `/end`, `/history`, `/health`
//! and `/quit` map to the widget operations.

use feedback_chat::{
    spawn, ContextSnapshot, ConversationHandle, HttpTransport, LoggingTransport, WidgetConfig,
    WidgetEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = WidgetConfig::from_env()?;
    let transport = LoggingTransport::new(HttpTransport::new(&config)?);
    let handle = spawn(transport);
    tracing::info!(
        api = %config.api_base_url,
        session_id = %handle.session_id(),
        "Feedback chat session mounted"
    );

    let context = || ContextSnapshot {
        page_type: config.page_type,
        url: config.page_url.clone(),
        ..Default::default()
    };

    let printer = tokio::spawn(print_replies(handle.clone()));

    handle.start_conversation(context()).await?;
    handle.settled().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/start" => handle.start_conversation(context()).await?,
            "/clear" => handle.clear_conversation().await?,
            "/end" => handle.end_conversation().await?,
            "/history" => {
                for message in handle.history().await? {
                    println!(
                        "[{}] {}: {}",
                        message.created_at.format("%H:%M:%S"),
                        message.role,
                        message.content
                    );
                }
            }
            "/health" => match handle.health().await {
                Ok(health) => println!(
                    "backend {} (assistant available: {})",
                    health.status, health.assistant_available
                ),
                Err(e) => println!("backend unavailable: {e}"),
            },
            _ => handle.send_message(line, context()).await?,
        }
        handle.settled().await?;
    }

    handle.end_conversation().await?;
    drop(handle);
    printer.await?;
    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "feedback_chat=info".into());
    let json = std::env::var("FEEDBACK_WIDGET_LOG_FORMAT").is_ok_and(|f| f == "json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Print assistant output until the runtime shuts down
async fn print_replies(handle: ConversationHandle) {
    let mut events = handle.events();
    // the runtime stops once the main handle is dropped
    drop(handle);

    loop {
        match events.recv().await {
            Ok(WidgetEvent::MessageAppended { message }) if message.is_assistant() => {
                println!("assistant> {}", message.content);
            }
            Ok(WidgetEvent::MessagesReplaced { messages }) => {
                for message in messages {
                    println!("assistant> {}", message.content);
                }
            }
            Ok(WidgetEvent::Cleared) => println!("(conversation cleared)"),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Reply printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
