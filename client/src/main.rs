//! Terminal front end for the todo client.
//!
//! Reads one command per line from stdin and prints the list to stdout after
//! every change. Logs go to stderr.

use anyhow::Context;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use taskboard::shell::HELP;
use taskboard::{
    Command, CommandError, Config, HttpTodoApi, Reply, TodoAppState, TodoEnvironment, TodoReducer,
    TodoSession, view,
};
use taskboard_runtime::{Store, StoreConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn prompt(adding: bool) {
    print!("{} > ", view::TodoForm::submit_label(adding));
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(taskboard::config::DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(api_url = %config.api_url, fetch_limit = config.fetch_limit, "Starting taskboard");

    let env = TodoEnvironment::from_config(&config, Arc::new(HttpTodoApi::from_config(&config)));
    let store = Store::with_config(
        TodoAppState::new(),
        TodoReducer::new(),
        env,
        StoreConfig::default().with_shutdown_timeout(Duration::from_secs(config.shutdown_timeout)),
    );
    let mut session = TodoSession::new(store.clone());

    println!("{}", session.render().await);
    let mut handle = session.start().await.context("failed to start initial fetch")?;
    handle.wait().await;
    println!("{}", session.render().await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(false);

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(CommandError::Empty) => {
                prompt(store.state(TodoAppState::is_adding).await);
                continue;
            },
            Err(error) => {
                println!("{error}");
                prompt(store.state(TodoAppState::is_adding).await);
                continue;
            },
        };

        match session.execute(command).await {
            Ok(Reply::Quit) => break,
            Ok(Reply::Help) => println!("{HELP}"),
            Ok(Reply::Screen(text)) => println!("{text}"),
            Ok(Reply::Dispatched(mut handle)) => {
                // Speculative state now, settled state once the remote call returns
                println!("{}", session.render().await);
                let store = store.clone();
                tokio::spawn(async move {
                    handle.wait().await;
                    println!("\n{}", store.state(view::render).await);
                    prompt(store.state(TodoAppState::is_adding).await);
                });
            },
            Err(error) => println!("{error}"),
        }
        prompt(store.state(TodoAppState::is_adding).await);
    }

    info!("Shutting down");
    store
        .shutdown(store.shutdown_timeout())
        .await
        .context("pending changes did not finish")?;

    Ok(())
}
