// Terminal keypad: the 4x3 keypad laid over the keyboard, Q quits
//
//   1 2 3      1     FRONT 3
//   4 5 6  ->  LEFT  5     RIGHT
//   7 8 9      7     BACK  9
//   * 0 #      *     +     #
//
// Every key press publishes the keypad symbol to the runtime.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use diffbot_runtime::config::TOPIC_CMD_SYMBOL;
use diffbot_runtime::messages::SymbolMessage;
use diffbot_runtime::symbols::{InputRouter, KEYPAD_COLS, key_at};
use std::time::Duration;
use tracing::info;

const KEYBOARD: [char; 12] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '*', '0', '#'];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_SYMBOL).await?;

    info!("Controls: 2/8=forward/back, 4/6=turn, #=stop, Q=quit");

    enable_raw_mode()?;
    let result = run_keypad(&publisher).await;
    disable_raw_mode()?;

    result
}

/// Keypad symbol under a keyboard key
fn keypad_symbol(c: char) -> Option<u8> {
    let pos = KEYBOARD.iter().position(|&k| k == c)?;
    key_at(pos / KEYPAD_COLS, pos % KEYPAD_COLS)
}

async fn run_keypad(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let router = InputRouter::default();

    loop {
        if !event::poll(Duration::from_millis(20))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char(c) => {
                if let Some(symbol) = keypad_symbol(c) {
                    info!("Key {} -> 0x{:02X} ({:?})", c, symbol, router.route(symbol));
                    let msg = serde_json::to_string(&SymbolMessage { symbol })?;
                    publisher.put(msg).await?;
                }
            }
            _ => {}
        }
    }

    // Leave the robot stopped
    let msg = serde_json::to_string(&SymbolMessage { symbol: b'#' })?;
    publisher.put(msg).await?;
    Ok(())
}
