use std::env;
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use colloquy::*;

const FRAME_TIME: Duration = Duration::from_millis(16);

struct ConsolePortrait {
    side: &'static str,
}

impl Portrait for ConsolePortrait {
    fn fade_in(&mut self) {}

    fn fade_out(&mut self) {
        println!("== {} portrait leaves ==", self.side);
    }

    fn hide(&mut self) {}

    fn partial_fade(&mut self, _opacity: f32) {}

    fn display_portrait(&mut self, spec: PortraitSpec) {
        println!("== {}: {:?} ({:?}) ==", self.side, spec.character, spec.expression);
    }

    fn stop_talking(&mut self) {}
}

/// Prints each line as it is typed.
#[derive(Default)]
struct ConsoleTextBox {
    printed: usize,
}

impl TextBox for ConsoleTextBox {
    fn set_text(&mut self, text: &str) {
        let count = text.chars().count();
        if count < self.printed {
            self.printed = 0;
        }
        let new: String = text.chars().skip(self.printed).collect();
        print!("{}", new);
        let _ = io::stdout().flush();
        self.printed = count;
    }

    fn clear(&mut self) {
        if self.printed > 0 {
            println!();
        }
        self.printed = 0;
    }
}

/// Blocks on stdin whenever the player waits for submit.
struct StdinInput;

impl InputSource for StdinInput {
    fn submit_pressed(&mut self) -> bool {
        let mut line = String::new();
        io::stdin().read_line(&mut line).is_ok()
    }

    fn skip_requested(&mut self) -> bool {
        false
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args();

    // Usage: dialogue-run <directory> <scene> [locale]
    args.next();
    let directory = PathBuf::from(args.next().ok_or("missing dialogue directory")?);
    let scene = args.next().ok_or("missing scene name")?;
    let locale = args.next().unwrap_or_else(|| player::DEFAULT_LOCALE.to_string());

    let config = PlayerConfig {
        locale,
        ..PlayerConfig::default()
    };
    let mut player = DialoguePlayer::new(GraphStore::new(directory), config)
        .with_portraits(
            Box::new(ConsolePortrait { side: "Left" }),
            Box::new(ConsolePortrait { side: "Right" }),
        )
        .with_text_box(Box::new(ConsoleTextBox::default()))
        .with_input(Box::new(StdinInput));

    player.begin(&scene)?;

    let mut last_frame = Instant::now();
    loop {
        thread::sleep(FRAME_TIME);
        // Waiting on stdin happens inside tick, so measure after it returns.
        let reason = player.tick(last_frame.elapsed())?;
        last_frame = Instant::now();

        match reason {
            SuspendReason::DialogueComplete { lines_shown } => {
                println!("== Dialogue complete ({} lines) ==", lines_shown);
                break;
            }
            SuspendReason::Cancelled => break,
            _ => {}
        }
    }

    Ok(())
}
