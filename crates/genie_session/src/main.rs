use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use chat_protocol::Role;
use codegenie::{
    has_unterminated_fence, init_logging, prewarm_highlighting, render_message, render_streaming,
    RenderConfig,
};
use genie_session::actions::{
    copied_notice, copy_failed_notice, downloaded_notice, exported_notice, today_utc,
};
use genie_session::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use genie_session::{
    copy_message, copy_segment, download_segment, export_transcript, ActionError,
    ConnectionState, DirectorySink, Message, Notice, NoticeLevel, SessionConfig, SessionRuntime,
    SystemClipboard,
};

const PUMP_SLICE: Duration = Duration::from_millis(100);

struct Repl {
    runtime: SessionRuntime,
    render: RenderConfig,
    export_prefix: String,
    printed: usize,
}

fn main() -> io::Result<()> {
    init_logging();
    let _ = std::thread::Builder::new()
        .name("syntax-highlight-prewarm".to_string())
        .spawn(prewarm_highlighting);

    let config = SessionConfig::from_env().map_err(io::Error::other)?;
    let runtime = SessionRuntime::from_config(&config).map_err(io::Error::other)?;
    let mut repl = Repl {
        runtime,
        render: RenderConfig::from_env(),
        export_prefix: config.export_prefix.clone(),
        printed: 0,
    };

    match repl.runtime.wait_for_connection(Instant::now() + config.connect_timeout) {
        ConnectionState::Open => eprintln!("Connected to {}", config.server_url),
        ConnectionState::Connecting => eprintln!("Still connecting to {}", config.server_url),
        ConnectionState::Closed { .. } => eprintln!("Not connected to {}", config.server_url),
    }
    repl.flush_notices();
    eprintln!("{HELP_TEXT}");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        repl.runtime.pump(Instant::now());

        match parse_slash_command(&line) {
            Some(SlashCommand::Quit) => break,
            Some(command) => repl.run_command(command),
            None => {
                if repl.runtime.submit(&line).is_ok() {
                    repl.stream_reply()?;
                }
            }
        }

        repl.flush_notices();
        repl.print_new_messages()?;
    }

    Ok(())
}

impl Repl {
    fn stream_reply(&mut self) -> io::Result<()> {
        let mut stderr = io::stderr();
        while self.runtime.controller().is_pending() {
            self.runtime.pump(Instant::now() + PUMP_SLICE);
            let (lines, in_code) = self
                .runtime
                .controller()
                .in_flight()
                .map_or((0, false), |message| {
                    (
                        render_streaming(&message.content).len(),
                        has_unterminated_fence(&message.content),
                    )
                });
            let status = if in_code { ", writing code" } else { "" };
            write!(stderr, "\r\x1b[2Kassistant is composing... ({lines} lines{status})")?;
            stderr.flush()?;
        }
        write!(stderr, "\r\x1b[2K")?;
        stderr.flush()
    }

    fn run_command(&mut self, command: SlashCommand) {
        match command {
            SlashCommand::Help => eprintln!("{HELP_TEXT}"),
            SlashCommand::Clear => {
                self.runtime.clear();
                self.printed = 0;
            }
            SlashCommand::Export => {
                let mut sink = DirectorySink::new(".");
                let notice = match export_transcript(
                    &mut sink,
                    self.runtime.controller(),
                    &self.export_prefix,
                    today_utc(),
                ) {
                    Ok(path) => exported_notice(&path),
                    Err(error) => Notice::error("Export failed", error.to_string()),
                };
                print_notice(&notice);
            }
            SlashCommand::Copy(block) => {
                let result = self.latest_reply().and_then(|message| {
                    let mut clipboard = SystemClipboard::new()?;
                    match block {
                        Some(number) => {
                            copy_segment(&mut clipboard, message, number - 1).map(drop)
                        }
                        None => copy_message(&mut clipboard, message),
                    }
                });
                print_notice(&match result {
                    Ok(()) => copied_notice(),
                    Err(error) => copy_failed_notice(&error),
                });
            }
            SlashCommand::Save(block) => {
                let mut sink = DirectorySink::new(".");
                let result = self.latest_reply().and_then(|message| {
                    download_segment(&mut sink, message, block.unwrap_or(1) - 1)
                });
                print_notice(&match result {
                    Ok(path) => downloaded_notice(&path),
                    Err(error) => Notice::error("Download failed", error.to_string()),
                });
            }
            SlashCommand::Invalid { usage, .. } => eprintln!("Usage: {usage}"),
            SlashCommand::Unknown(command) => eprintln!("Unknown command: {command}"),
            SlashCommand::Quit => {}
        }
    }

    fn latest_reply(&self) -> Result<&Message, ActionError> {
        self.runtime
            .controller()
            .transcript()
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .ok_or(ActionError::NoReply)
    }

    fn print_new_messages(&mut self) -> io::Result<()> {
        let transcript = self.runtime.controller().transcript();
        self.printed = self.printed.min(transcript.len());

        let mut stdout = io::stdout().lock();
        for message in &transcript[self.printed..] {
            if message.role == Role::User {
                continue;
            }
            for line in render_message(message.role.as_str(), &message.content, &self.render) {
                writeln!(stdout, "{line}")?;
            }
            writeln!(stdout)?;
        }
        self.printed = transcript.len();
        stdout.flush()
    }

    fn flush_notices(&mut self) {
        for notice in self.runtime.take_notices() {
            print_notice(&notice);
        }
        self.runtime.take_render_request();
    }
}

fn print_notice(notice: &Notice) {
    let level = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    eprintln!("[{level}] {}: {}", notice.title, notice.description);
}
