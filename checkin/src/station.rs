//! Terminal front-end: the capture trigger, the busy indicator and the
//! notification dialogs. The controller runs on a worker thread and reports
//! back through a channel, so this loop renders state changes while a request
//! is still in flight.

use std::io::{self, BufRead, Write};
use std::thread;

use async_channel::{Receiver, Sender};
use checkin_core::{Camera, CheckinController, CheckinEvent, CheckinService, EventSink};
use log::{debug, warn};

use crate::render;

/// What the worker hands to the terminal loop.
#[derive(Debug)]
pub enum Update {
    Event(CheckinEvent),
    /// The worker is waiting for the next command.
    Ready { awaiting_choice: bool },
}

/// Event sink that queues controller events for the front-end.
pub fn channel_sink(tx: Sender<Update>) -> impl Fn(CheckinEvent) + Send {
    move |event| {
        if tx.try_send(Update::Event(event)).is_err() {
            debug!("Event dropped, front-end is gone");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Capture,
    Correct,
    NotCorrect,
    Quit,
    Unknown,
}

fn parse_command(line: &str, awaiting_choice: bool) -> Command {
    let line = line.trim().to_lowercase();
    match line.as_str() {
        "q" | "quit" | "exit" => Command::Quit,
        "c" | "correct" | "y" | "yes" if awaiting_choice => Command::Correct,
        "n" | "not correct" | "no" if awaiting_choice => Command::NotCorrect,
        "" | "c" | "capture" if !awaiting_choice => Command::Capture,
        _ => Command::Unknown,
    }
}

pub struct Station<C, S, E, R, W> {
    controller: CheckinController<C, S, E>,
    updates_tx: Sender<Update>,
    updates: Receiver<Update>,
    input: R,
    out: W,
    verbose: bool,
}

impl<C, S, E, R, W> Station<C, S, E, R, W>
where
    C: Camera + Send,
    S: CheckinService + Send,
    E: EventSink + Send,
    R: BufRead,
    W: Write,
{
    /// `updates_tx` must feed the same channel as the controller's sink.
    pub fn new(
        controller: CheckinController<C, S, E>,
        updates_tx: Sender<Update>,
        updates: Receiver<Update>,
        input: R,
        out: W,
        verbose: bool,
    ) -> Self {
        Self {
            controller,
            updates_tx,
            updates,
            input,
            out,
            verbose,
        }
    }

    /// Runs until the user quits or input ends.
    pub fn run(&mut self) -> io::Result<()> {
        let Self {
            controller,
            updates_tx,
            updates,
            input,
            out,
            verbose,
        } = self;
        let (commands_tx, commands_rx) = async_channel::bounded(1);
        let ready_tx = updates_tx.clone();

        thread::scope(|scope| {
            scope.spawn(move || serve(controller, commands_rx, ready_tx));
            interact(updates, input, out, *verbose, commands_tx)
        })
    }

    pub fn into_controller(self) -> CheckinController<C, S, E> {
        self.controller
    }
}

/// Worker side: runs one command at a time against the controller.
fn serve<C, S, E>(
    controller: &mut CheckinController<C, S, E>,
    commands: Receiver<Command>,
    updates: Sender<Update>,
) where
    C: Camera,
    S: CheckinService,
    E: EventSink,
{
    loop {
        let awaiting_choice = controller.pending().is_some();
        if updates.send_blocking(Update::Ready { awaiting_choice }).is_err() {
            return;
        }
        let Ok(command) = commands.recv_blocking() else {
            return;
        };

        let result = match command {
            Command::Capture => controller.request_capture().map(|_| ()),
            Command::Correct => controller.confirm().map(|_| ()),
            Command::NotCorrect => controller.dismiss(),
            Command::Quit => return,
            Command::Unknown => Ok(()),
        };
        if let Err(e) = result {
            warn!("Ignored input: {}", e);
        }
    }
}

/// Terminal side: renders updates and reads a command whenever the worker is
/// ready for one.
fn interact<R: BufRead, W: Write>(
    updates: &Receiver<Update>,
    input: &mut R,
    out: &mut W,
    verbose: bool,
    commands: Sender<Command>,
) -> io::Result<()> {
    while let Ok(update) = updates.recv_blocking() {
        match update {
            Update::Event(event) => render_event(out, event, verbose)?,
            Update::Ready { awaiting_choice } => {
                let command = read_command(input, out, awaiting_choice)?;
                if commands.send_blocking(command).is_err() || command == Command::Quit {
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

fn read_command<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    awaiting_choice: bool,
) -> io::Result<Command> {
    loop {
        if awaiting_choice {
            write!(out, "Is this you? [c] Correct / [n] Not Correct: ")?;
        } else {
            write!(out, "Press Enter to check in (q to quit): ")?;
        }
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(Command::Quit);
        }

        match parse_command(&line, awaiting_choice) {
            Command::Unknown => writeln!(out, "Unrecognized choice: {}", line.trim())?,
            command => return Ok(command),
        }
    }
}

fn render_event<W: Write>(out: &mut W, event: CheckinEvent, verbose: bool) -> io::Result<()> {
    match event {
        CheckinEvent::StateChanged(state) => {
            if let Some(label) = render::busy_label(&state) {
                writeln!(out, "{}", label)?;
            }
        }
        CheckinEvent::Notify(notification) => {
            writeln!(out)?;
            write!(out, "{}", render::notification(&notification, verbose))?;
            writeln!(out)?;
        }
    }
    out.flush()
}
