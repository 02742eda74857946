//! Host command dispatch.
//!
//! Commands are fire-and-forget: nothing comes back.

/// Opens the sorted list of nearby items.
pub const ITEM_LIST_COMMAND: &str = "/bdth list";

/// Sends command strings to the host's command handler.
pub trait CommandDispatch {
    fn dispatch(&mut self, command: &str);
}

/// Logs each command instead of sending it anywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDispatch;

impl CommandDispatch for LogDispatch {
    fn dispatch(&mut self, command: &str) {
        log::info!("Command: {}", command);
    }
}

/// Keeps every dispatched command in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingDispatch {
    pub sent: Vec<String>,
}

impl CommandDispatch for RecordingDispatch {
    fn dispatch(&mut self, command: &str) {
        self.sent.push(command.to_owned());
    }
}

impl<D: CommandDispatch + ?Sized> CommandDispatch for Box<D> {
    fn dispatch(&mut self, command: &str) {
        (**self).dispatch(command)
    }
}
