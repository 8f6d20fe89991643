//! Builder for minitouch command scripts.
//!
//! Client→server commands are newline-terminated text lines:
//!
//! ```text
//! d <contact_id> <x> <y> <pressure>   touch down
//! m <contact_id> <x> <y> <pressure>   move contact
//! u <contact_id>                      lift contact
//! w <ms>                             wait
//! c                                  commit
//! ```
//!
//! Multiple commands may be sent in one socket write. Batching a whole
//! press–move–release sequence before a single `c` lets the device driver
//! apply the gesture atomically instead of stuttering through per-line
//! round trips.
//!
//! [`TouchScript`] accumulates lines and tracks the total `w` delay so the
//! sender knows how long the device will be busy replaying the batch.
//!
//! # Example
//!
//! ```
//! use tapfarm_core::TouchScript;
//!
//! let mut script = TouchScript::new();
//! script.down(0, 400, 400, 50);
//! script.commit();
//! script.move_to(0, 500, 500, 50);
//! script.wait(25);
//! script.commit();
//! script.up(0);
//! let (text, delay_ms) = script.finish();
//! assert!(text.ends_with("c\n"));
//! assert_eq!(delay_ms, 25);
//! assert!(script.is_empty());
//! ```

/// Accumulates a minitouch command script plus its cumulative wait time.
#[derive(Debug, Default)]
pub struct TouchScript {
    content: String,
    delay_ms: u64,
}

impl TouchScript {
    /// Creates an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one raw command line (the newline is added here).
    fn append(&mut self, line: &str) {
        self.content.push_str(line);
        self.content.push('\n');
    }

    /// `d <contact_id> <x> <y> <pressure>` — press a contact down.
    pub fn down(&mut self, contact_id: u32, x: i32, y: i32, pressure: u32) {
        self.append(&format!("d {contact_id} {x} {y} {pressure}"));
    }

    /// `m <contact_id> <x> <y> <pressure>` — move a pressed contact.
    pub fn move_to(&mut self, contact_id: u32, x: i32, y: i32, pressure: u32) {
        self.append(&format!("m {contact_id} {x} {y} {pressure}"));
    }

    /// `u <contact_id>` — lift a contact off the screen.
    pub fn up(&mut self, contact_id: u32) {
        self.append(&format!("u {contact_id}"));
    }

    /// `w <ms>` — pause replay on the device for `ms` milliseconds.
    ///
    /// The wait is also accumulated locally so the publisher can sleep for
    /// the full script duration after sending.
    pub fn wait(&mut self, ms: u64) {
        self.append(&format!("w {ms}"));
        self.delay_ms += ms;
    }

    /// `c` — apply everything buffered since the previous commit.
    pub fn commit(&mut self) {
        self.append("c");
    }

    /// True when no command has been appended since creation or the last
    /// [`finish`](Self::finish)/[`reset`](Self::reset).
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Total milliseconds of `w` commands currently buffered.
    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Appends the implicit trailing commit and hands the script over,
    /// leaving the builder empty.
    ///
    /// Nothing survives a `finish`: calling it twice in a row yields a bare
    /// `"c\n"` the second time, never duplicated prior content.
    pub fn finish(&mut self) -> (String, u64) {
        self.commit();
        let delay = self.delay_ms;
        let text = std::mem::take(&mut self.content);
        self.delay_ms = 0;
        (text, delay)
    }

    /// Discards all buffered commands and the accumulated delay.
    pub fn reset(&mut self) {
        self.content.clear();
        self.delay_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_render_exact_wire_grammar() {
        let mut script = TouchScript::new();
        script.down(0, 10, 20, 50);
        script.move_to(1, 30, 40, 25);
        script.wait(100);
        script.up(0);
        script.commit();
        let (text, delay) = script.finish();
        assert_eq!(text, "d 0 10 20 50\nm 1 30 40 25\nw 100\nu 0\nc\nc\n");
        assert_eq!(delay, 100);
    }

    #[test]
    fn test_wait_accumulates_delay() {
        let mut script = TouchScript::new();
        script.wait(10);
        script.wait(15);
        assert_eq!(script.delay_ms(), 25);
    }

    #[test]
    fn test_finish_resets_buffer_and_delay() {
        let mut script = TouchScript::new();
        script.down(0, 1, 1, 1);
        script.wait(50);
        let _ = script.finish();

        assert!(script.is_empty());
        assert_eq!(script.delay_ms(), 0);

        // A second finish with no intervening commands sends only the
        // implicit commit — never leftover content.
        let (text, delay) = script.finish();
        assert_eq!(text, "c\n");
        assert_eq!(delay, 0);
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut script = TouchScript::new();
        script.down(0, 1, 1, 1);
        script.wait(50);
        script.reset();
        assert!(script.is_empty());
        assert_eq!(script.delay_ms(), 0);
    }
}
