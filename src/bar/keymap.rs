//! Fixed key buttons and the literal byte sequences they send.

/// A fixed-label button and the exact bytes its click sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyButton {
    pub label: &'static str,
    pub sequence: &'static str,
}

/// All key buttons, in display order.
pub const KEY_BUTTONS: &[KeyButton] = &[
    KeyButton {
        label: "Esc",
        sequence: "\x1b",
    },
    KeyButton {
        label: "Tab",
        sequence: "\t",
    },
    KeyButton {
        label: "Ctrl+C",
        sequence: "\x03",
    },
    KeyButton {
        label: "Up",
        sequence: "\x1b[A",
    },
    KeyButton {
        label: "Down",
        sequence: "\x1b[B",
    },
    KeyButton {
        label: "Right",
        sequence: "\x1b[C",
    },
    KeyButton {
        label: "Left",
        sequence: "\x1b[D",
    },
];

/// Look up the byte sequence for a button label.
pub fn sequence_for(label: &str) -> Option<&'static str> {
    KEY_BUTTONS
        .iter()
        .find(|button| button.label == label)
        .map(|button| button.sequence)
}
